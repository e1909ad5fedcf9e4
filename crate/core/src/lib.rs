//! Provisioning and encryption test of a TPM through its Feature API.
//!
//! [`Provisioner`] brings the module to a state holding the application key,
//! [`encrypt_test_payload`] exercises that key, and every result is turned
//! into an [`Outcome`] then rendered as a one-line JSON [`Report`].

mod auth;
mod config;
mod error;
mod outcome;
mod report;
mod workflows;

pub use auth::AuthorizationProvider;
pub use config::{
    AuthConfig, DEFAULT_CONF_PATH, EncryptConfig, FapiConfig, KeysConfig, PAYLOAD_LENGTH_MAX,
    TPM_LOCKER_AUTH_SECRET_ENV, TPM_LOCKER_CONF_ENV, TPM_LOCKER_LOCKOUT_SECRET_ENV, TpmConfig,
};
pub use error::{LockerError, LockerResult};
pub use outcome::{Command, Outcome};
pub use report::{
    RESULT_MALFORMED_REPORT, RESULT_NO_OUTPUT, RESULT_NO_REPORT, Report, SUBSYSTEM, Transcript,
};
pub use workflows::{
    EncryptionSummary, ProvisionSummary, Provisioner, StepState, encrypt_test_payload,
    module_info, test_payload,
};
