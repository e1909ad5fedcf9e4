use thiserror::Error;
use tpm_locker_fapi::{
    FError, TpmStatus,
    sys::{TSS2_FAPI_RC_BAD_VALUE, TSS2_FAPI_RC_GENERAL_FAILURE},
};

pub type LockerResult<T> = Result<T, LockerError>;

/// Failure of a command.
///
/// Every variant raised by a workflow carries the module status it came from,
/// see [`LockerError::status`].
#[derive(Error, Debug)]
pub enum LockerError {
    #[error("cannot initialize the FAPI context: {0}")]
    Init(TpmStatus),

    #[error("cannot load the FAPI library: {0}")]
    Library(String),

    #[error("authorization callback failed: {0}")]
    Callback(TpmStatus),

    #[error("provisioning failed: {0}")]
    Provision(TpmStatus),

    #[error("cannot create the key {path}: {status}")]
    KeyCreate { path: String, status: TpmStatus },

    #[error("encryption failed: {0}")]
    Encrypt(TpmStatus),

    #[error("encryption returned the plaintext unchanged")]
    PassThrough,

    #[error("cannot read the module information: {0}")]
    Info(TpmStatus),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl LockerError {
    /// The module status reported for this error
    #[must_use]
    pub const fn status(&self) -> TpmStatus {
        match self {
            Self::Init(status)
            | Self::Callback(status)
            | Self::Provision(status)
            | Self::Encrypt(status)
            | Self::Info(status)
            | Self::KeyCreate { status, .. } => *status,
            Self::PassThrough => TpmStatus::Other(TSS2_FAPI_RC_BAD_VALUE),
            Self::Library(_) | Self::Config(_) | Self::Toml(_) => {
                TpmStatus::Other(TSS2_FAPI_RC_GENERAL_FAILURE)
            }
        }
    }
}

impl From<FError> for LockerError {
    fn from(e: FError) -> Self {
        match e {
            FError::LibLoading(e) => Self::Library(e.to_string()),
            FError::Status(status) => Self::Init(status),
            e => Self::Library(e.to_string()),
        }
    }
}
