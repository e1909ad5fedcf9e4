//! The commands run against the module.
//!
//! Each workflow acquires its own [`Session`](tpm_locker_fapi::Session) and
//! releases it before returning, whatever the outcome.

mod encrypt;
mod info;
mod provision;

pub use encrypt::{EncryptionSummary, encrypt_test_payload, test_payload};
pub use info::module_info;
pub use provision::{ProvisionSummary, Provisioner, StepState};

use tpm_locker_fapi::{Session, TpmContext, TpmModule, TpmStatus};
use tpm_locker_logger::error;

use crate::{LockerError, LockerResult};

/// Map the failed status of a step, preferring the error of the
/// authorization callback when one was raised during the step.
pub(crate) fn step_error<C: TpmContext>(
    session: &mut Session<C>,
    status: TpmStatus,
    error: impl FnOnce(TpmStatus) -> LockerError,
) -> LockerError {
    match session.take_callback_error() {
        Some(callback_error) => {
            error!("authorization callback failed: {callback_error}");
            LockerError::Callback(status)
        }
        None => error(status),
    }
}

/// Run `f` on a new session and release the session afterwards.
pub(crate) fn with_session<M, T, F>(module: &M, f: F) -> LockerResult<T>
where
    M: TpmModule,
    F: FnOnce(&mut Session<M::Context>) -> LockerResult<T>,
{
    let mut session = Session::acquire(module).map_err(LockerError::Init)?;
    let result = f(&mut session);
    session.release();
    result
}
