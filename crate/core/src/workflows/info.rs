use tpm_locker_fapi::TpmModule;
use tpm_locker_logger::{error, info};

use super::with_session;
use crate::{LockerError, LockerResult};

/// Read the module information (`Fapi_GetInfo`).
///
/// Fails with [`LockerError::Init`] when no context can be created and with
/// [`LockerError::Info`] when the information cannot be read.
pub fn module_info<M: TpmModule>(module: &M) -> LockerResult<String> {
    with_session(module, |session| {
        let info = session.get_info().map_err(|status| {
            error!("Fapi_GetInfo failed: {status}");
            LockerError::Info(status)
        })?;
        info!("module information read, {} bytes", info.len());
        Ok(info)
    })
}
