//! Capability interface of the TPM, as consumed by the workflows.
//!
//! [`TpmModule`] is the library side (context creation, status decoding) and
//! [`TpmContext`] the operations available on an initialized context. The FAPI
//! implementation lives in [`crate::FapiModule`]; tests use the in-memory
//! `MockTpm`.

use zeroize::Zeroizing;

use crate::{FError, FResult, StatusDecoder, TpmStatus};

/// Callback answering authorization requests of the module.
///
/// It receives the object path (absent if the module did not provide one)
/// and a human-readable description, and returns the authorization value.
/// The module may call it any number of times during a single operation.
pub type AuthCallback =
    Box<dyn FnMut(Option<&str>, Option<&str>) -> FResult<Zeroizing<String>>>;

/// Parameters of a key creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRequest<'a> {
    /// FAPI path of the key, e.g. `/HS/SRK/locker`
    pub path: &'a str,
    /// Comma separated key usage attributes, e.g. `sign,decrypt`
    pub key_type: &'a str,
    pub policy_path: Option<&'a str>,
    /// Authorization value set on the new key
    pub auth_value: Option<&'a str>,
}

impl<'a> KeyRequest<'a> {
    #[must_use]
    pub const fn new(path: &'a str, key_type: &'a str) -> Self {
        Self {
            path,
            key_type,
            policy_path: None,
            auth_value: None,
        }
    }
}

pub trait TpmModule: StatusDecoder {
    type Context: TpmContext;

    /// Initialize a new context (`Fapi_Initialize`)
    fn initialize(&self) -> Result<Self::Context, TpmStatus>;
}

/// Operations on an initialized context.
///
/// Every fallible operation returns the non-success status as its error,
/// so `Err` never holds [`TpmStatus::Success`].
pub trait TpmContext {
    /// Release the context (`Fapi_Finalize`). Must be idempotent.
    fn finalize(&mut self);

    /// Module and profile information, as the JSON text returned by `Fapi_GetInfo`
    fn get_info(&mut self) -> Result<String, TpmStatus>;

    fn set_auth_callback(&mut self, callback: AuthCallback) -> Result<(), TpmStatus>;

    /// Error raised by the authorization callback during the last operations, if any
    fn take_callback_error(&mut self) -> Option<FError>;

    /// Provision the storage hierarchy, setting the lockout authorization value
    fn provision(&mut self, lockout_auth: Option<&str>) -> Result<(), TpmStatus>;

    fn create_key(&mut self, request: &KeyRequest<'_>) -> Result<(), TpmStatus>;

    fn encrypt(&mut self, key_path: &str, plaintext: &[u8]) -> Result<Vec<u8>, TpmStatus>;
}
