//! Access to the TPM through the TCG Feature API (FAPI) of tpm2-tss.
//!
//! The library is loaded at runtime (see [`FapiModule`]); the workflows only
//! see the [`TpmModule`] and [`TpmContext`] traits, driven through a scoped
//! [`Session`].

mod error;
mod fapi_lib;
mod fapi_module;
mod module;
mod session;
mod status;
pub mod sys;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(test)]
#[cfg(feature = "tpm")]
mod tests;

pub use error::{FError, FResult};
pub use fapi_lib::{FAPI_LIB_DEFAULT, RC_LIB_DEFAULT};
pub use fapi_module::{FapiContext, FapiModule};
pub use module::{AuthCallback, KeyRequest, TpmContext, TpmModule};
pub use session::Session;
pub use status::{BuiltinDecoder, StatusDecoder, TpmStatus};
