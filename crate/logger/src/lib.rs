//! Logging for the TPM Locker crates.
//!
//! Re-exports the `tracing` macros so that the other crates only depend on
//! this one for their log statements.

mod log_utils;

pub use log_utils::{DEFAULT_LOG_FILTER, log_init};
pub use tracing::{debug, error, info, trace, warn};
