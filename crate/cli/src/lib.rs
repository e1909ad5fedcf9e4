//! `tpm-locker`: provision a TPM, create the application key and test it.
//!
//! The payload and the report are written to the standard output, the logs
//! to the standard error.

mod commands;
pub mod error;

pub use commands::{Cli, Commands, EXIT_FAILURE, EXIT_SUCCESS, execute};
