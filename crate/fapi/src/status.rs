use std::fmt::{self, Display, Formatter};

use crate::sys::{
    TSS2_FAPI_RC_ALREADY_PROVISIONED, TSS2_FAPI_RC_AUTHORIZATION_FAILED,
    TSS2_FAPI_RC_AUTHORIZATION_UNKNOWN, TSS2_FAPI_RC_BAD_CONTEXT, TSS2_FAPI_RC_BAD_PATH,
    TSS2_FAPI_RC_BAD_REFERENCE, TSS2_FAPI_RC_BAD_SEQUENCE, TSS2_FAPI_RC_BAD_VALUE,
    TSS2_FAPI_RC_GENERAL_FAILURE, TSS2_FAPI_RC_IO_ERROR, TSS2_FAPI_RC_KEY_NOT_FOUND,
    TSS2_FAPI_RC_MEMORY, TSS2_FAPI_RC_NO_CONFIG, TSS2_FAPI_RC_NO_TPM,
    TSS2_FAPI_RC_NOT_IMPLEMENTED, TSS2_FAPI_RC_NOT_PROVISIONED,
    TSS2_FAPI_RC_PATH_ALREADY_EXISTS, TSS2_FAPI_RC_PATH_NOT_FOUND, TSS2_RC, TSS2_RC_SUCCESS,
};

/// A TSS2 return code, decoded once at the module boundary.
///
/// Only the codes the workflows reason about get their own variant;
/// every other code is carried verbatim in `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TpmStatus {
    Success,
    AlreadyProvisioned,
    AlreadyExists,
    Other(TSS2_RC),
}

impl TpmStatus {
    #[must_use]
    pub const fn from_raw(rc: TSS2_RC) -> Self {
        match rc {
            TSS2_RC_SUCCESS => Self::Success,
            TSS2_FAPI_RC_ALREADY_PROVISIONED => Self::AlreadyProvisioned,
            TSS2_FAPI_RC_PATH_ALREADY_EXISTS => Self::AlreadyExists,
            other => Self::Other(other),
        }
    }

    #[must_use]
    pub const fn raw(self) -> TSS2_RC {
        match self {
            Self::Success => TSS2_RC_SUCCESS,
            Self::AlreadyProvisioned => TSS2_FAPI_RC_ALREADY_PROVISIONED,
            Self::AlreadyExists => TSS2_FAPI_RC_PATH_ALREADY_EXISTS,
            Self::Other(rc) => rc,
        }
    }

    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Turn a raw return code into a `Result`, so that callers can use `?`
    /// on every FAPI call. The error side never holds `Success`.
    pub const fn check(rc: TSS2_RC) -> Result<(), Self> {
        match Self::from_raw(rc) {
            Self::Success => Ok(()),
            status => Err(status),
        }
    }

    /// Built-in description of the FAPI codes this crate knows about.
    ///
    /// Used when the `tss2-rc` decoder is unavailable or returns nothing.
    #[must_use]
    pub const fn describe(self) -> Option<&'static str> {
        let text = match self.raw() {
            TSS2_RC_SUCCESS => "success",
            TSS2_FAPI_RC_GENERAL_FAILURE => "fapi:Catch all for all errors not otherwise specified",
            TSS2_FAPI_RC_NOT_IMPLEMENTED => "fapi:Function called not implemented",
            TSS2_FAPI_RC_BAD_CONTEXT => "fapi:A context structure is bad",
            TSS2_FAPI_RC_BAD_REFERENCE => "fapi:A pointer is NULL that isn't allowed to be NULL.",
            TSS2_FAPI_RC_BAD_SEQUENCE => "fapi:Function called in the wrong order",
            TSS2_FAPI_RC_IO_ERROR => "fapi:IO failure",
            TSS2_FAPI_RC_BAD_VALUE => "fapi:A parameter has a bad value",
            TSS2_FAPI_RC_MEMORY => "fapi:Memory allocation failed",
            TSS2_FAPI_RC_NO_CONFIG => "fapi:No config is available",
            TSS2_FAPI_RC_BAD_PATH => "fapi:The provided path is bad",
            TSS2_FAPI_RC_PATH_ALREADY_EXISTS => "fapi:A key with the given path already exists",
            TSS2_FAPI_RC_KEY_NOT_FOUND => "fapi:The key was not found",
            TSS2_FAPI_RC_PATH_NOT_FOUND => "fapi:The provided path does not exist",
            TSS2_FAPI_RC_AUTHORIZATION_FAILED => "fapi:Authorization failed",
            TSS2_FAPI_RC_AUTHORIZATION_UNKNOWN => "fapi:Authorization is unknown",
            TSS2_FAPI_RC_NO_TPM => "fapi:No TPM is available",
            TSS2_FAPI_RC_NOT_PROVISIONED => "fapi:FAPI was not provisioned",
            TSS2_FAPI_RC_ALREADY_PROVISIONED => "fapi:The TPM was already provisioned",
            _ => return None,
        };
        Some(text)
    }
}

impl From<TSS2_RC> for TpmStatus {
    fn from(rc: TSS2_RC) -> Self {
        Self::from_raw(rc)
    }
}

impl Display for TpmStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::AlreadyProvisioned => write!(f, "already provisioned (0x{:x})", self.raw()),
            Self::AlreadyExists => write!(f, "path already exists (0x{:x})", self.raw()),
            Self::Other(rc) => write!(f, "TSS2 return code 0x{rc:x}"),
        }
    }
}

/// Turns a raw return code into a human-readable diagnostic.
pub trait StatusDecoder {
    /// Decode a return code. `None` means no message is available,
    /// which callers must handle without failing.
    fn decode_status(&self, rc: TSS2_RC) -> Option<String>;

    /// Decode a return code into a message that is never empty.
    fn describe_status(&self, status: TpmStatus) -> String {
        self.decode_status(status.raw())
            .filter(|message| !message.trim().is_empty())
            .or_else(|| status.describe().map(ToOwned::to_owned))
            .unwrap_or_else(|| format!("unknown TSS2 return code 0x{:x}", status.raw()))
    }
}

/// Decoder relying only on the built-in descriptions
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinDecoder;

impl StatusDecoder for BuiltinDecoder {
    fn decode_status(&self, rc: TSS2_RC) -> Option<String> {
        TpmStatus::from_raw(rc).describe().map(ToOwned::to_owned)
    }
}
