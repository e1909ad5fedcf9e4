use thiserror::Error;

use crate::{
    TpmStatus,
    sys::{
        TSS2_FAPI_RC_AUTHORIZATION_UNKNOWN, TSS2_FAPI_RC_BAD_VALUE, TSS2_FAPI_RC_GENERAL_FAILURE,
        TSS2_RC,
    },
};

pub type FResult<T> = Result<T, FError>;

#[derive(Error, Debug)]
pub enum FError {
    #[error("Error loading the library: {0}")]
    LibLoading(#[from] libloading::Error),

    #[error("FAPI error: {0}")]
    Status(TpmStatus),

    /// The module asked for an authorization value without naming an object
    #[error("bad value: {0}")]
    BadValue(String),

    /// No authorization value is configured for the requested object
    #[error("no authorization value for {0}")]
    AuthorizationUnknown(String),
}

impl FError {
    /// Return code handed back to the module when a callback fails
    #[must_use]
    pub fn return_code(&self) -> TSS2_RC {
        match self {
            Self::BadValue(_) => TSS2_FAPI_RC_BAD_VALUE,
            Self::AuthorizationUnknown(_) => TSS2_FAPI_RC_AUTHORIZATION_UNKNOWN,
            Self::Status(status) => status.raw(),
            Self::LibLoading(_) => TSS2_FAPI_RC_GENERAL_FAILURE,
        }
    }
}

impl From<TpmStatus> for FError {
    fn from(status: TpmStatus) -> Self {
        Self::Status(status)
    }
}
