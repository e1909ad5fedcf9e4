use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use tpm_locker_fapi::{StatusDecoder, TpmStatus, sys::TSS2_RC};

use crate::LockerError;

/// Command selected for the invocation, as numbered in the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum Command {
    Test = 0,
    Init = 1,
    Encrypt = 2,
}

impl Command {
    /// Name of the command on the command line
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Init => "init",
            Self::Encrypt => "enc",
        }
    }
}

impl From<Command> for u8 {
    fn from(command: Command) -> Self {
        command as Self
    }
}

impl TryFrom<u8> for Command {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Test),
            1 => Ok(Self::Init),
            2 => Ok(Self::Encrypt),
            other => Err(format!("unknown command number {other}")),
        }
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Classification of the status of an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    AlreadyProvisioned,
    AlreadyExists,
    Failure { code: TSS2_RC, message: String },
}

impl Outcome {
    /// Classify a module status. The message of a failure is never empty.
    #[must_use]
    pub fn classify(status: TpmStatus, decoder: &dyn StatusDecoder) -> Self {
        match status {
            TpmStatus::Success => Self::Success,
            TpmStatus::AlreadyProvisioned => Self::AlreadyProvisioned,
            TpmStatus::AlreadyExists => Self::AlreadyExists,
            TpmStatus::Other(code) => Self::Failure {
                code,
                message: decoder.describe_status(status),
            },
        }
    }

    /// The failure reported for an error.
    ///
    /// Errors carrying a module status are described by the decoder, the
    /// others by their own message.
    #[must_use]
    pub fn from_error(error: &LockerError, decoder: &dyn StatusDecoder) -> Self {
        let status = error.status();
        let message = match error {
            LockerError::Init(_)
            | LockerError::Callback(_)
            | LockerError::Provision(_)
            | LockerError::KeyCreate { .. }
            | LockerError::Encrypt(_)
            | LockerError::Info(_) => decoder.describe_status(status),
            other => other.to_string(),
        };
        Self::Failure {
            code: status.raw(),
            message,
        }
    }

    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    /// Value of the `result` field of the report
    #[must_use]
    pub const fn code(&self) -> TSS2_RC {
        match self {
            Self::Success => TpmStatus::Success.raw(),
            Self::AlreadyProvisioned => TpmStatus::AlreadyProvisioned.raw(),
            Self::AlreadyExists => TpmStatus::AlreadyExists.raw(),
            Self::Failure { code, .. } => *code,
        }
    }

    /// Value of the `message` field of the report
    #[must_use]
    pub fn message(&self, decoder: &dyn StatusDecoder) -> String {
        match self {
            Self::Success => "success".to_owned(),
            Self::AlreadyProvisioned => decoder.describe_status(TpmStatus::AlreadyProvisioned),
            Self::AlreadyExists => decoder.describe_status(TpmStatus::AlreadyExists),
            Self::Failure { message, .. } => message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use tpm_locker_fapi::{
        BuiltinDecoder, TpmStatus,
        sys::{TSS2_FAPI_RC_GENERAL_FAILURE, TSS2_FAPI_RC_PATH_NOT_FOUND},
    };

    use super::{Command, Outcome};
    use crate::LockerError;

    #[test]
    fn test_classify() {
        assert_eq!(Outcome::classify(TpmStatus::Success, &BuiltinDecoder), Outcome::Success);
        assert_eq!(
            Outcome::classify(TpmStatus::AlreadyProvisioned, &BuiltinDecoder),
            Outcome::AlreadyProvisioned
        );
        assert_eq!(
            Outcome::classify(TpmStatus::AlreadyExists, &BuiltinDecoder),
            Outcome::AlreadyExists
        );
        let outcome = Outcome::classify(TpmStatus::Other(TSS2_FAPI_RC_PATH_NOT_FOUND), &BuiltinDecoder);
        assert!(outcome.is_failure());
        assert_eq!(outcome.code(), TSS2_FAPI_RC_PATH_NOT_FOUND);
        assert!(!outcome.message(&BuiltinDecoder).is_empty());
    }

    #[test]
    fn test_unknown_code_has_a_message() {
        let outcome = Outcome::classify(TpmStatus::Other(0xdead), &BuiltinDecoder);
        assert_eq!(
            outcome.message(&BuiltinDecoder),
            "unknown TSS2 return code 0xdead"
        );
    }

    #[test]
    fn test_from_error() {
        let outcome = Outcome::from_error(
            &LockerError::Library("libtss2-fapi.so.1: cannot open shared object file".to_owned()),
            &BuiltinDecoder,
        );
        assert_eq!(outcome.code(), TSS2_FAPI_RC_GENERAL_FAILURE);
        assert!(outcome.message(&BuiltinDecoder).contains("libtss2-fapi.so.1"));

        let outcome = Outcome::from_error(
            &LockerError::Encrypt(TpmStatus::Other(TSS2_FAPI_RC_PATH_NOT_FOUND)),
            &BuiltinDecoder,
        );
        assert_eq!(outcome.code(), TSS2_FAPI_RC_PATH_NOT_FOUND);
        assert_eq!(
            outcome.message(&BuiltinDecoder),
            "fapi:The provided path does not exist"
        );
    }

    #[test]
    fn test_command_numbers() {
        assert_eq!(u8::from(Command::Test), 0);
        assert_eq!(u8::from(Command::Init), 1);
        assert_eq!(u8::from(Command::Encrypt), 2);
        assert_eq!(Command::try_from(2), Ok(Command::Encrypt));
        assert!(Command::try_from(3).is_err());
        assert_eq!(Command::Encrypt.to_string(), "enc");
    }
}
