//! The report printed as the last line of the standard output, and its
//! parsing by calling automation.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use tpm_locker_fapi::StatusDecoder;

use crate::{Command, Outcome};

/// Value of the `subsystem` field
pub const SUBSYSTEM: &str = "tpm";

/// Result code of a transcript without any output
pub const RESULT_NO_OUTPUT: i64 = -2;
/// Result code of a transcript whose last line is not a report
pub const RESULT_NO_REPORT: i64 = -1;
/// Result code of a transcript whose report cannot be parsed
pub const RESULT_MALFORMED_REPORT: i64 = -5;

/// `{"subsystem":"tpm","command":<0|1|2>,"result":<int>,"message":<string>}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub subsystem: String,
    pub command: Command,
    pub result: i64,
    pub message: String,
}

impl Report {
    #[must_use]
    pub fn render(command: Command, outcome: &Outcome, decoder: &dyn StatusDecoder) -> Self {
        Self {
            subsystem: SUBSYSTEM.to_owned(),
            command,
            result: i64::from(outcome.code()),
            message: outcome.message(decoder),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.result == 0
    }

    fn synthetic(command: Command, result: i64, message: &str) -> Self {
        Self {
            subsystem: SUBSYSTEM.to_owned(),
            command,
            result,
            message: message.to_owned(),
        }
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// The standard output of an invocation, split into the payload lines and
/// the trailing report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub payload: Vec<String>,
    pub report: Report,
}

impl Transcript {
    /// Parse a captured standard output.
    ///
    /// This never fails: a missing or malformed report is replaced by a
    /// report carrying a negative result code.
    #[must_use]
    pub fn parse(command: Command, output: &str) -> Self {
        let mut lines: Vec<&str> = output
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .collect();
        let Some(last) = lines.pop() else {
            return Self {
                payload: Vec::new(),
                report: Report::synthetic(command, RESULT_NO_OUTPUT, "no output"),
            };
        };
        if !last.trim_start().starts_with('{') {
            lines.push(last);
            return Self {
                payload: lines.into_iter().map(ToOwned::to_owned).collect(),
                report: Report::synthetic(command, RESULT_NO_REPORT, "no report in the output"),
            };
        }
        let report = match serde_json::from_str::<Report>(last) {
            Ok(report) if report.subsystem == SUBSYSTEM => report,
            Ok(report) => Report::synthetic(
                command,
                RESULT_MALFORMED_REPORT,
                &format!("unexpected subsystem {:?}", report.subsystem),
            ),
            Err(e) => Report::synthetic(
                command,
                RESULT_MALFORMED_REPORT,
                &format!("malformed report: {e}"),
            ),
        };
        Self {
            payload: lines.into_iter().map(ToOwned::to_owned).collect(),
            report,
        }
    }
}
