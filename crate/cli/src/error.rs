use thiserror::Error;

pub type CliResult<R> = Result<R, CliError>;

/// Failure to write the command output.
///
/// Command failures are not errors at this level: they are reported on
/// stdout and turned into the exit code.
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
