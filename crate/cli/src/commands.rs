use std::{io::Write, path::PathBuf};

use clap::{Parser, Subcommand};
use tpm_locker::{
    Command, LockerError, Outcome, Provisioner, Report, TpmConfig, encrypt_test_payload,
    module_info,
};
use tpm_locker_fapi::{BuiltinDecoder, FapiModule, StatusDecoder, TpmModule};
use tpm_locker_logger::{debug, error, info};

use crate::error::CliResult;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

const NO_ARGUMENTS: &str = "No arguments specified";

#[derive(Parser, Debug)]
#[command(name = "tpm-locker", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file.
    /// Defaults to /etc/tpm-locker/tpm-locker.toml when it exists
    #[arg(verbatim_doc_comment, long, env = "TPM_LOCKER_CONF", global = true)]
    pub conf: Option<PathBuf>,

    /// Path of the FAPI library, overriding the configuration
    #[arg(long, env = "TPM_LOCKER_FAPI_LIB", global = true)]
    pub fapi_lib: Option<String>,

    /// Path of the TSS2 return code decoding library, overriding the configuration
    #[arg(long, env = "TPM_LOCKER_RC_LIB", global = true)]
    pub rc_lib: Option<String>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Print the module information
    Test,
    /// Provision the TPM and create the application key
    Init,
    /// Encrypt a test payload with the application key
    Enc,
}

impl Commands {
    #[must_use]
    pub const fn command(self) -> Command {
        match self {
            Self::Test => Command::Test,
            Self::Init => Command::Init,
            Self::Enc => Command::Encrypt,
        }
    }
}

impl Cli {
    /// Run the command and return the exit code of the process.
    ///
    /// Nothing is loaded when no command is given.
    pub fn process(self, out: &mut dyn Write) -> CliResult<i32> {
        let Some(command) = self.command else {
            writeln!(out, "{NO_ARGUMENTS}")?;
            return Ok(EXIT_SUCCESS);
        };
        let config = match self.load_config() {
            Ok(config) => config,
            Err(e) => return fail(out, command.command(), &e, &BuiltinDecoder),
        };
        debug!("configuration: {config:?}");
        let module = match FapiModule::instantiate(
            &config.fapi.library,
            config.fapi.rc_library.as_deref(),
        ) {
            Ok(module) => module,
            Err(e) => {
                let e = LockerError::from(e);
                error!("{e}");
                return fail(out, command.command(), &e, &BuiltinDecoder);
            }
        };
        execute(command, &module, &config, out)
    }

    fn load_config(&self) -> Result<TpmConfig, LockerError> {
        let mut config = TpmConfig::load(self.conf.as_deref())?;
        if let Some(fapi_lib) = &self.fapi_lib {
            config.fapi.library.clone_from(fapi_lib);
        }
        if let Some(rc_lib) = &self.rc_lib {
            config.fapi.rc_library = Some(rc_lib.clone());
        }
        Ok(config)
    }
}

/// Run a command on a loaded module, writing the payload and the report to `out`.
pub fn execute<M: TpmModule>(
    command: Commands,
    module: &M,
    config: &TpmConfig,
    out: &mut dyn Write,
) -> CliResult<i32> {
    info!("running the {} command", command.command());
    match command {
        Commands::Test => match module_info(module) {
            Ok(info) => {
                writeln!(out, "{info}")?;
                succeed(out, command.command(), module)
            }
            Err(e) => {
                let outcome = Outcome::from_error(&e, module);
                writeln!(out, "ERROR: {e}")?;
                writeln!(
                    out,
                    "  code: 0x{:x}\n  message: {}",
                    outcome.code(),
                    outcome.message(module)
                )?;
                report(out, command.command(), &outcome, module)?;
                // only a context that cannot be created fails the test command
                Ok(if matches!(e, LockerError::Init(_)) {
                    EXIT_FAILURE
                } else {
                    EXIT_SUCCESS
                })
            }
        },
        Commands::Init => match Provisioner::new(config).run(module) {
            Ok(summary) => {
                info!("provisioning done: {summary:?}");
                succeed(out, command.command(), module)
            }
            Err(e) => fail(out, command.command(), &e, module),
        },
        Commands::Enc => match encrypt_test_payload(module, config) {
            Ok(summary) => {
                writeln!(out, "{}", summary.ciphertext.len())?;
                writeln!(out, "{}", summary.ciphertext_hex())?;
                succeed(out, command.command(), module)
            }
            Err(e) => fail(out, command.command(), &e, module),
        },
    }
}

fn report(
    out: &mut dyn Write,
    command: Command,
    outcome: &Outcome,
    decoder: &dyn StatusDecoder,
) -> CliResult<()> {
    writeln!(out, "{}", Report::render(command, outcome, decoder))?;
    Ok(())
}

fn succeed(out: &mut dyn Write, command: Command, decoder: &dyn StatusDecoder) -> CliResult<i32> {
    report(out, command, &Outcome::Success, decoder)?;
    Ok(EXIT_SUCCESS)
}

fn fail(
    out: &mut dyn Write,
    command: Command,
    e: &LockerError,
    decoder: &dyn StatusDecoder,
) -> CliResult<i32> {
    error!("{command} failed: {e}");
    report(out, command, &Outcome::from_error(e, decoder), decoder)?;
    Ok(EXIT_FAILURE)
}
