use std::{
    io::{self, Write},
    process,
};

use clap::Parser;
use tpm_locker_cli::{Cli, EXIT_FAILURE};
use tpm_locker_logger::log_init;

fn main() {
    log_init(None);
    let cli = Cli::parse();
    let mut stdout = io::stdout().lock();
    let code = match cli.process(&mut stdout) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("ERROR: {err}");
            EXIT_FAILURE
        }
    };
    if let Err(err) = stdout.flush() {
        eprintln!("ERROR: {err}");
    }
    process::exit(code);
}
