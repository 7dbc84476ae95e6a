//! The `tslite` binary: parse options, run one command, report errors as
//! `Error: <msg>` on stdout with exit code 1.

use clap::error::ErrorKind;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tslite::cli::{self, Cli};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            print!("{e}");
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            println!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match cli::run(&cli, &mut std::io::stdout()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
