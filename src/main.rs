/*!
 * twinsweep CLI entry point.
 */

use std::process::ExitCode;

use clap::Parser;

use twinsweep::config::{Cli, RunConfig};
use twinsweep::logging;

fn main() -> ExitCode {
    let raw_args: Vec<String> = std::env::args().collect();
    let cli = Cli::parse();

    let config = match RunConfig::from_cli(cli, &raw_args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("twinsweep: {err}");
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&config);

    match twinsweep::run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.is_cancellation() => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("twinsweep: {err}");
            ExitCode::FAILURE
        }
    }
}
