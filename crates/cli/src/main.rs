//! The `rtevald` binary (§4.4, §6): parses arguments, loads configuration,
//! initializes logging, and hands the resulting [`engine_runtime::Supervisor`]
//! the rest of the process's lifetime.

mod error;

use clap::Parser;
use engine_config::{Cli, Config, LogDestination, LogLevel};
use engine_runtime::Supervisor;
use error::CliError;
use std::process::ExitCode;
use tracing::error;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("rtevald: {err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let explicit_config = !cli.config_path_is_default();
    let mut config = Config::load(&cli.config, explicit_config)?;
    config.apply_overrides(&cli.overrides());

    let destination: LogDestination = config.log_dest.parse()?;
    let level: LogLevel = config.log_level.parse()?;
    engine_config::init_logging(&destination, level)?;

    let supervisor = Supervisor::new(config);
    supervisor.run().map_err(|err| {
        error!(error = %err, "rtevald exiting");
        CliError::from(err)
    })
}
