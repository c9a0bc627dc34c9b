use engine_config::ConfigError;
use engine_runtime::RuntimeError;
use thiserror::Error;

/// Everything that can stop `rtevald` before it reaches a clean shutdown
/// (§7), aggregated at the binary boundary so `main` has exactly one
/// place that maps a failure onto an exit code.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl CliError {
    /// Exit codes per §6: 2 configuration/startup error, 3 daemonize
    /// error, 4 database-connect error. A bare `ConfigError` (failed
    /// before the Supervisor ever constructed a `RuntimeError` around it,
    /// e.g. while resolving the log destination) is always a
    /// configuration error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Runtime(err) => err.exit_code(),
        }
    }
}
