use connectors::DbError;
use engine_config::ConfigError;
use thiserror::Error;

/// Everything that can go wrong constructing or running the topology
/// (§7). Only the startup-fatal class carries a specific process exit
/// code; every other variant is handled by triggering a graceful shutdown
/// and the process still exits 0 once that completes.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("could not connect to the database: {0}")]
    DatabaseConnect(#[source] DbError),

    #[error("daemonizing failed: {0}")]
    Daemonize(String),

    #[error("daemonizing while logging to a console destination is refused")]
    DaemonizeRefusedConsoleLog,

    #[error("failed to install signal handlers: {0}")]
    Signal(#[from] std::io::Error),

    #[error("dispatcher's gateway lost its connection")]
    DispatcherGatewayUnreachable,

    #[error("claiming the next submission failed: {0}")]
    Claim(#[source] DbError),

    #[error("waiting for a notification failed: {0}")]
    Notification(#[source] DbError),

    #[error("no active workers remain")]
    NoActiveWorkers,

    #[error("the job queue is disconnected")]
    QueueDisconnected,
}

impl RuntimeError {
    /// Maps a startup-fatal error onto the CLI exit code in §6. Errors that
    /// only ever arise once the topology is already running (dispatcher-
    /// fatal, per §7 class 3) are not represented here: the Supervisor
    /// handles those by shutting down gracefully rather than propagating
    /// them out to the exit code.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Daemonize(_) | Self::DaemonizeRefusedConsoleLog => 3,
            Self::DatabaseConnect(_) => 4,
            _ => 1,
        }
    }
}
