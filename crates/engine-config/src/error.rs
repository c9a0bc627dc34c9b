use thiserror::Error;

/// A config/logging/CLI problem severe enough that the Supervisor cannot
/// start (§7 class 4, "startup-fatal"). The CLI binary maps this to exit
/// code 2.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {path} does not exist")]
    MissingFile { path: String },

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config key {key} in section [{section}] has an invalid value {value:?}: expected {expected}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("unknown log destination {0:?}")]
    InvalidLogDestination(String),

    #[error("unknown log level {0:?}")]
    InvalidLogLevel(String),

    #[error("failed to open log sink at {path}: {source}")]
    LogSinkOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to install the syslog sink: {0}")]
    Syslog(String),

    #[error("failed to install the global log dispatcher")]
    LoggerAlreadyInstalled,
}
