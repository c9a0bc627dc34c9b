pub mod cli;
pub mod config;
pub mod error;
pub mod ini;
pub mod logging;

pub use cli::Cli;
pub use config::{CliOverrides, Config, DEFAULT_CONFIG_PATH};
pub use error::ConfigError;
pub use logging::{init_logging, LogDestination, LogLevel, SyslogFacility};
