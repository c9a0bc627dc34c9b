use crate::config::{CliOverrides, DEFAULT_CONFIG_PATH};
use clap::Parser;

/// The process's command-line surface (§4.6): a declarative derive-based
/// parser matching the source's `-d/-l/-L/-f/-t/-h` flags one for one.
#[derive(Debug, Parser)]
#[command(name = "rtevald", version, about = "rteval report ingestion daemon")]
pub struct Cli {
    /// Detach from the controlling terminal and run as a daemon.
    #[arg(short = 'd', long = "daemon")]
    pub daemon: bool,

    /// Log destination: `stderr:`, `stdout:`, `syslog:[facility]`, or a file path.
    #[arg(short = 'l', long = "log", value_name = "DEST")]
    pub log: Option<String>,

    /// Log verbosity: emerg, alert, crit, err, warning, notice, info, debug.
    #[arg(short = 'L', long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Path to the INI configuration file.
    #[arg(short = 'f', long = "config", value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Number of parse worker threads.
    #[arg(short = 't', long = "threads", value_name = "N")]
    pub threads: Option<usize>,
}

impl Cli {
    /// Whether `-f/--config` was left at its default, i.e. the config file
    /// at that path is allowed to be absent (§4.5).
    pub fn config_path_is_default(&self) -> bool {
        self.config == DEFAULT_CONFIG_PATH
    }

    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            daemon: self.daemon,
            log_dest: self.log.clone(),
            log_level: self.log_level.clone(),
            threads: self.threads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_the_standard_config_path() {
        let cli = Cli::parse_from(["rtevald"]);
        assert!(cli.config_path_is_default());
        assert_eq!(cli.config, DEFAULT_CONFIG_PATH);
    }

    #[test]
    fn explicit_config_flag_is_detected() {
        let cli = Cli::parse_from(["rtevald", "-f", "/tmp/custom.conf"]);
        assert!(!cli.config_path_is_default());
    }

    #[test]
    fn only_supplied_flags_become_overrides() {
        let cli = Cli::parse_from(["rtevald", "-L", "debug"]);
        let overrides = cli.overrides();
        assert_eq!(overrides.log_level.as_deref(), Some("debug"));
        assert_eq!(overrides.threads, None);
        assert!(!overrides.daemon);
    }
}
