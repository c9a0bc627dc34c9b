use crate::error::ConfigError;
use std::fmt;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;
use syslog::Formatter3164;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// The eight syslog-style severities the source accepts (§4.7), ordered
/// from least to most severe so that `level >= configured` gates emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Err,
    Crit,
    Alert,
    Emerg,
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "emerg" | "emergency" => Self::Emerg,
            "alert" => Self::Alert,
            "crit" | "critical" => Self::Crit,
            "err" | "error" => Self::Err,
            "warning" | "warn" => Self::Warning,
            "notice" => Self::Notice,
            "info" | "information" => Self::Info,
            "debug" | "trace" => Self::Debug,
            other => return Err(ConfigError::InvalidLogLevel(other.to_string())),
        })
    }
}

impl LogLevel {
    /// `tracing` only discriminates five levels; every rteval level
    /// collapses onto the nearest one for the purpose of filtering. The
    /// original distinction is preserved in which syslog method the
    /// [`SyslogLayer`] calls, not in the filter threshold.
    pub fn to_tracing_filter(self) -> tracing::level_filters::LevelFilter {
        use tracing::level_filters::LevelFilter;
        match self {
            Self::Emerg | Self::Alert | Self::Crit | Self::Err => LevelFilter::ERROR,
            Self::Warning => LevelFilter::WARN,
            Self::Notice | Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
        }
    }
}

/// `daemon`, `user`, `local0`..`local7` (§6), default `daemon`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyslogFacility {
    Daemon,
    User,
    Local(u8),
}

impl Default for SyslogFacility {
    fn default() -> Self {
        Self::Daemon
    }
}

impl FromStr for SyslogFacility {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "daemon" => Ok(Self::Daemon),
            "user" => Ok(Self::User),
            other => other
                .strip_prefix("local")
                .and_then(|n| n.parse::<u8>().ok())
                .filter(|n| *n <= 7)
                .map(Self::Local)
                .ok_or_else(|| ConfigError::InvalidLogDestination(format!("syslog:{s}"))),
        }
    }
}

impl SyslogFacility {
    fn to_syslog_crate(self) -> syslog::Facility {
        match self {
            Self::Daemon => syslog::Facility::LOG_DAEMON,
            Self::User => syslog::Facility::LOG_USER,
            Self::Local(0) => syslog::Facility::LOG_LOCAL0,
            Self::Local(1) => syslog::Facility::LOG_LOCAL1,
            Self::Local(2) => syslog::Facility::LOG_LOCAL2,
            Self::Local(3) => syslog::Facility::LOG_LOCAL3,
            Self::Local(4) => syslog::Facility::LOG_LOCAL4,
            Self::Local(5) => syslog::Facility::LOG_LOCAL5,
            Self::Local(6) => syslog::Facility::LOG_LOCAL6,
            _ => syslog::Facility::LOG_LOCAL7,
        }
    }
}

/// `stderr:`, `stdout:`, `syslog:[facility]`, or a bare file path (§4.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogDestination {
    Stderr,
    Stdout,
    Syslog(SyslogFacility),
    File(PathBuf),
}

impl FromStr for LogDestination {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "stderr:" {
            return Ok(Self::Stderr);
        }
        if s == "stdout:" {
            return Ok(Self::Stdout);
        }
        if let Some(facility) = s.strip_prefix("syslog:") {
            return Ok(Self::Syslog(facility.parse()?));
        }
        Ok(Self::File(PathBuf::from(s)))
    }
}

impl LogDestination {
    /// Daemonizing while this resolves to a console sink is startup-fatal
    /// (§4.7, exit code 3): a daemon with no controlling terminal cannot
    /// usefully log to one.
    pub fn is_console(&self) -> bool {
        matches!(self, Self::Stderr | Self::Stdout)
    }
}

/// Installs the process-wide `tracing` subscriber for `destination` at
/// `level`. Idempotent failures (a second call in the same process) are
/// reported rather than panicking.
pub fn init_logging(destination: &LogDestination, level: LogLevel) -> Result<(), ConfigError> {
    let filter = level.to_tracing_filter();

    match destination {
        LogDestination::Stderr => tracing_subscriber::fmt()
            .with_max_level(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|_| ConfigError::LoggerAlreadyInstalled),
        LogDestination::Stdout => tracing_subscriber::fmt()
            .with_max_level(filter)
            .with_writer(std::io::stdout)
            .try_init()
            .map_err(|_| ConfigError::LoggerAlreadyInstalled),
        LogDestination::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| ConfigError::LogSinkOpen {
                    path: path.display().to_string(),
                    source,
                })?;
            tracing_subscriber::fmt()
                .with_max_level(filter)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|_| ConfigError::LoggerAlreadyInstalled)
        }
        LogDestination::Syslog(facility) => {
            let formatter = Formatter3164 {
                facility: facility.to_syslog_crate(),
                hostname: None,
                process: "rtevald".to_string(),
                pid: std::process::id() as i32,
            };
            let logger = syslog::unix(formatter).map_err(|err| ConfigError::Syslog(err.to_string()))?;
            let layer = SyslogLayer {
                logger: Mutex::new(logger),
            }
            .with_filter(filter);
            tracing_subscriber::registry()
                .with(layer)
                .try_init()
                .map_err(|_| ConfigError::LoggerAlreadyInstalled)
        }
    }
}

/// A `tracing_subscriber::Layer` that routes every event to the local
/// syslog daemon, mapping `tracing`'s five levels onto the nearest syslog
/// severity call (§4.7). File/console sinks get the equivalent
/// serialization for free from `tracing_subscriber`'s writer machinery; the
/// syslog sink relies on the platform syslog call's own thread-safety, so
/// the mutex here only protects the one `Logger` handle, not message
/// ordering.
struct SyslogLayer {
    logger: Mutex<syslog::Logger<syslog::LoggerBackend, Formatter3164>>,
}

impl<S: Subscriber> Layer<S> for SyslogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let message = visitor.message.unwrap_or_default();

        let mut logger = self.logger.lock().unwrap_or_else(|poison| poison.into_inner());
        let _ = match *event.metadata().level() {
            Level::ERROR => logger.err(message),
            Level::WARN => logger.warning(message),
            Level::INFO => logger.info(message),
            Level::DEBUG | Level::TRACE => logger.debug(message),
        };
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_console_destinations() {
        assert_eq!("stderr:".parse::<LogDestination>().unwrap(), LogDestination::Stderr);
        assert_eq!("stdout:".parse::<LogDestination>().unwrap(), LogDestination::Stdout);
    }

    #[test]
    fn parses_syslog_with_default_and_explicit_facility() {
        assert_eq!(
            "syslog:".parse::<LogDestination>().unwrap(),
            LogDestination::Syslog(SyslogFacility::Daemon)
        );
        assert_eq!(
            "syslog:local3".parse::<LogDestination>().unwrap(),
            LogDestination::Syslog(SyslogFacility::Local(3))
        );
    }

    #[test]
    fn anything_else_is_a_file_path() {
        assert_eq!(
            "/var/log/rteval.log".parse::<LogDestination>().unwrap(),
            LogDestination::File(PathBuf::from("/var/log/rteval.log"))
        );
    }

    #[test]
    fn console_destinations_are_flagged_for_the_daemonize_gate() {
        assert!(LogDestination::Stderr.is_console());
        assert!(!LogDestination::File(PathBuf::from("/x")).is_console());
    }

    #[test]
    fn level_synonyms_parse_to_the_same_variant() {
        assert_eq!("warn".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("error".parse::<LogLevel>().unwrap(), LogLevel::Err);
    }

    #[test]
    fn severity_ordering_runs_debug_to_emerg() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Err < LogLevel::Crit);
        assert!(LogLevel::Crit < LogLevel::Emerg);
    }
}
