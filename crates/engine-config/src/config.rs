use crate::error::ConfigError;
use crate::ini::IniDocument;
use std::path::Path;

/// Default path consulted when `-f/--config` is not given (§6).
pub const DEFAULT_CONFIG_PATH: &str = "/etc/rteval.conf";

/// The only section the Configuration Loader reads (§4.5).
const SECTION: &str = "xmlrpc_parser";

/// A fully-populated, typed configuration (§3): everything the Supervisor
/// needs to construct the pipeline, whether it came from the INI file or a
/// CLI override.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub datadir: String,
    pub xsltpath: String,
    pub db_server: String,
    pub db_port: u16,
    pub database: String,
    pub db_username: String,
    pub db_password: String,
    pub reportdir: String,
    pub max_report_size: u64,

    pub daemon: bool,
    pub log_dest: String,
    pub log_level: String,
    pub config_path: String,
    pub threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            datadir: "/var/lib/rteval".to_string(),
            xsltpath: "/usr/share/rteval".to_string(),
            db_server: "localhost".to_string(),
            db_port: 5432,
            database: "rteval".to_string(),
            db_username: "rtevparser".to_string(),
            db_password: "rtevaldb_parser".to_string(),
            reportdir: "/var/lib/rteval/reports".to_string(),
            max_report_size: 2_097_152,

            daemon: false,
            log_dest: "stderr:".to_string(),
            log_level: "info".to_string(),
            config_path: DEFAULT_CONFIG_PATH.to_string(),
            threads: 4,
        }
    }
}

impl Config {
    /// Loads the `[xmlrpc_parser]` section from `path`, defaulting any key
    /// it doesn't declare. A missing file at the *default* path is
    /// tolerated (§4.5); the caller is responsible for only passing
    /// `explicit = true` when the path came from an explicit `-f` flag.
    pub fn load(path: &str, explicit: bool) -> Result<Self, ConfigError> {
        let mut config = Self {
            config_path: path.to_string(),
            ..Self::default()
        };

        let source = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound && !explicit => {
                return Ok(config);
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::MissingFile {
                    path: path.to_string(),
                });
            }
            Err(err) => {
                return Err(ConfigError::Read {
                    path: path.to_string(),
                    source: err,
                });
            }
        };

        let doc = IniDocument::parse(&source);
        config.apply_ini(&doc)?;
        Ok(config)
    }

    fn apply_ini(&mut self, doc: &IniDocument) -> Result<(), ConfigError> {
        let known_keys = [
            "datadir",
            "xsltpath",
            "db_server",
            "db_port",
            "database",
            "db_username",
            "db_password",
            "reportdir",
            "max_report_size",
        ];

        for (key, _) in doc.section(SECTION) {
            if !known_keys.contains(&key.as_str()) {
                tracing::debug!(section = SECTION, key = %key, "ignoring unknown config key");
            }
        }

        if let Some(v) = doc.get(SECTION, "datadir") {
            self.datadir = v.to_string();
        }
        if let Some(v) = doc.get(SECTION, "xsltpath") {
            self.xsltpath = v.to_string();
        }
        if let Some(v) = doc.get(SECTION, "db_server") {
            self.db_server = v.to_string();
        }
        if let Some(v) = doc.get(SECTION, "db_port") {
            self.db_port = parse_key(SECTION, "db_port", v, "an integer port number")?;
        }
        if let Some(v) = doc.get(SECTION, "database") {
            self.database = v.to_string();
        }
        if let Some(v) = doc.get(SECTION, "db_username") {
            self.db_username = v.to_string();
        }
        if let Some(v) = doc.get(SECTION, "db_password") {
            self.db_password = v.to_string();
        }
        if let Some(v) = doc.get(SECTION, "reportdir") {
            self.reportdir = v.to_string();
        }
        if let Some(v) = doc.get(SECTION, "max_report_size") {
            self.max_report_size = parse_key(SECTION, "max_report_size", v, "an integer byte count")?;
        }

        Ok(())
    }

    /// Overlays only the CLI flags the user actually supplied (§4.6).
    pub fn apply_overrides(&mut self, overrides: &CliOverrides) {
        if overrides.daemon {
            self.daemon = true;
        }
        if let Some(dest) = &overrides.log_dest {
            self.log_dest = dest.clone();
        }
        if let Some(level) = &overrides.log_level {
            self.log_level = level.clone();
        }
        if let Some(threads) = overrides.threads {
            self.threads = threads;
        }
    }

    pub fn archive_root(&self) -> &Path {
        Path::new(&self.reportdir)
    }
}

fn parse_key<T: std::str::FromStr>(
    section: &str,
    key: &str,
    raw: &str,
    expected: &'static str,
) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: raw.to_string(),
        expected,
    })
}

/// The subset of CLI flags that override `Config` fields (§4.6). Built
/// from the clap-derived `Cli` struct in [`crate::cli`].
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub daemon: bool,
    pub log_dest: Option<String>,
    pub log_level: Option<String>,
    pub threads: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_default_path_falls_back_to_defaults() {
        let config = Config::load("/nonexistent/path/that/should/not/exist.conf", false).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn missing_explicit_path_is_startup_fatal() {
        let err = Config::load("/nonexistent/path/explicit.conf", true).unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile { .. }));
    }

    #[test]
    fn loads_and_overrides_known_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rteval.conf");
        std::fs::write(
            &path,
            "[xmlrpc_parser]\ndb_server=db.example.com\ndb_port=5555\nmax_report_size=10\n",
        )
        .unwrap();

        let config = Config::load(path.to_str().unwrap(), true).unwrap();
        assert_eq!(config.db_server, "db.example.com");
        assert_eq!(config.db_port, 5555);
        assert_eq!(config.max_report_size, 10);
        assert_eq!(config.database, "rteval");
    }

    #[test]
    fn malformed_integer_key_is_a_named_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rteval.conf");
        std::fs::write(&path, "[xmlrpc_parser]\ndb_port=not-a-number\n").unwrap();

        let err = Config::load(path.to_str().unwrap(), true).unwrap_err();
        match err {
            ConfigError::InvalidValue { key, .. } => assert_eq!(key, "db_port"),
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn cli_overrides_only_apply_supplied_fields() {
        let mut config = Config::default();
        let overrides = CliOverrides {
            daemon: false,
            log_dest: None,
            log_level: Some("debug".to_string()),
            threads: None,
        };
        config.apply_overrides(&overrides);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.threads, 4);
    }
}
