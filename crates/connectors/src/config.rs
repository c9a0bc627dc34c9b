/// Connection parameters for a single Database Gateway.
///
/// Mirrors the `[xmlrpc_parser]` keys that name a database target; loading
/// and defaulting these from a config file is `engine-config`'s job.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub server: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl DatabaseConfig {
    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} password={}",
            self.server, self.port, self.database, self.username, self.password
        )
    }
}
