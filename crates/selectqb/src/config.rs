//! Connection configuration with environment defaults.

use serde::Deserialize;

/// Environment variable holding the database host.
pub const ENV_SERVER: &str = "server";
/// Environment variable holding the database name.
pub const ENV_DATABASE: &str = "database";
/// Environment variable holding the login user.
pub const ENV_USER: &str = "user";
/// Environment variable holding the login password.
pub const ENV_PASSWORD: &str = "password";
/// Environment variable holding the database port.
pub const ENV_PORT: &str = "port";

const DEFAULT_SERVER: &str = "localhost";
const DEFAULT_MAX_POOL_SIZE: usize = 16;

/// Driver-specific options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolOptions {
    /// TCP port; `None` uses the driver default.
    pub port: Option<u16>,
    /// Maximum number of pooled connections.
    pub max_size: usize,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            port: None,
            max_size: DEFAULT_MAX_POOL_SIZE,
        }
    }
}

/// Where and as whom to connect.
///
/// Pools are cached per `(server, user, database)`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub server: String,
    pub database: String,
    pub user: String,
    pub password: String,
    pub options: PoolOptions,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            database: String::new(),
            user: String::new(),
            password: String::new(),
            options: PoolOptions::default(),
        }
    }
}

impl ConnectionConfig {
    /// Create a configuration with defaults (`localhost`, everything else empty).
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from the process environment.
    ///
    /// Unset or empty variables keep their defaults; an unparsable `port` is ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let mut config = Self::default();
        if let Some(server) = get(ENV_SERVER) {
            config.server = server;
        }
        if let Some(database) = get(ENV_DATABASE) {
            config.database = database;
        }
        if let Some(user) = get(ENV_USER) {
            config.user = user;
        }
        if let Some(password) = get(ENV_PASSWORD) {
            config.password = password;
        }
        config.options.port = get(ENV_PORT).and_then(|p| p.parse().ok());
        config
    }

    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into();
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.options.port = Some(port);
        self
    }

    pub fn max_pool_size(mut self, max_size: usize) -> Self {
        self.options.max_size = max_size.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ConnectionConfig::from_lookup(|_| None);
        assert_eq!(config.server, "localhost");
        assert_eq!(config.database, "");
        assert_eq!(config.user, "");
        assert_eq!(config.password, "");
        assert_eq!(config.options, PoolOptions::default());
    }

    #[test]
    fn test_lookup_overrides() {
        let env: HashMap<&str, &str> = [
            ("server", "db.internal"),
            ("database", "sales"),
            ("user", "reporter"),
            ("password", ""),
            ("port", "5433"),
        ]
        .into_iter()
        .collect();
        let config = ConnectionConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.server, "db.internal");
        assert_eq!(config.database, "sales");
        assert_eq!(config.user, "reporter");
        assert_eq!(config.password, "");
        assert_eq!(config.options.port, Some(5433));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ConnectionConfig =
            serde_json::from_str(r#"{ "database": "sales", "options": { "max_size": 4 } }"#)
                .unwrap();
        assert_eq!(config.server, "localhost");
        assert_eq!(config.database, "sales");
        assert_eq!(config.options.max_size, 4);
        assert_eq!(config.options.port, None);
    }
}
