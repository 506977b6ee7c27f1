//! Connection pool utilities

use crate::config::ConnectionConfig;
use crate::error::{QbError, QbResult};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use tokio_postgres::NoTls;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PoolKey {
    server: String,
    user: String,
    database: String,
}

impl PoolKey {
    fn of(config: &ConnectionConfig) -> Self {
        Self {
            server: config.server.clone(),
            user: config.user.clone(),
            database: config.database.clone(),
        }
    }
}

/// Create a new connection pool for `config`.
///
/// Uses `NoTls`; connections are opened lazily on first use.
pub fn create_pool(config: &ConnectionConfig) -> QbResult<Pool> {
    let mut pg_config = tokio_postgres::Config::new();
    pg_config.host(&config.server);
    if !config.database.is_empty() {
        pg_config.dbname(&config.database);
    }
    if !config.user.is_empty() {
        pg_config.user(&config.user);
    }
    if !config.password.is_empty() {
        pg_config.password(&config.password);
    }
    if let Some(port) = config.options.port {
        pg_config.port(port);
    }

    let mgr = Manager::from_config(pg_config, NoTls, default_manager_config());
    Pool::builder(mgr)
        .max_size(config.options.max_size)
        .build()
        .map_err(|e| QbError::Pool(e.to_string()))
}

/// Return the process-wide pool for `(server, user, database)`, creating it on first use.
///
/// Later calls with the same key reuse the first pool even if other options differ.
pub fn cached_pool(config: &ConnectionConfig) -> QbResult<Pool> {
    static POOLS: OnceLock<Mutex<HashMap<PoolKey, Pool>>> = OnceLock::new();
    let pools = POOLS.get_or_init(|| Mutex::new(HashMap::new()));
    let mut pools = pools
        .lock()
        .map_err(|_| QbError::Pool("pool cache poisoned".to_string()))?;

    let key = PoolKey::of(config);
    if let Some(pool) = pools.get(&key) {
        return Ok(pool.clone());
    }

    let pool = create_pool(config)?;
    tracing::debug!(
        target: "selectqb.pool",
        server = %key.server,
        user = %key.user,
        database = %key.database,
        max_size = config.options.max_size,
        "created connection pool"
    );
    pools.insert(key, pool.clone());
    Ok(pool)
}

fn default_manager_config() -> ManagerConfig {
    ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_is_cached_per_key() {
        let first = ConnectionConfig::new()
            .server("cache-test.invalid")
            .database("a")
            .max_pool_size(3);
        let same_key = first.clone().max_pool_size(9);
        let other_db = first.clone().database("b").max_pool_size(5);

        assert_eq!(cached_pool(&first).unwrap().status().max_size, 3);
        assert_eq!(cached_pool(&same_key).unwrap().status().max_size, 3);
        assert_eq!(cached_pool(&other_db).unwrap().status().max_size, 5);
    }
}
