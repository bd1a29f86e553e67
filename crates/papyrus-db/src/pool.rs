//! PostgreSQL connection pool.
//!
//! The API and the worker share one pool. Sizing is read from the
//! environment so a deployment can run a small API next to a busy worker.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `DB_MAX_CONNECTIONS` | 10 |
//! | `DB_MIN_CONNECTIONS` | 1 |
//! | `DB_ACQUIRE_TIMEOUT_SECS` | 30 |
//! | `DB_IDLE_TIMEOUT_SECS` | 600 |

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, warn};

use papyrus_core::{Error, Result};

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_MIN_CONNECTIONS: u32 = 1;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// Connections are recycled after this long.
const MAX_LIFETIME: Duration = Duration::from_secs(30 * 60);

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Pool sizing and timeouts.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long a caller waits for a free connection.
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }
}

impl PoolConfig {
    /// Read the `DB_*` variables, falling back to defaults for unset or invalid values.
    pub fn from_env() -> Self {
        Self::default()
            .with_max_connections(env_or("DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS))
            .with_min_connections(env_or("DB_MIN_CONNECTIONS", DEFAULT_MIN_CONNECTIONS))
            .with_acquire_timeout(Duration::from_secs(env_or(
                "DB_ACQUIRE_TIMEOUT_SECS",
                DEFAULT_ACQUIRE_TIMEOUT_SECS,
            )))
            .with_idle_timeout(Duration::from_secs(env_or(
                "DB_IDLE_TIMEOUT_SECS",
                DEFAULT_IDLE_TIMEOUT_SECS,
            )))
    }

    /// At least one connection.
    pub fn with_max_connections(mut self, n: u32) -> Self {
        self.max_connections = n.max(1);
        self.min_connections = self.min_connections.min(self.max_connections);
        self
    }

    /// Never above `max_connections`.
    pub fn with_min_connections(mut self, n: u32) -> Self {
        self.min_connections = n.min(self.max_connections);
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }
}

/// Connect with [`PoolConfig::from_env`].
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    create_pool_with_config(database_url, PoolConfig::from_env()).await
}

pub async fn create_pool_with_config(database_url: &str, config: PoolConfig) -> Result<PgPool> {
    let start = Instant::now();
    debug!(
        subsystem = "db",
        component = "pool",
        op = "connect",
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        acquire_timeout_secs = config.acquire_timeout.as_secs(),
        "Opening connection pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(MAX_LIFETIME)
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "db",
        component = "pool",
        op = "connect",
        pool_size = pool.size(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Connection pool ready"
    );
    Ok(pool)
}

/// Log pool occupancy; warns when every connection is checked out.
pub fn log_pool_metrics(pool: &PgPool) {
    let size = pool.size();
    let idle = pool.num_idle();
    if size > 0 && idle == 0 {
        warn!(
            subsystem = "db",
            component = "pool",
            pool_size = size,
            "All pooled connections in use"
        );
    } else {
        debug!(
            subsystem = "db",
            component = "pool",
            pool_size = size,
            pool_idle = idle,
            "Pool occupancy"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.acquire_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_min_never_exceeds_max() {
        let config = PoolConfig::default()
            .with_min_connections(8)
            .with_max_connections(4);
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.min_connections, 4);

        let config = PoolConfig::default().with_min_connections(50);
        assert_eq!(config.min_connections, DEFAULT_MAX_CONNECTIONS);
    }

    #[test]
    fn test_zero_max_connections_is_raised() {
        assert_eq!(
            PoolConfig::default().with_max_connections(0).max_connections,
            1
        );
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        assert_eq!(env_or("PAPYRUS_TEST_UNSET_POOL_VAR", 7u32), 7);
    }
}
