//! Postgres pool for `PgStore`

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::fmt;
use std::time::Duration;
use tracing::{error, info};

use crate::config::DatabaseConfig;

/// Idle connections are recycled after this long
const IDLE_TIMEOUT: Duration = Duration::from_secs(600);
/// Connections are replaced after this long regardless of use
const MAX_LIFETIME: Duration = Duration::from_secs(1800);
/// Bound on the startup `SELECT 1`
const VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Pool settings derived from the service's database configuration
#[derive(Clone)]
pub struct DbConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
}

impl From<&DatabaseConfig> for DbConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            database_url: config.url.clone(),
            // a pool never holds fewer connections than it keeps warm
            max_connections: config.max_connections.max(config.min_connections).max(1),
            min_connections: config.min_connections,
            acquire_timeout: Duration::from_secs(config.acquire_timeout_secs),
        }
    }
}

// the URL carries credentials
impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("database_url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

/// Open the pool and make sure Postgres answers before serving traffic
pub async fn create_pool(config: DbConfig) -> Result<PgPool, sqlx::Error> {
    info!(config = ?config, "Opening database pool");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(IDLE_TIMEOUT)
        .max_lifetime(MAX_LIFETIME)
        .connect(&config.database_url)
        .await?;

    let verified = tokio::time::timeout(VERIFY_TIMEOUT, sqlx::query("SELECT 1").execute(&pool))
        .await
        .map_err(|_| {
            sqlx::Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "database did not answer SELECT 1 in time",
            ))
        })?;
    if let Err(e) = verified {
        error!(error = %e, "Database pool opened but SELECT 1 failed");
        return Err(e);
    }

    info!("Database pool ready");
    Ok(pool)
}

/// Apply the schema migrations bundled with the service
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations applied");
    Ok(())
}
