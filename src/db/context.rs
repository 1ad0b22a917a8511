//! Source/target connection pool pair
//!
//! Both catalogs are reached through one explicit context object built at
//! startup and passed to every component that needs them.

use std::time::Duration;

use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use tracing::info;

use crate::config::{DatabaseConfig, DbConnection};
use crate::error::{Error, Result};

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_LIFETIME: Duration = Duration::from_secs(3600);

/// The pooled source and target database handles
#[derive(Debug, Clone)]
pub struct DbContext {
    pub source: MySqlPool,
    pub target: MySqlPool,
}

impl DbContext {
    /// Connect both pools and verify each with a probe query
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let source = connect_pool(&config.source).await.map_err(|e| {
            Error::Connection(format!("failed to connect to source database: {}", e))
        })?;
        let target = connect_pool(&config.target).await.map_err(|e| {
            Error::Connection(format!("failed to connect to target database: {}", e))
        })?;

        Ok(Self { source, target })
    }
}

/// Connect a single pool with the standard pool settings
pub async fn connect_pool(conn: &DbConnection) -> Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(conn.pool_size.unwrap_or(10))
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .max_lifetime(MAX_LIFETIME)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                // Legacy rows may carry zero dates; keep reads from failing on them.
                sqlx::query("SET SESSION sql_mode = 'ALLOW_INVALID_DATES'")
                    .execute(conn)
                    .await?;
                Ok(())
            })
        })
        .connect(&conn.url())
        .await?;

    sqlx::query("SELECT 1").fetch_one(&pool).await?;

    info!(
        host = %conn.host,
        port = conn.port,
        database = %conn.database,
        "Connected to MySQL"
    );

    Ok(pool)
}
