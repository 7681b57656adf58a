use std::time::Duration;

use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::DatabaseConfig;

/// Errors from DatabaseManager and the repositories built on it
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Filter(#[from] crate::filter::FilterError),

    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Role the user-scoped client switches to so row-level security applies
const RLS_ROLE: &str = "authenticated";

/// Owns the connection pool and hands out the two client variants:
/// the service client (raw pool, bypasses RLS) and the user-scoped client
/// (a transaction carrying the caller's JWT claims).
#[derive(Clone)]
pub struct DatabaseManager {
    pool: PgPool,
}

impl DatabaseManager {
    /// Connect eagerly and fail if the database is unreachable
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let url = Self::validate_url(&config.url)?;
        let pool = Self::pool_options(config).connect(&url).await?;
        info!("Connected database pool (max {} connections)", config.max_connections);
        Ok(Self { pool })
    }

    /// Build the pool without connecting; connections open on first use
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let url = Self::validate_url(&config.url)?;
        let pool = Self::pool_options(config).connect_lazy(&url)?;
        Ok(Self { pool })
    }

    fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
    }

    fn validate_url(raw: &str) -> Result<String, DatabaseError> {
        if raw.trim().is_empty() {
            return Err(DatabaseError::ConfigMissing("DATABASE_URL"));
        }
        let url = url::Url::parse(raw).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        match url.scheme() {
            "postgres" | "postgresql" => Ok(url.into()),
            _ => Err(DatabaseError::InvalidDatabaseUrl),
        }
    }

    /// Service client. Bypasses row-level security; use for privileged
    /// operations such as permission lookups and background sync.
    pub fn service(&self) -> &PgPool {
        &self.pool
    }

    /// User-scoped client. Opens a transaction, publishes the caller's claims
    /// as `request.jwt.claims` and switches to the RLS role. The caller must
    /// commit; dropping the transaction rolls back.
    pub async fn user_scope(
        &self,
        claims: &Value,
    ) -> Result<Transaction<'static, Postgres>, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT set_config('request.jwt.claims', $1, true)")
            .bind(claims.to_string())
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("SET LOCAL ROLE {}", RLS_ROLE))
            .execute(&mut *tx)
            .await?;

        debug!("Opened user-scoped transaction for {}", claims["sub"]);
        Ok(tx)
    }

    /// Privileged transaction without RLS
    pub async fn service_tx(&self) -> Result<Transaction<'static, Postgres>, DatabaseError> {
        Ok(self.pool.begin().await?)
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Apply the SQL migrations embedded from `migrations/`
    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Close the pool (e.g., on shutdown)
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Closed database pool");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_database_urls() {
        assert!(DatabaseManager::validate_url("postgres://u:p@localhost:5432/crewplan").is_ok());
        assert!(DatabaseManager::validate_url("postgresql://localhost/crewplan").is_ok());
        assert!(matches!(
            DatabaseManager::validate_url("mysql://localhost/crewplan"),
            Err(DatabaseError::InvalidDatabaseUrl)
        ));
        assert!(matches!(
            DatabaseManager::validate_url("  "),
            Err(DatabaseError::ConfigMissing("DATABASE_URL"))
        ));
        assert!(matches!(
            DatabaseManager::validate_url("not a url"),
            Err(DatabaseError::InvalidDatabaseUrl)
        ));
    }

    #[tokio::test]
    async fn lazy_pool_does_not_connect() {
        let config = DatabaseConfig {
            url: "postgres://nobody@127.0.0.1:1/none".to_string(),
            max_connections: 1,
            acquire_timeout_secs: 1,
            run_migrations: false,
            enable_query_logging: false,
        };
        let db = DatabaseManager::connect_lazy(&config).unwrap();
        assert!(db.health_check().await.is_err());
    }
}
