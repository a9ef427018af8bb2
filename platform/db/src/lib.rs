//! Database primitives: connection settings, setup and teardown.

use sea_orm::{Database, DatabaseConnection};
use thiserror::Error;
use tracing::info;

/// Shared connection handle alias.
pub type DbPool = DatabaseConnection;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed to connect to {url}: {source}")]
    Connect { url: String, source: sea_orm::DbErr },
    #[error("failed to close database connection: {0}")]
    Close(sea_orm::DbErr),
}

pub type DbResult<T> = Result<T, DbError>;

/// Environment-driven connection settings.
#[derive(Clone, Debug)]
pub struct DatabaseSettings {
    pub url: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            // mode=rwc creates the database file on first run.
            url: "sqlite://staffdir.sqlite?mode=rwc".to_string(),
        }
    }
}

impl DatabaseSettings {
    pub fn from_env() -> Self {
        match std::env::var("DATABASE_URL") {
            Ok(url) => Self { url },
            Err(_) => Self::default(),
        }
    }
}

pub async fn connect(settings: &DatabaseSettings) -> DbResult<DbPool> {
    let pool = Database::connect(&settings.url)
        .await
        .map_err(|source| DbError::Connect {
            url: settings.url.clone(),
            source,
        })?;
    info!(url = %settings.url, "database connected");
    Ok(pool)
}

pub async fn disconnect(pool: DbPool) -> DbResult<()> {
    pool.close().await.map_err(DbError::Close)
}
