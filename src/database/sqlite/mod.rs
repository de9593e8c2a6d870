use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::config::Config;
use crate::database::sqlite::models::{IngestedSource, NewIngestedSource};
use crate::database::sqlite::queries::SourceQueries;


pub mod models;
pub mod queries;

pub use models::SourceKind;

pub type DbPool = Pool<Sqlite>;

/// Ledger of what each user has ingested
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[inline]
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    #[inline]
    pub async fn initialize_from_config(config: &Config) -> Result<Self> {
        let base_dir = config.get_base_dir();
        std::fs::create_dir_all(base_dir).with_context(|| {
            format!("Failed to create base directory: {}", base_dir.display())
        })?;

        Self::new(config.ledger_path()).await
    }

    #[inline]
    pub async fn record_source(&self, source: NewIngestedSource) -> Result<IngestedSource> {
        SourceQueries::record(&self.pool, source).await
    }

    #[inline]
    pub async fn get_source(&self, user_id: &str, source: &str) -> Result<Option<IngestedSource>> {
        SourceQueries::get_by_source(&self.pool, user_id, source).await
    }

    #[inline]
    pub async fn list_sources(&self, user_id: &str) -> Result<Vec<IngestedSource>> {
        SourceQueries::list_for_user(&self.pool, user_id).await
    }

    #[inline]
    pub async fn delete_user_sources(&self, user_id: &str) -> Result<u64> {
        SourceQueries::delete_for_user(&self.pool, user_id).await
    }
}
