use std::sync::Arc;

use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use crate::config::Settings;
use crate::db::json_store::JsonFileStore;
use crate::db::pg_store::PgStore;
use crate::db::store::{RecordStore, Store, StoreError};

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    info!("Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    info!("Database connection established");

    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    info!("Running database migrations...");

    let migrations = [include_str!("../../migrations/001_collections.sql")];

    for (i, migration) in migrations.iter().enumerate() {
        info!("Running migration {}", i + 1);
        for statement in migration.split(';') {
            let statement = statement.trim();
            if !statement.is_empty() {
                if let Err(e) = sqlx::query(statement).execute(pool).await {
                    // Ignore "already exists" errors
                    let err_str = e.to_string();
                    if !err_str.contains("already exists") && !err_str.contains("duplicate key") {
                        return Err(e);
                    }
                }
            }
        }
    }

    info!("Migrations completed successfully");
    Ok(())
}

/// Build the record store selected by the settings: Postgres when
/// `DATABASE_URL` is set, JSON documents under `DATA_DIR` otherwise.
pub async fn open_store(settings: &Settings) -> Result<Store, StoreError> {
    let backend: Arc<dyn RecordStore> = match &settings.database_url {
        Some(url) => {
            let pool = create_pool(url).await?;
            run_migrations(&pool).await?;
            Arc::new(PgStore::new(pool))
        }
        None => Arc::new(JsonFileStore::open(&settings.data_dir).await?),
    };

    info!("Record store ready ({})", backend.backend_name());
    Ok(Store::new(backend))
}
