use log::info;
use sqlx::postgres::PgPoolOptions;
use sqlx::migrate::MigrateError;
use sqlx::PgPool;

use crate::config::AppConfig;

/// Builds the shared connection pool. Called once at startup.
pub async fn init_db_pool(config: &AppConfig) -> Result<PgPool, sqlx::Error> {
    info!("Connecting to database");
    PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations applied");
    Ok(())
}
