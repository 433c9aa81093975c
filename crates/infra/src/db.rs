//! Database connection and migrations.

use sqlx::PgPool;
use sqlx::migrate::MigrateError;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::config::PostgresSettings;

/// Connect to Postgres, retrying up to `connect_retries` times.
pub async fn connect(settings: &PostgresSettings) -> Result<PgPool, sqlx::Error> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout())
            .connect(&settings.dsn)
            .await;

        match result {
            Ok(pool) => {
                info!(attempt, "connected to postgres");
                return Ok(pool);
            }
            Err(err) if attempt <= settings.connect_retries => {
                warn!(
                    attempt,
                    max_retries = settings.connect_retries,
                    error = %err,
                    "postgres connection failed; retrying"
                );
                tokio::time::sleep(settings.retry_delay()).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Apply the embedded migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("database migrations applied");
    Ok(())
}
