use crate::error::DbError;
use dotenvy::dotenv;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::env;
use std::time::Duration;

/// Establishes a connection pool to the PostgreSQL database.
///
/// Reads `DATABASE_URL` from the environment (seeded from a `.env` file when
/// one is present) and delegates to [`connect_to`]. The returned pool is the
/// connection provider shared by every request handler.
pub async fn connect() -> Result<PgPool, DbError> {
    // Load environment variables from the .env file when present.
    dotenv().ok();

    let database_url = env::var("DATABASE_URL")
        .map_err(|_e| DbError::ConnectionConfig("DATABASE_URL must be set.".to_string()))?;

    connect_to(&database_url).await
}

/// Builds the bounded pool for a given connection string.
///
/// The acquire timeout doubles as the connect-timeout half of the
/// "timeout behaves like cancellation" rule: a request that cannot get a
/// connection inside the window fails with a cancellation-class error.
pub async fn connect_to(database_url: &str) -> Result<PgPool, DbError> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
        .map_err(DbError::Connection)?;

    Ok(pool)
}

/// A utility function to run database migrations automatically.
///
/// This is useful for ensuring the database schema is up-to-date when the application starts,
/// which is especially important in production deployments.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    // Use a relative path from the crate root
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
