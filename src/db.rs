//! Database connection pool and migration management.

use sqlx::{Pool, Postgres};

/// Type alias for the PostgreSQL connection pool shared by handlers and jobs.
pub type DbPool = Pool<Postgres>;

/// Create a new PostgreSQL connection pool.
///
/// Connections are created lazily and reused across requests and job
/// invocations; each handler or job gets its own connection (or transaction)
/// from the pool for the duration of one call.
///
/// # Errors
///
/// Returns an error if the connection string is invalid or the server is
/// unreachable.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Run database migrations from the `migrations/` directory.
///
/// Migrations are embedded at compile time and tracked in the
/// `_sqlx_migrations` table, so each file runs only once.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
