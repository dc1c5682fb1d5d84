//! Database module
//!
//! Connection and schema checks. The schema itself lives in raw SQL files under
//! `migrations/`.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Tables the service reads or writes
const REQUIRED_TABLES: [&str; 8] = [
    "branches",
    "users",
    "auth_tokens",
    "accounts",
    "cards",
    "transfers",
    "loans",
    "payments",
];

/// Open a connection pool
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Verify database connectivity
pub async fn verify_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Check if required tables exist
pub async fn check_schema(pool: &PgPool) -> Result<bool, sqlx::Error> {
    for table in REQUIRED_TABLES {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
            )
            "#,
        )
        .bind(table)
        .fetch_one(pool)
        .await?;

        if !exists {
            tracing::error!("Required table '{}' does not exist", table);
            return Ok(false);
        }
    }

    let branches: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM branches")
        .fetch_one(pool)
        .await?;
    if branches == 0 {
        tracing::warn!("No branches configured; employees cannot be assigned yet");
    }

    Ok(true)
}
