//! PostgreSQL connection helpers.

use sqlx::PgPool;

/// Round-trip a trivial query to confirm the pool can reach the database.
pub async fn health_check(pool: &PgPool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}
