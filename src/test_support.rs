//! Shared fixtures for unit tests: an in-memory SQLite database behind sqlx's
//! `Any` driver.

use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;

use crate::context::Context;
use crate::services::db::query_row;

/// Single-connection pool, so every checkout sees the same in-memory database.
pub(crate) async fn memory_pool() -> AnyPool {
    sqlx::any::install_default_drivers();
    AnyPoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database")
}

pub(crate) async fn seed_accounts(pool: &AnyPool) {
    sqlx::query(
        r#"
        CREATE TABLE accounts (
            id INTEGER PRIMARY KEY,
            owner TEXT NOT NULL,
            balance INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .expect("Failed to create accounts");

    sqlx::query("INSERT INTO accounts (id, owner, balance) VALUES (1, 'alice', 10), (2, 'bob', 20)")
        .execute(pool)
        .await
        .expect("Failed to seed accounts");
}

pub(crate) async fn count_accounts(ctx: &Context) -> i64 {
    query_row(ctx, "SELECT COUNT(*) FROM accounts", crate::args!().unwrap())
        .await
        .get(0)
        .expect("Failed to count accounts")
}
