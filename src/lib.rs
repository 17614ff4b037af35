//! Database handles carried in a request-scoped [`Context`].
//!
//! Code that touches the database takes a `&Context` instead of a pool or a
//! transaction. The context resolves to whatever handle was attached last:
//! the pool at startup, or a transaction inside [`run_in_transaction`].
//!
//! ```ignore
//! let ctx = DbConfig::from_env().connect_context().await?;
//!
//! run_in_transaction(&ctx, |ctx| async move {
//!     execute(&ctx, "UPDATE accounts SET balance = balance - $1 WHERE id = $2", args![10_i64, 1_i64]?)
//!         .await?;
//!     let balance: i64 = query_row(&ctx, "SELECT balance FROM accounts WHERE id = $1", args![1_i64]?)
//!         .await
//!         .get(0)?;
//!     if balance < 0 {
//!         return Err(Error::abort());
//!     }
//!     Ok(())
//! })
//! .await?;
//! ```

pub mod config;
pub mod constants;
pub mod context;
pub mod handle;
#[cfg(feature = "axum")]
pub mod middleware;
pub mod row;
pub mod services;

#[cfg(test)]
mod test_support;

pub use sqlx;

pub use config::DbConfig;
pub use context::Context;
pub use handle::{BeginTx, ConnHandle, Handle, IsolationLevel, PoolHandle, TxHandle, TxOptions};
pub use row::Row;
pub use services::db::{attach, attach_shared, execute, query, query_row, resolve};
pub use services::error::{Error, Result};
#[cfg(feature = "axum")]
pub use services::error::LogErr;
pub use services::tx::{run_in_transaction, run_in_transaction_returning, run_in_transaction_with};
