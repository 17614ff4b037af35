//! Database handles
//!
//! A [`Handle`] is anything that can run statements: a pool ([`PoolHandle`]),
//! a dedicated connection ([`ConnHandle`]) or an open transaction
//! ([`TxHandle`]). Beginning a transaction is a separate capability,
//! [`BeginTx`], reached through [`Handle::transactional`]. Transactions don't
//! expose it, which is how nesting is refused.
//!
//! All handles speak sqlx's `Any` driver, so the same code path serves
//! Postgres in production and SQLite in tests.

mod conn;
mod exec;
mod pool;
mod tx;

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::any::{AnyArguments, AnyQueryResult, AnyRow};

use crate::context::Context;
use crate::row::Row;
use crate::services::error::Result;

pub use conn::ConnHandle;
pub use pool::PoolHandle;
pub use tx::TxHandle;

/// Capability to run statements.
///
/// Errors are returned exactly as the driver reported them.
#[async_trait]
pub trait Handle: Send + Sync {
    /// Execute a statement without returning any rows.
    async fn execute<'q>(
        &self,
        ctx: &Context,
        query: &'q str,
        args: AnyArguments<'q>,
    ) -> Result<AnyQueryResult>;

    /// Execute a query that returns rows, typically a SELECT.
    async fn query<'q>(
        &self,
        ctx: &Context,
        query: &'q str,
        args: AnyArguments<'q>,
    ) -> Result<Vec<AnyRow>>;

    /// Execute a query expected to return at most one row. Errors are
    /// deferred until a value is read from the returned [`Row`]; extra rows
    /// are discarded.
    async fn query_row<'q>(&self, ctx: &Context, query: &'q str, args: AnyArguments<'q>) -> Row;

    /// The transaction-initiation capability, if this handle has one.
    fn transactional(&self) -> Option<&dyn BeginTx> {
        None
    }
}

/// Capability to begin a transaction.
#[async_trait]
pub trait BeginTx: Send + Sync {
    async fn begin_tx(&self, ctx: &Context, opts: &TxOptions) -> Result<TxHandle>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Options for a new transaction. The default leaves everything to the driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TxOptions {
    pub isolation: Option<IsolationLevel>,
    pub read_only: bool,
}

impl TxOptions {
    /// `SET TRANSACTION` statement applying these options, or `None` for the
    /// defaults. Uses Postgres syntax; SQLite only accepts defaults.
    pub(crate) fn set_statement(&self) -> Option<String> {
        let mut modes = Vec::new();
        if let Some(level) = self.isolation {
            modes.push(format!("ISOLATION LEVEL {}", level.as_sql()));
        }
        if self.read_only {
            modes.push("READ ONLY".to_string());
        }

        if modes.is_empty() {
            None
        } else {
            Some(format!("SET TRANSACTION {}", modes.join(", ")))
        }
    }
}
