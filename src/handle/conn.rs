use std::sync::Arc;

use async_trait::async_trait;
use sqlx::any::{AnyArguments, AnyQueryResult, AnyRow};
use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyConnection, AnyPool, Connection};
use tokio::sync::Mutex;

use super::{BeginTx, Handle, TxHandle, TxOptions, exec};
use crate::context::Context;
use crate::row::Row;
use crate::services::error::Result;

enum Conn {
    Pooled(PoolConnection<Any>),
    Direct(AnyConnection),
}

/// State of a dedicated connection, shared between its [`ConnHandle`] and a
/// transaction begun on it.
pub(crate) struct ConnState {
    conn: Conn,
    /// A transaction was begun on this connection and not terminated yet.
    pub(crate) tx_open: bool,
}

impl ConnState {
    pub(crate) fn conn(&mut self) -> &mut AnyConnection {
        match &mut self.conn {
            Conn::Pooled(conn) => &mut **conn,
            Conn::Direct(conn) => conn,
        }
    }

    /// Roll back a transaction that was abandoned without commit or rollback,
    /// e.g. because the future driving it was dropped.
    async fn settle(&mut self) {
        if !self.tx_open {
            return;
        }
        if let Err(e) = exec::raw(self.conn(), "ROLLBACK").await {
            log::warn!("rollback of abandoned transaction failed: {}", e);
        }
        self.tx_open = false;
    }
}

/// Handle backed by a single connection, either checked out of a pool or
/// opened directly.
///
/// Statements are serialized. While a transaction begun on this handle is in
/// flight it owns the connection, and statements issued through the handle
/// itself wait until the transaction ends.
#[derive(Clone)]
pub struct ConnHandle {
    state: Arc<Mutex<ConnState>>,
}

impl ConnHandle {
    fn from_conn(conn: Conn) -> Self {
        Self {
            state: Arc::new(Mutex::new(ConnState {
                conn,
                tx_open: false,
            })),
        }
    }

    /// Open a standalone connection, outside of any pool.
    pub async fn connect(url: &str) -> Result<Self> {
        sqlx::any::install_default_drivers();
        let conn = AnyConnection::connect(url).await?;
        Ok(Self::from_conn(Conn::Direct(conn)))
    }

    /// Check a connection out of `pool` and keep it for the handle's lifetime.
    pub async fn acquire(pool: &AnyPool) -> Result<Self> {
        let conn = pool.acquire().await?;
        Ok(Self::from_conn(Conn::Pooled(conn)))
    }
}

impl From<AnyConnection> for ConnHandle {
    fn from(conn: AnyConnection) -> Self {
        Self::from_conn(Conn::Direct(conn))
    }
}

impl From<PoolConnection<Any>> for ConnHandle {
    fn from(conn: PoolConnection<Any>) -> Self {
        Self::from_conn(Conn::Pooled(conn))
    }
}

#[async_trait]
impl Handle for ConnHandle {
    async fn execute<'q>(
        &self,
        _ctx: &Context,
        query: &'q str,
        args: AnyArguments<'q>,
    ) -> Result<AnyQueryResult> {
        let mut state = self.state.lock().await;
        state.settle().await;
        exec::execute(state.conn(), query, args).await
    }

    async fn query<'q>(
        &self,
        _ctx: &Context,
        query: &'q str,
        args: AnyArguments<'q>,
    ) -> Result<Vec<AnyRow>> {
        let mut state = self.state.lock().await;
        state.settle().await;
        exec::fetch_all(state.conn(), query, args).await
    }

    async fn query_row<'q>(&self, _ctx: &Context, query: &'q str, args: AnyArguments<'q>) -> Row {
        let mut state = self.state.lock().await;
        state.settle().await;
        Row::new(exec::fetch_optional(state.conn(), query, args).await)
    }

    fn transactional(&self) -> Option<&dyn BeginTx> {
        Some(self)
    }
}

#[async_trait]
impl BeginTx for ConnHandle {
    async fn begin_tx(&self, _ctx: &Context, opts: &TxOptions) -> Result<TxHandle> {
        let mut state = self.state.clone().lock_owned().await;
        state.settle().await;

        exec::raw(state.conn(), "BEGIN").await?;
        state.tx_open = true;
        if let Some(statement) = opts.set_statement() {
            // the open transaction is rolled back on the next use of the connection
            exec::raw(state.conn(), &statement).await?;
        }

        log::debug!("began transaction on dedicated connection");
        Ok(TxHandle::dedicated(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::handle::IsolationLevel;
    use crate::services::error::Error;

    async fn events_conn() -> ConnHandle {
        let conn = ConnHandle::connect("sqlite::memory:").await.unwrap();
        conn.execute(
            &Context::new(),
            "CREATE TABLE events (kind TEXT NOT NULL)",
            args!().unwrap(),
        )
        .await
        .unwrap();
        conn
    }

    async fn count_events(conn: &ConnHandle) -> i64 {
        conn.query_row(&Context::new(), "SELECT COUNT(*) FROM events", args!().unwrap())
            .await
            .get(0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_commit_keeps_rows_and_frees_connection() {
        let conn = events_conn().await;
        let ctx = Context::new();

        let tx = conn.begin_tx(&ctx, &TxOptions::default()).await.unwrap();
        tx.execute(&ctx, "INSERT INTO events (kind) VALUES (?)", args!["signup"].unwrap())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(count_events(&conn).await, 1);

        let again = conn.begin_tx(&ctx, &TxOptions::default()).await.unwrap();
        again.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_abandoned_transaction_rolls_back_on_next_use() {
        let conn = events_conn().await;
        let ctx = Context::new();

        let tx = conn.begin_tx(&ctx, &TxOptions::default()).await.unwrap();
        tx.execute(&ctx, "INSERT INTO events (kind) VALUES (?)", args!["lost"].unwrap())
            .await
            .unwrap();
        drop(tx);

        assert_eq!(count_events(&conn).await, 0);
    }

    #[tokio::test]
    async fn test_rejected_options_leave_connection_usable() {
        let conn = events_conn().await;
        let ctx = Context::new();
        let opts = TxOptions {
            isolation: Some(IsolationLevel::Serializable),
            read_only: false,
        };

        let res = conn.begin_tx(&ctx, &opts).await;
        assert!(matches!(res, Err(Error::Database(_))));

        conn.execute(&ctx, "INSERT INTO events (kind) VALUES (?)", args!["after"].unwrap())
            .await
            .unwrap();
        assert_eq!(count_events(&conn).await, 1);
    }

    #[tokio::test]
    async fn test_acquired_connection_is_pinned() {
        let pool = crate::test_support::memory_pool().await;
        let conn = ConnHandle::acquire(&pool).await.unwrap();
        let ctx = Context::new();

        conn.execute(&ctx, "CREATE TEMP TABLE scratch (n INTEGER)", args!().unwrap())
            .await
            .unwrap();
        conn.execute(&ctx, "INSERT INTO scratch (n) VALUES (?)", args![5_i64].unwrap())
            .await
            .unwrap();

        let n: i64 = conn
            .query_row(&ctx, "SELECT n FROM scratch", args!().unwrap())
            .await
            .get("n")
            .unwrap();
        assert_eq!(n, 5);
        assert_eq!(pool.num_idle(), 0);
    }
}
