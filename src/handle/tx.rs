use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::any::{AnyArguments, AnyQueryResult, AnyRow};
use sqlx::{Any, AnyConnection, Transaction};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::conn::ConnState;
use super::{Handle, exec};
use crate::context::Context;
use crate::row::Row;
use crate::services::error::{Error, Result};

enum TxState {
    /// Transaction on a connection checked out of a pool; sqlx rolls it back on drop.
    Pooled(Transaction<'static, Any>),
    /// Transaction on a dedicated connection, holding that connection until it ends.
    Dedicated(OwnedMutexGuard<ConnState>),
    Done,
}

impl TxState {
    fn conn(&mut self) -> Result<&mut AnyConnection> {
        match self {
            TxState::Pooled(tx) => Ok(&mut **tx),
            TxState::Dedicated(state) => Ok(state.conn()),
            TxState::Done => Err(Error::TxDone),
        }
    }
}

/// Handle for an open transaction.
///
/// Clones share the same transaction. Once it has been committed or rolled
/// back every further statement fails with [`Error::TxDone`].
///
/// A transaction runs on a single connection. Statements from concurrent
/// tasks are serialized, but interleaving them is the caller's problem.
/// A transaction handle cannot begin another transaction.
#[derive(Clone)]
pub struct TxHandle {
    state: Arc<Mutex<TxState>>,
}

impl TxHandle {
    fn from_state(state: TxState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub(crate) fn pooled(tx: Transaction<'static, Any>) -> Self {
        Self::from_state(TxState::Pooled(tx))
    }

    pub(crate) fn dedicated(conn: OwnedMutexGuard<ConnState>) -> Self {
        Self::from_state(TxState::Dedicated(conn))
    }

    async fn take(&self) -> TxState {
        std::mem::replace(&mut *self.state.lock().await, TxState::Done)
    }

    pub async fn commit(&self) -> Result<()> {
        match self.take().await {
            TxState::Pooled(tx) => tx.commit().await?,
            TxState::Dedicated(mut state) => {
                exec::raw(state.conn(), "COMMIT").await?;
                state.tx_open = false;
            }
            TxState::Done => return Err(Error::TxDone),
        }
        log::debug!("committed transaction");
        Ok(())
    }

    pub async fn rollback(&self) -> Result<()> {
        match self.take().await {
            TxState::Pooled(tx) => tx.rollback().await?,
            TxState::Dedicated(mut state) => {
                exec::raw(state.conn(), "ROLLBACK").await?;
                state.tx_open = false;
            }
            TxState::Done => return Err(Error::TxDone),
        }
        log::debug!("rolled back transaction");
        Ok(())
    }

    /// Whether the transaction has been committed or rolled back.
    pub async fn is_done(&self) -> bool {
        matches!(*self.state.lock().await, TxState::Done)
    }
}

impl fmt::Debug for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxHandle").finish_non_exhaustive()
    }
}

#[async_trait]
impl Handle for TxHandle {
    async fn execute<'q>(
        &self,
        _ctx: &Context,
        query: &'q str,
        args: AnyArguments<'q>,
    ) -> Result<AnyQueryResult> {
        let mut state = self.state.lock().await;
        exec::execute(state.conn()?, query, args).await
    }

    async fn query<'q>(
        &self,
        _ctx: &Context,
        query: &'q str,
        args: AnyArguments<'q>,
    ) -> Result<Vec<AnyRow>> {
        let mut state = self.state.lock().await;
        exec::fetch_all(state.conn()?, query, args).await
    }

    async fn query_row<'q>(&self, _ctx: &Context, query: &'q str, args: AnyArguments<'q>) -> Row {
        let mut state = self.state.lock().await;
        match state.conn() {
            Ok(conn) => Row::new(exec::fetch_optional(conn, query, args).await),
            Err(e) => Row::from_err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::handle::{BeginTx, PoolHandle, TxOptions};
    use crate::test_support::{memory_pool, seed_accounts};

    async fn begin() -> (PoolHandle, TxHandle) {
        let pool = memory_pool().await;
        seed_accounts(&pool).await;
        let handle = PoolHandle::new(pool);
        let tx = handle
            .begin_tx(&Context::new(), &TxOptions::default())
            .await
            .unwrap();
        (handle, tx)
    }

    async fn balance(handle: &PoolHandle, id: i64) -> i64 {
        handle
            .query_row(
                &Context::new(),
                "SELECT balance FROM accounts WHERE id = ?",
                args![id].unwrap(),
            )
            .await
            .get(0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_terminated_transaction_refuses_statements() {
        let (handle, tx) = begin().await;
        let ctx = Context::new();
        let clone = tx.clone();

        tx.execute(&ctx, "UPDATE accounts SET balance = 0 WHERE id = ?", args![1_i64].unwrap())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert!(clone.is_done().await);
        assert!(matches!(
            clone.execute(&ctx, "DELETE FROM accounts", args!().unwrap()).await,
            Err(Error::TxDone)
        ));
        assert!(matches!(
            clone.query(&ctx, "SELECT id FROM accounts", args!().unwrap()).await,
            Err(Error::TxDone)
        ));
        assert!(matches!(
            clone.query_row(&ctx, "SELECT 1", args!().unwrap()).await.err(),
            Some(Error::TxDone)
        ));
        assert!(matches!(clone.commit().await, Err(Error::TxDone)));
        assert!(matches!(clone.rollback().await, Err(Error::TxDone)));

        assert_eq!(balance(&handle, 1).await, 0);
    }

    #[tokio::test]
    async fn test_rollback_discards_changes() {
        let (handle, tx) = begin().await;
        let ctx = Context::new();

        tx.execute(&ctx, "UPDATE accounts SET balance = 0 WHERE id = ?", args![2_i64].unwrap())
            .await
            .unwrap();
        let seen: i64 = tx
            .query_row(&ctx, "SELECT balance FROM accounts WHERE id = ?", args![2_i64].unwrap())
            .await
            .get(0)
            .unwrap();
        assert_eq!(seen, 0);

        tx.rollback().await.unwrap();
        assert_eq!(balance(&handle, 2).await, 20);
    }

    #[tokio::test]
    async fn test_transaction_cannot_begin_another() {
        let (_handle, tx) = begin().await;
        assert!(tx.transactional().is_none());
        tx.rollback().await.unwrap();
    }
}
