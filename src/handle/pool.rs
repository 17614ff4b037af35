use async_trait::async_trait;
use sqlx::AnyPool;
use sqlx::any::{AnyArguments, AnyQueryResult, AnyRow};

use super::{BeginTx, Handle, TxHandle, TxOptions, exec};
use crate::context::Context;
use crate::row::Row;
use crate::services::error::Result;

/// Handle backed by a connection pool. Every statement checks out a
/// connection for its own duration, so concurrent callers are fine.
#[derive(Debug, Clone)]
pub struct PoolHandle {
    pool: AnyPool,
}

impl PoolHandle {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }
}

impl From<AnyPool> for PoolHandle {
    fn from(pool: AnyPool) -> Self {
        Self::new(pool)
    }
}

#[async_trait]
impl Handle for PoolHandle {
    async fn execute<'q>(
        &self,
        _ctx: &Context,
        query: &'q str,
        args: AnyArguments<'q>,
    ) -> Result<AnyQueryResult> {
        exec::execute(&self.pool, query, args).await
    }

    async fn query<'q>(
        &self,
        _ctx: &Context,
        query: &'q str,
        args: AnyArguments<'q>,
    ) -> Result<Vec<AnyRow>> {
        exec::fetch_all(&self.pool, query, args).await
    }

    async fn query_row<'q>(&self, _ctx: &Context, query: &'q str, args: AnyArguments<'q>) -> Row {
        Row::new(exec::fetch_optional(&self.pool, query, args).await)
    }

    fn transactional(&self) -> Option<&dyn BeginTx> {
        Some(self)
    }
}

#[async_trait]
impl BeginTx for PoolHandle {
    async fn begin_tx(&self, _ctx: &Context, opts: &TxOptions) -> Result<TxHandle> {
        let mut tx = self.pool.begin().await?;
        if let Some(statement) = opts.set_statement() {
            // dropping `tx` on failure rolls it back
            exec::raw(&mut *tx, &statement).await?;
        }
        log::debug!("began pooled transaction");
        Ok(TxHandle::pooled(tx))
    }
}
