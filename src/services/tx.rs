//! Transaction scopes
//!
//! [`run_in_transaction`] begins a transaction on the handle found in the
//! context, runs the work unit once with a derived context carrying the
//! transaction, and then commits or rolls back:
//!
//! - `Ok` commits; a failed commit is returned to the caller.
//! - `Err(Error::Abort)` rolls back and returns `Ok(())`.
//! - any other error rolls back and is returned unchanged.
//!
//! Rollback failures are logged and otherwise ignored, since the caller
//! already gets either the work unit's error or the abort it asked for.
//! Nothing is retried, and there are no savepoints: a context that already
//! carries a transaction fails with [`Error::UnsupportedOperation`].
//!
//! ```ignore
//! dbscope::run_in_transaction(&ctx, |ctx| async move {
//!     accounts::debit(&ctx, from, amount).await?;
//!     accounts::credit(&ctx, to, amount).await?;
//!     Ok(())
//! })
//! .await?;
//! ```
//!
//! The transaction handle runs on a single connection. Fanning out queries
//! on it from concurrent tasks inside the work unit is on the caller.

use std::future::Future;

use crate::context::Context;
use crate::handle::TxOptions;
use crate::services::db::{attach, resolve};
use crate::services::error::{Error, Result};

/// Run `work` inside a transaction with default options.
pub async fn run_in_transaction<F, Fut>(ctx: &Context, work: F) -> Result<()>
where
    F: FnOnce(Context) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    run_in_transaction_with(ctx, &TxOptions::default(), work).await
}

/// Run `work` inside a transaction begun with `opts`.
pub async fn run_in_transaction_with<F, Fut>(ctx: &Context, opts: &TxOptions, work: F) -> Result<()>
where
    F: FnOnce(Context) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    scoped(ctx, opts, work).await.map(|_| ())
}

/// Run `work` inside a transaction and hand back what it produced:
/// `Some(value)` once committed, `None` if the work unit aborted.
pub async fn run_in_transaction_returning<T, F, Fut>(ctx: &Context, work: F) -> Result<Option<T>>
where
    F: FnOnce(Context) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    scoped(ctx, &TxOptions::default(), work).await
}

async fn scoped<T, F, Fut>(ctx: &Context, opts: &TxOptions, work: F) -> Result<Option<T>>
where
    F: FnOnce(Context) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let db = resolve(ctx).ok_or(Error::MissingHandle)?;
    let txer = db.transactional().ok_or(Error::UnsupportedOperation)?;

    let tx = txer.begin_tx(ctx, opts).await?;

    match work(attach(ctx, tx.clone())).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(Some(value))
        }
        Err(err) => {
            if let Err(e) = tx.rollback().await {
                log::warn!("rollback after failed work unit: {}", e);
            }
            if err.is_abort() { Ok(None) } else { Err(err) }
        }
    }
}
