//! Context-scoped database access
//!
//! A handle is attached to a [`Context`] once (at startup, or per request by
//! the axum middleware) and every data-access call below resolves it from
//! the context it is given, instead of taking a pool or transaction argument.
//!
//! # Usage Pattern
//!
//! ```ignore
//! use dbscope::{Context, args};
//!
//! pub async fn rename_user(ctx: &Context, user_id: i64, name: &str) -> dbscope::Result<()> {
//!     dbscope::execute(ctx, "UPDATE users SET name = $1 WHERE id = $2", args![name, user_id]?)
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! The same function runs against the pool or inside a transaction, depending
//! only on which handle the context carries:
//! - `rename_user(&ctx, id, name)` - uses the handle attached at startup
//! - inside `run_in_transaction(&ctx, |tx_ctx| ...)` - uses the transaction

use std::sync::Arc;

use sqlx::any::{AnyArguments, AnyQueryResult, AnyRow};

use crate::context::Context;
use crate::handle::Handle;
use crate::row::Row;
use crate::services::error::{Error, Result};

/// Context binding for the current handle. Only reachable through
/// [`attach`] and [`resolve`].
#[derive(Clone)]
struct Binding(Arc<dyn Handle>);

/// Return a new context carrying `handle`. `ctx` itself is left untouched.
pub fn attach<H>(ctx: &Context, handle: H) -> Context
where
    H: Handle + 'static,
{
    attach_shared(ctx, Arc::new(handle))
}

/// Like [`attach`], for a handle that is already shared.
pub fn attach_shared(ctx: &Context, handle: Arc<dyn Handle>) -> Context {
    ctx.with_value(Binding(handle))
}

/// Nearest handle bound in `ctx` or any of its ancestors.
pub fn resolve(ctx: &Context) -> Option<Arc<dyn Handle>> {
    ctx.value::<Binding>().map(|binding| binding.0.clone())
}

/// Execute a query without returning any rows.
pub async fn execute<'q>(
    ctx: &Context,
    query: &'q str,
    args: AnyArguments<'q>,
) -> Result<AnyQueryResult> {
    let db = resolve(ctx).ok_or(Error::MissingHandle)?;
    db.execute(ctx, query, args).await
}

/// Execute a query that returns rows, typically a SELECT.
pub async fn query<'q>(
    ctx: &Context,
    query: &'q str,
    args: AnyArguments<'q>,
) -> Result<Vec<AnyRow>> {
    let db = resolve(ctx).ok_or(Error::MissingHandle)?;
    db.query(ctx, query, args).await
}

/// Execute a query that is expected to return at most one row.
///
/// Always returns a [`Row`]. Errors, including a missing handle, are deferred
/// until a value is read from it. If the query selects no rows, reading
/// yields [`sqlx::Error::RowNotFound`]; extra rows are discarded.
pub async fn query_row<'q>(ctx: &Context, query: &'q str, args: AnyArguments<'q>) -> Row {
    match resolve(ctx) {
        Some(db) => db.query_row(ctx, query, args).await,
        None => Row::from_err(Error::MissingHandle),
    }
}

/// Build [`AnyArguments`] from a list of values.
///
/// Evaluates to `Result<AnyArguments, Error>`, failing if a value cannot be
/// encoded.
#[macro_export]
macro_rules! args {
    () => {
        ::std::result::Result::<$crate::sqlx::any::AnyArguments<'_>, $crate::Error>::Ok(
            ::std::default::Default::default(),
        )
    };
    ($($value:expr),+ $(,)?) => {{
        let mut args: $crate::sqlx::any::AnyArguments<'_> = ::std::default::Default::default();
        let mut encoded: ::std::result::Result<(), $crate::sqlx::error::BoxDynError> =
            ::std::result::Result::Ok(());
        $(
            if encoded.is_ok() {
                encoded = $crate::sqlx::Arguments::add(&mut args, $value);
            }
        )+
        encoded
            .map(|()| args)
            .map_err(|e| $crate::Error::Database($crate::sqlx::Error::Encode(e)))
    }};
}
