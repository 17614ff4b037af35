//! Request-scoped contexts for axum
//!
//! [`attach_context`] copies the root [`Context`] (normally the one returned
//! by [`DbConfig::connect_context`](crate::config::DbConfig::connect_context))
//! into every request's extensions, and [`Context`] is an extractor, so
//! handlers never see the pool:
//!
//! ```ignore
//! let ctx = DbConfig::from_env().connect_context().await?;
//!
//! let app = Router::new()
//!     .route("/accounts/{id}", get(get_account))
//!     .layer(axum::middleware::from_fn_with_state(ctx, dbscope::middleware::attach_context));
//!
//! async fn get_account(ctx: Context, Path(id): Path<i64>) -> Result<String, dbscope::Error> {
//!     dbscope::query_row(&ctx, "SELECT owner FROM accounts WHERE id = $1", args![id]?)
//!         .await
//!         .get("owner")
//! }
//! ```

use axum::extract::{FromRequestParts, Request, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;

use crate::context::Context;
use crate::services::error::LogErr;

/// Insert `root` into the request so handlers can extract it.
pub async fn attach_context(State(root): State<Context>, mut req: Request, next: Next) -> Response {
    req.extensions_mut().insert(root);
    next.run(req).await
}

impl<S> FromRequestParts<S> for Context
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        request_context(parts).log_500("Request context missing")
    }
}

fn request_context(parts: &Parts) -> Result<Context, &'static str> {
    parts
        .extensions
        .get::<Context>()
        .cloned()
        .ok_or("attach_context not installed")
}
