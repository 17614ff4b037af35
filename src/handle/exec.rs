//! Statement runners shared by every handle variant.
//!
//! These use sqlx's generic Executor pattern, so the same function serves
//! `&AnyPool`, `&mut AnyConnection` and the connection behind a transaction.

use sqlx::any::{AnyArguments, AnyQueryResult, AnyRow};
use sqlx::{Any, Executor};

use crate::services::error::Result;

pub(crate) async fn execute<'e, 'q, E>(
    executor: E,
    query: &'q str,
    args: AnyArguments<'q>,
) -> Result<AnyQueryResult>
where
    E: Executor<'e, Database = Any>,
{
    Ok(sqlx::query_with::<Any, _>(query, args)
        .execute(executor)
        .await?)
}

pub(crate) async fn fetch_all<'e, 'q, E>(
    executor: E,
    query: &'q str,
    args: AnyArguments<'q>,
) -> Result<Vec<AnyRow>>
where
    E: Executor<'e, Database = Any>,
{
    Ok(sqlx::query_with::<Any, _>(query, args)
        .fetch_all(executor)
        .await?)
}

pub(crate) async fn fetch_optional<'e, 'q, E>(
    executor: E,
    query: &'q str,
    args: AnyArguments<'q>,
) -> Result<Option<AnyRow>>
where
    E: Executor<'e, Database = Any>,
{
    Ok(sqlx::query_with::<Any, _>(query, args)
        .fetch_optional(executor)
        .await?)
}

/// Run a statement that takes no arguments and returns nothing
/// (transaction control, `SET TRANSACTION`).
pub(crate) async fn raw<'e, E>(executor: E, statement: &str) -> Result<()>
where
    E: Executor<'e, Database = Any>,
{
    sqlx::query(statement).execute(executor).await?;
    Ok(())
}
