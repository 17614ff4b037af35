//! Single-row query result with deferred errors
//!
//! [`query_row`](crate::query_row) always hands back a [`Row`]. Whatever went
//! wrong while resolving the handle or running the query is stored and only
//! returned once the caller reads a value out of it. An empty result reads as
//! [`sqlx::Error::RowNotFound`].

use sqlx::any::AnyRow;
use sqlx::{Any, ColumnIndex, Decode, FromRow, Type};

use crate::services::error::{Error, Result};

pub struct Row {
    inner: Result<Option<AnyRow>>,
}

impl std::fmt::Debug for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            Ok(Some(_)) => f.write_str("Row(..)"),
            Ok(None) => f.write_str("Row(empty)"),
            Err(e) => f.debug_tuple("Row").field(e).finish(),
        }
    }
}

impl Row {
    pub(crate) fn new(inner: Result<Option<AnyRow>>) -> Self {
        Self { inner }
    }

    pub(crate) fn from_err(err: Error) -> Self {
        Self { inner: Err(err) }
    }

    /// The stored error, if the query (or handle lookup) failed.
    ///
    /// A missing row is not an error until the row is consumed.
    pub fn err(&self) -> Option<&Error> {
        self.inner.as_ref().err()
    }

    /// The underlying sqlx row.
    pub fn into_inner(self) -> Result<AnyRow> {
        self.inner?.ok_or(Error::Database(sqlx::Error::RowNotFound))
    }

    /// Like [`Row::into_inner`] but maps an empty result to `None`.
    pub fn optional(self) -> Result<Option<AnyRow>> {
        self.inner
    }

    /// Decode a single column.
    pub fn get<T, I>(self, index: I) -> Result<T>
    where
        T: for<'r> Decode<'r, Any> + Type<Any>,
        I: ColumnIndex<AnyRow>,
    {
        use sqlx::Row as _;

        let row = self.into_inner()?;
        Ok(row.try_get(index)?)
    }

    /// Decode the whole row into a `FromRow` type.
    pub fn scan<T>(self) -> Result<T>
    where
        T: for<'r> FromRow<'r, AnyRow>,
    {
        let row = self.into_inner()?;
        Ok(T::from_row(&row)?)
    }
}
