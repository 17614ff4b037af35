//! Error type shared by the registry, the delegated helpers and the
//! transaction orchestrator, plus logging helpers for route handlers.

use thiserror::Error;

/// Errors surfaced by context-scoped database access.
///
/// Errors coming from sqlx are carried verbatim in [`Error::Database`], so
/// callers can still match on things like [`sqlx::Error::RowNotFound`].
#[derive(Debug, Error)]
pub enum Error {
    /// No database handle is bound in the context
    #[error("missing database handle in context")]
    MissingHandle,

    /// The handle in the context cannot begin a transaction (e.g. it already is one)
    #[error("can't begin transaction on database handle in context")]
    UnsupportedOperation,

    /// The transaction handle was already committed or rolled back
    #[error("transaction has already been committed or rolled back")]
    TxDone,

    /// Returned by a work unit to roll back without reporting an error.
    ///
    /// [`run_in_transaction`](crate::run_in_transaction) absorbs it and returns `Ok(())`.
    #[error("rolling back")]
    Abort,

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// Any other failure raised by a work unit
    #[error(transparent)]
    Work(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl Error {
    /// The abort signal, for work units that want to roll back silently.
    pub fn abort() -> Self {
        Error::Abort
    }

    /// Box an arbitrary work-unit failure.
    pub fn other<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Error::Work(err.into())
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, Error::Abort)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(feature = "axum")]
pub use self::http::LogErr;

#[cfg(feature = "axum")]
mod http {
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};

    use super::Error;

    /// Extension trait for logging errors and converting to StatusCode
    pub trait LogErr<T> {
        /// Log error with context and return INTERNAL_SERVER_ERROR
        fn log_500(self, context: &str) -> Result<T, StatusCode>;

        /// Log error with context and return a custom StatusCode
        fn log_status(self, context: &str, status: StatusCode) -> Result<T, StatusCode>;
    }

    impl<T, E: std::fmt::Display> LogErr<T> for Result<T, E> {
        fn log_500(self, context: &str) -> Result<T, StatusCode> {
            self.log_status(context, StatusCode::INTERNAL_SERVER_ERROR)
        }

        fn log_status(self, context: &str, status: StatusCode) -> Result<T, StatusCode> {
            self.map_err(|e| {
                log::error!("{}: {}", context, e);
                status
            })
        }
    }

    impl IntoResponse for Error {
        fn into_response(self) -> Response {
            log::error!("database request failed: {}", self);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("same text as the abort signal")]
    struct LooksLikeAbort;

    #[test]
    fn test_abort_matches_by_variant_not_message() {
        assert!(Error::abort().is_abort());

        let impostor = Error::other(LooksLikeAbort);
        assert!(!impostor.is_abort());

        let same_message = Error::other("rolling back");
        assert_eq!(same_message.to_string(), Error::Abort.to_string());
        assert!(!same_message.is_abort());
    }

    #[test]
    fn test_database_errors_are_transparent() {
        let err: Error = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, Error::Database(sqlx::Error::RowNotFound)));
        assert_eq!(err.to_string(), sqlx::Error::RowNotFound.to_string());
    }

    #[cfg(feature = "axum")]
    #[test]
    fn test_log_status_maps_error() {
        use axum::http::StatusCode;

        let res: Result<(), Error> = Err(Error::MissingHandle);
        assert_eq!(res.log_500("lookup"), Err(StatusCode::INTERNAL_SERVER_ERROR));

        let res: Result<u8, Error> = Err(Error::TxDone);
        assert_eq!(
            res.log_status("lookup", StatusCode::CONFLICT),
            Err(StatusCode::CONFLICT)
        );

        let ok: Result<u8, Error> = Ok(7);
        assert_eq!(ok.log_500("lookup"), Ok(7));
    }
}
