//! Backend-neutral storage errors for the venue store.

use std::error::Error;
use thiserror::Error;

/// Result alias for venue store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Failure reported by a venue store, whichever database sits behind it.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not serve the call. Nothing was committed; the node turns degraded
    /// until the store answers again.
    #[error("venue store unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A station transaction returned without ever running its work, so there is no outcome
    /// to report for the session operation.
    #[error("station transaction finished without running its work")]
    TransactionIncomplete,
}

impl StorageError {
    /// Wrap a backend failure, keeping it as the error source.
    pub fn unavailable(
        message: impl Into<String>,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        StorageError::Unavailable {
            message: message.into(),
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn unavailable_keeps_the_backend_cause() {
        let err = StorageError::unavailable(
            "replica set has no primary",
            io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
        );
        assert_eq!(
            err.to_string(),
            "venue store unavailable: replica set has no primary"
        );
        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "connection refused");
    }

    #[test]
    fn incomplete_transaction_has_no_source() {
        assert!(StorageError::TransactionIncomplete.source().is_none());
    }
}
