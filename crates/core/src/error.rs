//! Unified error types for appshelf.
//!
//! Remote failures are split into transport problems and rejections so
//! callers can decide whether a retry makes sense.

use tokio_rusqlite::rusqlite;

/// Unified error types for the catalog layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The remote document service could not be reached (network, timeout, 5xx).
    #[error("REMOTE_UNAVAILABLE: {0}")]
    RemoteUnavailable(String),

    /// The remote document service refused the request (permission, quota, bad payload).
    #[error("REMOTE_REJECTED: {message}")]
    RemoteRejected { status: Option<u16>, message: String },

    /// The persisted cache record could not be decoded.
    #[error("CACHE_CORRUPT: {0}")]
    CacheCorrupt(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// The cache table could not be brought to the current layout.
    #[error("CACHE_ERROR: schema reset failed: {0}")]
    MigrationFailed(String),

    /// Invalid input parameters (unknown category, index out of range).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),
}

impl Error {
    /// True for transport-level failures that may succeed on retry.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::RemoteUnavailable(_))
    }

    /// True when the remote service answered and refused the request.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Error::RemoteRejected { .. })
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<crate::ConfigError> for Error {
    fn from(err: crate::ConfigError) -> Self {
        Error::InvalidInput(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::CacheCorrupt(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::RemoteUnavailable("connection reset".to_string());
        assert!(err.to_string().contains("REMOTE_UNAVAILABLE"));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_rejection_is_distinguishable() {
        let rejected = Error::RemoteRejected { status: Some(403), message: "permission denied".into() };
        assert!(rejected.is_rejection());
        assert!(!rejected.is_transport());

        let unavailable = Error::RemoteUnavailable("timeout".into());
        assert!(unavailable.is_transport());
        assert!(!unavailable.is_rejection());
    }

    #[test]
    fn test_json_error_maps_to_corrupt() {
        let err: Error = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(matches!(err, Error::CacheCorrupt(_)));
    }
}
