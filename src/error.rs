//! # Error Handling
//!
//! A single error enum covers every failure mode of the store, which keeps
//! call sites uniform: almost every operation can fail the same two ways
//! (SQLite, serialization), so per-module error types would add surface
//! without adding information.
//!
//! ## Error Categories
//!
//! | Category | Variant | Typical response |
//! |----------|---------------|-------------------------------------|
//! | Storage  | [`Error::Sqlite`] | Fatal to the current transaction; the caller decides whether to retry |
//! | Encoding | [`Error::Json`]   | A record failed to serialize or a stored blob failed to parse |
//! | Seeding  | [`Error::Snapshot`] | The seed snapshot is malformed; construction fails atomically |
//!
//! No operation retries internally, and no operation swallows an error,
//! with one deliberate exception: the `has_been_initialized` probe in
//! [`crate::schema`] treats any failure as "not initialized".

use thiserror::Error;

/// All errors that can occur in store operations.
#[derive(Error, Debug)]
pub enum Error {
    /// An underlying SQLite operation failed.
    ///
    /// Propagated unchanged from `rusqlite`. A failure here aborts the
    /// current transaction; no partial effects remain observable.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A document state or snapshot field failed to (de)serialize.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The seed snapshot is structurally invalid.
    ///
    /// The main case is a document whose `state` carries no string `id`
    /// field; documents are keyed by that field, so such a snapshot cannot
    /// be ingested.
    #[error("invalid snapshot: {0}")]
    Snapshot(String),
}

/// A `Result` type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_errors_convert() {
        let sqlite_err = rusqlite::Error::InvalidParameterName("test".to_string());
        let err: Error = sqlite_err.into();
        assert!(matches!(err, Error::Sqlite(_)));
        assert!(err.to_string().contains("sqlite error"));
    }

    #[test]
    fn snapshot_error_display() {
        let err = Error::Snapshot("document 3 has no string 'id' field".to_string());
        assert_eq!(
            err.to_string(),
            "invalid snapshot: document 3 has no string 'id' field"
        );
    }
}
