//! Error types.

use thiserror::Error;

/// Failure talking to the game service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// HTTP 404: the service no longer knows this game id.
    #[error("game session not found on the server")]
    SessionNotFound,

    /// Non-2xx reply other than 404.
    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Request never completed (connection refused, DNS, aborted fetch).
    #[error("transport error: {0}")]
    Transport(String),

    /// Reply arrived but could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ServiceError {
    #[inline]
    pub fn is_session_lost(&self) -> bool {
        matches!(self, ServiceError::SessionNotFound)
    }
}

/// Failure reading or writing the persisted session descriptor.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("stored descriptor is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Failure of a [`crate::session::SessionSync`] operation.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No game has been created or resumed yet.
    #[error("no active session")]
    NoSession,

    /// The service answered `success: false` to a create/fetch/restart.
    #[error("service refused the request: {0}")]
    Refused(String),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure of a [`crate::host::BoardHost`] entry point.
#[derive(Debug, Error)]
pub enum HostError {
    /// Another request holds the session; retry once it settles.
    #[error("a request is already in flight")]
    Busy,

    #[error(transparent)]
    Sync(#[from] SyncError),
}
