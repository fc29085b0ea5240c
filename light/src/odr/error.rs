use lds_database::prelude::StoreError;
use thiserror::Error;

/// Outcome taxonomy of a retrieval. Cloneable so that one dispatch result can be
/// delivered to every coalesced caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OdrError {
    #[error("requested item not found")]
    NotFound,

    #[error("retrieval timed out")]
    Timeout,

    #[error("retrieval cancelled")]
    Cancelled,

    #[error("peer error: {0}")]
    PeerError(String),

    #[error("store error: {0}")]
    Store(String),
}

impl From<StoreError> for OdrError {
    fn from(err: StoreError) -> Self {
        OdrError::Store(err.to_string())
    }
}

pub type OdrResult<T> = std::result::Result<T, OdrError>;
