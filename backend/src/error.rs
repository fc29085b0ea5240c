use crate::{exec::StateAccessError, txpool::TxPoolError};
use lds_light::{bloombits::MatcherError, chain::ChainError, odr::OdrError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Odr(#[from] OdrError),

    #[error(transparent)]
    Matcher(#[from] MatcherError),

    #[error(transparent)]
    TxPool(#[from] TxPoolError),

    #[error(transparent)]
    StateAccess(#[from] StateAccessError),

    #[error("invalid block range [{0}, {1}]")]
    InvalidRange(u64, u64),
}

impl BackendError {
    /// Returns `true` if the error stands for data confirmed absent by the peers
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::Odr(OdrError::NotFound) | BackendError::Chain(ChainError::Odr(OdrError::NotFound)))
    }
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;
