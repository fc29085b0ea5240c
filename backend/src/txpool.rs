use async_trait::async_trait;
use lds_chain_core::{Address, Transaction};
use lds_hashes::Hash;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxPoolError {
    #[error("transaction {0} is already known")]
    AlreadyKnown(Hash),

    #[error("nonce too low: got {got}, expected at least {expected}")]
    NonceTooLow { got: u64, expected: u64 },

    #[error("transaction rejected: {0}")]
    Rejected(String),
}

pub type TxPoolResult<T> = std::result::Result<T, TxPoolError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxPoolStats {
    pub pending: usize,
    pub queued: usize,
}

/// Pool transactions grouped by sender and ordered by nonce
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxPoolContent {
    pub pending: BTreeMap<Address, Vec<Arc<Transaction>>>,
    pub queued: BTreeMap<Address, Vec<Arc<Transaction>>>,
}

/// The transaction pool of the client. Implementations relay accepted transactions to the network.
#[async_trait]
pub trait TxPool: Send + Sync {
    async fn add(&self, transaction: Transaction) -> TxPoolResult<()>;

    /// Adds a batch, returning one result per transaction
    async fn add_batch(&self, transactions: Vec<Transaction>) -> Vec<TxPoolResult<()>>;

    /// Returns `true` if the transaction was in the pool
    async fn remove(&self, hash: Hash) -> bool;

    async fn transactions(&self) -> Vec<Arc<Transaction>>;

    async fn transaction(&self, hash: Hash) -> Option<Arc<Transaction>>;

    /// The next nonce of `address`, accounting for its pooled transactions
    async fn nonce(&self, address: Address) -> TxPoolResult<u64>;

    /// Number of pending transactions
    async fn stats(&self) -> usize;

    async fn content(&self) -> TxPoolContent;
}

pub type DynTxPool = Arc<dyn TxPool>;
