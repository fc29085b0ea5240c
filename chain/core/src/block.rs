use crate::{Header, Transaction};
use lds_hashes::Hash;
use lds_utils::mem_size::MemSizeEstimator;
use serde::{Deserialize, Serialize};
use std::{mem::size_of, sync::Arc};

/// The transaction list of a block, as retrieved separately from its header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockBody {
    pub transactions: Vec<Transaction>,
}

impl BlockBody {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self { transactions }
    }
}

impl MemSizeEstimator for BlockBody {
    fn estimate_mem_bytes(&self) -> usize {
        size_of::<Self>() + self.transactions.iter().map(|tx| tx.estimate_mem_bytes()).sum::<usize>()
    }
}

#[derive(Debug, Clone)]
pub struct Block {
    pub header: Arc<Header>,
    pub transactions: Arc<Vec<Transaction>>,
}

impl Block {
    pub fn new(header: Arc<Header>, body: BlockBody) -> Self {
        Self { header, transactions: Arc::new(body.transactions) }
    }

    pub fn from_header(header: Arc<Header>) -> Self {
        Self { header, transactions: Arc::new(Vec::new()) }
    }

    pub fn hash(&self) -> Hash {
        self.header.hash
    }

    pub fn number(&self) -> u64 {
        self.header.number
    }
}
