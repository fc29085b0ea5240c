use crate::Difficulty;
use lds_hashes::Hash;
use serde::{Deserialize, Serialize};

/// Identifies the current canonical head
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHead {
    pub hash: Hash,
    pub number: u64,
    /// Total difficulty accumulated from genesis up to and including the head
    pub td: Difficulty,
}

impl ChainHead {
    pub fn new(hash: Hash, number: u64, td: Difficulty) -> Self {
        Self { hash, number, td }
    }
}
