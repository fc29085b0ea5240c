use lds_hashes::Hash;
use serde::{Deserialize, Serialize};

/// The state of an account at some state root. Accounts missing from the state read as the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Account {
    pub nonce: u64,
    pub balance: u128,
    pub code_hash: Hash,
    pub storage_root: Hash,
}

impl Account {
    pub fn new(nonce: u64, balance: u128) -> Self {
        Self { nonce, balance, ..Default::default() }
    }
}
