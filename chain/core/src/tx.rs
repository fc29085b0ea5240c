use crate::Address;
use lds_hashes::{Hash, Hasher, KeccakHasher};
use lds_utils::mem_size::MemSizeEstimator;
use serde::{Deserialize, Serialize};
use std::mem::size_of;

/// A transaction as carried by block bodies and the transaction pool. Signatures are
/// handled by the pool, which hands over the recovered sender in `from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Cached hash
    pub hash: Hash,
    pub nonce: u64,
    pub from: Address,
    pub to: Option<Address>,
    pub value: u128,
    pub gas: u64,
    pub gas_price: u128,
    pub data: Vec<u8>,
}

impl Transaction {
    pub fn new(nonce: u64, from: Address, to: Option<Address>, value: u128, gas: u64, gas_price: u128, data: Vec<u8>) -> Self {
        let mut tx = Self { hash: Default::default(), nonce, from, to, value, gas, gas_price, data };
        tx.finalize();
        tx
    }

    pub fn finalize(&mut self) {
        self.hash = self.compute_hash();
    }

    pub fn compute_hash(&self) -> Hash {
        let mut hasher = KeccakHasher::new();
        hasher.write_u64(self.nonce).update(self.from);
        match self.to {
            Some(to) => hasher.update([1u8]).update(to),
            None => hasher.update([0u8]),
        };
        hasher.update(self.value.to_le_bytes()).write_u64(self.gas).update(self.gas_price.to_le_bytes()).write_var_bytes(&self.data);
        hasher.finalize()
    }

    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }
}

impl MemSizeEstimator for Transaction {
    fn estimate_mem_bytes(&self) -> usize {
        size_of::<Self>() + self.data.len()
    }
}

/// Returns the root committing to an ordered transaction list
pub fn transactions_root(transactions: &[Transaction]) -> Hash {
    let mut hasher = KeccakHasher::new();
    hasher.write_u64(transactions.len() as u64);
    transactions.iter().for_each(|tx| {
        hasher.update(tx.hash);
    });
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transactions_root() {
        let a = Transaction::new(0, Address::repeat_byte(1), Some(Address::repeat_byte(2)), 10, 21_000, 1, vec![]);
        let b = Transaction::new(1, Address::repeat_byte(1), None, 0, 100_000, 1, vec![0x60, 0x00]);
        assert!(b.is_contract_creation());
        assert_ne!(a.hash, b.hash);
        assert_ne!(transactions_root(&[a.clone(), b.clone()]), transactions_root(&[b.clone(), a.clone()]));
        assert_ne!(transactions_root(&[]), transactions_root(&[a]));
    }
}
