use crate::{Address, Bloom, Transaction};
use lds_hashes::{Hash, Hasher, KeccakHasher};
use lds_utils::mem_size::MemSizeEstimator;
use serde::{Deserialize, Serialize};
use std::mem::size_of;

/// A log entry emitted by a transaction.
///
/// Only `address`, `topics` and `data` are consensus content. The remaining fields are
/// derived from the enclosing block once the receipts are known, see [`derive_log_fields`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<Hash>,
    pub data: Vec<u8>,

    pub block_number: u64,
    pub block_hash: Hash,
    pub tx_hash: Hash,
    pub tx_index: u32,
    pub log_index: u32,
    /// Set when the log was reverted by a chain reorganization
    pub removed: bool,
}

impl Log {
    pub fn new(address: Address, topics: Vec<Hash>, data: Vec<u8>) -> Self {
        Self { address, topics, data, ..Default::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: Hash,
    pub success: bool,
    pub cumulative_gas_used: u64,
    pub logs: Vec<Log>,
    pub bloom: Bloom,
}

impl Receipt {
    pub fn new(tx_hash: Hash, success: bool, cumulative_gas_used: u64, logs: Vec<Log>) -> Self {
        let bloom = Bloom::from_logs(&logs);
        Self { tx_hash, success, cumulative_gas_used, logs, bloom }
    }

    /// Hashes the consensus content of the receipt
    pub fn hash(&self) -> Hash {
        let mut hasher = KeccakHasher::new();
        hasher
            .update(self.tx_hash)
            .update([self.success as u8])
            .write_u64(self.cumulative_gas_used)
            .update(self.bloom.as_bytes())
            .write_u64(self.logs.len() as u64);
        for log in self.logs.iter() {
            hasher.update(log.address).write_u64(log.topics.len() as u64);
            log.topics.iter().for_each(|topic| {
                hasher.update(topic);
            });
            hasher.write_var_bytes(&log.data);
        }
        hasher.finalize()
    }
}

impl MemSizeEstimator for Receipt {
    fn estimate_mem_bytes(&self) -> usize {
        let logs_size =
            self.logs.iter().map(|log| size_of::<Log>() + log.topics.len() * size_of::<Hash>() + log.data.len()).sum::<usize>();
        size_of::<Self>() + logs_size
    }
}

/// Returns the root committing to an ordered receipt list
pub fn receipts_root(receipts: &[Receipt]) -> Hash {
    let mut hasher = KeccakHasher::new();
    hasher.write_u64(receipts.len() as u64);
    receipts.iter().for_each(|receipt| {
        hasher.update(receipt.hash());
    });
    hasher.finalize()
}

/// Fills the block-derived fields of all logs held by `receipts`. Log indices run over the whole block.
pub fn derive_log_fields(receipts: &mut [Receipt], block_hash: Hash, block_number: u64) {
    let mut log_index = 0u32;
    for (tx_index, receipt) in receipts.iter_mut().enumerate() {
        for log in receipt.logs.iter_mut() {
            log.block_hash = block_hash;
            log.block_number = block_number;
            log.tx_hash = receipt.tx_hash;
            log.tx_index = tx_index as u32;
            log.log_index = log_index;
            log_index += 1;
        }
    }
}

/// Returns `true` if `receipts` line up one to one with `transactions`
pub fn receipts_match_transactions(receipts: &[Receipt], transactions: &[Transaction]) -> bool {
    receipts.len() == transactions.len() && receipts.iter().zip(transactions).all(|(r, t)| r.tx_hash == t.hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_log_fields() {
        let log = |i| Log::new(Address::repeat_byte(i), vec![Hash::from_u64_word(i as u64)], vec![]);
        let mut receipts = vec![
            Receipt::new(Hash::from_u64_word(100), true, 21_000, vec![log(1), log(2)]),
            Receipt::new(Hash::from_u64_word(101), true, 42_000, vec![]),
            Receipt::new(Hash::from_u64_word(102), false, 63_000, vec![log(3)]),
        ];
        let root = receipts_root(&receipts);
        derive_log_fields(&mut receipts, Hash::from_u64_word(7), 7);
        // Derived fields are not part of the committed content
        assert_eq!(root, receipts_root(&receipts));

        let logs = receipts.iter().flat_map(|r| r.logs.iter()).collect::<Vec<_>>();
        assert_eq!(logs.iter().map(|l| l.log_index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(logs.iter().map(|l| l.tx_index).collect::<Vec<_>>(), vec![0, 0, 2]);
        assert!(logs.iter().all(|l| l.block_number == 7 && l.block_hash == Hash::from_u64_word(7)));
        assert_eq!(logs[2].tx_hash, Hash::from_u64_word(102));
        assert!(receipts[0].bloom.contains_input(Address::repeat_byte(2).as_ref()));
    }
}
