use crate::{Address, Bloom, Difficulty};
use lds_hashes::{Hash, Hasher, KeccakHasher};
use lds_utils::mem_size::MemSizeEstimator;
use serde::{Deserialize, Serialize};
use std::mem::size_of;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Cached hash
    pub hash: Hash,
    pub parent_hash: Hash,
    pub number: u64,
    pub timestamp: u64,
    pub coinbase: Address,
    pub state_root: Hash,
    pub transactions_root: Hash,
    pub receipts_root: Hash,
    pub logs_bloom: Bloom,
    pub difficulty: Difficulty,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub extra_data: Vec<u8>,
}

impl Header {
    #[allow(clippy::too_many_arguments)]
    pub fn new_finalized(
        parent_hash: Hash,
        number: u64,
        timestamp: u64,
        coinbase: Address,
        state_root: Hash,
        transactions_root: Hash,
        receipts_root: Hash,
        logs_bloom: Bloom,
        difficulty: Difficulty,
        gas_limit: u64,
        gas_used: u64,
        extra_data: Vec<u8>,
    ) -> Self {
        let mut header = Self {
            hash: Default::default(), // Temp init before the finalize below
            parent_hash,
            number,
            timestamp,
            coinbase,
            state_root,
            transactions_root,
            receipts_root,
            logs_bloom,
            difficulty,
            gas_limit,
            gas_used,
            extra_data,
        };
        header.finalize();
        header
    }

    /// Finalizes the header and recomputes the header hash
    pub fn finalize(&mut self) {
        self.hash = self.compute_hash();
    }

    /// Computes the header hash from all fields except the cached hash itself
    pub fn compute_hash(&self) -> Hash {
        let mut hasher = KeccakHasher::new();
        hasher
            .update(self.parent_hash)
            .write_u64(self.number)
            .write_u64(self.timestamp)
            .update(self.coinbase)
            .update(self.state_root)
            .update(self.transactions_root)
            .update(self.receipts_root)
            .update(self.logs_bloom.as_bytes())
            .update(self.difficulty.to_le_bytes())
            .write_u64(self.gas_limit)
            .write_u64(self.gas_used)
            .write_var_bytes(&self.extra_data);
        hasher.finalize()
    }

    /// Returns `true` if the cached hash matches the header content
    pub fn is_sealed(&self) -> bool {
        self.hash == self.compute_hash()
    }
}

impl MemSizeEstimator for Header {
    fn estimate_mem_bytes(&self) -> usize {
        size_of::<Self>() + self.extra_data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(number: u64) -> Header {
        Header::new_finalized(
            Hash::from_u64_word(number.saturating_sub(1)),
            number,
            1_700_000_000 + number,
            Address::repeat_byte(9),
            Default::default(),
            Default::default(),
            Default::default(),
            Bloom::EMPTY,
            1,
            30_000_000,
            0,
            vec![],
        )
    }

    #[test]
    fn test_header_hashing() {
        let mut h = header(5);
        assert!(h.is_sealed());
        assert_ne!(h.hash, header(6).hash);

        h.gas_used = 21_000;
        assert!(!h.is_sealed());
        h.finalize();
        assert!(h.is_sealed());

        let decoded: Header = bincode::deserialize(&bincode::serialize(&h).unwrap()).unwrap();
        assert_eq!(decoded, h);
        assert!(decoded.is_sealed());
    }
}
