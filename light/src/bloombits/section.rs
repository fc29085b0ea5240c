use lds_chain_core::Bloom;
use lds_utils::mem_size::MemSizeEstimator;
use serde::{Deserialize, Serialize};
use std::{mem::size_of, ops::RangeInclusive};

/// The logs blooms of one section of consecutive blocks. Section `i` covers the blocks
/// `[i * size, (i + 1) * size)`. Sections are never mutated once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloomSection {
    pub index: u64,
    pub blooms: Vec<Bloom>,
}

impl BloomSection {
    pub fn new(index: u64, blooms: Vec<Bloom>) -> Self {
        Self { index, blooms }
    }

    /// Returns the bloom of block `number`, if it belongs to this section
    pub fn bloom_of(&self, number: u64, section_size: u64) -> Option<&Bloom> {
        let first = self.index.checked_mul(section_size)?;
        let offset = number.checked_sub(first)?;
        self.blooms.get(usize::try_from(offset).ok()?)
    }
}

impl MemSizeEstimator for BloomSection {
    fn estimate_mem_bytes(&self) -> usize {
        size_of::<Self>() + self.blooms.len() * size_of::<Bloom>()
    }
}

/// Returns the block range covered by section `index`
pub fn section_range(index: u64, section_size: u64) -> RangeInclusive<u64> {
    let first = index * section_size;
    first..=first + section_size - 1
}
