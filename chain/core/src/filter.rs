use crate::{Address, Bloom, Log};
use lds_hashes::Hash;
use serde::{Deserialize, Serialize};

/// Selects logs by emitter address and positional topics.
///
/// An empty address list matches any emitter. Topic position `i` matches when its
/// alternatives are empty (wildcard) or contain the log's `i`-th topic.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogFilter {
    pub addresses: Vec<Address>,
    pub topics: Vec<Vec<Hash>>,
}

/// Precomputed bloom pattern of a [`LogFilter`]. Each group lists single-input blooms
/// of which at least one must be contained in a block bloom.
#[derive(Debug, Clone, Default)]
pub struct BloomPattern {
    groups: Vec<Vec<Bloom>>,
}

impl BloomPattern {
    pub fn matches(&self, bloom: &Bloom) -> bool {
        self.groups.iter().all(|group| group.iter().any(|b| bloom.contains_bloom(b)))
    }

    /// Returns `true` if every block bloom matches
    pub fn is_wildcard(&self) -> bool {
        self.groups.is_empty()
    }
}

fn single_bloom(input: &[u8]) -> Bloom {
    let mut bloom = Bloom::EMPTY;
    bloom.accrue(input);
    bloom
}

impl LogFilter {
    pub fn new(addresses: Vec<Address>, topics: Vec<Vec<Hash>>) -> Self {
        Self { addresses, topics }
    }

    pub fn with_address(address: Address) -> Self {
        Self { addresses: vec![address], topics: vec![] }
    }

    /// Exact match of a log against the filter
    pub fn matches(&self, log: &Log) -> bool {
        if !self.addresses.is_empty() && !self.addresses.contains(&log.address) {
            return false;
        }
        self.topics.iter().enumerate().all(|(i, alternatives)| {
            alternatives.is_empty() || log.topics.get(i).is_some_and(|topic| alternatives.contains(topic))
        })
    }

    pub fn bloom_pattern(&self) -> BloomPattern {
        let mut groups = Vec::with_capacity(self.topics.len() + 1);
        if !self.addresses.is_empty() {
            groups.push(self.addresses.iter().map(|a| single_bloom(a.as_ref())).collect());
        }
        for alternatives in self.topics.iter().filter(|alternatives| !alternatives.is_empty()) {
            groups.push(alternatives.iter().map(|t| single_bloom(t.as_ref())).collect());
        }
        BloomPattern { groups }
    }

    /// Returns `true` if a block with this logs bloom may hold a matching log
    pub fn bloom_matches(&self, bloom: &Bloom) -> bool {
        self.bloom_pattern().matches(bloom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(address: u8, topics: &[u64]) -> Log {
        Log::new(Address::repeat_byte(address), topics.iter().copied().map(Hash::from_u64_word).collect(), vec![])
    }

    #[test]
    fn test_exact_matching() {
        let t = Hash::from_u64_word;
        let filter = LogFilter::new(vec![Address::repeat_byte(1), Address::repeat_byte(2)], vec![vec![], vec![t(5), t(6)]]);
        assert!(filter.matches(&log(1, &[9, 5])));
        assert!(filter.matches(&log(2, &[0, 6, 7])));
        assert!(!filter.matches(&log(3, &[9, 5])));
        assert!(!filter.matches(&log(1, &[9])));
        assert!(!filter.matches(&log(1, &[5, 9])));
        assert!(LogFilter::default().matches(&log(3, &[])));
    }

    #[test]
    fn test_bloom_matching() {
        let filter = LogFilter::new(vec![Address::repeat_byte(1)], vec![vec![Hash::from_u64_word(5)]]);
        let matching = log(1, &[5]);
        let mut bloom = Bloom::from_logs([&matching]);
        assert!(filter.matches(&matching));
        assert!(filter.bloom_matches(&bloom));
        assert!(!filter.bloom_matches(&Bloom::EMPTY));

        // Address and topic in different logs still pass the bloom test, exact matching must drop it
        let split = [log(1, &[7]), log(4, &[5])];
        bloom = Bloom::from_logs(&split);
        assert!(filter.bloom_matches(&bloom));
        assert!(split.iter().all(|l| !filter.matches(l)));

        assert!(LogFilter::default().bloom_pattern().is_wildcard());
        assert!(LogFilter::default().bloom_matches(&Bloom::EMPTY));
    }
}
