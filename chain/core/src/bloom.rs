use lds_hashes::keccak256;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Debug, Formatter};

use crate::receipt::{Log, Receipt};

pub const BLOOM_BYTES: usize = 256;
pub const BLOOM_BITS: usize = BLOOM_BYTES * 8;

/// A 2048-bit log bloom. Every accrued input sets three bits selected by the first
/// three big-endian 16-bit words of its Keccak-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bloom([u8; BLOOM_BYTES]);

impl Default for Bloom {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// The three (byte index, mask) positions an input maps to
fn bloom_positions(input: &[u8]) -> [(usize, u8); 3] {
    let digest = keccak256(input).as_bytes();
    let mut positions = [(0, 0); 3];
    for (i, position) in positions.iter_mut().enumerate() {
        let bit = (u16::from_be_bytes([digest[2 * i], digest[2 * i + 1]]) as usize) % BLOOM_BITS;
        *position = (BLOOM_BYTES - 1 - bit / 8, 1 << (bit % 8));
    }
    positions
}

impl Bloom {
    pub const EMPTY: Bloom = Bloom([0; BLOOM_BYTES]);

    pub const fn from_bytes(bytes: [u8; BLOOM_BYTES]) -> Self {
        Bloom(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; BLOOM_BYTES] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn accrue(&mut self, input: &[u8]) {
        for (index, mask) in bloom_positions(input) {
            self.0[index] |= mask;
        }
    }

    pub fn accrue_bloom(&mut self, other: &Bloom) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a |= *b;
        }
    }

    pub fn accrue_log(&mut self, log: &Log) {
        self.accrue(log.address.as_ref());
        for topic in log.topics.iter() {
            self.accrue(topic.as_ref());
        }
    }

    /// Returns `true` if the input may have been accrued. False positives are possible, false negatives are not.
    pub fn contains_input(&self, input: &[u8]) -> bool {
        bloom_positions(input).into_iter().all(|(index, mask)| self.0[index] & mask == mask)
    }

    /// Returns `true` if every bit set in `other` is also set in `self`
    pub fn contains_bloom(&self, other: &Bloom) -> bool {
        self.0.iter().zip(other.0.iter()).all(|(a, b)| a & b == *b)
    }

    pub fn from_logs<'a>(logs: impl IntoIterator<Item = &'a Log>) -> Self {
        let mut bloom = Bloom::EMPTY;
        logs.into_iter().for_each(|log| bloom.accrue_log(log));
        bloom
    }

    pub fn from_receipts<'a>(receipts: impl IntoIterator<Item = &'a Receipt>) -> Self {
        let mut bloom = Bloom::EMPTY;
        receipts.into_iter().for_each(|receipt| bloom.accrue_bloom(&receipt.bloom));
        bloom
    }
}

impl Debug for Bloom {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Bloom(0x{})", faster_hex::hex_string(&self.0))
    }
}

impl Serialize for Bloom {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&faster_hex::hex_string(&self.0))
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Bloom {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut bytes = [0u8; BLOOM_BYTES];
        if deserializer.is_human_readable() {
            let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
            if s.len() != BLOOM_BYTES * 2 {
                return Err(D::Error::invalid_length(s.len(), &"a 512 chars hex string"));
            }
            faster_hex::hex_decode(s.as_bytes(), &mut bytes).map_err(D::Error::custom)?;
        } else {
            let v = <Vec<u8>>::deserialize(deserializer)?;
            if v.len() != BLOOM_BYTES {
                return Err(D::Error::invalid_length(v.len(), &"256 bytes"));
            }
            bytes.copy_from_slice(&v);
        }
        Ok(Bloom(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Address;

    #[test]
    fn test_bloom_accrue_contains() {
        let mut bloom = Bloom::default();
        assert!(bloom.is_empty());
        let a = Address::repeat_byte(1);
        bloom.accrue(a.as_ref());
        assert!(bloom.contains_input(a.as_ref()));
        assert!(bloom.as_bytes().iter().map(|b| b.count_ones()).sum::<u32>() <= 3);

        let mut single = Bloom::default();
        single.accrue(a.as_ref());
        let mut wider = single;
        wider.accrue(Address::repeat_byte(2).as_ref());
        assert!(wider.contains_bloom(&single));
        assert!(wider.contains_bloom(&Bloom::EMPTY));
        assert!(!Bloom::EMPTY.contains_input(a.as_ref()));
    }

    #[test]
    fn test_bloom_bincode() {
        let mut bloom = Bloom::default();
        bloom.accrue(b"topic");
        let bytes = bincode::serialize(&bloom).unwrap();
        assert_eq!(bloom, bincode::deserialize::<Bloom>(&bytes).unwrap());
        assert!(bincode::deserialize::<Bloom>(&bincode::serialize(&vec![0u8; 10]).unwrap()).is_err());
    }
}
