use crate::Hash;
use sha3::{Digest, Keccak256};

pub trait Hasher {
    fn update<A: AsRef<[u8]>>(&mut self, data: A) -> &mut Self;

    fn finalize(self) -> Hash;

    #[inline(always)]
    fn write_u64(&mut self, value: u64) -> &mut Self {
        self.update(value.to_le_bytes())
    }

    #[inline(always)]
    fn write_var_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.write_u64(bytes.len() as u64).update(bytes)
    }
}

/// Incremental Keccak-256 hasher
#[derive(Clone, Default)]
pub struct KeccakHasher(Keccak256);

impl KeccakHasher {
    #[inline]
    pub fn new() -> Self {
        Self(Keccak256::new())
    }

    #[inline]
    pub fn hash<A: AsRef<[u8]>>(data: A) -> Hash {
        let mut hasher = Self::new();
        hasher.update(data);
        hasher.finalize()
    }
}

impl Hasher for KeccakHasher {
    #[inline(always)]
    fn update<A: AsRef<[u8]>>(&mut self, data: A) -> &mut Self {
        Digest::update(&mut self.0, data.as_ref());
        self
    }

    #[inline(always)]
    fn finalize(self) -> Hash {
        Hash::from_bytes(self.0.finalize().into())
    }
}
