use crate::registry::{DatabaseStorePrefixes, SEPARATOR};
use num_traits::FromPrimitive;
use std::fmt::{Debug, Display};

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DbKey {
    path: Vec<u8>,
    prefix_len: usize,
}

impl DbKey {
    pub fn new<TKey>(prefix: &[u8], key: TKey) -> Self
    where
        TKey: AsRef<[u8]>,
    {
        Self { path: prefix.iter().chain(key.as_ref().iter()).copied().collect(), prefix_len: prefix.len() }
    }

    pub fn new_with_bucket<TKey, TBucket>(prefix: &[u8], bucket: TBucket, key: TKey) -> Self
    where
        TKey: AsRef<[u8]>,
        TBucket: AsRef<[u8]>,
    {
        let mut db_key = Self::prefix_only(prefix);
        db_key.add_bucket(bucket);
        db_key.add_key(key);
        db_key
    }

    pub fn prefix_only(prefix: &[u8]) -> Self {
        Self::new(prefix, [])
    }

    /// add a bucket to the DBkey, this adds to the prefix length
    pub fn add_bucket<TBucket>(&mut self, bucket: TBucket)
    where
        TBucket: AsRef<[u8]>,
    {
        self.path.extend(bucket.as_ref().iter().copied());
        self.prefix_len += bucket.as_ref().len();
    }

    pub fn add_key<TKey>(&mut self, key: TKey)
    where
        TKey: AsRef<[u8]>,
    {
        self.path.extend(key.as_ref().iter().copied());
    }

    pub fn prefix_len(&self) -> usize {
        self.prefix_len
    }
}

impl AsRef<[u8]> for DbKey {
    fn as_ref(&self) -> &[u8] {
        &self.path
    }
}

impl Display for DbKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut pos = 0;

        if self.prefix_len > 0 {
            if let Some(prefix) = DatabaseStorePrefixes::from_u8(self.path[0]) {
                prefix.fmt(f)?;
                pos += 1;
                if self.path.len() > 1 && self.path[1] != SEPARATOR {
                    f.write_str("/")?;
                }
            }
        }

        f.write_str(&faster_hex::hex_string(&self.path[pos..]))
    }
}

impl Debug for DbKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::DatabaseStorePrefixes;
    use lds_hashes::Hash;

    #[test]
    fn test_key_display() {
        let key = DbKey::new(DatabaseStorePrefixes::Headers.as_ref(), Hash::from_u64_word(0xff));
        assert_eq!(key.prefix_len(), 1);
        assert_eq!(key.as_ref().len(), 33);
        let display = key.to_string();
        assert!(display.starts_with("Headers/"));
        assert!(display.ends_with("ff"));

        let bucketed = DbKey::new_with_bucket(DatabaseStorePrefixes::StateEntries.as_ref(), [7u8; 4], [1u8, 2]);
        assert_eq!(bucketed.prefix_len(), 5);
        assert_eq!(bucketed.as_ref(), &[DatabaseStorePrefixes::StateEntries as u8, 7, 7, 7, 7, 1, 2]);
    }
}
