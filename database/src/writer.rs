use crate::prelude::DB;
use rocksdb::WriteBatch;

/// Destination of store writes: either the DB itself or a batch committed later in one step
pub trait DbWriter {
    fn put(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<(), rocksdb::Error>;

    fn delete(&mut self, key: impl AsRef<[u8]>) -> Result<(), rocksdb::Error>;
}

/// Writes go to the DB immediately. Used for retrieved payloads, which never take part in a head change.
pub struct DirectDbWriter<'a>(&'a DB);

impl<'a> DirectDbWriter<'a> {
    pub fn new(db: &'a DB) -> Self {
        Self(db)
    }
}

impl DbWriter for DirectDbWriter<'_> {
    fn put(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<(), rocksdb::Error> {
        self.0.put(key, value)
    }

    fn delete(&mut self, key: impl AsRef<[u8]>) -> Result<(), rocksdb::Error> {
        self.0.delete(key)
    }
}

/// Writes are staged into a batch, so that header, index and head updates land atomically
pub struct BatchDbWriter<'a>(&'a mut WriteBatch);

impl<'a> BatchDbWriter<'a> {
    pub fn new(batch: &'a mut WriteBatch) -> Self {
        Self(batch)
    }
}

impl DbWriter for BatchDbWriter<'_> {
    fn put(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<(), rocksdb::Error> {
        self.0.put(key, value);
        Ok(())
    }

    fn delete(&mut self, key: impl AsRef<[u8]>) -> Result<(), rocksdb::Error> {
        self.0.delete(key);
        Ok(())
    }
}
