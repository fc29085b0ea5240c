use crate::{db::DB, errors::StoreError};
use rocksdb::{BlockBasedOptions, DBCompressionType};
use std::{path::PathBuf, sync::Arc};

const KB: usize = 1024;
const MB: usize = 1024 * KB;
const MEM_BUDGET: usize = 64 * MB;

#[derive(Debug)]
pub struct Unspecified;

/// Builds a rocksdb connection. The DB path is tracked at the type level so that
/// `build` is only available once a path was provided.
#[derive(Debug)]
pub struct ConnBuilder<Path> {
    db_path: Path,
    files_limit: i32,
}

impl Default for ConnBuilder<Unspecified> {
    fn default() -> Self {
        ConnBuilder { db_path: Unspecified, files_limit: 500 }
    }
}

impl<Path> ConnBuilder<Path> {
    pub fn with_db_path(self, db_path: PathBuf) -> ConnBuilder<PathBuf> {
        ConnBuilder { db_path, files_limit: self.files_limit }
    }

    pub fn with_files_limit(self, files_limit: impl Into<i32>) -> Self {
        ConnBuilder { files_limit: files_limit.into(), ..self }
    }
}

impl ConnBuilder<PathBuf> {
    fn options(&self) -> rocksdb::Options {
        let mut opts = rocksdb::Options::default();
        // The light client keeps a small working set, so a single write buffer takes a quarter of the budget
        opts.optimize_level_style_compaction(MEM_BUDGET);
        opts.set_write_buffer_size(MEM_BUDGET / 4);
        opts.set_keep_log_file_num(1);
        opts.set_bytes_per_sync(MB as u64);
        opts.set_compression_per_level(&[DBCompressionType::None, DBCompressionType::Lz4, DBCompressionType::Lz4]);

        let mut b_opts = BlockBasedOptions::default();
        b_opts.set_bloom_filter(10.0, true);
        b_opts.set_block_size(16 * KB);
        opts.set_block_based_table_factory(&b_opts);

        opts.set_max_open_files(self.files_limit);
        opts.create_if_missing(true);
        opts
    }

    pub fn build(self) -> Result<Arc<DB>, StoreError> {
        let opts = self.options();
        Ok(Arc::new(DB::open(&opts, &self.db_path)?))
    }
}
