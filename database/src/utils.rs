use crate::prelude::DB;
use tempfile::TempDir;

/// Keeps a temporary DB alive and destroys it on drop
#[derive(Default)]
pub struct DbLifetime {
    weak_db_ref: std::sync::Weak<DB>,
    optional_tempdir: Option<TempDir>,
}

impl DbLifetime {
    pub fn new(tempdir: TempDir, weak_db_ref: std::sync::Weak<DB>) -> Self {
        Self { optional_tempdir: Some(tempdir), weak_db_ref }
    }
}

impl Drop for DbLifetime {
    fn drop(&mut self) {
        for _ in 0..16 {
            if self.weak_db_ref.strong_count() > 0 {
                // Sometimes another thread is shuting-down and cleaning resources
                std::thread::sleep(std::time::Duration::from_millis(1000));
            } else {
                break;
            }
        }
        assert_eq!(self.weak_db_ref.strong_count(), 0, "DB is expected to have no strong references when lifetime is dropped");
        if let Some(dir) = self.optional_tempdir.take() {
            let options = rocksdb::Options::default();
            let path_buf = dir.path().to_owned();
            let _ = DB::destroy(&options, path_buf);
        }
    }
}

pub fn get_lds_tempdir() -> TempDir {
    let global_tempdir = std::env::temp_dir();
    let lds_tempdir = global_tempdir.join("lds-rust");
    let _ = std::fs::create_dir_all(lds_tempdir.as_path());
    tempfile::tempdir_in(lds_tempdir.as_path()).unwrap_or_else(|_| tempfile::tempdir().expect("temp dir is creatable"))
}

/// Creates a DB within a temp directory under `<OS SPECIFIC TEMP DIR>/lds-rust`
/// Callers must keep the `TempDbLifetime` guard for as long as they wish the DB to exist.
#[macro_export]
macro_rules! create_temp_db {
    ($conn_builder: expr) => {{
        let db_tempdir = $crate::utils::get_lds_tempdir();
        let db_path = db_tempdir.path().to_owned();
        let db = $conn_builder.with_db_path(db_path).build().unwrap();
        ($crate::utils::DbLifetime::new(db_tempdir, std::sync::Arc::downgrade(&db)), db)
    }};
}
