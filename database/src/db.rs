use rocksdb::{DBWithThreadMode, MultiThreaded};

pub use conn_builder::{ConnBuilder, Unspecified};

mod conn_builder;

/// The DB type used for light client stores
pub type DB = DBWithThreadMode<MultiThreaded>;
