pub mod channel;
pub mod mem_size;
pub mod triggers;
