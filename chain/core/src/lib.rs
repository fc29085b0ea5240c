//! Chain data model shared by the light client crates

extern crate self as lds_chain_core;

pub mod account;
pub mod address;
pub mod block;
pub mod bloom;
pub mod filter;
pub mod head;
pub mod header;
pub mod message;
pub mod number;
pub mod receipt;
pub mod tx;

pub use account::Account;
pub use address::Address;
pub use block::{Block, BlockBody};
pub use bloom::Bloom;
pub use filter::LogFilter;
pub use head::ChainHead;
pub use header::Header;
pub use message::Message;
pub use number::BlockNumber;
pub use receipt::{Log, Receipt};
pub use tx::Transaction;

/// Total difficulty type
pub type Difficulty = u128;
