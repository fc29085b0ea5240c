//! The data-access facade of a light client, as consumed by query surfaces

extern crate self as lds_backend;

pub mod backend;
pub mod error;
pub mod exec;
pub mod txpool;
