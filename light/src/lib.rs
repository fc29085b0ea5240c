//! Light client data access: on-demand retrieval of chain data from peers, the local chain
//! view, the bloom index log matcher and ODR-backed state snapshots

extern crate self as lds_light;

pub mod bloombits;
pub mod chain;
pub mod config;
pub mod odr;
pub mod state;
pub mod store;
pub mod test_helpers;
