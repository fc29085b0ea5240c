extern crate self as lds_core;

pub mod log;
