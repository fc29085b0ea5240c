extern crate self as lds_notify;

pub mod error;
pub mod events;
pub mod notification;
pub mod notifier;
pub mod subscription;
