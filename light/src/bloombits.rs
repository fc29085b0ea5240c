//! Bloom index sections and the log search matcher built on top of them

mod matcher;
mod section;
mod session;

pub use matcher::{BloomStatus, Matcher};
pub use section::{section_range, BloomSection};
pub use session::{CancelHandle, InterruptReason, LogStream, MatcherError, MatcherSession};
