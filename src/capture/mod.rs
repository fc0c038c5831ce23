//! Capturing entries from a logger.

pub mod cache;
pub mod hook;

pub use cache::CapturedEntry;
pub use hook::{HookBuilder, LogHook};
