//! logsift - capture `tracing` events in tests and assert on them.
//!
//! A [`LogHook`] attaches to a [`Logger`] and copies every event into a
//! bounded buffer without ever blocking the thread that logged. Matchers
//! then pull entries out of that buffer, waiting a bounded time for ones
//! that have not arrived yet:
//!
//! - [`HaveLogs`] expects a list of messages, optionally with field
//!   constraints, and fails on the first entry it did not expect.
//! - [`HaveNoLogs`] expects every captured entry to have been claimed.
//!
//! ```rust,ignore
//! use logsift::{LogHook, Logger, assert_logs, assert_no_logs, fields};
//!
//! let logger = Logger::new();
//! let hook = LogHook::builder().logger(&logger).start()?;
//! logger.with_default(|| tracing::warn!(task = "exiting", "culler"));
//! assert_logs!(hook, "culler", fields! { "task" => "exiting" });
//! assert_no_logs!(hook);
//! ```

// Note: deny (not forbid) to allow #[allow(unsafe_code)] in test helpers for env var manipulation
#![deny(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod assertion;
pub mod capture;
pub mod config;
pub mod core;
pub mod error;
pub mod matchers;

/// Test utilities module - included in test builds or when test-utils feature is enabled.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use assertion::{Assertion, assert_that};
pub use capture::{CapturedEntry, HookBuilder, LogHook};
pub use config::Defaults;
pub use crate::core::{
    BacktraceWalker, CallSite, Entry, FieldValue, Hook, LogFormat, LogLevel, Logger,
    LoggerBuilder, MetadataWalker, Passthrough, Record, SharedBuffer, Sink, StackWalker,
};
pub use error::{Error, ErrorCategory, Result};
pub use matchers::{
    Fields, HaveLogs, HaveNoLogs, LogArg, LogMatcher, Predicate, Repeater, contain_substring,
    equal, have_logs, have_no_logs, match_regex, satisfy,
};
