//! Test utilities for logsift.
//!
//! Fixtures for loggers whose output and error streams land in memory, so
//! tests can look at what was printed as well as what was captured.
//!
//! # Usage
//!
//! ```rust,ignore
//! use logsift::test_utils::*;
//!
//! let fixture = BufferedLogger::new(Level::DEBUG);
//! let hook = fixture.hook(10);
//! fixture.logger.with_default(|| tracing::info!("hello"));
//! assert_logs!(hook, "hello");
//! ```

use tracing::Level;

use crate::capture::LogHook;
use crate::core::logger::Logger;
use crate::core::sink::{SharedBuffer, Sink};

// =============================================================================
// Logger Fixtures
// =============================================================================

/// A local logger with in-memory output and error streams.
#[derive(Debug, Clone)]
pub struct BufferedLogger {
    pub logger: Logger,
    /// Formatted lines the logger wrote to its output.
    pub output: SharedBuffer,
    /// Hook failures the logger reported.
    pub errors: SharedBuffer,
}

impl BufferedLogger {
    #[must_use]
    pub fn new(level: Level) -> Self {
        let output = SharedBuffer::new();
        let errors = SharedBuffer::new();
        let logger = Logger::builder()
            .level(level)
            .output(Sink::Buffer(output.clone()))
            .errors(Sink::Buffer(errors.clone()))
            .build();
        Self {
            logger,
            output,
            errors,
        }
    }

    /// A started hook on this logger.
    ///
    /// # Panics
    ///
    /// If the hook cannot be started, which only happens on misuse.
    #[must_use]
    pub fn hook(&self, capacity: usize) -> LogHook {
        LogHook::builder()
            .logger(&self.logger)
            .capacity(capacity)
            .start()
            .expect("fresh hook starts")
    }

    /// A started hook whose displayed levels are mirrored to `visible`.
    ///
    /// # Panics
    ///
    /// If the hook cannot be started, which only happens on misuse.
    #[must_use]
    pub fn hook_with_visible(&self, capacity: usize, visible: &SharedBuffer) -> LogHook {
        LogHook::builder()
            .logger(&self.logger)
            .capacity(capacity)
            .visible(Sink::Buffer(visible.clone()))
            .start()
            .expect("fresh hook starts")
    }

    /// Log `count` numbered info entries through this logger.
    pub fn log_numbered(&self, count: usize, prefix: &str) {
        self.logger.with_default(|| {
            for n in 0..count {
                tracing::info!(n, "{prefix} {n}");
            }
        });
    }
}

// =============================================================================
// Assertion Macros
// =============================================================================

/// Assert that a string contains a substring.
///
/// # Examples
///
/// ```rust,ignore
/// assert_contains!(hook_failure, "logged at");
/// ```
#[macro_export]
macro_rules! assert_contains {
    ($haystack:expr, $needle:expr) => {
        let haystack = $haystack;
        let needle = $needle;
        assert!(
            haystack.contains(needle),
            "Expected string to contain {:?}\n\nActual string:\n{:?}",
            needle,
            haystack
        );
    };
}

/// Assert that a string does NOT contain a substring.
#[macro_export]
macro_rules! assert_not_contains {
    ($haystack:expr, $needle:expr) => {
        let haystack = $haystack;
        let needle = $needle;
        assert!(
            !haystack.contains(needle),
            "Expected string NOT to contain {:?}\n\nActual string:\n{:?}",
            needle,
            haystack
        );
    };
}
