//! Common helpers for integration tests.
//!
//! Every test builds its own local logger so tests can run in parallel
//! without sharing a hook table.

#![allow(dead_code)]

use std::time::Duration;

use logsift::test_utils::BufferedLogger;
use logsift::{LogHook, MetadataWalker};
use tracing::Level;

/// Timeout for matchers that are expected to fail.
pub const SHORT: Duration = Duration::from_millis(100);

/// A debug-level logger with in-memory streams and a started hook on it.
pub fn session() -> (BufferedLogger, LogHook) {
    let fixture = BufferedLogger::new(Level::DEBUG);
    let hook = fixture.hook(1000);
    (fixture, hook)
}

/// Like [`session`], but call sites come from tracing metadata only.
pub fn metadata_session() -> (BufferedLogger, LogHook) {
    let fixture = BufferedLogger::new(Level::DEBUG);
    let hook = LogHook::builder()
        .logger(&fixture.logger)
        .walker(MetadataWalker)
        .start()
        .expect("fresh hook starts");
    (fixture, hook)
}

/// Logs `message` through `fixture`'s logger from inside this file, for
/// tests that ignore helper frames.
pub fn log_through_helper(fixture: &BufferedLogger, message: &str) {
    fixture.logger.with_default(|| tracing::info!("{message}"));
}
