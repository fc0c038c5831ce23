//! Panicking assertions over matchers.
//!
//! ```rust,ignore
//! assert_that(&hook).should(have_logs!["This is a warning"]);
//! assert_that(&hook).should_not(HaveNoLogs::new());
//! // or
//! assert_logs!(hook, "This is a warning");
//! assert_no_logs!(hook);
//! ```

use crate::capture::LogHook;
use crate::matchers::LogMatcher;

/// Subject of an assertion.
#[derive(Debug, Clone, Copy)]
pub struct Assertion<'a> {
    hook: &'a LogHook,
}

/// Start an assertion about `hook`.
#[must_use]
pub const fn assert_that(hook: &LogHook) -> Assertion<'_> {
    Assertion { hook }
}

impl Assertion<'_> {
    /// Panic with the failure message unless `matcher` matches.
    ///
    /// # Panics
    ///
    /// If the matcher does not match or cannot be evaluated.
    #[track_caller]
    pub fn should(self, mut matcher: impl LogMatcher) {
        match matcher.matches(self.hook) {
            Ok(true) => {}
            Ok(false) => panic!("{}", matcher.failure_message()),
            Err(err) => panic!("log matcher failed ({}): {err}", err.error_code()),
        }
    }

    /// Panic with the negated failure message if `matcher` matches.
    ///
    /// # Panics
    ///
    /// If the matcher matches or cannot be evaluated.
    #[track_caller]
    pub fn should_not(self, mut matcher: impl LogMatcher) {
        match matcher.matches(self.hook) {
            Ok(false) => {}
            Ok(true) => panic!("{}", matcher.negated_failure_message()),
            Err(err) => panic!("log matcher failed ({}): {err}", err.error_code()),
        }
    }
}

/// Assert that `hook` captured entries matching the arguments.
///
/// Takes the same arguments as [`have_logs!`](crate::have_logs).
#[macro_export]
macro_rules! assert_logs {
    ($hook:expr $(, $arg:expr)* $(,)?) => {
        $crate::assert_that(&$hook).should($crate::have_logs![$($arg),*])
    };
}

/// Assert that `hook` holds no unclaimed entries, optionally at one level.
#[macro_export]
macro_rules! assert_no_logs {
    ($hook:expr $(,)?) => {
        $crate::assert_that(&$hook).should($crate::HaveNoLogs::new())
    };
    ($hook:expr, $level:expr $(,)?) => {
        $crate::assert_that(&$hook).should($crate::HaveNoLogs::at($level))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::caller::MetadataWalker;
    use crate::core::logger::Logger;
    use crate::core::sink::Sink;
    use crate::matchers::{HaveLogs, HaveNoLogs};
    use std::time::Duration;
    use tracing::Level;

    fn session() -> (Logger, LogHook) {
        let logger = Logger::builder().output(Sink::Discard).build();
        let hook = LogHook::builder()
            .logger(&logger)
            .walker(MetadataWalker)
            .start()
            .unwrap();
        (logger, hook)
    }

    #[test]
    fn macros_pass_on_matching_logs() {
        let (logger, hook) = session();
        logger.with_default(|| tracing::warn!(task = "exiting", "culler"));
        crate::assert_logs!(hook, "culler", crate::fields! { "task" => "exiting" });
        crate::assert_no_logs!(hook);
        crate::assert_no_logs!(hook, Level::WARN);
    }

    #[test]
    fn should_not_passes_when_logs_remain() {
        let (logger, hook) = session();
        logger.with_default(|| tracing::warn!("This is a warning."));
        assert_that(&hook).should_not(HaveNoLogs::new());
        assert_that(&hook).should(HaveLogs::new().message("This is a warning."));
    }

    #[test]
    #[should_panic(expected = "Expected no logs. Instead, got 1:")]
    fn should_panics_with_failure_message() {
        let (logger, hook) = session();
        logger.with_default(|| tracing::info!("stray"));
        assert_that(&hook).should(HaveNoLogs::new());
    }

    #[test]
    #[should_panic(expected = "not to equal \"seen\"")]
    fn should_not_panics_with_negated_message() {
        let (logger, hook) = session();
        logger.with_default(|| tracing::info!("seen"));
        assert_that(&hook).should_not(
            HaveLogs::new()
                .message("seen")
                .timeout(Duration::from_millis(50)),
        );
    }
}
