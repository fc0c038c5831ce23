//! Matchers evaluated against a [`LogHook`].
//!
//! A matcher keeps the state of its last evaluation so it can explain a
//! failure afterwards, the same contract assertion libraries use.

pub mod args;
pub mod have_logs;
pub mod have_no_logs;
pub mod predicate;

use crate::capture::LogHook;
use crate::error::Result;

pub use args::{Fields, LogArg, Repeater};
pub use have_logs::{HaveLogs, have_logs};
pub use have_no_logs::{HaveNoLogs, have_no_logs};
pub use predicate::{
    ContainSubstring, Equal, IntoPredicate, MatchRegex, Predicate, Satisfy, contain_substring,
    equal, match_regex, satisfy,
};

/// Something that can be asserted about a capture session.
pub trait LogMatcher {
    /// Evaluate against `hook`. `Err` means evaluation itself failed (a
    /// predicate could not run), not that the logs did not match.
    fn matches(&mut self, hook: &LogHook) -> Result<bool>;

    /// Why the last evaluation did not match.
    fn failure_message(&self) -> String;

    /// Why the last evaluation matched, for assertions expecting it not to.
    fn negated_failure_message(&self) -> String;
}

/// Build a [`HaveLogs`] from mixed arguments.
///
/// ```rust,ignore
/// have_logs!["first", "second", fields! { "time" => "now" }, Duration::from_millis(100)]
/// ```
#[macro_export]
macro_rules! have_logs {
    ($($arg:expr),* $(,)?) => {{
        let args: ::std::vec::Vec<$crate::LogArg> = ::std::vec![$($crate::LogArg::from($arg)),*];
        $crate::HaveLogs::from_args(args)
    }};
}
