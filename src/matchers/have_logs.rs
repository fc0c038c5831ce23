//! The have-logs matcher.
//!
//! Expectations are satisfied in arrival order. Cached entries are looked
//! at first, then the matcher waits on the hook's channel, up to the
//! timeout for each new entry. Entries an earlier assertion already claimed
//! are skipped. Any other entry that no remaining expectation accepts fails
//! the match on the spot.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use super::LogMatcher;
use super::args::{Fields, LogArg, Repeater};
use super::predicate::{IntoPredicate, Predicate};
use crate::capture::LogHook;
use crate::config::Defaults;
use crate::core::entry::{Entry, FieldValue, render_fields};
use crate::core::logging::INTERNAL_TARGET;
use crate::error::Result;

#[derive(Debug, Clone)]
struct Expectation {
    predicate: Arc<dyn Predicate>,
    fields: Option<Arc<Fields>>,
    matched: bool,
    resolved: Option<Arc<Entry>>,
}

impl Expectation {
    fn new(predicate: Arc<dyn Predicate>) -> Self {
        Self {
            predicate,
            fields: None,
            matched: false,
            resolved: None,
        }
    }

    fn accepts(&self, entry: &Entry) -> Result<bool> {
        let message = FieldValue::Str(entry.message.clone());
        if !self.predicate.matches(&message)? {
            return Ok(false);
        }
        match &self.fields {
            Some(fields) => fields.satisfied_by(entry),
            None => Ok(true),
        }
    }
}

/// Asserts that a set of entries was logged.
///
/// ```rust,ignore
/// // Three entries, each with task=exiting.
/// have_logs!["culler", "tallier", "summer", fields! { "task" => "exiting" }];
/// // "alpha" and "beta" with any fields, "gamma" with big=whoop.
/// have_logs!["alpha", "beta", fields! {}, "gamma", fields! { "big" => "whoop" }];
/// // Wait up to 100s for each entry.
/// have_logs!["summation", Duration::from_secs(100)];
/// ```
#[derive(Debug, Clone)]
pub struct HaveLogs {
    expectations: Vec<Expectation>,
    timeout: Duration,
    nonmatching: Option<Arc<Entry>>,
}

impl HaveLogs {
    /// No expectations yet, default timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            expectations: Vec::new(),
            timeout: Defaults::from_env().timeout,
            nonmatching: None,
        }
    }

    pub fn from_args(args: impl IntoIterator<Item = LogArg>) -> Self {
        let mut matcher = Self::new();
        for arg in args {
            matcher.push(arg);
        }
        matcher
    }

    /// Apply one argument, in order.
    pub fn push(&mut self, arg: LogArg) {
        match arg {
            LogArg::Message(predicate) => self.expectations.push(Expectation::new(predicate)),
            LogArg::Fields(fields) => {
                let fields = Arc::new(fields);
                for expectation in self.expectations.iter_mut().rev() {
                    if expectation.fields.is_some() {
                        break;
                    }
                    expectation.fields = Some(Arc::clone(&fields));
                }
            }
            LogArg::Repeat(Repeater { predicate, count }) => {
                self.expectations
                    .extend((0..count).map(|_| Expectation::new(Arc::clone(&predicate))));
            }
            LogArg::Timeout(timeout) => self.timeout = timeout,
        }
    }

    #[must_use]
    pub fn message(mut self, predicate: impl IntoPredicate) -> Self {
        self.push(LogArg::message(predicate));
        self
    }

    #[must_use]
    pub fn fields(mut self, fields: Fields) -> Self {
        self.push(LogArg::Fields(fields));
        self
    }

    #[must_use]
    pub fn repeat(mut self, predicate: impl IntoPredicate, count: usize) -> Self {
        self.push(LogArg::Repeat(Repeater::new(predicate, count)));
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.push(LogArg::Timeout(timeout));
        self
    }

    #[must_use]
    pub fn expectation_count(&self) -> usize {
        self.expectations.len()
    }

    #[must_use]
    pub fn unmatched_count(&self) -> usize {
        self.expectations.iter().filter(|e| !e.matched).count()
    }

    /// The entry that ended the last evaluation by matching nothing.
    #[must_use]
    pub fn nonmatching(&self) -> Option<&Entry> {
        self.nonmatching.as_deref()
    }

    /// Mark the first open expectation that accepts `entry`.
    fn claim(&mut self, entry: &Arc<Entry>) -> Result<bool> {
        for expectation in self.expectations.iter_mut().filter(|e| !e.matched) {
            if expectation.accepts(entry)? {
                expectation.matched = true;
                expectation.resolved = Some(Arc::clone(entry));
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn report(&self, negated: bool) -> String {
        let mut message = String::new();

        if let Some(entry) = &self.nonmatching {
            for expectation in self.expectations.iter().filter(|e| !e.matched) {
                let _ = writeln!(
                    message,
                    "{}",
                    expectation.predicate.failure_message(&entry.message)
                );
                if let Some(fields) = &expectation.fields {
                    let _ = writeln!(message, "        with {fields}");
                }
            }
            let _ = writeln!(message, "Nonmatching log:\n  {}", entry.message);
            let _ = writeln!(message, "    logged at {}", entry.location());
            let extra = entry.extra_fields();
            if !extra.is_empty() {
                let _ = writeln!(message, "    with {}", render_fields(&extra));
            }
            return message;
        }

        let not_seen = format!("<no log within {:?}>", self.timeout);
        for expectation in self.expectations.iter().filter(|e| e.matched == negated) {
            match (&expectation.resolved, negated) {
                (Some(entry), true) => {
                    let _ = writeln!(
                        message,
                        "{}",
                        expectation.predicate.negated_failure_message(&entry.message)
                    );
                    let _ = writeln!(message, "logged at {}", entry.location());
                }
                _ => {
                    let _ = writeln!(message, "{}", expectation.predicate.failure_message(&not_seen));
                }
            }
            if let Some(fields) = &expectation.fields {
                let _ = writeln!(message, "with {fields}");
            }
        }
        message
    }
}

impl Default for HaveLogs {
    fn default() -> Self {
        Self::new()
    }
}

impl LogMatcher for HaveLogs {
    fn matches(&mut self, hook: &LogHook) -> Result<bool> {
        for expectation in &mut self.expectations {
            expectation.matched = false;
            expectation.resolved = None;
        }
        self.nonmatching = None;

        let mut cache = hook.cache();
        let mut cursor = 0;
        while self.unmatched_count() > 0 {
            let Some(index) = cache.fetch(cursor, self.timeout) else {
                tracing::debug!(
                    target: INTERNAL_TARGET,
                    unmatched = self.unmatched_count(),
                    timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                    "have-logs timed out"
                );
                return Ok(false);
            };
            cursor = index + 1;

            let entry = match cache.entries().get(index) {
                Some(captured) if !captured.matched => Arc::clone(&captured.entry),
                _ => continue,
            };
            if !self.claim(&entry)? {
                tracing::debug!(
                    target: INTERNAL_TARGET,
                    message = %entry.message,
                    "have-logs hit an unexpected entry"
                );
                self.nonmatching = Some(entry);
                return Ok(false);
            }
            if let Some(captured) = cache.get_mut(index) {
                captured.matched = true;
            }
        }
        Ok(true)
    }

    fn failure_message(&self) -> String {
        self.report(false)
    }

    fn negated_failure_message(&self) -> String {
        self.report(true)
    }
}

/// A have-logs matcher from an argument list.
pub fn have_logs(args: impl IntoIterator<Item = LogArg>) -> HaveLogs {
    HaveLogs::from_args(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::caller::MetadataWalker;
    use crate::core::logger::Logger;
    use crate::core::sink::Sink;
    use crate::fields;
    use crate::matchers::predicate::{equal, match_regex};
    use tracing::Level;

    const SHORT: Duration = Duration::from_millis(50);

    fn session() -> (Logger, LogHook) {
        let logger = Logger::builder()
            .level(Level::TRACE)
            .output(Sink::Discard)
            .errors(Sink::Discard)
            .build();
        let hook = LogHook::builder()
            .logger(&logger)
            .capacity(100)
            .walker(MetadataWalker)
            .start()
            .unwrap();
        (logger, hook)
    }

    #[test]
    fn fields_attach_backwards_until_constrained() {
        let matcher = HaveLogs::new()
            .message("alpha")
            .message("beta")
            .fields(Fields::new())
            .message("gamma")
            .fields(fields! { "big" => "whoop" });
        let constrained: Vec<_> = matcher
            .expectations
            .iter()
            .map(|e| e.fields.as_ref().map(|f| f.len()))
            .collect();
        assert_eq!(constrained, vec![Some(0), Some(0), Some(1)]);
    }

    #[test]
    fn repeater_expands_and_timeout_overrides() {
        let matcher = have_logs([
            LogArg::from(Repeater::new("tick", 4)),
            LogArg::from(SHORT),
        ]);
        assert_eq!(matcher.expectation_count(), 4);
        assert_eq!(matcher.timeout, SHORT);
    }

    #[test]
    fn matches_in_order_with_shared_fields() {
        let (logger, hook) = session();
        logger.with_default(|| {
            tracing::info!(time = "now", "first");
            tracing::info!(time = "now", "second");
        });
        let mut matcher = have_logs([
            LogArg::from("first"),
            LogArg::from("second"),
            LogArg::from(fields! { "time" => "now" }),
            LogArg::from(SHORT),
        ]);
        assert!(matcher.matches(&hook).unwrap());
        assert!(hook.snapshot().iter().all(|c| c.matched));
    }

    #[test]
    fn field_mismatch_is_an_unexpected_entry() {
        let (logger, hook) = session();
        logger.with_default(|| tracing::info!(time = "then", "first"));
        let mut matcher = HaveLogs::new()
            .message("first")
            .fields(fields! { "time" => "now" })
            .timeout(SHORT);
        assert!(!matcher.matches(&hook).unwrap());
        assert_eq!(matcher.nonmatching().unwrap().message, "first");

        let report = matcher.failure_message();
        assert!(report.contains("to equal \"first\""), "{report}");
        assert!(report.contains("with {time: \"now\"}"), "{report}");
        assert!(report.contains("Nonmatching log:\n  first\n"), "{report}");
        assert!(report.contains("with {time: \"then\"}"), "{report}");
        assert!(report.contains("have_logs.rs:"), "{report}");
    }

    #[test]
    fn timeout_reports_expectations_never_seen() {
        let (_logger, hook) = session();
        let mut matcher = HaveLogs::new().message("I need some moolah").timeout(SHORT);
        assert!(!matcher.matches(&hook).unwrap());
        assert!(matcher.nonmatching().is_none());
        assert_eq!(
            matcher.failure_message(),
            "Expected\n    <no log within 50ms>\nto equal \"I need some moolah\"\n"
        );
    }

    #[test]
    fn claimed_entries_are_skipped_by_later_assertions() {
        let (logger, hook) = session();
        logger.with_default(|| {
            tracing::warn!("This is a warning");
            tracing::warn!("This is another warning");
        });
        let mut first = HaveLogs::new().message("This is a warning").timeout(SHORT);
        let mut second = HaveLogs::new().message("This is another warning").timeout(SHORT);
        assert!(first.matches(&hook).unwrap());
        assert!(second.matches(&hook).unwrap());
    }

    #[test]
    fn negated_report_lists_matched_expectations() {
        let (logger, hook) = session();
        logger.with_default(|| tracing::warn!("This is a number: 23984329 yeah"));
        let mut matcher = HaveLogs::new()
            .message(match_regex(r"number: \d+ yeah").unwrap())
            .timeout(SHORT);
        assert!(matcher.matches(&hook).unwrap());
        let report = matcher.negated_failure_message();
        assert!(report.starts_with("Expected\n    This is a number: 23984329 yeah\nnot to match"));
        assert!(report.contains("logged at "));
    }

    #[test]
    fn predicate_errors_abort_the_match() {
        let (logger, hook) = session();
        logger.with_default(|| tracing::info!(code = 7_u64, "failed"));
        let mut matcher = HaveLogs::new()
            .message(equal("failed"))
            .fields(fields! { "code" => match_regex(r"^\d+$").unwrap() })
            .timeout(SHORT);
        assert!(matcher.matches(&hook).is_err());
    }

    #[test]
    fn empty_matcher_succeeds_without_waiting() {
        let (_logger, hook) = session();
        let mut matcher = HaveLogs::new().timeout(Duration::from_secs(60));
        assert!(matcher.matches(&hook).unwrap());
    }
}
