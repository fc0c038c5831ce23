//! The have-no-logs matcher.

use std::fmt::Write as _;
use std::sync::Arc;

use tracing::Level;

use super::LogMatcher;
use crate::capture::LogHook;
use crate::core::entry::{Entry, render_fields};
use crate::error::Result;

/// Asserts that nothing is left unclaimed.
///
/// Evaluation moves everything queued into the cache, at every level, so
/// later assertions see a complete cache. With a level set, only unclaimed
/// entries at that level count.
#[derive(Debug, Clone, Default)]
pub struct HaveNoLogs {
    level: Option<Level>,
    unmatched: Vec<Arc<Entry>>,
    seen: Vec<Arc<Entry>>,
}

impl HaveNoLogs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only count entries at `level`.
    #[must_use]
    pub fn at(level: Level) -> Self {
        Self {
            level: Some(level),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn level(&self) -> Option<Level> {
        self.level
    }

    /// Unclaimed entries found by the last evaluation.
    #[must_use]
    pub fn unmatched(&self) -> &[Arc<Entry>] {
        &self.unmatched
    }
}

impl LogMatcher for HaveNoLogs {
    fn matches(&mut self, hook: &LogHook) -> Result<bool> {
        let mut cache = hook.cache();
        cache.drain_pending();
        self.unmatched = cache
            .unmatched(self.level)
            .into_iter()
            .map(|captured| Arc::clone(&captured.entry))
            .collect();
        self.seen = cache
            .entries()
            .iter()
            .filter(|captured| self.level.is_none_or(|level| captured.entry.level == level))
            .map(|captured| Arc::clone(&captured.entry))
            .collect();
        Ok(self.unmatched.is_empty())
    }

    fn failure_message(&self) -> String {
        let mut message = format!("Expected no logs. Instead, got {}:", self.unmatched.len());
        for entry in &self.unmatched {
            let extra = entry.extra_fields();
            let extra = if extra.is_empty() {
                String::new()
            } else {
                format!(" ({})", render_fields(&extra))
            };
            let _ = write!(
                message,
                "\n  {}{extra}\n  logged at {}",
                entry.message,
                entry.location()
            );
        }
        message
    }

    fn negated_failure_message(&self) -> String {
        let mut message = String::from("Did not expect 0 logs\n");
        for entry in &self.seen {
            let _ = write!(message, "\n{}\n  logged at {}", entry.message, entry.location());
        }
        message
    }
}

/// A have-no-logs matcher, optionally scoped to one level.
#[must_use]
pub fn have_no_logs(level: Option<Level>) -> HaveNoLogs {
    level.map_or_else(HaveNoLogs::new, HaveNoLogs::at)
}
