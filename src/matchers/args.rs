//! Arguments accepted by [`HaveLogs`](super::HaveLogs).
//!
//! The argument list is a closed set of kinds. Order matters: a
//! [`Fields`] constraint attaches to the messages just before it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::predicate::{ContainSubstring, Equal, IntoPredicate, MatchRegex, Predicate, Satisfy};
use crate::core::entry::Entry;
use crate::core::locks::GLOBAL_LOCKS;
use crate::error::Result;

/// One argument of a have-logs matcher.
#[derive(Debug, Clone)]
pub enum LogArg {
    /// One expected entry whose message satisfies the predicate.
    Message(Arc<dyn Predicate>),
    /// Field constraint for the preceding messages that have none yet.
    Fields(Fields),
    /// Several expected entries sharing one predicate.
    Repeat(Repeater),
    /// How long to wait for each new entry.
    Timeout(Duration),
}

impl LogArg {
    pub fn message(predicate: impl IntoPredicate) -> Self {
        Self::Message(predicate.into_predicate())
    }
}

macro_rules! message_arg {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for LogArg {
                fn from(value: $ty) -> Self {
                    Self::message(value)
                }
            }
        )*
    };
}

message_arg!(&str, String, Equal, MatchRegex, ContainSubstring, Satisfy, Arc<dyn Predicate>);

impl From<&String> for LogArg {
    fn from(value: &String) -> Self {
        Self::message(value.clone())
    }
}

impl From<Fields> for LogArg {
    fn from(value: Fields) -> Self {
        Self::Fields(value)
    }
}

impl From<Repeater> for LogArg {
    fn from(value: Repeater) -> Self {
        Self::Repeat(value)
    }
}

impl From<Duration> for LogArg {
    fn from(value: Duration) -> Self {
        Self::Timeout(value)
    }
}

// =============================================================================
// Field Constraints
// =============================================================================

/// Required fields of an entry, each checked by its own predicate.
///
/// An empty constraint still counts as a constraint: it stops later
/// constraints from attaching to the messages before it.
#[derive(Debug, Clone, Default)]
pub struct Fields(Vec<(String, Arc<dyn Predicate>)>);

impl Fields {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Require field `key` to satisfy `predicate` (plain values mean equality).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, predicate: impl IntoPredicate) -> Self {
        self.0.push((key.into(), predicate.into_predicate()));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether every constrained field exists on `entry` and satisfies its
    /// predicate. Evaluations are serialized process-wide.
    pub(crate) fn satisfied_by(&self, entry: &Entry) -> Result<bool> {
        let _compare = GLOBAL_LOCKS.compare();
        for (key, predicate) in &self.0 {
            let Some(value) = entry.fields.get(key) else {
                return Ok(false);
            };
            if !predicate.matches(value)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl fmt::Display for Fields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = self
            .0
            .iter()
            .map(|(key, predicate)| format!("{key}: {}", predicate.expected()))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{{{body}}}")
    }
}

/// Build a [`Fields`] constraint.
///
/// ```rust,ignore
/// let constraint = fields! { "task" => "exiting", "code" => match_regex(r"^E\d+$")? };
/// ```
#[macro_export]
macro_rules! fields {
    () => {
        $crate::Fields::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        $crate::Fields::new()$(.with($key, $value))+
    };
}

// =============================================================================
// Repeater
// =============================================================================

/// `count` expected entries that all satisfy `predicate`.
#[derive(Debug, Clone)]
pub struct Repeater {
    pub(crate) predicate: Arc<dyn Predicate>,
    pub(crate) count: usize,
}

impl Repeater {
    pub fn new(predicate: impl IntoPredicate, count: usize) -> Self {
        Self {
            predicate: predicate.into_predicate(),
            count,
        }
    }

    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }
}
