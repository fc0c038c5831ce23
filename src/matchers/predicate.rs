//! Value predicates used for messages and field constraints.
//!
//! Plain values convert to [`Equal`]. The other predicates cover the usual
//! needs of log assertions: patterns, substrings and arbitrary checks.

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::core::entry::FieldValue;
use crate::error::{Error, Result};

// =============================================================================
// Predicate Interface
// =============================================================================

/// A check against one value, able to explain itself when it fails.
pub trait Predicate: Send + Sync + fmt::Debug {
    /// Whether `actual` satisfies the predicate. An `Err` means it could not
    /// be evaluated at all, which aborts the whole match.
    fn matches(&self, actual: &FieldValue) -> Result<bool>;

    /// Expectation phrase, e.g. `to equal "done"`.
    fn describe(&self) -> String;

    /// Short form shown inside field constraint listings, e.g. `"done"`.
    fn expected(&self) -> String;

    fn failure_message(&self, actual: &str) -> String {
        format!("Expected\n    {actual}\n{}", self.describe())
    }

    fn negated_failure_message(&self, actual: &str) -> String {
        format!("Expected\n    {actual}\nnot {}", self.describe())
    }
}

fn text<'a>(predicate: &str, actual: &'a FieldValue) -> Result<&'a str> {
    actual.as_text().ok_or_else(|| Error::NotText {
        predicate: predicate.to_string(),
        actual: actual.kind().to_string(),
    })
}

// =============================================================================
// Built-in Predicates
// =============================================================================

/// Exact equality. Signed and unsigned integers compare by value.
#[derive(Debug, Clone, PartialEq)]
pub struct Equal(pub FieldValue);

impl Predicate for Equal {
    fn matches(&self, actual: &FieldValue) -> Result<bool> {
        Ok(*actual == self.0)
    }

    fn describe(&self) -> String {
        format!("to equal {}", self.0.quoted())
    }

    fn expected(&self) -> String {
        self.0.quoted()
    }
}

/// Regular expression search over a textual value.
#[derive(Debug, Clone)]
pub struct MatchRegex(Regex);

impl MatchRegex {
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Predicate for MatchRegex {
    fn matches(&self, actual: &FieldValue) -> Result<bool> {
        Ok(self.0.is_match(text("match_regex", actual)?))
    }

    fn describe(&self) -> String {
        format!("to match regular expression {:?}", self.0.as_str())
    }

    fn expected(&self) -> String {
        format!("=~ /{}/", self.0.as_str())
    }
}

/// Substring search over a textual value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainSubstring(pub String);

impl Predicate for ContainSubstring {
    fn matches(&self, actual: &FieldValue) -> Result<bool> {
        Ok(text("contain_substring", actual)?.contains(self.0.as_str()))
    }

    fn describe(&self) -> String {
        format!("to contain substring {:?}", self.0)
    }

    fn expected(&self) -> String {
        format!("contains {:?}", self.0)
    }
}

type Check = dyn Fn(&FieldValue) -> anyhow::Result<bool> + Send + Sync;

/// A named closure. Closure errors surface as [`Error::Predicate`].
#[derive(Clone)]
pub struct Satisfy {
    name: String,
    check: Arc<Check>,
}

impl Predicate for Satisfy {
    fn matches(&self, actual: &FieldValue) -> Result<bool> {
        (self.check)(actual).map_err(Error::Predicate)
    }

    fn describe(&self) -> String {
        format!("to satisfy {}", self.name)
    }

    fn expected(&self) -> String {
        format!("satisfies {}", self.name)
    }
}

impl fmt::Debug for Satisfy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Satisfy").field("name", &self.name).finish()
    }
}

// =============================================================================
// Constructors
// =============================================================================

#[must_use]
pub fn equal(value: impl Into<FieldValue>) -> Equal {
    Equal(value.into())
}

/// Compile `pattern` into a predicate.
///
/// # Errors
///
/// [`Error::InvalidPattern`] if the pattern does not compile.
pub fn match_regex(pattern: &str) -> Result<MatchRegex> {
    Regex::new(pattern)
        .map(MatchRegex)
        .map_err(|source| Error::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
}

#[must_use]
pub fn contain_substring(needle: impl Into<String>) -> ContainSubstring {
    ContainSubstring(needle.into())
}

pub fn satisfy<F>(name: impl Into<String>, check: F) -> Satisfy
where
    F: Fn(&FieldValue) -> anyhow::Result<bool> + Send + Sync + 'static,
{
    Satisfy {
        name: name.into(),
        check: Arc::new(check),
    }
}

// =============================================================================
// Conversions
// =============================================================================

/// Anything usable where a predicate is expected. Plain values become
/// [`Equal`].
pub trait IntoPredicate {
    fn into_predicate(self) -> Arc<dyn Predicate>;
}

impl IntoPredicate for Arc<dyn Predicate> {
    fn into_predicate(self) -> Arc<dyn Predicate> {
        self
    }
}

macro_rules! predicate_into {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoPredicate for $ty {
                fn into_predicate(self) -> Arc<dyn Predicate> {
                    Arc::new(self)
                }
            }
        )*
    };
}

macro_rules! value_into {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoPredicate for $ty {
                fn into_predicate(self) -> Arc<dyn Predicate> {
                    Arc::new(equal(self))
                }
            }
        )*
    };
}

predicate_into!(Equal, MatchRegex, ContainSubstring, Satisfy);
value_into!(&str, String, i64, i32, u64, u32, f64, bool, FieldValue);
