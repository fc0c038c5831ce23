//! Captured log entries and their field values.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use tracing::Level;
use tracing::field::{Field, Visit};

/// Synthetic field holding the caller's source file.
pub const FILE_FIELD: &str = "file";
/// Synthetic field holding the caller's source line.
pub const LINE_FIELD: &str = "line";

/// Name tracing gives the formatted message of an event.
pub(crate) const MESSAGE_FIELD: &str = "message";

// =============================================================================
// Field Values
// =============================================================================

/// A single structured field value, keeping the type tracing recorded.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Str(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    /// Value recorded through its `Debug` implementation.
    Debug(String),
}

impl FieldValue {
    /// Textual view of the value, if it has one.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Str(s) | Self::Debug(s) => Some(s),
            _ => None,
        }
    }

    /// Short type name used in diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::I64(_) => "i64",
            Self::U64(_) => "u64",
            Self::F64(_) => "f64",
            Self::Bool(_) => "bool",
            Self::Debug(_) => "debug",
        }
    }

    /// Quoted rendering for failure messages: strings are quoted,
    /// everything else prints as recorded.
    #[must_use]
    pub fn quoted(&self) -> String {
        match self {
            Self::Str(s) => format!("{s:?}"),
            other => other.to_string(),
        }
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            // `%` and `?` fields arrive as `Debug`; text compares by content
            // whichever way it was recorded.
            (Self::Str(a) | Self::Debug(a), Self::Str(b) | Self::Debug(b)) => a == b,
            (Self::I64(a), Self::I64(b)) => a == b,
            (Self::U64(a), Self::U64(b)) => a == b,
            // tracing records unsigned values as u64 even when the literal
            // was written as a signed integer.
            (Self::I64(a), Self::U64(b)) | (Self::U64(b), Self::I64(a)) => {
                u64::try_from(*a).is_ok_and(|a| a == *b)
            }
            (Self::F64(a), Self::F64(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) | Self::Debug(s) => f.write_str(s),
            Self::I64(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::I64(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::I64(i64::from(value))
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        Self::U64(value)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        Self::U64(u64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::F64(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Field mapping of an entry. Keys are unique; later values overwrite.
pub type FieldMap = BTreeMap<String, FieldValue>;

// =============================================================================
// Entry
// =============================================================================

/// One captured log record.
///
/// Entries are copied out of the tracing event when the hook fires, so they
/// never alias framework buffers. The only fields added after the copy are
/// the synthetic [`FILE_FIELD`] and [`LINE_FIELD`].
#[derive(Debug, Clone, Serialize)]
pub struct Entry {
    pub timestamp: DateTime<Utc>,
    #[serde(serialize_with = "serialize_level")]
    pub level: Level,
    pub target: String,
    pub message: String,
    pub fields: FieldMap,
}

impl Entry {
    /// Create an entry stamped with the current time.
    #[must_use]
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            target: String::new(),
            message: message.into(),
            fields: FieldMap::new(),
        }
    }

    /// Builder-style field insertion.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Recorded caller file, if the hook resolved one.
    #[must_use]
    pub fn file(&self) -> Option<&str> {
        self.fields.get(FILE_FIELD).and_then(FieldValue::as_text)
    }

    /// Recorded caller line, if the hook resolved one.
    #[must_use]
    pub fn line(&self) -> Option<u64> {
        match self.fields.get(LINE_FIELD)? {
            FieldValue::U64(line) => Some(*line),
            FieldValue::I64(line) => u64::try_from(*line).ok(),
            _ => None,
        }
    }

    /// `file:line` of the call site, or `<unknown>`.
    #[must_use]
    pub fn location(&self) -> String {
        match (self.file(), self.line()) {
            (Some(file), Some(line)) => format!("{file}:{line}"),
            (Some(file), None) => file.to_string(),
            _ => "<unknown>".to_string(),
        }
    }

    /// Fields without the synthetic location pair.
    #[must_use]
    pub fn extra_fields(&self) -> FieldMap {
        self.fields
            .iter()
            .filter(|(key, _)| key.as_str() != FILE_FIELD && key.as_str() != LINE_FIELD)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_level<S: Serializer>(level: &Level, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(level.as_str())
}

/// Render a field map as `{key: value, ...}` with quoted strings.
#[must_use]
pub fn render_fields(fields: &FieldMap) -> String {
    let body = fields
        .iter()
        .map(|(key, value)| format!("{key}: {}", value.quoted()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{body}}}")
}

// =============================================================================
// Event Visitor
// =============================================================================

/// Collects the message and fields of a tracing event.
#[derive(Debug, Default)]
pub(crate) struct FieldVisitor {
    pub message: String,
    pub fields: FieldMap,
}

impl FieldVisitor {
    fn put(&mut self, field: &Field, value: FieldValue) {
        let name = field.name();
        if name == MESSAGE_FIELD {
            self.message = value.to_string();
        } else {
            self.fields.insert(name.to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, FieldValue::Debug(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, FieldValue::Str(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, FieldValue::I64(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, FieldValue::U64(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, FieldValue::F64(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, FieldValue::Bool(value));
    }

    fn record_i128(&mut self, field: &Field, value: i128) {
        let value = i64::try_from(value).map_or_else(
            |_| FieldValue::Debug(value.to_string()),
            FieldValue::I64,
        );
        self.put(field, value);
    }

    fn record_u128(&mut self, field: &Field, value: u128) {
        let value = u64::try_from(value).map_or_else(
            |_| FieldValue::Debug(value.to_string()),
            FieldValue::U64,
        );
        self.put(field, value);
    }
}
