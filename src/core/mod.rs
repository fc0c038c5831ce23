//! Core data models and the logger the hooks attach to.

pub mod caller;
pub mod entry;
pub(crate) mod locks;
pub mod logger;
pub mod logging;
pub mod sink;

pub use caller::{
    BacktraceWalker, CallSite, DEFAULT_IGNORES, FixedWalker, MetadataWalker, StackWalker,
    first_unignored,
};
pub use entry::{Entry, FILE_FIELD, FieldMap, FieldValue, LINE_FIELD, render_fields};
pub use logger::{ALL_LEVELS, Hook, Logger, LoggerBuilder, Record};
pub use logging::{INTERNAL_TARGET, LogFormat, LogLevel};
pub use sink::{Passthrough, SharedBuffer, Sink, SinkWriter};
