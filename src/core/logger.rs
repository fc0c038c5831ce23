//! A tracing dispatcher with a pluggable hook table.
//!
//! A [`Logger`] owns a `tracing::Dispatch` made of two layers on a
//! `Registry`:
//!
//! 1. the hook layer, which gates events by the logger's level and calls
//!    every registered [`Hook`] with a [`Record`] of the event, then
//! 2. a `tracing_subscriber::fmt` layer writing to the logger's output
//!    [`Sink`], or through the installed [`Passthrough`] while a hook
//!    captures.
//!
//! Errors returned by hooks are written to the logger's error stream as
//! `Failed to fire hook: <error>`.

use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::dispatcher::DefaultGuard;
use tracing::level_filters::LevelFilter;
use tracing::subscriber::Interest;
use tracing::{Dispatch, Event, Level, Metadata, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, Layered, SubscriberExt};
use tracing_subscriber::{Layer, Registry};

use super::caller::CallSite;
use super::entry::{FieldMap, FieldVisitor};
use super::logging::{INTERNAL_TARGET, LogFormat};
use super::sink::{Passthrough, Sink, SinkWriter};
use crate::config::Defaults;
use crate::error::Result;

/// Every level, for hooks that want all events.
pub const ALL_LEVELS: [Level; 5] = [
    Level::ERROR,
    Level::WARN,
    Level::INFO,
    Level::DEBUG,
    Level::TRACE,
];

// =============================================================================
// Hook Interface
// =============================================================================

/// Something a [`Logger`] notifies for every enabled event.
///
/// `fire` runs synchronously on the thread that logged, possibly on many
/// threads at once. It must not block.
pub trait Hook: Send + Sync {
    /// Levels this hook wants to see.
    fn levels(&self) -> Vec<Level> {
        ALL_LEVELS.to_vec()
    }

    /// Handle one event. Errors are reported by the logger, never retried.
    fn fire(&self, record: &Record<'_>) -> Result<()>;
}

/// Borrowed view of one event, handed to hooks.
pub struct Record<'a> {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub target: &'a str,
    pub message: &'a str,
    pub fields: &'a FieldMap,
    pub file: Option<&'a str>,
    pub line: Option<u32>,
}

impl Record<'_> {
    /// Where tracing says the event was logged.
    #[must_use]
    pub fn call_site(&self) -> Option<CallSite> {
        Some(CallSite::new(self.file?, self.line?))
    }
}

impl fmt::Debug for Record<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("level", &self.level)
            .field("target", &self.target)
            .field("message", &self.message)
            .field("fields", &self.fields)
            .field("file", &self.file)
            .field("line", &self.line)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Logger
// =============================================================================

struct Shared {
    hooks: RwLock<Vec<Arc<dyn Hook>>>,
    output: RwLock<Sink>,
    passthrough: RwLock<Option<Arc<Passthrough>>>,
    errors: Sink,
    level: RwLock<LevelFilter>,
}

impl Shared {
    fn max_level(&self) -> LevelFilter {
        *self.level.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn hooks_for(&self, level: Level) -> Vec<Arc<dyn Hook>> {
        self.hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|hook| hook.levels().contains(&level))
            .cloned()
            .collect()
    }

    fn writer_for(&self, level: Level) -> SinkWriter {
        let passthrough = self
            .passthrough
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        match passthrough.as_ref() {
            Some(route) => route.writer_for(level),
            None => self.output_writer(),
        }
    }

    fn output_writer(&self) -> SinkWriter {
        self.output
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .writer()
    }
}

/// A logger: one dispatch, its hook table, output and level.
///
/// Cloning is cheap and yields a handle to the same logger.
#[derive(Clone)]
pub struct Logger {
    shared: Arc<Shared>,
    dispatch: Dispatch,
}

impl Logger {
    /// A logger with default settings (see [`LoggerBuilder`]).
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::default()
    }

    /// The process-wide logger, installed as the global tracing default on
    /// first use.
    ///
    /// If another global subscriber was installed first, the logger still
    /// exists but only sees events logged while it is set as the thread
    /// default via [`Logger::set_default`].
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<Logger> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let logger = Self::new();
            if let Err(err) = tracing::dispatcher::set_global_default(logger.dispatch.clone()) {
                tracing::warn!(target: INTERNAL_TARGET, "global logger not installed: {err}");
            }
            logger
        })
    }

    /// The dispatch events must reach for hooks to see them.
    #[must_use]
    pub const fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Route this thread's events to this logger until the guard drops.
    #[must_use = "events are only routed while the guard is alive"]
    pub fn set_default(&self) -> DefaultGuard {
        tracing::dispatcher::set_default(&self.dispatch)
    }

    /// Run `f` with this logger as the thread default.
    pub fn with_default<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    /// Most verbose level that is logged.
    #[must_use]
    pub fn level(&self) -> LevelFilter {
        self.shared.max_level()
    }

    pub fn set_level(&self, level: impl Into<LevelFilter>) {
        *self
            .shared
            .level
            .write()
            .unwrap_or_else(PoisonError::into_inner) = level.into();
    }

    /// Output destination used when no passthrough is installed.
    #[must_use]
    pub fn output(&self) -> Sink {
        self.shared
            .output
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_output(&self, sink: Sink) {
        *self
            .shared
            .output
            .write()
            .unwrap_or_else(PoisonError::into_inner) = sink;
    }

    /// Route formatted lines through `route` instead of the output, or go
    /// back to the output with `None`. The output itself is never changed.
    pub fn set_passthrough(&self, route: Option<Arc<Passthrough>>) {
        *self
            .shared
            .passthrough
            .write()
            .unwrap_or_else(PoisonError::into_inner) = route;
    }

    #[must_use]
    pub fn passthrough(&self) -> Option<Arc<Passthrough>> {
        self.shared
            .passthrough
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Where hook failures are reported.
    #[must_use]
    pub fn errors(&self) -> &Sink {
        &self.shared.errors
    }

    pub fn add_hook(&self, hook: Arc<dyn Hook>) {
        self.hooks_mut().push(hook);
    }

    /// Drop every registered hook and register `hooks` instead.
    pub fn replace_hooks(&self, hooks: Vec<Arc<dyn Hook>>) {
        *self.hooks_mut() = hooks;
    }

    pub fn clear_hooks(&self) {
        self.hooks_mut().clear();
    }

    #[must_use]
    pub fn hook_count(&self) -> usize {
        self.shared
            .hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether `hook` (by identity) is registered.
    #[must_use]
    pub fn has_hook(&self, hook: &Arc<dyn Hook>) -> bool {
        self.shared
            .hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|registered| Arc::ptr_eq(registered, hook))
    }

    /// Whether two handles refer to the same logger.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    fn hooks_mut(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Arc<dyn Hook>>> {
        self.shared
            .hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Fire hooks with a record that did not come from tracing.
    #[cfg(test)]
    pub(crate) fn fire_synthetic(
        &self,
        level: Level,
        message: &str,
        fields: &FieldMap,
        call_site: Option<&CallSite>,
    ) -> Vec<Result<()>> {
        let record = Record {
            timestamp: Utc::now(),
            level,
            target: "synthetic",
            message,
            fields,
            file: call_site.map(|site| site.file.as_str()),
            line: call_site.map(|site| site.line),
        };
        self.shared
            .hooks_for(level)
            .iter()
            .map(|hook| hook.fire(&record))
            .collect()
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.level())
            .field("output", &self.output())
            .field("passthrough", &self.passthrough().is_some())
            .field("hooks", &self.hook_count())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Settings for a new [`Logger`].
#[derive(Debug, Clone)]
pub struct LoggerBuilder {
    level: LevelFilter,
    output: Sink,
    errors: Sink,
    format: LogFormat,
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        let defaults = Defaults::from_env();
        Self {
            level: defaults.level.as_filter(),
            output: Sink::Stderr,
            errors: Sink::Stderr,
            format: defaults.format,
        }
    }
}

impl LoggerBuilder {
    #[must_use]
    pub fn level(mut self, level: impl Into<LevelFilter>) -> Self {
        self.level = level.into();
        self
    }

    /// Initial output destination.
    #[must_use]
    pub fn output(mut self, sink: Sink) -> Self {
        self.output = sink;
        self
    }

    /// Destination for hook failure reports.
    #[must_use]
    pub fn errors(mut self, sink: Sink) -> Self {
        self.errors = sink;
        self
    }

    #[must_use]
    pub const fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn build(self) -> Logger {
        let shared = Arc::new(Shared {
            hooks: RwLock::new(Vec::new()),
            output: RwLock::new(self.output),
            passthrough: RwLock::new(None),
            errors: self.errors,
            level: RwLock::new(self.level),
        });

        let writer = OutputWriter(Arc::clone(&shared));
        let hooks = HookLayer {
            shared: Arc::clone(&shared),
        };
        let formatter: Box<dyn Layer<Layered<HookLayer, Registry>> + Send + Sync> =
            match self.format {
                LogFormat::Json => tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(writer)
                    .boxed(),
                LogFormat::Compact => tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(writer)
                    .with_ansi(false)
                    .without_time()
                    .boxed(),
                LogFormat::Human => tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(false)
                    .without_time()
                    .boxed(),
            };
        let subscriber = tracing_subscriber::registry().with(hooks).with(formatter);

        Logger {
            shared,
            dispatch: Dispatch::new(subscriber),
        }
    }
}

// =============================================================================
// Layers
// =============================================================================

struct HookLayer {
    shared: Arc<Shared>,
}

impl<S: Subscriber> Layer<S> for HookLayer {
    fn register_callsite(&self, _metadata: &'static Metadata<'static>) -> Interest {
        // The level can change at runtime, so never let tracing cache a verdict.
        Interest::sometimes()
    }

    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        metadata.target() != INTERNAL_TARGET && *metadata.level() <= self.shared.max_level()
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let hooks = self.shared.hooks_for(*metadata.level());
        if hooks.is_empty() {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        let record = Record {
            timestamp: Utc::now(),
            level: *metadata.level(),
            target: metadata.target(),
            message: &visitor.message,
            fields: &visitor.fields,
            file: metadata.file(),
            line: metadata.line(),
        };

        for hook in hooks {
            if let Err(err) = hook.fire(&record) {
                self.shared
                    .errors
                    .write_line(&format!("Failed to fire hook: {err}"));
            }
        }
    }
}

/// Hands the fmt layer a writer chosen for each event's level.
struct OutputWriter(Arc<Shared>);

impl<'a> MakeWriter<'a> for OutputWriter {
    type Writer = SinkWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.0.output_writer()
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        self.0.writer_for(*meta.level())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sink::SharedBuffer;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<String>>,
        fail: bool,
    }

    impl Hook for Recording {
        fn fire(&self, record: &Record<'_>) -> Result<()> {
            self.seen.lock().unwrap().push(record.message.to_string());
            if self.fail {
                return Err(crate::error::Error::BufferFull { capacity: 0 });
            }
            Ok(())
        }
    }

    fn buffered() -> (Logger, SharedBuffer, SharedBuffer) {
        let out = SharedBuffer::new();
        let errors = SharedBuffer::new();
        let logger = Logger::builder()
            .level(Level::DEBUG)
            .output(Sink::Buffer(out.clone()))
            .errors(Sink::Buffer(errors.clone()))
            .build();
        (logger, out, errors)
    }

    #[test]
    fn hooks_see_enabled_events() {
        let (logger, out, _) = buffered();
        let hook = Arc::new(Recording::default());
        logger.add_hook(hook.clone());

        logger.with_default(|| {
            tracing::debug!("visible to hook");
            tracing::trace!("below level");
        });

        assert_eq!(*hook.seen.lock().unwrap(), vec!["visible to hook"]);
        assert!(out.contents().contains("visible to hook"));
        assert!(!out.contents().contains("below level"));
    }

    #[test]
    fn level_changes_apply_immediately() {
        let (logger, out, _) = buffered();
        logger.set_level(Level::WARN);
        logger.with_default(|| tracing::info!("quiet"));
        logger.set_level(Level::INFO);
        logger.with_default(|| tracing::info!("loud"));
        assert_eq!(out.lines().len(), 1);
        assert!(out.contents().contains("loud"));
    }

    #[test]
    fn hook_errors_go_to_error_stream() {
        let (logger, _, errors) = buffered();
        logger.add_hook(Arc::new(Recording {
            fail: true,
            ..Recording::default()
        }));
        logger.with_default(|| tracing::info!("boom"));
        assert_eq!(
            errors.contents(),
            "Failed to fire hook: internal buffer full, use a higher capacity value\n"
        );
    }

    #[test]
    fn internal_diagnostics_are_not_captured() {
        let (logger, out, _) = buffered();
        let hook = Arc::new(Recording::default());
        logger.add_hook(hook.clone());
        logger.with_default(|| tracing::info!(target: INTERNAL_TARGET, "self talk"));
        assert!(hook.seen.lock().unwrap().is_empty());
        assert!(out.is_empty());
    }

    #[test]
    fn hook_table_replace_and_clear() {
        let (logger, _, _) = buffered();
        let first: Arc<dyn Hook> = Arc::new(Recording::default());
        let second: Arc<dyn Hook> = Arc::new(Recording::default());
        logger.add_hook(first.clone());
        logger.replace_hooks(vec![second.clone()]);
        assert!(!logger.has_hook(&first));
        assert!(logger.has_hook(&second));
        logger.clear_hooks();
        assert_eq!(logger.hook_count(), 0);
    }

    #[test]
    fn passthrough_overrides_output_until_removed() {
        let (logger, out, _) = buffered();
        let visible = SharedBuffer::new();
        logger.set_passthrough(Some(Arc::new(Passthrough::new(
            Sink::Buffer(visible.clone()),
            [Level::WARN],
        ))));
        logger.with_default(|| {
            tracing::info!("dropped");
            tracing::warn!("mirrored");
        });
        assert!(out.is_empty());
        assert_eq!(visible.lines().len(), 1);
        assert!(visible.contents().contains("mirrored"));

        logger.set_passthrough(None);
        logger.with_default(|| tracing::info!("back to output"));
        assert!(out.contents().contains("back to output"));
        assert_eq!(visible.lines().len(), 1);
    }

    #[test]
    fn json_format_writes_one_object_per_line() {
        let out = SharedBuffer::new();
        let logger = Logger::builder()
            .format(LogFormat::Json)
            .output(Sink::Buffer(out.clone()))
            .build();
        logger.with_default(|| tracing::info!(user = "ada", "signed in"));
        let line: serde_json::Value = serde_json::from_str(&out.lines()[0]).unwrap();
        assert_eq!(line["fields"]["message"], "signed in");
        assert_eq!(line["fields"]["user"], "ada");
    }
}
