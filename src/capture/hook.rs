//! The capture hook.
//!
//! A [`LogHook`] attaches to a [`Logger`] and copies every event into a
//! bounded channel. Matchers later drain that channel into the hook's cache.
//!
//! ```rust,ignore
//! use logsift::{LogHook, Logger, assert_logs, assert_no_logs};
//!
//! let logger = Logger::new();
//! let hook = LogHook::builder().logger(&logger).start()?;
//! logger.with_default(|| tracing::info!(task = "exiting", "culler"));
//! assert_logs!(hook, "culler", fields! { "task" => "exiting" });
//! assert_no_logs!(hook);
//! ```

use std::fmt;
use std::io::Write;
use std::sync::mpsc::{SyncSender, TrySendError, sync_channel};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tracing::Level;

use super::cache::{CapturedEntry, EntryCache};
use crate::config::Defaults;
use crate::core::caller::{BacktraceWalker, DEFAULT_IGNORES, StackWalker, first_unignored};
use crate::core::entry::{Entry, FILE_FIELD, FieldValue, LINE_FIELD};
use crate::core::locks::GLOBAL_LOCKS;
use crate::core::logger::{Hook, Logger, Record};
use crate::core::logging::INTERNAL_TARGET;
use crate::core::sink::{Passthrough, Sink};
use crate::error::{Error, Result};

// =============================================================================
// Producer Side
// =============================================================================

/// The part of a hook the logger holds and calls from producer threads.
struct Capture {
    tx: SyncSender<Entry>,
    capacity: usize,
    passthrough: Arc<Passthrough>,
    ignores: RwLock<Vec<String>>,
    walker: Box<dyn StackWalker>,
}

impl Capture {
    fn annotate(&self, entry: &mut Entry, record: &Record<'_>) {
        let Some(anchor) = record.call_site() else {
            return;
        };
        let site = {
            let ignores = self.ignores.read().unwrap_or_else(PoisonError::into_inner);
            first_unignored(self.walker.frames(&anchor), &ignores)
        };
        if let Some(site) = site {
            entry
                .fields
                .insert(FILE_FIELD.to_string(), FieldValue::Str(site.file));
            entry
                .fields
                .insert(LINE_FIELD.to_string(), FieldValue::U64(u64::from(site.line)));
        }
    }
}

impl Hook for Capture {
    fn fire(&self, record: &Record<'_>) -> Result<()> {
        let mut entry = Entry {
            timestamp: record.timestamp,
            level: record.level,
            target: record.target.to_string(),
            message: record.message.to_string(),
            fields: record.fields.clone(),
        };
        self.annotate(&mut entry, record);

        self.tx.try_send(entry).map_err(|err| match err {
            TrySendError::Full(_) => Error::BufferFull {
                capacity: self.capacity,
            },
            TrySendError::Disconnected(_) => Error::Closed,
        })
    }
}

// =============================================================================
// Log Hook
// =============================================================================

/// One capture session on one logger.
///
/// Create it fresh per test, [`start`](Self::start) it, log, assert with the
/// matchers, then [`stop`](Self::stop) it. Dropping a started hook stops it
/// if it is still the logger's attached hook.
pub struct LogHook {
    capture: Arc<Capture>,
    cache: Mutex<EntryCache>,
    logger: Logger,
    started: Mutex<bool>,
}

impl LogHook {
    /// A hook on the global logger with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// A hook on `logger` with default settings.
    #[must_use]
    pub fn for_logger(logger: &Logger) -> Self {
        Self::builder().logger(logger).build()
    }

    #[must_use]
    pub fn builder() -> HookBuilder {
        HookBuilder::default()
    }

    /// Attach as the logger's only hook. Until the hook stops, the logger's
    /// lines go to the visible stream for displayed levels and nowhere
    /// otherwise.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyStarted`] if this hook is attached already.
    pub fn start(&self) -> Result<()> {
        let _attach = GLOBAL_LOCKS.attach();
        let mut started = self.started();
        if *started {
            return Err(Error::AlreadyStarted);
        }
        let hook: Arc<dyn Hook> = self.capture.clone();
        self.logger
            .set_passthrough(Some(Arc::clone(&self.capture.passthrough)));
        self.logger.replace_hooks(vec![hook]);
        *started = true;
        tracing::debug!(
            target: INTERNAL_TARGET,
            capacity = self.capture.capacity,
            "log hook attached"
        );
        Ok(())
    }

    /// Send the logger's lines back to its output and remove *all* of its
    /// hooks.
    ///
    /// # Errors
    ///
    /// [`Error::NotStarted`] if the hook is not attached.
    pub fn stop(&self) -> Result<()> {
        let _attach = GLOBAL_LOCKS.attach();
        let mut started = self.started();
        if !*started {
            return Err(Error::NotStarted);
        }
        self.detach(&mut started);
        Ok(())
    }

    fn detach(&self, started: &mut bool) {
        self.logger.set_passthrough(None);
        self.logger.clear_hooks();
        *started = false;
        tracing::debug!(target: INTERNAL_TARGET, "log hook detached");
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        *self.started()
    }

    /// Mirror entries at these levels to the visible stream. Repeated
    /// registrations are no-ops.
    pub fn display(&self, levels: &[Level]) {
        self.capture.passthrough.show(levels);
    }

    /// Skip stack frames whose file contains `substring` when recording the
    /// call site, e.g. a project's own logging helpers.
    pub fn ignore_caller(&self, substring: impl Into<String>) {
        self.capture
            .ignores
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(substring.into());
    }

    #[must_use]
    pub const fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Entries the channel holds before `fire` fails.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capture.capacity
    }

    /// Every entry captured so far, in arrival order, with match flags.
    /// Queued entries are moved into the cache first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<CapturedEntry> {
        let mut cache = self.cache();
        cache.drain_pending();
        cache.entries().to_vec()
    }

    /// Write every captured entry as one JSON object per line.
    ///
    /// # Errors
    ///
    /// Serialization or I/O failures of `writer`.
    pub fn export_jsonl(&self, mut writer: impl Write) -> Result<usize> {
        let entries = self.snapshot();
        for captured in &entries {
            serde_json::to_writer(&mut writer, captured)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(entries.len())
    }

    pub(crate) fn cache(&self) -> MutexGuard<'_, EntryCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn started(&self) -> MutexGuard<'_, bool> {
        self.started.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for LogHook {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LogHook {
    fn drop(&mut self) {
        let _attach = GLOBAL_LOCKS.attach();
        let mut started = self.started();
        let hook: Arc<dyn Hook> = self.capture.clone();
        if *started && self.logger.has_hook(&hook) {
            self.detach(&mut started);
        }
    }
}

impl fmt::Debug for LogHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogHook")
            .field("capacity", &self.capture.capacity)
            .field("started", &self.is_started())
            .field("logger", &self.logger)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Options for a new [`LogHook`]. Order of calls does not matter.
pub struct HookBuilder {
    logger: Option<Logger>,
    capacity: Option<usize>,
    visible: Sink,
    walker: Box<dyn StackWalker>,
}

impl Default for HookBuilder {
    fn default() -> Self {
        Self {
            logger: None,
            capacity: None,
            visible: Sink::Stderr,
            walker: Box::new(BacktraceWalker),
        }
    }
}

impl HookBuilder {
    /// Attach to `logger` instead of [`Logger::global`].
    #[must_use]
    pub fn logger(mut self, logger: &Logger) -> Self {
        self.logger = Some(logger.clone());
        self
    }

    /// Channel capacity in entries. Zero is treated as one.
    #[must_use]
    pub const fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Stream displayed levels are mirrored to (stderr by default).
    #[must_use]
    pub fn visible(mut self, sink: Sink) -> Self {
        self.visible = sink;
        self
    }

    /// How call sites are resolved.
    #[must_use]
    pub fn walker(mut self, walker: impl StackWalker + 'static) -> Self {
        self.walker = Box::new(walker);
        self
    }

    #[must_use]
    pub fn build(self) -> LogHook {
        let defaults = Defaults::from_env();
        let capacity = self.capacity.unwrap_or(defaults.capacity).max(1);
        let (tx, rx) = sync_channel(capacity);
        let capture = Capture {
            tx,
            capacity,
            passthrough: Arc::new(Passthrough::new(self.visible, defaults.display)),
            ignores: RwLock::new(DEFAULT_IGNORES.iter().map(|s| (*s).to_string()).collect()),
            walker: self.walker,
        };
        LogHook {
            capture: Arc::new(capture),
            cache: Mutex::new(EntryCache::new(rx)),
            logger: self.logger.unwrap_or_else(|| Logger::global().clone()),
            started: Mutex::new(false),
        }
    }

    /// Build and start in one go.
    ///
    /// # Errors
    ///
    /// See [`LogHook::start`].
    pub fn start(self) -> Result<LogHook> {
        let hook = self.build();
        hook.start()?;
        Ok(hook)
    }
}

impl fmt::Debug for HookBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookBuilder")
            .field("logger", &self.logger)
            .field("capacity", &self.capacity)
            .field("visible", &self.visible)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::caller::{CallSite, FixedWalker, MetadataWalker};
    use crate::core::entry::FieldMap;
    use crate::core::sink::SharedBuffer;
    use tracing_test::traced_test;

    fn local_logger() -> Logger {
        Logger::builder()
            .level(Level::TRACE)
            .output(Sink::Discard)
            .errors(Sink::Discard)
            .build()
    }

    #[test]
    fn start_replaces_existing_hooks_and_stop_clears_all() {
        let logger = local_logger();
        let first = LogHook::for_logger(&logger);
        first.start().unwrap();
        let second = LogHook::for_logger(&logger);
        second.start().unwrap();
        assert_eq!(logger.hook_count(), 1);

        second.stop().unwrap();
        assert_eq!(logger.hook_count(), 0);
        assert!(matches!(second.stop(), Err(Error::NotStarted)));
    }

    #[test]
    fn start_twice_is_rejected() {
        let logger = local_logger();
        let hook = LogHook::builder().logger(&logger).start().unwrap();
        assert!(matches!(hook.start(), Err(Error::AlreadyStarted)));
    }

    #[test]
    fn stop_restores_original_output() {
        let original = SharedBuffer::new();
        let logger = Logger::builder()
            .output(Sink::Buffer(original.clone()))
            .build();
        let hook = LogHook::builder().logger(&logger).start().unwrap();
        logger.with_default(|| tracing::info!("hidden"));
        assert!(!logger.output().is_discard());
        assert!(logger.passthrough().is_some());

        hook.stop().unwrap();
        assert!(logger.passthrough().is_none());
        logger.with_default(|| tracing::info!("shown"));
        assert!(!original.contents().contains("hidden"));
        assert!(original.contents().contains("shown"));
    }

    #[test]
    fn restarting_on_a_captured_logger_still_restores_output() {
        let original = SharedBuffer::new();
        let logger = Logger::builder()
            .output(Sink::Buffer(original.clone()))
            .build();
        let first = LogHook::builder().logger(&logger).start().unwrap();
        logger.with_default(|| tracing::info!("seen by first"));
        let second = LogHook::builder().logger(&logger).start().unwrap();
        second.stop().unwrap();

        logger.with_default(|| tracing::info!("after both"));
        let contents = original.contents();
        assert!(!contents.contains("seen by first"));
        assert!(contents.contains("after both"));
        drop(first);
        assert_eq!(logger.hook_count(), 0);
    }

    #[test]
    fn fire_fails_when_buffer_is_full() {
        let logger = local_logger();
        let hook = LogHook::builder()
            .logger(&logger)
            .capacity(2)
            .walker(MetadataWalker)
            .start()
            .unwrap();
        let fields = FieldMap::new();
        let results: Vec<_> = (0..3)
            .flat_map(|_| logger.fire_synthetic(Level::INFO, "x", &fields, None))
            .collect();
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(matches!(results[2], Err(Error::BufferFull { capacity: 2 })));
        assert_eq!(hook.snapshot().len(), 2);
    }

    #[test]
    fn fire_records_first_unignored_frame() {
        let logger = local_logger();
        let walker = FixedWalker(vec![
            CallSite::new("/deps/tracing-core-0.1.33/src/event.rs", 30),
            CallSite::new("/app/src/log_util.rs", 8),
            CallSite::new("/app/src/worker.rs", 77),
        ]);
        let hook = LogHook::builder()
            .logger(&logger)
            .walker(walker)
            .start()
            .unwrap();
        let anchor = CallSite::new("src/log_util.rs", 8);
        let fields = FieldMap::new();

        logger.fire_synthetic(Level::INFO, "a", &fields, Some(&anchor));
        hook.ignore_caller("log_util.rs");
        logger.fire_synthetic(Level::INFO, "b", &fields, Some(&anchor));

        let entries = hook.snapshot();
        assert_eq!(entries[0].entry.location(), "/app/src/log_util.rs:8");
        assert_eq!(entries[1].entry.location(), "/app/src/worker.rs:77");
    }

    #[test]
    fn display_is_idempotent_and_level_scoped() {
        let visible = SharedBuffer::new();
        let logger = local_logger();
        let hook = LogHook::builder()
            .logger(&logger)
            .visible(Sink::Buffer(visible.clone()))
            .start()
            .unwrap();
        hook.display(&[Level::WARN]);
        hook.display(&[Level::WARN]);

        logger.with_default(|| {
            tracing::info!("info line");
            tracing::warn!("warn line");
        });

        let shown = visible.contents();
        assert_eq!(visible.lines().len(), 1);
        assert!(shown.contains("warn line"));
        assert_eq!(hook.snapshot().len(), 2);
    }

    #[test]
    fn drop_detaches_only_if_still_attached() {
        let logger = local_logger();
        let old = LogHook::builder().logger(&logger).start().unwrap();
        let current = LogHook::builder().logger(&logger).start().unwrap();
        drop(old);
        assert_eq!(logger.hook_count(), 1);
        drop(current);
        assert_eq!(logger.hook_count(), 0);
    }

    #[test]
    fn export_writes_json_lines() {
        let logger = local_logger();
        let hook = LogHook::builder()
            .logger(&logger)
            .walker(MetadataWalker)
            .start()
            .unwrap();
        logger.with_default(|| tracing::warn!(attempt = 3_u64, "retrying"));

        let mut out = Vec::new();
        assert_eq!(hook.export_jsonl(&mut out).unwrap(), 1);
        let line: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(line["message"], "retrying");
        assert_eq!(line["level"], "WARN");
        assert_eq!(line["matched"], false);
        assert_eq!(line["fields"]["attempt"], 3);
    }

    #[test]
    #[traced_test]
    fn attach_and_detach_are_traced() {
        let logger = local_logger();
        let hook = LogHook::builder().logger(&logger).capacity(7).start().unwrap();
        hook.stop().unwrap();
        assert!(logs_contain("log hook attached"));
        assert!(logs_contain("capacity=7"));
        assert!(logs_contain("log hook detached"));
    }
}
