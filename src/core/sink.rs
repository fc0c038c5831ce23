//! Swappable output destinations for a [`Logger`](super::Logger).

use std::collections::HashSet;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tracing::Level;

/// Where formatted log lines go.
#[derive(Debug, Clone, Default)]
pub enum Sink {
    /// Drop everything.
    Discard,
    /// Process standard error.
    #[default]
    Stderr,
    /// Process standard output.
    Stdout,
    /// In-memory buffer, shared with whoever cloned it.
    Buffer(SharedBuffer),
}

impl Sink {
    /// A writer for one formatted line.
    #[must_use]
    pub fn writer(&self) -> SinkWriter {
        match self {
            Self::Discard => SinkWriter::Discard,
            Self::Stderr => SinkWriter::Stderr(io::stderr()),
            Self::Stdout => SinkWriter::Stdout(io::stdout()),
            Self::Buffer(buffer) => SinkWriter::Buffer(buffer.clone()),
        }
    }

    /// Whether output written here is dropped.
    #[must_use]
    pub const fn is_discard(&self) -> bool {
        matches!(self, Self::Discard)
    }

    /// Write a whole line, ignoring failures of the destination.
    pub fn write_line(&self, line: &str) {
        let mut writer = self.writer();
        let _ = writeln!(writer, "{line}");
        let _ = writer.flush();
    }
}

/// Writer handed out by a [`Sink`].
#[derive(Debug)]
pub enum SinkWriter {
    Discard,
    Stderr(io::Stderr),
    Stdout(io::Stdout),
    Buffer(SharedBuffer),
}

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Discard => Ok(buf.len()),
            Self::Stderr(w) => w.write(buf),
            Self::Stdout(w) => w.write(buf),
            Self::Buffer(b) => {
                b.lock().extend_from_slice(buf);
                Ok(buf.len())
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Discard | Self::Buffer(_) => Ok(()),
            Self::Stderr(w) => w.flush(),
            Self::Stdout(w) => w.flush(),
        }
    }
}

// =============================================================================
// Passthrough
// =============================================================================

/// Per-level routing of formatted lines while a hook captures.
///
/// Lines at a displayed level go to the visible sink, everything else is
/// dropped. The decision is made per event from its level, so concurrent
/// producers at different levels never see each other's routing.
#[derive(Debug)]
pub struct Passthrough {
    visible: Sink,
    levels: RwLock<HashSet<Level>>,
}

impl Passthrough {
    #[must_use]
    pub fn new(visible: Sink, levels: impl IntoIterator<Item = Level>) -> Self {
        Self {
            visible,
            levels: RwLock::new(levels.into_iter().collect()),
        }
    }

    /// Display `levels` too. Already displayed levels are unaffected.
    pub fn show(&self, levels: &[Level]) {
        self.levels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(levels.iter().copied());
    }

    #[must_use]
    pub fn shows(&self, level: Level) -> bool {
        self.levels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&level)
    }

    /// Writer for one line at `level`.
    #[must_use]
    pub fn writer_for(&self, level: Level) -> SinkWriter {
        if self.shows(level) {
            self.visible.writer()
        } else {
            SinkWriter::Discard
        }
    }

    #[must_use]
    pub const fn visible(&self) -> &Sink {
        &self.visible
    }
}

// =============================================================================
// Shared Buffer
// =============================================================================

/// Cloneable in-memory byte buffer.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.bytes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Buffer contents as (lossy) UTF-8.
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }

    /// Contents split into lines.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    /// Take the contents, leaving the buffer empty.
    #[must_use]
    pub fn take(&self) -> String {
        let bytes = std::mem::take(&mut *self.lock());
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
