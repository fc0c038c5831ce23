//! Call-site resolution for captured entries.
//!
//! A [`StackWalker`] produces the source locations of the calling frames,
//! starting at the log statement and moving outward. Picking the frame to
//! record is the pure function [`first_unignored`], so the walk itself can be
//! swapped out (a fixed list in tests, metadata only when backtraces are too
//! slow or stripped).

use std::collections::VecDeque;
use std::fmt;
use std::path::Path;

/// Path fragments of the logging framework's own sources, this crate's
/// logger included, so `Logger::with_default` never shows up as a call site.
pub const DEFAULT_IGNORES: &[&str] = &[
    "tracing-core-",
    "tracing-subscriber-",
    "tracing-attributes-",
    "tracing-0.",
    LOGGER_SOURCE,
];

const LOGGER_SOURCE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/src/core/logger.rs");

/// Source location of one stack frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub file: String,
    pub line: u32,
}

impl CallSite {
    #[must_use]
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Whether this frame is the place `anchor` names. Anchors from tracing
    /// metadata are usually relative to the crate root while resolved frames
    /// are absolute, so paths are compared by trailing components.
    #[must_use]
    pub fn is_at(&self, anchor: &Self) -> bool {
        self.line == anchor.line && Path::new(&self.file).ends_with(&anchor.file)
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// First frame whose file contains none of the `ignores` substrings.
pub fn first_unignored<I>(frames: I, ignores: &[String]) -> Option<CallSite>
where
    I: IntoIterator<Item = CallSite>,
{
    frames
        .into_iter()
        .find(|frame| !ignores.iter().any(|ignore| frame.file.contains(ignore.as_str())))
}

/// Produces calling frames, innermost first, starting at `anchor` (the log
/// statement as reported by the logging framework).
pub trait StackWalker: Send + Sync {
    fn frames(&self, anchor: &CallSite) -> Box<dyn Iterator<Item = CallSite>>;
}

/// Walks the real stack with the `backtrace` crate.
///
/// Frames are resolved lazily, and everything inside the logging machinery
/// (up to the anchor) is skipped. When the anchor cannot be found, e.g. in a
/// build without debug info, only the anchor is produced.
#[derive(Debug, Default, Clone, Copy)]
pub struct BacktraceWalker;

impl StackWalker for BacktraceWalker {
    fn frames(&self, anchor: &CallSite) -> Box<dyn Iterator<Item = CallSite>> {
        let mut raw = Vec::new();
        backtrace::trace(|frame| {
            raw.push(frame.clone());
            true
        });
        Box::new(Anchored {
            anchor: Some(anchor.clone()),
            found: false,
            frames: ResolvedFrames {
                raw: raw.into_iter(),
                pending: VecDeque::new(),
            },
        })
    }
}

/// Reports only the call site tracing recorded. Ignoring that file yields
/// no location at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetadataWalker;

impl StackWalker for MetadataWalker {
    fn frames(&self, anchor: &CallSite) -> Box<dyn Iterator<Item = CallSite>> {
        Box::new(std::iter::once(anchor.clone()))
    }
}

/// A fixed sequence of frames, for exercising ignore rules.
#[derive(Debug, Default, Clone)]
pub struct FixedWalker(pub Vec<CallSite>);

impl StackWalker for FixedWalker {
    fn frames(&self, _anchor: &CallSite) -> Box<dyn Iterator<Item = CallSite>> {
        Box::new(self.0.clone().into_iter())
    }
}

struct ResolvedFrames {
    raw: std::vec::IntoIter<backtrace::Frame>,
    pending: VecDeque<CallSite>,
}

impl Iterator for ResolvedFrames {
    type Item = CallSite;

    fn next(&mut self) -> Option<CallSite> {
        loop {
            if let Some(site) = self.pending.pop_front() {
                return Some(site);
            }
            let frame = self.raw.next()?;
            // One frame may resolve to several symbols when calls were inlined.
            backtrace::resolve_frame(&frame, |symbol| {
                if let (Some(file), Some(line)) = (symbol.filename(), symbol.lineno()) {
                    self.pending
                        .push_back(CallSite::new(file.display().to_string(), line));
                }
            });
        }
    }
}

struct Anchored {
    anchor: Option<CallSite>,
    found: bool,
    frames: ResolvedFrames,
}

impl Iterator for Anchored {
    type Item = CallSite;

    fn next(&mut self) -> Option<CallSite> {
        if self.found {
            return self.frames.next();
        }
        let anchor = self.anchor.take()?;
        for site in self.frames.by_ref() {
            if site.is_at(&anchor) {
                self.found = true;
                return Some(site);
            }
        }
        Some(anchor)
    }
}
