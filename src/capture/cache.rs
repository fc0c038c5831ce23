//! Consumer side of a hook: the channel receiver plus every entry drained
//! from it so far.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use serde::Serialize;
use tracing::Level;

use crate::core::entry::Entry;

/// An entry in the cache, with whether some expectation already claimed it.
#[derive(Debug, Clone, Serialize)]
pub struct CapturedEntry {
    pub matched: bool,
    #[serde(flatten)]
    pub entry: Arc<Entry>,
}

impl CapturedEntry {
    fn new(entry: Entry) -> Self {
        Self {
            matched: false,
            entry: Arc::new(entry),
        }
    }
}

/// Append-only, arrival-ordered record of drained entries.
///
/// Only matchers write to it, always while holding the hook's cache lock, so
/// cache order is channel order.
pub(crate) struct EntryCache {
    rx: Receiver<Entry>,
    entries: Vec<CapturedEntry>,
}

impl EntryCache {
    pub(crate) const fn new(rx: Receiver<Entry>) -> Self {
        Self {
            rx,
            entries: Vec::new(),
        }
    }

    pub(crate) fn entries(&self) -> &[CapturedEntry] {
        &self.entries
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut CapturedEntry> {
        self.entries.get_mut(index)
    }

    /// Index of the entry at `cursor`: cached if already drained, otherwise
    /// the next one off the channel, waiting up to `timeout`. `None` when
    /// nothing arrived in time.
    pub(crate) fn fetch(&mut self, cursor: usize, timeout: Duration) -> Option<usize> {
        if cursor < self.entries.len() {
            return Some(cursor);
        }
        match self.rx.recv_timeout(timeout) {
            Ok(entry) => {
                self.entries.push(CapturedEntry::new(entry));
                Some(self.entries.len() - 1)
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Move everything queued on the channel into the cache, in order.
    /// Returns how many entries were moved.
    pub(crate) fn drain_pending(&mut self) -> usize {
        let before = self.entries.len();
        loop {
            match self.rx.try_recv() {
                Ok(entry) => self.entries.push(CapturedEntry::new(entry)),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        self.entries.len() - before
    }

    /// Unmatched entries, optionally only those at `level`.
    pub(crate) fn unmatched(&self, level: Option<Level>) -> Vec<&CapturedEntry> {
        self.entries
            .iter()
            .filter(|captured| !captured.matched)
            .filter(|captured| level.is_none_or(|level| captured.entry.level == level))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::sync_channel;

    #[test]
    fn fetch_prefers_cache_then_channel() {
        let (tx, rx) = sync_channel(4);
        let mut cache = EntryCache::new(rx);
        tx.send(Entry::new(Level::INFO, "one")).unwrap();
        tx.send(Entry::new(Level::INFO, "two")).unwrap();

        assert_eq!(cache.fetch(0, Duration::from_millis(10)), Some(0));
        assert_eq!(cache.fetch(0, Duration::from_millis(10)), Some(0));
        assert_eq!(cache.fetch(1, Duration::from_millis(10)), Some(1));
        assert_eq!(cache.fetch(2, Duration::from_millis(10)), None);
        let messages: Vec<_> = cache.entries().iter().map(|c| c.entry.message.as_str()).collect();
        assert_eq!(messages, vec!["one", "two"]);
    }

    #[test]
    fn drain_keeps_order_and_filters_by_level() {
        let (tx, rx) = sync_channel(4);
        let mut cache = EntryCache::new(rx);
        tx.send(Entry::new(Level::WARN, "w")).unwrap();
        tx.send(Entry::new(Level::ERROR, "e")).unwrap();
        tx.send(Entry::new(Level::WARN, "w2")).unwrap();

        assert_eq!(cache.drain_pending(), 3);
        assert_eq!(cache.drain_pending(), 0);
        cache.get_mut(0).unwrap().matched = true;

        assert_eq!(cache.unmatched(None).len(), 2);
        let warns = cache.unmatched(Some(Level::WARN));
        assert_eq!(warns.len(), 1);
        assert_eq!(warns[0].entry.message, "w2");
    }
}
