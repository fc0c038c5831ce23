//! Process-wide synchronization.
//!
//! Both locks live in one static that exists from process start and is never
//! torn down. They guard state the underlying types do not protect on their
//! own:
//!
//! - `attach` serializes hook start/stop, so two hooks changing the same
//!   logger's hook table and output cannot interleave.
//! - `compare` serializes field-constraint evaluation across matchers
//!   running on different threads, so one matcher's diagnostics and match
//!   flags are never observed half-written by another.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub(crate) struct GlobalLocks {
    attach: Mutex<()>,
    compare: Mutex<()>,
}

impl GlobalLocks {
    const fn new() -> Self {
        Self {
            attach: Mutex::new(()),
            compare: Mutex::new(()),
        }
    }

    /// Held while a hook attaches to or detaches from a logger.
    pub(crate) fn attach(&self) -> MutexGuard<'_, ()> {
        self.attach.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Held while field constraints of one expectation are evaluated.
    pub(crate) fn compare(&self) -> MutexGuard<'_, ()> {
        self.compare.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) static GLOBAL_LOCKS: GlobalLocks = GlobalLocks::new();
