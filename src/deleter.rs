use core::sync::atomic::{AtomicBool, Ordering};
use parking_lot::Mutex;
use tracing::debug;

use crate::errors::LifecycleErrorKind;

type KillFn = Box<dyn FnOnce() + Send>;

struct Entry {
    addr: usize,
    kill: KillFn,
}

/// Collects `(address, type-erased deleter)` pairs so destruction of service
/// instances can be deferred to an explicit teardown point, independent of
/// who created them.
///
/// Once [`Self::shutdown`] has run, the registry accepts nothing further:
/// teardown happens exactly once, and any attempt to touch a service past
/// that point is a reported lifecycle error instead of silent re-entry into
/// a half-torn-down structure.
pub struct DeleterRegistry {
    entries: Mutex<Vec<Entry>>,
    shut_down: AtomicBool,
}

static DELETERS: DeleterRegistry = DeleterRegistry::new();

/// The process-wide registry used for instances managed by [`crate::Depend`].
#[inline]
#[must_use]
pub(crate) fn deleters() -> &'static DeleterRegistry {
    &DELETERS
}

impl DeleterRegistry {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            shut_down: AtomicBool::new(false),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Appends a deleter for the object at `addr`.
    ///
    /// The flag is checked while holding the entries lock: a call racing
    /// [`Self::shutdown`] either lands before the final drain or is rejected,
    /// never pushed into an already-drained list.
    pub fn schedule(&self, addr: usize, kill: impl FnOnce() + Send + 'static) -> Result<(), LifecycleErrorKind> {
        let mut entries = self.entries.lock();
        if self.is_shut_down() {
            return Err(LifecycleErrorKind::ShutDown);
        }
        entries.push(Entry {
            addr,
            kill: Box::new(kill),
        });
        Ok(())
    }

    /// Invokes and removes the entry scheduled for `addr`, if any.
    /// Returns whether an entry fired; a missing address is a no-op, so a
    /// second kill on the same address cannot double-free.
    pub fn kill(&self, addr: usize) -> Result<bool, LifecycleErrorKind> {
        let entry = {
            let mut entries = self.entries.lock();
            if self.is_shut_down() {
                return Err(LifecycleErrorKind::ShutDown);
            }
            entries
                .iter()
                .position(|entry| entry.addr == addr)
                .map(|index| entries.remove(index))
        };
        // fire outside the lock: the deleter may call back into the registry
        match entry {
            Some(entry) => {
                (entry.kill)();
                debug!(addr, "Killed");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Invokes and removes every remaining entry, each exactly once.
    /// Order across entries is unspecified.
    pub fn kill_all(&self) -> Result<usize, LifecycleErrorKind> {
        let entries = {
            let mut entries = self.entries.lock();
            if self.is_shut_down() {
                return Err(LifecycleErrorKind::ShutDown);
            }
            core::mem::take(&mut *entries)
        };
        Ok(Self::fire(entries))
    }

    /// One-shot teardown: sets the shutdown flag first, so deleter callbacks
    /// that try to schedule new work are rejected, then fires every entry.
    pub fn shutdown(&self) -> Result<usize, LifecycleErrorKind> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Err(LifecycleErrorKind::RepeatedShutdown);
        }
        // the flag is already set; everything drained here is the final set
        let entries = core::mem::take(&mut *self.entries.lock());
        let killed = Self::fire(entries);
        debug!(killed, "Deleter registry shut down");
        Ok(killed)
    }

    // fire outside the lock: a deleter may call back into the registry
    fn fire(entries: Vec<Entry>) -> usize {
        let killed = entries.len();
        for entry in entries {
            (entry.kill)();
        }
        killed
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.entries.lock().len()
    }
}

impl Default for DeleterRegistry {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
