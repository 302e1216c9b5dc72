use arc_swap::ArcSwapOption;
use core::any::{Any, TypeId};
use parking_lot::Mutex;
use std::{collections::BTreeMap, sync::Arc};

use crate::factory::InstanceFactory;

/// Sized holder for the published instance, so the lock-free cell works for
/// unsized interface types as well.
pub(crate) struct InstanceCell<S: ?Sized + 'static> {
    pub(crate) obj: Arc<S>,
}

/// Per-type, process-wide storage behind every access point of type `S`:
/// the atomically published current instance and its factory.
///
/// The published `Arc` is the slot's owning reference; clients receive
/// clones. Clearing the cell retires the instance (the drop happens once the
/// last clone is gone).
pub(crate) struct Slot<S: ?Sized + 'static> {
    instance: ArcSwapOption<InstanceCell<S>>,
    pub(crate) factory: Mutex<InstanceFactory<S>>,
}

impl<S: ?Sized + 'static> Slot<S> {
    fn new() -> Self {
        Self {
            instance: ArcSwapOption::const_empty(),
            factory: Mutex::new(InstanceFactory::new()),
        }
    }

    /// Lock-free acquire-load of the current instance.
    #[inline]
    pub(crate) fn current(&self) -> Option<Arc<S>> {
        self.instance.load().as_ref().map(|cell| Arc::clone(&cell.obj))
    }

    #[inline]
    pub(crate) fn is_populated(&self) -> bool {
        self.instance.load().is_some()
    }

    /// Release-store publication; readers that observe the pointer observe
    /// the fully constructed object behind it.
    #[inline]
    pub(crate) fn publish(&self, obj: Arc<S>) {
        self.instance.store(Some(Arc::new(InstanceCell { obj })));
    }

    #[inline]
    pub(crate) fn clear(&self) {
        self.instance.store(None);
    }

    /// Moves the published cell aside, leaving the slot empty.
    #[inline]
    pub(crate) fn stash(&self) -> Option<Arc<InstanceCell<S>>> {
        self.instance.swap(None)
    }

    /// Counterpart of [`Self::stash`]: puts a stashed cell back verbatim.
    #[inline]
    pub(crate) fn restore(&self, stashed: Option<Arc<InstanceCell<S>>>) {
        self.instance.store(stashed);
    }
}

/// All slots, keyed by service type and leaked on first registration. An
/// explicit lazy registry instead of per-type statics: slot lifetime spans
/// from first use to the end of the process, independent of initialization
/// order at the use sites.
static SLOTS: Mutex<BTreeMap<TypeId, &'static (dyn Any + Send + Sync)>> = Mutex::new(BTreeMap::new());

pub(crate) fn slot_for<S: ?Sized + Send + Sync + 'static>() -> &'static Slot<S> {
    let entry: &'static (dyn Any + Send + Sync) = {
        let mut slots = SLOTS.lock();
        *slots
            .entry(TypeId::of::<S>())
            .or_insert_with(|| Box::leak(Box::new(Slot::<S>::new())))
    };
    entry
        .downcast_ref()
        .expect("Slot registry entry must match the type it is keyed by")
}

/// Address of the instance held by an `Arc`, with pointer metadata stripped;
/// the key under which managed instances are scheduled for deletion.
#[inline]
#[must_use]
pub(crate) fn instance_addr<S: ?Sized>(obj: &Arc<S>) -> usize {
    Arc::as_ptr(obj) as *const () as usize
}
