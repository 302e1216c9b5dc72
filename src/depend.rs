use std::sync::Arc;
use tracing::{debug, error};

use crate::{
    any::TypeInfo,
    deleter::deleters,
    errors::{AccessErrorKind, LifecycleErrorKind},
    monitor::TypeMonitor,
    slot::{instance_addr, slot_for, Slot},
};

/// Access point to singletons and other kinds of dependencies designated by
/// type. A `Depend<S>` is a lightweight handle; every handle of the same `S`
/// refers to the same process-wide slot, so all factory configuration and
/// the published instance are shared per type.
///
/// Without explicit configuration, [`Depend::new`] exposes a lazily created
/// singleton built through `S::default()`. The creation strategy can be
/// reconfigured prior to first access through [`crate::DependInject`].
pub struct Depend<S: ?Sized + Send + Sync + 'static> {
    slot: &'static Slot<S>,
}

impl<S: ?Sized + Send + Sync + 'static> Clone for Depend<S> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: ?Sized + Send + Sync + 'static> Copy for Depend<S> {}

pub(crate) fn default_singleton<S: Default + Send + Sync + 'static>() -> Arc<S> {
    Arc::new(S::default())
}

impl<S: Default + Send + Sync + 'static> Depend<S> {
    /// Declares an access point for a self-contained service: absent other
    /// configuration, the first access builds a singleton via `S::default()`
    /// and schedules its destruction with the deferred deleter registry.
    #[must_use]
    pub fn new() -> Self {
        let slot = slot_for::<S>();
        slot.factory.lock().ensure_fallback(default_singleton::<S>);
        Self { slot }
    }
}

impl<S: Default + Send + Sync + 'static> Default for Depend<S> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ?Sized + Send + Sync + 'static> Depend<S> {
    /// Declares an access point for an interface type (or any type without
    /// implicit construction). Until a creator is configured, access fails.
    #[must_use]
    pub fn interface() -> Self {
        Self {
            slot: slot_for::<S>(),
        }
    }

    /// Retrieves the current instance, creating it on first access.
    ///
    /// The hot path is a single lock-free acquire-load. The slow path runs
    /// at most once per generation: it serializes on the type's monitor,
    /// re-checks for a lost race, builds through the installed factory,
    /// registers deferred destruction for managed instances and publishes
    /// with release ordering.
    ///
    /// # Errors
    /// Propagates whatever the factory raises; a failed access leaves the
    /// slot untouched, so a corrected later call can still succeed.
    pub fn get(&self) -> Result<Arc<S>, AccessErrorKind> {
        if let Some(obj) = self.slot.current() {
            return Ok(obj);
        }
        fetch(self.slot)
    }

    /// Peeks whether an instance is already available and exposed, without
    /// triggering creation.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.slot.is_populated()
    }

    /// Deconfigures this type: the live instance (if any) is retired right
    /// now rather than at process teardown, and the factory returns to its
    /// pristine state, so the next access starts a fresh generation.
    ///
    /// # Errors
    /// Fails with [`LifecycleErrorKind::ShutDown`] once process teardown has
    /// begun.
    pub fn shutdown(&self) -> Result<(), AccessErrorKind> {
        let _guard = TypeMonitor::<S>::acquire();
        if let Some(obj) = self.slot.current() {
            let addr = instance_addr(&obj);
            drop(obj);
            if !deleters().kill(addr)? {
                // not registry-managed (externally owned): fire the chain directly
                let chain = self.slot.factory.lock().take_deleter();
                if let Some(chain) = chain {
                    chain();
                }
            }
            self.slot.clear();
        }
        self.slot.factory.lock().reset();
        debug!(service = %TypeInfo::of::<S>(), "Deconfigured");
        Ok(())
    }
}

/// Slow path of [`Depend::get`], shared with delegation creators that pull a
/// subtype's slot directly.
pub(crate) fn fetch<S: ?Sized + Send + Sync + 'static>(slot: &'static Slot<S>) -> Result<Arc<S>, AccessErrorKind> {
    if deleters().is_shut_down() {
        let err = LifecycleErrorKind::NotAvailable(TypeInfo::of::<S>().name);
        error!("{}", err);
        return Err(err.into());
    }

    let _guard = TypeMonitor::<S>::acquire();

    // someone may have won the race while we waited for the monitor
    if let Some(obj) = slot.current() {
        return Ok(obj);
    }

    let (obj, managed) = {
        let mut factory = slot.factory.lock();
        let (obj, managed) = factory.invoke().map_err(|err| {
            error!(service = %TypeInfo::of::<S>(), "{}", err);
            err
        })?;
        // the one creation of this generation has happened; a second
        // independent one must not race in afterwards
        factory.disable();
        factory.at_destruction(move || slot.clear());
        (obj, managed)
    };

    if managed {
        deleters().schedule(instance_addr(&obj), move || {
            let chain = slot.factory.lock().take_deleter();
            if let Some(chain) = chain {
                chain();
            }
        })?;
    }

    slot.publish(Arc::clone(&obj));
    debug!(service = %TypeInfo::of::<S>(), managed, "Created");
    Ok(obj)
}
