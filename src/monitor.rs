use core::{any::TypeId, marker::PhantomData};
use parking_lot::{Mutex, MutexGuard};
use std::collections::BTreeMap;

use crate::{any::TypeInfo, errors::MonitorErrorKind};

/// One canonical lock per key type, materialized on first use and kept alive
/// for the rest of the process. Keying by `TypeId` alone means two call sites
/// locking the same type always cooperate, whatever wait policy they pick.
static MONITORS: Mutex<BTreeMap<TypeId, &'static Mutex<()>>> = Mutex::new(BTreeMap::new());

fn raw_monitor<X: ?Sized + 'static>() -> &'static Mutex<()> {
    let mut monitors = MONITORS.lock();
    *monitors
        .entry(TypeId::of::<X>())
        .or_insert_with(|| Box::leak(Box::new(Mutex::new(()))))
}

/// Mutual exclusion scoped to a type rather than an instance.
///
/// The storage behind the lock is registered lazily and never torn down, so
/// acquisition is safe at any point of the process lifecycle, including
/// configuration code running before anything else is initialized.
pub struct TypeMonitor<X: ?Sized + 'static>(PhantomData<fn() -> X>);

impl<X: ?Sized + 'static> TypeMonitor<X> {
    /// Blocks until the per-type lock is free, then holds it until the
    /// returned guard is dropped (all exit paths included).
    #[must_use]
    pub fn acquire() -> MonitorGuard {
        MonitorGuard(raw_monitor::<X>().lock())
    }

    /// Non-blocking variant: fails immediately when the lock is contended.
    /// The failure is reported, not fatal; callers choose to retry or abort.
    pub fn try_acquire() -> Result<MonitorGuard, MonitorErrorKind> {
        raw_monitor::<X>()
            .try_lock()
            .map(MonitorGuard)
            .ok_or(MonitorErrorKind::WouldBlock(TypeInfo::of::<X>().name))
    }
}

/// Scoped acquisition of a [`TypeMonitor`]; releases on drop.
#[must_use]
pub struct MonitorGuard(#[allow(dead_code)] MutexGuard<'static, ()>);

#[cfg(test)]
mod tests {
    use super::TypeMonitor;
    use crate::errors::MonitorErrorKind;

    struct KeyA;
    struct KeyB;

    trait Facade {}

    #[test]
    fn test_acquire_and_release() {
        {
            let _guard = TypeMonitor::<KeyA>::acquire();
            assert!(TypeMonitor::<KeyA>::try_acquire().is_err());
        }
        // released on scope exit
        assert!(TypeMonitor::<KeyA>::try_acquire().is_ok());
    }

    #[test]
    fn test_distinct_types_do_not_cooperate() {
        let _guard = TypeMonitor::<KeyB>::acquire();
        assert!(TypeMonitor::<KeyB>::try_acquire().is_err());
        assert!(TypeMonitor::<dyn Facade>::try_acquire().is_ok());
    }

    #[test]
    fn test_would_block_reports_type_name() {
        struct Contended;

        let _guard = TypeMonitor::<Contended>::acquire();
        let Err(MonitorErrorKind::WouldBlock(name)) = TypeMonitor::<Contended>::try_acquire() else {
            panic!("expected WouldBlock");
        };
        assert!(name.contains("Contended"));
    }

    #[test]
    fn test_contended_acquire_blocks_until_release() {
        use std::sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        };

        struct Shared;

        let entered = Arc::new(AtomicBool::new(false));
        let guard = TypeMonitor::<Shared>::acquire();

        let handle = std::thread::spawn({
            let entered = entered.clone();
            move || {
                let _guard = TypeMonitor::<Shared>::acquire();
                entered.store(true, Ordering::SeqCst);
            }
        });

        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(!entered.load(Ordering::SeqCst));

        drop(guard);
        handle.join().unwrap();
        assert!(entered.load(Ordering::SeqCst));
    }
}
