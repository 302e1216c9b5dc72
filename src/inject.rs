use core::{any::TypeId, marker::PhantomData, mem};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::{debug, error};

use crate::{
    any::TypeInfo,
    depend::{default_singleton, fetch},
    errors::{AccessErrorKind, LifecycleErrorKind},
    factory::InstanceFactory,
    monitor::TypeMonitor,
    slot::{slot_for, InstanceCell, Slot},
};

/// Conversion from a concrete implementation to the service type it is
/// exposed as. The blanket identity impl covers plain singletons; exposing
/// an implementation through an interface takes one line:
///
/// ```
/// use std::sync::Arc;
/// use depcell::IntoService;
///
/// trait Facade: Send + Sync {}
///
/// struct Impl;
/// impl Facade for Impl {}
///
/// impl IntoService<dyn Facade> for Impl {
///     fn into_service(self: Arc<Self>) -> Arc<dyn Facade> {
///         self
///     }
/// }
/// ```
///
/// An implementation that is not compatible with the service type simply
/// cannot write this impl, so incompatible configuration is a compile error.
pub trait IntoService<S: ?Sized>: Send + Sync + 'static {
    #[must_use]
    fn into_service(self: Arc<Self>) -> Arc<S>;
}

impl<T: Send + Sync + 'static> IntoService<T> for T {
    #[inline]
    fn into_service(self: Arc<Self>) -> Arc<T> {
        self
    }
}

/// Reconfigures what [`crate::Depend<S>`] delivers on access, per type.
///
/// All configuration must happen strictly before the first access for `S`;
/// afterwards it fails with a lifecycle error instead of silently replacing
/// an instance someone may already observe. Configuration is meant to run at
/// the site providing the implementation, typically during bootstrap, not at
/// the consuming sites.
pub struct DependInject<S: ?Sized>(PhantomData<fn() -> S>);

impl<S: ?Sized + Send + Sync + 'static> DependInject<S> {
    /// Configures `S` to be served by a lazily built singleton of the
    /// subtype `Sub`. The instance is created through `Sub`'s own slot, so
    /// `Depend<Sub>` and `Depend<S>` expose the identical object.
    ///
    /// # Errors
    /// [`LifecycleErrorKind::ConfiguredAfterUse`] when an instance of `S`
    /// was already exposed.
    pub fn use_singleton<Sub>() -> Result<(), AccessErrorKind>
    where
        Sub: Default + IntoService<S>,
    {
        if TypeId::of::<Sub>() == TypeId::of::<S>() {
            // the default behaviour already builds S itself
            return Ok(());
        }
        slot_for::<Sub>().factory.lock().ensure_fallback(default_singleton::<Sub>);

        let _guard = TypeMonitor::<S>::acquire();
        let slot = slot_for::<S>();
        ensure_pristine(slot)?;
        slot.factory.lock().define_creator(delegate::<S, Sub>());
        debug!(service = %TypeInfo::of::<S>(), subtype = %TypeInfo::of::<Sub>(), "Singleton subtype configured");
        Ok(())
    }

    /// Configures `S` to be served by a subtype singleton built lazily by
    /// the given closure. The closure typically captures the provider's
    /// context; the heap instance it builds is owned by the slot and its
    /// destruction is scheduled with the deferred deleter registry.
    ///
    /// # Errors
    /// [`LifecycleErrorKind::ConfiguredAfterUse`] when an instance of `S`
    /// (or, for a distinct subtype, of `Sub`) was already exposed.
    pub fn use_singleton_with<Sub, F>(mut ctor: F) -> Result<(), AccessErrorKind>
    where
        Sub: IntoService<S>,
        F: FnMut() -> Sub + Send + 'static,
    {
        if TypeId::of::<Sub>() == TypeId::of::<S>() {
            let _guard = TypeMonitor::<S>::acquire();
            let slot = slot_for::<S>();
            ensure_pristine(slot)?;
            slot.factory
                .lock()
                .define_creator_and_manage(move || Ok(Arc::new(ctor()).into_service()));
            debug!(service = %TypeInfo::of::<S>(), "Singleton creator configured");
            Ok(())
        } else {
            // monitor order front-end before subtype, same as the delegate
            let _guard = TypeMonitor::<S>::acquire();
            let slot = slot_for::<S>();
            ensure_pristine(slot)?;
            {
                // the subtype side is validated and configured first, so a
                // rejection leaves both slots untouched
                let _sub_guard = TypeMonitor::<Sub>::acquire();
                let sub_slot = slot_for::<Sub>();
                ensure_pristine(sub_slot)?;
                sub_slot
                    .factory
                    .lock()
                    .define_creator_and_manage(move || Ok(Arc::new(ctor())));
            }
            slot.factory.lock().define_creator(delegate::<S, Sub>());
            debug!(service = %TypeInfo::of::<S>(), subtype = %TypeInfo::of::<Sub>(), "Singleton creator configured");
            Ok(())
        }
    }
}

/// Creator that pulls the subtype's slot and exposes the result through the
/// front-end type, closing the front-end again when the subtype retires.
fn delegate<S, Sub>() -> impl FnMut() -> Result<Arc<S>, AccessErrorKind> + Send + 'static
where
    S: ?Sized + Send + Sync + 'static,
    Sub: IntoService<S>,
{
    move || {
        let obj = fetch(slot_for::<Sub>())?;
        let front = slot_for::<S>();
        slot_for::<Sub>().factory.lock().at_destruction(move || front.clear());
        Ok(obj.into_service())
    }
}

fn ensure_pristine<S: ?Sized + Send + Sync + 'static>(slot: &Slot<S>) -> Result<(), AccessErrorKind> {
    if slot.is_populated() {
        let err = LifecycleErrorKind::ConfiguredAfterUse(TypeInfo::of::<S>().name);
        error!("{}", err);
        return Err(err.into());
    }
    Ok(())
}

/// Exposes a service implementation with an explicit start/stop lifecycle
/// through the `Depend<S>` front-end.
///
/// Construction eagerly builds the implementation and publishes it; dropping
/// the handle retires the instance and leaves access inhibited, so clients
/// touching the service outside its lifetime get a lifecycle error rather
/// than a silently re-created default.
pub struct ServiceInstance<S, I>
where
    S: ?Sized + Send + Sync + 'static,
    I: IntoService<S>,
{
    instance: Option<Arc<I>>,
    slot: &'static Slot<S>,
}

impl<S, I> ServiceInstance<S, I>
where
    S: ?Sized + Send + Sync + 'static,
    I: IntoService<S>,
{
    /// Builds `service` on the heap and exposes it through `Depend<S>`.
    ///
    /// # Errors
    /// [`LifecycleErrorKind::AlreadyActive`] when some instance of `S` is
    /// already published.
    pub fn new(service: I) -> Result<Self, AccessErrorKind> {
        let mut this = Self::inactive();
        this.start(service)?;
        Ok(this)
    }

    /// Creates the handle in deactivated state; the service can be
    /// [started](Self::start) later.
    #[must_use]
    pub fn inactive() -> Self {
        Self {
            instance: None,
            slot: slot_for::<S>(),
        }
    }

    /// Activates service access, replacing a previously started instance of
    /// this same handle, if any.
    ///
    /// # Errors
    /// [`LifecycleErrorKind::AlreadyActive`] when an instance of `S` from
    /// elsewhere is already published.
    pub fn start(&mut self, service: I) -> Result<Arc<I>, AccessErrorKind> {
        self.stop();

        let instance = Arc::new(service);
        let _guard = TypeMonitor::<S>::acquire();
        if self.slot.is_populated() {
            let err = LifecycleErrorKind::AlreadyActive(TypeInfo::of::<S>().name);
            error!("{}", err);
            return Err(err.into());
        }
        // nobody else may independently build an S while we own the lifecycle
        self.slot.factory.lock().disable();
        self.slot.publish(Arc::clone(&instance).into_service());
        self.instance = Some(Arc::clone(&instance));
        debug!(service = %TypeInfo::of::<S>(), "Service started");
        Ok(instance)
    }

    /// Retires the instance and closes access through `Depend<S>`.
    pub fn stop(&mut self) {
        if self.instance.take().is_some() {
            let _guard = TypeMonitor::<S>::acquire();
            self.slot.clear();
            self.slot.factory.lock().disable();
            debug!(service = %TypeInfo::of::<S>(), "Service stopped");
        }
    }

    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.instance.is_some()
    }

    /// The implementation instance, for direct access by the operating
    /// context; `None` while deactivated.
    #[inline]
    #[must_use]
    pub fn instance(&self) -> Option<&Arc<I>> {
        self.instance.as_ref()
    }
}

impl<S, I> Drop for ServiceInstance<S, I>
where
    S: ?Sized + Send + Sync + 'static,
    I: IntoService<S>,
{
    fn drop(&mut self) {
        self.stop();
    }
}

/// Temporarily shadows a dependency with a test mock, restoring whatever was
/// visible before when dropped. Scopes nest arbitrarily: each handle stashes
/// the complete `(instance, factory)` state it found and puts it back
/// verbatim.
///
/// The mock is *not* built eagerly: it materializes on the first access
/// through `Depend<S>` within the scope, observable via
/// [`Self::is_materialized`]. This only works when the test subject pulls
/// the dependency on use instead of caching it.
pub struct Local<S, M>
where
    S: ?Sized + Send + Sync + 'static,
    M: IntoService<S>,
{
    mock: Arc<OnceCell<Arc<M>>>,
    stashed_instance: Option<Arc<InstanceCell<S>>>,
    stashed_factory: InstanceFactory<S>,
    slot: &'static Slot<S>,
}

impl<S, M> Local<S, M>
where
    S: ?Sized + Send + Sync + 'static,
    M: IntoService<S>,
{
    /// Shadows `S` with a mock built through `M::default()` on first access.
    #[must_use]
    pub fn new() -> Self
    where
        M: Default,
    {
        Self::with(M::default)
    }

    /// Shadows `S` with a mock built by the given closure on first access.
    #[must_use]
    pub fn with<F>(mut build: F) -> Self
    where
        F: FnMut() -> M + Send + 'static,
    {
        let slot = slot_for::<S>();
        let mock: Arc<OnceCell<Arc<M>>> = Arc::new(OnceCell::new());

        let _guard = TypeMonitor::<S>::acquire();
        let mut factory = slot.factory.lock();
        let stashed_factory = mem::replace(&mut *factory, InstanceFactory::new());
        let stashed_instance = slot.stash();
        factory.define_creator({
            let cell = Arc::clone(&mock);
            move || {
                let mock = Arc::clone(cell.get_or_init(|| Arc::new(build())));
                Ok(mock.into_service())
            }
        });
        drop(factory);
        debug!(service = %TypeInfo::of::<S>(), mock = %TypeInfo::of::<M>(), "Mock installed");

        Self {
            mock,
            stashed_instance,
            stashed_factory,
            slot,
        }
    }

    /// Whether the first shadowed access has happened yet.
    #[inline]
    #[must_use]
    pub fn is_materialized(&self) -> bool {
        self.mock.get().is_some()
    }

    /// The mock instance, once materialized.
    #[inline]
    #[must_use]
    pub fn instance(&self) -> Option<&Arc<M>> {
        self.mock.get()
    }
}

impl<S, M> Drop for Local<S, M>
where
    S: ?Sized + Send + Sync + 'static,
    M: IntoService<S>,
{
    fn drop(&mut self) {
        let _guard = TypeMonitor::<S>::acquire();
        let mut factory = self.slot.factory.lock();
        *factory = mem::replace(&mut self.stashed_factory, InstanceFactory::new());
        self.slot.restore(self.stashed_instance.take());
        debug!(service = %TypeInfo::of::<S>(), "Mock scope left, original state restored");
    }
}

impl<S, M> Default for Local<S, M>
where
    S: ?Sized + Send + Sync + 'static,
    M: Default + IntoService<S>,
{
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
