use std::sync::Arc;
use tracing::debug;

use crate::{
    any::TypeInfo,
    errors::{AccessErrorKind, CreateErrorKind, LifecycleErrorKind},
};

pub(crate) type Creator<S> = Box<dyn FnMut() -> Result<Arc<S>, AccessErrorKind> + Send>;
pub(crate) type DeleterChain = Box<dyn FnOnce() + Send>;

enum CreatorState<S: ?Sized> {
    /// Nothing installed; the implicit fallback applies, if any.
    Unset,
    /// An explicit creator; `managed` asks the access point to register the
    /// built instance with the deferred deleter registry.
    Set { creator: Creator<S>, managed: bool },
    /// The service's lifetime has ended (or its one creation already
    /// happened); access must not silently resurrect it.
    Disabled,
}

/// Abstracts creation and retirement of one service type: a configurable
/// creator plus a deleter chain fired when the instance is retired.
///
/// Separating "how to build" from "how to destroy" lets the same access
/// point serve singletons, externally-owned services and test mocks without
/// knowing which is installed.
pub(crate) struct InstanceFactory<S: ?Sized + 'static> {
    creator: CreatorState<S>,
    fallback: Option<fn() -> Arc<S>>,
    deleter: Option<DeleterChain>,
}

impl<S: ?Sized + 'static> InstanceFactory<S> {
    #[inline]
    #[must_use]
    pub(crate) const fn new() -> Self {
        Self {
            creator: CreatorState::Unset,
            fallback: None,
            deleter: None,
        }
    }

    /// Installs the implicit default construction, unless a fallback is
    /// already present. Kept separate from [`Self::define_creator`] so that
    /// declaring an access point never overwrites explicit configuration.
    pub(crate) fn ensure_fallback(&mut self, fallback: fn() -> Arc<S>) {
        if self.fallback.is_none() {
            self.fallback = Some(fallback);
        }
    }

    pub(crate) fn define_creator(&mut self, creator: impl FnMut() -> Result<Arc<S>, AccessErrorKind> + Send + 'static) {
        self.creator = CreatorState::Set {
            creator: Box::new(creator),
            managed: false,
        };
    }

    /// Like [`Self::define_creator`], but the built instance is additionally
    /// registered with the deferred deleter registry by the access point.
    pub(crate) fn define_creator_and_manage(&mut self, creator: impl FnMut() -> Result<Arc<S>, AccessErrorKind> + Send + 'static) {
        self.creator = CreatorState::Set {
            creator: Box::new(creator),
            managed: true,
        };
    }

    /// Replaces the creator with one that unconditionally fails. Used once a
    /// service's externally-managed lifetime has ended, and after the one
    /// creation of a generation has happened.
    pub(crate) fn disable(&mut self) {
        self.creator = CreatorState::Disabled;
    }

    /// Returns to the pristine creator state, keeping the fallback: the next
    /// access starts a fresh generation.
    pub(crate) fn reset(&mut self) {
        self.creator = CreatorState::Unset;
        debug!(service = %TypeInfo::of::<S>(), "Factory reset");
    }

    /// Builds a new instance. The second component reports whether the
    /// result should be managed by the deferred deleter registry.
    pub(crate) fn invoke(&mut self) -> Result<(Arc<S>, bool), AccessErrorKind> {
        match &mut self.creator {
            CreatorState::Set { creator, managed } => Ok((creator()?, *managed)),
            CreatorState::Disabled => Err(LifecycleErrorKind::NotAvailable(TypeInfo::of::<S>().name).into()),
            CreatorState::Unset => match self.fallback {
                Some(fallback) => Ok((fallback(), true)),
                None => Err(CreateErrorKind::NoCreator(TypeInfo::of::<S>().name).into()),
            },
        }
    }

    /// Appends `action` to the deleter chain. The previously scheduled chain
    /// runs first, then the new action. The chain stays extensible until it
    /// is actually taken and fired, even while the creator is disabled.
    pub(crate) fn at_destruction(&mut self, action: impl FnOnce() + Send + 'static) {
        self.deleter = Some(match self.deleter.take() {
            Some(chain) => Box::new(move || {
                chain();
                action();
            }),
            None => Box::new(action),
        });
    }

    /// Hands out the deleter chain for firing; at most one caller gets it.
    pub(crate) fn take_deleter(&mut self) -> Option<DeleterChain> {
        self.deleter.take()
    }
}

#[cfg(test)]
mod tests {
    use super::InstanceFactory;
    use crate::errors::{AccessErrorKind, CreateErrorKind, LifecycleErrorKind};
    use std::sync::{
        atomic::{AtomicU8, Ordering},
        Arc, Mutex,
    };

    #[derive(Default)]
    struct Widget;

    #[test]
    fn test_fallback_is_managed() {
        let mut factory = InstanceFactory::<Widget>::new();
        factory.ensure_fallback(|| Arc::new(Widget));

        let (_, managed) = factory.invoke().unwrap();
        assert!(managed);
    }

    #[test]
    fn test_ensure_fallback_does_not_overwrite() {
        static FIRST: fn() -> Arc<Widget> = || Arc::new(Widget);
        static SECOND: fn() -> Arc<Widget> = || unreachable!("fallback must not be replaced");

        let mut factory = InstanceFactory::<Widget>::new();
        factory.ensure_fallback(FIRST);
        factory.ensure_fallback(SECOND);
        factory.invoke().unwrap();
    }

    #[test]
    fn test_no_creator_is_fatal() {
        trait Facade: Send + Sync {}

        let mut factory = InstanceFactory::<dyn Facade>::new();
        let Err(AccessErrorKind::Fatal(CreateErrorKind::NoCreator(name))) = factory.invoke() else {
            panic!("expected fatal NoCreator");
        };
        assert!(name.contains("Facade"));
    }

    #[test]
    fn test_disabled_creator_is_lifecycle_error() {
        let mut factory = InstanceFactory::<Widget>::new();
        factory.ensure_fallback(|| Arc::new(Widget));
        factory.disable();

        assert!(matches!(
            factory.invoke(),
            Err(AccessErrorKind::Lifecycle(LifecycleErrorKind::NotAvailable(_)))
        ));

        // a reset re-arms the fallback for a new generation
        factory.reset();
        assert!(factory.invoke().is_ok());
    }

    #[test]
    fn test_explicit_creator_wins_over_fallback() {
        let calls = Arc::new(AtomicU8::new(0));

        let mut factory = InstanceFactory::<Widget>::new();
        factory.ensure_fallback(|| unreachable!("explicit creator must win"));
        factory.define_creator({
            let calls = calls.clone();
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(Widget))
            }
        });

        let (_, managed) = factory.invoke().unwrap();
        assert!(!managed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_deleter_chain_preserves_insertion_order() {
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut factory = InstanceFactory::<Widget>::new();
        for tag in 1..=3u8 {
            let order = order.clone();
            factory.at_destruction(move || order.lock().unwrap().push(tag));
        }

        let chain = factory.take_deleter().unwrap();
        chain();
        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);

        // fired at most once
        assert!(factory.take_deleter().is_none());
    }

    #[test]
    fn test_chain_extensible_while_disabled() {
        let fired = Arc::new(AtomicU8::new(0));

        let mut factory = InstanceFactory::<Widget>::new();
        factory.disable();
        factory.at_destruction({
            let fired = fired.clone();
            move || {
                fired.fetch_add(1, Ordering::SeqCst);
            }
        });

        factory.take_deleter().unwrap()();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
