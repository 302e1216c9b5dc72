//! Typed access points for lazily created services.
//!
//! A [`Depend<S>`] handle designates a dependency *by type*: the first access
//! builds the instance through a per-type factory and publishes it for
//! lock-free reads; every later access returns the same instance. The
//! creation strategy stays pluggable until the moment of first use — a
//! subtype singleton, an externally owned service with explicit lifecycle
//! ([`ServiceInstance`]) or a test mock shadowing the real thing ([`Local`])
//! can each be installed through [`DependInject`] without the consuming
//! sites noticing.

pub(crate) mod any;
pub(crate) mod deleter;
pub(crate) mod depend;
pub(crate) mod errors;
pub(crate) mod factory;
pub(crate) mod inject;
pub(crate) mod monitor;
pub(crate) mod slot;

pub use any::TypeInfo;
pub use deleter::DeleterRegistry;
pub use depend::Depend;
pub use errors::{AccessErrorKind, CreateErrorKind, LifecycleErrorKind, MonitorErrorKind};
pub use inject::{DependInject, IntoService, Local, ServiceInstance};
pub use monitor::{MonitorGuard, TypeMonitor};

/// Tears down every instance managed by the process-wide deleter registry,
/// exactly once. Afterwards any attempt to (re)create a service through an
/// access point is a lifecycle error.
///
/// # Errors
/// [`LifecycleErrorKind::RepeatedShutdown`] on a second call.
pub fn shutdown() -> Result<usize, LifecycleErrorKind> {
    deleter::deleters().shutdown()
}
