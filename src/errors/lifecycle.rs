/// Recoverable-by-design programmer errors: an operation arrived at the
/// wrong point of the application lifecycle.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleErrorKind {
    #[error("Attempt to reconfigure dependency injection for `{0}` after the previously installed factory was used")]
    ConfiguredAfterUse(&'static str),
    #[error("Service `{0}` is not available at this point of the lifecycle")]
    NotAvailable(&'static str),
    #[error("Another instance of service `{0}` is already exposed through its access point")]
    AlreadyActive(&'static str),
    #[error("Deferred deleter registry is shut down, no further scheduling or killing is accepted")]
    ShutDown,
    #[error("Deferred deleter registry was already shut down once")]
    RepeatedShutdown,
}
