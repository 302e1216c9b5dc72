mod access;
mod create;
mod lifecycle;
mod monitor;

pub use access::AccessErrorKind;
pub use create::CreateErrorKind;
pub use lifecycle::LifecycleErrorKind;
pub use monitor::MonitorErrorKind;
