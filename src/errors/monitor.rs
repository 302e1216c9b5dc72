#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorErrorKind {
    #[error("Monitor for `{0}` is held elsewhere and the non-blocking variant was requested")]
    WouldBlock(&'static str),
}
