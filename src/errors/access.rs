use super::{create::CreateErrorKind, lifecycle::LifecycleErrorKind};

/// Anything `Depend::get` or a configuration handle can fail with.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessErrorKind {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleErrorKind),
    #[error(transparent)]
    Fatal(#[from] CreateErrorKind),
}

impl AccessErrorKind {
    #[inline]
    #[must_use]
    pub const fn is_lifecycle(&self) -> bool {
        matches!(self, Self::Lifecycle(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}
