/// Unrecoverable construction-time failures.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateErrorKind {
    #[error("No creator installed for `{0}` and the type provides no implicit constructor")]
    NoCreator(&'static str),
}
