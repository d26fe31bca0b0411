use thiserror::Error;

/// Errors that can occur while constructing a [`Client`](crate::Client).
///
/// All of them are fatal: no client handle is produced. An initialization
/// timeout is not an error, it yields a not-ready client instead.
#[derive(Debug, Error)]
pub enum Error {
    /// The configured site code is empty or blank.
    #[error("site code is empty")]
    EmptySiteCode,

    /// The configured visitor code fails the service's validity rules.
    /// Carries the offending value.
    #[error("visitor code '{0}' is not valid")]
    InvalidVisitorCode(String),

    /// Any other construction failure, usually it should never happen.
    #[error("unexpected initialization error: {0}")]
    Initialization(anyhow::Error),
}
