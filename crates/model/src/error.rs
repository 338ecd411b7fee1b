use std::error::Error;

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The backend answered with a non-success HTTP status.
    Request,
    /// The operation was abandoned because its cancellation token fired.
    Cancelled,
    /// The adapter was misconfigured (bad URL, missing credentials).
    Config,
    /// Any other errors.
    Other,
}

/// The error type for a model adapter.
pub trait AdapterError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;

    /// The HTTP status code, for errors of kind [`ErrorKind::Request`].
    fn status(&self) -> Option<u16> {
        None
    }
}
