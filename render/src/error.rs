//! Shared error type for the whole crate.
//!
//! Every fallible entry point returns [`Result`]. Handle-returning calls
//! yield the handle only on success, so a failed call leaves no partial
//! state behind.

use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum Error {
    /// Generic failure; the cause has already been logged at error level.
    #[error("{0}")]
    Failure(String),

    /// An init-style function was called a second time.
    #[error("already called: {0}")]
    AlreadyCalled(&'static str),

    /// A blocking wait exceeded its caller-supplied timeout.
    #[error("operation timed out")]
    TimeOut,

    /// The memory pool (or a backend allocator) could not satisfy an
    /// allocation request.
    #[error("memory allocation failed: {0}")]
    MemAllocFailure(String),
}

impl Error {
    /// Shorthand used by validation paths (in the core and in backends):
    /// log the message at error level and produce a `Failure`.
    pub fn validation(msg: impl Into<String>) -> Error {
        let msg = msg.into();
        log::error!(target: "levikno", "{}", msg);
        Error::Failure(msg)
    }
}

pub type Result<T> = ::std::result::Result<T, Error>;
