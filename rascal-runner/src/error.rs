//! Runner error types.

use thiserror::Error;

/// Result type for runner operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Runner error types.
///
/// Failures of the computation itself are not errors here: they arrive as
/// data on the channel and are reported through the observer.
#[derive(Error, Debug)]
pub enum Error {
    /// `start()` was called on a coordinator that is already running.
    #[error("run already started")]
    AlreadyStarted,

    /// `start()` was called after the run reached a terminal state.
    #[error("run has already ended; create a new coordinator")]
    AlreadyEnded,

    /// The worker process could not be launched.
    #[error("failed to spawn worker `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Settings failed validation.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Settings file could not be parsed or written.
    #[error("settings format error: {0}")]
    SettingsFormat(#[from] serde_json::Error),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] rascal_core::Error),
}
