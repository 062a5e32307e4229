//! Error types for rascal-core.

use thiserror::Error;

/// Result type alias for rascal-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while encoding or decoding channel frames.
#[derive(Error, Debug)]
pub enum Error {
    /// Frame could not be (de)serialised.
    #[error("frame codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Underlying stream error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A blank line was read where a frame was expected.
    #[error("empty frame")]
    EmptyFrame,
}

/// Errors raised by a fitting engine during a run.
///
/// These never cross the process boundary as errors: the worker converts
/// them into a [`crate::WorkerFailure`] and sends that as data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The inputs bundle was rejected by the engine.
    #[error("{0}")]
    InvalidInput(String),

    /// The numerical routine failed while running.
    #[error("{0}")]
    Numerical(String),

    /// The engine returned without the output the procedure requires.
    #[error("{0}")]
    MissingOutput(String),

    /// Any other engine-reported failure, keyed by its own kind.
    #[error("{message}")]
    Other { kind: String, message: String },
}

impl EngineError {
    /// Builds an error from a kind string and message.
    ///
    /// Known kinds map onto their dedicated variants.
    pub fn from_parts(kind: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            "invalid_input" => Self::InvalidInput(message),
            "numerical" => Self::Numerical(message),
            "missing_output" => Self::MissingOutput(message),
            other => Self::Other {
                kind: other.to_string(),
                message,
            },
        }
    }

    /// Stable identifier for the error kind.
    pub fn kind(&self) -> &str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::Numerical(_) => "numerical",
            Self::MissingOutput(_) => "missing_output",
            Self::Other { kind, .. } => kind,
        }
    }
}
