//! Channel item taxonomy.
//!
//! Every value the worker places on the channel is one of four variants.
//! `Message` and `Progress` may appear any number of times; exactly one of
//! `Result` or `Failure` closes the run.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{EngineError, RunResult};

/// Fractional completion update.
///
/// Decoded events go through [`ProgressEvent::new`], so the fraction is in
/// range whatever the worker sent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "ProgressFrame")]
pub struct ProgressEvent {
    /// Completion in `[0, 1]`.
    pub fraction: f64,
    /// Optional description of the current stage.
    #[serde(default)]
    pub label: String,
}

impl ProgressEvent {
    /// Creates a progress event, clamping the fraction into `[0, 1]`.
    ///
    /// Non-finite fractions are reported as zero.
    pub fn new(fraction: f64, label: impl Into<String>) -> Self {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            fraction,
            label: label.into(),
        }
    }

    /// Completion as a whole percentage.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn percent(&self) -> u8 {
        (self.fraction * 100.0).round().clamp(0.0, 100.0) as u8
    }
}

/// Wire form of a progress event, before clamping.
#[derive(Deserialize)]
struct ProgressFrame {
    fraction: f64,
    #[serde(default)]
    label: String,
}

impl From<ProgressFrame> for ProgressEvent {
    fn from(frame: ProgressFrame) -> Self {
        ProgressEvent::new(frame.fraction, frame.label)
    }
}

/// An error raised inside the worker, as data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerFailure {
    /// Stable error kind, e.g. `invalid_input` or `panic`.
    pub kind: String,
    /// Error message as raised.
    pub message: String,
}

impl WorkerFailure {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Failure for a panic caught in the worker.
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "engine panicked".to_string()
        };
        Self::new("panic", message)
    }
}

impl From<&EngineError> for WorkerFailure {
    fn from(err: &EngineError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl From<EngineError> for WorkerFailure {
    fn from(err: EngineError) -> Self {
        Self::from(&err)
    }
}

impl fmt::Display for WorkerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for WorkerFailure {}

/// A value placed on the inter-process channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ChannelItem {
    /// Human-readable log or status line.
    Message(String),
    /// Completion update.
    Progress(ProgressEvent),
    /// Successful outcome of the run.
    Result(Box<RunResult>),
    /// Error raised by the computation.
    Failure(WorkerFailure),
}

impl ChannelItem {
    /// Whether this item closes the run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChannelItem::Result(_) | ChannelItem::Failure(_))
    }
}
