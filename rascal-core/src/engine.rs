//! Fitting engine seam.
//!
//! The numerical routine is external to this workspace. The worker hands
//! it an [`EventSink`] for the lifetime of one call instead of registering
//! process-global callbacks.

use crate::{ChannelItem, EngineError, Procedure, ProgressEvent, RawOutput, RunInputs};

/// Receives message and progress events from a running engine.
pub trait EventSink {
    /// A human-readable status line.
    fn message(&mut self, text: &str);

    /// A fractional completion update.
    fn progress(&mut self, event: ProgressEvent);
}

/// Sink that drops every event. Used when events are not displayed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl EventSink for Silent {
    fn message(&mut self, _text: &str) {}

    fn progress(&mut self, _event: ProgressEvent) {}
}

impl EventSink for Vec<ChannelItem> {
    fn message(&mut self, text: &str) {
        self.push(ChannelItem::Message(text.to_string()));
    }

    fn progress(&mut self, event: ProgressEvent) {
        self.push(ChannelItem::Progress(event));
    }
}

/// A fitting engine.
///
/// `compute` runs synchronously and may take hours. It reports through
/// `events` and returns raw output for [`crate::make_results`] to shape.
pub trait Engine {
    /// Runs `procedure` on `inputs`.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the computation fails.
    fn compute(
        &self,
        inputs: &RunInputs,
        procedure: Procedure,
        events: &mut dyn EventSink,
    ) -> Result<RawOutput, EngineError>;
}
