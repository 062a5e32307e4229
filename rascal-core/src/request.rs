//! Run request types.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Procedure, Result};

/// Everything the engine needs for one run.
///
/// The coordinator never looks inside: problem definition, limits, priors
/// and engine controls all travel as one JSON document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunInputs(pub Value);

impl RunInputs {
    /// Wraps an inputs document.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Looks up a top-level entry of the bundle.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// Immutable description of a single computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Opaque inputs bundle.
    pub inputs: RunInputs,
    /// Strategy to run.
    pub procedure: Procedure,
    /// Whether the worker forwards message and progress events.
    #[serde(default = "default_display_events")]
    pub display_events: bool,
}

fn default_display_events() -> bool {
    true
}

impl RunRequest {
    pub fn new(inputs: RunInputs, procedure: Procedure, display_events: bool) -> Self {
        Self {
            inputs,
            procedure,
            display_events,
        }
    }

    /// Writes the request as a single JSON document.
    ///
    /// # Errors
    /// Returns an error if serialisation or the write fails.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Reads a request previously written by [`RunRequest::write_to`].
    ///
    /// # Errors
    /// Returns an error if the stream is not a valid request document.
    pub fn read_from<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }
}
