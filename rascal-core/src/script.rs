//! Scripted engine.
//!
//! Replays a list of steps taken from the inputs bundle instead of running
//! a numerical routine. Used for dry runs of the run plumbing, demos of the
//! front-end, and tests that need a worker with predictable output.

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Engine, EngineError, EventSink, Procedure, ProgressEvent, RawOutput, Results, RunInputs};

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Emit a message event.
    Message(String),
    /// Emit a progress event.
    Progress {
        fraction: f64,
        #[serde(default)]
        label: String,
    },
    /// Block for a while, standing in for computation.
    Sleep { ms: u64 },
    /// Fail the computation.
    Fail { kind: String, message: String },
    /// Panic inside the engine.
    Panic(String),
    /// Exit the whole process without returning.
    Exit { code: i32 },
}

/// Script read from the `script` entry of the inputs bundle.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Results returned once every step has run.
    #[serde(default)]
    pub results: Results,
    /// Sample data for Bayesian procedures. Defaults to an empty object.
    #[serde(default)]
    pub samples: Option<Value>,
}

impl Script {
    /// Extracts the script from an inputs bundle. A bundle without a
    /// `script` entry runs an empty script.
    ///
    /// # Errors
    /// Returns [`EngineError::InvalidInput`] if the entry is malformed.
    pub fn from_inputs(inputs: &RunInputs) -> Result<Self, EngineError> {
        match inputs.get("script") {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| EngineError::InvalidInput(format!("invalid script: {e}"))),
            None => Ok(Self::default()),
        }
    }
}

/// Engine that plays back a [`Script`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptedEngine;

impl Engine for ScriptedEngine {
    fn compute(
        &self,
        inputs: &RunInputs,
        procedure: Procedure,
        events: &mut dyn EventSink,
    ) -> Result<RawOutput, EngineError> {
        let script = Script::from_inputs(inputs)?;
        log::debug!("scripted {procedure} run with {} steps", script.steps.len());

        for step in script.steps {
            match step {
                Step::Message(text) => events.message(&text),
                Step::Progress { fraction, label } => {
                    events.progress(ProgressEvent::new(fraction, label));
                }
                Step::Sleep { ms } => thread::sleep(Duration::from_millis(ms)),
                Step::Fail { kind, message } => {
                    return Err(EngineError::from_parts(&kind, message));
                }
                Step::Panic(message) => panic!("{message}"),
                Step::Exit { code } => std::process::exit(code),
            }
        }

        let samples = if procedure.is_bayesian() {
            Some(
                script
                    .samples
                    .unwrap_or_else(|| Value::Object(serde_json::Map::new())),
            )
        } else {
            None
        };

        Ok(RawOutput {
            problem: inputs.get("problem").cloned().unwrap_or(Value::Null),
            results: script.results,
            samples,
        })
    }
}
