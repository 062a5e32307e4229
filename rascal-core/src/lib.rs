//! rascal-core: Shared types for out-of-process RasCAL fitting runs.
//!
//! This crate defines everything that crosses the boundary between the
//! run coordinator and its worker process: the run request, the four
//! channel item variants, result payloads, and the engine hooks the
//! worker drives.
//!

pub mod codec;
pub mod engine;
pub mod error;
pub mod item;
pub mod procedure;
pub mod request;
pub mod results;
pub mod script;

pub use codec::{decode_frame, encode_frame, FrameWriter};
pub use engine::{Engine, EventSink, Silent};
pub use error::{EngineError, Error, Result};
pub use item::{ChannelItem, ProgressEvent, WorkerFailure};
pub use procedure::Procedure;
pub use request::{RunInputs, RunRequest};
pub use results::{
    make_results, BayesResults, CalculationResults, RawOutput, ResultPayload, Results, RunResult,
};
pub use script::{Script, ScriptedEngine, Step};
