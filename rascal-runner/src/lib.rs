//! rascal-runner: Out-of-process run coordination for RasCAL.
//!
//! A [`Coordinator`] launches the fitting engine in a separate worker
//! process, polls the channel that process writes to from the thread that
//! owns the coordinator, and relays what it finds to a [`RunObserver`].
//! The worker side of the protocol lives in [`worker`].
//!

pub mod channel;
pub mod coordinator;
mod error;
pub mod process;
mod settings;
pub mod timer;
pub mod worker;

pub use channel::Channel;
pub use coordinator::{Coordinator, Notification, RunObserver, RunState};
pub use error::{Error, Result};
pub use process::{WorkerCommand, WorkerProcess};
pub use settings::{RunnerSettings, SETTINGS_FILE};
pub use timer::PollTimer;
