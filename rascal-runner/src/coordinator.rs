//! Run coordinator.
//!
//! Owns one worker process and its channel for the lifetime of a single
//! run. The owning thread calls [`Coordinator::tick`] from its event loop;
//! each due tick drains the channel and reports what it found to a
//! [`RunObserver`] straight away, in channel order.
//!
//! ```text
//! Idle --start--> Running --Result--> Finished
//!   |                |----Failure---> Stopped
//!   +--interrupt-----+--interrupt---> Stopped
//! ```

use std::time::{Duration, Instant};

use rascal_core::{ChannelItem, ProgressEvent, RunRequest, RunResult, WorkerFailure};

use crate::channel::Channel;
use crate::process::WorkerProcess;
use crate::timer::PollTimer;
use crate::{Error, Result, RunnerSettings};

/// Lifecycle state of a coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Constructed, worker not started.
    Idle,
    /// Worker running, channel being polled.
    Running,
    /// A result was received.
    Finished,
    /// Interrupted, or the worker reported a failure.
    Stopped,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Finished | RunState::Stopped)
    }
}

/// Receives notifications from a coordinator.
///
/// Every method has an empty default so callers implement only what they
/// render.
pub trait RunObserver {
    /// A message item arrived.
    fn on_message(&mut self, _text: &str) {}

    /// A progress item arrived.
    fn on_progress(&mut self, _event: &ProgressEvent) {}

    /// The run finished with a result.
    fn on_finished(&mut self, _result: &RunResult) {}

    /// The run stopped. `error` is `None` when the caller interrupted it.
    fn on_stopped(&mut self, _error: Option<&WorkerFailure>) {}
}

/// A recorded notification.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Message(String),
    Progress(ProgressEvent),
    Finished(Box<RunResult>),
    Stopped(Option<WorkerFailure>),
}

impl RunObserver for Vec<Notification> {
    fn on_message(&mut self, text: &str) {
        self.push(Notification::Message(text.to_string()));
    }

    fn on_progress(&mut self, event: &ProgressEvent) {
        self.push(Notification::Progress(event.clone()));
    }

    fn on_finished(&mut self, result: &RunResult) {
        self.push(Notification::Finished(Box::new(result.clone())));
    }

    fn on_stopped(&mut self, error: Option<&WorkerFailure>) {
        self.push(Notification::Stopped(error.cloned()));
    }
}

/// Process and channel owned while a run is active.
struct ActiveRun {
    process: WorkerProcess,
    channel: Channel,
    /// When the process was first seen to have exited.
    exited_at: Option<Instant>,
}

/// Coordinates a single out-of-process run.
///
/// One coordinator per run: once it reaches [`RunState::Finished`] or
/// [`RunState::Stopped`] it cannot be restarted.
pub struct Coordinator {
    request: RunRequest,
    settings: RunnerSettings,
    state: RunState,
    timer: PollTimer,
    active: Option<ActiveRun>,
    worker_pid: Option<u32>,
    result: Option<RunResult>,
    error: Option<WorkerFailure>,
}

impl Coordinator {
    pub fn new(request: RunRequest, settings: RunnerSettings) -> Self {
        let timer = PollTimer::new(settings.poll_interval());
        Self {
            request,
            settings,
            state: RunState::Idle,
            timer,
            active: None,
            worker_pid: None,
            result: None,
            error: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Result of a finished run.
    pub fn result(&self) -> Option<&RunResult> {
        self.result.as_ref()
    }

    /// Failure reported by the worker, if the run stopped on an error.
    pub fn error(&self) -> Option<&WorkerFailure> {
        self.error.as_ref()
    }

    /// Whether the poll timer is armed.
    pub fn is_polling(&self) -> bool {
        self.timer.is_active()
    }

    /// Process id of the worker, kept after teardown.
    pub fn worker_pid(&self) -> Option<u32> {
        self.worker_pid
    }

    /// Whether the worker process is still running. Always `false` once
    /// the coordinator has released it.
    pub fn is_worker_alive(&mut self) -> bool {
        self.active
            .as_mut()
            .is_some_and(|active| active.process.is_alive())
    }

    /// Launches the worker and arms the poll timer.
    ///
    /// # Errors
    /// Returns [`Error::AlreadyStarted`] or [`Error::AlreadyEnded`] if the
    /// coordinator is not idle, and [`Error::Spawn`] if the worker cannot
    /// be launched. The coordinator stays idle after a spawn failure.
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            RunState::Idle => {}
            RunState::Running => return Err(Error::AlreadyStarted),
            RunState::Finished | RunState::Stopped => return Err(Error::AlreadyEnded),
        }

        let command = self.settings.worker_command()?;
        let (process, stdout) = WorkerProcess::spawn(&command, &self.request)?;
        log::info!(
            "started {} run in worker {}",
            self.request.procedure,
            process.id()
        );

        self.worker_pid = Some(process.id());
        self.active = Some(ActiveRun {
            process,
            channel: Channel::open(stdout),
            exited_at: None,
        });
        self.state = RunState::Running;
        self.timer.start(Instant::now());
        Ok(())
    }

    /// Polls the channel if the timer is due. Call from the event loop.
    pub fn tick(&mut self, observer: &mut dyn RunObserver) {
        if self.timer.fire(Instant::now()) {
            self.poll(observer);
        }
    }

    /// Time until the next tick is due, or `None` when not polling.
    pub fn until_next_tick(&self) -> Option<Duration> {
        self.timer.remaining(Instant::now())
    }

    /// Drains the channel and dispatches every item found.
    ///
    /// Does nothing unless the run is active. Never blocks for longer than
    /// the configured drain timeout.
    pub fn poll(&mut self, observer: &mut dyn RunObserver) {
        let timeout = self.settings.drain_timeout();
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let items = active.channel.drain(timeout);

        for item in items {
            match item {
                ChannelItem::Message(text) => observer.on_message(&text),
                ChannelItem::Progress(event) => observer.on_progress(&event),
                ChannelItem::Result(result) => {
                    self.finish(*result, observer);
                    return;
                }
                ChannelItem::Failure(failure) => {
                    self.stop(Some(failure), false, observer);
                    return;
                }
            }
        }

        self.check_worker_exit(observer);
    }

    /// Kills the worker and stops the run.
    ///
    /// Once the run has finished or stopped this does nothing. Interrupting
    /// an idle coordinator stops it without launching anything.
    pub fn interrupt(&mut self, observer: &mut dyn RunObserver) {
        match self.state {
            RunState::Running | RunState::Idle => {
                log::info!("interrupting {} run", self.request.procedure);
                self.stop(None, true, observer);
            }
            RunState::Finished | RunState::Stopped => {
                log::debug!("interrupt ignored, run already {:?}", self.state);
            }
        }
    }

    /// Synthesises a failure when the worker exited without a terminal
    /// item.
    ///
    /// Waits for the channel to close so nothing the worker wrote is lost,
    /// but no longer than the drain timeout after the exit: a descendant of
    /// the worker may hold the pipe open indefinitely.
    fn check_worker_exit(&mut self, observer: &mut dyn RunObserver) {
        let grace = self.settings.drain_timeout();
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.process.is_alive() {
            return;
        }
        let exited_at = *active.exited_at.get_or_insert_with(Instant::now);
        if !active.channel.is_closed() {
            if exited_at.elapsed() < grace {
                return;
            }
            log::warn!(
                "worker {} exited but its channel is still open after {grace:?}",
                active.process.id()
            );
        }
        let status = active
            .process
            .exit_status()
            .map_or_else(|| "unknown status".to_string(), |s| s.to_string());
        log::warn!("worker exited without a result ({status})");
        let failure = WorkerFailure::new(
            "process_exit",
            format!("worker process terminated unexpectedly ({status})"),
        );
        self.stop(Some(failure), false, observer);
    }

    fn finish(&mut self, result: RunResult, observer: &mut dyn RunObserver) {
        self.teardown(false);
        self.state = RunState::Finished;
        log::info!("{} run finished", self.request.procedure);
        let result = self.result.insert(result);
        observer.on_finished(result);
    }

    fn stop(&mut self, error: Option<WorkerFailure>, kill: bool, observer: &mut dyn RunObserver) {
        self.teardown(kill);
        self.state = RunState::Stopped;
        if let Some(failure) = &error {
            log::info!("{} run failed: {failure}", self.request.procedure);
        }
        self.error = error;
        observer.on_stopped(self.error.as_ref());
    }

    /// Stops polling and releases the process and channel.
    ///
    /// The active run is taken out of `self`, so a second call finds
    /// nothing to release.
    fn teardown(&mut self, kill: bool) {
        self.timer.stop();
        let Some(mut active) = self.active.take() else {
            return;
        };
        if kill {
            active.process.kill();
        }
        let status = active.process.join();
        log::debug!("worker {} released ({status:?})", active.process.id());
        active.channel.close();
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        if self.active.is_some() {
            log::warn!("coordinator dropped with a live run; killing worker");
            self.teardown(true);
        }
    }
}
