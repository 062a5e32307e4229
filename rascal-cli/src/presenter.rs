//! Console presenter.
//!
//! Turns coordinator notifications into terminal output: engine messages
//! and progress go to the output stream, run lifecycle goes to the log.

use std::io::Write;

use rascal_core::{Procedure, ProgressEvent, RunResult, WorkerFailure};
use rascal_runner::RunObserver;

/// How a run ended, as seen by the presenter.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Still running, or never started.
    Pending,
    Finished { sum_chi: f64 },
    Interrupted,
    Failed(WorkerFailure),
}

/// Extracts the running chi-squared from an engine message.
///
/// Simplex reports it as the third comma-separated field; differential
/// evolution after the second colon, up to the next comma. Other
/// procedures do not report one.
pub fn live_chi_squared(procedure: Procedure, message: &str) -> Option<String> {
    let field = match procedure {
        Procedure::Simplex => message.split(',').nth(2)?,
        Procedure::DifferentialEvolution => message.split(':').nth(2)?.split(',').next()?,
        _ => return None,
    };
    let field = field.trim();
    field.parse::<f64>().ok().map(|_| field.to_string())
}

/// Renders a run to a text stream.
pub struct ConsolePresenter<W: Write> {
    out: W,
    procedure: Procedure,
    chi_squared: Option<String>,
    last_percent: Option<u8>,
    outcome: Outcome,
}

impl<W: Write> ConsolePresenter<W> {
    pub fn new(out: W, procedure: Procedure) -> Self {
        Self {
            out,
            procedure,
            chi_squared: None,
            last_percent: None,
            outcome: Outcome::Pending,
        }
    }

    /// Most recent chi-squared reported during the fit.
    pub fn chi_squared(&self) -> Option<&str> {
        self.chi_squared.as_deref()
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RunObserver for ConsolePresenter<W> {
    fn on_message(&mut self, text: &str) {
        let _ = writeln!(self.out, "{text}");
        if let Some(chi) = live_chi_squared(self.procedure, text) {
            self.chi_squared = Some(chi);
        }
    }

    fn on_progress(&mut self, event: &ProgressEvent) {
        let percent = event.percent();
        // Engines report far more often than a terminal needs.
        if self.last_percent == Some(percent) {
            return;
        }
        self.last_percent = Some(percent);
        if event.label.is_empty() {
            let _ = writeln!(self.out, "[{percent:>3}%]");
        } else {
            let _ = writeln!(self.out, "[{percent:>3}%] {}", event.label);
        }
    }

    fn on_finished(&mut self, result: &RunResult) {
        let sum_chi = result.payload.sum_chi();
        log::info!("{} run finished, chi-squared {sum_chi}", self.procedure);
        let _ = writeln!(self.out, "Final chi-squared: {sum_chi}");
        self.outcome = Outcome::Finished { sum_chi };
    }

    fn on_stopped(&mut self, error: Option<&WorkerFailure>) {
        match error {
            None => {
                log::info!("{} run interrupted!", self.procedure);
                self.outcome = Outcome::Interrupted;
            }
            Some(failure) => {
                log::error!("{} run failed with exception: {failure}", self.procedure);
                self.outcome = Outcome::Failed(failure.clone());
            }
        }
    }
}
