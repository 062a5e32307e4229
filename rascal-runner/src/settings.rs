//! Runner settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::process::WorkerCommand;
use crate::{Error, Result};

/// Name of the settings file inside a project folder.
pub const SETTINGS_FILE: &str = "settings.json";

/// Settings controlling how runs are launched and polled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    /// Interval between channel polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// Longest a single channel drain may wait, in milliseconds.
    pub drain_timeout_ms: u64,
    /// Worker executable. The current executable when unset.
    pub worker_program: Option<PathBuf>,
    /// Arguments passed to the worker executable.
    pub worker_args: Vec<String>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            drain_timeout_ms: 200,
            worker_program: None,
            worker_args: vec!["worker".to_string()],
        }
    }
}

impl RunnerSettings {
    /// Loads settings from `dir/settings.json`, falling back to defaults
    /// when the file does not exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read, parsed, or
    /// fails validation.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let path = dir.as_ref().join(SETTINGS_FILE);
        if !path.is_file() {
            log::debug!("no settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)?;
        let settings: Self = serde_json::from_str(&text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Writes settings to `dir/settings.json`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let path = dir.as_ref().join(SETTINGS_FILE);
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Checks that intervals are usable.
    ///
    /// # Errors
    /// Returns [`Error::InvalidSettings`] for zero intervals.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::InvalidSettings(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.drain_timeout_ms == 0 {
            return Err(Error::InvalidSettings(
                "drain_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Sets the worker command.
    #[must_use]
    pub fn with_worker<I, S>(mut self, program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.worker_program = Some(program.into());
        self.worker_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    /// Resolves the command used to launch the worker.
    ///
    /// # Errors
    /// Returns an error if no program is set and the current executable
    /// cannot be determined.
    pub fn worker_command(&self) -> Result<WorkerCommand> {
        let program = match &self.worker_program {
            Some(program) => program.clone(),
            None => std::env::current_exe()?,
        };
        Ok(WorkerCommand::new(program, self.worker_args.clone()))
    }
}
