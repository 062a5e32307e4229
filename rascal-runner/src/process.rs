//! Worker process handle.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::thread;

use rascal_core::RunRequest;

use crate::{Error, Result};

/// Program and arguments used to launch a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// A running (or exited, not yet released) worker process.
///
/// The request is written to the worker's stdin from a background thread,
/// which closes it when done. The worker's stdout is the channel; stderr is
/// inherited so worker logs reach the parent's terminal. On Unix the worker
/// leads its own process group, so a terminal Ctrl-C reaches only the
/// parent and the worker is stopped through [`WorkerProcess::kill`].
#[derive(Debug)]
pub struct WorkerProcess {
    child: Child,
    exit_status: Option<ExitStatus>,
}

impl WorkerProcess {
    /// Launches the worker and hands it `request`.
    ///
    /// Returns the process handle and the read end of the channel. Does not
    /// wait for the worker to read the request.
    ///
    /// # Errors
    /// Returns [`Error::CoreError`] if the request cannot be encoded and
    /// [`Error::Spawn`] if the program cannot be started.
    pub fn spawn(command: &WorkerCommand, request: &RunRequest) -> Result<(Self, ChildStdout)> {
        let mut payload = Vec::new();
        request.write_to(&mut payload)?;

        let mut launcher = Command::new(command.program());
        launcher
            .args(command.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            launcher.process_group(0);
        }
        let mut child = launcher
            .spawn()
            .map_err(|source| Error::Spawn {
                program: command.program().display().to_string(),
                source,
            })?;
        log::debug!(
            "spawned worker {} (pid {})",
            command.program().display(),
            child.id()
        );

        if let Some(stdin) = child.stdin.take() {
            send_request(stdin, payload, child.id());
        }

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::Spawn {
                program: command.program().display().to_string(),
                source: std::io::Error::other("worker stdout was not captured"),
            });
        };

        Ok((
            Self {
                child,
                exit_status: None,
            },
            stdout,
        ))
    }

    /// OS process id.
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Whether the process is still running. Never blocks.
    pub fn is_alive(&mut self) -> bool {
        if self.exit_status.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                self.exit_status = Some(status);
                false
            }
            Err(e) => {
                log::warn!("could not query worker {}: {e}", self.id());
                false
            }
        }
    }

    /// Hard-kills the process. Killing an exited process is not an error.
    pub fn kill(&mut self) {
        if !self.is_alive() {
            return;
        }
        match self.child.kill() {
            Ok(()) => log::debug!("killed worker {}", self.id()),
            Err(e) => log::warn!("could not kill worker {}: {e}", self.id()),
        }
    }

    /// Waits for the process to exit and reaps it.
    pub fn join(&mut self) -> Option<ExitStatus> {
        if self.exit_status.is_none() {
            match self.child.wait() {
                Ok(status) => self.exit_status = Some(status),
                Err(e) => log::warn!("could not wait for worker {}: {e}", self.id()),
            }
        }
        self.exit_status
    }

    /// Exit status, once the process has been observed to exit.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }
}

/// Writes the encoded request on a detached thread, then closes stdin.
///
/// A worker that exits before reading its request reports through the
/// channel (or its absence), not through this write.
fn send_request(mut stdin: ChildStdin, payload: Vec<u8>, pid: u32) {
    let spawned = thread::Builder::new()
        .name("rascal-request".to_string())
        .spawn(move || {
            if let Err(e) = stdin.write_all(&payload).and_then(|()| stdin.flush()) {
                log::warn!("could not send request to worker {pid}: {e}");
            }
        });
    if let Err(e) = spawned {
        log::error!("could not start request writer for worker {pid}: {e}");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use rascal_core::{Procedure, RunInputs};
    use std::io::Read;
    use std::time::{Duration, Instant};

    fn sh(script: &str) -> WorkerCommand {
        WorkerCommand::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    fn request() -> RunRequest {
        RunRequest::new(RunInputs::default(), Procedure::Calculate, true)
    }

    #[test]
    fn test_request_reaches_worker_stdin() {
        let (mut process, mut stdout) = WorkerProcess::spawn(&sh("cat"), &request()).unwrap();
        let mut echoed = String::new();
        stdout.read_to_string(&mut echoed).unwrap();
        assert_eq!(RunRequest::read_from(echoed.as_bytes()).unwrap(), request());
        assert!(process.join().unwrap().success());
        assert!(!process.is_alive());
    }

    #[test]
    fn test_large_request_arrives_whole() {
        let big = RunRequest::new(
            RunInputs::new(serde_json::json!({ "data": "x".repeat(2 << 20) })),
            Procedure::Calculate,
            false,
        );
        let started = Instant::now();
        let (mut process, mut stdout) = WorkerProcess::spawn(&sh("sleep 1; cat"), &big).unwrap();
        assert!(started.elapsed() < Duration::from_millis(500));

        let mut echoed = String::new();
        stdout.read_to_string(&mut echoed).unwrap();
        assert_eq!(RunRequest::read_from(echoed.as_bytes()).unwrap(), big);
        assert!(process.join().unwrap().success());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_worker_leads_own_process_group() {
        let (mut process, _stdout) = WorkerProcess::spawn(&sh("exec sleep 30"), &request()).unwrap();
        let stat = std::fs::read_to_string(format!("/proc/{}/stat", process.id())).unwrap();
        // Fields after the command name: state, ppid, pgrp.
        let fields: Vec<&str> = stat.rsplit_once(')').unwrap().1.split_whitespace().collect();
        assert_eq!(fields[2], process.id().to_string());
        process.kill();
        process.join();
    }

    #[test]
    fn test_kill_running_worker() {
        let (mut process, _stdout) = WorkerProcess::spawn(&sh("exec sleep 30"), &request()).unwrap();
        assert!(process.is_alive());
        process.kill();
        let status = process.join().unwrap();
        assert!(!status.success());
        assert!(!process.is_alive());
        // Killing again is harmless.
        process.kill();
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let command = WorkerCommand::new("/nonexistent/rascal-worker", Vec::new());
        let err = WorkerProcess::spawn(&command, &request()).unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
        assert!(err.to_string().contains("/nonexistent/rascal-worker"));
    }
}
