//! RasCAL command-line front-end.
//!
//! `rascal run` drives one fitting run through a coordinator on the main
//! thread; `rascal worker` is the process the coordinator launches.

mod presenter;

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use clap::{Parser, Subcommand};
use env_logger::{Builder, Env, Target};
use thiserror::Error;

use rascal_core::{Procedure, RunRequest, ScriptedEngine};
use rascal_runner::{Coordinator, RunnerSettings};

use presenter::{ConsolePresenter, Outcome};

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Runner error: {0}")]
    Runner(#[from] rascal_runner::Error),

    #[error("Worker error: {0}")]
    Worker(#[from] rascal_core::Error),

    #[error("Failed to set Ctrl-C handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

/// Neutron reflectivity fitting runs.
#[derive(Parser)]
#[command(name = "rascal")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a request file in a worker process and report as it runs
    Run {
        /// Run request (JSON)
        request: PathBuf,

        /// Override the request's procedure
        #[arg(short, long)]
        procedure: Option<Procedure>,

        /// Do not stream engine messages and progress
        #[arg(long)]
        no_events: bool,

        /// Folder containing settings.json
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Write the run result here (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write log output to this file instead of stderr
        #[arg(long)]
        log_file: Option<PathBuf>,
    },

    /// Worker process entry: reads a request on stdin, writes the channel to stdout
    #[command(hide = true)]
    Worker,

    /// List the available procedures
    Procedures,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            request,
            procedure,
            no_events,
            settings,
            output,
            log_file,
        } => init_logging("info", log_file.as_deref()).and_then(|()| {
            run(
                &request,
                procedure,
                no_events,
                settings.as_deref(),
                output.as_deref(),
            )
        }),
        Commands::Worker => init_logging("warn", None).and_then(|()| worker()),
        Commands::Procedures => procedures().map(|()| ExitCode::SUCCESS),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Sets up `env_logger`, honouring `RUST_LOG` over `default_level`.
fn init_logging(default_level: &str, log_file: Option<&Path>) -> Result<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or(default_level));
    if let Some(path) = log_file {
        builder.target(Target::Pipe(Box::new(File::create(path)?)));
    }
    builder.init();
    Ok(())
}

fn run(
    request_path: &Path,
    procedure: Option<Procedure>,
    no_events: bool,
    settings_dir: Option<&Path>,
    output: Option<&Path>,
) -> Result<ExitCode> {
    let mut request: RunRequest = serde_json::from_str(&std::fs::read_to_string(request_path)?)?;
    if let Some(procedure) = procedure {
        request.procedure = procedure;
    }
    if no_events {
        request.display_events = false;
    }
    let settings = match settings_dir {
        Some(dir) => RunnerSettings::load(dir)?,
        None => RunnerSettings::default(),
    };

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))?;

    let mut presenter = ConsolePresenter::new(io::stdout(), request.procedure);
    let mut coordinator = Coordinator::new(request, settings);
    coordinator.start()?;

    while !coordinator.state().is_terminal() {
        if interrupted.swap(false, Ordering::SeqCst) {
            coordinator.interrupt(&mut presenter);
            break;
        }
        coordinator.tick(&mut presenter);
        if let Some(wait) = coordinator.until_next_tick() {
            thread::sleep(wait);
        }
    }

    if let (Some(path), Some(result)) = (output, coordinator.result()) {
        std::fs::write(path, serde_json::to_string_pretty(result)?)?;
        log::info!("result written to {}", path.display());
    }

    Ok(match presenter.outcome() {
        Outcome::Finished { .. } => ExitCode::SUCCESS,
        Outcome::Interrupted => ExitCode::from(130),
        Outcome::Failed(_) | Outcome::Pending => ExitCode::FAILURE,
    })
}

fn worker() -> Result<ExitCode> {
    // stdout is the channel; nothing else may write to it.
    rascal_runner::worker::serve(&ScriptedEngine, io::stdin().lock(), io::stdout().lock())?;
    Ok(ExitCode::SUCCESS)
}

fn procedures() -> Result<()> {
    let mut out = io::stdout().lock();
    for procedure in Procedure::ALL {
        writeln!(out, "{:<10} {}", procedure.as_str(), procedure.description())?;
    }
    Ok(())
}
