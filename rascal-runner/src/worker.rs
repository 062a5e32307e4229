//! Worker entry point.
//!
//! Runs inside the worker process. Bridges the engine's event hooks onto
//! the channel and closes the run with exactly one terminal item.

use std::io::{Read, Write};
use std::panic::{self, AssertUnwindSafe};

use rascal_core::{
    make_results, ChannelItem, Engine, EventSink, FrameWriter, Procedure, ProgressEvent,
    RunInputs, RunRequest, RunResult, Silent, WorkerFailure,
};

/// Forwards engine events onto the channel for the duration of one call.
///
/// Dropping the subscription detaches it; a write failure detaches it
/// early and is reported by [`Subscription::finish`].
struct Subscription<'a, W: Write> {
    channel: Option<&'a mut FrameWriter<W>>,
    error: Option<rascal_core::Error>,
}

impl<'a, W: Write> Subscription<'a, W> {
    fn new(channel: &'a mut FrameWriter<W>) -> Self {
        Self {
            channel: Some(channel),
            error: None,
        }
    }

    fn forward(&mut self, item: &ChannelItem) {
        let Some(channel) = self.channel.as_mut() else {
            return;
        };
        if let Err(e) = channel.push(item) {
            log::warn!("channel closed while forwarding events: {e}");
            self.error = Some(e);
            self.channel = None;
        }
    }

    /// Detaches and reports the first write failure, if any.
    fn finish(mut self) -> rascal_core::Result<()> {
        self.channel = None;
        self.error.take().map_or(Ok(()), Err)
    }
}

impl<W: Write> EventSink for Subscription<'_, W> {
    fn message(&mut self, text: &str) {
        self.forward(&ChannelItem::Message(text.to_string()));
    }

    fn progress(&mut self, event: ProgressEvent) {
        self.forward(&ChannelItem::Progress(event));
    }
}

impl<W: Write> Drop for Subscription<'_, W> {
    fn drop(&mut self) {
        if self.channel.take().is_some() {
            log::debug!("event subscription dropped while attached");
        }
    }
}

/// Runs the engine once and writes the run's items to `channel`.
///
/// A failing or panicking engine is reported as a `Failure` item; only
/// channel write errors are returned.
///
/// # Errors
/// Returns an error if the channel cannot be written.
pub fn run<W, E>(
    channel: &mut FrameWriter<W>,
    inputs: &RunInputs,
    procedure: Procedure,
    display_events: bool,
    engine: &E,
) -> rascal_core::Result<()>
where
    W: Write,
    E: Engine + ?Sized,
{
    let outcome = if display_events {
        let mut events = Subscription::new(channel);
        events.message(&format!("Starting {procedure}"));
        let outcome = compute(engine, inputs, procedure, &mut events);
        if outcome.is_ok() {
            events.message(&format!("Finished {procedure}"));
        }
        events.finish()?;
        outcome
    } else {
        compute(engine, inputs, procedure, &mut Silent)
    };

    let terminal = match outcome {
        Ok(result) => ChannelItem::Result(Box::new(result)),
        Err(failure) => {
            log::info!("{procedure} failed: {failure}");
            ChannelItem::Failure(failure)
        }
    };
    channel.push(&terminal)
}

fn compute<E: Engine + ?Sized>(
    engine: &E,
    inputs: &RunInputs,
    procedure: Procedure,
    events: &mut dyn EventSink,
) -> Result<RunResult, WorkerFailure> {
    match panic::catch_unwind(AssertUnwindSafe(|| engine.compute(inputs, procedure, events))) {
        Ok(Ok(raw)) => make_results(procedure, raw).map_err(WorkerFailure::from),
        Ok(Err(err)) => Err(WorkerFailure::from(err)),
        Err(payload) => Err(WorkerFailure::from_panic(payload.as_ref())),
    }
}

/// Process entry: reads a request from `input` and runs it, writing the
/// channel to `output`.
///
/// An unreadable request is reported on the channel as a failure of kind
/// `invalid_request` before the error is returned.
///
/// # Errors
/// Returns an error if the request cannot be read or the channel cannot be
/// written.
pub fn serve<E, R, W>(engine: &E, input: R, output: W) -> rascal_core::Result<()>
where
    E: Engine + ?Sized,
    R: Read,
    W: Write,
{
    let mut channel = FrameWriter::new(output);
    let request = match RunRequest::read_from(input) {
        Ok(request) => request,
        Err(e) => {
            channel.push(&ChannelItem::Failure(WorkerFailure::new(
                "invalid_request",
                e.to_string(),
            )))?;
            return Err(e);
        }
    };
    log::debug!(
        "worker running {} (events {})",
        request.procedure,
        if request.display_events { "on" } else { "off" }
    );
    run(
        &mut channel,
        &request.inputs,
        request.procedure,
        request.display_events,
        engine,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rascal_core::{decode_frame, EngineError, RawOutput, ScriptedEngine};
    use serde_json::json;

    fn items(bytes: &[u8]) -> Vec<ChannelItem> {
        std::str::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| decode_frame(line).unwrap())
            .collect()
    }

    fn run_script(procedure: Procedure, display: bool, script: serde_json::Value) -> Vec<ChannelItem> {
        let mut channel = FrameWriter::new(Vec::new());
        let inputs = RunInputs::new(json!({ "script": script }));
        run(&mut channel, &inputs, procedure, display, &ScriptedEngine).unwrap();
        items(&channel.into_inner())
    }

    #[test]
    fn test_display_on_wraps_events() {
        let out = run_script(
            Procedure::Calculate,
            true,
            json!({"steps": [{"progress": {"fraction": 0.5}}]}),
        );
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], ChannelItem::Message("Starting calculate".to_string()));
        assert_eq!(out[1], ChannelItem::Progress(ProgressEvent::new(0.5, "")));
        assert_eq!(out[2], ChannelItem::Message("Finished calculate".to_string()));
        match &out[3] {
            ChannelItem::Result(result) => assert!(!result.payload.is_sampled()),
            other => panic!("expected result, got {other:?}"),
        }
    }

    #[test]
    fn test_display_off_sends_only_terminal() {
        let out = run_script(
            Procedure::Simplex,
            false,
            json!({"steps": [{"message": "iter 1"}, {"progress": {"fraction": 0.3}}]}),
        );
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], ChannelItem::Result(_)));
    }

    #[test]
    fn test_engine_error_becomes_failure() {
        let out = run_script(
            Procedure::DifferentialEvolution,
            true,
            json!({"steps": [
                {"message": "generation 1"},
                {"fail": {"kind": "invalid_input", "message": "bad input"}}
            ]}),
        );
        assert_eq!(
            out,
            vec![
                ChannelItem::Message("Starting de".to_string()),
                ChannelItem::Message("generation 1".to_string()),
                ChannelItem::Failure(WorkerFailure::new("invalid_input", "bad input")),
            ]
        );
    }

    #[test]
    fn test_engine_panic_becomes_failure() {
        let out = run_script(Procedure::Calculate, false, json!({"steps": [{"panic": "segfault in mex"}]}));
        assert_eq!(
            out,
            vec![ChannelItem::Failure(WorkerFailure::new("panic", "segfault in mex"))]
        );
    }

    #[test]
    fn test_missing_samples_fail_bayesian_run() {
        struct NoSamples;
        impl Engine for NoSamples {
            fn compute(
                &self,
                _inputs: &RunInputs,
                _procedure: Procedure,
                _events: &mut dyn EventSink,
            ) -> Result<RawOutput, EngineError> {
                Ok(RawOutput::default())
            }
        }

        let mut channel = FrameWriter::new(Vec::new());
        run(&mut channel, &RunInputs::default(), Procedure::Dream, true, &NoSamples).unwrap();
        let out = items(&channel.into_inner());
        assert_eq!(out.len(), 2);
        match &out[1] {
            ChannelItem::Failure(failure) => assert_eq!(failure.kind, "missing_output"),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_serve_reads_request() {
        let request = RunRequest::new(
            RunInputs::new(json!({"problem": {"name": "monolayer"}})),
            Procedure::NestedSampling,
            false,
        );
        let mut input = Vec::new();
        request.write_to(&mut input).unwrap();

        let mut output = Vec::new();
        serve(&ScriptedEngine, input.as_slice(), &mut output).unwrap();
        let out = items(&output);
        assert_eq!(out.len(), 1);
        match &out[0] {
            ChannelItem::Result(result) => {
                assert!(result.payload.is_sampled());
                assert_eq!(result.updated_problem, json!({"name": "monolayer"}));
            }
            other => panic!("expected result, got {other:?}"),
        }
    }

    #[test]
    fn test_serve_reports_bad_request() {
        let mut output = Vec::new();
        assert!(serve(&ScriptedEngine, &b"not json"[..], &mut output).is_err());
        match items(&output).as_slice() {
            [ChannelItem::Failure(failure)] => assert_eq!(failure.kind, "invalid_request"),
            other => panic!("unexpected items: {other:?}"),
        }
    }

    #[test]
    fn test_closed_channel_is_an_error() {
        struct Closed;
        impl Write for Closed {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Err(std::io::ErrorKind::BrokenPipe.into())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        let mut channel = FrameWriter::new(Closed);
        let result = run(&mut channel, &RunInputs::default(), Procedure::Calculate, true, &ScriptedEngine);
        assert!(result.is_err());
    }
}
