//! Interactive-thread controller for the processing-request lifecycle.
//!
//! A [`Session`] is driven by whatever front end owns the interactive thread
//! (the TUI loop or the headless runner). It never blocks on the engine:
//! requests run on worker threads and their results come back over a channel
//! that the front end drains with [`Session::pump`].

use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

use crate::config::SessionSettings;
use crate::dispatch::ResultDispatcher;
use crate::engine::{CancelToken, EngineFactory};
use crate::error::SubmitError;
use crate::executor::{Clock, ProcessingExecutor, ProcessingResult};
use crate::gate::{Admission, AdmissionGate};
use crate::params::{Control, ParameterModel};
use crate::playback::PlaybackTrigger;
use crate::request::{ProcessingRequest, RequestId};
use crate::status_log::{StatusLog, StatusSurface};

struct InFlight {
    id: RequestId,
    cancel: CancelToken,
    join: Option<JoinHandle<()>>,
}

pub struct Session<S: StatusSurface> {
    settings: SessionSettings,
    params: ParameterModel,
    log: StatusLog,
    gate: AdmissionGate,
    dispatcher: ResultDispatcher,
    executor: ProcessingExecutor,
    results_tx: Sender<ProcessingResult>,
    results_rx: Receiver<ProcessingResult>,
    in_flight: Option<InFlight>,
    next_id: u64,
    last_result: Option<ProcessingResult>,
    surface: S,
}

impl<S: StatusSurface> Session<S> {
    pub fn new(
        settings: SessionSettings,
        engines: Arc<dyn EngineFactory>,
        playback: Box<dyn PlaybackTrigger>,
        surface: S,
    ) -> Self {
        let controls = settings.controls;
        let (results_tx, results_rx) = unbounded();
        Self {
            params: ParameterModel::new(
                controls.tempo.default,
                controls.pitch.default,
                controls.speed.default,
            ),
            log: StatusLog::with_max_lines(settings.max_log_lines),
            gate: AdmissionGate::new(settings.admission, settings.queue_depth),
            dispatcher: ResultDispatcher::new(playback),
            executor: ProcessingExecutor::new(engines),
            results_tx,
            results_rx,
            in_flight: None,
            next_id: 1,
            last_result: None,
            surface,
            settings,
        }
    }

    /// Measure engine runs with `clock` instead of the monotonic clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.executor = self.executor.with_clock(clock);
        self
    }

    /// Handle the process action: read the labels, build a request and admit it.
    ///
    /// Every error is appended to the log before returning; the surface is
    /// re-rendered in all cases.
    pub fn on_process_requested(&mut self) -> Result<RequestId, SubmitError> {
        let id = RequestId(self.next_id);
        self.next_id += 1;
        let submitted = self.submit(id);
        if let Err(e) = &submitted {
            tracing::warn!(id = id.0, "process request not started: {e}");
            self.log.append(e.to_string());
        }
        self.render();
        submitted
    }

    fn submit(&mut self, id: RequestId) -> Result<RequestId, SubmitError> {
        let params = self.params.read()?;
        let request = ProcessingRequest::build(
            id,
            &self.settings.input,
            &self.settings.output,
            params,
            self.settings.speed_scaling,
        )?;
        let announcement = submission_lines(&request);

        match self.gate.try_admit(request) {
            Admission::Start(request) => {
                self.append_all(&announcement);
                self.start(request)?;
                Ok(id)
            }
            Admission::Queued { id, position } => {
                self.append_all(&announcement);
                tracing::info!(id = id.0, position, "request queued");
                self.log
                    .append(format!("Queued: request {id} at position {position}"));
                Ok(id)
            }
            Admission::Rejected { request, in_flight } => Err(SubmitError::Busy {
                id: request.id(),
                in_flight,
            }),
        }
    }

    /// Spawn the worker for a request that already holds the gate slot.
    fn start(&mut self, request: ProcessingRequest) -> Result<(), SubmitError> {
        let id = request.id();
        let cancel = CancelToken::new();
        match self
            .executor
            .spawn(request, cancel.clone(), self.results_tx.clone())
        {
            Ok(join) => {
                self.in_flight = Some(InFlight {
                    id,
                    cancel,
                    join: Some(join),
                });
                Ok(())
            }
            Err(e) => {
                tracing::error!(id = id.0, "worker spawn failed: {e}");
                let next = self.gate.complete(id);
                self.advance(next);
                Err(SubmitError::Unexpected(format!("worker spawn failed: {e}")))
            }
        }
    }

    /// Start queued requests until one is running or the queue is empty.
    fn advance(&mut self, mut next: Option<ProcessingRequest>) {
        while let Some(request) = next.take() {
            let id = request.id();
            self.log.append(format!("Starting queued request {id}"));
            let cancel = CancelToken::new();
            match self
                .executor
                .spawn(request, cancel.clone(), self.results_tx.clone())
            {
                Ok(join) => {
                    self.in_flight = Some(InFlight {
                        id,
                        cancel,
                        join: Some(join),
                    });
                }
                Err(e) => {
                    tracing::error!(id = id.0, "worker spawn failed: {e}");
                    self.log
                        .append(format!("Unexpected failure: worker spawn failed: {e}"));
                    next = self.gate.complete(id);
                }
            }
        }
    }

    /// Drain finished results without blocking. Returns how many were dispatched.
    pub fn pump(&mut self) -> usize {
        let mut dispatched = 0;
        while let Ok(result) = self.results_rx.try_recv() {
            self.finish(result);
            dispatched += 1;
        }
        dispatched
    }

    /// Block until nothing is running or queued, or `timeout` elapses.
    /// Returns whether the session went idle.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.gate.is_busy() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.results_rx.recv_timeout(remaining) {
                Ok(result) => self.finish(result),
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
        true
    }

    fn finish(&mut self, result: ProcessingResult) {
        let id = result.id;
        if self.in_flight.as_ref().is_some_and(|f| f.id == id) {
            if let Some(mut done) = self.in_flight.take() {
                // The worker sent its result as its last action.
                if let Some(join) = done.join.take() {
                    let _ = join.join();
                }
            }
        }
        self.dispatcher
            .dispatch(&result, &self.log, &mut self.surface);
        self.last_result = Some(result);
        let next = self.gate.complete(id);
        if next.is_some() {
            self.advance(next);
            self.render();
        }
    }

    /// Ask the running request to stop. Its result still arrives through [`Session::pump`].
    pub fn cancel_in_flight(&mut self) -> Option<RequestId> {
        let in_flight = self.in_flight.as_ref()?;
        in_flight.cancel.cancel();
        tracing::info!(id = in_flight.id.0, "cancel requested");
        self.log
            .append(format!("Cancelling request {}", in_flight.id));
        let id = in_flight.id;
        self.render();
        Some(id)
    }

    /// Drop queued requests, cancel the running one and wait up to `grace` for it.
    /// Results dispatched from here on are logged but never played.
    pub fn shutdown(&mut self, grace: Duration) -> bool {
        self.dispatcher.disable_playback();
        let dropped = self.gate.clear_pending();
        if dropped > 0 {
            tracing::info!(dropped, "queued requests dropped on shutdown");
        }
        if self.cancel_in_flight().is_none() {
            return true;
        }
        self.wait_idle(grace)
    }

    pub fn on_value_changed(&mut self, control: Control, value: i32) {
        self.params.on_value_changed(control, value);
    }

    pub fn set_label(&mut self, control: Control, text: impl Into<String>) {
        self.params.set_label(control, text);
    }

    pub fn version_line(&self) -> String {
        format!("Audio engine version = {}", self.executor.engine_version())
    }

    /// Append the engine version line and render. Called once at startup.
    pub fn announce_version(&mut self) -> String {
        let line = self.version_line();
        tracing::info!("{line}");
        self.log.append(&line);
        self.render();
        line
    }

    /// Append a free-form line (CLI notices) and render.
    pub fn notice(&mut self, line: impl AsRef<str>) {
        self.log.append(line);
        self.render();
    }

    pub fn render(&mut self) {
        self.log.render(&mut self.surface);
    }

    pub fn params(&self) -> &ParameterModel {
        &self.params
    }

    pub fn log(&self) -> &StatusLog {
        &self.log
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn input(&self) -> &Path {
        &self.settings.input
    }

    pub fn output(&self) -> &Path {
        &self.settings.output
    }

    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    pub fn in_flight(&self) -> Option<RequestId> {
        self.gate.in_flight()
    }

    pub fn queued(&self) -> usize {
        self.gate.queued()
    }

    pub fn last_result(&self) -> Option<&ProcessingResult> {
        self.last_result.as_ref()
    }

    fn append_all(&self, lines: &[String]) {
        for line in lines {
            self.log.append(line);
        }
    }
}

fn submission_lines(request: &ProcessingRequest) -> Vec<String> {
    vec![
        format!(
            "Process audio file :{} => {}",
            request.input().display(),
            request.output().display()
        ),
        format!("Tempo = {}", decimal(request.tempo())),
        format!("Pitch adjust = {}", decimal(request.pitch())),
    ]
}

/// Whole numbers keep one decimal: `1.0`, `-3.0`, `1.25`.
fn decimal(value: f32) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}
