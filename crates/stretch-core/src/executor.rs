//! Runs one request against the engine off the interactive thread.

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;

use crate::engine::{CancelToken, EngineFactory, STATUS_OK};
use crate::error::Failure;
use crate::request::{ProcessingRequest, RequestId};

/// Monotonic time source used to measure engine calls.
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// [`Clock`] backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed(Failure),
}

/// What one engine call produced. Consumed exactly once by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingResult {
    pub id: RequestId,
    pub output: PathBuf,
    pub duration: Duration,
    pub outcome: Outcome,
}

impl ProcessingResult {
    pub fn success(&self) -> bool {
        matches!(self.outcome, Outcome::Success)
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration.as_secs_f64()
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Success => None,
            Outcome::Failed(failure) => Some(failure.message()),
        }
    }

    /// Line shown in the status log for this result.
    pub fn status_line(&self) -> String {
        match &self.outcome {
            Outcome::Success => format!(
                "Processing done, duration {} sec.",
                format_seconds(self.duration)
            ),
            Outcome::Failed(failure) => failure.to_string(),
        }
    }
}

/// Seconds with millisecond resolution and at least one decimal: `2.5`, `3.0`, `0.125`.
pub fn format_seconds(duration: Duration) -> String {
    let text = format!("{:.3}", duration.as_millis() as f64 / 1000.0);
    let trimmed = text.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{trimmed}0")
    } else {
        trimmed.to_string()
    }
}

/// Executes requests against engines produced by an [`EngineFactory`].
#[derive(Clone)]
pub struct ProcessingExecutor {
    engines: Arc<dyn EngineFactory>,
    clock: Arc<dyn Clock>,
}

impl ProcessingExecutor {
    pub fn new(engines: Arc<dyn EngineFactory>) -> Self {
        Self {
            engines,
            clock: Arc::new(MonotonicClock::default()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn engine_version(&self) -> String {
        self.engines.version()
    }

    /// Run the request to completion without a way to interrupt it.
    pub fn execute(&self, request: ProcessingRequest) -> ProcessingResult {
        self.execute_cancellable(request, &CancelToken::new())
    }

    /// Configure a fresh engine, time the transform, and turn the status into a result.
    /// Blocks for the whole engine run.
    pub fn execute_cancellable(
        &self,
        request: ProcessingRequest,
        cancel: &CancelToken,
    ) -> ProcessingResult {
        let mut engine = self.engines.create();
        engine.configure(request.settings());
        tracing::info!(
            id = request.id().0,
            input = %request.input().display(),
            output = %request.output().display(),
            tempo = request.tempo(),
            pitch = request.pitch(),
            speed = request.speed(),
            "process file"
        );

        let start = self.clock.now();
        let status = engine.transform_file(request.input(), request.output(), cancel);
        let duration = self.clock.now().saturating_sub(start);

        let outcome = if status == STATUS_OK {
            tracing::info!(id = request.id().0, duration_ms = duration.as_millis() as u64, "process file done");
            Outcome::Success
        } else {
            let message = engine.last_error();
            tracing::warn!(id = request.id().0, status, error = %message, "process file failed");
            Outcome::Failed(Failure::Engine { status, message })
        };

        ProcessingResult {
            id: request.id(),
            output: request.output().to_path_buf(),
            duration,
            outcome,
        }
    }

    /// Start a worker thread for `request` and post its result on `results`.
    ///
    /// A panic inside the engine is converted into an unexpected-failure result so
    /// the receiver always gets exactly one result per started request.
    pub fn spawn(
        &self,
        request: ProcessingRequest,
        cancel: CancelToken,
        results: Sender<ProcessingResult>,
    ) -> std::io::Result<JoinHandle<()>> {
        let executor = self.clone();
        let id = request.id();
        std::thread::Builder::new()
            .name(format!("stretch-worker-{}", id.0))
            .spawn(move || {
                let output = request.output().to_path_buf();
                let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
                    executor.execute_cancellable(request, &cancel)
                }))
                .unwrap_or_else(|payload| {
                    let reason = panic_message(payload.as_ref());
                    tracing::error!(id = id.0, %reason, "worker panicked");
                    ProcessingResult {
                        id,
                        output,
                        duration: Duration::ZERO,
                        outcome: Outcome::Failed(Failure::Unexpected(format!(
                            "engine panicked: {reason}"
                        ))),
                    }
                });
                if results.send(result).is_err() {
                    tracing::debug!(id = id.0, "result receiver gone");
                }
            })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;

    use super::*;
    use crate::engine::{AudioEngine, EngineSettings};
    use crate::params::Parameters;
    use crate::request::SpeedScaling;

    struct StubEngine {
        status: i32,
        error: String,
        seen: Arc<Mutex<Vec<EngineSettings>>>,
    }

    impl AudioEngine for StubEngine {
        fn configure(&mut self, settings: EngineSettings) {
            self.seen.lock().unwrap().push(settings);
        }

        fn transform_file(&mut self, _input: &Path, _output: &Path, _cancel: &CancelToken) -> i32 {
            if self.status == 99 {
                panic!("stub exploded");
            }
            self.status
        }

        fn last_error(&self) -> String {
            self.error.clone()
        }
    }

    struct StubFactory {
        status: i32,
        error: &'static str,
        seen: Arc<Mutex<Vec<EngineSettings>>>,
    }

    impl StubFactory {
        fn new(status: i32, error: &'static str) -> Self {
            Self {
                status,
                error,
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl EngineFactory for StubFactory {
        fn create(&self) -> Box<dyn AudioEngine> {
            Box::new(StubEngine {
                status: self.status,
                error: self.error.to_string(),
                seen: self.seen.clone(),
            })
        }

        fn version(&self) -> String {
            "stub-1.0".into()
        }
    }

    fn request(id: u64) -> ProcessingRequest {
        ProcessingRequest::build(
            RequestId(id),
            &std::env::temp_dir().join("in.wav"),
            &std::env::temp_dir().join("out.wav"),
            Parameters {
                tempo_percent: 120,
                pitch_semitones: 2,
                speed: 1,
            },
            SpeedScaling::Raw,
        )
        .unwrap()
    }

    #[test]
    fn zero_status_is_success() {
        let factory = Arc::new(StubFactory::new(0, ""));
        let executor = ProcessingExecutor::new(factory.clone());
        let result = executor.execute(request(1));
        assert!(result.success());
        assert!(result.duration_seconds() >= 0.0);
        assert_eq!(result.error_message(), None);
        assert_eq!(result.output, std::env::temp_dir().join("out.wav"));

        let seen = factory.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].tempo_ratio, 1.2);
        assert_eq!(seen[0].pitch_semitones, 2.0);
    }

    #[test]
    fn non_zero_status_carries_engine_description() {
        let executor = ProcessingExecutor::new(Arc::new(StubFactory::new(5, "bad header")));
        let result = executor.execute(request(2));
        assert!(!result.success());
        assert_eq!(result.error_message(), Some("bad header"));
        assert_eq!(result.status_line(), "Failure: bad header");
    }

    #[test]
    fn spawned_worker_converts_panic_into_result() {
        let executor = ProcessingExecutor::new(Arc::new(StubFactory::new(99, "")));
        let (tx, rx) = crossbeam_channel::unbounded();
        let join = executor.spawn(request(3), CancelToken::new(), tx).unwrap();
        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        join.join().unwrap();
        assert_eq!(result.id, RequestId(3));
        assert!(matches!(
            result.outcome,
            Outcome::Failed(Failure::Unexpected(ref msg)) if msg.contains("stub exploded")
        ));
    }

    #[test]
    fn seconds_are_formatted_with_one_decimal_minimum() {
        assert_eq!(format_seconds(Duration::from_millis(2500)), "2.5");
        assert_eq!(format_seconds(Duration::from_secs(3)), "3.0");
        assert_eq!(format_seconds(Duration::from_millis(125)), "0.125");
        assert_eq!(format_seconds(Duration::ZERO), "0.0");
    }
}
