//! Seam to the external audio engine.
//!
//! The engine is opaque: it gets configured, transforms one file into
//! another, and reports a status code plus a description of the last error.
//! A fresh instance is created for every request.

mod soundstretch;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub use soundstretch::{SoundStretch, command_args};

/// Status returned by a successful transform.
pub const STATUS_OK: i32 = 0;
/// The engine process could not be started or waited on.
pub const STATUS_SPAWN_FAILED: i32 = -1;
/// The transform was interrupted through its [`CancelToken`].
pub const STATUS_CANCELLED: i32 = -2;

/// Values handed to [`AudioEngine::configure`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    /// 1.0 = unchanged tempo.
    pub tempo_ratio: f32,
    pub pitch_semitones: f32,
    pub speed: f32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tempo_ratio: 1.0,
            pitch_semitones: 0.0,
            speed: 1.0,
        }
    }
}

/// Shared flag asking a running transform to stop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One engine instance, used for a single request on a worker thread.
pub trait AudioEngine: Send {
    fn configure(&mut self, settings: EngineSettings);

    /// Run the file-to-file transform. Blocks for the whole engine run.
    /// Returns [`STATUS_OK`] on success, anything else is a failure.
    fn transform_file(&mut self, input: &Path, output: &Path, cancel: &CancelToken) -> i32;

    /// Description of the most recent failure.
    fn last_error(&self) -> String;
}

/// Creates engine instances and reports the engine version.
pub trait EngineFactory: Send + Sync {
    fn create(&self) -> Box<dyn AudioEngine>;

    fn version(&self) -> String;
}
