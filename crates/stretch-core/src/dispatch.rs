//! Applies completed results on the interactive thread.

use crate::executor::ProcessingResult;
use crate::playback::{NoPlayback, PlaybackTrigger};
use crate::status_log::{StatusLog, StatusSurface};

/// Turns a [`ProcessingResult`] into user-visible effects. Never processes anything itself.
pub struct ResultDispatcher {
    playback: Box<dyn PlaybackTrigger>,
}

impl ResultDispatcher {
    pub fn new(playback: Box<dyn PlaybackTrigger>) -> Self {
        Self { playback }
    }

    /// Stop starting playback for later results.
    pub fn disable_playback(&mut self) {
        self.playback = Box::new(NoPlayback);
    }

    /// Log the outcome, start playback on success, then render.
    pub fn dispatch(
        &self,
        result: &ProcessingResult,
        log: &StatusLog,
        surface: &mut dyn StatusSurface,
    ) {
        log.append(result.status_line());
        if result.success() {
            if let Err(e) = self.playback.play(&result.output) {
                tracing::warn!(id = result.id.0, "playback hand-off failed: {e:#}");
                log.append(format!("Unexpected failure: playback: {e:#}"));
            }
        }
        log.render(surface);
    }
}
