//! One-shot processing without the TUI: status lines go to stdout.

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::bounded;
use stretch_core::config::SessionSettings;
use stretch_core::engine::EngineFactory;
use stretch_core::params::Control;
use stretch_core::playback::PlaybackTrigger;
use stretch_core::session::Session;
use stretch_core::status_log::StatusSurface;

use crate::Setup;

/// How long a cancelled engine gets to wind down before we give up on it.
const CANCEL_GRACE: Duration = Duration::from_secs(5);
const POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Overrides {
    pub(crate) tempo: Option<i32>,
    pub(crate) pitch: Option<i32>,
    pub(crate) speed: Option<i32>,
}

/// Prints only what was appended since the previous render.
pub(crate) struct EchoSurface<W: Write> {
    out: W,
    shown: String,
}

impl<W: Write> EchoSurface<W> {
    pub(crate) fn new(out: W) -> Self {
        Self {
            out,
            shown: String::new(),
        }
    }
}

impl<W: Write> StatusSurface for EchoSurface<W> {
    fn show(&mut self, text: &str) {
        // Only uncapped logs keep the previous text as a prefix; see `echo_session`.
        let fresh = text.strip_prefix(self.shown.as_str()).unwrap_or(text);
        let _ = self.out.write_all(fresh.as_bytes());
        let _ = self.out.flush();
        self.shown = text.to_string();
    }
}

/// Process once and wait for the result. Returns whether processing succeeded.
pub(crate) fn run(setup: Setup, overrides: Overrides, timeout: Duration) -> Result<bool> {
    let (interrupt_tx, interrupt_rx) = bounded::<()>(1);
    let _ = ctrlc::set_handler(move || {
        let _ = interrupt_tx.try_send(());
    });

    let mut session = echo_session(
        setup.settings,
        setup.engines,
        setup.playback,
        std::io::stdout(),
    );
    Ok(process_once(&mut session, overrides, timeout, || {
        interrupt_rx.try_recv().is_ok()
    }))
}

/// Session echoing to `out`. Stdout keeps every line, so the log is left uncapped.
fn echo_session<W: Write>(
    mut settings: SessionSettings,
    engines: Arc<dyn EngineFactory>,
    playback: Box<dyn PlaybackTrigger>,
    out: W,
) -> Session<EchoSurface<W>> {
    settings.max_log_lines = None;
    Session::new(settings, engines, playback, EchoSurface::new(out))
}

fn process_once<S: StatusSurface>(
    session: &mut Session<S>,
    overrides: Overrides,
    timeout: Duration,
    mut interrupted: impl FnMut() -> bool,
) -> bool {
    session.announce_version();
    let values = [
        (Control::Tempo, overrides.tempo),
        (Control::Pitch, overrides.pitch),
        (Control::Speed, overrides.speed),
    ];
    for (control, value) in values {
        if let Some(value) = value {
            session.on_value_changed(control, value);
        }
    }
    if session.on_process_requested().is_err() {
        return false;
    }

    let deadline = Instant::now() + timeout;
    while !session.wait_idle(POLL) {
        if interrupted() {
            tracing::info!("interrupted");
            session.shutdown(CANCEL_GRACE);
            return false;
        }
        if Instant::now() >= deadline {
            tracing::warn!(timeout_secs = timeout.as_secs(), "engine did not finish in time");
            session.notice(format!(
                "Unexpected failure: engine did not finish within {} sec",
                timeout.as_secs()
            ));
            session.shutdown(CANCEL_GRACE);
            return false;
        }
    }
    session.last_result().is_some_and(|r| r.success())
}
