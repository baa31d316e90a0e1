use std::collections::VecDeque;
use std::io;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use crossterm::{
    event::{self, Event as CEvent, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use stretch_core::config::Controls;
use stretch_core::params::Control;
use stretch_core::probe::{AudioInfo, probe_audio};
use stretch_core::request::RequestId;
use stretch_core::session::Session;
use stretch_core::status_log::StatusSurface;

use crate::Setup;

use super::render;

/// How long quitting waits for a cancelled engine run.
const QUIT_GRACE: Duration = Duration::from_secs(2);
const LOG_CAP: usize = 500;

/// Launch the TUI and drive the event loop until the user quits.
pub(crate) fn run_tui(setup: Setup, log_rx: Option<Receiver<String>>) -> Result<()> {
    let controls = setup.settings.controls;
    let session = Session::new(
        setup.settings,
        setup.engines,
        setup.playback,
        StatusPane::default(),
    );
    let mut app = App::new(session, controls, log_rx);

    let mut term = init_terminal()?;
    let result = ui_loop(&mut term, &mut app);

    restore_terminal(&mut term)?;
    if !app.session.shutdown(QUIT_GRACE) {
        tracing::warn!("engine still running at exit");
    }
    result
}

/// Latest text pushed by the status log.
#[derive(Default)]
pub(crate) struct StatusPane {
    pub(crate) text: String,
}

impl StatusSurface for StatusPane {
    fn show(&mut self, text: &str) {
        self.text.clear();
        self.text.push_str(text);
    }
}

/// In-memory UI state for rendering + interaction.
pub(crate) struct App {
    pub(crate) session: Session<StatusPane>,
    pub(crate) controls: Controls,
    pub(crate) selected: Control,
    pub(crate) version_line: String,
    pub(crate) input_info: Option<AudioInfo>,
    pub(crate) output_info: Option<AudioInfo>,
    seen_result: Option<RequestId>,

    pub(crate) logs_open: bool,
    pub(crate) logs: VecDeque<String>,
    pub(crate) logs_scroll: usize,
    log_rx: Option<Receiver<String>>,
}

impl App {
    fn new(
        mut session: Session<StatusPane>,
        controls: Controls,
        log_rx: Option<Receiver<String>>,
    ) -> Self {
        let version_line = session.announce_version();
        let input_info = probe_audio(session.input());
        let output_info = probe_audio(session.output());
        Self {
            session,
            controls,
            selected: Control::Tempo,
            version_line,
            input_info,
            output_info,
            seen_result: None,
            logs_open: false,
            logs: VecDeque::new(),
            logs_scroll: 0,
            log_rx,
        }
    }

    /// Value shown for a control; an unparseable label falls back to the default.
    pub(crate) fn value(&self, control: Control) -> i32 {
        let range = self.controls.range(control);
        self.session
            .params()
            .value(control)
            .map(|v| range.clamp(v))
            .unwrap_or(range.default)
    }

    fn select_prev(&mut self) {
        self.selected = self.selected.prev();
    }

    fn select_next(&mut self) {
        self.selected = self.selected.next();
    }

    fn adjust(&mut self, delta: i32) {
        let range = self.controls.range(self.selected);
        let value = range.clamp(self.value(self.selected).saturating_add(delta));
        self.session.on_value_changed(self.selected, value);
    }

    fn reset(&mut self) {
        for control in Control::ALL {
            let default = self.controls.range(control).default;
            self.session.on_value_changed(control, default);
        }
    }

    fn process(&mut self) {
        // Failures are already in the status log.
        let _ = self.session.on_process_requested();
    }

    fn cancel(&mut self) {
        if self.session.cancel_in_flight().is_none() {
            self.session.notice("Nothing to cancel");
        }
    }

    fn toggle_logs(&mut self) {
        self.logs_open = !self.logs_open;
        if !self.logs_open {
            self.logs_scroll = 0;
        }
    }

    fn scroll_logs_up(&mut self) {
        let max = self.logs.len().saturating_sub(1);
        self.logs_scroll = (self.logs_scroll + 1).min(max);
    }

    fn scroll_logs_down(&mut self) {
        self.logs_scroll = self.logs_scroll.saturating_sub(1);
    }

    fn push_log_line(&mut self, line: String) {
        if self.logs.len() >= LOG_CAP {
            self.logs.pop_front();
        }
        self.logs.push_back(line);
    }

    fn drain_logs(&mut self) {
        let Some(rx) = self.log_rx.as_ref() else {
            return;
        };
        let lines: Vec<String> = rx.try_iter().collect();
        for line in lines {
            self.push_log_line(line);
        }
    }

    /// Per-frame housekeeping: dispatch finished results and refresh derived state.
    fn tick(&mut self) {
        self.drain_logs();
        if self.session.pump() == 0 {
            return;
        }
        let latest = self.session.last_result().map(|r| (r.id, r.success()));
        if let Some((id, success)) = latest {
            if self.seen_result != Some(id) {
                self.seen_result = Some(id);
                if success {
                    self.output_info = probe_audio(self.session.output());
                }
            }
        }
    }

    /// Apply one key press. Returns `true` when the app should quit.
    fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
        if self.logs_open {
            match code {
                KeyCode::Char('q') => return true,
                KeyCode::Esc | KeyCode::Char('l') => self.toggle_logs(),
                KeyCode::Up => self.scroll_logs_up(),
                KeyCode::Down => self.scroll_logs_down(),
                _ => {}
            }
            return false;
        }
        let step = if modifiers.contains(KeyModifiers::SHIFT) {
            10
        } else {
            1
        };
        match code {
            KeyCode::Char('q') => return true,
            KeyCode::Up => self.select_prev(),
            KeyCode::Down | KeyCode::Tab => self.select_next(),
            KeyCode::Left => self.adjust(-step),
            KeyCode::Right => self.adjust(step),
            KeyCode::Char('[') => self.adjust(-10),
            KeyCode::Char(']') => self.adjust(10),
            KeyCode::Char('r') => self.reset(),
            KeyCode::Enter | KeyCode::Char('p') => self.process(),
            KeyCode::Char('c') => self.cancel(),
            KeyCode::Char('l') => self.toggle_logs(),
            _ => {}
        }
        false
    }
}

fn ui_loop(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    let tick = Duration::from_millis(33);
    let mut last_tick = Instant::now();

    loop {
        app.tick();
        terminal.draw(|f| render::draw(f, app))?;

        let timeout = tick.saturating_sub(last_tick.elapsed());
        if event::poll(timeout).context("poll terminal events")? {
            if let CEvent::Key(k) = event::read().context("read terminal event")? {
                if k.kind == KeyEventKind::Press && app.handle_key(k.code, k.modifiers) {
                    return Ok(());
                }
            }
        }

        if last_tick.elapsed() >= tick {
            last_tick = Instant::now();
        }
    }
}

fn init_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("create terminal")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use crossbeam_channel::unbounded;
    use stretch_core::config::SessionSettings;
    use stretch_core::engine::{AudioEngine, CancelToken, EngineFactory, EngineSettings};
    use stretch_core::gate::AdmissionPolicy;
    use stretch_core::playback::NoPlayback;
    use stretch_core::request::SpeedScaling;

    use super::*;

    struct Done;

    impl AudioEngine for Done {
        fn configure(&mut self, _settings: EngineSettings) {}

        fn transform_file(&mut self, _input: &Path, _output: &Path, _cancel: &CancelToken) -> i32 {
            0
        }

        fn last_error(&self) -> String {
            String::new()
        }
    }

    struct DoneFactory;

    impl EngineFactory for DoneFactory {
        fn create(&self) -> Box<dyn AudioEngine> {
            Box::new(Done)
        }

        fn version(&self) -> String {
            "2.3.2".into()
        }
    }

    fn app() -> App {
        let controls = Controls::defaults(SpeedScaling::Raw);
        let settings = SessionSettings {
            input: std::env::temp_dir().join("stretch-ui-missing-in.wav"),
            output: std::env::temp_dir().join("stretch-ui-missing-out.wav"),
            admission: AdmissionPolicy::Reject,
            queue_depth: 1,
            speed_scaling: SpeedScaling::Raw,
            max_log_lines: None,
            controls,
        };
        let session = Session::new(
            settings,
            Arc::new(DoneFactory),
            Box::new(NoPlayback),
            StatusPane::default(),
        );
        let (_log_tx, log_rx) = unbounded::<String>();
        App::new(session, controls, Some(log_rx))
    }

    fn press(app: &mut App, code: KeyCode) -> bool {
        app.handle_key(code, KeyModifiers::NONE)
    }

    #[test]
    fn startup_shows_engine_version() {
        let app = app();
        assert_eq!(app.version_line, "Audio engine version = 2.3.2");
        assert_eq!(app.session.surface().text, "Audio engine version = 2.3.2\n");
        assert!(app.input_info.is_none());
    }

    #[test]
    fn arrows_adjust_selected_control_within_range() {
        let mut app = app();
        press(&mut app, KeyCode::Right);
        assert_eq!(app.session.params().label(Control::Tempo), "tempo:101");
        app.handle_key(KeyCode::Left, KeyModifiers::SHIFT);
        assert_eq!(app.value(Control::Tempo), 91);

        press(&mut app, KeyCode::Down);
        assert_eq!(app.selected, Control::Pitch);
        for _ in 0..3 {
            press(&mut app, KeyCode::Char(']'));
        }
        assert_eq!(app.session.params().label(Control::Pitch), "pitch:12");

        press(&mut app, KeyCode::Char('r'));
        assert_eq!(app.session.params().label(Control::Tempo), "tempo:100");
        assert_eq!(app.session.params().label(Control::Pitch), "pitch:0");
    }

    #[test]
    fn enter_processes_and_tick_dispatches_result() {
        let mut app = app();
        press(&mut app, KeyCode::Enter);
        let deadline = Instant::now() + Duration::from_secs(10);
        while app.session.is_busy() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
            app.tick();
        }
        assert!(!app.session.is_busy());
        assert!(
            app.session
                .surface()
                .text
                .contains("Processing done, duration ")
        );
    }

    #[test]
    fn logs_modal_captures_keys_until_closed() {
        let mut app = app();
        press(&mut app, KeyCode::Char('l'));
        assert!(app.logs_open);
        press(&mut app, KeyCode::Right);
        assert_eq!(app.value(Control::Tempo), 100);
        press(&mut app, KeyCode::Esc);
        assert!(!app.logs_open);
        assert!(press(&mut app, KeyCode::Char('q')));
    }

    #[test]
    fn cancel_when_idle_says_so() {
        let mut app = app();
        press(&mut app, KeyCode::Char('c'));
        assert!(app.session.surface().text.ends_with("Nothing to cancel\n"));
    }
}
