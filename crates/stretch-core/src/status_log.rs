//! Append-only status log shown to the user.
//!
//! Appends may come from any thread through a [`StatusLogHandle`]; rendering
//! goes through the owning [`StatusLog`], which is `!Send` and therefore
//! stays on the interactive thread that created it.

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

/// Display target for the accumulated log text.
pub trait StatusSurface {
    fn show(&mut self, text: &str);
}

#[derive(Debug, Default)]
struct Buffer {
    lines: VecDeque<String>,
    max_lines: Option<usize>,
    revision: u64,
}

impl Buffer {
    fn push(&mut self, line: &str) {
        self.lines.push_back(line.to_string());
        if let Some(max) = self.max_lines {
            while self.lines.len() > max.max(1) {
                self.lines.pop_front();
            }
        }
        self.revision = self.revision.wrapping_add(1);
    }

    fn text(&self) -> String {
        let mut text = String::new();
        for line in &self.lines {
            text.push_str(line);
            text.push('\n');
        }
        text
    }
}

/// Cloneable, thread-safe append side of the log.
#[derive(Debug, Clone)]
pub struct StatusLogHandle {
    inner: Arc<Mutex<Buffer>>,
}

impl StatusLogHandle {
    pub fn append(&self, line: impl AsRef<str>) {
        if let Ok(mut buffer) = self.inner.lock() {
            buffer.push(line.as_ref());
        }
    }
}

/// Owner of the log, tied to the interactive thread.
#[derive(Debug)]
pub struct StatusLog {
    handle: StatusLogHandle,
    _interactive: PhantomData<Rc<()>>,
}

impl Default for StatusLog {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusLog {
    pub fn new() -> Self {
        Self::with_max_lines(None)
    }

    /// Keep at most `max_lines` lines, dropping the oldest ones.
    pub fn with_max_lines(max_lines: Option<usize>) -> Self {
        let buffer = Buffer {
            max_lines,
            ..Buffer::default()
        };
        Self {
            handle: StatusLogHandle {
                inner: Arc::new(Mutex::new(buffer)),
            },
            _interactive: PhantomData,
        }
    }

    pub fn handle(&self) -> StatusLogHandle {
        self.handle.clone()
    }

    pub fn append(&self, line: impl AsRef<str>) {
        self.handle.append(line);
    }

    /// Push the accumulated text to `surface`.
    pub fn render(&self, surface: &mut dyn StatusSurface) {
        let text = self.text();
        surface.show(&text);
    }

    /// Every line followed by a newline, in insertion order.
    pub fn text(&self) -> String {
        self.handle
            .inner
            .lock()
            .map(|buffer| buffer.text())
            .unwrap_or_default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.handle
            .inner
            .lock()
            .map(|buffer| buffer.lines.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Bumped on every append.
    pub fn revision(&self) -> u64 {
        self.handle
            .inner
            .lock()
            .map(|buffer| buffer.revision)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Capture {
        shown: Vec<String>,
    }

    impl StatusSurface for Capture {
        fn show(&mut self, text: &str) {
            self.shown.push(text.to_string());
        }
    }

    #[test]
    fn appends_from_two_threads_keep_order() {
        let log = StatusLog::new();
        let a = log.handle();
        std::thread::spawn(move || a.append("A")).join().unwrap();
        let b = log.handle();
        std::thread::spawn(move || b.append("B")).join().unwrap();

        let mut surface = Capture::default();
        log.render(&mut surface);
        let text = surface.shown.last().unwrap();
        assert_eq!(text, "A\nB\n");
        assert!(text.find('A').unwrap() < text.find('B').unwrap());
    }

    #[test]
    fn render_pushes_full_text_each_time() {
        let log = StatusLog::new();
        let mut surface = Capture::default();
        log.append("one");
        log.render(&mut surface);
        log.append("two");
        log.render(&mut surface);
        assert_eq!(surface.shown, vec!["one\n".to_string(), "one\ntwo\n".to_string()]);
        assert_eq!(log.revision(), 2);
    }

    #[test]
    fn line_cap_drops_oldest() {
        let log = StatusLog::with_max_lines(Some(2));
        for line in ["a", "b", "c"] {
            log.append(line);
        }
        assert_eq!(log.lines(), vec!["b".to_string(), "c".to_string()]);
        assert_eq!(log.text(), "b\nc\n");
    }
}
