//! Tracing setup: stderr for headless runs, an in-app log pane for the TUI.

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::Subscriber;
use tracing::field::{Field, Visit};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,stretch_cli=info,stretch_core=info"))
}

pub(crate) fn init_stderr() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

/// Route events to the returned receiver instead of the terminal, which the TUI owns.
pub(crate) fn init_tui() -> Receiver<String> {
    let (tx, rx) = unbounded();
    tracing_subscriber::registry()
        .with(env_filter())
        .with(LogLayer::new(tx))
        .init();
    rx
}

/// Formats each event into one line and sends it to the UI.
pub(crate) struct LogLayer {
    sender: Sender<String>,
}

impl LogLayer {
    pub(crate) fn new(sender: Sender<String>) -> Self {
        Self { sender }
    }
}

impl<S> Layer<S> for LogLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = LogVisitor::default();
        event.record(&mut visitor);
        let _ = self.sender.send(visitor.line(
            event.metadata().level(),
            event.metadata().target(),
        ));
    }
}

#[derive(Default)]
struct LogVisitor {
    message: Option<String>,
    fields: Vec<String>,
}

impl LogVisitor {
    fn line(self, level: &tracing::Level, target: &str) -> String {
        let mut line = format!(
            "{:>5} {target}: {}",
            level.to_string(),
            self.message.unwrap_or_else(|| "log event".to_string())
        );
        if !self.fields.is_empty() {
            line.push(' ');
            line.push_str(&self.fields.join(" "));
        }
        line
    }
}

impl Visit for LogVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let formatted = format!("{value:?}");
        if field.name() == "message" {
            self.message = Some(formatted.trim_matches('"').to_string());
        } else {
            self.fields.push(format!("{}={}", field.name(), formatted));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_formats_message_and_fields() {
        let (tx, rx) = unbounded();
        let subscriber = tracing_subscriber::registry().with(LogLayer::new(tx));
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(id = 3, path = "out.wav", "process file failed");
        });
        let line = rx.try_recv().unwrap();
        assert!(line.starts_with(" WARN "), "{line}");
        assert!(line.contains("process file failed"), "{line}");
        assert!(line.contains("id=3"), "{line}");
        assert!(line.contains("path=out.wav"), "{line}");
    }
}
