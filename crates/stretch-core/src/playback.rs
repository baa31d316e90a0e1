//! Hand-off of a finished output file to something that can play it.

use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};

/// Fire-and-forget playback of a completed output file.
pub trait PlaybackTrigger {
    fn play(&self, path: &Path) -> Result<()>;
}

/// Playback disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPlayback;

impl PlaybackTrigger for NoPlayback {
    fn play(&self, path: &Path) -> Result<()> {
        tracing::debug!(path = %path.display(), "playback disabled");
        Ok(())
    }
}

/// Opens the file with an external command: the platform opener by default,
/// or a configured player such as `aplay`.
#[derive(Debug, Clone)]
pub struct SystemOpener {
    program: String,
    args: Vec<String>,
}

impl Default for SystemOpener {
    fn default() -> Self {
        let (program, args): (&str, &[&str]) = if cfg!(target_os = "macos") {
            ("open", &[])
        } else if cfg!(windows) {
            ("cmd", &["/C", "start", ""])
        } else {
            ("xdg-open", &[])
        };
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl SystemOpener {
    /// `args` go before the file path.
    pub fn with_command(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl PlaybackTrigger for SystemOpener {
    fn play(&self, path: &Path) -> Result<()> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("start {} for {:?}", self.program, path))?;
        tracing::info!(player = %self.program, path = %path.display(), "playback started");
        // Reap the child in the background; nothing waits for playback to end.
        std::thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_player_is_an_error() {
        let opener = SystemOpener::with_command("/nonexistent/player", Vec::new());
        let err = opener.play(Path::new("/tmp/out.wav")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/player"));
    }

    #[cfg(unix)]
    #[test]
    fn configured_player_starts() {
        let opener = SystemOpener::with_command("true", vec!["--flag".into()]);
        assert!(opener.play(Path::new("/tmp/out.wav")).is_ok());
        assert_eq!(opener.program(), "true");
    }
}
