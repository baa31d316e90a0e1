//! Engine adapter that drives the `soundstretch` command-line tool.
//!
//! `soundstretch in.wav out.wav -tempo=N -pitch=N -rate=N` where tempo and
//! rate are percentage changes and pitch is in semitones. The exit code is
//! the status; stderr carries the error text and the version banner.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use super::{
    AudioEngine, CancelToken, EngineFactory, EngineSettings, STATUS_CANCELLED, STATUS_OK,
    STATUS_SPAWN_FAILED,
};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Factory for `soundstretch` engine instances.
#[derive(Debug, Clone)]
pub struct SoundStretch {
    program: PathBuf,
    leading_args: Vec<String>,
}

impl SoundStretch {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Arguments placed before the input/output pair, e.g. a wrapper script.
    pub fn with_leading_args(mut self, args: Vec<String>) -> Self {
        self.leading_args = args;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args).stdin(Stdio::null());
        cmd
    }
}

impl EngineFactory for SoundStretch {
    fn create(&self) -> Box<dyn AudioEngine> {
        Box::new(SoundStretchEngine {
            factory: self.clone(),
            settings: EngineSettings::default(),
            last_error: String::new(),
        })
    }

    fn version(&self) -> String {
        // Without file arguments the tool prints its banner and usage, then exits.
        let output = match self.command().stdout(Stdio::piped()).stderr(Stdio::piped()).output() {
            Ok(output) => output,
            Err(e) => return format!("unavailable ({}: {e})", self.program.display()),
        };
        let mut text = String::from_utf8_lossy(&output.stderr).into_owned();
        text.push('\n');
        text.push_str(&String::from_utf8_lossy(&output.stdout));
        parse_version(&text).unwrap_or_else(|| "unknown".to_string())
    }
}

struct SoundStretchEngine {
    factory: SoundStretch,
    settings: EngineSettings,
    last_error: String,
}

impl AudioEngine for SoundStretchEngine {
    fn configure(&mut self, settings: EngineSettings) {
        self.settings = settings;
    }

    fn transform_file(&mut self, input: &Path, output: &Path, cancel: &CancelToken) -> i32 {
        let args = command_args(input, output, &self.settings);
        tracing::debug!(program = %self.factory.program.display(), ?args, "starting soundstretch");

        let mut child = match self
            .factory
            .command()
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                self.last_error = format!("start {}: {e}", self.factory.program.display());
                return STATUS_SPAWN_FAILED;
            }
        };

        // Drain stderr concurrently so a chatty engine cannot fill the pipe and stall.
        let stderr = child.stderr.take();
        let reader = std::thread::spawn(move || {
            let mut text = String::new();
            if let Some(mut pipe) = stderr {
                let _ = pipe.read_to_string(&mut text);
            }
            text
        });

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if cancel.is_cancelled() {
                        let _ = child.kill();
                        let _ = child.wait();
                        // The reader is left detached: grandchildren may keep stderr open.
                        drop(reader);
                        self.last_error = "cancelled".to_string();
                        return STATUS_CANCELLED;
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    let _ = child.kill();
                    self.last_error = format!("wait for {}: {e}", self.factory.program.display());
                    return STATUS_SPAWN_FAILED;
                }
            }
        };

        let stderr_text = reader.join().unwrap_or_default();
        let code = status.code().unwrap_or(STATUS_SPAWN_FAILED);
        if code != STATUS_OK {
            self.last_error = last_line(&stderr_text)
                .unwrap_or_else(|| format!("soundstretch exited with {status}"));
        }
        code
    }

    fn last_error(&self) -> String {
        self.last_error.clone()
    }
}

/// Command-line arguments for one transform.
pub fn command_args(input: &Path, output: &Path, settings: &EngineSettings) -> Vec<String> {
    vec![
        input.display().to_string(),
        output.display().to_string(),
        format!("-tempo={}", percent_change(settings.tempo_ratio)),
        format!("-pitch={}", trim_number(settings.pitch_semitones as f64)),
        format!("-rate={}", percent_change(settings.speed)),
    ]
}

fn percent_change(ratio: f32) -> String {
    trim_number((ratio as f64 - 1.0) * 100.0)
}

fn trim_number(value: f64) -> String {
    let text = format!("{value:.2}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

fn last_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .map(str::to_string)
}

fn parse_version(banner: &str) -> Option<String> {
    for line in banner.lines() {
        if let Some(idx) = line.find("SoundStretch v") {
            let rest = &line[idx + "SoundStretch v".len()..];
            let version: String = rest
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '.')
                .collect();
            if !version.is_empty() {
                return Some(version);
            }
        }
    }
    last_line(banner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(tempo_ratio: f32, pitch_semitones: f32, speed: f32) -> EngineSettings {
        EngineSettings {
            tempo_ratio,
            pitch_semitones,
            speed,
        }
    }

    #[test]
    fn args_express_ratios_as_percent_change() {
        let args = command_args(
            Path::new("/music/in.wav"),
            Path::new("/music/out.wav"),
            &settings(1.2, -3.0, 1.0),
        );
        assert_eq!(
            args,
            vec!["/music/in.wav", "/music/out.wav", "-tempo=20", "-pitch=-3", "-rate=0"]
        );
    }

    #[test]
    fn raw_speed_zero_maps_to_full_slowdown() {
        let args = command_args(Path::new("/a.wav"), Path::new("/b.wav"), &settings(0.5, 0.0, 0.0));
        assert_eq!(args[2], "-tempo=-50");
        assert_eq!(args[3], "-pitch=0");
        assert_eq!(args[4], "-rate=-100");
    }

    #[test]
    fn numbers_keep_meaningful_decimals() {
        assert_eq!(trim_number(12.5), "12.5");
        assert_eq!(trim_number(-0.001), "0");
        assert_eq!(percent_change(1.055), "5.5");
    }

    #[test]
    fn version_comes_from_banner() {
        let banner = "\nSoundStretch v2.3.2 -  Written by Olli Parviainen 2001 - 2022\n==================\n";
        assert_eq!(parse_version(banner).as_deref(), Some("2.3.2"));
        assert_eq!(parse_version("custom engine 9\n").as_deref(), Some("custom engine 9"));
        assert_eq!(parse_version("  \n"), None);
    }

    #[test]
    fn missing_program_reports_spawn_failure() {
        let factory = SoundStretch::new("/nonexistent/soundstretch-binary");
        let mut engine = factory.create();
        let status = engine.transform_file(
            Path::new("/tmp/in.wav"),
            Path::new("/tmp/out.wav"),
            &CancelToken::new(),
        );
        assert_eq!(status, STATUS_SPAWN_FAILED);
        assert!(engine.last_error().contains("soundstretch-binary"));
        assert!(factory.version().starts_with("unavailable"));
    }

    #[cfg(unix)]
    mod unix {
        use super::*;

        // Scripts are run through `sh` instead of being exec'd directly so a
        // freshly written file never hits ETXTBSY.
        fn script(name: &str, body: &str) -> SoundStretch {
            let dir = std::env::temp_dir().join(format!(
                "stretch-core-engine-{}-{}",
                name,
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap()
                    .as_nanos()
            ));
            std::fs::create_dir_all(&dir).unwrap();
            let path = dir.join("engine.sh");
            std::fs::write(&path, body).unwrap();
            SoundStretch::new("sh").with_leading_args(vec![path.display().to_string()])
        }

        #[test]
        fn zero_exit_is_success() {
            let factory = script("ok", "echo 'SoundStretch v2.3.2 - banner' >&2\nexit 0\n");
            let mut engine = factory.create();
            engine.configure(settings(1.0, 0.0, 1.0));
            let status =
                engine.transform_file(Path::new("/in.wav"), Path::new("/out.wav"), &CancelToken::new());
            assert_eq!(status, STATUS_OK);
            assert_eq!(factory.version(), "2.3.2");
        }

        #[test]
        fn non_zero_exit_reports_last_stderr_line() {
            let factory = script(
                "fail",
                "echo 'SoundStretch v2.3.2' >&2\necho 'Error : Unable to open file \"/in.wav\"' >&2\nexit 3\n",
            );
            let mut engine = factory.create();
            let status =
                engine.transform_file(Path::new("/in.wav"), Path::new("/out.wav"), &CancelToken::new());
            assert_eq!(status, 3);
            assert_eq!(engine.last_error(), "Error : Unable to open file \"/in.wav\"");
        }

        #[test]
        fn script_receives_mapped_arguments() {
            let factory = script("args", "echo \"$3 $4 $5\" >&2\nexit 1\n");
            let mut engine = factory.create();
            engine.configure(settings(0.5, 2.0, 1.0));
            engine.transform_file(Path::new("/in.wav"), Path::new("/out.wav"), &CancelToken::new());
            assert_eq!(engine.last_error(), "-tempo=-50 -pitch=2 -rate=0");
        }

        #[test]
        fn cancel_kills_running_engine() {
            let factory = script("slow", "exec sleep 30\n");
            let mut engine = factory.create();
            let cancel = CancelToken::new();
            let trigger = cancel.clone();
            let started = std::time::Instant::now();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(100));
                trigger.cancel();
            });
            let status = engine.transform_file(Path::new("/in.wav"), Path::new("/out.wav"), &cancel);
            assert_eq!(status, STATUS_CANCELLED);
            assert_eq!(engine.last_error(), "cancelled");
            assert!(started.elapsed() < Duration::from_secs(10));
        }
    }
}
