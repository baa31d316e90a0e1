//! Configuration loading and parsing.
//!
//! Defines the TOML schema and resolves it into the settings a session runs with.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::gate::AdmissionPolicy;
use crate::params::Control;
use crate::request::SpeedScaling;

const DEFAULT_INPUT: &str = "new.wav";
const DEFAULT_OUTPUT: &str = "new_after.wav";
const DEFAULT_ENGINE: &str = "soundstretch";

/// Top-level configuration loaded from TOML. Every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct ShellConfig {
    /// Input WAV file; relative paths resolve against the working directory.
    pub input: Option<String>,
    /// Output WAV file written by the engine.
    pub output: Option<String>,
    /// Engine command settings.
    pub engine: Option<EngineConfig>,
    /// Playback command settings.
    pub player: Option<PlayerConfig>,
    /// What to do with a process action while a request is running.
    pub admission: Option<AdmissionPolicy>,
    /// Max requests waiting behind the running one (queue policy only).
    pub queue_depth: Option<usize>,
    /// How the speed control value reaches the engine.
    pub speed_scaling: Option<SpeedScaling>,
    /// Cap on status log lines kept in memory.
    pub max_log_lines: Option<usize>,
    /// Slider ranges.
    pub controls: Option<ControlsConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EngineConfig {
    /// Engine executable (default `soundstretch` from PATH).
    pub program: Option<String>,
    /// Extra arguments placed before the input/output pair.
    pub args: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlayerConfig {
    /// Set to false to never launch playback.
    pub enabled: Option<bool>,
    /// Player executable; defaults to the platform opener.
    pub program: Option<String>,
    /// Arguments placed before the output path.
    pub args: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ControlsConfig {
    pub tempo: Option<ControlRange>,
    pub pitch: Option<ControlRange>,
    pub speed: Option<ControlRange>,
}

/// Inclusive slider range plus the value shown at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ControlRange {
    pub min: i32,
    pub max: i32,
    pub default: i32,
}

impl ControlRange {
    pub fn clamp(&self, value: i32) -> i32 {
        value.clamp(self.min, self.max)
    }
}

/// Resolved ranges for the three controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub tempo: ControlRange,
    pub pitch: ControlRange,
    pub speed: ControlRange,
}

impl Controls {
    /// Built-in ranges. Speed defaults to "unchanged" under either scaling.
    pub fn defaults(speed_scaling: SpeedScaling) -> Self {
        let speed = match speed_scaling {
            SpeedScaling::Raw => ControlRange { min: 0, max: 4, default: 1 },
            SpeedScaling::Percent => ControlRange { min: 10, max: 400, default: 100 },
        };
        Self {
            tempo: ControlRange { min: 10, max: 400, default: 100 },
            pitch: ControlRange { min: -12, max: 12, default: 0 },
            speed,
        }
    }

    pub fn range(&self, control: Control) -> ControlRange {
        match control {
            Control::Tempo => self.tempo,
            Control::Pitch => self.pitch,
            Control::Speed => self.speed,
        }
    }
}

/// Everything a session needs, with defaults applied and paths made absolute.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub input: PathBuf,
    pub output: PathBuf,
    pub admission: AdmissionPolicy,
    pub queue_depth: usize,
    pub speed_scaling: SpeedScaling,
    pub max_log_lines: Option<usize>,
    pub controls: Controls,
}

impl ShellConfig {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        let cfg = toml::from_str::<ShellConfig>(&raw)
            .with_context(|| format!("parse config {:?}", path))?;
        Ok(cfg)
    }
}

/// Resolve session settings; relative paths are joined onto `base_dir`.
pub fn session_settings_from_config(cfg: &ShellConfig, base_dir: &Path) -> Result<SessionSettings> {
    let input = resolve_path(cfg.input.as_deref().unwrap_or(DEFAULT_INPUT), base_dir)
        .context("input path")?;
    let output = resolve_path(cfg.output.as_deref().unwrap_or(DEFAULT_OUTPUT), base_dir)
        .context("output path")?;
    if input == output {
        return Err(anyhow::anyhow!(
            "input and output must be different files, both are {:?}",
            input
        ));
    }

    let speed_scaling = cfg.speed_scaling.unwrap_or_default();
    let mut controls = Controls::defaults(speed_scaling);
    if let Some(overrides) = cfg.controls.as_ref() {
        if let Some(r) = overrides.tempo {
            controls.tempo = r;
        }
        if let Some(r) = overrides.pitch {
            controls.pitch = r;
        }
        if let Some(r) = overrides.speed {
            controls.speed = r;
        }
    }
    for control in Control::ALL {
        let r = controls.range(control);
        if r.min > r.max || r.default < r.min || r.default > r.max {
            return Err(anyhow::anyhow!(
                "controls.{control}: expected min <= default <= max, got {}..={} default {}",
                r.min,
                r.max,
                r.default
            ));
        }
    }

    Ok(SessionSettings {
        input,
        output,
        admission: cfg.admission.unwrap_or_default(),
        queue_depth: cfg.queue_depth.unwrap_or(1),
        speed_scaling,
        max_log_lines: cfg.max_log_lines,
        controls,
    })
}

/// Engine program and leading arguments.
pub fn engine_command_from_config(cfg: &ShellConfig) -> (String, Vec<String>) {
    let engine = cfg.engine.as_ref();
    let program = engine
        .and_then(|e| e.program.as_deref())
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_ENGINE)
        .to_string();
    let args = engine.and_then(|e| e.args.clone()).unwrap_or_default();
    (program, args)
}

/// Player command, or `None` when playback is disabled.
/// `Some((None, _))` means the platform opener.
pub fn player_command_from_config(cfg: &ShellConfig) -> Option<(Option<String>, Vec<String>)> {
    let Some(player) = cfg.player.as_ref() else {
        return Some((None, Vec::new()));
    };
    if player.enabled == Some(false) {
        return None;
    }
    let program = player
        .program
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string);
    Some((program, player.args.clone().unwrap_or_default()))
}

fn resolve_path(raw: &str, base_dir: &Path) -> Result<PathBuf> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(anyhow::anyhow!("path is empty"));
    }
    let path = PathBuf::from(trimmed);
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(base_dir.join(path))
    }
}
