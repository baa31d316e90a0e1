use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::engine::EngineSettings;
use crate::error::RequestError;
use crate::params::Parameters;

/// Sequence number assigned when the process action fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How the raw speed integer reaches the engine.
///
/// `Raw` hands the integer over unchanged, unlike tempo which is divided by
/// 100. `Percent` applies the tempo conversion to speed as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedScaling {
    #[default]
    Raw,
    Percent,
}

impl FromStr for SpeedScaling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Ok(SpeedScaling::Raw),
            "percent" => Ok(SpeedScaling::Percent),
            other => Err(format!("unknown speed scaling {other:?} (expected raw or percent)")),
        }
    }
}

/// Convert a tempo percentage to the ratio the engine expects (100 => 1.0).
pub fn tempo_ratio(percent: i32) -> f32 {
    percent as f32 / 100.0
}

/// Immutable bundle of everything one engine call needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingRequest {
    id: RequestId,
    input: PathBuf,
    output: PathBuf,
    tempo: f32,
    pitch: f32,
    speed: f32,
}

impl ProcessingRequest {
    /// Build a request from freshly parsed parameters.
    ///
    /// Only the shape of the paths is checked; whether the input exists is the
    /// engine's problem.
    pub fn build(
        id: RequestId,
        input: &Path,
        output: &Path,
        params: Parameters,
        speed_scaling: SpeedScaling,
    ) -> Result<Self, RequestError> {
        check_path("input", input)?;
        check_path("output", output)?;
        let speed = match speed_scaling {
            SpeedScaling::Raw => params.speed as f32,
            SpeedScaling::Percent => params.speed as f32 / 100.0,
        };
        Ok(Self {
            id,
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            tempo: tempo_ratio(params.tempo_percent),
            pitch: params.pitch_semitones as f32,
            speed,
        })
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Tempo ratio, 1.0 = unchanged.
    pub fn tempo(&self) -> f32 {
        self.tempo
    }

    /// Pitch shift in semitones.
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn settings(&self) -> EngineSettings {
        EngineSettings {
            tempo_ratio: self.tempo,
            pitch_semitones: self.pitch,
            speed: self.speed,
        }
    }
}

fn check_path(role: &'static str, path: &Path) -> Result<(), RequestError> {
    if path.as_os_str().is_empty() || !path.is_absolute() {
        return Err(RequestError::Path {
            role,
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abs(name: &str) -> PathBuf {
        std::env::temp_dir().join(name)
    }

    fn params(tempo_percent: i32, pitch_semitones: i32, speed: i32) -> Parameters {
        Parameters {
            tempo_percent,
            pitch_semitones,
            speed,
        }
    }

    #[test]
    fn tempo_ratio_is_exact() {
        assert_eq!(tempo_ratio(100), 1.0);
        assert_eq!(tempo_ratio(50), 0.5);
        assert_eq!(tempo_ratio(0), 0.0);
    }

    #[test]
    fn build_converts_tempo_and_passes_speed_through() {
        let req = ProcessingRequest::build(
            RequestId(7),
            &abs("in.wav"),
            &abs("out.wav"),
            params(120, -3, 2),
            SpeedScaling::Raw,
        )
        .unwrap();
        assert_eq!(req.id(), RequestId(7));
        assert_eq!(req.tempo(), 1.2);
        assert_eq!(req.pitch(), -3.0);
        assert_eq!(req.speed(), 2.0);
        assert_eq!(req.output(), abs("out.wav").as_path());
    }

    #[test]
    fn percent_scaling_divides_speed() {
        let req = ProcessingRequest::build(
            RequestId(1),
            &abs("in.wav"),
            &abs("out.wav"),
            params(100, 0, 50),
            SpeedScaling::Percent,
        )
        .unwrap();
        assert_eq!(req.speed(), 0.5);
        assert_eq!(req.settings().tempo_ratio, 1.0);
    }

    #[test]
    fn relative_or_empty_paths_are_rejected() {
        let err = ProcessingRequest::build(
            RequestId(1),
            Path::new("in.wav"),
            &abs("out.wav"),
            params(100, 0, 1),
            SpeedScaling::Raw,
        )
        .unwrap_err();
        assert!(matches!(err, RequestError::Path { role: "input", .. }));

        let err = ProcessingRequest::build(
            RequestId(1),
            &abs("in.wav"),
            Path::new(""),
            params(100, 0, 1),
            SpeedScaling::Raw,
        )
        .unwrap_err();
        assert!(matches!(err, RequestError::Path { role: "output", .. }));
    }

    #[test]
    fn speed_scaling_parses_from_text() {
        assert_eq!("raw".parse::<SpeedScaling>(), Ok(SpeedScaling::Raw));
        assert_eq!(" Percent ".parse::<SpeedScaling>(), Ok(SpeedScaling::Percent));
        assert!("ratio".parse::<SpeedScaling>().is_err());
    }
}
