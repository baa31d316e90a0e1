//! Lightweight WAV inspection for display purposes.
//!
//! Never used to gate a request: a missing or broken input is reported by
//! the engine, this only fills in the header of the UI.

use std::fmt;
use std::fs::File;
use std::path::Path;

use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudioInfo {
    pub sample_rate: Option<u32>,
    pub channels: Option<usize>,
    pub bits_per_sample: Option<u32>,
    pub duration_ms: Option<u64>,
}

impl fmt::Display for AudioInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(sr) = self.sample_rate {
            parts.push(format!("{sr} Hz"));
        }
        if let Some(ch) = self.channels {
            parts.push(format!("{ch} ch"));
        }
        if let Some(bits) = self.bits_per_sample {
            parts.push(format!("{bits} bit"));
        }
        if let Some(ms) = self.duration_ms {
            let secs = ms / 1000;
            parts.push(format!("{}:{:02}", secs / 60, secs % 60));
        }
        if parts.is_empty() {
            f.write_str("-")
        } else {
            f.write_str(&parts.join(", "))
        }
    }
}

/// Read stream parameters from an audio file, `None` if it cannot be probed.
pub fn probe_audio(path: &Path) -> Option<AudioInfo> {
    let file = File::open(path).ok()?;
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(&ext.to_ascii_lowercase());
    }

    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .ok()?;

    let track = probed.format.default_track()?;
    let params = &track.codec_params;
    let duration_ms = match (params.n_frames, params.sample_rate) {
        (Some(frames), Some(rate)) if rate > 0 => Some(frames.saturating_mul(1000) / rate as u64),
        _ => None,
    };
    Some(AudioInfo {
        sample_rate: params.sample_rate,
        channels: params.channels.map(|c| c.count()),
        bits_per_sample: params.bits_per_sample,
        duration_ms,
    })
}
