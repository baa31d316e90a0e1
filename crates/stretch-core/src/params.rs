//! User-editable processing parameters.
//!
//! The model stores exactly what the input surface shows (`"tempo:120"`) and
//! only turns it into numbers when a request is built, so there is no second
//! copy of the values that could drift from the labels.

use std::fmt;

use crate::error::{FormatError, RequestError};

/// One of the three parameter controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Tempo,
    Pitch,
    Speed,
}

impl Control {
    pub const ALL: [Control; 3] = [Control::Tempo, Control::Pitch, Control::Speed];

    /// Label prefix used in the `label:value` text.
    pub fn label(self) -> &'static str {
        match self {
            Control::Tempo => "tempo",
            Control::Pitch => "pitch",
            Control::Speed => "speed",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Control::Tempo => Control::Pitch,
            Control::Pitch => Control::Speed,
            Control::Speed => Control::Tempo,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Control::Tempo => Control::Speed,
            Control::Pitch => Control::Tempo,
            Control::Speed => Control::Pitch,
        }
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Parse the integer suffix of a `label:value` text.
///
/// The text is split on `:` and the second field must be a valid `i32` (an
/// optional sign is accepted, surrounding whitespace is not). Later fields are
/// ignored, so `"tempo:1:2"` reads as `1`.
pub fn parse_labeled_int(text: &str) -> Result<i32, FormatError> {
    let value = text
        .split(':')
        .nth(1)
        .ok_or_else(|| FormatError::MissingDelimiter(text.to_string()))?;
    value.parse::<i32>().map_err(|_| FormatError::InvalidInteger {
        text: text.to_string(),
        value: value.to_string(),
    })
}

/// Integers read from the model at request time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parameters {
    pub tempo_percent: i32,
    pub pitch_semitones: i32,
    pub speed: i32,
}

/// Label texts for the three controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterModel {
    tempo: String,
    pitch: String,
    speed: String,
}

impl ParameterModel {
    pub fn new(tempo_percent: i32, pitch_semitones: i32, speed: i32) -> Self {
        Self {
            tempo: labeled(Control::Tempo, tempo_percent),
            pitch: labeled(Control::Pitch, pitch_semitones),
            speed: labeled(Control::Speed, speed),
        }
    }

    pub fn label(&self, control: Control) -> &str {
        match control {
            Control::Tempo => &self.tempo,
            Control::Pitch => &self.pitch,
            Control::Speed => &self.speed,
        }
    }

    /// Replace a label verbatim. Free-text surfaces go through here.
    pub fn set_label(&mut self, control: Control, text: impl Into<String>) {
        *self.slot(control) = text.into();
    }

    /// Live-update callback from a slider: rewrites the label, nothing else.
    pub fn on_value_changed(&mut self, control: Control, value: i32) {
        *self.slot(control) = labeled(control, value);
    }

    /// Current value of one control, if its label parses.
    pub fn value(&self, control: Control) -> Option<i32> {
        parse_labeled_int(self.label(control)).ok()
    }

    /// Parse all three labels, failing on the first one that does not parse.
    pub fn read(&self) -> Result<Parameters, RequestError> {
        let read = |control: Control| {
            parse_labeled_int(self.label(control))
                .map_err(|source| RequestError::Format { control, source })
        };
        Ok(Parameters {
            tempo_percent: read(Control::Tempo)?,
            pitch_semitones: read(Control::Pitch)?,
            speed: read(Control::Speed)?,
        })
    }

    fn slot(&mut self, control: Control) -> &mut String {
        match control {
            Control::Tempo => &mut self.tempo,
            Control::Pitch => &mut self.pitch,
            Control::Speed => &mut self.speed,
        }
    }
}

fn labeled(control: Control, value: i32) -> String {
    format!("{}:{value}", control.label())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_returns_numeric_suffix() {
        assert_eq!(parse_labeled_int("tempo:120"), Ok(120));
        assert_eq!(parse_labeled_int("pitch:-3"), Ok(-3));
        assert_eq!(parse_labeled_int("speed:+7"), Ok(7));
        assert_eq!(parse_labeled_int(":0"), Ok(0));
    }

    #[test]
    fn parse_ignores_fields_after_the_value() {
        assert_eq!(parse_labeled_int("tempo:1:2"), Ok(1));
        assert_eq!(parse_labeled_int("pitch:-4:x:y"), Ok(-4));
    }

    #[test]
    fn parse_rejects_missing_delimiter() {
        assert_eq!(
            parse_labeled_int("tempo120"),
            Err(FormatError::MissingDelimiter("tempo120".into()))
        );
    }

    #[test]
    fn parse_rejects_non_integer_suffix() {
        for text in ["tempo:abc", "tempo:", "tempo: 5", "tempo:1.5", "tempo::2", "tempo:99999999999"] {
            assert!(
                matches!(parse_labeled_int(text), Err(FormatError::InvalidInteger { .. })),
                "{text} should not parse"
            );
        }
    }

    #[test]
    fn value_changes_rewrite_labels() {
        let mut model = ParameterModel::new(100, 0, 1);
        model.on_value_changed(Control::Tempo, 120);
        model.on_value_changed(Control::Pitch, -2);
        assert_eq!(model.label(Control::Tempo), "tempo:120");
        assert_eq!(model.label(Control::Pitch), "pitch:-2");
        assert_eq!(
            model.read(),
            Ok(Parameters {
                tempo_percent: 120,
                pitch_semitones: -2,
                speed: 1,
            })
        );
    }

    #[test]
    fn read_reports_the_offending_control() {
        let mut model = ParameterModel::new(100, 0, 1);
        model.set_label(Control::Speed, "speed:fast");
        match model.read() {
            Err(RequestError::Format { control, .. }) => assert_eq!(control, Control::Speed),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(model.value(Control::Speed), None);
        assert_eq!(model.value(Control::Tempo), Some(100));
    }

    #[test]
    fn control_cycle_visits_every_control() {
        let mut c = Control::Tempo;
        for _ in 0..3 {
            assert_eq!(c.next().prev(), c);
            c = c.next();
        }
        assert_eq!(c, Control::Tempo);
    }
}
