//! Filter graph description for merging two audio inputs.
//!
//! The graph is a fixed linear chain of five stages:
//!
//! ```text
//! [0:a][1:a] -> mix -> [mixed] -> fadeIn -> [faded] -> tempoChange -> [tempoed]
//!            -> pitchShift -> [pitched] -> volumeScale -> (output file)
//! ```
//!
//! Building the graph does no I/O. Rendering it produces the textual
//! `-filter_complex` description consumed by ffmpeg.

use std::fmt;
use thiserror::Error;

/// The two source streams feeding the first stage.
pub const SOURCE_PADS: [&str; 2] = ["0:a", "1:a"];
pub const MIXED_PAD: &str = "mixed";
pub const FADED_PAD: &str = "faded";
pub const TEMPOED_PAD: &str = "tempoed";
pub const PITCHED_PAD: &str = "pitched";

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Parameter {name} is not a number: {value:?}")]
    NotANumber { name: &'static str, value: String },

    #[error("Parameter {0} must be finite")]
    NotFinite(&'static str),

    #[error("Fade-in duration cannot be negative: {0}")]
    NegativeFadeIn(f64),

    #[error("Speed must be greater than zero: {0}")]
    NonPositiveSpeed(f64),

    #[error("Volume cannot be negative: {0}")]
    NegativeVolume(f64),

    #[error("Stage {index} reads {found:?}, expected {expected:?}")]
    BrokenChain {
        index: usize,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Stage {0} is missing its output pad")]
    MissingOutputPad(usize),

    #[error("Terminal stage must not declare an output pad")]
    TerminalOutputPad,
}

/// Scalar parameters of a merge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeParams {
    /// Seconds of linear fade-in from silence at the start of the mix.
    pub fade_in_duration: f64,
    /// Pitch scale handed to the pitch shifter.
    pub pitch_shift: f64,
    /// Time-scale factor, 1.0 keeps the original tempo.
    pub speed: f64,
    /// Output gain.
    pub volume: f64,
}

pub const DEFAULT_FADE_IN_DURATION: f64 = 0.0;
pub const DEFAULT_PITCH_SHIFT: f64 = 1.0;
pub const DEFAULT_SPEED: f64 = 1.0;
pub const DEFAULT_VOLUME: f64 = 50.0;

impl Default for MergeParams {
    fn default() -> Self {
        Self {
            fade_in_duration: DEFAULT_FADE_IN_DURATION,
            pitch_shift: DEFAULT_PITCH_SHIFT,
            speed: DEFAULT_SPEED,
            volume: DEFAULT_VOLUME,
        }
    }
}

impl MergeParams {
    /// Parses raw form values. Missing or blank values take their defaults.
    pub fn from_form_values(
        fade_in_duration: Option<&str>,
        pitch_shift: Option<&str>,
        speed: Option<&str>,
        volume: Option<&str>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            fade_in_duration: parse_param(
                "fadeinDuration",
                fade_in_duration,
                DEFAULT_FADE_IN_DURATION,
            )?,
            pitch_shift: parse_param("pitch", pitch_shift, DEFAULT_PITCH_SHIFT)?,
            speed: parse_param("speed", speed, DEFAULT_SPEED)?,
            volume: parse_param("volume", volume, DEFAULT_VOLUME)?,
        })
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let named = [
            ("fadeinDuration", self.fade_in_duration),
            ("pitch", self.pitch_shift),
            ("speed", self.speed),
            ("volume", self.volume),
        ];
        if let Some((name, _)) = named.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ValidationError::NotFinite(*name));
        }
        if self.fade_in_duration < 0.0 {
            return Err(ValidationError::NegativeFadeIn(self.fade_in_duration));
        }
        if self.speed <= 0.0 {
            return Err(ValidationError::NonPositiveSpeed(self.speed));
        }
        if self.volume < 0.0 {
            return Err(ValidationError::NegativeVolume(self.volume));
        }
        Ok(())
    }
}

fn parse_param(
    name: &'static str,
    value: Option<&str>,
    default: f64,
) -> Result<f64, ValidationError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(raw) => raw.parse::<f64>().map_err(|_| ValidationError::NotANumber {
            name,
            value: raw.to_string(),
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Mix,
    FadeIn,
    TempoChange,
    PitchShift,
    VolumeScale,
}

impl Operation {
    /// Name of the ffmpeg filter implementing this operation.
    pub fn filter_name(&self) -> &'static str {
        match self {
            Operation::Mix => "amix",
            Operation::FadeIn => "afade",
            Operation::TempoChange => "atempo",
            Operation::PitchShift => "rubberband",
            Operation::VolumeScale => "volume",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Number(f64),
    Text(&'static str),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Number(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "{}", v),
        }
    }
}

/// One filter in the chain, with its named input and output pads.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub operation: Operation,
    pub parameters: Vec<(&'static str, ParamValue)>,
    pub input_pads: Vec<String>,
    /// `None` for the terminal stage, whose output is the rendered file.
    pub output_pad: Option<String>,
}

impl Stage {
    fn new(
        operation: Operation,
        parameters: Vec<(&'static str, ParamValue)>,
        input_pads: &[&str],
        output_pad: Option<&str>,
    ) -> Self {
        Self {
            operation,
            parameters,
            input_pads: input_pads.iter().map(|p| p.to_string()).collect(),
            output_pad: output_pad.map(str::to_string),
        }
    }

    pub fn parameter(&self, key: &str) -> Option<&ParamValue> {
        self.parameters
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for pad in &self.input_pads {
            out.push_str(&format!("[{}]", pad));
        }
        out.push_str(self.operation.filter_name());
        if !self.parameters.is_empty() {
            let options = self
                .parameters
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(":");
            out.push('=');
            out.push_str(&options);
        }
        if let Some(pad) = &self.output_pad {
            out.push_str(&format!("[{}]", pad));
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterGraph {
    stages: Vec<Stage>,
}

impl FilterGraph {
    /// Builds the five-stage merge chain for `params`.
    pub fn build(params: MergeParams) -> Result<Self, ValidationError> {
        params.validate()?;

        let stages = vec![
            Stage::new(
                Operation::Mix,
                vec![
                    ("inputs", ParamValue::Int(2)),
                    ("duration", ParamValue::Text("longest")),
                ],
                &SOURCE_PADS,
                Some(MIXED_PAD),
            ),
            Stage::new(
                Operation::FadeIn,
                vec![
                    ("t", ParamValue::Text("in")),
                    ("st", ParamValue::Int(0)),
                    ("d", ParamValue::Number(params.fade_in_duration)),
                ],
                &[MIXED_PAD],
                Some(FADED_PAD),
            ),
            Stage::new(
                Operation::TempoChange,
                vec![("tempo", ParamValue::Number(params.speed))],
                &[FADED_PAD],
                Some(TEMPOED_PAD),
            ),
            Stage::new(
                Operation::PitchShift,
                vec![
                    ("pitch", ParamValue::Number(params.pitch_shift)),
                    ("channels", ParamValue::Int(2)),
                ],
                &[TEMPOED_PAD],
                Some(PITCHED_PAD),
            ),
            Stage::new(
                Operation::VolumeScale,
                vec![("volume", ParamValue::Number(params.volume))],
                &[PITCHED_PAD],
                None,
            ),
        ];

        let graph = Self { stages };
        graph.validate_chain()?;
        Ok(graph)
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Checks that the pads form a single linear chain: the first stage
    /// reads the two sources, every other stage reads exactly the previous
    /// stage's output, and only the last stage has no output pad.
    pub fn validate_chain(&self) -> Result<(), ValidationError> {
        let mut expected: Vec<String> = SOURCE_PADS.iter().map(|p| p.to_string()).collect();
        let last = self.stages.len().saturating_sub(1);

        for (index, stage) in self.stages.iter().enumerate() {
            if stage.input_pads != expected {
                return Err(ValidationError::BrokenChain {
                    index,
                    expected,
                    found: stage.input_pads.clone(),
                });
            }
            match (&stage.output_pad, index == last) {
                (Some(_), true) => return Err(ValidationError::TerminalOutputPad),
                (None, false) => return Err(ValidationError::MissingOutputPad(index)),
                (Some(pad), false) => expected = vec![pad.clone()],
                (None, true) => {}
            }
        }
        Ok(())
    }

    /// Renders the `-filter_complex` argument.
    pub fn to_filter_complex(&self) -> String {
        self.stages
            .iter()
            .map(Stage::render)
            .collect::<Vec<_>>()
            .join(";")
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_filter_complex())
    }
}
