use std::str::FromStr;

use bytes::Bytes;

use crate::config::RequestDefaults;
use crate::error::{NarrateError, Result};
use crate::text::SplitStrategy;
use crate::tts::EngineKind;

/// Longest pause accepted between fragments
pub const MAX_PAUSE_MS: u64 = 60_000;

/// Raw form fields of a narration request, as received
#[derive(Debug, Default, Clone)]
pub struct TtsForm {
    pub text: Option<String>,
    pub language: Option<String>,
    pub engine: Option<String>,
    pub seed: Option<String>,
    pub speed: Option<String>,
    pub max_chars: Option<String>,
    pub pause_ms: Option<String>,
    pub split_strategy: Option<String>,
    pub transcript: Option<String>,
    pub consent: Option<String>,
    /// Uploaded reference voice sample
    pub reference: Option<Bytes>,
}

/// A validated narration request
#[derive(Debug, Clone)]
pub struct NarrationRequest {
    pub text: String,
    pub language: String,
    pub engine: EngineKind,
    pub seed: Option<i64>,
    pub speed: f32,
    /// 0 disables chunking
    pub max_chars: usize,
    pub pause_ms: u64,
    pub split_strategy: SplitStrategy,
    pub transcript: Option<String>,
    pub reference_voice: Option<Bytes>,
}

impl NarrationRequest {
    /// A request for `text` with every other field at its default
    pub fn new(text: impl Into<String>, defaults: &RequestDefaults) -> Self {
        Self {
            text: text.into(),
            language: defaults.language.clone(),
            engine: defaults.engine,
            seed: None,
            speed: defaults.speed,
            max_chars: defaults.max_chars,
            pause_ms: defaults.pause_ms,
            split_strategy: defaults.split_strategy,
            transcript: None,
            reference_voice: None,
        }
    }

    /// Check the invariants the pipeline relies on
    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(NarrateError::validation("Text is required."));
        }
        if !(self.speed.is_finite() && self.speed > 0.0) {
            return Err(NarrateError::validation("speed must be a positive number."));
        }
        if self.pause_ms > MAX_PAUSE_MS {
            return Err(NarrateError::validation(format!(
                "pause_ms must not exceed {}.",
                MAX_PAUSE_MS
            )));
        }
        Ok(())
    }
}

impl TtsForm {
    /// Validate the form, filling gaps from `defaults`.
    ///
    /// Consent is checked first, then text, then the numeric fields, then the
    /// engine and split strategy identifiers.
    pub fn into_request(self, defaults: &RequestDefaults) -> Result<NarrationRequest> {
        if !parse_bool(self.consent.as_deref(), "consent")?.unwrap_or(false) {
            return Err(NarrateError::validation(
                "Please confirm you have consent to use this voice.",
            ));
        }

        let text = self.text.unwrap_or_default();
        if text.trim().is_empty() {
            return Err(NarrateError::validation("Text is required."));
        }

        let seed = parse_field::<i64>(self.seed.as_deref(), "seed", "an integer")?;

        let speed = parse_field::<f32>(self.speed.as_deref(), "speed", "a number")?.unwrap_or(defaults.speed);

        // non-positive budgets disable chunking
        let max_chars = parse_field::<i64>(self.max_chars.as_deref(), "max_chars", "an integer")?
            .map(|value| value.max(0) as usize)
            .unwrap_or(defaults.max_chars);

        let pause_ms = match parse_field::<i64>(self.pause_ms.as_deref(), "pause_ms", "an integer")? {
            Some(value) if value < 0 => {
                return Err(NarrateError::validation("pause_ms must not be negative."));
            }
            Some(value) if value as u64 > MAX_PAUSE_MS => {
                return Err(NarrateError::validation(format!(
                    "pause_ms must not exceed {}.",
                    MAX_PAUSE_MS
                )));
            }
            Some(value) => value as u64,
            None => defaults.pause_ms,
        };

        let engine = match non_empty(self.engine.as_deref()) {
            Some(engine) => engine.parse::<EngineKind>()?,
            None => defaults.engine,
        };

        let split_strategy = match non_empty(self.split_strategy.as_deref()) {
            Some(strategy) => strategy.parse::<SplitStrategy>()?,
            None => defaults.split_strategy,
        };

        let request = NarrationRequest {
            text,
            language: non_empty(self.language.as_deref())
                .map(str::to_string)
                .unwrap_or_else(|| defaults.language.clone()),
            engine,
            seed,
            speed,
            max_chars,
            pause_ms,
            split_strategy,
            transcript: non_empty(self.transcript.as_deref()).map(str::to_string),
            reference_voice: self.reference.filter(|bytes| !bytes.is_empty()),
        };

        request.validate()?;
        Ok(request)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_field<T: FromStr>(value: Option<&str>, name: &str, expected: &str) -> Result<Option<T>> {
    match non_empty(value) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| NarrateError::validation(format!("{} must be {}, got '{}'.", name, expected, raw))),
        None => Ok(None),
    }
}

// Same spellings FastAPI accepts for form booleans
fn parse_bool(value: Option<&str>, name: &str) -> Result<Option<bool>> {
    match non_empty(value).map(str::to_ascii_lowercase).as_deref() {
        Some("true" | "t" | "1" | "yes" | "y" | "on") => Ok(Some(true)),
        Some("false" | "f" | "0" | "no" | "n" | "off") => Ok(Some(false)),
        Some(other) => Err(NarrateError::validation(format!("{} must be a boolean, got '{}'.", name, other))),
        None => Ok(None),
    }
}
