//! Модуль для работы с TTS
//!
//! A synthesis backend turns one bounded text fragment into one audio
//! segment. The set of engines is closed: [`EngineKind`] names them and
//! [`Backend`] holds one constructed instance of either.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ServiceConfig;
use crate::error::{NarrateError, Result};
use crate::media::AudioSegment;

pub mod dia;
pub mod registry;
pub mod seed;
pub mod synthesizer;
pub mod xtts;

pub use dia::DiaBackend;
pub use registry::{BackendRegistry, EngineStatus};
pub use synthesizer::synthesize_all;
pub use xtts::XttsBackend;

/// Available TTS engines
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Xtts,
    Dia,
}

impl EngineKind {
    pub const ALL: [EngineKind; 2] = [EngineKind::Xtts, EngineKind::Dia];

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Xtts => "xtts",
            EngineKind::Dia => "dia",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = NarrateError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "xtts" => Ok(EngineKind::Xtts),
            "dia" => Ok(EngineKind::Dia),
            _ => Err(NarrateError::validation("Unknown engine. Use 'xtts' or 'dia'.")),
        }
    }
}

/// How every fragment of one request should be rendered
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisOptions {
    /// Language code, e.g. "en"
    pub language: String,
    /// Reference voice sample for cloning
    pub reference_voice: Option<PathBuf>,
    /// Transcript of the reference sample (used by Dia)
    pub reference_transcript: Option<String>,
    /// Advisory seed, see [`seed::SeedPlan`]
    pub seed: Option<i64>,
    /// 1.0 is normal speed
    pub speed: f32,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            reference_voice: None,
            reference_transcript: None,
            seed: None,
            speed: 1.0,
        }
    }
}

/// Result of a capability probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendHealth {
    pub usable: bool,
    pub detail: Option<String>,
}

impl BackendHealth {
    pub fn ok() -> Self {
        Self { usable: true, detail: None }
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self {
            usable: false,
            detail: Some(detail.into()),
        }
    }
}

/// Trait that all TTS backends must implement
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    fn engine(&self) -> EngineKind;

    /// Render one fragment. Implementations serialize their own calls.
    async fn synthesize(&self, fragment: &str, options: &SynthesisOptions) -> Result<AudioSegment>;

    /// Report whether the backend is usable, without generating audio
    async fn health_check(&self) -> BackendHealth;
}

/// A constructed backend of either kind
pub enum Backend {
    Xtts(XttsBackend),
    Dia(DiaBackend),
}

impl Backend {
    /// Bring up the backend for `kind`; fails if its inference server is not usable
    pub async fn connect(kind: EngineKind, config: &ServiceConfig) -> Result<Self> {
        match kind {
            EngineKind::Xtts => Ok(Backend::Xtts(XttsBackend::connect(config.xtts.clone()).await?)),
            EngineKind::Dia => Ok(Backend::Dia(DiaBackend::connect(config.dia.clone()).await?)),
        }
    }
}

#[async_trait]
impl SpeechBackend for Backend {
    fn engine(&self) -> EngineKind {
        match self {
            Backend::Xtts(_) => EngineKind::Xtts,
            Backend::Dia(_) => EngineKind::Dia,
        }
    }

    async fn synthesize(&self, fragment: &str, options: &SynthesisOptions) -> Result<AudioSegment> {
        match self {
            Backend::Xtts(backend) => backend.synthesize(fragment, options).await,
            Backend::Dia(backend) => backend.synthesize(fragment, options).await,
        }
    }

    async fn health_check(&self) -> BackendHealth {
        match self {
            Backend::Xtts(backend) => backend.health_check().await,
            Backend::Dia(backend) => backend.health_check().await,
        }
    }
}

/// Read an error body from a failed inference call
pub(crate) async fn error_body(response: reqwest::Response) -> String {
    let status = response.status();
    let text = response
        .text()
        .await
        .unwrap_or_else(|e| format!("Failed to read error response: {}", e));
    format!("status {}: {}", status, text.trim())
}

/// Probe `url` with a GET; any 2xx means usable
pub(crate) async fn probe(client: &reqwest::Client, url: &str) -> BackendHealth {
    match client.get(url).send().await {
        Ok(response) if response.status().is_success() => BackendHealth::ok(),
        Ok(response) => BackendHealth::unavailable(format!("health check failed with {}", error_body(response).await)),
        Err(e) => BackendHealth::unavailable(format!("health check failed: {}", e)),
    }
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_identifiers() {
        assert_eq!("xtts".parse::<EngineKind>().unwrap(), EngineKind::Xtts);
        assert_eq!("dia".parse::<EngineKind>().unwrap(), EngineKind::Dia);
        for kind in EngineKind::ALL {
            assert_eq!(kind.as_str().parse::<EngineKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_engine_is_validation_error() {
        let err = "bark".parse::<EngineKind>().unwrap_err();
        assert!(matches!(err, NarrateError::Validation(_)));
        assert_eq!(err.to_string(), "Unknown engine. Use 'xtts' or 'dia'.");
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://h:1/", "/api/tts"), "http://h:1/api/tts");
        assert_eq!(join_url("http://h:1", "health"), "http://h:1/health");
    }
}
