//! Service configuration
//!
//! Settings come from a JSON file (path in `NARRATOR_CONFIG`, otherwise
//! `narrator.json` in the working directory) layered over [`ServiceConfig::default`],
//! then a handful of environment overrides.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{NarrateError, Result};
use crate::text::chunker::SplitStrategy;
use crate::tts::EngineKind;

const CONFIG_ENV: &str = "NARRATOR_CONFIG";
const CONFIG_FILENAME: &str = "narrator.json";

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum multipart body size, reference voice included
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

/// Values used when a request leaves a field out
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestDefaults {
    pub language: String,
    pub engine: EngineKind,
    pub speed: f32,
    pub max_chars: usize,
    pub pause_ms: u64,
    pub split_strategy: SplitStrategy,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            engine: EngineKind::Xtts,
            speed: 1.0,
            max_chars: 280,
            pause_ms: 120,
            split_strategy: SplitStrategy::SentenceAware,
        }
    }
}

/// XTTS v2 inference server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct XttsConfig {
    pub base_url: String,
    pub synthesize_path: String,
    pub health_path: String,
    /// Model name the server should load
    pub model: String,
    /// "auto", "cuda" or "cpu"
    pub device: String,
    pub timeout_secs: u64,
}

impl Default for XttsConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8020".to_string(),
            synthesize_path: "/api/tts".to_string(),
            health_path: "/health".to_string(),
            model: "tts_models/multilingual/multi-dataset/xtts_v2".to_string(),
            device: "auto".to_string(),
            timeout_secs: 300,
        }
    }
}

/// Dia inference server and its sampling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiaConfig {
    pub base_url: String,
    pub generate_path: String,
    pub health_path: String,
    pub checkpoint: String,
    pub device: String,
    pub timeout_secs: u64,
    pub max_new_tokens: u32,
    pub guidance_scale: f32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
}

impl Default for DiaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8030".to_string(),
            generate_path: "/api/generate".to_string(),
            health_path: "/health".to_string(),
            checkpoint: "nari-labs/Dia-1.6B-0626".to_string(),
            device: "auto".to_string(),
            timeout_secs: 600,
            max_new_tokens: 2048,
            guidance_scale: 3.0,
            temperature: 1.4,
            top_p: 0.9,
            top_k: 45,
        }
    }
}

/// Конфигурация сервиса
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub defaults: RequestDefaults,
    pub xtts: XttsConfig,
    pub dia: DiaConfig,
    /// Parent directory for per-request workspaces; system temp dir if unset
    pub temp_dir: Option<PathBuf>,
}

impl ServiceConfig {
    /// Load from the configured file (if any) and apply environment overrides
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILENAME));

        let mut config = if path.exists() {
            log::info!("Loading configuration from {}", path.display());
            Self::from_file(&path)?
        } else {
            log::info!("No configuration file at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let config = serde_json::from_str(&json)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("NARRATOR_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("NARRATOR_PORT") {
            self.server.port = port.parse().map_err(|_| {
                NarrateError::Configuration(format!("NARRATOR_PORT is not a valid port: {}", port))
            })?;
        }
        if let Ok(url) = std::env::var("NARRATOR_XTTS_URL") {
            self.xtts.base_url = url;
        }
        if let Ok(url) = std::env::var("NARRATOR_DIA_URL") {
            self.dia.base_url = url;
        }
        if let Ok(dir) = std::env::var("NARRATOR_TEMP_DIR") {
            self.temp_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for (field, url) in [("xtts.base_url", &self.xtts.base_url), ("dia.base_url", &self.dia.base_url)] {
            if url.trim().is_empty() {
                return Err(NarrateError::Configuration(format!("{} must not be empty", field)));
            }
        }

        if self.xtts.timeout_secs == 0 || self.dia.timeout_secs == 0 {
            return Err(NarrateError::Configuration("Backend timeouts must be positive".to_string()));
        }

        if !(self.defaults.speed > 0.0) {
            return Err(NarrateError::Configuration(format!(
                "defaults.speed must be positive, got {}",
                self.defaults.speed
            )));
        }

        Ok(())
    }
}
