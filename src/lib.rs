//! Основной файл библиотеки narrator
//!
//! Turns arbitrary text into one narrated WAV file: the text is split into
//! model-sized fragments, each fragment goes through a TTS backend in order,
//! and the segments are stitched together with short pauses.

pub mod config;
pub mod error;
pub mod media;
pub mod models;
pub mod server;
pub mod text;
pub mod tts;
pub mod utils;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use hound::WavSpec;

use crate::config::ServiceConfig;
use crate::error::{NarrateError, Result};
use crate::models::NarrationRequest;
use crate::text::chunk_text;
use crate::tts::{synthesize_all, BackendRegistry, EngineStatus, SynthesisOptions};
use crate::utils::RequestWorkspace;

/// A finished narration, stored in its request workspace
#[derive(Debug)]
pub struct FinalAudio {
    workspace: RequestWorkspace,
    path: PathBuf,
    duration: Duration,
    spec: WavSpec,
    fragment_count: usize,
}

impl FinalAudio {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn spec(&self) -> WavSpec {
        self.spec
    }

    pub fn fragment_count(&self) -> usize {
        self.fragment_count
    }

    /// Read the WAV file; the workspace is removed afterwards
    pub async fn into_bytes(self) -> Result<Vec<u8>> {
        let bytes = tokio::fs::read(&self.path).await?;
        drop(self.workspace);
        Ok(bytes)
    }
}

/// Основная структура сервиса озвучки
pub struct Narrator {
    /// Конфигурация сервиса
    config: Arc<ServiceConfig>,
    /// Загруженные движки
    registry: BackendRegistry,
}

impl Narrator {
    pub fn new(config: ServiceConfig) -> Self {
        let config = Arc::new(config);
        Self {
            registry: BackendRegistry::new(Arc::clone(&config)),
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Run a validated request through the whole pipeline
    pub async fn narrate(&self, request: NarrationRequest) -> Result<FinalAudio> {
        request.validate()?;

        let fragments = chunk_text(&request.text, request.max_chars, request.split_strategy);
        if fragments.is_empty() {
            return Err(NarrateError::validation("Text is required."));
        }

        log::info!(
            "Narrating {} chars with {} in {} fragment(s)",
            request.text.chars().count(),
            request.engine,
            fragments.len()
        );

        let mut workspace = RequestWorkspace::new(self.config.temp_dir.as_deref())?;

        let reference_voice = match &request.reference_voice {
            Some(bytes) => Some(workspace.write_file("reference", "wav", bytes).await?),
            None => None,
        };

        let options = SynthesisOptions {
            language: request.language.clone(),
            reference_voice,
            reference_transcript: request.transcript.clone(),
            seed: request.seed,
            speed: request.speed,
        };

        let backend = self.registry.get(request.engine).await?;
        let output = synthesize_all(&fragments, backend.as_ref(), &options, request.pause_ms).await?;

        let duration = output.duration();
        let spec = output.spec();
        log::info!(
            "Narration ready: {:.2}s, {} Hz, {} channel(s)",
            duration.as_secs_f64(),
            spec.sample_rate,
            spec.channels
        );

        // encoding a long narration is CPU-bound
        let wav = tokio::task::spawn_blocking(move || output.to_wav_bytes())
            .await
            .map_err(|e| NarrateError::Backend(format!("WAV encoding task failed: {}", e)))??;
        let path = workspace.write_file("speech", "wav", &wav).await?;

        Ok(FinalAudio {
            workspace,
            path,
            duration,
            spec,
            fragment_count: fragments.len(),
        })
    }

    /// Usability of every engine
    pub async fn engine_statuses(&self) -> Vec<EngineStatus> {
        self.registry.statuses().await
    }

    /// Release backends at service teardown
    pub async fn shutdown(&self) {
        log::info!("Shutting down narrator");
        self.registry.shutdown().await;
    }
}
