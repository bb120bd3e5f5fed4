// XTTS v2 backend
// Talks to an XTTS inference server that keeps the model loaded between calls

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::{multipart, Client};
use tokio::sync::Mutex;

use super::seed::SeedPlan;
use super::{error_body, join_url, probe, BackendHealth, EngineKind, SpeechBackend, SynthesisOptions};
use crate::config::XttsConfig;
use crate::error::{NarrateError, Result};
use crate::media::AudioSegment;

/// XTTS v2 client; one generation in flight at a time
pub struct XttsBackend {
    config: XttsConfig,
    client: Client,
    // the server holds a single model instance
    inference: Mutex<()>,
}

impl XttsBackend {
    /// Create the client and make sure the server answers its health check
    pub async fn connect(config: XttsConfig) -> Result<Self> {
        let construction_error = |reason: String| NarrateError::BackendConstruction {
            engine: EngineKind::Xtts.to_string(),
            reason,
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| construction_error(format!("failed to create HTTP client: {}", e)))?;

        info!("Connecting to XTTS server at {} (model {})", config.base_url, config.model);
        let health = probe(&client, &join_url(&config.base_url, &config.health_path)).await;
        if !health.usable {
            return Err(construction_error(health.detail.unwrap_or_default()));
        }

        Ok(Self {
            config,
            client,
            inference: Mutex::new(()),
        })
    }

    async fn build_form(&self, fragment: &str, options: &SynthesisOptions, seed: SeedPlan) -> Result<multipart::Form> {
        let mut form = multipart::Form::new()
            .text("text", fragment.to_string())
            .text("language", options.language.clone())
            .text("speed", options.speed.to_string())
            .text("model", self.config.model.clone())
            .text("device", self.config.device.clone())
            // fragments are already sentence-bounded
            .text("split_sentences", "false");

        if let Some(seed) = seed.value() {
            form = form.text("seed", seed.to_string());
        }

        if let Some(path) = &options.reference_voice {
            let bytes = tokio::fs::read(path).await?;
            let part = multipart::Part::bytes(bytes)
                .file_name("speaker.wav")
                .mime_str("audio/wav")?;
            form = form.part("speaker_wav", part);
        }

        Ok(form)
    }
}

#[async_trait]
impl SpeechBackend for XttsBackend {
    fn engine(&self) -> EngineKind {
        EngineKind::Xtts
    }

    async fn synthesize(&self, fragment: &str, options: &SynthesisOptions) -> Result<AudioSegment> {
        let _guard = self.inference.lock().await;

        let seed = SeedPlan::prepare(options.seed);
        let form = self.build_form(fragment, options, seed).await?;
        let url = join_url(&self.config.base_url, &self.config.synthesize_path);

        debug!("XTTS request: {} chars, language {}", fragment.chars().count(), options.language);
        let response = self.client.post(&url).multipart(form).send().await?;

        if !response.status().is_success() {
            return Err(NarrateError::Backend(format!(
                "XTTS request failed with {}",
                error_body(response).await
            )));
        }

        let bytes = response.bytes().await?;
        AudioSegment::decode(&bytes)
    }

    async fn health_check(&self) -> BackendHealth {
        probe(&self.client, &join_url(&self.config.base_url, &self.config.health_path)).await
    }
}
