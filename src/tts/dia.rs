// Dia backend
// Talks to a Dia inference server. Dia is dialogue-tagged and ignores language and speed.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::{multipart, Client};
use tokio::sync::Mutex;

use super::seed::SeedPlan;
use super::{error_body, join_url, probe, BackendHealth, EngineKind, SpeechBackend, SynthesisOptions};
use crate::config::DiaConfig;
use crate::error::{NarrateError, Result};
use crate::media::AudioSegment;

const SPEAKER_TAG: &str = "[S1]";

/// Prefix the speaker tag Dia needs, unless the text already starts with it
pub fn tag_speaker(text: &str) -> String {
    if text.trim_start().starts_with(SPEAKER_TAG) {
        text.to_string()
    } else {
        format!("{} {}", SPEAKER_TAG, text)
    }
}

/// Dia client; one generation in flight at a time
pub struct DiaBackend {
    config: DiaConfig,
    client: Client,
    inference: Mutex<()>,
}

impl DiaBackend {
    pub async fn connect(config: DiaConfig) -> Result<Self> {
        let construction_error = |reason: String| NarrateError::BackendConstruction {
            engine: EngineKind::Dia.to_string(),
            reason,
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| construction_error(format!("failed to create HTTP client: {}", e)))?;

        info!("Connecting to Dia server at {} (checkpoint {})", config.base_url, config.checkpoint);
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
        let config = &self.config;
        let mut form = multipart::Form::new()
            .text("text", tag_speaker(fragment))
            .text("checkpoint", config.checkpoint.clone())
            .text("device", config.device.clone())
            .text("max_new_tokens", config.max_new_tokens.to_string())
            .text("guidance_scale", config.guidance_scale.to_string())
            .text("temperature", config.temperature.to_string())
            .text("top_p", config.top_p.to_string())
            .text("top_k", config.top_k.to_string())
            .text("do_sample", "true");

        if let Some(seed) = seed.value() {
            form = form.text("seed", seed.to_string());
        }

        if let Some(path) = &options.reference_voice {
            let bytes = tokio::fs::read(path).await?;
            let part = multipart::Part::bytes(bytes)
                .file_name("prompt.wav")
                .mime_str("audio/wav")?;
            form = form.part("audio_prompt", part);

            if let Some(transcript) = options.reference_transcript.as_deref().filter(|t| !t.trim().is_empty()) {
                form = form.text("audio_prompt_transcript", tag_speaker(transcript));
            }
        }

        Ok(form)
    }
}

#[async_trait]
impl SpeechBackend for DiaBackend {
    fn engine(&self) -> EngineKind {
        EngineKind::Dia
    }

    async fn synthesize(&self, fragment: &str, options: &SynthesisOptions) -> Result<AudioSegment> {
        let _guard = self.inference.lock().await;

        if options.language != "en" || (options.speed - 1.0).abs() > f32::EPSILON {
            debug!(
                "Dia ignores language ({}) and speed ({})",
                options.language, options.speed
            );
        }

        let seed = SeedPlan::prepare(options.seed);
        let form = self.build_form(fragment, options, seed).await?;
        let url = join_url(&self.config.base_url, &self.config.generate_path);

        let response = self.client.post(&url).multipart(form).send().await?;

        if !response.status().is_success() {
            return Err(NarrateError::Backend(format!(
                "Dia request failed with {}",
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
