use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use super::audio;
use crate::modules::dubbing::error::{DubbingError, Stage};
use crate::modules::dubbing::model::TargetLanguage;

#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesizes speech for `text` into `out` (fixed MP3 format).
    async fn synthesize(
        &self,
        text: &str,
        language: TargetLanguage,
        out: &Path,
    ) -> Result<(), DubbingError>;

    /// Pure timing filler of exact duration. Deterministic, no provider call.
    async fn synthesize_silence(&self, seconds: f64, out: &Path) -> Result<(), DubbingError>;
}

/// One concrete speech backend. Kept behind a trait so the fallback policy is
/// an explicit loop over providers rather than error-driven control flow.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn speak(&self, text: &str, voice: &str, out: &Path) -> Result<(), DubbingError>;
}

/// OpenAI-style `audio/speech` endpoint.
pub struct OpenAiSpeech {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    label: String,
}

impl OpenAiSpeech {
    pub fn new(client: reqwest::Client, api_base: &str, api_key: &str, label: &str) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            label: label.to_string(),
        }
    }
}

#[async_trait]
impl SpeechProvider for OpenAiSpeech {
    fn name(&self) -> &str {
        &self.label
    }

    async fn speak(&self, text: &str, voice: &str, out: &Path) -> Result<(), DubbingError> {
        let response = self
            .client
            .post(format!("{}/audio/speech", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": "tts-1",
                "voice": voice,
                "input": text,
                "response_format": "mp3",
            }))
            .send()
            .await
            .map_err(|e| DubbingError::transient(Stage::Synthesizing, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("provider returned {status}: {body}");
            if status.as_u16() == 429 || status.is_server_error() {
                return Err(DubbingError::transient(Stage::Synthesizing, message));
            }
            return Err(DubbingError::fatal(Stage::Synthesizing, message));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DubbingError::transient(Stage::Synthesizing, e.to_string()))?;

        tokio::fs::write(out, &bytes).await.map_err(|e| {
            DubbingError::fatal(Stage::Synthesizing, format!("failed to write clip: {e}"))
        })?;

        Ok(())
    }
}

/// Voice selection is a pure function of the language: config override first,
/// then the language's built-in default.
pub fn select_voice(overrides: &HashMap<String, String>, language: TargetLanguage) -> String {
    overrides
        .get(language.code())
        .cloned()
        .unwrap_or_else(|| language.default_voice().to_string())
}

/// Speech service holding the configured provider chain (primary plus an
/// optional secondary fallback) and the per-language voice overrides.
pub struct SpeechService {
    providers: Vec<Box<dyn SpeechProvider>>,
    voice_overrides: HashMap<String, String>,
}

impl SpeechService {
    pub fn new(
        providers: Vec<Box<dyn SpeechProvider>>,
        voice_overrides: HashMap<String, String>,
    ) -> Self {
        Self {
            providers,
            voice_overrides,
        }
    }
}

#[async_trait]
impl Synthesizer for SpeechService {
    async fn synthesize(
        &self,
        text: &str,
        language: TargetLanguage,
        out: &Path,
    ) -> Result<(), DubbingError> {
        let voice = select_voice(&self.voice_overrides, language);
        let mut last_error = DubbingError::fatal(Stage::Synthesizing, "no speech provider configured");

        for provider in &self.providers {
            match provider.speak(text, &voice, out).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!("Speech provider '{}' failed: {}", provider.name(), e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    async fn synthesize_silence(&self, seconds: f64, out: &Path) -> Result<(), DubbingError> {
        audio::silence_clip(seconds, out).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_override_wins_over_language_default() {
        let mut overrides = HashMap::new();
        overrides.insert("mr".to_string(), "fable".to_string());

        assert_eq!(select_voice(&overrides, TargetLanguage::Mr), "fable");
        assert_eq!(
            select_voice(&overrides, TargetLanguage::Hi),
            TargetLanguage::Hi.default_voice()
        );
    }
}
