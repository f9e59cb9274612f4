use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::modules::dubbing::error::{DubbingError, Stage};

/// A time-bounded span of transcribed speech.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub text: String,
}

/// Stable internal shape every provider response is adapted to. `segments`
/// may be empty when the provider only returned flat text.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    pub text: String,
    pub segments: Vec<TranscriptSegment>,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        audio: &Path,
        language_hint: Option<&str>,
    ) -> Result<Transcript, DubbingError>;
}

/// Whisper-style HTTP transcription provider. Retries a small bounded number
/// of times on transient failures or empty results, with linear backoff.
pub struct WhisperTranscriber {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    max_retries: u32,
}

#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    text: String,
    #[serde(default)]
    segments: Vec<RawSegment>,
}

#[derive(Debug, Deserialize)]
struct RawSegment {
    start: f64,
    end: f64,
    text: String,
}

impl WhisperTranscriber {
    pub fn new(client: reqwest::Client, api_base: &str, api_key: &str) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            max_retries: 2,
        }
    }

    async fn call_provider(
        &self,
        audio: &Path,
        language_hint: Option<&str>,
    ) -> Result<Transcript, DubbingError> {
        let bytes = tokio::fs::read(audio).await.map_err(|e| {
            DubbingError::fatal(Stage::Transcribing, format!("failed to read audio file: {e}"))
        })?;

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| DubbingError::fatal(Stage::Transcribing, e.to_string()))?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", "whisper-1")
            .text("response_format", "verbose_json");

        if let Some(hint) = language_hint {
            form = form.text("language", hint.to_string());
        }

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.api_base))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DubbingError::transient(Stage::Transcribing, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("provider returned {status}: {body}");
            if status.as_u16() == 429 || status.is_server_error() {
                return Err(DubbingError::transient(Stage::Transcribing, message));
            }
            return Err(DubbingError::fatal(Stage::Transcribing, message));
        }

        let parsed: VerboseTranscription = response
            .json()
            .await
            .map_err(|e| DubbingError::fatal(Stage::Transcribing, format!("bad response shape: {e}")))?;

        Ok(Transcript {
            text: parsed.text.trim().to_string(),
            segments: parsed
                .segments
                .into_iter()
                .map(|s| TranscriptSegment {
                    start_seconds: s.start,
                    end_seconds: s.end,
                    text: s.text.trim().to_string(),
                })
                .collect(),
        })
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(
        &self,
        audio: &Path,
        language_hint: Option<&str>,
    ) -> Result<Transcript, DubbingError> {
        let mut last_error =
            DubbingError::fatal(Stage::Transcribing, "no speech detected in source audio");

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_secs(2 * attempt as u64)).await;
            }

            match self.call_provider(audio, language_hint).await {
                Ok(transcript) if !transcript.text.is_empty() => {
                    info!(
                        segments = transcript.segments.len(),
                        "Transcription succeeded"
                    );
                    return Ok(transcript);
                }
                Ok(_) => {
                    warn!("Transcription returned no speech, retrying");
                    last_error = DubbingError::fatal(
                        Stage::Transcribing,
                        "no speech detected in source audio",
                    );
                }
                Err(e @ DubbingError::Transient { .. }) => {
                    warn!("Transcription attempt failed: {}", e);
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error)
    }
}
