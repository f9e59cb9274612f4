use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;
use uuid::Uuid;

use crate::config::settings::AppConfig;
use crate::infrastructure::storage::s3::StorageService;
use crate::modules::dubbing::error::DubbingError;
use crate::modules::dubbing::model::TargetLanguage;

pub mod audio;
pub mod merge;
pub mod synthesize;
pub mod timeline;
pub mod transcribe;
pub mod transfer;
pub mod translate;

use synthesize::{OpenAiSpeech, SpeechProvider, SpeechService, Synthesizer};
use timeline::TimelineAssembler;
use transcribe::{Transcriber, Transcript, WhisperTranscriber};
use translate::{ChatTranslator, Translator};

/// Milestone progress update emitted by the orchestration layer. How the
/// value is stored and exposed is the job queue's concern.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub percent: i32,
    pub message: String,
}

pub type ProgressSender = async_channel::Sender<ProgressUpdate>;

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(300);

/// Client for short provider calls (translation, speech synthesis): a total
/// request timeout keeps a hung provider from stalling an attempt.
pub(crate) fn provider_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// Client for media transfers (source download, transcription upload). Only
/// the connect phase is bounded: a long lesson's transfer may legitimately
/// run far past any fixed request timeout, and the job-level deadline already
/// caps the whole attempt.
pub(crate) fn media_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_default()
}

/// Fire-and-forget: a closed receiver must never fail the pipeline.
pub fn report(sender: &ProgressSender, percent: i32, message: impl Into<String>) {
    let _ = sender.try_send(ProgressUpdate {
        percent,
        message: message.into(),
    });
}

/// All pipeline collaborators, constructed once at startup and passed by
/// reference into the worker and the on-demand path. Providers sit behind
/// traits so tests can substitute doubles.
pub struct DubbingPipeline {
    http: reqwest::Client,
    storage: StorageService,
    transcriber: Arc<dyn Transcriber>,
    translator: Arc<dyn Translator>,
    synthesizer: Arc<dyn Synthesizer>,
    gap_epsilon: f64,
    min_filler: f64,
}

impl DubbingPipeline {
    pub fn from_config(config: &AppConfig, storage: StorageService) -> Self {
        let http = media_client();
        let provider_http = provider_client(PROVIDER_TIMEOUT);

        // The transcription upload carries the whole lesson's audio, so it
        // goes over the media client like the download does.
        let transcriber = WhisperTranscriber::new(
            http.clone(),
            &config.openai_api_base,
            &config.openai_api_key,
        );
        let translator = ChatTranslator::new(
            provider_http.clone(),
            &config.openai_api_base,
            &config.openai_api_key,
        );

        let mut providers: Vec<Box<dyn SpeechProvider>> = vec![Box::new(OpenAiSpeech::new(
            provider_http.clone(),
            &config.openai_api_base,
            &config.openai_api_key,
            "primary",
        ))];
        if config.tts_fallback_enabled && !config.tts_fallback_api_base.is_empty() {
            providers.push(Box::new(OpenAiSpeech::new(
                provider_http,
                &config.tts_fallback_api_base,
                &config.tts_fallback_api_key,
                "fallback",
            )));
        }
        let synthesizer = SpeechService::new(providers, config.voice_overrides.clone());

        Self {
            http,
            storage,
            transcriber: Arc::new(transcriber),
            translator: Arc::new(translator),
            synthesizer: Arc::new(synthesizer),
            gap_epsilon: config.timeline_gap_epsilon,
            min_filler: config.timeline_min_filler,
        }
    }

    /// Downloads the source video into the job's scratch workspace.
    pub async fn fetch_source(&self, workspace: &Path, url: &str) -> Result<PathBuf, DubbingError> {
        let dest = workspace.join("source.mp4");
        transfer::download_video(&self.http, url, &dest).await?;
        Ok(dest)
    }

    /// Mono 16 kHz track for the transcription provider.
    pub async fn extract_for_transcription(
        &self,
        workspace: &Path,
        video: &Path,
    ) -> Result<PathBuf, DubbingError> {
        let wav = workspace.join("speech.wav");
        audio::extract_transcription_wav(video, &wav).await?;
        Ok(wav)
    }

    /// Servable untranslated audio track (the `original` language).
    pub async fn extract_original_audio(
        &self,
        workspace: &Path,
        video: &Path,
    ) -> Result<PathBuf, DubbingError> {
        let mp3 = workspace.join("original.mp3");
        audio::extract_audio_track(video, &mp3).await?;
        Ok(mp3)
    }

    /// Transcribes the extracted audio. When the provider gives up and a
    /// previously cached transcript exists, falls back to it as flat text
    /// (the no-timing path of the assembler).
    pub async fn transcribe(
        &self,
        wav: &Path,
        cached_transcript: Option<&str>,
    ) -> Result<Transcript, DubbingError> {
        match self.transcriber.transcribe(wav, None).await {
            Ok(transcript) => Ok(transcript),
            Err(e) => match cached_transcript {
                Some(text) if !text.trim().is_empty() => {
                    warn!("Transcription failed ({}), using cached transcript", e);
                    Ok(Transcript {
                        text: text.trim().to_string(),
                        segments: vec![],
                    })
                }
                _ => Err(e),
            },
        }
    }

    /// Translates, synthesizes and concatenates one language's audio track.
    pub async fn dub_audio_track(
        &self,
        workspace: &Path,
        transcript: &Transcript,
        language: TargetLanguage,
    ) -> Result<PathBuf, DubbingError> {
        let assembler = TimelineAssembler {
            translator: self.translator.as_ref(),
            synthesizer: self.synthesizer.as_ref(),
            gap_epsilon: self.gap_epsilon,
            min_filler: self.min_filler,
        };

        let clips = assembler.assemble(transcript, language, workspace).await?;
        let track = workspace.join(format!("dubbed_{}.mp3", language.code()));
        audio::concat_clips(&clips, &track).await?;

        // Translated speech longer than its segment accumulates drift; this
        // is accepted, but large drift is worth a trace.
        if let Some(last) = transcript.segments.last() {
            if let Ok(duration) = audio::probe_duration(&track).await {
                let drift = duration - last.end_seconds;
                if drift > 1.0 {
                    warn!(
                        "Dubbed track for {} runs {:.1}s past the source timeline",
                        language.code(),
                        drift
                    );
                }
            }
        }

        Ok(track)
    }

    /// Replaces the source's audio with the dubbed track, video stream copied.
    pub async fn merge_video(
        &self,
        workspace: &Path,
        video: &Path,
        dubbed_audio: &Path,
        language: TargetLanguage,
    ) -> Result<PathBuf, DubbingError> {
        let out = workspace.join(format!("dubbed_{}.mp4", language.code()));
        merge::merge_dubbed_video(video, dubbed_audio, &out).await?;
        Ok(out)
    }

    pub async fn upload(
        &self,
        local: &Path,
        key: &str,
        content_type: &str,
    ) -> Result<String, DubbingError> {
        transfer::upload_artifact(&self.storage, local, key, content_type).await
    }

    pub fn audio_key(lesson_id: Uuid, language_code: &str) -> String {
        format!("dubs/{lesson_id}/{language_code}/audio.mp3")
    }

    pub fn video_key(lesson_id: Uuid, language_code: &str) -> String {
        format!("dubs/{lesson_id}/{language_code}/video.mp4")
    }
}
