use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

use super::error::DubbingError;

/// Dubbing targets form a closed set; anything else is rejected before any
/// pipeline work happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TargetLanguage {
    Hi,
    Mr,
    Bn,
    Ta,
    Es,
}

impl TargetLanguage {
    pub fn all() -> &'static [TargetLanguage] {
        &[
            TargetLanguage::Hi,
            TargetLanguage::Mr,
            TargetLanguage::Bn,
            TargetLanguage::Ta,
            TargetLanguage::Es,
        ]
    }

    pub fn code(&self) -> &'static str {
        match self {
            TargetLanguage::Hi => "hi",
            TargetLanguage::Mr => "mr",
            TargetLanguage::Bn => "bn",
            TargetLanguage::Ta => "ta",
            TargetLanguage::Es => "es",
        }
    }

    /// Name used in translation prompts.
    pub fn english_name(&self) -> &'static str {
        match self {
            TargetLanguage::Hi => "Hindi",
            TargetLanguage::Mr => "Marathi",
            TargetLanguage::Bn => "Bengali",
            TargetLanguage::Ta => "Tamil",
            TargetLanguage::Es => "Spanish",
        }
    }

    pub fn default_voice(&self) -> &'static str {
        match self {
            TargetLanguage::Hi => "onyx",
            TargetLanguage::Mr => "alloy",
            TargetLanguage::Bn => "alloy",
            TargetLanguage::Ta => "shimmer",
            TargetLanguage::Es => "nova",
        }
    }

    pub fn from_code(code: &str) -> Result<Self, DubbingError> {
        Self::all()
            .iter()
            .copied()
            .find(|lang| lang.code() == code)
            .ok_or_else(|| DubbingError::Validation(format!("Unsupported language code: {code}")))
    }
}

/// Language selector for the on-demand audio endpoint: the fixed dubbing
/// targets plus `original` (the untranslated audio track).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestedLanguage {
    Original,
    Target(TargetLanguage),
}

impl RequestedLanguage {
    pub fn parse(code: &str) -> Result<Self, DubbingError> {
        if code == "original" {
            return Ok(RequestedLanguage::Original);
        }
        TargetLanguage::from_code(code).map(RequestedLanguage::Target)
    }

    pub fn code(&self) -> &'static str {
        match self {
            RequestedLanguage::Original => "original",
            RequestedLanguage::Target(lang) => lang.code(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Active,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Active => "active",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> JobState {
        match raw {
            "active" => JobState::Active,
            "completed" => JobState::Completed,
            "failed" => JobState::Failed,
            _ => JobState::Queued,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// One dubbed language's output, immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DubbingResult {
    pub language_code: String,
    pub audio_url: String,
    pub video_url: Option<String>,
}

#[derive(Debug, FromRow, Clone)]
pub struct DubJob {
    pub id: Uuid,
    pub course_id: Uuid,
    pub lesson_id: Uuid,
    pub state: String,
    pub languages: Json<Vec<TargetLanguage>>,
    pub attempts: i32,
    pub progress_percent: i32,
    pub last_message: String,
    pub result: Option<Json<Vec<DubbingResult>>>,
    pub failure_reason: Option<String>,
    pub requested_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl DubJob {
    pub fn state(&self) -> JobState {
        JobState::parse(&self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_parse_and_unknown_codes_are_rejected() {
        assert_eq!(TargetLanguage::from_code("mr").unwrap(), TargetLanguage::Mr);
        assert_eq!(
            RequestedLanguage::parse("original").unwrap(),
            RequestedLanguage::Original
        );
        assert!(matches!(
            TargetLanguage::from_code("de"),
            Err(DubbingError::Validation(_))
        ));
        assert!(matches!(
            RequestedLanguage::parse("klingon"),
            Err(DubbingError::Validation(_))
        ));
    }

    #[test]
    fn every_target_has_a_voice_and_a_prompt_name() {
        for lang in TargetLanguage::all() {
            assert!(!lang.default_voice().is_empty());
            assert!(!lang.english_name().is_empty());
            assert_eq!(TargetLanguage::from_code(lang.code()).unwrap(), *lang);
        }
    }

    #[test]
    fn job_states_round_trip_and_classify_terminals() {
        for state in [
            JobState::Queued,
            JobState::Active,
            JobState::Completed,
            JobState::Failed,
        ] {
            assert_eq!(JobState::parse(state.as_str()), state);
        }
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Active.is_terminal());
    }
}
