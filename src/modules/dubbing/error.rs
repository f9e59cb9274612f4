use axum::http::StatusCode;
use thiserror::Error;

/// Pipeline stage labels used in progress messages and failure reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Preparing,
    Downloading,
    Extracting,
    Transcribing,
    Translating,
    Synthesizing,
    Assembling,
    Merging,
    Uploading,
    Finalizing,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Preparing => "Preparing",
            Stage::Downloading => "Downloading",
            Stage::Extracting => "Extracting audio",
            Stage::Transcribing => "Transcription",
            Stage::Translating => "Translation",
            Stage::Synthesizing => "Speech synthesis",
            Stage::Assembling => "Timeline assembly",
            Stage::Merging => "Media merge",
            Stage::Uploading => "Upload",
            Stage::Finalizing => "Finalizing",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum DubbingError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// Network / rate-limit class failures on an external call. The job-level
    /// retry may run the whole pipeline again.
    #[error("{stage} failed: {message}")]
    Transient { stage: Stage, message: String },

    /// Unrecoverable within this attempt (corrupt source, provider rejected
    /// the input). Still counts against job-level attempts.
    #[error("{stage} failed: {message}")]
    Fatal { stage: Stage, message: String },

    #[error("job exceeded its time budget")]
    Timeout,

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl DubbingError {
    pub fn transient(stage: Stage, message: impl Into<String>) -> Self {
        Self::Transient { stage, message: message.into() }
    }

    pub fn fatal(stage: Stage, message: impl Into<String>) -> Self {
        Self::Fatal { stage, message: message.into() }
    }

    /// True when a further full-pipeline attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DubbingError::Transient { .. } | DubbingError::Fatal { .. } | DubbingError::Internal(_)
        )
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            DubbingError::Validation(_) => StatusCode::BAD_REQUEST,
            DubbingError::NotFound(_) => StatusCode::NOT_FOUND,
            DubbingError::Transient { .. } | DubbingError::Fatal { .. } => StatusCode::BAD_GATEWAY,
            DubbingError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            DubbingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to expose to API callers: no credentials, no backtraces.
    pub fn public_message(&self) -> String {
        match self {
            DubbingError::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_taxonomy() {
        assert_eq!(
            DubbingError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DubbingError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            DubbingError::transient(Stage::Transcribing, "rate limited").status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(DubbingError::Timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn validation_and_timeout_are_not_retryable() {
        assert!(!DubbingError::Validation("x".into()).is_retryable());
        assert!(!DubbingError::NotFound("x".into()).is_retryable());
        assert!(!DubbingError::Timeout.is_retryable());
        assert!(DubbingError::transient(Stage::Downloading, "reset").is_retryable());
        assert!(DubbingError::fatal(Stage::Merging, "bad stream").is_retryable());
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let err = DubbingError::Internal(anyhow::anyhow!("password=hunter2"));
        assert_eq!(err.public_message(), "internal error");
    }
}
