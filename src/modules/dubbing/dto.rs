use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::model::{DubJob, DubbingResult, JobState};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EnqueueDubJobRequest {
    pub course_id: Uuid,
    pub lesson_id: Uuid,
    /// Target language codes; defaults to every supported target.
    #[validate(length(max = 8))]
    pub languages: Option<Vec<String>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EnqueueDubJobResponse {
    pub job_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub state: JobState,
    pub progress_percent: i32,
    pub last_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<DubbingResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl From<DubJob> for JobStatusResponse {
    fn from(job: DubJob) -> Self {
        let state = job.state();
        Self {
            job_id: job.id,
            state,
            progress_percent: job.progress_percent,
            last_message: job.last_message,
            result: job.result.map(|r| r.0),
            failure_reason: job.failure_reason,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct OnDemandAudioRequest {
    pub course_id: Uuid,
    pub lesson_id: Uuid,
    /// `original` or one of the supported target codes.
    #[validate(length(min = 1, max = 16))]
    pub language: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OnDemandAudioResponse {
    pub url: String,
    pub cached: bool,
}
