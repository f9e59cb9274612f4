use utoipa::OpenApi;

use crate::common::response::ApiResponse;
use crate::modules::dubbing::dto::*;
use crate::modules::dubbing::model::{DubbingResult, JobState, TargetLanguage};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::dubbing::handler::enqueue_job,
        crate::modules::dubbing::handler::job_status,
        crate::modules::dubbing::handler::fetch_audio,
    ),
    components(
        schemas(
            EnqueueDubJobRequest, EnqueueDubJobResponse,
            JobStatusResponse, OnDemandAudioRequest, OnDemandAudioResponse,
            DubbingResult, JobState, TargetLanguage,
            ApiResponse<EnqueueDubJobResponse>,
        )
    ),
    tags(
        (name = "Dubbing", description = "Lesson dubbing pipeline: enqueue, poll, on-demand audio")
    )
)]
pub struct ApiDoc;
