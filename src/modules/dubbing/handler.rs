use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use super::dto::{
    EnqueueDubJobRequest, EnqueueDubJobResponse, JobStatusResponse, OnDemandAudioRequest,
    OnDemandAudioResponse,
};
use super::service::DubbingService;
use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::state::AppState;

/// Enqueue a dubbing job for a lesson
#[utoipa::path(
    post,
    path = "/api/v1/dubbing/jobs",
    request_body = EnqueueDubJobRequest,
    responses(
        (status = 202, description = "Job accepted", body = ApiResponse<EnqueueDubJobResponse>),
        (status = 400, description = "Missing ids or unsupported language"),
        (status = 404, description = "Course or lesson not found")
    ),
    tag = "Dubbing"
)]
pub async fn enqueue_job(
    State(state): State<AppState>,
    Json(payload): Json<EnqueueDubJobRequest>,
) -> impl IntoResponse {
    match DubbingService::enqueue(state, payload).await {
        Ok(job) => ApiSuccess(
            ApiResponse::success(job, "Dubbing job accepted"),
            StatusCode::ACCEPTED,
        )
        .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Poll a dubbing job's state and progress
#[utoipa::path(
    get,
    path = "/api/v1/dubbing/jobs/{id}",
    params(
        ("id" = Uuid, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Job status", body = ApiResponse<JobStatusResponse>),
        (status = 404, description = "Job not found")
    ),
    tag = "Dubbing"
)]
pub async fn job_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match DubbingService::status(state, id).await {
        Ok(status) => ApiSuccess(
            ApiResponse::success(status, "Job status retrieved"),
            StatusCode::OK,
        )
        .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Fetch (or generate) a lesson's audio track in one language
#[utoipa::path(
    post,
    path = "/api/v1/dubbing/audio",
    request_body = OnDemandAudioRequest,
    responses(
        (status = 200, description = "Audio URL, cached or freshly generated", body = ApiResponse<OnDemandAudioResponse>),
        (status = 400, description = "Unsupported language code"),
        (status = 404, description = "Course or lesson not found"),
        (status = 502, description = "A provider or media stage failed")
    ),
    tag = "Dubbing"
)]
pub async fn fetch_audio(
    State(state): State<AppState>,
    Json(payload): Json<OnDemandAudioRequest>,
) -> impl IntoResponse {
    match DubbingService::fetch_audio(state, payload).await {
        Ok(audio) => ApiSuccess(
            ApiResponse::success(audio, "Audio track ready"),
            StatusCode::OK,
        )
        .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}
