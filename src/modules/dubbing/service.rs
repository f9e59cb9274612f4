use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::dto::{
    EnqueueDubJobRequest, EnqueueDubJobResponse, JobStatusResponse, OnDemandAudioRequest,
    OnDemandAudioResponse,
};
use super::error::DubbingError;
use super::events::{DUBBING_QUEUE, DubJobMessage};
use super::model::{RequestedLanguage, TargetLanguage};
use super::repository::JobRepository;
use crate::modules::catalog::model::Lesson;
use crate::modules::catalog::repository::LessonRepository;
use crate::pipeline::DubbingPipeline;
use crate::state::AppState;

pub struct DubbingService;

impl DubbingService {
    /// Validates the request, creates the job row and publishes it to the
    /// durable queue. The worker owns the job from here on.
    pub async fn enqueue(
        state: AppState,
        req: EnqueueDubJobRequest,
    ) -> Result<EnqueueDubJobResponse, DubbingError> {
        req.validate()
            .map_err(|e| DubbingError::Validation(e.to_string()))?;

        if req.course_id.is_nil() || req.lesson_id.is_nil() {
            return Err(DubbingError::Validation(
                "course_id and lesson_id are required".to_string(),
            ));
        }

        let mut languages = match &req.languages {
            None => TargetLanguage::all().to_vec(),
            Some(codes) if codes.is_empty() => TargetLanguage::all().to_vec(),
            Some(codes) => codes
                .iter()
                .map(|code| TargetLanguage::from_code(code))
                .collect::<Result<Vec<_>, _>>()?,
        };
        let mut seen = std::collections::HashSet::new();
        languages.retain(|language| seen.insert(*language));

        let lesson = Self::require_lesson(&state, req.course_id, req.lesson_id).await?;

        let job =
            JobRepository::create(&state.db, req.course_id, req.lesson_id, &languages).await?;

        let message = DubJobMessage {
            job_id: job.id,
            course_id: req.course_id,
            lesson_id: req.lesson_id,
            languages,
        };
        let payload = serde_json::to_vec(&message)
            .map_err(|e| DubbingError::Internal(anyhow::anyhow!("serialize job: {}", e)))?;
        state.queue.publish(DUBBING_QUEUE, &payload).await?;

        info!("📥 Enqueued dub job {} for lesson '{}'", job.id, lesson.title);

        Ok(EnqueueDubJobResponse { job_id: job.id })
    }

    pub async fn status(state: AppState, job_id: Uuid) -> Result<JobStatusResponse, DubbingError> {
        let job = JobRepository::find(&state.db, job_id)
            .await?
            .ok_or_else(|| DubbingError::NotFound(format!("Job {job_id} not found")))?;

        Ok(job.into())
    }

    /// Synchronous single-language path: cache-check, then run the pipeline
    /// for exactly this language and write the cache slot back.
    pub async fn fetch_audio(
        state: AppState,
        req: OnDemandAudioRequest,
    ) -> Result<OnDemandAudioResponse, DubbingError> {
        req.validate()
            .map_err(|e| DubbingError::Validation(e.to_string()))?;

        let language = RequestedLanguage::parse(&req.language)?;
        let lesson = Self::require_lesson(&state, req.course_id, req.lesson_id).await?;

        if let Some(artifact) =
            LessonRepository::find_artifact(&state.db, lesson.id, language.code()).await?
        {
            return Ok(OnDemandAudioResponse {
                url: artifact.audio_url,
                cached: true,
            });
        }

        let workspace = tempfile::tempdir()
            .map_err(|e| DubbingError::Internal(anyhow::anyhow!("scratch dir: {}", e)))?;
        let pipeline = &state.pipeline;

        let source = pipeline
            .fetch_source(workspace.path(), &lesson.video_url)
            .await?;

        let track = match language {
            RequestedLanguage::Original => {
                pipeline
                    .extract_original_audio(workspace.path(), &source)
                    .await?
            }
            RequestedLanguage::Target(target) => {
                let wav = pipeline
                    .extract_for_transcription(workspace.path(), &source)
                    .await?;
                let transcript = pipeline
                    .transcribe(&wav, lesson.transcript.as_deref())
                    .await?;
                LessonRepository::cache_transcript(&state.db, lesson.id, &transcript.text).await?;

                pipeline
                    .dub_audio_track(workspace.path(), &transcript, target)
                    .await?
            }
        };

        let key = DubbingPipeline::audio_key(lesson.id, language.code());
        let url = pipeline.upload(&track, &key, "audio/mpeg").await?;

        LessonRepository::upsert_artifact(&state.db, lesson.id, language.code(), &url, None)
            .await?;

        info!(
            "🎙️ On-demand audio ready for lesson {} ({})",
            lesson.id,
            language.code()
        );

        Ok(OnDemandAudioResponse { url, cached: false })
    }

    async fn require_lesson(
        state: &AppState,
        course_id: Uuid,
        lesson_id: Uuid,
    ) -> Result<Lesson, DubbingError> {
        LessonRepository::find(&state.db, course_id, lesson_id)
            .await?
            .ok_or_else(|| {
                DubbingError::NotFound(format!(
                    "Lesson {lesson_id} not found in course {course_id}"
                ))
            })
    }
}
