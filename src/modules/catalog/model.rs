use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lesson record owned by the course-catalog application. This service reads
/// `video_url` and writes the `transcript` cache field once.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Lesson {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub video_url: String,
    pub transcript: Option<String>,
}

/// One (lesson, language) cache slot. Once written, treated as immutable:
/// any later request for the pair short-circuits the pipeline.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct LessonArtifact {
    pub lesson_id: Uuid,
    pub language_code: String,
    pub audio_url: String,
    pub video_url: Option<String>,
}
