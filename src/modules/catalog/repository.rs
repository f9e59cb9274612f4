use anyhow::{Result, anyhow};
use sqlx::PgPool;
use uuid::Uuid;

use super::model::{Lesson, LessonArtifact};

pub struct LessonRepository;

impl LessonRepository {
    pub async fn find(pool: &PgPool, course_id: Uuid, lesson_id: Uuid) -> Result<Option<Lesson>> {
        let lesson = sqlx::query_as::<_, Lesson>(
            r#"
            SELECT id, course_id, title, video_url, transcript
            FROM lessons
            WHERE id = $1 AND course_id = $2
            "#,
        )
        .bind(lesson_id)
        .bind(course_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| anyhow!("Failed to fetch lesson: {}", e))?;

        Ok(lesson)
    }

    /// Writes the transcript cache field only if it has never been set.
    pub async fn cache_transcript(pool: &PgPool, lesson_id: Uuid, transcript: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE lessons
            SET transcript = $1, updated_at = NOW()
            WHERE id = $2 AND transcript IS NULL
            "#,
        )
        .bind(transcript)
        .bind(lesson_id)
        .execute(pool)
        .await
        .map_err(|e| anyhow!("Failed to cache transcript: {}", e))?;

        Ok(())
    }

    pub async fn find_artifact(
        pool: &PgPool,
        lesson_id: Uuid,
        language_code: &str,
    ) -> Result<Option<LessonArtifact>> {
        let artifact = sqlx::query_as::<_, LessonArtifact>(
            r#"
            SELECT lesson_id, language_code, audio_url, video_url
            FROM lesson_artifacts
            WHERE lesson_id = $1 AND language_code = $2
            "#,
        )
        .bind(lesson_id)
        .bind(language_code)
        .fetch_optional(pool)
        .await
        .map_err(|e| anyhow!("Failed to fetch artifact: {}", e))?;

        Ok(artifact)
    }

    /// Last-write-wins upsert of a cache slot. A NULL incoming video_url does
    /// not clobber one written by a previous full-dub run.
    pub async fn upsert_artifact(
        pool: &PgPool,
        lesson_id: Uuid,
        language_code: &str,
        audio_url: &str,
        video_url: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO lesson_artifacts (lesson_id, language_code, audio_url, video_url)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (lesson_id, language_code) DO UPDATE
            SET audio_url = EXCLUDED.audio_url,
                video_url = COALESCE(EXCLUDED.video_url, lesson_artifacts.video_url)
            "#,
        )
        .bind(lesson_id)
        .bind(language_code)
        .bind(audio_url)
        .bind(video_url)
        .execute(pool)
        .await
        .map_err(|e| anyhow!("Failed to upsert artifact: {}", e))?;

        Ok(())
    }
}
