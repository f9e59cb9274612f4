use anyhow::{Result, anyhow};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use super::model::{DubJob, DubbingResult, JobState, TargetLanguage};

const JOB_COLUMNS: &str = "id, course_id, lesson_id, state, languages, attempts, \
                           progress_percent, last_message, result, failure_reason, \
                           requested_at, updated_at";

pub struct JobRepository;

impl JobRepository {
    pub async fn create(
        pool: &PgPool,
        course_id: Uuid,
        lesson_id: Uuid,
        languages: &[TargetLanguage],
    ) -> Result<DubJob> {
        let job = sqlx::query_as::<_, DubJob>(&format!(
            r#"
            INSERT INTO dub_jobs (course_id, lesson_id, languages)
            VALUES ($1, $2, $3)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(course_id)
        .bind(lesson_id)
        .bind(Json(languages))
        .fetch_one(pool)
        .await
        .map_err(|e| anyhow!("Failed to create job: {}", e))?;

        Ok(job)
    }

    pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<DubJob>> {
        let job = sqlx::query_as::<_, DubJob>(&format!(
            "SELECT {JOB_COLUMNS} FROM dub_jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| anyhow!("Failed to fetch job: {}", e))?;

        Ok(job)
    }

    /// Marks the job active and counts the attempt. Resets the progress
    /// message; the percentage stays monotonic across attempts.
    pub async fn begin_attempt(pool: &PgPool, id: Uuid) -> Result<i32> {
        let row: (i32,) = sqlx::query_as(
            r#"
            UPDATE dub_jobs
            SET state = $1, attempts = attempts + 1, last_message = 'Starting attempt',
                updated_at = NOW()
            WHERE id = $2
            RETURNING attempts
            "#,
        )
        .bind(JobState::Active.as_str())
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(|e| anyhow!("Failed to begin attempt: {}", e))?;

        Ok(row.0)
    }

    /// Progress only moves forward: a stale or repeated milestone write can
    /// never lower the stored percentage.
    pub async fn update_progress(pool: &PgPool, id: Uuid, percent: i32, message: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE dub_jobs
            SET progress_percent = GREATEST(progress_percent, $1),
                last_message = $2, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(percent.clamp(0, 100))
        .bind(message)
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| anyhow!("Failed to update progress: {}", e))?;

        Ok(())
    }

    pub async fn complete(pool: &PgPool, id: Uuid, results: &[DubbingResult]) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE dub_jobs
            SET state = $1, progress_percent = 100, last_message = 'Completed',
                result = $2, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(JobState::Completed.as_str())
        .bind(Json(results))
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| anyhow!("Failed to complete job: {}", e))?;

        Ok(())
    }

    pub async fn fail(pool: &PgPool, id: Uuid, reason: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE dub_jobs
            SET state = $1, failure_reason = $2, last_message = $2, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(JobState::Failed.as_str())
        .bind(reason)
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| anyhow!("Failed to mark job failed: {}", e))?;

        Ok(())
    }

    /// Jobs left `active` by a crashed worker are put back to `queued` so the
    /// startup path can republish them. Never leaves a job perpetually active.
    pub async fn requeue_stale(pool: &PgPool) -> Result<Vec<DubJob>> {
        let jobs = sqlx::query_as::<_, DubJob>(&format!(
            r#"
            UPDATE dub_jobs
            SET state = 'queued', last_message = 'Requeued after worker restart',
                updated_at = NOW()
            WHERE state = 'active'
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .fetch_all(pool)
        .await
        .map_err(|e| anyhow!("Failed to requeue stale jobs: {}", e))?;

        Ok(jobs)
    }

    /// Completed jobs are reaped after the retention window; failed jobs are
    /// kept for inspection.
    pub async fn reap_completed(pool: &PgPool, older_than_hours: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM dub_jobs
            WHERE state = 'completed'
              AND updated_at < NOW() - ($1 * INTERVAL '1 hour')
            "#,
        )
        .bind(older_than_hours)
        .execute(pool)
        .await
        .map_err(|e| anyhow!("Failed to reap jobs: {}", e))?;

        Ok(result.rows_affected())
    }
}
