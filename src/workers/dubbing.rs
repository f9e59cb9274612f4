use std::collections::HashMap;
use std::time::Duration;

use futures_util::StreamExt;
use lapin::options::BasicAckOptions;
use rand::Rng;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::infrastructure::db::pool::DbPool;
use crate::modules::catalog::repository::LessonRepository;
use crate::modules::dubbing::error::DubbingError;
use crate::modules::dubbing::events::{DUBBING_QUEUE, DubJobMessage};
use crate::modules::dubbing::model::{DubbingResult, TargetLanguage};
use crate::modules::dubbing::repository::JobRepository;
use crate::pipeline::{DubbingPipeline, ProgressSender, ProgressUpdate, report};
use crate::state::AppState;

/// Runs the dubbing workers: recovers jobs orphaned by a previous crash, then
/// consumes the durable queue with the configured concurrency (dubbing is
/// resource-heavy, so the default is a single sequential consumer).
pub async fn run(state: AppState) {
    if let Err(e) = recover_stale_jobs(&state).await {
        error!("Stale-job recovery failed: {}", e);
    }

    let consumers = state.config.job_concurrency.max(1);
    let mut handles = Vec::with_capacity(consumers);
    for index in 0..consumers {
        handles.push(tokio::spawn(consume_loop(state.clone(), index)));
    }
    for handle in handles {
        let _ = handle.await;
    }
}

/// Jobs left `active` by a crash are reset to `queued` and republished with
/// their original language set. At-least-once delivery; the cache check makes
/// the replay cheap for languages that already finished.
async fn recover_stale_jobs(state: &AppState) -> anyhow::Result<()> {
    let stale = JobRepository::requeue_stale(&state.db).await?;
    for job in stale {
        warn!("♻️ Requeueing interrupted dub job {}", job.id);
        let message = DubJobMessage {
            job_id: job.id,
            course_id: job.course_id,
            lesson_id: job.lesson_id,
            languages: job.languages.0.clone(),
        };
        state
            .queue
            .publish(DUBBING_QUEUE, &serde_json::to_vec(&message)?)
            .await?;
    }
    Ok(())
}

async fn consume_loop(state: AppState, index: usize) {
    let tag = format!("dubbing_worker_{index}");
    let mut consumer = match state.queue.consumer(DUBBING_QUEUE, &tag).await {
        Ok(consumer) => consumer,
        Err(e) => {
            error!("Failed to start consumer {}: {}", tag, e);
            return;
        }
    };

    info!("🎧 Dubbing worker '{}' listening", tag);

    while let Some(delivery) = consumer.next().await {
        let Ok(delivery) = delivery else { continue };

        match serde_json::from_slice::<DubJobMessage>(&delivery.data) {
            Ok(message) => process_with_retries(&state, &message).await,
            Err(e) => error!("Failed to parse job message: {}", e),
        }

        // The terminal state is already persisted; ack regardless so a poison
        // message cannot loop forever.
        if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
            error!("Failed to ack message: {}", e);
        }
    }
}

/// Exponential backoff for the nth failed attempt (1-based): base, 2x, 4x...
/// capped at one hour.
pub(crate) fn backoff_delay(failed_attempt: u32, base_secs: u64) -> Duration {
    let factor = 1u64 << failed_attempt.saturating_sub(1).min(16);
    Duration::from_secs((base_secs.saturating_mul(factor)).min(3600))
}

#[derive(Debug)]
pub(crate) enum RetryDecision {
    Retry { delay: Duration },
    GiveUp,
}

/// What to do after a failed attempt. Retries only retryable errors, only
/// while attempts remain, and only when the backoff delay still fits inside
/// the job's remaining time budget.
pub(crate) fn retry_decision(
    error: &DubbingError,
    attempt: u32,
    max_attempts: u32,
    base_secs: u64,
    remaining: Duration,
) -> RetryDecision {
    if !error.is_retryable() || attempt >= max_attempts {
        return RetryDecision::GiveUp;
    }

    let delay = backoff_delay(attempt, base_secs);
    if delay >= remaining {
        return RetryDecision::GiveUp;
    }

    RetryDecision::Retry { delay }
}

async fn process_with_retries(state: &AppState, message: &DubJobMessage) {
    let job = match JobRepository::find(&state.db, message.job_id).await {
        Ok(Some(job)) => job,
        Ok(None) => {
            warn!("Dropping message for unknown job {}", message.job_id);
            return;
        }
        Err(e) => {
            error!("Failed to load job {}: {}", message.job_id, e);
            return;
        }
    };

    // Redelivered message for a finished job: at-least-once, nothing to do.
    if job.state().is_terminal() {
        info!("Job {} already {}, skipping", job.id, job.state.as_str());
        return;
    }

    let max_attempts = state.config.job_max_attempts.max(1);
    // One time budget for the whole job: attempts and backoff sleeps share it.
    let deadline =
        tokio::time::Instant::now() + Duration::from_secs(state.config.job_timeout_secs);

    loop {
        let attempt = match JobRepository::begin_attempt(&state.db, message.job_id).await {
            Ok(attempt) => attempt,
            Err(e) => {
                error!("Failed to begin attempt for job {}: {}", message.job_id, e);
                return;
            }
        };
        info!(
            "🎬 Processing dub job {} (attempt {}/{})",
            message.job_id, attempt, max_attempts
        );

        let (tx, rx) = async_channel::unbounded::<ProgressUpdate>();
        let persister = tokio::spawn(persist_progress(state.db.clone(), message.job_id, rx));

        let outcome =
            tokio::time::timeout_at(deadline, process_attempt(state, message, &tx)).await;
        drop(tx);
        let _ = persister.await;

        let outcome = match outcome {
            Ok(result) => result,
            Err(_) => Err(DubbingError::Timeout),
        };

        let error = match outcome {
            Ok(results) => {
                if let Err(e) = JobRepository::complete(&state.db, message.job_id, &results).await {
                    error!("Failed to persist completion of {}: {}", message.job_id, e);
                } else {
                    info!(
                        "✅ Dub job {} completed ({} languages)",
                        message.job_id,
                        results.len()
                    );
                }
                return;
            }
            Err(e) => e,
        };

        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match retry_decision(
            &error,
            attempt as u32,
            max_attempts,
            state.config.job_retry_base_secs,
            remaining,
        ) {
            RetryDecision::Retry { delay } => {
                let jitter = Duration::from_secs(
                    rand::rng().random_range(0..=state.config.job_retry_base_secs / 4 + 1),
                );
                warn!(
                    "Dub job {} attempt {} failed: {}. Retrying in {:?}",
                    message.job_id,
                    attempt,
                    error,
                    delay + jitter
                );
                tokio::time::sleep(delay + jitter).await;
            }
            RetryDecision::GiveUp => {
                let reason = error.public_message();
                if let Err(db_err) = JobRepository::fail(&state.db, message.job_id, &reason).await {
                    error!("Failed to persist failure of {}: {}", message.job_id, db_err);
                }
                error!("❌ Dub job {} failed: {}", message.job_id, reason);
                return;
            }
        }
    }
}

/// Persists milestone updates as they arrive; monotonicity is enforced by
/// the repository, so late or repeated writes cannot move progress backward.
async fn persist_progress(
    db: DbPool,
    job_id: Uuid,
    rx: async_channel::Receiver<ProgressUpdate>,
) {
    while let Ok(update) = rx.recv().await {
        if let Err(e) =
            JobRepository::update_progress(&db, job_id, update.percent, &update.message).await
        {
            warn!("Progress write failed for job {}: {}", job_id, e);
        }
    }
}

/// One full pipeline attempt. Any stage failure aborts the attempt, but a
/// language whose artifacts were already uploaded keeps its cache slot, so
/// a retry only redoes the unfinished languages.
async fn process_attempt(
    state: &AppState,
    message: &DubJobMessage,
    progress: &ProgressSender,
) -> Result<Vec<DubbingResult>, DubbingError> {
    let lesson = LessonRepository::find(&state.db, message.course_id, message.lesson_id)
        .await?
        .ok_or_else(|| {
            DubbingError::NotFound(format!("Lesson {} no longer exists", message.lesson_id))
        })?;

    report(progress, 2, "Preparing workspace");
    let workspace = tempfile::tempdir()
        .map_err(|e| DubbingError::Internal(anyhow::anyhow!("scratch dir: {}", e)))?;

    // Entry cache check: fully dubbed languages are never redone.
    let mut finished: HashMap<&'static str, DubbingResult> = HashMap::new();
    let mut pending: Vec<TargetLanguage> = Vec::new();
    for language in &message.languages {
        match LessonRepository::find_artifact(&state.db, lesson.id, language.code()).await? {
            Some(artifact) if artifact.video_url.is_some() => {
                finished.insert(
                    language.code(),
                    DubbingResult {
                        language_code: language.code().to_string(),
                        audio_url: artifact.audio_url,
                        video_url: artifact.video_url,
                    },
                );
            }
            _ => pending.push(*language),
        }
    }

    if pending.is_empty() {
        report(progress, 96, "All languages cached");
        return Ok(collect_results(&message.languages, finished));
    }

    let pipeline = &state.pipeline;

    let source = pipeline
        .fetch_source(workspace.path(), &lesson.video_url)
        .await?;
    report(progress, 8, "Source video downloaded");

    let wav = pipeline
        .extract_for_transcription(workspace.path(), &source)
        .await?;
    report(progress, 12, "Audio track extracted");

    let transcript = pipeline
        .transcribe(&wav, lesson.transcript.as_deref())
        .await?;
    LessonRepository::cache_transcript(&state.db, lesson.id, &transcript.text).await?;
    report(progress, 30, "Transcription complete");

    // Per-language fan-out, sequential: each language owns an even share of
    // the 30..92 progress band.
    let band = 62 / pending.len() as i32;
    for (index, language) in pending.iter().enumerate() {
        let base = 30 + band * index as i32;
        let name = language.english_name();

        report(progress, base + band / 4, format!("{name}: synthesizing speech"));
        let track = pipeline
            .dub_audio_track(workspace.path(), &transcript, *language)
            .await?;

        report(progress, base + band / 2, format!("{name}: merging video"));
        let video = pipeline
            .merge_video(workspace.path(), &source, &track, *language)
            .await?;

        report(progress, base + 3 * band / 4, format!("{name}: uploading"));
        let audio_key = DubbingPipeline::audio_key(lesson.id, language.code());
        let video_key = DubbingPipeline::video_key(lesson.id, language.code());
        let audio_url = pipeline.upload(&track, &audio_key, "audio/mpeg").await?;
        let video_url = pipeline.upload(&video, &video_key, "video/mp4").await?;

        // Persist the cache slot now so this language survives a later
        // language's failure.
        LessonRepository::upsert_artifact(
            &state.db,
            lesson.id,
            language.code(),
            &audio_url,
            Some(&video_url),
        )
        .await?;

        finished.insert(
            language.code(),
            DubbingResult {
                language_code: language.code().to_string(),
                audio_url,
                video_url: Some(video_url),
            },
        );
        report(progress, base + band, format!("{name}: done"));
    }

    report(progress, 96, "Finalizing");
    if let Err(e) = workspace.close() {
        warn!("Scratch cleanup failed: {}", e);
    }

    Ok(collect_results(&message.languages, finished))
}

fn collect_results(
    order: &[TargetLanguage],
    mut finished: HashMap<&'static str, DubbingResult>,
) -> Vec<DubbingResult> {
    order
        .iter()
        .filter_map(|language| finished.remove(language.code()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::dubbing::error::Stage;

    const PLENTY: Duration = Duration::from_secs(24 * 3600);

    #[test]
    fn backoff_doubles_from_the_base_delay() {
        assert_eq!(backoff_delay(1, 60), Duration::from_secs(60));
        assert_eq!(backoff_delay(2, 60), Duration::from_secs(120));
        assert_eq!(backoff_delay(3, 60), Duration::from_secs(240));
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(backoff_delay(30, 60), Duration::from_secs(3600));
        assert_eq!(backoff_delay(u32::MAX, 60), Duration::from_secs(3600));
    }

    #[test]
    fn a_persistently_transient_job_runs_exactly_max_attempts() {
        let error = DubbingError::transient(Stage::Downloading, "connection reset");

        let mut attempts = 0;
        loop {
            attempts += 1;
            match retry_decision(&error, attempts, 3, 60, PLENTY) {
                RetryDecision::Retry { .. } => continue,
                RetryDecision::GiveUp => break,
            }
        }

        assert_eq!(attempts, 3);
    }

    #[test]
    fn retry_delays_follow_the_backoff_schedule() {
        let error = DubbingError::fatal(Stage::Merging, "bad stream");

        for attempt in 1..3 {
            match retry_decision(&error, attempt, 3, 60, PLENTY) {
                RetryDecision::Retry { delay } => {
                    assert_eq!(delay, backoff_delay(attempt, 60));
                }
                RetryDecision::GiveUp => panic!("attempt {attempt} of 3 must retry"),
            }
        }
    }

    #[test]
    fn validation_missing_rows_and_timeouts_never_retry() {
        for error in [
            DubbingError::Validation("bad language".into()),
            DubbingError::NotFound("lesson gone".into()),
            DubbingError::Timeout,
        ] {
            assert!(matches!(
                retry_decision(&error, 1, 3, 60, PLENTY),
                RetryDecision::GiveUp
            ));
        }
    }

    #[test]
    fn a_retry_that_would_overrun_the_job_deadline_gives_up() {
        let error = DubbingError::transient(Stage::Uploading, "rate limited");

        // 60 s backoff against 30 s of budget left.
        assert!(matches!(
            retry_decision(&error, 1, 3, 60, Duration::from_secs(30)),
            RetryDecision::GiveUp
        ));
        assert!(matches!(
            retry_decision(&error, 1, 3, 60, Duration::from_secs(120)),
            RetryDecision::Retry { .. }
        ));
    }

    #[test]
    fn results_follow_the_requested_language_order() {
        let mut finished = HashMap::new();
        for code in ["mr", "hi"] {
            finished.insert(
                match code {
                    "mr" => TargetLanguage::Mr.code(),
                    _ => TargetLanguage::Hi.code(),
                },
                DubbingResult {
                    language_code: code.to_string(),
                    audio_url: format!("https://cdn/{code}.mp3"),
                    video_url: None,
                },
            );
        }

        let results = collect_results(&[TargetLanguage::Hi, TargetLanguage::Mr], finished);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].language_code, "hi");
        assert_eq!(results[1].language_code, "mr");
    }
}
