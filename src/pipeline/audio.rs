use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::modules::dubbing::error::{DubbingError, Stage};

/// Local ffmpeg/ffprobe invocations. All synthesized and filler clips share
/// one format (mono MP3 at SYNTH_SAMPLE_RATE) so concatenation can copy
/// frames without re-encoding.
pub const SYNTH_SAMPLE_RATE: u32 = 24_000;

async fn run_ffmpeg(args: &[&str], stage: Stage) -> Result<(), DubbingError> {
    debug!("ffmpeg {}", args.join(" "));
    let output = Command::new("ffmpeg")
        .args(args)
        .output()
        .await
        .map_err(|e| DubbingError::fatal(stage, format!("failed to spawn ffmpeg: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = stderr.lines().rev().take(3).collect::<Vec<_>>().join(" | ");
        return Err(DubbingError::fatal(
            stage,
            format!("ffmpeg exited with {}: {}", output.status, tail),
        ));
    }

    Ok(())
}

/// Mono 16 kHz PCM WAV, the shape transcription providers expect.
pub async fn extract_transcription_wav(video: &Path, out: &Path) -> Result<(), DubbingError> {
    run_ffmpeg(
        &[
            "-i",
            path_str(video)?,
            "-vn",
            "-ac",
            "1",
            "-ar",
            "16000",
            "-c:a",
            "pcm_s16le",
            "-y",
            path_str(out)?,
        ],
        Stage::Extracting,
    )
    .await
}

/// Servable MP3 of the source audio track, used by the `original` language
/// of the on-demand endpoint.
pub async fn extract_audio_track(video: &Path, out: &Path) -> Result<(), DubbingError> {
    run_ffmpeg(
        &[
            "-i",
            path_str(video)?,
            "-vn",
            "-c:a",
            "libmp3lame",
            "-q:a",
            "4",
            "-y",
            path_str(out)?,
        ],
        Stage::Extracting,
    )
    .await
}

/// Deterministic silence of the given duration, no external call involved.
pub async fn silence_clip(seconds: f64, out: &Path) -> Result<(), DubbingError> {
    let source = format!("anullsrc=r={SYNTH_SAMPLE_RATE}:cl=mono");
    let duration = format!("{seconds:.3}");
    run_ffmpeg(
        &[
            "-f",
            "lavfi",
            "-i",
            &source,
            "-t",
            &duration,
            "-c:a",
            "libmp3lame",
            "-q:a",
            "9",
            "-y",
            path_str(out)?,
        ],
        Stage::Assembling,
    )
    .await
}

/// Lossless concat in list order. Requires all clips to share codec/format,
/// which the fixed synthesis format guarantees.
pub async fn concat_clips(clips: &[std::path::PathBuf], out: &Path) -> Result<(), DubbingError> {
    if clips.is_empty() {
        return Err(DubbingError::fatal(Stage::Assembling, "no clips to concatenate"));
    }

    let list_path = out.with_extension("txt");
    let mut list = String::new();
    for clip in clips {
        list.push_str(&format!("file '{}'\n", path_str(clip)?));
    }
    tokio::fs::write(&list_path, list)
        .await
        .map_err(|e| DubbingError::fatal(Stage::Assembling, format!("failed to write concat list: {e}")))?;

    let result = run_ffmpeg(
        &[
            "-f",
            "concat",
            "-safe",
            "0",
            "-i",
            path_str(&list_path)?,
            "-c",
            "copy",
            "-y",
            path_str(out)?,
        ],
        Stage::Assembling,
    )
    .await;

    let _ = tokio::fs::remove_file(&list_path).await;
    result
}

pub async fn probe_duration(path: &Path) -> Result<f64, DubbingError> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
            path_str(path)?,
        ])
        .output()
        .await
        .map_err(|e| DubbingError::fatal(Stage::Assembling, format!("failed to spawn ffprobe: {e}")))?;

    if !output.status.success() {
        return Err(DubbingError::fatal(
            Stage::Assembling,
            format!("ffprobe exited with {}", output.status),
        ));
    }

    let raw = String::from_utf8_lossy(&output.stdout);
    raw.trim()
        .parse::<f64>()
        .map_err(|e| DubbingError::fatal(Stage::Assembling, format!("unparseable duration: {e}")))
}

fn path_str(path: &Path) -> Result<&str, DubbingError> {
    path.to_str().ok_or_else(|| {
        DubbingError::fatal(Stage::Preparing, format!("non-UTF8 path: {}", path.display()))
    })
}
