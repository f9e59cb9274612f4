use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::modules::dubbing::error::{DubbingError, Stage};

/// Muxes the assembled audio track over the original visual stream. Video is
/// stream-copied; the output ends at the shorter of the two inputs.
pub async fn merge_dubbed_video(
    video: &Path,
    audio: &Path,
    out: &Path,
) -> Result<(), DubbingError> {
    let video = as_str(video)?;
    let audio = as_str(audio)?;
    let out = as_str(out)?;

    let args = [
        "-i", video,
        "-i", audio,
        "-map", "0:v",
        "-map", "1:a",
        "-c:v", "copy",
        "-c:a", "aac",
        "-shortest",
        "-y", out,
    ];

    debug!("ffmpeg {}", args.join(" "));
    let output = Command::new("ffmpeg")
        .args(args)
        .output()
        .await
        .map_err(|e| DubbingError::fatal(Stage::Merging, format!("failed to spawn ffmpeg: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = stderr.lines().rev().take(3).collect::<Vec<_>>().join(" | ");
        return Err(DubbingError::fatal(
            Stage::Merging,
            format!("ffmpeg exited with {}: {}", output.status, tail),
        ));
    }

    Ok(())
}

fn as_str(path: &Path) -> Result<&str, DubbingError> {
    path.to_str().ok_or_else(|| {
        DubbingError::fatal(Stage::Merging, format!("non-UTF8 path: {}", path.display()))
    })
}
