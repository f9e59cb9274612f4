use std::path::Path;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::infrastructure::storage::s3::StorageService;
use crate::modules::dubbing::error::{DubbingError, Stage};

/// Streams a remote source video to local scratch storage.
pub async fn download_video(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> Result<(), DubbingError> {
    info!("⬇️ Downloading source video from {}", url);

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| DubbingError::transient(Stage::Downloading, e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(DubbingError::fatal(
            Stage::Downloading,
            format!("source returned {status}"),
        ));
    }

    let mut file = tokio::fs::File::create(dest).await.map_err(|e| {
        DubbingError::fatal(Stage::Downloading, format!("failed to create scratch file: {e}"))
    })?;

    let mut stream = response.bytes_stream();
    let mut total: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| DubbingError::transient(Stage::Downloading, e.to_string()))?;
        total += chunk.len() as u64;
        file.write_all(&chunk).await.map_err(|e| {
            DubbingError::fatal(Stage::Downloading, format!("failed to write scratch file: {e}"))
        })?;
    }
    file.flush().await.map_err(|e| {
        DubbingError::fatal(Stage::Downloading, format!("failed to flush scratch file: {e}"))
    })?;

    if total == 0 {
        return Err(DubbingError::fatal(Stage::Downloading, "source video is empty"));
    }

    info!("⬇️ Downloaded {} bytes", total);
    Ok(())
}

/// Uploads a finished local artifact to durable storage, returning its
/// canonical URL.
pub async fn upload_artifact(
    storage: &StorageService,
    local: &Path,
    key: &str,
    content_type: &str,
) -> Result<String, DubbingError> {
    let body = tokio::fs::read(local).await.map_err(|e| {
        DubbingError::fatal(Stage::Uploading, format!("failed to read artifact: {e}"))
    })?;

    let url = storage
        .put_object(key, body, content_type)
        .await
        .map_err(|e| DubbingError::transient(Stage::Uploading, e.to_string()))?;

    info!("⬆️ Uploaded {} -> {}", local.display(), url);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    use crate::pipeline::{media_client, provider_client};

    /// Serves one HTTP response whose body arrives only after `body_delay`.
    async fn serve_once(body: &'static [u8], body_delay: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;

            let header = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(header.as_bytes()).await.unwrap();
            tokio::time::sleep(body_delay).await;
            socket.write_all(body).await.unwrap();
        });

        format!("http://{addr}/lesson.mp4")
    }

    #[tokio::test]
    async fn transfer_client_tolerates_a_slow_response_body() {
        let url = serve_once(b"mp4 bytes", Duration::from_millis(300)).await;
        let workspace = tempfile::tempdir().unwrap();
        let dest = workspace.path().join("source.mp4");

        download_video(&media_client(), &url, &dest).await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"mp4 bytes");
    }

    #[tokio::test]
    async fn a_total_request_timeout_would_abort_the_same_transfer() {
        let url = serve_once(b"mp4 bytes", Duration::from_millis(300)).await;
        let workspace = tempfile::tempdir().unwrap();
        let dest = workspace.path().join("source.mp4");

        let strict = provider_client(Duration::from_millis(50));
        let err = download_video(&strict, &url, &dest).await.unwrap_err();

        assert!(matches!(err, DubbingError::Transient { .. }));
    }

    #[tokio::test]
    async fn an_empty_source_video_is_rejected() {
        let url = serve_once(b"", Duration::ZERO).await;
        let workspace = tempfile::tempdir().unwrap();
        let dest = workspace.path().join("source.mp4");

        let err = download_video(&media_client(), &url, &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, DubbingError::Fatal { .. }));
    }
}
