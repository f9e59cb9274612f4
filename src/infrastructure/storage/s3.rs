use aws_sdk_s3::config::Builder;
use aws_sdk_s3::{Client, config::BehaviorVersion, config::Credentials, config::Region};
use tracing::info;

/// S3/MinIO-backed durable storage for generated media artifacts.
#[derive(Clone)]
pub struct StorageService {
    client: Client,
    bucket: String,
    public_base: String,
}

impl StorageService {
    pub async fn new(
        endpoint: &str,
        bucket: &str,
        public_base: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");

        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .force_path_style(true) // Required for MinIO
            .build();

        let client = Client::from_conf(config);

        info!("✅ Connected to S3 (MinIO)");

        // CDN base when configured, otherwise the raw endpoint.
        let public_base = if public_base.is_empty() {
            endpoint.trim_end_matches('/').to_string()
        } else {
            public_base.trim_end_matches('/').to_string()
        };

        Self {
            client,
            bucket: bucket.to_string(),
            public_base,
        }
    }

    /// Stores `body` under `key` and returns the canonical public URL.
    pub async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<String, aws_sdk_s3::Error> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(aws_sdk_s3::primitives::ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await?;

        Ok(self.public_url(key))
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.public_base, self.bucket, key)
    }
}
