use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    DatabaseUrl,
    AmqpUrl,
    QueuePrefix,
    MinioUrl,
    MinioBucket,
    MinioPublicUrl,
    MinioAccessKey,
    MinioSecretKey,
    OpenAiApiKey,
    OpenAiApiBase,
    TtsVoiceMap,
    TtsFallbackEnabled,
    TtsFallbackApiBase,
    TtsFallbackApiKey,
    JobMaxAttempts,
    JobTimeoutSecs,
    JobConcurrency,
    JobRetryBaseSecs,
    JobRetentionHours,
    TimelineGapEpsilon,
    TimelineMinFiller,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::DatabaseUrl => "DATABASE_URL",
            EnvKey::AmqpUrl => "AMQP_URL",
            EnvKey::QueuePrefix => "QUEUE_PREFIX",
            EnvKey::MinioUrl => "MINIO_ENDPOINT",
            EnvKey::MinioBucket => "MINIO_BUCKET_MEDIA",
            EnvKey::MinioPublicUrl => "MINIO_PUBLIC_URL",
            EnvKey::MinioAccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::MinioSecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::OpenAiApiKey => "OPENAI_API_KEY",
            EnvKey::OpenAiApiBase => "OPENAI_API_BASE",
            EnvKey::TtsVoiceMap => "TTS_VOICE_MAP",
            EnvKey::TtsFallbackEnabled => "TTS_FALLBACK_ENABLED",
            EnvKey::TtsFallbackApiBase => "TTS_FALLBACK_API_BASE",
            EnvKey::TtsFallbackApiKey => "TTS_FALLBACK_API_KEY",
            EnvKey::JobMaxAttempts => "JOB_MAX_ATTEMPTS",
            EnvKey::JobTimeoutSecs => "JOB_TIMEOUT_SECS",
            EnvKey::JobConcurrency => "JOB_CONCURRENCY",
            EnvKey::JobRetryBaseSecs => "JOB_RETRY_BASE_SECS",
            EnvKey::JobRetentionHours => "JOB_RETENTION_HOURS",
            EnvKey::TimelineGapEpsilon => "TIMELINE_GAP_EPSILON",
            EnvKey::TimelineMinFiller => "TIMELINE_MIN_FILLER",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
