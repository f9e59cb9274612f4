use std::collections::HashMap;

use serde::Deserialize;

use crate::config::env::{self, EnvKey};

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub database_url: String,
    pub amqp_url: String,
    pub queue_prefix: String,
    pub minio_url: String,
    pub minio_bucket: String,
    pub minio_public_url: String,
    pub minio_access_key: String,
    pub minio_secret_key: String,
    pub openai_api_key: String,
    pub openai_api_base: String,
    /// Per-language voice overrides, e.g. "hi=onyx,mr=alloy".
    pub voice_overrides: HashMap<String, String>,
    pub tts_fallback_enabled: bool,
    pub tts_fallback_api_base: String,
    pub tts_fallback_api_key: String,
    pub job_max_attempts: u32,
    pub job_timeout_secs: u64,
    pub job_concurrency: usize,
    pub job_retry_base_secs: u64,
    pub job_retention_hours: i64,
    pub timeline_gap_epsilon: f64,
    pub timeline_min_filler: f64,
}

impl AppConfig {
    pub fn new() -> Result<Self, std::env::VarError> {
        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            database_url: env::get(EnvKey::DatabaseUrl)?,
            amqp_url: env::get(EnvKey::AmqpUrl)?,
            queue_prefix: env::get_or(EnvKey::QueuePrefix, "dubbing"),
            minio_url: env::get(EnvKey::MinioUrl)?,
            minio_bucket: env::get(EnvKey::MinioBucket)?,
            minio_public_url: env::get_or(EnvKey::MinioPublicUrl, ""),
            minio_access_key: env::get(EnvKey::MinioAccessKey)?,
            minio_secret_key: env::get(EnvKey::MinioSecretKey)?,
            openai_api_key: env::get(EnvKey::OpenAiApiKey)?,
            openai_api_base: env::get_or(EnvKey::OpenAiApiBase, "https://api.openai.com/v1"),
            voice_overrides: parse_voice_map(&env::get_or(EnvKey::TtsVoiceMap, "")),
            tts_fallback_enabled: env::get_parsed(EnvKey::TtsFallbackEnabled, false),
            tts_fallback_api_base: env::get_or(EnvKey::TtsFallbackApiBase, ""),
            tts_fallback_api_key: env::get_or(EnvKey::TtsFallbackApiKey, ""),
            job_max_attempts: env::get_parsed(EnvKey::JobMaxAttempts, 3),
            job_timeout_secs: env::get_parsed(EnvKey::JobTimeoutSecs, 2 * 60 * 60),
            job_concurrency: env::get_parsed(EnvKey::JobConcurrency, 1),
            job_retry_base_secs: env::get_parsed(EnvKey::JobRetryBaseSecs, 60),
            job_retention_hours: env::get_parsed(EnvKey::JobRetentionHours, 24),
            timeline_gap_epsilon: env::get_parsed(EnvKey::TimelineGapEpsilon, 0.02),
            timeline_min_filler: env::get_parsed(EnvKey::TimelineMinFiller, 0.05),
        })
    }
}

/// Parses "hi=onyx,mr=alloy" into a language-code → voice-id map.
/// Malformed entries are skipped.
fn parse_voice_map(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (lang, voice) = pair.split_once('=')?;
            let (lang, voice) = (lang.trim(), voice.trim());
            if lang.is_empty() || voice.is_empty() {
                return None;
            }
            Some((lang.to_string(), voice.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::parse_voice_map;

    #[test]
    fn voice_map_parses_pairs_and_skips_garbage() {
        let map = parse_voice_map("hi=onyx, mr=alloy ,broken,=x,ta=");
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("hi").map(String::as_str), Some("onyx"));
        assert_eq!(map.get("mr").map(String::as_str), Some("alloy"));
    }

    #[test]
    fn voice_map_empty_input_is_empty() {
        assert!(parse_voice_map("").is_empty());
    }
}
