use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::modules::dubbing::error::{DubbingError, Stage};
use crate::modules::dubbing::model::TargetLanguage;

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        language: TargetLanguage,
    ) -> Result<String, DubbingError>;
}

/// Chat-completions translation provider. Stateless, one call per text unit.
pub struct ChatTranslator {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

impl ChatTranslator {
    pub fn new(client: reqwest::Client, api_base: &str, api_key: &str) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: "gpt-4o-mini".to_string(),
        }
    }
}

#[async_trait]
impl Translator for ChatTranslator {
    async fn translate(
        &self,
        text: &str,
        language: TargetLanguage,
    ) -> Result<String, DubbingError> {
        let system = format!(
            "You are a professional translator. Translate the user's text into {}. \
             Preserve punctuation and sentence structure. Reply with the translation only.",
            language.english_name()
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "temperature": 0.3,
                "messages": [
                    {"role": "system", "content": system},
                    {"role": "user", "content": text},
                ],
            }))
            .send()
            .await
            .map_err(|e| DubbingError::transient(Stage::Translating, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("provider returned {status}: {body}");
            if status.as_u16() == 429 || status.is_server_error() {
                return Err(DubbingError::transient(Stage::Translating, message));
            }
            return Err(DubbingError::fatal(Stage::Translating, message));
        }

        let parsed: ChatCompletion = response
            .json()
            .await
            .map_err(|e| DubbingError::fatal(Stage::Translating, format!("bad response shape: {e}")))?;

        let translated = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();

        if translated.is_empty() {
            return Err(DubbingError::fatal(
                Stage::Translating,
                "provider returned an empty translation",
            ));
        }

        Ok(translated)
    }
}
