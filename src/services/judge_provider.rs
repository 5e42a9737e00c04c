//! Content Generator client.
//!
//! The external generator produces assessment questions and judges
//! free-text mathematical equivalence. It is treated as an untrusted
//! oracle: generated JSON is deserialized into typed records here and must
//! still pass coverage validation before any student sees it.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::sleep;
use tracing::warn;

use crate::engine::types::{DifficultyTier, Question};

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_API_ENDPOINT: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_MS: u64 = 15_000;
const MAX_RETRIES: usize = 3;
const BASE_BACKOFF_MS: u64 = 200;

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub api_endpoint: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

impl ChatResponse {
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

/// Prompt context for assessment generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationContext {
    pub topic_id: String,
    pub subtopic_ids: Vec<String>,
    pub required_unit_ids: Vec<String>,
    pub question_count: usize,
    pub difficulty: DifficultyTier,
}

/// Typed shape the generator must produce. Anything that does not
/// deserialize into this is rejected before touching the domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedAssessment {
    pub questions: Vec<Question>,
}

#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("content generator not configured: {0}")]
    NotConfigured(&'static str),
    #[error("judge request timed out")]
    Timeout,
    #[error("request failed: {0}")]
    Request(reqwest::Error),
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: reqwest::StatusCode, body: String },
    #[error("generator returned malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("generator returned no content")]
    EmptyChoices,
    #[error("judge verdict was not a boolean: {0}")]
    MalformedVerdict(String),
}

impl From<reqwest::Error> for JudgeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Request(err)
        }
    }
}

#[derive(Clone)]
pub struct ContentGenerator {
    config: GeneratorConfig,
    client: reqwest::Client,
}

impl ContentGenerator {
    pub fn from_env() -> Self {
        let api_key = env_string("GENERATOR_API_KEY");
        let model = env_string("GENERATOR_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let api_endpoint = env_string("GENERATOR_API_ENDPOINT")
            .unwrap_or_else(|| DEFAULT_API_ENDPOINT.to_string());
        let timeout =
            Duration::from_millis(env_u64("GENERATOR_TIMEOUT_MS").unwrap_or(DEFAULT_TIMEOUT_MS));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config: GeneratorConfig { api_key, model, api_endpoint, timeout },
            client,
        }
    }

    pub fn is_available(&self) -> bool {
        self.config
            .api_key
            .as_deref()
            .is_some_and(|v| !v.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// Ask the generator whether a student answer is mathematically
    /// equivalent to the expected one (e.g. "x=2" vs "2"). The verdict must
    /// come back as a bare boolean or `{"equivalent": bool}`.
    pub async fn judge_equivalence(
        &self,
        student_answer: &str,
        expected_answer: &str,
    ) -> Result<bool, JudgeError> {
        let system = "You judge whether a student's answer is mathematically \
                      equivalent to the expected answer. Respond with JSON: \
                      {\"equivalent\": true} or {\"equivalent\": false}.";
        let user = serde_json::json!({
            "studentAnswer": student_answer,
            "expectedAnswer": expected_answer,
        })
        .to_string();

        let content = self.complete(system, &user).await?;
        parse_verdict(&content)
    }

    /// Generate an assessment for the given context. The output is only
    /// schema-checked here; the caller still runs coverage validation.
    pub async fn generate_assessment(
        &self,
        context: &GenerationContext,
    ) -> Result<GeneratedAssessment, JudgeError> {
        let system = "You generate math assessment questions as JSON of the shape \
                      {\"questions\": [...]}; every question cites knowledge units \
                      by id and every solution step carries exactly one citation.";
        let user = serde_json::to_string(context)?;
        let content = self.complete(system, &user).await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, JudgeError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(JudgeError::NotConfigured("GENERATOR_API_KEY"))?;

        let url = format!(
            "{}/chat/completions",
            self.config.api_endpoint.trim_end_matches('/')
        );
        let payload = serde_json::json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "stream": false,
        });

        let response = self.post_with_retry(&url, api_key, &payload).await?;
        response
            .first_content()
            .map(|s| s.to_string())
            .ok_or(JudgeError::EmptyChoices)
    }

    async fn post_with_retry(
        &self,
        url: &str,
        api_key: &str,
        payload: &serde_json::Value,
    ) -> Result<ChatResponse, JudgeError> {
        let mut last_error: Option<JudgeError> = None;

        for retry in 0..=MAX_RETRIES {
            match self
                .client
                .post(url)
                .bearer_auth(api_key)
                .json(payload)
                .send()
                .await
            {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp.json::<ChatResponse>().await?);
                    }
                    let body = resp.text().await.unwrap_or_default();
                    let err = JudgeError::HttpStatus { status, body };
                    if retry < MAX_RETRIES && is_retryable(status) {
                        let backoff = Duration::from_millis(BASE_BACKOFF_MS * (1 << retry));
                        warn!(retry, ?status, "generator request failed, retrying");
                        sleep(backoff).await;
                        last_error = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    let err = JudgeError::from(e);
                    if retry < MAX_RETRIES && !matches!(err, JudgeError::Timeout) {
                        let backoff = Duration::from_millis(BASE_BACKOFF_MS * (1 << retry));
                        warn!(retry, "generator request error, retrying");
                        sleep(backoff).await;
                        last_error = Some(err);
                        continue;
                    }
                    return Err(err);
                }
            }
        }
        Err(last_error.unwrap_or(JudgeError::NotConfigured("unknown")))
    }
}

fn parse_verdict(content: &str) -> Result<bool, JudgeError> {
    let trimmed = content.trim();
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Bool(b)) => Ok(b),
        Ok(serde_json::Value::Object(map)) => match map.get("equivalent") {
            Some(serde_json::Value::Bool(b)) => Ok(*b),
            _ => Err(JudgeError::MalformedVerdict(trimmed.to_string())),
        },
        _ => Err(JudgeError::MalformedVerdict(trimmed.to_string())),
    }
}

fn is_retryable(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(key: &str) -> Option<u64> {
    env_string(key)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_accepts_bare_and_wrapped_booleans() {
        assert_eq!(parse_verdict("true").unwrap(), true);
        assert_eq!(parse_verdict("{\"equivalent\": false}").unwrap(), false);
    }

    #[test]
    fn verdict_rejects_prose() {
        assert!(matches!(
            parse_verdict("the answers look the same to me"),
            Err(JudgeError::MalformedVerdict(_))
        ));
        assert!(matches!(
            parse_verdict("{\"equivalent\": \"yes\"}"),
            Err(JudgeError::MalformedVerdict(_))
        ));
    }

    #[test]
    fn generated_assessment_requires_schema_shape() {
        let good = r#"{"questions":[{"id":"q1","subtopicId":"s1","difficulty":"easy",
            "prompt":"Solve x+1=3","expectedAnswer":"x=2","primaryUnit":"u1"}]}"#;
        let parsed: GeneratedAssessment = serde_json::from_str(good).unwrap();
        assert_eq!(parsed.questions.len(), 1);
        assert_eq!(parsed.questions[0].primary_unit, "u1");

        let bad = r#"{"items": []}"#;
        assert!(serde_json::from_str::<GeneratedAssessment>(bad).is_err());
    }
}
