//! Question generation: calls the external generator and always yields a
//! playable question.

use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    config::QuestionSourceConfig,
    match_engine::question::normalize_or_fallback,
    state::match_state::Question,
};

/// Failures talking to the question generator. Never surfaced to clients.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The HTTP client could not be built.
    #[error("failed to build generator client")]
    ClientBuilder(#[source] reqwest::Error),
    /// The request could not be sent or timed out.
    #[error("failed to reach question generator at `{url}`")]
    Request {
        /// Endpoint that was called.
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// The generator answered with a non-success status.
    #[error("question generator answered {status}")]
    Status {
        /// Status returned by the generator.
        status: StatusCode,
    },
    /// The body could not be read.
    #[error("failed to read generator response")]
    Body(#[source] reqwest::Error),
    /// The body is not JSON, even after stripping code fences.
    #[error("generator response is not JSON")]
    Decode(#[source] serde_json::Error),
}

/// Anything able to produce a raw question payload for a topic.
pub trait QuestionSource: Send + Sync {
    /// Fetch one raw question payload for `topic`, unvalidated.
    fn generate(&self, topic: &str) -> BoxFuture<'static, Result<Value, GenerationError>>;
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    topic: &'a str,
}

/// Generator reached over HTTP with `POST {base_url}/predict`.
#[derive(Clone)]
pub struct HttpQuestionSource {
    client: Client,
    url: Arc<str>,
}

impl HttpQuestionSource {
    /// Build a client bounded by the configured timeout.
    pub fn new(config: &QuestionSourceConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(GenerationError::ClientBuilder)?;

        Ok(Self {
            client,
            url: Arc::from(format!("{}/predict", config.base_url.trim_end_matches('/'))),
        })
    }
}

impl QuestionSource for HttpQuestionSource {
    fn generate(&self, topic: &str) -> BoxFuture<'static, Result<Value, GenerationError>> {
        let source = self.clone();
        let topic = topic.to_string();
        Box::pin(async move {
            let url = source.url.to_string();
            let response = source
                .client
                .post(url.as_str())
                .json(&PredictRequest { topic: &topic })
                .send()
                .await
                .map_err(|source| GenerationError::Request {
                    url: url.clone(),
                    source,
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(GenerationError::Status { status });
            }

            let body = response.text().await.map_err(GenerationError::Body)?;
            serde_json::from_str(strip_code_fences(&body)).map_err(GenerationError::Decode)
        })
    }
}

/// Remove a surrounding markdown code fence (```` ```json ... ``` ````) if present.
pub fn strip_code_fences(body: &str) -> &str {
    let trimmed = body.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Hands out canonical questions. Never fails: every error ends in the fallback question.
pub struct QuestionProvider {
    source: Option<Arc<dyn QuestionSource>>,
}

impl QuestionProvider {
    /// Provider backed by a generator.
    pub fn new(source: Arc<dyn QuestionSource>) -> Self {
        Self {
            source: Some(source),
        }
    }

    /// Provider serving only the built-in question.
    pub fn offline() -> Self {
        info!("no question generator configured; serving the built-in question");
        Self { source: None }
    }

    /// Build the provider described by the configuration.
    pub fn from_config(config: Option<&QuestionSourceConfig>) -> Self {
        let Some(config) = config else {
            return Self::offline();
        };

        match HttpQuestionSource::new(config) {
            Ok(source) => {
                info!(url = %source.url, timeout = ?config.timeout, "question generator configured");
                Self::new(Arc::new(source))
            }
            Err(err) => {
                warn!(error = %err, "failed to set up question generator");
                Self::offline()
            }
        }
    }

    /// Produce the next question for `topic`.
    pub async fn next_question(&self, topic: &str) -> Question {
        let Some(source) = &self.source else {
            return Question::fallback();
        };

        match source.generate(topic).await {
            Ok(payload) => normalize_or_fallback(&payload),
            Err(err) => {
                warn!(topic, error = %err, "question generation failed; serving fallback");
                Question::fallback()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::state::match_state::QuestionProvenance;

    struct Canned(Result<Value, ()>);

    impl QuestionSource for Canned {
        fn generate(&self, _topic: &str) -> BoxFuture<'static, Result<Value, GenerationError>> {
            let result = self.0.clone().map_err(|()| GenerationError::Status {
                status: StatusCode::BAD_GATEWAY,
            });
            Box::pin(async move { result })
        }
    }

    #[test]
    fn strips_markdown_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
    }

    #[tokio::test]
    async fn generated_payloads_are_normalized() {
        let provider = QuestionProvider::new(Arc::new(Canned(Ok(json!({
            "question": "Largest ocean?",
            "option_A": "Atlantic",
            "option_B": "Pacific",
            "option_C": "Indian",
            "option_D": "Arctic",
            "answer": "B",
        })))));

        let question = provider.next_question("Geography").await;
        assert_eq!(question.correct_option(), "Pacific");
        assert_eq!(question.provenance(), QuestionProvenance::Generated);
    }

    #[tokio::test]
    async fn failures_fall_back_to_the_built_in_question() {
        let failing = QuestionProvider::new(Arc::new(Canned(Err(()))));
        assert_eq!(failing.next_question("Art").await, Question::fallback());

        let reported = QuestionProvider::new(Arc::new(Canned(Ok(json!({ "error": "quota" })))));
        assert_eq!(reported.next_question("Art").await, Question::fallback());

        assert_eq!(
            QuestionProvider::offline().next_question("Art").await,
            Question::fallback()
        );
    }
}
