//! Language model capability used for name extraction.

use crate::error::{FacetrailError, Result};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// Text-in, text-out language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;

    fn model_name(&self) -> &str;
}

#[cfg(feature = "remote")]
pub use gemini::GeminiClient;

#[cfg(feature = "remote")]
mod gemini {
    use super::*;
    use crate::config::TranscriptConfig;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize)]
    struct GenerateRequest<'a> {
        contents: [Content<'a>; 1],
    }

    #[derive(Serialize)]
    struct Content<'a> {
        parts: [TextPart<'a>; 1],
    }

    #[derive(Serialize)]
    struct TextPart<'a> {
        text: &'a str,
    }

    #[derive(Deserialize)]
    struct GenerateResponse {
        #[serde(default)]
        candidates: Vec<Candidate>,
    }

    #[derive(Deserialize)]
    struct Candidate {
        content: Option<CandidateContent>,
    }

    #[derive(Deserialize)]
    struct CandidateContent {
        #[serde(default)]
        parts: Vec<ResponsePart>,
    }

    #[derive(Deserialize)]
    struct ResponsePart {
        #[serde(default)]
        text: Option<String>,
    }

    /// Google Gemini `generateContent` client.
    ///
    /// Requests are bounded by a client-wide timeout.
    pub struct GeminiClient {
        client: reqwest::Client,
        endpoint: String,
        model: String,
        api_key: String,
    }

    impl GeminiClient {
        pub fn new(endpoint: &str, model: &str, api_key: &str, timeout: Duration) -> Result<Self> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| FacetrailError::LanguageModel {
                    message: format!("cannot build HTTP client: {e}"),
                })?;
            Ok(Self {
                client,
                endpoint: endpoint.trim_end_matches('/').to_string(),
                model: model.to_string(),
                api_key: api_key.to_string(),
            })
        }

        pub fn from_config(config: &TranscriptConfig, api_key: &str) -> Result<Self> {
            Self::new(
                &config.llm_endpoint,
                &config.llm_model,
                api_key,
                config.request_timeout(),
            )
        }

        fn url(&self) -> String {
            format!("{}/models/{}:generateContent", self.endpoint, self.model)
        }
    }

    #[async_trait]
    impl LanguageModel for GeminiClient {
        async fn generate(&self, prompt: &str) -> Result<String> {
            let body = GenerateRequest {
                contents: [Content {
                    parts: [TextPart { text: prompt }],
                }],
            };

            let response = self
                .client
                .post(self.url())
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| FacetrailError::LanguageModel {
                    message: format!("request failed: {e}"),
                })?;

            let status = response.status();
            if !status.is_success() {
                let detail = response.text().await.unwrap_or_default();
                return Err(FacetrailError::LanguageModel {
                    message: format!("{} returned {status}: {}", self.model, detail.trim()),
                });
            }

            let parsed: GenerateResponse =
                response
                    .json()
                    .await
                    .map_err(|e| FacetrailError::LanguageModel {
                        message: format!("unexpected response: {e}"),
                    })?;
            extract_text(parsed)
        }

        fn model_name(&self) -> &str {
            &self.model
        }
    }

    /// Concatenate the text parts of the first candidate.
    fn extract_text(response: GenerateResponse) -> Result<String> {
        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(FacetrailError::LanguageModel {
                message: "empty response".to_string(),
            });
        }
        Ok(text.trim().to_string())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn request_body_has_single_text_part() {
            let body = GenerateRequest {
                contents: [Content {
                    parts: [TextPart { text: "hello" }],
                }],
            };
            assert_eq!(
                serde_json::to_value(&body).unwrap(),
                serde_json::json!({"contents": [{"parts": [{"text": "hello"}]}]})
            );
        }

        #[test]
        fn extracts_first_candidate_text() {
            let response: GenerateResponse = serde_json::from_str(
                r#"{"candidates":[
                    {"content":{"parts":[{"text":"{\"guessed_"},{"text":"name\":\"Tim\"}"}]}},
                    {"content":{"parts":[{"text":"ignored"}]}}
                ]}"#,
            )
            .unwrap();
            assert_eq!(extract_text(response).unwrap(), r#"{"guessed_name":"Tim"}"#);
        }

        #[test]
        fn no_candidates_is_an_error() {
            let response: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
            assert!(matches!(
                extract_text(response),
                Err(FacetrailError::LanguageModel { .. })
            ));
        }

        #[test]
        fn url_joins_endpoint_and_model() {
            let client = GeminiClient::new(
                "https://generativelanguage.googleapis.com/v1beta/",
                "gemini-2.0-flash-lite",
                "key",
                Duration::from_secs(60),
            )
            .unwrap();
            assert_eq!(
                client.url(),
                "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash-lite:generateContent"
            );
        }

        #[tokio::test]
        async fn silent_endpoint_times_out_as_model_error() {
            // Accept connections and never answer.
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let server = tokio::spawn(async move {
                let mut held = Vec::new();
                while let Ok((socket, _)) = listener.accept().await {
                    held.push(socket);
                }
            });

            let client = GeminiClient::new(
                &format!("http://{addr}/v1beta"),
                "gemini-2.0-flash-lite",
                "key",
                Duration::from_millis(200),
            )
            .unwrap();
            let outcome =
                tokio::time::timeout(Duration::from_secs(5), client.generate("who is it?")).await;

            server.abort();
            assert!(matches!(
                outcome,
                Ok(Err(FacetrailError::LanguageModel { .. }))
            ));
        }
    }
}

/// Mock language model for testing
#[derive(Debug)]
pub struct MockLanguageModel {
    response: std::result::Result<String, String>,
    delay: Duration,
    prompts: Mutex<Vec<String>>,
}

impl MockLanguageModel {
    /// Reply with `response` to every prompt
    pub fn with_response(response: &str) -> Self {
        Self {
            response: Ok(response.to_string()),
            delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Fail every request with `message`
    pub fn with_failure(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            ..Self::with_response("")
        }
    }

    /// Wait `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Prompts received so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.response
            .clone()
            .map_err(|message| FacetrailError::LanguageModel { message })
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_records_prompts_and_replies() {
        let model = MockLanguageModel::with_response("{}");
        assert_eq!(model.generate("first").await.unwrap(), "{}");
        assert_eq!(model.generate("second").await.unwrap(), "{}");
        assert_eq!(model.prompts(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn mock_failure_is_language_model_error() {
        let model = MockLanguageModel::with_failure("quota exceeded");
        match model.generate("x").await {
            Err(FacetrailError::LanguageModel { message }) => assert_eq!(message, "quota exceeded"),
            other => panic!("Expected LanguageModel error, got {other:?}"),
        }
    }
}
