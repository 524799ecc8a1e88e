//! Face similarity capability.
//!
//! Every implementation reports on the canonical 0-100 scale. Services that
//! speak another scale are converted exactly once, in their adapter.

use crate::error::{FacetrailError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Compares two face images.
#[async_trait]
pub trait FaceComparer: Send + Sync {
    /// Similarity of `candidate` to `reference` on the 0-100 scale.
    ///
    /// Both arguments are encoded image files (JPEG or PNG).
    async fn similarity(&self, candidate: &[u8], reference: &[u8]) -> Result<f64>;
}

#[cfg(feature = "remote")]
pub use remote::HttpFaceComparer;

#[cfg(feature = "remote")]
mod remote {
    use super::*;
    use crate::config::{MatchingConfig, SimilarityScale};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Serialize)]
    struct CompareRequest {
        source: String,
        target: String,
    }

    #[derive(Deserialize)]
    struct CompareResponse {
        similarity: f64,
    }

    /// Similarity service reached over HTTP.
    ///
    /// POSTs `{"source": <b64>, "target": <b64>}` and expects
    /// `{"similarity": <number>}` back. A request that outlives the timeout
    /// fails like any other comparison.
    pub struct HttpFaceComparer {
        client: reqwest::Client,
        url: String,
        scale: SimilarityScale,
    }

    impl HttpFaceComparer {
        pub fn new(
            url: impl Into<String>,
            scale: SimilarityScale,
            timeout: Duration,
        ) -> Result<Self> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| FacetrailError::Comparison {
                    message: format!("cannot build HTTP client: {e}"),
                })?;
            Ok(Self {
                client,
                url: url.into(),
                scale,
            })
        }

        /// Build from config, `None` when no service URL is set.
        pub fn from_config(config: &MatchingConfig) -> Result<Option<Self>> {
            config
                .service_url
                .as_deref()
                .map(|url| Self::new(url, config.similarity_scale, config.request_timeout()))
                .transpose()
        }
    }

    #[async_trait]
    impl FaceComparer for HttpFaceComparer {
        async fn similarity(&self, candidate: &[u8], reference: &[u8]) -> Result<f64> {
            let body = CompareRequest {
                source: STANDARD.encode(candidate),
                target: STANDARD.encode(reference),
            };

            let response = self
                .client
                .post(&self.url)
                .json(&body)
                .send()
                .await
                .map_err(|e| FacetrailError::Comparison {
                    message: format!("request to {} failed: {e}", self.url),
                })?;

            if !response.status().is_success() {
                return Err(FacetrailError::Comparison {
                    message: format!("service returned status {}", response.status()),
                });
            }

            let parsed: CompareResponse =
                response.json().await.map_err(|e| FacetrailError::Comparison {
                    message: format!("unexpected response: {e}"),
                })?;

            if !parsed.similarity.is_finite() {
                return Err(FacetrailError::Comparison {
                    message: "similarity is not a number".to_string(),
                });
            }
            Ok(self.scale.to_percent(parsed.similarity))
        }
    }
}

/// Comparer that replays scripted results in call order.
///
/// Once the script runs out every call returns the fallback similarity.
#[derive(Debug, Default)]
pub struct ScriptedComparer {
    script: Mutex<VecDeque<Result<f64>>>,
    fallback: f64,
    calls: AtomicUsize,
}

impl ScriptedComparer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every comparison returns `similarity`.
    pub fn always(similarity: f64) -> Self {
        Self {
            fallback: similarity,
            ..Self::default()
        }
    }

    pub fn then(self, similarity: f64) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Ok(similarity));
        }
        self
    }

    pub fn then_fail(self, message: &str) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Err(FacetrailError::Comparison {
                message: message.to_string(),
            }));
        }
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FaceComparer for ScriptedComparer {
    async fn similarity(&self, _candidate: &[u8], _reference: &[u8]) -> Result<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .map_err(|e| FacetrailError::Comparison {
                message: e.to_string(),
            })?
            .pop_front();
        next.unwrap_or(Ok(self.fallback))
    }
}
