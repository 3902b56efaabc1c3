//! Ollama `/api/embed` client.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::EmbeddingProvider;
use crate::types::Availability;

#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str, model: &str) -> Availability<Vec<f32>> {
        let url = format!("{}/api/embed", self.base_url);
        let response = match self
            .client
            .post(&url)
            .json(&EmbedRequest { model, input: text })
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, model, "embedding request failed");
                return Availability::unavailable(e);
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, model, "embedding service returned an error");
            return Availability::unavailable(format!("embedding service returned {status}"));
        }

        let body: EmbedResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "malformed embedding response");
                return Availability::unavailable(e);
            }
        };

        match body.embeddings.into_iter().next() {
            Some(v) if !v.is_empty() => {
                debug!(model, dimension = v.len(), "embedded text");
                Availability::Available(v)
            }
            _ => Availability::unavailable("embedding service returned an empty vector"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn embedder(base_url: &str) -> OllamaEmbedder {
        OllamaEmbedder::new(base_url, Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn embed_returns_first_vector() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .and(body_partial_json(serde_json::json!({"model": "nomic-embed-text", "input": "hello"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"embeddings": [[0.1, 0.2, 0.3]]})),
            )
            .mount(&server)
            .await;

        let result = embedder(&server.uri()).embed("hello", "nomic-embed-text").await;
        assert_eq!(result, Availability::Available(vec![0.1, 0.2, 0.3]));
    }

    #[tokio::test]
    async fn empty_vector_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"embeddings": [[]]})))
            .mount(&server)
            .await;

        let result = embedder(&server.uri()).embed("hello", "m").await;
        assert!(!result.is_available());
    }

    #[tokio::test]
    async fn server_error_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = embedder(&server.uri()).embed("hello", "m").await;
        assert!(matches!(result, Availability::Unavailable(reason) if reason.contains("500")));
    }

    #[tokio::test]
    async fn timeout_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"embeddings": [[1.0]]}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let fast = OllamaEmbedder::new(&server.uri(), Duration::from_millis(50)).unwrap();
        assert!(!fast.embed("hello", "m").await.is_available());
    }

    #[tokio::test]
    async fn embed_many_preserves_order() {
        let server = MockServer::start().await;
        for (input, value) in [("a", 1.0), ("b", 2.0), ("c", 3.0)] {
            Mock::given(method("POST"))
                .and(path("/api/embed"))
                .and(body_partial_json(serde_json::json!({"input": input})))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(serde_json::json!({"embeddings": [[value]]}))
                        // later inputs answer first
                        .set_delay(Duration::from_millis((4.0 - value) as u64 * 30)),
                )
                .mount(&server)
                .await;
        }

        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let results = embedder(&server.uri()).embed_many(&texts, "m").await;
        let firsts: Vec<f32> = results.into_iter().map(|r| r.ok().unwrap()[0]).collect();
        assert_eq!(firsts, vec![1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn connection_refused_is_unavailable() {
        // Nothing listens on port 9 on test hosts.
        let result = embedder("http://127.0.0.1:9").embed("hello", "m").await;
        assert!(!result.is_available());
    }
}
