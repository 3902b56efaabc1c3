//! Qdrant REST backend.
//!
//! Collections use cosine distance. Every write waits for the operation to be
//! applied (`?wait=true`) so a search issued right after ingestion sees it.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{ScoredPoint, VectorBackend, VectorPoint};
use crate::types::{Availability, MetaValue, Metadata};

#[derive(Debug, Clone)]
pub struct QdrantBackend {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<serde_json::Map<String, Value>>,
}

impl QdrantBackend {
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

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/collections/{collection}", self.base_url)
    }

    /// Send a request and report anything but a 2xx as unavailable.
    async fn send(&self, op: &str, request: reqwest::RequestBuilder) -> Availability<reqwest::Response> {
        match request.send().await {
            Ok(r) if r.status().is_success() => Availability::Available(r),
            Ok(r) => {
                warn!(op, status = %r.status(), "vector backend rejected request");
                Availability::unavailable(format!("{op}: backend returned {}", r.status()))
            }
            Err(e) => {
                warn!(op, error = %e, "vector backend unreachable");
                Availability::unavailable(format!("{op}: {e}"))
            }
        }
    }
}

/// Keep the scalar payload fields; nested values were not written by us.
fn scalar_payload(raw: serde_json::Map<String, Value>) -> Metadata {
    raw.into_iter()
        .filter_map(|(k, v)| {
            let value = match v {
                Value::Bool(b) => MetaValue::Bool(b),
                Value::String(s) => MetaValue::Text(s),
                Value::Number(n) => match n.as_i64() {
                    Some(i) => MetaValue::Int(i),
                    None => MetaValue::Float(n.as_f64()?),
                },
                _ => return None,
            };
            Some((k, value))
        })
        .collect()
}

fn point_id(id: Value) -> String {
    match id {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[async_trait]
impl VectorBackend for QdrantBackend {
    fn name(&self) -> &str {
        "qdrant"
    }

    async fn ensure_collection(&self, collection: &str, dimension: usize) -> Availability<()> {
        let url = self.collection_url(collection);
        match self.client.get(&url).send().await {
            Ok(r) if r.status().is_success() => return Availability::Available(()),
            Ok(_) => {}
            Err(e) => {
                warn!(collection, error = %e, "vector backend unreachable");
                return Availability::unavailable(e);
            }
        }

        let body = json!({"vectors": {"size": dimension, "distance": "Cosine"}});
        self.send("create collection", self.client.put(&url).json(&body))
            .await
            .map(|_| {
                debug!(collection, dimension, "created vector collection");
            })
    }

    async fn upsert(&self, collection: &str, points: &[VectorPoint]) -> Availability<()> {
        if points.is_empty() {
            return Availability::Available(());
        }
        let points: Vec<Value> = points
            .iter()
            .map(|p| json!({"id": p.id, "vector": p.vector, "payload": p.payload}))
            .collect();
        let url = format!("{}/points?wait=true", self.collection_url(collection));
        self.send("upsert", self.client.put(url).json(&json!({"points": points})))
            .await
            .map(|_| ())
    }

    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
        score_threshold: f32,
    ) -> Availability<Vec<ScoredPoint>> {
        let url = format!("{}/points/search", self.collection_url(collection));
        let body = json!({
            "vector": query,
            "limit": limit,
            "with_payload": true,
            "score_threshold": score_threshold,
        });
        let response = match self.send("search", self.client.post(url).json(&body)).await {
            Availability::Available(r) => r,
            Availability::Unavailable(reason) => return Availability::Unavailable(reason),
        };

        match response.json::<SearchResponse>().await {
            Ok(parsed) => Availability::Available(
                parsed
                    .result
                    .into_iter()
                    .map(|r| ScoredPoint {
                        id: point_id(r.id),
                        score: r.score,
                        payload: r.payload.map(scalar_payload).unwrap_or_default(),
                    })
                    .collect(),
            ),
            Err(e) => {
                warn!(collection, error = %e, "malformed search response");
                Availability::unavailable(e)
            }
        }
    }

    async fn delete_points(&self, collection: &str, ids: &[String]) -> Availability<()> {
        if ids.is_empty() {
            return Availability::Available(());
        }
        let url = format!("{}/points/delete?wait=true", self.collection_url(collection));
        self.send("delete points", self.client.post(url).json(&json!({"points": ids})))
            .await
            .map(|_| ())
    }

    async fn delete_collection(&self, collection: &str) -> Availability<()> {
        let url = self.collection_url(collection);
        self.send("delete collection", self.client.delete(url))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(uri: &str) -> QdrantBackend {
        QdrantBackend::new(uri, Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn ensure_collection_skips_create_when_present() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/col_a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {}})))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/col_a"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        assert!(backend(&server.uri()).ensure_collection("col_a", 3).await.is_available());
    }

    #[tokio::test]
    async fn ensure_collection_creates_with_cosine() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/col_a"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/col_a"))
            .and(body_partial_json(json!({"vectors": {"size": 3, "distance": "Cosine"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
            .expect(1)
            .mount(&server)
            .await;

        assert!(backend(&server.uri()).ensure_collection("col_a", 3).await.is_available());
    }

    #[tokio::test]
    async fn upsert_waits_for_apply() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/collections/col_a/points"))
            .and(query_param("wait", "true"))
            .and(body_partial_json(json!({"points": [{"id": "p1", "vector": [1.0, 0.0]}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {"status": "completed"}})))
            .expect(1)
            .mount(&server)
            .await;

        let point = VectorPoint {
            id: "p1".into(),
            vector: vec![1.0, 0.0],
            payload: Metadata::new(),
        };
        assert!(backend(&server.uri()).upsert("col_a", &[point]).await.is_available());
    }

    #[tokio::test]
    async fn search_parses_scored_points() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/col_a/points/search"))
            .and(body_partial_json(json!({"limit": 2, "with_payload": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [
                    {"id": "p1", "score": 0.9, "payload": {"content": "alpha", "chunk_index": 0, "tags": ["x"]}},
                    {"id": 42, "score": 0.7}
                ]
            })))
            .mount(&server)
            .await;

        let hits = backend(&server.uri())
            .search("col_a", &[1.0, 0.0], 2, 0.5)
            .await
            .ok()
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "p1");
        assert_eq!(hits[0].payload.get("content").and_then(|v| v.as_str()), Some("alpha"));
        assert_eq!(hits[0].payload.get("chunk_index").and_then(|v| v.as_i64()), Some(0));
        assert!(!hits[0].payload.contains_key("tags"));
        assert_eq!(hits[1].id, "42");
    }

    #[tokio::test]
    async fn missing_collection_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/col_a/points/search"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = backend(&server.uri()).search("col_a", &[1.0], 5, 0.0).await;
        assert!(!result.is_available());
    }
}
