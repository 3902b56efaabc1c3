//! Text summarization collaborator, used for long memory entries, session
//! summaries, and consolidation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::Availability;

const SYSTEM_PROMPT: &str = "You are a helpful assistant. Summarize the following text concisely, \
     capturing the key points and any important learnings.";

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// A blank summary is reported as unavailable.
    async fn summarize(&self, text: &str, model: &str) -> Availability<String>;
}

/// Summarizes through Ollama's non-streaming `/api/chat`.
#[derive(Debug, Clone)]
pub struct OllamaSummarizer {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ChatReply>,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: String,
}

impl OllamaSummarizer {
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
impl Summarizer for OllamaSummarizer {
    async fn summarize(&self, text: &str, model: &str) -> Availability<String> {
        let request = ChatRequest {
            model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            stream: false,
        };

        let response = match self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!(status = %r.status(), model, "summarizer returned an error");
                return Availability::unavailable(format!("summarizer returned {}", r.status()));
            }
            Err(e) => {
                warn!(error = %e, model, "summary request failed");
                return Availability::unavailable(e);
            }
        };

        match response.json::<ChatResponse>().await {
            Ok(ChatResponse {
                message: Some(reply),
            }) if !reply.content.trim().is_empty() => Availability::Available(reply.content.trim().to_string()),
            Ok(_) => Availability::unavailable("summarizer returned an empty reply"),
            Err(e) => {
                warn!(error = %e, "malformed summary response");
                Availability::unavailable(e)
            }
        }
    }
}

pub fn create_summarizer(config: &crate::config::OllamaConfig) -> Result<Arc<dyn Summarizer>> {
    let summarizer = OllamaSummarizer::new(
        &config.base_url,
        Duration::from_secs(config.summary_timeout_secs),
    )?;
    Ok(Arc::new(summarizer))
}
