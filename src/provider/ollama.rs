//! Ollama provider handler: speaks the same OpenAI-compatible
//! chat-completions wire format as the cloud handler, but follows up a
//! tool-calling turn with a best-effort unload call so a local model
//! doesn't sit warm in memory across iterations (§4.8.3).

use super::openai::{send_chat_completion, send_chat_completion_streaming};
use super::{NormalizedResponse, ProviderClient, StreamEvent};
use crate::types::OpenAIRequest;
use crate::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::time::Duration;

pub struct OllamaProvider {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(model: impl Into<String>, base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl ProviderClient for OllamaProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn send(&self, request: OpenAIRequest) -> Result<NormalizedResponse> {
        send_chat_completion(&self.http, &self.base_url, None, &request).await
    }

    async fn send_streaming(&self, request: OpenAIRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        send_chat_completion_streaming(&self.http, &self.base_url, None, &request).await
    }

    /// Best-effort request to stop the model generating further, issued
    /// after a tool-calling turn so a local model isn't left mid-stream.
    /// Failures are logged and swallowed: this is cleanup, not a step whose
    /// failure should mask the turn's actual result (§4.8.3).
    async fn after_tool_call_stream(&self) {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [],
            "stream": false,
            "keep_alive": 0,
        });
        let result = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body)
            .send()
            .await;
        if let Err(err) = result {
            tracing::warn!(model = %self.model, error = %err, "failed to stop ollama model after tool call");
        }
    }
}
