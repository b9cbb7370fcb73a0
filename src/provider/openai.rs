//! OpenAI (and OpenAI-compatible cloud) provider handler: plain
//! request/response and SSE streaming against the chat-completions
//! endpoint, with no provider-specific cleanup step (§4.8).

use super::{NormalizedResponse, NormalizedToolCall, ProviderClient, StreamEvent};
use crate::types::{ContentBlock, OpenAIChunk, OpenAIRequest, OpenAIToolCall};
use crate::utils::{parse_sse_stream, ToolCallAggregator};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde::Deserialize;
use std::time::{Duration, Instant};

pub struct OpenAiProvider {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiProvider {
    pub fn new(model: impl Into<String>, base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            model: model.into(),
            api_key,
        })
    }
}

#[async_trait]
impl ProviderClient for OpenAiProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn send(&self, request: OpenAIRequest) -> Result<NormalizedResponse> {
        send_chat_completion(&self.http, &self.base_url, self.api_key.as_deref(), &request).await
    }

    async fn send_streaming(&self, request: OpenAIRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        send_chat_completion_streaming(&self.http, &self.base_url, self.api_key.as_deref(), &request).await
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAIToolCall>>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

/// Sends one non-streaming chat-completions request and normalizes the
/// response. Shared by every OpenAI-wire-compatible provider (§4.8.1).
pub(crate) async fn send_chat_completion(
    http: &reqwest::Client,
    base_url: &str,
    api_key: Option<&str>,
    request: &OpenAIRequest,
) -> Result<NormalizedResponse> {
    let mut builder = http.post(format!("{base_url}/chat/completions")).json(request);
    if let Some(key) = api_key {
        builder = builder.bearer_auth(key);
    }
    let started = Instant::now();
    let response = builder
        .send()
        .await
        .map_err(|e| Error::from_request(e, started.elapsed().as_millis() as u64))?;
    let status = response.status();

    if status.as_u16() == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        return Err(Error::rate_limit(retry_after));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::provider(format!("{status}: {body}")));
    }

    let parsed: ChatCompletionResponse = response.json().await?;
    Ok(normalize_response(parsed))
}

fn normalize_response(parsed: ChatCompletionResponse) -> NormalizedResponse {
    let choice = parsed.choices.into_iter().next();
    let message = choice.map(|c| c.message);

    let tool_calls: Vec<NormalizedToolCall> = message
        .as_ref()
        .and_then(|m| m.tool_calls.clone())
        .unwrap_or_default()
        .into_iter()
        .filter_map(|tc| {
            serde_json::from_str(&tc.function.arguments)
                .ok()
                .map(|arguments| NormalizedToolCall {
                    id: tc.id,
                    name: tc.function.name,
                    arguments,
                })
        })
        .collect();

    NormalizedResponse {
        has_tool_calls: !tool_calls.is_empty(),
        text: message.and_then(|m| m.content),
        tool_calls,
        tokens: parsed.usage.map(|u| (u.prompt_tokens, u.completion_tokens)),
    }
}

/// Streams one chat-completions request, aggregating deltas with the same
/// [`ToolCallAggregator`] the rest of the crate uses for SSE parsing.
pub(crate) async fn send_chat_completion_streaming(
    http: &reqwest::Client,
    base_url: &str,
    api_key: Option<&str>,
    request: &OpenAIRequest,
) -> Result<BoxStream<'static, Result<StreamEvent>>> {
    let mut builder = http.post(format!("{base_url}/chat/completions")).json(request);
    if let Some(key) = api_key {
        builder = builder.bearer_auth(key);
    }
    let started = Instant::now();
    let response = builder
        .send()
        .await
        .map_err(|e| Error::from_request(e, started.elapsed().as_millis() as u64))?;
    let status = response.status();

    if status.as_u16() == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        return Err(Error::rate_limit(retry_after));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::provider(format!("{status}: {body}")));
    }

    let chunk_stream = parse_sse_stream(response);
    Ok(Box::pin(futures::stream::unfold(
        (chunk_stream, ToolCallAggregator::new()),
        |(mut chunk_stream, mut aggregator)| async move {
            loop {
                let chunk: OpenAIChunk = match chunk_stream.next().await {
                    Some(Ok(c)) => c,
                    Some(Err(e)) => return Some((Err(e), (chunk_stream, aggregator))),
                    None => return None,
                };

                let saw_tool_call_delta = chunk.choices.iter().any(|c| c.delta.tool_calls.is_some());
                let delta_text: String = chunk.choices.iter().filter_map(|c| c.delta.content.clone()).collect();

                let blocks = match aggregator.process_chunk(chunk) {
                    Ok(b) => b,
                    Err(e) => return Some((Err(e), (chunk_stream, aggregator))),
                };

                if !blocks.is_empty() {
                    return Some((Ok(StreamEvent::Completed(normalize_blocks(blocks))), (chunk_stream, aggregator)));
                }
                if saw_tool_call_delta {
                    return Some((Ok(StreamEvent::ToolCallIndication), (chunk_stream, aggregator)));
                }
                if !delta_text.is_empty() {
                    return Some((Ok(StreamEvent::TokenDelta(delta_text)), (chunk_stream, aggregator)));
                }
                // Heartbeat or role-only chunk: keep draining without emitting.
            }
        },
    )))
}

fn normalize_blocks(blocks: Vec<ContentBlock>) -> NormalizedResponse {
    let mut text = None;
    let mut tool_calls = Vec::new();
    for block in blocks {
        match block {
            ContentBlock::Text(t) => text = Some(t.text),
            ContentBlock::ToolUse(t) => tool_calls.push(NormalizedToolCall {
                id: t.id,
                name: t.name,
                arguments: t.input,
            }),
            ContentBlock::ToolResult(_) => {}
        }
    }
    NormalizedResponse {
        has_tool_calls: !tool_calls.is_empty(),
        tool_calls,
        text,
        tokens: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OpenAIFunction;

    #[test]
    fn test_normalize_response_text_only() {
        let parsed = ChatCompletionResponse {
            choices: vec![ChatCompletionChoice {
                message: ChatCompletionMessage {
                    content: Some("hello".to_string()),
                    tool_calls: None,
                },
            }],
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
            }),
        };
        let normalized = normalize_response(parsed);
        assert!(!normalized.has_tool_calls);
        assert_eq!(normalized.text.as_deref(), Some("hello"));
        assert_eq!(normalized.tokens, Some((10, 5)));
    }

    #[test]
    fn test_normalize_response_with_tool_calls() {
        let parsed = ChatCompletionResponse {
            choices: vec![ChatCompletionChoice {
                message: ChatCompletionMessage {
                    content: None,
                    tool_calls: Some(vec![OpenAIToolCall {
                        id: "call_1".to_string(),
                        call_type: "function".to_string(),
                        function: OpenAIFunction {
                            name: "search".to_string(),
                            arguments: r#"{"q":"rust"}"#.to_string(),
                        },
                    }]),
                },
            }],
            usage: None,
        };
        let normalized = normalize_response(parsed);
        assert!(normalized.has_tool_calls);
        assert_eq!(normalized.tool_calls[0].name, "search");
        assert_eq!(normalized.tool_calls[0].arguments["q"], "rust");
    }

    #[test]
    fn test_normalize_response_drops_unparseable_tool_call() {
        let parsed = ChatCompletionResponse {
            choices: vec![ChatCompletionChoice {
                message: ChatCompletionMessage {
                    content: None,
                    tool_calls: Some(vec![OpenAIToolCall {
                        id: "call_1".to_string(),
                        call_type: "function".to_string(),
                        function: OpenAIFunction {
                            name: "search".to_string(),
                            arguments: "not json".to_string(),
                        },
                    }]),
                },
            }],
            usage: None,
        };
        let normalized = normalize_response(parsed);
        assert!(!normalized.has_tool_calls);
        assert!(normalized.tool_calls.is_empty());
    }

    #[test]
    fn test_normalize_blocks_text() {
        let blocks = vec![ContentBlock::Text(crate::types::TextBlock::new("hi"))];
        let normalized = normalize_blocks(blocks);
        assert_eq!(normalized.text.as_deref(), Some("hi"));
        assert!(!normalized.has_tool_calls);
    }
}
