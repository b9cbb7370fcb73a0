//! SSE parsing and tool-call delta aggregation shared by every
//! OpenAI-wire-compatible provider handler (§4.8.1, §6's streaming note).
//!
//! A streamed chat-completion arrives as a sequence of `data: <json>` lines,
//! and a tool call's arguments arrive split across many of those lines
//! rather than as one complete JSON value. [`parse_sse_stream`] turns the
//! raw response body into a stream of [`OpenAIChunk`]s; [`ToolCallAggregator`]
//! turns that stream of chunks into the handful of complete [`ContentBlock`]s
//! a turn actually produced, once `finish_reason` says generation is done.

use crate::types::{ContentBlock, OpenAIChunk, TextBlock, ToolUseBlock};
use crate::{Error, Result};
use futures::stream::{Stream, StreamExt};
use std::collections::HashMap;
use std::pin::Pin;

/// Accumulates streaming deltas into the content blocks they resolve to.
///
/// Text deltas are concatenated in place. Tool calls are keyed by the
/// index the API assigns them, since a turn with more than one tool call
/// interleaves their argument deltas rather than sending them back to back.
/// Both buffers are cleared once `finish_reason` appears, so one aggregator
/// can be reused across iterations within the same turn if a caller wants to.
pub struct ToolCallAggregator {
    text_buffer: String,
    tool_calls: HashMap<u32, PartialToolCall>,
}

/// One tool call as it's being assembled. `arguments` is accumulated as a
/// raw string and only parsed once the call is complete, since the API can
/// split the JSON at any byte position, including mid-string.
#[derive(Debug, Default)]
struct PartialToolCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

impl ToolCallAggregator {
    pub fn new() -> Self {
        Self {
            text_buffer: String::new(),
            tool_calls: HashMap::new(),
        }
    }

    /// Folds one chunk's deltas into the running buffers, returning the
    /// turn's completed blocks once a choice carries a `finish_reason` —
    /// an empty `Vec` otherwise. A tool call missing an `id` or `name` by
    /// the time generation finishes is dropped rather than surfaced as an
    /// error; a malformed argument string is not.
    pub fn process_chunk(&mut self, chunk: OpenAIChunk) -> Result<Vec<ContentBlock>> {
        let mut blocks = Vec::new();

        for choice in chunk.choices {
            if let Some(content) = choice.delta.content {
                self.text_buffer.push_str(&content);
            }

            if let Some(tool_calls) = choice.delta.tool_calls {
                for tool_call in tool_calls {
                    let entry = self.tool_calls.entry(tool_call.index).or_default();
                    if let Some(id) = tool_call.id {
                        entry.id = Some(id);
                    }
                    if let Some(function) = tool_call.function {
                        if let Some(name) = function.name {
                            entry.name = Some(name);
                        }
                        if let Some(args) = function.arguments {
                            entry.arguments.push_str(&args);
                        }
                    }
                }
            }

            if choice.finish_reason.is_some() {
                if !self.text_buffer.is_empty() {
                    blocks.push(ContentBlock::Text(TextBlock::new(self.text_buffer.clone())));
                    self.text_buffer.clear();
                }

                for (_, partial) in self.tool_calls.drain() {
                    if let (Some(id), Some(name)) = (partial.id, partial.name) {
                        let input: serde_json::Value = if partial.arguments.is_empty() {
                            serde_json::json!({})
                        } else {
                            serde_json::from_str(&partial.arguments)
                                .map_err(|e| Error::stream(format!("failed to parse tool arguments: {e}")))?
                        };
                        blocks.push(ContentBlock::ToolUse(ToolUseBlock::new(id, name, input)));
                    }
                }
            }
        }

        Ok(blocks)
    }
}

/// Parses a chat-completions response body as Server-Sent Events, yielding
/// one [`OpenAIChunk`] per `data:` line. The `data: [DONE]` sentinel is
/// dropped rather than surfaced; a line with no `data:` prefix (a heartbeat
/// or comment) is skipped. `from_utf8_lossy` absorbs a UTF-8 sequence split
/// across two HTTP chunk boundaries.
pub fn parse_sse_stream(body: reqwest::Response) -> Pin<Box<dyn Stream<Item = Result<OpenAIChunk>> + Send>> {
    let stream = body.bytes_stream().filter_map(move |result| async move {
        let bytes = match result.map_err(Error::Http) {
            Ok(b) => b,
            Err(e) => return Some(Err(e)),
        };
        let text = String::from_utf8_lossy(&bytes);

        for line in text.lines() {
            let Some(data) = line.strip_prefix("data: ") else { continue };
            if data == "[DONE]" {
                continue;
            }
            return Some(
                serde_json::from_str::<OpenAIChunk>(data)
                    .map_err(|e| Error::stream(format!("failed to parse chunk: {e}"))),
            );
        }

        None
    });

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OpenAIChoice, OpenAIDelta, OpenAIFunctionDelta, OpenAIToolCallDelta};

    fn chunk(delta: OpenAIDelta, finish_reason: Option<&str>) -> OpenAIChunk {
        OpenAIChunk {
            id: "test".to_string(),
            object: "chat.completion.chunk".to_string(),
            created: 0,
            model: "test".to_string(),
            choices: vec![OpenAIChoice {
                index: 0,
                delta,
                finish_reason: finish_reason.map(str::to_string),
            }],
        }
    }

    #[test]
    fn test_tool_call_aggregator_text() {
        let mut aggregator = ToolCallAggregator::new();

        let blocks = aggregator
            .process_chunk(chunk(
                OpenAIDelta {
                    role: None,
                    content: Some("Hello ".to_string()),
                    tool_calls: None,
                },
                None,
            ))
            .unwrap();
        assert!(blocks.is_empty());

        let blocks = aggregator
            .process_chunk(chunk(
                OpenAIDelta {
                    role: None,
                    content: Some("world".to_string()),
                    tool_calls: None,
                },
                Some("stop"),
            ))
            .unwrap();
        assert_eq!(blocks.len(), 1);
        match &blocks[0] {
            ContentBlock::Text(text) => assert_eq!(text.text, "Hello world"),
            _ => panic!("expected text block"),
        }
    }

    #[test]
    fn test_tool_call_aggregator_tool() {
        let mut aggregator = ToolCallAggregator::new();

        aggregator
            .process_chunk(chunk(
                OpenAIDelta {
                    role: None,
                    content: None,
                    tool_calls: Some(vec![OpenAIToolCallDelta {
                        index: 0,
                        id: Some("call_123".to_string()),
                        call_type: Some("function".to_string()),
                        function: Some(OpenAIFunctionDelta {
                            name: Some("get_weather".to_string()),
                            arguments: Some(r#"{"location":"#.to_string()),
                        }),
                    }]),
                },
                None,
            ))
            .unwrap();

        let blocks = aggregator
            .process_chunk(chunk(
                OpenAIDelta {
                    role: None,
                    content: None,
                    tool_calls: Some(vec![OpenAIToolCallDelta {
                        index: 0,
                        id: None,
                        call_type: None,
                        function: Some(OpenAIFunctionDelta {
                            name: None,
                            arguments: Some(r#""Paris"}"#.to_string()),
                        }),
                    }]),
                },
                Some("tool_calls"),
            ))
            .unwrap();

        assert_eq!(blocks.len(), 1);
        match &blocks[0] {
            ContentBlock::ToolUse(tool) => {
                assert_eq!(tool.id, "call_123");
                assert_eq!(tool.name, "get_weather");
                assert_eq!(tool.input["location"], "Paris");
            }
            _ => panic!("expected tool use block"),
        }
    }

    #[test]
    fn test_tool_call_aggregator_drops_call_missing_name() {
        let mut aggregator = ToolCallAggregator::new();
        let blocks = aggregator
            .process_chunk(chunk(
                OpenAIDelta {
                    role: None,
                    content: None,
                    tool_calls: Some(vec![OpenAIToolCallDelta {
                        index: 0,
                        id: Some("call_1".to_string()),
                        call_type: Some("function".to_string()),
                        function: None,
                    }]),
                },
                Some("tool_calls"),
            ))
            .unwrap();
        assert!(blocks.is_empty());
    }

    #[test]
    fn test_tool_call_aggregator_errors_on_malformed_arguments() {
        let mut aggregator = ToolCallAggregator::new();
        let err = aggregator
            .process_chunk(chunk(
                OpenAIDelta {
                    role: None,
                    content: None,
                    tool_calls: Some(vec![OpenAIToolCallDelta {
                        index: 0,
                        id: Some("call_1".to_string()),
                        call_type: Some("function".to_string()),
                        function: Some(OpenAIFunctionDelta {
                            name: Some("search".to_string()),
                            arguments: Some("not json".to_string()),
                        }),
                    }]),
                },
                Some("tool_calls"),
            ))
            .unwrap_err();
        assert!(matches!(err, Error::Stream(_)));
    }
}
