//! Core data model: messages, conversation history, agent configuration,
//! tool choice, and the OpenAI-compatible wire types shared by both
//! provider handlers.
//!
//! Types are organized in three groups:
//!
//! - **Conversation model** — [`Message`], [`MessageRole`], [`ContentBlock`]
//!   and friends, plus [`History`] for the bounded, FIFO-evicting message
//!   buffer an [`crate::orchestrator::Agent`] owns.
//! - **Agent configuration** — [`AgentConfig`], a closed-key validated set of
//!   generation parameters (§6), and [`ToolChoice`].
//! - **Wire format** — [`OpenAIRequest`]/[`OpenAIMessage`]/[`OpenAIChunk`]
//!   and friends, the OpenAI-compatible chat-completions format both the
//!   OpenAI and Ollama provider handlers speak.

use crate::Error;
use serde::{Deserialize, Serialize};

// ============================================================================
// CONVERSATION MODEL
// ============================================================================

/// Identifies the sender/role of a message in the conversation.
///
/// Serializes to lowercase strings via serde (`"system"`, `"user"`, etc.)
/// to match the OpenAI-compatible wire format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Establishes agent behavior and context; first message, if present.
    System,
    /// Input from the human or calling application.
    User,
    /// Response from the model; may carry tool-use requests.
    Assistant,
    /// Result of executing a previously requested tool.
    Tool,
}

/// Content blocks that can appear in a message.
///
/// Uses serde's externally tagged enum format with a `"type"` field:
/// `{"type": "text", "text": "..."}`, `{"type": "tool_use", ...}`,
/// `{"type": "tool_result", ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text content.
    Text(TextBlock),
    /// Request from the model to execute a tool.
    ToolUse(ToolUseBlock),
    /// Result of a tool execution, sent back to the model.
    ToolResult(ToolResultBlock),
}

/// Plain text content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
}

impl TextBlock {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A tool-use request from the model: a call `id` (used to correlate the
/// eventual result), the tool `name`, and its JSON `input`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolUseBlock {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

impl ToolUseBlock {
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
        }
    }
}

/// The result of executing a tool, correlated back to its [`ToolUseBlock`]
/// via `tool_use_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultBlock {
    pub tool_use_id: String,
    pub content: serde_json::Value,
}

impl ToolResultBlock {
    pub fn new(tool_use_id: impl Into<String>, content: serde_json::Value) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content,
        }
    }
}

/// A complete message in a conversation: a role and one or more content
/// blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn new(role: MessageRole, content: Vec<ContentBlock>) -> Self {
        Self { role, content }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(
            MessageRole::System,
            vec![ContentBlock::Text(TextBlock::new(text))],
        )
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(
            MessageRole::User,
            vec![ContentBlock::Text(TextBlock::new(text))],
        )
    }

    pub fn user_with_blocks(content: Vec<ContentBlock>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::assistant(vec![ContentBlock::Text(TextBlock::new(text))])
    }

    /// First text block's content, if this message has one.
    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Text(t) => Some(t.text.as_str()),
            _ => None,
        })
    }

    /// Tool-use blocks in this message, in order.
    pub fn tool_uses(&self) -> impl Iterator<Item = &ToolUseBlock> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolUse(t) => Some(t),
            _ => None,
        })
    }
}

/// Bounded, append-only conversation buffer with FIFO eviction (§3/§4.10).
///
/// On `append`, if the buffer is already at `max_size`, the oldest message
/// is dropped before the new one is pushed — the buffer never exceeds
/// `max_size` and never silently drops the newest message.
#[derive(Debug, Clone)]
pub struct History {
    messages: Vec<Message>,
    max_size: usize,
}

impl History {
    pub fn new(max_size: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_size: max_size.max(1),
        }
    }

    /// Appends `message`, evicting the oldest entry first if already full.
    pub fn append(&mut self, message: Message) {
        if self.messages.len() >= self.max_size {
            self.messages.remove(0);
        }
        self.messages.push(message);
    }

    /// Appends `user` and `assistant` as a single step — used by the
    /// orchestrator so a failed turn never leaves a dangling user message
    /// with no reply (§4.9).
    pub fn append_turn(&mut self, user: Message, assistant: Message) {
        self.append(user);
        self.append(assistant);
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

// ============================================================================
// AGENT CONFIGURATION
// ============================================================================

/// `think` accepts either a boolean or a named effort level (§6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ThinkSetting {
    Bool(bool),
    Level(ThinkLevel),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ThinkLevel {
    Low,
    Medium,
    High,
}

impl std::str::FromStr for ThinkLevel {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(ThinkLevel::Low),
            "medium" => Ok(ThinkLevel::Medium),
            "high" => Ok(ThinkLevel::High),
            _ => Err(()),
        }
    }
}

/// The closed set of generation parameters an agent may carry (§6).
/// Construction from a raw `{key: value}` map rejects any key outside this
/// set, and validates each present value against its range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentConfig {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub think: Option<ThinkSetting>,
    pub stream: Option<bool>,
}

const AGENT_CONFIG_KEYS: &[&str] = &["temperature", "max_tokens", "top_p", "top_k", "think", "stream"];

impl AgentConfig {
    /// Validates and converts a raw string-keyed map into an `AgentConfig`.
    /// Unknown keys and out-of-range values are rejected at construction,
    /// per the closed-key contract of §6.
    pub fn from_map(
        map: &std::collections::HashMap<String, serde_json::Value>,
    ) -> crate::Result<Self> {
        for key in map.keys() {
            if !AGENT_CONFIG_KEYS.contains(&key.as_str()) {
                return Err(Error::config(format!("unknown agent config key: {key}")));
            }
        }

        let mut config = AgentConfig::default();

        if let Some(v) = map.get("temperature") {
            let t = v
                .as_f64()
                .ok_or_else(|| Error::config("temperature must be a number"))? as f32;
            if !(0.0..=2.0).contains(&t) {
                return Err(Error::config("temperature must be between 0.0 and 2.0"));
            }
            config.temperature = Some(t);
        }

        if let Some(v) = map.get("max_tokens") {
            let n = v
                .as_u64()
                .ok_or_else(|| Error::config("max_tokens must be a positive integer"))?;
            if n == 0 {
                return Err(Error::config("max_tokens must be greater than 0"));
            }
            config.max_tokens = Some(n as u32);
        }

        if let Some(v) = map.get("top_p") {
            let p = v
                .as_f64()
                .ok_or_else(|| Error::config("top_p must be a number"))? as f32;
            if !(0.0..=1.0).contains(&p) {
                return Err(Error::config("top_p must be between 0.0 and 1.0"));
            }
            config.top_p = Some(p);
        }

        if let Some(v) = map.get("top_k") {
            let k = v
                .as_u64()
                .ok_or_else(|| Error::config("top_k must be a positive integer"))?;
            if k == 0 {
                return Err(Error::config("top_k must be greater than 0"));
            }
            config.top_k = Some(k as u32);
        }

        if let Some(v) = map.get("think") {
            config.think = Some(match v {
                serde_json::Value::Bool(b) => ThinkSetting::Bool(*b),
                serde_json::Value::String(s) => {
                    let level = s
                        .parse::<ThinkLevel>()
                        .map_err(|_| Error::config(format!("invalid think level: {s}")))?;
                    ThinkSetting::Level(level)
                }
                _ => return Err(Error::config("think must be a bool or a level string")),
            });
        }

        if let Some(v) = map.get("stream") {
            config.stream = Some(
                v.as_bool()
                    .ok_or_else(|| Error::config("stream must be a bool"))?,
            );
        }

        Ok(config)
    }
}

/// How the model should select a tool to call on the next turn (§3).
#[derive(Debug, Clone, PartialEq)]
pub enum ToolChoice {
    /// The model decides whether and which tool to call.
    Auto,
    /// Tool calling disabled for this turn.
    None,
    /// The model must call some tool.
    Required,
    /// The model must call this specific, named tool.
    Function(String),
}

impl ToolChoice {
    /// Parses a string or `{type, function{name}}`-shaped JSON value into a
    /// `ToolChoice`, validating a specific function name against the
    /// registered tool set (§2.1 supplement, grounded in the original
    /// implementation's richer `ToolChoice.from_value`).
    pub fn from_value(value: &serde_json::Value, known_tools: &[String]) -> crate::Result<Self> {
        match value {
            serde_json::Value::String(s) => match s.as_str() {
                "auto" => Ok(ToolChoice::Auto),
                "none" => Ok(ToolChoice::None),
                "required" => Ok(ToolChoice::Required),
                name => Self::validated_function(name.to_string(), known_tools),
            },
            serde_json::Value::Object(obj) => {
                let kind = obj
                    .get("type")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| Error::validation("tool_choice object missing 'type'"))?;
                if kind != "function" {
                    return Err(Error::validation(format!(
                        "unsupported tool_choice type: {kind}"
                    )));
                }
                let name = obj
                    .get("function")
                    .and_then(|f| f.get("name"))
                    .and_then(|n| n.as_str())
                    .ok_or_else(|| Error::validation("tool_choice function missing 'name'"))?
                    .to_string();
                Self::validated_function(name, known_tools)
            }
            other => Err(Error::validation(format!(
                "tool_choice must be a string or object, got: {other}"
            ))),
        }
    }

    fn validated_function(name: String, known_tools: &[String]) -> crate::Result<Self> {
        if !known_tools.iter().any(|t| t == &name) {
            return Err(Error::validation(format!("unknown tool in tool_choice: {name}")));
        }
        Ok(ToolChoice::Function(name))
    }

    /// Whether this choice is the specific-function variant.
    pub fn is_specific_function(&self) -> bool {
        matches!(self, ToolChoice::Function(_))
    }
}

// ============================================================================
// OPENAI-COMPATIBLE WIRE FORMAT
// ============================================================================

/// An OpenAI-compatible chat-completions message. `content` is a plain
/// string (no multi-modal parts — this crate has no vision support).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAIToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// A tool call as represented in the OpenAI wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: OpenAIFunction,
}

/// Function name plus arguments, the latter as a **JSON string** (an OpenAI
/// API quirk) that must be parsed before use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIFunction {
    pub name: String,
    pub arguments: String,
}

/// Request payload for the chat-completions endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct OpenAIRequest {
    pub model: String,
    pub messages: Vec<OpenAIMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,
}

/// One streamed chunk of a chat-completions response.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIChunk {
    #[allow(dead_code)]
    pub id: String,
    #[allow(dead_code)]
    pub object: String,
    #[allow(dead_code)]
    pub created: i64,
    #[allow(dead_code)]
    pub model: String,
    pub choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIChoice {
    #[allow(dead_code)]
    pub index: u32,
    pub delta: OpenAIDelta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIDelta {
    #[allow(dead_code)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAIToolCallDelta>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIToolCallDelta {
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[allow(dead_code)]
    #[serde(skip_serializing_if = "Option::is_none", rename = "type")]
    pub call_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<OpenAIFunctionDelta>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIFunctionDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}
