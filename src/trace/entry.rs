//! Trace Entry (persisted unit) and Trace Summary (derived aggregation).

use super::context::{RunType, TraceContext};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// The closed set of lifecycle moments the Trace Logger emits (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceEvent {
    #[serde(rename = "trace.start")]
    TraceStart,
    #[serde(rename = "trace.end")]
    TraceEnd,
    #[serde(rename = "tool.call")]
    ToolCall,
    #[serde(rename = "tool.result")]
    ToolResult,
    #[serde(rename = "llm.request")]
    LlmRequest,
    #[serde(rename = "llm.response")]
    LlmResponse,
    #[serde(rename = "llm.iteration.start")]
    LlmIterationStart,
    #[serde(rename = "tool.execution.start")]
    ToolExecutionStart,
    #[serde(rename = "tool.log")]
    ToolLog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Started,
    Success,
    Error,
}

/// Bound on preview-string length before truncation with an ellipsis.
pub const PREVIEW_LIMIT: usize = 500;
/// Bound on full-payload fields even at higher verbosity.
pub const MAX_PAYLOAD_LEN: usize = 10_000;

/// Truncates `s` to `limit` bytes (on a char boundary) and appends "...".
pub fn truncate_preview(s: &str, limit: usize) -> String {
    if s.len() <= limit {
        return s.to_string();
    }
    let mut end = limit;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

/// One record in the trace store. Required fields are always present;
/// optional fields are omitted from serialization (never emitted as null)
/// so files stay compact (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    pub timestamp: DateTime<Utc>,
    pub trace_id: String,
    pub run_id: String,
    pub run_type: String,
    pub operation: String,
    pub event: TraceEvent,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_stack: Option<String>,

    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub metadata: HashMap<String, Value>,
}

impl TraceEntry {
    /// Builds the required fields from a [`TraceContext`] and `event`,
    /// copying hierarchy fields across. Optional payload fields start
    /// unset; callers attach them with the `with_*` methods.
    pub fn new(ctx: &TraceContext, event: TraceEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            trace_id: ctx.trace_id.clone(),
            run_id: ctx.run_id.clone(),
            run_type: ctx.run_type.as_str().to_string(),
            operation: ctx.operation.clone(),
            event,
            parent_run_id: ctx.parent_run_id.clone(),
            session_id: ctx.session_id.clone(),
            agent_name: ctx.agent_name.clone(),
            model: ctx.model.clone(),
            status: None,
            inputs: None,
            outputs: None,
            data: None,
            duration_ms: None,
            input_tokens: None,
            output_tokens: None,
            total_tokens: None,
            cost_usd: None,
            error_message: None,
            error_type: None,
            error_stack: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_status(mut self, status: RunStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_inputs(mut self, inputs: Value) -> Self {
        self.inputs = Some(inputs);
        self
    }

    pub fn with_outputs(mut self, outputs: Value) -> Self {
        self.outputs = Some(outputs);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }

    pub fn with_tokens(mut self, input: u64, output: u64) -> Self {
        self.input_tokens = Some(input);
        self.output_tokens = Some(output);
        self.total_tokens = Some(input + output);
        self
    }

    pub fn with_error(mut self, error_type: impl Into<String>, message: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self.error_message = Some(message.into());
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Derived aggregation of every entry sharing one `trace_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceSummary {
    pub trace_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_duration_ms: u64,
    pub terminal_status: Option<RunStatus>,
    pub run_count: usize,
    pub tool_call_count: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub cost_usd: f64,
    pub error_count: usize,
    pub entries: Vec<TraceEntry>,
}

impl TraceSummary {
    /// Summarizes `entries`, which must all share one `trace_id`
    /// (§2.1 supplement). Returns `None` for an empty slice.
    pub fn summarize(entries: &[TraceEntry]) -> Option<Self> {
        let first = entries.first()?;
        let trace_id = first.trace_id.clone();

        let start_time = entries.iter().map(|e| e.timestamp).min()?;
        let end_time = entries.iter().map(|e| e.timestamp).max()?;

        let terminal_status = entries
            .iter()
            .rev()
            .find(|e| e.event == TraceEvent::TraceEnd)
            .and_then(|e| e.status);

        let run_count = entries
            .iter()
            .map(|e| e.run_id.as_str())
            .collect::<std::collections::HashSet<_>>()
            .len();

        let tool_call_count = entries
            .iter()
            .filter(|e| e.event == TraceEvent::ToolCall)
            .count();

        let input_tokens = entries.iter().filter_map(|e| e.input_tokens).sum();
        let output_tokens = entries.iter().filter_map(|e| e.output_tokens).sum();
        let total_tokens = entries.iter().filter_map(|e| e.total_tokens).sum();
        let cost_usd = entries.iter().filter_map(|e| e.cost_usd).sum();
        let error_count = entries
            .iter()
            .filter(|e| e.status == Some(RunStatus::Error))
            .count();

        let total_duration_ms = entries
            .iter()
            .filter(|e| e.event == TraceEvent::TraceEnd)
            .filter_map(|e| e.duration_ms)
            .max()
            .unwrap_or_else(|| (end_time - start_time).num_milliseconds().max(0) as u64);

        Some(Self {
            trace_id,
            start_time,
            end_time,
            total_duration_ms,
            terminal_status,
            run_count,
            tool_call_count,
            input_tokens,
            output_tokens,
            total_tokens,
            cost_usd,
            error_count,
            entries: entries.to_vec(),
        })
    }
}
