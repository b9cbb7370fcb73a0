//! Trace Logger (C3): translates orchestrator life-cycle moments into both
//! a human-readable `tracing` log line and a [`TraceEntry`], forwarding the
//! latter to a [`TraceStore`]. Store failures are swallowed here so tracing
//! stays best-effort (§4.2).

use super::context::TraceContext;
use super::entry::{truncate_preview, RunStatus, TraceEntry, TraceEvent, PREVIEW_LIMIT};
use super::store::TraceStore;
use serde_json::Value;
use std::sync::Arc;

/// Redacts values under commonly sensitive keys before they reach a log
/// line or a persisted entry (§2.1 supplement). Best-effort, not a security
/// boundary: it catches the obvious key names, not encoded secrets.
const SENSITIVE_KEYS: &[&str] = &["api_key", "authorization", "password", "token", "secret"];

pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = serde_json::Map::new();
            for (k, v) in map {
                if SENSITIVE_KEYS.iter().any(|s| k.to_lowercase().contains(s)) {
                    redacted.insert(k.clone(), Value::String("[redacted]".to_string()));
                } else {
                    redacted.insert(k.clone(), redact(v));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}

pub struct TraceLogger {
    store: Arc<dyn TraceStore>,
}

impl TraceLogger {
    pub fn new(store: Arc<dyn TraceStore>) -> Self {
        Self { store }
    }

    async fn save(&self, entry: TraceEntry) {
        if let Err(err) = self.store.save(entry).await {
            tracing::warn!(error = %err, "trace store save failed, dropping entry");
        }
    }

    pub async fn trace_start(&self, ctx: &TraceContext, inputs: Option<Value>) {
        tracing::info!(
            trace_id = %ctx.trace_id,
            run_id = %ctx.run_id,
            operation = %ctx.operation,
            "\u{1F680} trace.start"
        );
        let mut entry = TraceEntry::new(ctx, TraceEvent::TraceStart).with_status(RunStatus::Started);
        if let Some(inputs) = inputs {
            entry = entry.with_inputs(redact(&inputs));
        }
        self.save(entry).await;
    }

    pub async fn trace_end(
        &self,
        ctx: &TraceContext,
        outputs: Option<Value>,
        duration_ms: u64,
        error: Option<(&str, &str)>,
    ) {
        let status = if error.is_some() {
            RunStatus::Error
        } else {
            RunStatus::Success
        };
        if let Some((error_type, message)) = error {
            tracing::error!(
                trace_id = %ctx.trace_id,
                run_id = %ctx.run_id,
                error_type,
                message,
                "\u{274C} trace.end"
            );
        } else {
            tracing::info!(trace_id = %ctx.trace_id, run_id = %ctx.run_id, duration_ms, "\u{2705} trace.end");
        }

        let mut entry = TraceEntry::new(ctx, TraceEvent::TraceEnd)
            .with_status(status)
            .with_duration_ms(duration_ms);
        if let Some(outputs) = outputs {
            entry = entry.with_outputs(redact(&outputs));
        }
        if let Some((error_type, message)) = error {
            entry = entry.with_error(error_type, message);
        }
        self.save(entry).await;
    }

    pub async fn tool_call(&self, ctx: &TraceContext, tool_name: &str, tool_call_id: &str, inputs: Value) {
        tracing::info!(tool_name, tool_call_id, "\u{1F527} tool.call");
        let entry = TraceEntry::new(ctx, TraceEvent::ToolCall).with_data(serde_json::json!({
            "tool_name": tool_name,
            "tool_call_id": tool_call_id,
            "inputs": redact(&inputs),
        }));
        self.save(entry).await;
    }

    pub async fn tool_result(
        &self,
        ctx: &TraceContext,
        tool_name: &str,
        tool_call_id: &str,
        result_preview: &str,
        duration_ms: u64,
        success: bool,
    ) {
        let preview = truncate_preview(result_preview, PREVIEW_LIMIT);
        tracing::info!(tool_name, tool_call_id, success, duration_ms, "\u{1F3C1} tool.result");
        let status = if success { RunStatus::Success } else { RunStatus::Error };
        let entry = TraceEntry::new(ctx, TraceEvent::ToolResult)
            .with_status(status)
            .with_duration_ms(duration_ms)
            .with_data(serde_json::json!({
                "tool_name": tool_name,
                "tool_call_id": tool_call_id,
                "result_preview": preview,
            }));
        self.save(entry).await;
    }

    pub async fn llm_request(&self, ctx: &TraceContext, model: &str, messages_count: usize, tools_available: Option<usize>) {
        tracing::info!(model, messages_count, "\u{1F4E4} llm.request");
        let entry = TraceEntry::new(ctx, TraceEvent::LlmRequest).with_data(serde_json::json!({
            "model": model,
            "messages_count": messages_count,
            "tools_available": tools_available,
        }));
        self.save(entry).await;
    }

    pub async fn llm_response(
        &self,
        ctx: &TraceContext,
        model: &str,
        response_preview: &str,
        has_tool_calls: bool,
        tool_calls_count: usize,
        tokens: Option<(u64, u64)>,
        duration_ms: u64,
    ) {
        tracing::info!(model, has_tool_calls, tool_calls_count, duration_ms, "\u{1F4E5} llm.response");
        let mut entry = TraceEntry::new(ctx, TraceEvent::LlmResponse)
            .with_duration_ms(duration_ms)
            .with_data(serde_json::json!({
                "model": model,
                "response_preview": truncate_preview(response_preview, PREVIEW_LIMIT),
                "has_tool_calls": has_tool_calls,
                "tool_calls_count": tool_calls_count,
            }));
        if let Some((input, output)) = tokens {
            entry = entry.with_tokens(input, output);
        }
        self.save(entry).await;
    }

    pub async fn llm_iteration_start(&self, ctx: &TraceContext, iteration: u32, max_iterations: u32) {
        tracing::info!(iteration, max_iterations, "\u{1F501} llm.iteration.start");
        let entry = TraceEntry::new(ctx, TraceEvent::LlmIterationStart).with_data(serde_json::json!({
            "iteration": iteration,
            "max_iterations": max_iterations,
        }));
        self.save(entry).await;
    }

    pub async fn tool_execution_start(&self, ctx: &TraceContext, tool_names: &[String]) {
        tracing::info!(tool_count = tool_names.len(), "\u{26A1} tool.execution.start");
        let entry = TraceEntry::new(ctx, TraceEvent::ToolExecutionStart).with_data(serde_json::json!({
            "tool_count": tool_names.len(),
            "tool_names": tool_names,
        }));
        self.save(entry).await;
    }

    pub async fn tool_log(&self, ctx: &TraceContext, level: &str, message: &str) {
        tracing::info!(level, message, "\u{1F4DD} tool.log");
        let entry = TraceEntry::new(ctx, TraceEvent::ToolLog).with_data(serde_json::json!({
            "level": level,
            "message": message,
        }));
        self.save(entry).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::context::RunType;
    use crate::trace::store::InMemoryTraceStore;

    #[test]
    fn test_redact_masks_sensitive_keys() {
        let value = serde_json::json!({"api_key": "sk-abc", "query": "hello"});
        let redacted = redact(&value);
        assert_eq!(redacted["api_key"], "[redacted]");
        assert_eq!(redacted["query"], "hello");
    }

    #[tokio::test]
    async fn test_trace_start_and_end_persist_entries() {
        let store = Arc::new(InMemoryTraceStore::new(10));
        let logger = TraceLogger::new(store.clone());
        let ctx = TraceContext::create_root(RunType::Chat, "chat", None, None, None);

        logger.trace_start(&ctx, Some(serde_json::json!({"message": "hi"}))).await;
        logger.trace_end(&ctx, Some(serde_json::json!("done")), 42, None).await;

        let entries = store.get(&ctx.trace_id).await.unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn test_tool_result_records_error_status() {
        let store = Arc::new(InMemoryTraceStore::new(10));
        let logger = TraceLogger::new(store.clone());
        let ctx = TraceContext::create_root(RunType::Tool, "tool.div", None, None, None);

        logger.tool_result(&ctx, "div", "call_1", "division by zero", 5, false).await;
        let entries = store.get(&ctx.trace_id).await.unwrap();
        assert_eq!(entries[0].status, Some(RunStatus::Error));
    }
}
