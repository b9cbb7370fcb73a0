//! Tool Executor (C8): resolves, validates, injects, and invokes one tool
//! call inside its own child trace context, and fans parallel calls out
//! while preserving input order (§4.7).

use crate::injector::{inject_arguments, AgentStateSnapshot, InjectionContext};
use crate::registry::ToolRegistry;
use crate::trace::{RunType, TraceContext, TraceLogger};
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// One tool call as requested by the model.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub tool_call_id: String,
    pub tool_name: String,
    pub arguments: Value,
}

/// Outcome of one tool invocation. Never constructed from a propagating
/// error — the executor always produces a `Result`, `success=false` on
/// failure (§4.7's "MUST NOT throw").
#[derive(Debug, Clone)]
pub struct ToolExecutionResult {
    pub tool_call_id: String,
    pub tool_name: String,
    pub success: bool,
    pub value: Option<Value>,
    pub error: Option<String>,
    pub execution_time_ms: u64,
}

impl ToolExecutionResult {
    /// Formats this result as the string content of the `tool` message fed
    /// back to the model. Failures are always prefixed `Error:` so the model
    /// can see and react to them (§4.8 step f); the full phrasing otherwise
    /// follows the original implementation's convention (§2.1 supplement).
    pub fn to_llm_message(&self) -> String {
        if self.success {
            let result = self
                .value
                .as_ref()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .unwrap_or_default();
            format!("Tool '{}' executed successfully:\n{}", self.tool_name, result)
        } else {
            format!(
                "Error: Tool '{}' failed with error: {}",
                self.tool_name,
                self.error.as_deref().unwrap_or("tool execution failed")
            )
        }
    }
}

pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    logger: Arc<TraceLogger>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, logger: Arc<TraceLogger>) -> Self {
        Self { registry, logger }
    }

    /// Runs one tool call inside a child trace context of `parent_ctx`
    /// (§4.7 steps 1-6).
    pub async fn execute(
        &self,
        parent_ctx: &TraceContext,
        request: ToolCallRequest,
        agent_state: Option<&AgentStateSnapshot>,
    ) -> ToolExecutionResult {
        let child_ctx = parent_ctx.create_child(RunType::Tool, format!("tool.{}", request.tool_name));

        self.logger
            .tool_call(&child_ctx, &request.tool_name, &request.tool_call_id, request.arguments.clone())
            .await;

        let started = Instant::now();
        let outcome = child_ctx
            .clone()
            .with_ambient(self.run_one(&child_ctx, &request, agent_state))
            .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(value) => ToolExecutionResult {
                tool_call_id: request.tool_call_id,
                tool_name: request.tool_name,
                success: true,
                value: Some(value),
                error: None,
                execution_time_ms: elapsed_ms,
            },
            Err(message) => ToolExecutionResult {
                tool_call_id: request.tool_call_id,
                tool_name: request.tool_name,
                success: false,
                value: None,
                error: Some(message),
                execution_time_ms: elapsed_ms,
            },
        };

        let preview = result
            .value
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_else(|| result.error.clone().unwrap_or_default());
        self.logger
            .tool_result(
                &child_ctx,
                &result.tool_name,
                &result.tool_call_id,
                &preview,
                elapsed_ms,
                result.success,
            )
            .await;

        result
    }

    async fn run_one(
        &self,
        child_ctx: &TraceContext,
        request: &ToolCallRequest,
        agent_state: Option<&AgentStateSnapshot>,
    ) -> Result<Value, String> {
        let tool = self
            .registry
            .validate(&request.tool_name, &request.arguments)
            .map_err(|e| e.to_string())?;

        let injection_ctx = InjectionContext {
            tool_call_id: &request.tool_call_id,
            agent_state,
            trace_context: Some(child_ctx),
        };
        let injected = inject_arguments(tool, request.arguments.clone(), &injection_ctx);

        tool.execute(injected).await.map_err(|e| e.to_string())
    }

    /// Runs every call in `calls`. When `parallel` is true, fans them out
    /// concurrently and collects results preserving input order without
    /// cancelling siblings on one failure; when false, runs sequentially,
    /// continuing past one call's failure (§4.7).
    pub async fn execute_many(
        &self,
        parent_ctx: &TraceContext,
        calls: Vec<ToolCallRequest>,
        agent_state: Option<&AgentStateSnapshot>,
        parallel: bool,
    ) -> Vec<ToolExecutionResult> {
        let tool_names: Vec<String> = calls.iter().map(|c| c.tool_name.clone()).collect();
        self.logger.tool_execution_start(parent_ctx, &tool_names).await;

        if parallel {
            let futures = calls
                .into_iter()
                .map(|call| self.execute(parent_ctx, call, agent_state));
            join_all(futures).await
        } else {
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                results.push(self.execute(parent_ctx, call, agent_state).await);
            }
            results
        }
    }
}
