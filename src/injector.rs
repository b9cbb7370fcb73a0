//! Argument Injector (C7): fills tool parameters marked as injected from
//! the ambient call context rather than from the LLM's JSON arguments.
//! Applied after validation (§4.6).

use crate::tools::{InjectedMarker, Tool};
use crate::trace::TraceContext;
use serde_json::Value;

/// A snapshot of agent-visible state handed to a tool whose parameter
/// declares [`InjectedMarker::State`].
#[derive(Debug, Clone, Default)]
pub struct AgentStateSnapshot {
    pub agent_name: Option<String>,
    pub model: Option<String>,
    pub history_len: usize,
}

/// The ambient values one tool invocation may draw from.
pub struct InjectionContext<'a> {
    pub tool_call_id: &'a str,
    pub agent_state: Option<&'a AgentStateSnapshot>,
    pub trace_context: Option<&'a TraceContext>,
}

/// A logger bound to the ambient [`TraceContext`], handed to a tool whose
/// parameter declares [`InjectedMarker::Logger`]. Calling `log` emits a
/// `tool.log` entry once wired to a [`crate::trace::TraceLogger`] by the
/// executor; here it carries only the identity the tool needs to attribute
/// its log lines.
#[derive(Debug, Clone)]
pub struct ToolLogger {
    pub trace_id: Option<String>,
    pub run_id: Option<String>,
}

/// Merges LLM-supplied `arguments` (already validated) with each of
/// `tool`'s injected parameters, filled from `ctx`. LLM-supplied values for
/// injected parameter names are overwritten, never trusted — after
/// injection, injected keys are guaranteed present regardless of what the
/// model sent (§3's "no overlap" invariant).
///
/// Idempotent: injecting twice over the same validated arguments with the
/// same context produces byte-identical output (§8).
pub fn inject_arguments(tool: &Tool, arguments: Value, ctx: &InjectionContext<'_>) -> Value {
    let mut obj = match arguments {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };

    for (param_name, marker) in tool.injected_params() {
        let value = match marker {
            InjectedMarker::ToolCallId => Value::String(ctx.tool_call_id.to_string()),
            InjectedMarker::State => ctx
                .agent_state
                .map(|state| {
                    serde_json::json!({
                        "agent_name": state.agent_name,
                        "model": state.model,
                        "history_len": state.history_len,
                    })
                })
                .unwrap_or(Value::Null),
            InjectedMarker::Logger => {
                let logger = ToolLogger {
                    trace_id: ctx.trace_context.map(|c| c.trace_id.clone()),
                    run_id: ctx.trace_context.map(|c| c.run_id.clone()),
                };
                serde_json::to_value(logger).unwrap_or(Value::Null)
            }
        };
        obj.insert(param_name.clone(), value);
    }

    Value::Object(obj)
}

impl serde::Serialize for ToolLogger {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("trace_id", &self.trace_id)?;
        map.serialize_entry("run_id", &self.run_id)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tool;
    use crate::trace::{RunType, TraceContext};
    use serde_json::json;

    fn tool_with_injections() -> Tool {
        tool("log_event", "logs an event")
            .param("message", "string")
            .injected("call_id", InjectedMarker::ToolCallId)
            .injected("state", InjectedMarker::State)
            .build(|_| async { Ok(json!({})) })
    }

    #[test]
    fn test_inject_fills_tool_call_id() {
        let t = tool_with_injections();
        let ctx = InjectionContext {
            tool_call_id: "call_123",
            agent_state: None,
            trace_context: None,
        };
        let result = inject_arguments(&t, json!({"message": "hi"}), &ctx);
        assert_eq!(result["call_id"], "call_123");
        assert_eq!(result["message"], "hi");
    }

    #[test]
    fn test_inject_overrides_llm_supplied_value() {
        let t = tool_with_injections();
        let ctx = InjectionContext {
            tool_call_id: "real-id",
            agent_state: None,
            trace_context: None,
        };
        let result = inject_arguments(&t, json!({"message": "hi", "call_id": "fake"}), &ctx);
        assert_eq!(result["call_id"], "real-id");
    }

    #[test]
    fn test_inject_is_idempotent() {
        let t = tool_with_injections();
        let state = AgentStateSnapshot {
            agent_name: Some("assistant".into()),
            model: Some("gpt-4".into()),
            history_len: 3,
        };
        let ctx = InjectionContext {
            tool_call_id: "call_1",
            agent_state: Some(&state),
            trace_context: None,
        };
        let once = inject_arguments(&t, json!({"message": "hi"}), &ctx);
        let twice = inject_arguments(&t, once.clone(), &ctx);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_inject_logger_from_trace_context() {
        let t = tool("log_event", "logs")
            .injected("log", InjectedMarker::Logger)
            .build(|_| async { Ok(json!({})) });
        let trace_ctx = TraceContext::create_root(RunType::Tool, "tool.log_event", None, None, None);
        let ctx = InjectionContext {
            tool_call_id: "call_1",
            agent_state: None,
            trace_context: Some(&trace_ctx),
        };
        let result = inject_arguments(&t, json!({}), &ctx);
        assert_eq!(result["log"]["trace_id"], trace_ctx.trace_id);
    }
}
