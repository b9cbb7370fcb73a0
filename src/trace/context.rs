//! Trace Context (C1): an immutable per-operation identifier, propagated
//! ambiently through the current logical task via `tokio::task_local!` —
//! the systems-language analogue of a `contextvars.ContextVar`.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use uuid::Uuid;

/// What kind of unit of work a [`TraceContext`] identifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunType {
    Chat,
    Llm,
    Tool,
    Chain,
    Agent,
}

impl RunType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunType::Chat => "chat",
            RunType::Llm => "llm",
            RunType::Tool => "tool",
            RunType::Chain => "chain",
            RunType::Agent => "agent",
        }
    }
}

/// Immutable identity of one traced operation. Stable `trace_id` across a
/// whole turn; fresh `run_id` per operation; `parent_run_id` links children
/// to their parent, forming a DAG (never a cycle).
#[derive(Debug, Clone)]
pub struct TraceContext {
    pub trace_id: String,
    pub run_id: String,
    pub parent_run_id: Option<String>,
    pub run_type: RunType,
    pub operation: String,
    pub session_id: Option<String>,
    pub agent_name: Option<String>,
    pub model: Option<String>,
    pub metadata: HashMap<String, Value>,
    pub start_time: DateTime<Utc>,
}

tokio::task_local! {
    static AMBIENT: TraceContext;
}

impl TraceContext {
    /// Starts a new trace: fresh `trace_id` and `run_id`, no parent.
    pub fn create_root(
        run_type: RunType,
        operation: impl Into<String>,
        session_id: Option<String>,
        agent_name: Option<String>,
        model: Option<String>,
    ) -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string(),
            run_id: Uuid::new_v4().to_string(),
            parent_run_id: None,
            run_type,
            operation: operation.into(),
            session_id,
            agent_name,
            model,
            metadata: HashMap::new(),
            start_time: Utc::now(),
        }
    }

    /// Derives a child context: inherits `trace_id`/`session_id`/
    /// `agent_name`/`model` from `self`, gets a fresh `run_id`, and points
    /// `parent_run_id` at `self.run_id`.
    pub fn create_child(&self, run_type: RunType, operation: impl Into<String>) -> Self {
        self.create_child_with_metadata(run_type, operation, HashMap::new())
    }

    pub fn create_child_with_metadata(
        &self,
        run_type: RunType,
        operation: impl Into<String>,
        metadata: HashMap<String, Value>,
    ) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            run_id: Uuid::new_v4().to_string(),
            parent_run_id: Some(self.run_id.clone()),
            run_type,
            operation: operation.into(),
            session_id: self.session_id.clone(),
            agent_name: self.agent_name.clone(),
            model: self.model.clone(),
            metadata,
            start_time: Utc::now(),
        }
    }

    /// Runs `body` with `self` bound as the ambient context, for as long
    /// as `body`'s future runs — including across suspension points — then
    /// restores the previous ambient context on every exit path.
    pub async fn with_ambient<F, T>(self, body: F) -> T
    where
        F: Future<Output = T>,
    {
        AMBIENT.scope(self, body).await
    }

    /// The ambient context visible to the currently executing task, if any.
    pub fn current() -> Option<TraceContext> {
        AMBIENT.try_with(|ctx| ctx.clone()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_root_has_no_parent() {
        let ctx = TraceContext::create_root(RunType::Chat, "chat", None, None, None);
        assert!(ctx.parent_run_id.is_none());
    }

    #[test]
    fn test_create_child_inherits_trace_id() {
        let root = TraceContext::create_root(
            RunType::Chat,
            "chat",
            Some("sess-1".into()),
            Some("assistant".into()),
            Some("gpt-4".into()),
        );
        let child = root.create_child(RunType::Llm, "llm.call");
        assert_eq!(child.trace_id, root.trace_id);
        assert_eq!(child.parent_run_id, Some(root.run_id.clone()));
        assert_ne!(child.run_id, root.run_id);
        assert_eq!(child.session_id, root.session_id);
        assert_eq!(child.agent_name, root.agent_name);
        assert_eq!(child.model, root.model);
    }

    #[tokio::test]
    async fn test_current_is_none_outside_ambient_scope() {
        assert!(TraceContext::current().is_none());
    }

    #[tokio::test]
    async fn test_with_ambient_exposes_current() {
        let ctx = TraceContext::create_root(RunType::Chat, "chat", None, None, None);
        let run_id = ctx.run_id.clone();
        ctx.with_ambient(async move {
            let current = TraceContext::current().expect("ambient context set");
            assert_eq!(current.run_id, run_id);
        })
        .await;
        assert!(TraceContext::current().is_none());
    }

    #[tokio::test]
    async fn test_nested_ambient_restores_parent() {
        let outer = TraceContext::create_root(RunType::Chat, "chat", None, None, None);
        let outer_run_id = outer.run_id.clone();
        let inner = outer.create_child(RunType::Tool, "tool.add");

        outer
            .clone()
            .with_ambient(async move {
                inner
                    .with_ambient(async {
                        let current = TraceContext::current().unwrap();
                        assert_eq!(current.operation, "tool.add");
                    })
                    .await;
                let restored = TraceContext::current().unwrap();
                assert_eq!(restored.run_id, outer_run_id);
            })
            .await;
    }
}
