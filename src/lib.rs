//! # agent-runtime
//!
//! An orchestration runtime for tool-calling LLM agents: a provider-agnostic
//! chat loop, bounded retry and per-provider concurrency limiting, and a
//! hierarchical trace of every step a turn takes.
//!
//! ## What this crate is
//!
//! Four subsystems, composed around one entry point, [`chat()`]:
//!
//! 1. **Agent orchestration** ([`orchestrator`]) — assembles a turn's
//!    messages, runs the tool-calling loop, and updates conversation history
//!    transactionally.
//! 2. **Tool execution** ([`registry`], [`injector`], [`executor`]) —
//!    validates model-supplied arguments against a tool's schema, fills
//!    injected parameters, and runs tool calls with bounded parallelism.
//! 3. **Resilience** ([`rate_limiter`], [`retry`]) — a semaphore per
//!    provider plus exponential backoff with jitter, honoring `Retry-After`
//!    hints.
//! 4. **Tracing** ([`trace`]) — an ambient [`trace::TraceContext`] carried
//!    through every asynchronous step, persisted through a pluggable
//!    [`trace::TraceStore`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use agent_runtime::{chat, tool, Agent, AgentRuntime, Provider};
//!
//! #[tokio::main]
//! async fn main() -> agent_runtime::Result<()> {
//!     let runtime = AgentRuntime::default();
//!     let mut agent = Agent::builder(Provider::Ollama, "llama3")
//!         .instructions("Be terse.")
//!         .tool(tool("add", "adds two numbers")
//!             .param("a", "number")
//!             .param("b", "number")
//!             .build(|args| async move {
//!                 let a = args["a"].as_f64().unwrap_or_default();
//!                 let b = args["b"].as_f64().unwrap_or_default();
//!                 Ok(serde_json::json!(a + b))
//!             }))
//!         .build()?;
//!
//!     match chat(&runtime, &mut agent, "what is 2 + 3?", None).await? {
//!         agent_runtime::ChatOutcome::Complete(text) => println!("{text}"),
//!         agent_runtime::ChatOutcome::Streaming(_) => {}
//!     }
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod executor;
mod injector;
mod metrics;
mod orchestrator;
pub mod provider;
mod rate_limiter;
mod registry;
pub mod retry;
mod tools;
pub mod trace;
mod types;
mod utils;

// --- Provider configuration ---

pub use config::{resilience_enabled, Provider, ProviderSettings};

// --- Error handling ---

pub use error::{Error, Result};

// --- Tool execution ---

pub use executor::{ToolCallRequest, ToolExecutor, ToolExecutionResult};
pub use injector::AgentStateSnapshot;
pub use metrics::{ChatMetric, MetricsRecorder};
pub use rate_limiter::{OwnedRateLimiterPermit, RateLimiter, RateLimiterRegistry, RateLimiterStats};
pub use registry::ToolRegistry;

// --- Tool system ---

pub use tools::{tool, InjectedMarker, Tool, ToolBuilder};

// --- Core types ---

pub use types::{
    AgentConfig, ContentBlock, History, Message, MessageRole, TextBlock, ThinkLevel, ThinkSetting,
    ToolChoice, ToolResultBlock, ToolUseBlock,
};

// --- Orchestrator ---

pub use orchestrator::{chat, Agent, AgentBuilder, AgentRuntime};
pub use provider::ChatOutcome;

/// Convenience module bundling the types a typical caller needs.
///
/// ```rust
/// use agent_runtime::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        chat, tool, Agent, AgentBuilder, AgentRuntime, ChatOutcome, ContentBlock, Error, Message,
        MessageRole, Provider, Result, Tool, ToolChoice,
    };
}
