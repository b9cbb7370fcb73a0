//! Agent Orchestrator (C10) and Conversation State (C11): the top-level
//! `chat()` entry point, the `Agent` it turns against, and the process-wide
//! facilities (trace store, rate limiters, metrics) that every agent shares
//! (§4.9, §5's "shared resources").

use crate::config::{resilience_enabled, Provider, ProviderSettings};
use crate::executor::ToolExecutor;
use crate::injector::AgentStateSnapshot;
use crate::metrics::MetricsRecorder;
use crate::provider::ollama::OllamaProvider;
use crate::provider::openai::OpenAiProvider;
use crate::provider::{run_chat_loop, ChatLoopDeps, ChatOutcome, ProviderClient};
use crate::rate_limiter::RateLimiterRegistry;
use crate::registry::ToolRegistry;
use crate::retry::RetryConfig;
use crate::tools::Tool;
use crate::trace::{InMemoryTraceStore, RunType, TraceContext, TraceLogger, TraceStore};
use crate::types::{AgentConfig, History, Message, ToolChoice};
use crate::{Error, Result};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Facilities shared across every [`Agent`] in a process: the trace store
/// and logger, one rate limiter per provider, and the metrics recorder
/// (§5's shared-resource rules — a rate limiter is shared across all turns
/// targeting the same provider regardless of which agent issues them).
pub struct AgentRuntime {
    pub logger: Arc<TraceLogger>,
    pub rate_limiters: RateLimiterRegistry,
    pub metrics: Arc<MetricsRecorder>,
}

impl AgentRuntime {
    pub fn new(trace_store: Arc<dyn TraceStore>) -> Self {
        Self {
            logger: Arc::new(TraceLogger::new(trace_store)),
            rate_limiters: RateLimiterRegistry::new(),
            metrics: Arc::new(MetricsRecorder::default()),
        }
    }
}

impl Default for AgentRuntime {
    fn default() -> Self {
        Self::new(Arc::new(InMemoryTraceStore::new(1000)))
    }
}

/// Conversation state for one agent: identity, tool registry, bounded
/// history, and the resolved provider client it turns against (§3's Agent,
/// §4.10). `history` is held behind a lock rather than owned directly: a
/// streamed turn's bookkeeping completes on whatever task drains the
/// returned stream, which runs after `chat()` itself has already returned
/// its borrow of `agent` (§4.8.2).
pub struct Agent {
    provider: Provider,
    model: String,
    name: Option<String>,
    instructions: Option<String>,
    config: AgentConfig,
    registry: Arc<ToolRegistry>,
    client: Arc<dyn ProviderClient>,
    settings: ProviderSettings,
    history: Arc<Mutex<History>>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("name", &self.name)
            .field("instructions", &self.instructions)
            .field("config", &self.config)
            .field("settings", &self.settings)
            .field("history", &self.history)
            .finish_non_exhaustive()
    }
}

impl Agent {
    pub fn builder(provider: Provider, model: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(provider, model)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn history(&self) -> MutexGuard<'_, History> {
        self.history.lock().expect("history lock poisoned")
    }

    /// Drops all conversation history. Does not affect registered tools or
    /// configuration.
    pub fn clear_history(&mut self) {
        self.history.lock().expect("history lock poisoned").clear();
    }
}

/// Fluent builder for [`Agent`], validating its closed-key config and
/// resolving provider settings once at construction (§4.10's "config
/// validation is done once at Agent construction").
pub struct AgentBuilder {
    provider: Provider,
    model: String,
    name: Option<String>,
    instructions: Option<String>,
    config: HashMap<String, Value>,
    tools: Vec<Tool>,
    history_max_size: usize,
    base_url: Option<String>,
}

const DEFAULT_HISTORY_MAX_SIZE: usize = 50;

impl AgentBuilder {
    pub fn new(provider: Provider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            name: None,
            instructions: None,
            config: HashMap::new(),
            tools: Vec::new(),
            history_max_size: DEFAULT_HISTORY_MAX_SIZE,
            base_url: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Sets one entry of the closed Agent-config key set (§6): `temperature`,
    /// `max_tokens`, `top_p`, `top_k`, `think`, `stream`. Unknown keys are
    /// rejected in [`Self::build`], not here.
    pub fn config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn tool(mut self, tool: Tool) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn history_max_size(mut self, max_size: usize) -> Self {
        self.history_max_size = max_size;
        self
    }

    /// Overrides the provider's conventional default base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn build(self) -> Result<Agent> {
        let config = AgentConfig::from_map(&self.config)?;

        let mut registry = ToolRegistry::new();
        for tool in self.tools {
            registry.register_agent(tool)?;
        }

        let settings = ProviderSettings::resolve(self.provider);
        let base_url = self
            .base_url
            .unwrap_or_else(|| self.provider.default_url().to_string());

        let client: Arc<dyn ProviderClient> = match self.provider {
            Provider::OpenAI => Arc::new(OpenAiProvider::new(
                self.model.clone(),
                base_url,
                settings.api_key.clone(),
                settings.timeout,
            )?),
            Provider::Ollama => Arc::new(OllamaProvider::new(self.model.clone(), base_url, settings.timeout)?),
        };

        Ok(Agent {
            provider: self.provider,
            model: self.model,
            name: self.name,
            instructions: self.instructions,
            config,
            registry: Arc::new(registry),
            client,
            settings,
            history: Arc::new(Mutex::new(History::new(self.history_max_size))),
        })
    }
}

/// Entry operation: receives a user message, assembles history and
/// instructions, and runs the tool-calling loop against `agent`'s provider
/// (§4.9). History and the root trace span are finalized inside the loop
/// itself, since a streamed turn only really finishes once its caller has
/// drained the last token — by then `chat()`'s own stack frame is gone
/// (§4.8.2). On failure before any of that happens, the error is wrapped in
/// [`Error::ChatException`] and history is left untouched.
pub async fn chat(
    runtime: &AgentRuntime,
    agent: &mut Agent,
    user_message: &str,
    tool_choice: Option<ToolChoice>,
) -> Result<ChatOutcome> {
    if user_message.trim().is_empty() {
        return Err(Error::validation("user_message must not be empty"));
    }

    let root_ctx = TraceContext::create_root(
        RunType::Chat,
        "chat",
        None,
        agent.name.clone(),
        Some(agent.model.clone()),
    );
    runtime
        .logger
        .trace_start(&root_ctx, Some(json!({"user_message": user_message})))
        .await;
    let started = Instant::now();

    match run_turn(runtime, agent, user_message, tool_choice, &root_ctx, started).await {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            let wrapped = err.into_chat_exception();
            let message = wrapped.to_string();
            let elapsed_ms = started.elapsed().as_millis() as u64;
            runtime
                .logger
                .trace_end(&root_ctx, None, elapsed_ms, Some(("ChatException", message.as_str())))
                .await;
            Err(wrapped)
        }
    }
}

async fn run_turn(
    runtime: &AgentRuntime,
    agent: &Agent,
    user_message: &str,
    tool_choice: Option<ToolChoice>,
    root_ctx: &TraceContext,
    started: Instant,
) -> Result<ChatOutcome> {
    let user_msg = Message::user(user_message);
    let (mut messages, history_len) = {
        let history = agent.history();
        (history.snapshot(), history.len())
    };
    messages.push(user_msg.clone());

    let rate_limiter = runtime
        .rate_limiters
        .get_or_create(agent.provider, agent.settings.max_concurrent_requests)
        .await;
    let executor = ToolExecutor::new(agent.registry.clone(), runtime.logger.clone());

    let retry_config = if resilience_enabled() {
        RetryConfig::new().with_max_attempts(agent.settings.max_retries + 1)
    } else {
        RetryConfig::new().with_max_attempts(1)
    };

    let deps = ChatLoopDeps {
        client: agent.client.as_ref(),
        registry: &agent.registry,
        executor: &executor,
        logger: runtime.logger.clone(),
        rate_limiter,
        metrics: runtime.metrics.clone(),
        retry_config,
    };

    let agent_state = AgentStateSnapshot {
        agent_name: agent.name.clone(),
        model: Some(agent.model.clone()),
        history_len,
    };

    run_chat_loop(
        &deps,
        &agent.config,
        agent.instructions.as_deref(),
        messages,
        tool_choice.unwrap_or(ToolChoice::Auto),
        root_ctx,
        agent.settings.max_tool_iterations,
        Some(agent_state),
        agent.history.clone(),
        user_msg,
        started,
    )
    .await
}
