//! Provider Handlers (C9): the shared tool-calling request loop, response
//! normalization, and the per-provider seam [`ProviderClient`] that OpenAI
//! and Ollama plug into (§4.8).

pub mod ollama;
pub mod openai;

use crate::executor::{ToolCallRequest, ToolExecutor};
use crate::injector::AgentStateSnapshot;
use crate::metrics::{CallTimer, ChatMetric, MetricsRecorder};
use crate::rate_limiter::{OwnedRateLimiterPermit, RateLimiter};
use crate::registry::ToolRegistry;
use crate::retry::{self, RetryConfig};
use crate::tools::Tool;
use crate::trace::{RunType, TraceContext, TraceLogger};
use crate::types::{
    AgentConfig, ContentBlock, History, Message, MessageRole, OpenAIMessage, OpenAIRequest, ToolChoice,
    ToolResultBlock, ToolUseBlock,
};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// A tool call as parsed out of a provider's response, prior to validation.
#[derive(Debug, Clone)]
pub struct NormalizedToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// A provider response reduced to the shape the shared loop needs,
/// independent of the provider's wire format (§4.8.1, §6's provider call
/// contract).
#[derive(Debug, Clone, Default)]
pub struct NormalizedResponse {
    pub has_tool_calls: bool,
    pub tool_calls: Vec<NormalizedToolCall>,
    pub text: Option<String>,
    pub tokens: Option<(u64, u64)>,
}

/// One event of a streamed response (§6).
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A piece of generated text, safe to surface to the caller immediately.
    TokenDelta(String),
    /// The model has begun emitting a tool call; no further `TokenDelta`s in
    /// this turn should be treated as the final answer.
    ToolCallIndication,
    /// Generation finished; carries the fully aggregated response.
    Completed(NormalizedResponse),
}

/// What a `chat()` call hands back to its caller: either the whole answer
/// at once, or a stream consumed chunk by chunk (§9). A streaming turn that
/// never emits tool calls forwards each `TokenDelta` to the caller the
/// moment it arrives on the wire — no buffering for the full generation —
/// and only resolves the turn's history/trace bookkeeping once the stream's
/// last item has been polled (§4.8.2). A turn whose first event turns out
/// to be a tool call is never user-visible as a stream in the first place:
/// tool rounds are drained and re-issued internally before a final answer
/// exists to hand back.
pub enum ChatOutcome {
    Complete(String),
    Streaming(BoxStream<'static, Result<String>>),
}

impl std::fmt::Debug for ChatOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatOutcome::Complete(s) => f.debug_tuple("Complete").field(s).finish(),
            ChatOutcome::Streaming(_) => f.debug_tuple("Streaming").field(&"<stream>").finish(),
        }
    }
}

/// The per-provider seam the shared loop calls into. Each implementor owns
/// its own `reqwest::Client`, base URL, and model name.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn model(&self) -> &str;

    async fn send(&self, request: OpenAIRequest) -> Result<NormalizedResponse>;

    async fn send_streaming(&self, request: OpenAIRequest) -> Result<BoxStream<'static, Result<StreamEvent>>>;

    /// Best-effort cleanup run after a streaming iteration whose response
    /// carried tool calls, before the next iteration's request is issued.
    /// Never allowed to mask the turn's real outcome — failures here are
    /// logged and swallowed (§4.8.3, §9's streaming drain/cancel note).
    async fn after_tool_call_stream(&self) {}
}

/// Everything the shared loop needs beyond the provider itself and the
/// per-call configuration. `logger`/`rate_limiter`/`metrics` are held by
/// `Arc` rather than borrowed: a live-streaming final answer finishes its
/// bookkeeping (history append, trace end, metrics) on whatever task polls
/// it to completion, which can run after this call's own stack frame is
/// long gone.
pub struct ChatLoopDeps<'a> {
    pub client: &'a dyn ProviderClient,
    pub registry: &'a ToolRegistry,
    pub executor: &'a ToolExecutor,
    pub logger: Arc<TraceLogger>,
    pub rate_limiter: Arc<RateLimiter>,
    pub metrics: Arc<MetricsRecorder>,
    pub retry_config: RetryConfig,
}

/// Restricts the tool list sent to the model per the selected [`ToolChoice`]
/// (§4.8 step 1): `none` sends no tools at all, a specific function sends
/// only that tool, `auto`/`required` send everything registered.
pub fn filter_by_tool_choice<'a>(registry: &'a ToolRegistry, choice: &ToolChoice) -> Vec<&'a Tool> {
    match choice {
        ToolChoice::None => Vec::new(),
        ToolChoice::Function(name) => registry.get(name).into_iter().collect(),
        ToolChoice::Auto | ToolChoice::Required => registry.all(),
    }
}

fn to_openai_message(msg: &Message) -> OpenAIMessage {
    let role = match msg.role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::Tool => "tool",
    };

    let tool_calls: Vec<crate::types::OpenAIToolCall> = msg
        .tool_uses()
        .map(|t| crate::types::OpenAIToolCall {
            id: t.id.clone(),
            call_type: "function".to_string(),
            function: crate::types::OpenAIFunction {
                name: t.name.clone(),
                arguments: t.input.to_string(),
            },
        })
        .collect();

    let tool_call_id = msg.content.iter().find_map(|b| match b {
        ContentBlock::ToolResult(r) => Some(r.tool_use_id.clone()),
        _ => None,
    });

    let content = if msg.role == MessageRole::Tool {
        msg.content.iter().find_map(|b| match b {
            ContentBlock::ToolResult(r) => Some(match &r.content {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            _ => None,
        })
    } else {
        msg.text().map(|s| s.to_string())
    };

    OpenAIMessage {
        role: role.to_string(),
        content,
        tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
        tool_call_id,
    }
}

fn tool_choice_to_json(choice: &ToolChoice) -> Option<Value> {
    match choice {
        ToolChoice::Auto => Some(json!("auto")),
        ToolChoice::None => None,
        ToolChoice::Required => Some(json!("required")),
        ToolChoice::Function(name) => Some(json!({"type": "function", "function": {"name": name}})),
    }
}

fn build_request(
    model: &str,
    system_prompt: Option<&str>,
    messages: &[Message],
    config: &AgentConfig,
    tools: &[&Tool],
    tool_choice: &ToolChoice,
    stream: bool,
) -> OpenAIRequest {
    let mut openai_messages = Vec::with_capacity(messages.len() + 1);
    if let Some(system) = system_prompt {
        openai_messages.push(OpenAIMessage {
            role: "system".to_string(),
            content: Some(system.to_string()),
            tool_calls: None,
            tool_call_id: None,
        });
    }
    openai_messages.extend(messages.iter().map(to_openai_message));

    let tools_json = if tools.is_empty() {
        None
    } else {
        Some(tools.iter().map(|t| t.to_openai_format()).collect())
    };

    OpenAIRequest {
        model: model.to_string(),
        messages: openai_messages,
        stream,
        max_tokens: config.max_tokens,
        temperature: config.temperature,
        top_p: config.top_p,
        top_k: config.top_k,
        tools: tools_json,
        tool_choice: if tools.is_empty() { None } else { tool_choice_to_json(tool_choice) },
    }
}

/// Appends what turns a `Completed` response means for a conversation
/// turn: commits the user/assistant pair to persistent history and closes
/// out the root trace span. Shared by the immediate (`Complete`) path and
/// the live (`Streaming`) path's terminal step, since both ultimately
/// resolve to the same bookkeeping — only the timing differs.
async fn finalize_turn(
    history: &Arc<Mutex<History>>,
    logger: &TraceLogger,
    root_ctx: &TraceContext,
    elapsed_ms: u64,
    user_msg: Message,
    assistant_text: String,
) {
    history
        .lock()
        .expect("history lock poisoned")
        .append_turn(user_msg, Message::assistant_text(assistant_text.clone()));
    logger
        .trace_end(root_ctx, Some(json!({"response_preview": assistant_text})), elapsed_ms, None)
        .await;
}

/// Runs the shared tool-calling loop against `deps.client` (§4.9's `chat()`
/// steps 4-6, generalized over both providers): each iteration sends a
/// request, and if the response carries tool calls, executes them and
/// appends the assistant/tool turns before looping; otherwise the turn is
/// finalized and returned. Tool choice resets to `auto` after the first
/// tool execution so a `required`/specific choice doesn't force the same
/// call forever.
#[allow(clippy::too_many_arguments)]
pub async fn run_chat_loop(
    deps: &ChatLoopDeps<'_>,
    config: &AgentConfig,
    system_prompt: Option<&str>,
    mut messages: Vec<Message>,
    mut tool_choice: ToolChoice,
    parent_ctx: &TraceContext,
    max_iterations: u32,
    agent_state: Option<AgentStateSnapshot>,
    history: Arc<Mutex<History>>,
    user_msg: Message,
    started: Instant,
) -> Result<ChatOutcome> {
    let stream = config.stream.unwrap_or(false);

    for iteration in 1..=max_iterations {
        deps.logger.llm_iteration_start(parent_ctx, iteration, max_iterations).await;

        let tools = filter_by_tool_choice(deps.registry, &tool_choice);
        let request = build_request(
            deps.client.model(),
            system_prompt,
            &messages,
            config,
            &tools,
            &tool_choice,
            stream,
        );
        let llm_ctx = parent_ctx.create_child(RunType::Llm, "llm.call");
        deps.logger
            .llm_request(&llm_ctx, deps.client.model(), messages.len(), Some(tools.len()))
            .await;

        if stream {
            let finalize = FinalizeCtx {
                history: history.clone(),
                user_msg: user_msg.clone(),
                root_ctx: parent_ctx.clone(),
                llm_ctx: llm_ctx.clone(),
                started,
                iteration_started: CallTimer::start(),
                logger: deps.logger.clone(),
                metrics: deps.metrics.clone(),
                model: deps.client.model().to_string(),
            };

            match run_streaming_iteration(deps, &request, finalize).await? {
                StreamingIteration::LiveAnswer(live) => return Ok(ChatOutcome::Streaming(live)),
                StreamingIteration::Drained(normalized, elapsed_ms) => {
                    deps.logger
                        .llm_response(
                            &llm_ctx,
                            deps.client.model(),
                            normalized.text.as_deref().unwrap_or(""),
                            normalized.has_tool_calls,
                            normalized.tool_calls.len(),
                            normalized.tokens,
                            elapsed_ms,
                        )
                        .await;
                    deps.metrics.record(metric_for(deps.client.model(), elapsed_ms, normalized.tokens));

                    if !normalized.has_tool_calls {
                        let text = normalized.text.clone().unwrap_or_default();
                        let total_elapsed = started.elapsed().as_millis() as u64;
                        finalize_turn(&history, deps.logger.as_ref(), parent_ctx, total_elapsed, user_msg, text.clone())
                            .await;
                        return Ok(ChatOutcome::Streaming(Box::pin(futures::stream::once(async move {
                            Ok(text)
                        }))));
                    }

                    append_tool_round(&mut messages, normalized, deps, parent_ctx, agent_state.as_ref()).await;
                    tool_choice = ToolChoice::Auto;
                    continue;
                }
            }
        }

        let timer = CallTimer::start();
        let _permit = deps.rate_limiter.acquire().await;
        let request_clone = request.clone();
        let response =
            retry::retry(deps.retry_config.clone(), move || deps.client.send(request_clone.clone())).await?;
        drop(_permit);
        let elapsed_ms = timer.elapsed_ms();

        deps.logger
            .llm_response(
                &llm_ctx,
                deps.client.model(),
                response.text.as_deref().unwrap_or(""),
                response.has_tool_calls,
                response.tool_calls.len(),
                response.tokens,
                elapsed_ms,
            )
            .await;
        deps.metrics.record(metric_for(deps.client.model(), elapsed_ms, response.tokens));

        if !response.has_tool_calls {
            let text = response.text.clone().unwrap_or_default();
            let total_elapsed = started.elapsed().as_millis() as u64;
            finalize_turn(&history, deps.logger.as_ref(), parent_ctx, total_elapsed, user_msg, text.clone()).await;
            return Ok(ChatOutcome::Complete(text));
        }

        append_tool_round(&mut messages, response, deps, parent_ctx, agent_state.as_ref()).await;
        tool_choice = ToolChoice::Auto;
    }

    Err(Error::IterationCapExceeded(max_iterations))
}

fn metric_for(model: &str, elapsed_ms: u64, tokens: Option<(u64, u64)>) -> ChatMetric {
    match tokens {
        Some((prompt, completion)) => ChatMetric::success(model, elapsed_ms, Some(prompt), Some(completion)),
        None => ChatMetric::success(model, elapsed_ms, None, None),
    }
}

/// Executes one round of tool calls from a normalized response and appends
/// the resulting assistant/tool messages to the in-flight request history
/// (not the agent's persisted [`History`] — that only gains the turn's
/// final user/assistant pair, via [`finalize_turn`]).
async fn append_tool_round(
    messages: &mut Vec<Message>,
    normalized: NormalizedResponse,
    deps: &ChatLoopDeps<'_>,
    parent_ctx: &TraceContext,
    agent_state: Option<&AgentStateSnapshot>,
) {
    let tool_uses: Vec<ContentBlock> = normalized
        .tool_calls
        .iter()
        .map(|tc| ContentBlock::ToolUse(ToolUseBlock::new(tc.id.clone(), tc.name.clone(), tc.arguments.clone())))
        .collect();
    messages.push(Message::assistant(tool_uses));

    let calls: Vec<ToolCallRequest> = normalized
        .tool_calls
        .into_iter()
        .map(|tc| ToolCallRequest {
            tool_call_id: tc.id,
            tool_name: tc.name,
            arguments: tc.arguments,
        })
        .collect();
    let parallel = calls.len() > 1;
    let results = deps.executor.execute_many(parent_ctx, calls, agent_state, parallel).await;

    for result in results {
        messages.push(Message::new(
            MessageRole::Tool,
            vec![ContentBlock::ToolResult(ToolResultBlock::new(
                result.tool_call_id.clone(),
                Value::String(result.to_llm_message()),
            ))],
        ));
    }
}

/// What finishing a streaming iteration's request turns into.
enum StreamingIteration {
    /// The provider either signalled tool calls or finished generating
    /// before any text reached the caller — nothing was forwarded live, so
    /// this resolves exactly like a non-streaming response. Carries the
    /// iteration's elapsed milliseconds for logging.
    Drained(NormalizedResponse, u64),
    /// The first event out of the wire was real generated text: nothing
    /// downstream of this call will see a tool call in this turn, so the
    /// remaining event stream is handed to the caller directly.
    LiveAnswer(BoxStream<'static, Result<String>>),
}

/// Everything a live answer stream needs to finalize the turn once
/// generation completes, independent of the borrows that created it.
struct FinalizeCtx {
    history: Arc<Mutex<History>>,
    user_msg: Message,
    root_ctx: TraceContext,
    llm_ctx: TraceContext,
    started: Instant,
    iteration_started: CallTimer,
    logger: Arc<TraceLogger>,
    metrics: Arc<MetricsRecorder>,
    model: String,
}

/// Issues one streaming request and peeks its first substantive event to
/// decide whether this iteration is a tool round or the turn's final
/// answer (§4.8.2). OpenAI-compatible chat completions never mix tool-call
/// deltas and text content within one assistant turn, so the first event
/// settles it: a `ToolCallIndication` means drain and re-issue, same as
/// before; a `TokenDelta` means everything from here on is safe to forward
/// to the caller the instant it arrives.
async fn run_streaming_iteration(
    deps: &ChatLoopDeps<'_>,
    request: &OpenAIRequest,
    finalize: FinalizeCtx,
) -> Result<StreamingIteration> {
    let permit = deps.rate_limiter.acquire_owned().await;
    let request = request.clone();
    let mut event_stream =
        retry::retry(deps.retry_config.clone(), move || deps.client.send_streaming(request.clone())).await?;

    match event_stream.next().await {
        Some(Ok(StreamEvent::TokenDelta(first))) => {
            let state = LiveAnswerState {
                events: event_stream,
                buffer: first.clone(),
                pending: Some(first),
                permit: Some(permit),
                finalize: Some(finalize),
            };
            Ok(StreamingIteration::LiveAnswer(Box::pin(futures::stream::unfold(
                state,
                live_answer_next,
            ))))
        }
        Some(Ok(StreamEvent::ToolCallIndication)) => {
            let normalized = drain_remaining(event_stream).await?;
            if normalized.has_tool_calls {
                deps.client.after_tool_call_stream().await;
            }
            Ok(StreamingIteration::Drained(normalized, finalize.iteration_started.elapsed_ms()))
        }
        Some(Ok(StreamEvent::Completed(response))) => {
            Ok(StreamingIteration::Drained(response, finalize.iteration_started.elapsed_ms()))
        }
        Some(Err(e)) => Err(e),
        None => Ok(StreamingIteration::Drained(
            NormalizedResponse::default(),
            finalize.iteration_started.elapsed_ms(),
        )),
    }
}

async fn drain_remaining(mut event_stream: BoxStream<'static, Result<StreamEvent>>) -> Result<NormalizedResponse> {
    let mut chunks: Vec<String> = Vec::new();
    let mut completed = None;
    while let Some(event) = event_stream.next().await {
        match event? {
            StreamEvent::TokenDelta(chunk) => chunks.push(chunk),
            StreamEvent::ToolCallIndication => {}
            StreamEvent::Completed(response) => completed = Some(response),
        }
    }
    Ok(match completed {
        Some(response) => response,
        None => NormalizedResponse {
            text: Some(chunks.concat()),
            ..Default::default()
        },
    })
}

struct LiveAnswerState {
    events: BoxStream<'static, Result<StreamEvent>>,
    buffer: String,
    pending: Option<String>,
    permit: Option<OwnedRateLimiterPermit>,
    finalize: Option<FinalizeCtx>,
}

/// `unfold` step for a live answer: re-emits each `TokenDelta` as it's
/// polled (§4.8.2's low-latency requirement) and, once the stream
/// completes, finalizes the turn — the one place this concern is resolved
/// for a streaming turn, since nothing synchronous is still on the stack by
/// the time the caller has drained the whole thing.
async fn live_answer_next(mut state: LiveAnswerState) -> Option<(Result<String>, LiveAnswerState)> {
    if let Some(chunk) = state.pending.take() {
        return Some((Ok(chunk), state));
    }

    loop {
        match state.events.next().await {
            Some(Ok(StreamEvent::TokenDelta(chunk))) => {
                state.buffer.push_str(&chunk);
                return Some((Ok(chunk), state));
            }
            Some(Ok(StreamEvent::ToolCallIndication)) => {
                // The mutual-exclusivity assumption that justified streaming
                // this turn early just broke. Text has already reached the
                // caller, so there's no taking it back — finish the turn
                // with what streamed rather than attempting tool execution
                // mid-answer.
                tracing::warn!("tool call indication arrived after a live answer had already started streaming");
                continue;
            }
            Some(Ok(StreamEvent::Completed(response))) => {
                state.permit.take();
                if let Some(ctx) = state.finalize.take() {
                    let text = response.text.clone().unwrap_or_else(|| state.buffer.clone());
                    let elapsed_ms = ctx.iteration_started.elapsed_ms();
                    ctx.logger
                        .llm_response(
                            &ctx.llm_ctx,
                            &ctx.model,
                            &text,
                            response.has_tool_calls,
                            response.tool_calls.len(),
                            response.tokens,
                            elapsed_ms,
                        )
                        .await;
                    ctx.metrics.record(metric_for(&ctx.model, elapsed_ms, response.tokens));
                    finalize_turn(
                        &ctx.history,
                        ctx.logger.as_ref(),
                        &ctx.root_ctx,
                        ctx.started.elapsed().as_millis() as u64,
                        ctx.user_msg,
                        text,
                    )
                    .await;
                }
                return None;
            }
            Some(Err(e)) => {
                state.permit.take();
                if let Some(ctx) = state.finalize.take() {
                    let message = e.to_string();
                    ctx.logger
                        .trace_end(
                            &ctx.root_ctx,
                            None,
                            ctx.started.elapsed().as_millis() as u64,
                            Some(("StreamError", message.as_str())),
                        )
                        .await;
                }
                return Some((Err(e), state));
            }
            None => {
                state.permit.take();
                if let Some(ctx) = state.finalize.take() {
                    let text = state.buffer.clone();
                    finalize_turn(
                        &ctx.history,
                        ctx.logger.as_ref(),
                        &ctx.root_ctx,
                        ctx.started.elapsed().as_millis() as u64,
                        ctx.user_msg,
                        text,
                    )
                    .await;
                }
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tool;
    use serde_json::json;

    fn sample_message(role: MessageRole, content: Vec<ContentBlock>) -> Message {
        Message::new(role, content)
    }

    #[test]
    fn test_filter_by_tool_choice_none_is_empty() {
        let mut registry = ToolRegistry::new();
        registry
            .register_agent(tool("search", "search").build(|_| async { Ok(json!({})) }))
            .unwrap();
        let filtered = filter_by_tool_choice(&registry, &ToolChoice::None);
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_filter_by_tool_choice_function_selects_one() {
        let mut registry = ToolRegistry::new();
        registry
            .register_agent(tool("search", "search").build(|_| async { Ok(json!({})) }))
            .unwrap();
        registry
            .register_agent(tool("calc", "calc").build(|_| async { Ok(json!({})) }))
            .unwrap();
        let filtered = filter_by_tool_choice(&registry, &ToolChoice::Function("calc".to_string()));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name(), "calc");
    }

    #[test]
    fn test_filter_by_tool_choice_auto_selects_all() {
        let mut registry = ToolRegistry::new();
        registry
            .register_agent(tool("search", "search").build(|_| async { Ok(json!({})) }))
            .unwrap();
        registry
            .register_agent(tool("calc", "calc").build(|_| async { Ok(json!({})) }))
            .unwrap();
        assert_eq!(filter_by_tool_choice(&registry, &ToolChoice::Auto).len(), 2);
    }

    #[test]
    fn test_to_openai_message_tool_result_uses_tool_call_id() {
        let msg = sample_message(
            MessageRole::Tool,
            vec![ContentBlock::ToolResult(ToolResultBlock::new(
                "call_1",
                Value::String("42".to_string()),
            ))],
        );
        let openai = to_openai_message(&msg);
        assert_eq!(openai.role, "tool");
        assert_eq!(openai.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(openai.content.as_deref(), Some("42"));
    }

    #[test]
    fn test_to_openai_message_assistant_with_tool_use() {
        let msg = Message::assistant(vec![ContentBlock::ToolUse(ToolUseBlock::new(
            "call_1",
            "search",
            json!({"q": "rust"}),
        ))]);
        let openai = to_openai_message(&msg);
        let calls = openai.tool_calls.unwrap();
        assert_eq!(calls[0].function.name, "search");
        assert_eq!(calls[0].function.arguments, json!({"q": "rust"}).to_string());
    }

    #[test]
    fn test_build_request_omits_tools_when_none_selected() {
        let config = AgentConfig::default();
        let request = build_request("gpt-4", None, &[], &config, &[], &ToolChoice::None, false);
        assert!(request.tools.is_none());
        assert!(request.tool_choice.is_none());
    }

    #[tokio::test]
    async fn test_live_answer_forwards_deltas_before_completion_arrives() {
        use crate::trace::{InMemoryTraceStore, TraceLogger};

        let events: Vec<Result<StreamEvent>> = vec![
            Ok(StreamEvent::TokenDelta("Hel".to_string())),
            Ok(StreamEvent::TokenDelta("lo".to_string())),
            Ok(StreamEvent::Completed(NormalizedResponse {
                text: Some("Hello".to_string()),
                ..Default::default()
            })),
        ];
        let state = LiveAnswerState {
            events: Box::pin(futures::stream::iter(events)),
            buffer: String::new(),
            pending: None,
            permit: None,
            finalize: Some(FinalizeCtx {
                history: Arc::new(Mutex::new(History::new(10))),
                user_msg: Message::user("hi"),
                root_ctx: TraceContext::create_root(RunType::Chat, "chat", None, None, None),
                llm_ctx: TraceContext::create_root(RunType::Llm, "llm.call", None, None, None),
                started: Instant::now(),
                iteration_started: CallTimer::start(),
                logger: Arc::new(TraceLogger::new(Arc::new(InMemoryTraceStore::new(10)))),
                metrics: Arc::new(MetricsRecorder::default()),
                model: "gpt-4".to_string(),
            }),
        };

        let collected: Vec<String> = futures::stream::unfold(state, live_answer_next)
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(collected, vec!["Hel".to_string(), "lo".to_string()]);
    }
}
