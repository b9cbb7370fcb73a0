//! End-to-end coverage of `chat()` that doesn't require a live provider:
//! input validation and the "history untouched on failure" guarantee.

use agent_runtime::{chat, Agent, AgentRuntime, Error, Provider};

#[tokio::test]
async fn rejects_empty_user_message_without_touching_history() {
    let runtime = AgentRuntime::default();
    let mut agent = Agent::builder(Provider::Ollama, "llama3").build().unwrap();

    let err = chat(&runtime, &mut agent, "   ", None).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(agent.history().is_empty());
}

#[tokio::test]
async fn rejects_whitespace_only_message() {
    let runtime = AgentRuntime::default();
    let mut agent = Agent::builder(Provider::Ollama, "llama3").build().unwrap();

    let err = chat(&runtime, &mut agent, "\n\t  \n", None).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn two_runtimes_do_not_share_trace_state() {
    // Each AgentRuntime owns its own trace store; validation failures on one
    // must not be observable through another.
    let runtime_a = AgentRuntime::default();
    let runtime_b = AgentRuntime::default();
    let mut agent = Agent::builder(Provider::Ollama, "llama3").build().unwrap();

    let _ = chat(&runtime_a, &mut agent, "", None).await.unwrap_err();
    let _ = chat(&runtime_b, &mut agent, "", None).await.unwrap_err();
    assert!(agent.history().is_empty());
}
