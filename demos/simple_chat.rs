//! Minimal single-turn chat against a local Ollama server, no tools.

use agent_runtime::{chat, Agent, AgentRuntime, ChatOutcome, Provider};

#[tokio::main]
async fn main() -> agent_runtime::Result<()> {
    let runtime = AgentRuntime::default();
    let mut agent = Agent::builder(Provider::Ollama, "llama3")
        .name("assistant")
        .instructions("Be concise.")
        .build()?;

    match chat(&runtime, &mut agent, "What's the capital of France?", None).await? {
        ChatOutcome::Complete(text) => println!("{text}"),
        ChatOutcome::Streaming(_) => unreachable!("stream not requested"),
    }

    println!("history: {} messages", agent.history().len());
    Ok(())
}
