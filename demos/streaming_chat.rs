//! Requests a streamed response and prints chunks as they're drained.

use agent_runtime::{chat, Agent, AgentRuntime, ChatOutcome, Provider};
use futures::StreamExt;

#[tokio::main]
async fn main() -> agent_runtime::Result<()> {
    let runtime = AgentRuntime::default();
    let mut agent = Agent::builder(Provider::Ollama, "llama3")
        .config("stream", true)
        .build()?;

    match chat(&runtime, &mut agent, "Write a short haiku about rivers.", None).await? {
        ChatOutcome::Complete(text) => println!("{text}"),
        ChatOutcome::Streaming(mut stream) => {
            while let Some(chunk) = stream.next().await {
                print!("{}", chunk?);
            }
            println!();
        }
    }

    Ok(())
}
