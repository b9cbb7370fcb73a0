//! A single-tool agent that can add two numbers, demonstrating the
//! tool-calling loop end to end.

use agent_runtime::{chat, tool, Agent, AgentRuntime, ChatOutcome, Provider};
use serde_json::json;

#[tokio::main]
async fn main() -> agent_runtime::Result<()> {
    let runtime = AgentRuntime::default();

    let add = tool("add", "Adds two numbers and returns the sum")
        .param("a", "number")
        .param("b", "number")
        .build(|args| async move {
            let a = args["a"].as_f64().unwrap_or_default();
            let b = args["b"].as_f64().unwrap_or_default();
            Ok(json!({ "sum": a + b }))
        });

    let mut agent = Agent::builder(Provider::Ollama, "llama3")
        .instructions("Use the add tool for arithmetic; otherwise answer directly.")
        .tool(add)
        .build()?;

    match chat(&runtime, &mut agent, "What is 17 plus 25?", None).await? {
        ChatOutcome::Complete(text) => println!("{text}"),
        ChatOutcome::Streaming(_) => unreachable!("stream not requested"),
    }

    Ok(())
}
