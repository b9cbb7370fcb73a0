//! An agent with two independent tools. When the model requests both in
//! the same turn, the executor runs them concurrently and feeds results
//! back in call order.

use agent_runtime::{chat, tool, Agent, AgentRuntime, ChatOutcome, Provider};
use serde_json::json;

#[tokio::main]
async fn main() -> agent_runtime::Result<()> {
    let runtime = AgentRuntime::default();

    let weather = tool("get_weather", "Looks up current weather for a city")
        .param("city", "string")
        .build(|args| async move {
            let city = args["city"].as_str().unwrap_or("unknown").to_string();
            Ok(json!({ "city": city, "condition": "sunny", "temp_c": 22 }))
        });

    let exchange_rate = tool("get_exchange_rate", "Looks up a currency pair's exchange rate")
        .param("from", "string")
        .param("to", "string")
        .build(|args| async move {
            let from = args["from"].as_str().unwrap_or("USD").to_string();
            let to = args["to"].as_str().unwrap_or("EUR").to_string();
            Ok(json!({ "from": from, "to": to, "rate": 0.92 }))
        });

    let mut agent = Agent::builder(Provider::Ollama, "llama3")
        .instructions("Use both tools if the question needs weather and currency info.")
        .tool(weather)
        .tool(exchange_rate)
        .build()?;

    match chat(
        &runtime,
        &mut agent,
        "What's the weather in Paris, and what's the USD to EUR exchange rate?",
        None,
    )
    .await?
    {
        ChatOutcome::Complete(text) => println!("{text}"),
        ChatOutcome::Streaming(_) => unreachable!("stream not requested"),
    }

    Ok(())
}
