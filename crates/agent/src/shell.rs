//! Interactive query loop.

use crate::agent::Agent;
use crate::error::AgentResult;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Read queries from `input` until `quit` or end of input, answering each on `output`.
pub async fn run_shell<R, W>(
    agent: &mut Agent,
    thread_id: &str,
    input: R,
    mut output: W,
) -> AgentResult<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let tools = agent
        .client()
        .tools()
        .iter()
        .map(|tool| format!("{}: {}", tool.name, tool.description))
        .collect::<Vec<_>>()
        .join(", ");
    output
        .write_all(format!("Connected to server with tools: [{}]\n", tools).as_bytes())
        .await?;
    output
        .write_all(b"\nMCP Client Started!\nType your queries or 'quit' to exit.\n")
        .await?;

    let mut lines = input.lines();
    loop {
        output.write_all(b"\nQuery: ").await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("quit") {
            break;
        }

        let reply = match agent.run(thread_id, query).await {
            Ok(answer) => format!("\n{}\n", answer),
            Err(e) => {
                tracing::error!(error = %e, "Query failed");
                format!("\nError: {}\n", e)
            }
        };
        output.write_all(reply.as_bytes()).await?;
    }

    output.flush().await?;
    agent.client_mut().disconnect();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::test_support::ScriptedModel;
    use crate::client::test_support::connected_client;
    use catalog_core::llm::ChatMessage;
    use std::sync::Arc;

    async fn transcript(model: ScriptedModel, input: &str) -> (String, Agent) {
        let mut agent = Agent::new(Arc::new(model), connected_client().await);
        let mut output = Vec::new();
        run_shell(&mut agent, "demo-thread-1", input.as_bytes(), &mut output)
            .await
            .unwrap();
        (String::from_utf8(output).unwrap(), agent)
    }

    #[tokio::test]
    async fn test_banner_answers_and_quit() {
        let model = ScriptedModel::new(vec![ChatMessage::assistant("Hello there")]);
        let (out, agent) = transcript(model, "\nhi\nQUIT\nnever asked\n").await;

        assert!(out.starts_with("Connected to server with tools: [get_product: "));
        assert!(out.contains("MCP Client Started!"));
        assert!(out.contains("Type your queries or 'quit' to exit."));
        assert!(out.contains("\nHello there\n"));
        assert_eq!(out.matches("Query: ").count(), 3);

        assert_eq!(agent.history("demo-thread-1").len(), 3);
        assert!(agent.client().call_tool("list_products", serde_json::json!({})).await.is_err());
    }

    #[tokio::test]
    async fn test_errors_keep_the_loop_running() {
        // Empty script: every model call fails
        let (out, agent) = transcript(ScriptedModel::new(vec![]), "one\ntwo\n").await;

        assert_eq!(out.matches("\nError: Model error: ").count(), 2);
        assert_eq!(agent.history("demo-thread-1").len(), 3);
    }
}
