//! Agent loop: a chat model driving the catalog tools.

use crate::client::McpClient;
use crate::config::DEFAULT_MAX_ITERATIONS;
use crate::error::{AgentError, AgentResult};
use catalog_core::llm::{ChatMessage, ChatModel, ToolSpec};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const NO_RESPONSE: &str = "No response generated";

/// Agent that executes the model's tool calls until it produces an answer.
///
/// Each thread id keeps its own conversation history for the lifetime of
/// the agent:
/// 1. Append the user's query to the thread
/// 2. Ask the model for the next step, offering every discovered tool
/// 3. Run each requested tool in order and feed the results back
/// 4. Stop when the model answers without tool calls
pub struct Agent {
    model: Arc<dyn ChatModel>,
    client: McpClient,
    tool_specs: Vec<ToolSpec>,
    system_prompt: String,
    histories: HashMap<String, Vec<ChatMessage>>,
    max_iterations: usize,
}

impl Agent {
    pub fn new(model: Arc<dyn ChatModel>, client: McpClient) -> Self {
        let tool_specs: Vec<ToolSpec> = client
            .tools()
            .iter()
            .map(|tool| ToolSpec {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.input_schema.clone(),
            })
            .collect();
        let system_prompt = system_prompt(&tool_specs);

        Self {
            model,
            client,
            tool_specs,
            system_prompt,
            histories: HashMap::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Set the maximum number of model steps per query.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn client(&self) -> &McpClient {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut McpClient {
        &mut self.client
    }

    /// Messages recorded for `thread_id`, system prompt first.
    pub fn history(&self, thread_id: &str) -> &[ChatMessage] {
        self.histories.get(thread_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Answer `query` within the conversation `thread_id`.
    pub async fn run(&mut self, thread_id: &str, query: &str) -> AgentResult<String> {
        let prompt = &self.system_prompt;
        let history = self
            .histories
            .entry(thread_id.to_string())
            .or_insert_with(|| vec![ChatMessage::system(prompt.clone())]);
        history.push(ChatMessage::user(query));

        for iteration in 1..=self.max_iterations {
            debug!(thread = thread_id, iteration, "Requesting model step");
            let completion = self.model.complete(history.as_slice(), &self.tool_specs).await?;
            let message = completion.message;

            if message.tool_calls.is_empty() {
                let answer = message.content.trim().to_string();
                history.push(message);
                info!(thread = thread_id, iterations = iteration, "Agent finished");
                if answer.is_empty() {
                    return Ok(NO_RESPONSE.to_string());
                }
                return Ok(answer);
            }

            let calls = message.tool_calls.clone();
            history.push(message);

            for call in calls {
                info!(tool = %call.name, "Executing tool");
                let output = match self.client.call_tool(&call.name, call.arguments).await {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(tool = %call.name, error = %e, "Tool execution failed");
                        json!({ "error": e.to_string() }).to_string()
                    }
                };
                history.push(ChatMessage::tool_result(call.id, output));
            }
        }

        warn!(thread = thread_id, max = self.max_iterations, "Max iterations reached");
        Err(AgentError::MaxIterations(self.max_iterations))
    }
}

fn system_prompt(tools: &[ToolSpec]) -> String {
    let listing = tools
        .iter()
        .map(|tool| format!("- {}: {}", tool.name, tool.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a helpful AI assistant that can interact with various tools and services. \
         Use the available tools to help users with their requests. \
         Always provide clear and helpful responses.\n\n\
         You have the following tools available:\n{}",
        listing
    )
}

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use catalog_core::llm::{ChatCompletion, ChatMessage, ChatModel, LlmError, ToolCall, ToolSpec};
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned completions and records what it was shown.
    #[derive(Default)]
    pub struct ScriptedModel {
        replies: Mutex<VecDeque<ChatMessage>>,
        pub seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedModel {
        pub fn new(replies: Vec<ChatMessage>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    pub fn call(id: &str, name: &str, arguments: Value) -> ChatMessage {
        ChatMessage::assistant("").with_tool_calls(vec![ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments,
        }])
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(
            &self,
            messages: &[ChatMessage],
            _tools: &[ToolSpec],
        ) -> Result<ChatCompletion, LlmError> {
            self.seen.lock().unwrap().push(messages.to_vec());
            let message = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| LlmError::InvalidResponse("script exhausted".into()))?;
            Ok(ChatCompletion {
                message,
                finish_reason: None,
            })
        }
    }
}
