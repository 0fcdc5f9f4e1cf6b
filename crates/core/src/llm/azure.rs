// Azure OpenAI chat-completions client

use super::{ChatCompletion, ChatMessage, ChatModel, LlmError, Role, ToolCall, ToolSpec};
use crate::config::LlmConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

/// OpenAI-compatible chat model addressed by Azure deployment name
#[derive(Clone)]
pub struct AzureChatModel {
    http: Client,
    url: Url,
    api_key: Option<String>,
    deployment: String,
}

impl AzureChatModel {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let base = config.endpoint.trim_end_matches('/');
        let mut url = Url::parse(&format!(
            "{}/openai/deployments/{}/chat/completions",
            base, config.deployment
        ))
        .map_err(|e| LlmError::Config(format!("invalid endpoint '{}': {}", config.endpoint, e)))?;
        url.query_pairs_mut()
            .append_pair("api-version", &config.api_version);

        let http = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http,
            url,
            api_key: config.api_key.clone(),
            deployment: config.deployment.clone(),
        })
    }

    pub fn deployment(&self) -> &str {
        &self.deployment
    }
}

#[async_trait]
impl ChatModel for AzureChatModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<ChatCompletion, LlmError> {
        let payload = CompletionRequest {
            messages: messages.iter().map(wire_message).collect(),
            tools: tools
                .iter()
                .map(|t| json!({"type": "function", "function": t}))
                .collect(),
            temperature: 0.0,
        };

        debug!(
            deployment = self.deployment.as_str(),
            messages = messages.len(),
            tools = tools.len(),
            "Sending chat completion request"
        );

        let mut request = self.http.post(self.url.clone()).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.header("api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("no choices returned".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|call| {
                let arguments = if call.function.arguments.trim().is_empty() {
                    json!({})
                } else {
                    serde_json::from_str(&call.function.arguments).map_err(|e| {
                        LlmError::InvalidResponse(format!(
                            "tool call '{}' has malformed arguments: {}",
                            call.function.name, e
                        ))
                    })?
                };
                Ok(ToolCall {
                    id: call.id,
                    name: call.function.name,
                    arguments,
                })
            })
            .collect::<Result<Vec<_>, LlmError>>()?;

        Ok(ChatCompletion {
            message: ChatMessage::assistant(choice.message.content.unwrap_or_default())
                .with_tool_calls(tool_calls),
            finish_reason: choice.finish_reason,
        })
    }
}

fn wire_message(message: &ChatMessage) -> Value {
    let mut wire = json!({
        "role": message.role,
        "content": message.content,
    });
    if message.role == Role::Assistant && !message.tool_calls.is_empty() {
        wire["tool_calls"] = message
            .tool_calls
            .iter()
            .map(|call| {
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": {
                        "name": call.name,
                        "arguments": call.arguments.to_string(),
                    }
                })
            })
            .collect();
    }
    if let Some(id) = &message.tool_call_id {
        wire["tool_call_id"] = json!(id);
    }
    wire
}

#[derive(Serialize)]
struct CompletionRequest {
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: WireMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}
