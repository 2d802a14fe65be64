use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use solvent_core::{Conversation, EngineConfig, EngineError, Role, ToolCall};

/// Capability advertisement forwarded to the engine with every request.
#[derive(Clone, Debug, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// One engine turn: either a final answer or a batch of tool calls to
/// execute before asking again. `thought` carries any assistant prose
/// that accompanied the tool request; aborted runs fall back to it.
#[derive(Clone, Debug, PartialEq)]
pub enum Decision {
    FinalAnswer(String),
    RequestTools { thought: String, calls: Vec<ToolCall> },
}

#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    /// Human-readable identity for logs and reports.
    fn describe(&self) -> String;

    async fn decide(
        &self,
        conversation: &Conversation,
        tools: &[ToolDefinition],
    ) -> Result<Decision, EngineError>;
}

/// OpenAI-compatible `/chat/completions` engine.
///
/// Temperature is pinned to 0.0: identical conversations should produce
/// identical decisions as far as the backend allows.
pub struct ChatHttpEngine {
    name: String,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
    client: reqwest::Client,
}

impl ChatHttpEngine {
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| EngineError::Fatal(format!("could not build http client: {error}")))?;

        Ok(Self {
            name: config.name.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            client,
        })
    }

    fn request_payload(&self, conversation: &Conversation, tools: &[ToolDefinition]) -> ChatRequest {
        let messages = conversation.messages().iter().map(WireMessage::from_message).collect();
        let tools = if tools.is_empty() {
            None
        } else {
            Some(tools.iter().map(WireTool::from_definition).collect())
        };

        ChatRequest { model: self.model.clone(), messages, temperature: 0.0, tools }
    }
}

#[async_trait]
impl ReasoningEngine for ChatHttpEngine {
    fn describe(&self) -> String {
        format!("{} ({} @ {})", self.name, self.model, self.base_url)
    }

    async fn decide(
        &self,
        conversation: &Conversation,
        tools: &[ToolDefinition],
    ) -> Result<Decision, EngineError> {
        let url = format!("{}/chat/completions", self.base_url);
        let payload = self.request_payload(conversation, tools);

        let mut request = self.client.post(&url).json(&payload);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        debug!(engine = %self.name, messages = conversation.len(), "requesting engine decision");

        let response = request.send().await.map_err(|error| {
            // Connect errors and timeouts are worth retrying.
            EngineError::Transient(format!("request to `{url}` failed: {error}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("engine returned {status}: {body}");
            return if status.as_u16() == 408 || status.as_u16() == 429 || status.is_server_error()
            {
                Err(EngineError::Transient(message))
            } else {
                Err(EngineError::Fatal(message))
            };
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|error| EngineError::Fatal(format!("malformed engine response: {error}")))?;

        decision_from_response(body)
    }
}

fn decision_from_response(body: ChatResponse) -> Result<Decision, EngineError> {
    let choice = body
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| EngineError::Fatal("engine response carried no choices".to_string()))?;

    let calls = choice.message.tool_calls.unwrap_or_default();
    if !calls.is_empty() {
        let calls = calls
            .into_iter()
            .enumerate()
            .map(|(index, call)| {
                // Some backends omit call ids; synthesize stable ones so
                // results can still be paired with their requests.
                let id = call.id.unwrap_or_else(|| format!("call-{}", index + 1));
                let arguments = serde_json::from_str(&call.function.arguments)
                    .unwrap_or(Value::String(call.function.arguments));
                ToolCall::new(id, call.function.name, arguments)
            })
            .collect();
        return Ok(Decision::RequestTools {
            thought: choice.message.content.unwrap_or_default(),
            calls,
        });
    }

    Ok(Decision::FinalAnswer(choice.message.content.unwrap_or_default()))
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl WireMessage {
    fn from_message(message: &solvent_core::Message) -> Self {
        let role = match message.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };

        let tool_calls = if message.tool_calls.is_empty() {
            None
        } else {
            Some(
                message
                    .tool_calls
                    .iter()
                    .map(|call| WireToolCall {
                        id: Some(call.id.clone()),
                        kind: "function".to_string(),
                        function: WireFunction {
                            name: call.name.clone(),
                            arguments: call.arguments.to_string(),
                        },
                    })
                    .collect(),
            )
        };

        Self {
            role,
            content: message.content.clone(),
            tool_calls,
            tool_call_id: message.tool_result_for.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireToolFunction,
}

impl WireTool {
    fn from_definition(definition: &ToolDefinition) -> Self {
        Self {
            kind: "function",
            function: WireToolFunction {
                name: definition.name.clone(),
                description: definition.description.clone(),
                parameters: definition.parameters.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct WireToolFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireResponseToolCall>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireResponseToolCall {
    #[serde(default)]
    id: Option<String>,
    function: WireFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}
