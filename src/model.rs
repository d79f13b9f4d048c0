//! Model abstraction for LLM interactions
//!
//! Wraps the async-openai crate behind [`ModelProvider`] so agent services never
//! depend on a transport. [`MockProvider`] replays scripted responses for tests
//! and offline demos.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolType,
        CreateChatCompletionRequestArgs, FunctionCall, FunctionObjectArgs,
    },
    Client,
};
use async_trait::async_trait;
use serde_json::Value;

use crate::config::AgenticConfig;
use crate::error::{AgenticError, Result};
use crate::items::{Message, ModelResponse, Role, ToolCall};
use crate::memory::lock;
use crate::tool::Tool;

/// Trait for model providers
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Generate a completion
    async fn complete(
        &self,
        messages: Vec<Message>,
        tools: Vec<Arc<dyn Tool>>,
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    ) -> Result<ModelResponse>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// OpenAI model provider using async-openai
pub struct OpenAIProvider {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider reading `OPENAI_API_KEY`
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            model: model.into(),
        }
    }

    /// Create a provider for the configured default model
    pub fn from_config(config: &AgenticConfig) -> Self {
        Self::new(config.default_model.clone())
    }

    /// Create with a custom client (e.g. an OpenAI-compatible local endpoint)
    pub fn with_client(client: Client<OpenAIConfig>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    fn convert_message(&self, msg: &Message) -> Result<ChatCompletionRequestMessage> {
        let converted = match msg.role {
            Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(msg.content.clone())
                .build()?
                .into(),
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(msg.content.clone())
                .build()?
                .into(),
            Role::Assistant => {
                let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
                builder.content(msg.content.clone());
                if let Some(tool_calls) = &msg.tool_calls {
                    let calls: Vec<_> = tool_calls
                        .iter()
                        .map(|tc| ChatCompletionMessageToolCall {
                            id: tc.id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: FunctionCall {
                                name: tc.name.clone(),
                                arguments: tc.arguments.to_string(),
                            },
                        })
                        .collect();
                    builder.tool_calls(calls);
                }
                builder.build()?.into()
            }
            Role::Tool => ChatCompletionRequestToolMessageArgs::default()
                .content(msg.content.clone())
                .tool_call_id(msg.tool_call_id.clone().unwrap_or_default())
                .build()?
                .into(),
        };
        Ok(converted)
    }

    fn convert_tools(&self, tools: &[Arc<dyn Tool>]) -> Result<Vec<ChatCompletionTool>> {
        tools
            .iter()
            .map(|tool| {
                let function = FunctionObjectArgs::default()
                    .name(tool.name())
                    .description(tool.description())
                    .parameters(tool.parameters_schema())
                    .build()?;
                Ok(ChatCompletionToolArgs::default()
                    .r#type(ChatCompletionToolType::Function)
                    .function(function)
                    .build()?)
            })
            .collect()
    }
}

#[async_trait]
impl ModelProvider for OpenAIProvider {
    async fn complete(
        &self,
        messages: Vec<Message>,
        tools: Vec<Arc<dyn Tool>>,
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    ) -> Result<ModelResponse> {
        let openai_messages = messages
            .iter()
            .map(|msg| self.convert_message(msg))
            .collect::<Result<Vec<_>>>()?;

        let mut request = CreateChatCompletionRequestArgs::default();
        request.model(&self.model).messages(openai_messages);
        if !tools.is_empty() {
            request.tools(self.convert_tools(&tools)?);
        }
        if let Some(temp) = temperature {
            request.temperature(temp);
        }
        if let Some(max) = max_tokens {
            request.max_completion_tokens(max);
        }

        let response = self.client.chat().create(request.build()?).await?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| AgenticError::ModelBehavior {
                message: "No choices in response".to_string(),
            })?;

        let tool_calls = choice
            .message
            .tool_calls
            .iter()
            .flatten()
            .map(|tc| ToolCall {
                id: tc.id.clone(),
                name: tc.function.name.clone(),
                arguments: serde_json::from_str(&tc.function.arguments).unwrap_or(Value::Null),
            })
            .collect();

        Ok(ModelResponse {
            id: response.id.clone(),
            content: choice.message.content.clone(),
            tool_calls,
            finish_reason: choice.finish_reason.as_ref().map(|r| format!("{:?}", r)),
            created_at: chrono::Utc::now(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

type Responder = Arc<dyn Fn(&[Message]) -> ModelResponse + Send + Sync>;

/// Scripted model provider.
///
/// Queued responses are served first, in order. Once the queue is empty the
/// responder closure (if any) computes the answer from the request messages,
/// otherwise `"Default response"` is returned. Every request is recorded.
pub struct MockProvider {
    model: String,
    responses: Mutex<VecDeque<ModelResponse>>,
    responder: Option<Responder>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl MockProvider {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            responses: Mutex::new(VecDeque::new()),
            responder: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(self, response: ModelResponse) -> Self {
        lock(&self.responses).push_back(response);
        self
    }

    pub fn with_message(self, content: impl Into<String>) -> Self {
        self.with_response(ModelResponse::new_message(content))
    }

    pub fn with_tool_call(self, tool_name: impl Into<String>, args: Value) -> Self {
        let tool_call = ToolCall {
            id: uuid::Uuid::new_v4().to_string(),
            name: tool_name.into(),
            arguments: args,
        };
        self.with_response(ModelResponse::new_tool_calls(vec![tool_call]))
    }

    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&[Message]) -> ModelResponse + Send + Sync + 'static,
    {
        self.responder = Some(Arc::new(responder));
        self
    }

    /// Number of completions served so far.
    pub fn calls(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Messages received by every completion, oldest first.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        lock(&self.requests).clone()
    }
}

impl fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockProvider")
            .field("model", &self.model)
            .field("queued", &lock(&self.responses).len())
            .field("calls", &self.calls())
            .finish()
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    async fn complete(
        &self,
        messages: Vec<Message>,
        _tools: Vec<Arc<dyn Tool>>,
        _temperature: Option<f32>,
        _max_tokens: Option<u32>,
    ) -> Result<ModelResponse> {
        let queued = lock(&self.responses).pop_front();
        let response = match (queued, &self.responder) {
            (Some(response), _) => response,
            (None, Some(responder)) => responder(&messages),
            (None, None) => ModelResponse::new_message("Default response"),
        };
        lock(&self.requests).push(messages);
        Ok(response)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::FunctionTool;

    #[test]
    fn test_openai_provider_creation() {
        let provider = OpenAIProvider::new("gpt-4o");
        assert_eq!(provider.model_name(), "gpt-4o");
    }

    #[test]
    fn test_openai_provider_from_config() {
        let config = crate::config::ConfigBuilder::new().model("qwen3:8b").build();
        assert_eq!(OpenAIProvider::from_config(&config).model_name(), "qwen3:8b");
        assert_eq!(
            OpenAIProvider::from_config(&AgenticConfig::default()).model_name(),
            "gpt-4o-mini"
        );
    }

    #[test]
    fn test_message_conversion() {
        let provider = OpenAIProvider::new("gpt-4o");
        let call = ToolCall {
            id: "call_1".into(),
            name: "credit".into(),
            arguments: serde_json::json!({"user": "Mario"}),
        };
        for msg in [
            Message::system("You are helpful"),
            Message::user("Hello"),
            Message::assistant_with_tool_calls("", vec![call]),
            Message::tool("1100", "call_1"),
        ] {
            assert!(provider.convert_message(&msg).is_ok());
        }
    }

    #[test]
    fn test_tool_conversion() {
        let provider = OpenAIProvider::new("gpt-4o");
        let tool = Arc::new(FunctionTool::simple("echo", "Echo input", |s: String| s));
        let tools: Vec<Arc<dyn Tool>> = vec![tool];
        let converted = provider.convert_tools(&tools).unwrap();

        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].function.name, "echo");
        assert_eq!(
            converted[0].function.description.as_deref(),
            Some("Echo input")
        );
    }

    #[tokio::test]
    async fn test_mock_provider_multiple_responses() {
        let provider = MockProvider::new("mock-model")
            .with_message("First")
            .with_message("Second");

        let first = provider.complete(vec![], vec![], None, None).await.unwrap();
        assert_eq!(first.text(), "First");
        let second = provider.complete(vec![], vec![], None, None).await.unwrap();
        assert_eq!(second.text(), "Second");
        let third = provider.complete(vec![], vec![], None, None).await.unwrap();
        assert_eq!(third.text(), "Default response");
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_mock_provider_responder_sees_messages() {
        let provider = MockProvider::new("mock-model")
            .with_responder(|msgs| ModelResponse::new_message(format!("{} messages", msgs.len())));

        let response = provider
            .complete(vec![Message::user("a"), Message::user("b")], vec![], None, None)
            .await
            .unwrap();
        assert_eq!(response.text(), "2 messages");
        assert_eq!(provider.requests()[0][1].content, "b");
    }

    #[tokio::test]
    async fn test_mock_provider_tool_call() {
        let provider = MockProvider::new("mock-model")
            .with_tool_call("withdraw", serde_json::json!({"user": "Mario", "amount": 100.0}));

        let response = provider.complete(vec![], vec![], None, None).await.unwrap();
        assert!(response.has_tool_calls());
        assert_eq!(response.tool_calls[0].name, "withdraw");
    }
}
