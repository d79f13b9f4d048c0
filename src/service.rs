//! Prompt-backed agent service.
//!
//! [`AiService`] answers the methods of an [`AgentInterface`] by rendering the
//! method's templates, sending them to a [`ModelProvider`] (with an optional chat
//! memory per session) and running the tool-call loop until the model produces a
//! final answer.

use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::agent::{Agent, MemoryInjectable};
use crate::config::AgenticConfig;
use crate::error::{AgenticError, Result};
use crate::interface::{render_template, AgentInterface, ArgValue, MethodSpec, ReturnKind};
use crate::items::{Message, ToolCall};
use crate::memory::{lock, ChatMemory, ChatMemoryProvider, ChatMemoryService, MemoryId};
use crate::model::ModelProvider;
use crate::state::ConversationState;
use crate::tool::Tool;

const DEFAULT_MAX_TOOL_ROUNDS: usize = 10;

/// Messages of one invocation: the session memory, or a throwaway list.
enum Transcript {
    Memory(Arc<dyn ChatMemory>),
    Local(Vec<Message>),
}

impl Transcript {
    fn push(&mut self, message: Message) {
        match self {
            Transcript::Memory(memory) => memory.add(message),
            Transcript::Local(messages) => messages.push(message),
        }
    }

    fn messages(&self) -> Vec<Message> {
        match self {
            Transcript::Memory(memory) => memory.messages(),
            Transcript::Local(messages) => messages.clone(),
        }
    }
}

pub struct AiService {
    interface: AgentInterface,
    model: Arc<dyn ModelProvider>,
    tools: Vec<Arc<dyn Tool>>,
    memory: Mutex<Option<Arc<ChatMemoryService>>>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    max_tool_rounds: usize,
}

impl fmt::Debug for AiService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiService")
            .field("agent", &self.interface.name)
            .field("model", &self.model.model_name())
            .field("tools", &self.tools.len())
            .field("memory", &*lock(&self.memory))
            .finish()
    }
}

impl AiService {
    pub fn builder(interface: AgentInterface) -> AiServiceBuilder {
        AiServiceBuilder::new(interface)
    }

    /// Invokes `method` with positional arguments.
    #[instrument(skip(self, args), fields(agent = %self.interface.name))]
    pub async fn call(&self, method: &str, args: Vec<ArgValue>) -> Result<Value> {
        let spec = self.method(method, &args)?;
        let memory = self.resolve_memory(spec, &args)?;

        let vars = template_vars(spec, &args);
        let system = spec
            .system_template
            .as_deref()
            .map(|template| render_template(template, &vars));
        let mut user = render_template(&spec.user_template, &vars);
        if let ReturnKind::Json { schema } = &spec.returns {
            user.push_str(&format_instructions(schema));
        }

        let mut transcript = match memory {
            Some(memory) => Transcript::Memory(memory),
            None => Transcript::Local(Vec::new()),
        };
        if let Some(system) = system {
            transcript.push(Message::system(system));
        }
        transcript.push(Message::user(user));

        let text = self.complete(&mut transcript).await?;
        parse_answer(&spec.returns, &text)
    }

    /// The conversation state bound to the session `args` select, if any.
    pub fn conversation_state(
        &self,
        method: &str,
        args: &[ArgValue],
    ) -> Result<Option<Arc<dyn ConversationState>>> {
        let spec = self.method(method, args)?;
        let memory = self.resolve_memory(spec, args)?;
        Ok(memory.and_then(|memory| memory.into_conversation_state()))
    }

    pub fn has_chat_memory(&self) -> bool {
        lock(&self.memory).is_some()
    }

    /// Existing memory of a session, without creating one.
    pub fn chat_memory(&self, id: &MemoryId) -> Option<Arc<dyn ChatMemory>> {
        self.memory_service().and_then(|service| service.get(id))
    }

    pub fn get_or_create_chat_memory(&self, id: &MemoryId) -> Option<Arc<dyn ChatMemory>> {
        self.memory_service()
            .map(|service| service.get_or_create(id))
    }

    /// Drops the memory of a session; returns whether one was held.
    pub fn evict_chat_memory(&self, id: &MemoryId) -> bool {
        self.memory_service()
            .map(|service| service.evict(id))
            .unwrap_or(false)
    }

    /// Number of live per-session memories.
    pub fn session_count(&self) -> usize {
        self.memory_service()
            .map(|service| service.len())
            .unwrap_or(0)
    }

    fn memory_service(&self) -> Option<Arc<ChatMemoryService>> {
        lock(&self.memory).clone()
    }

    fn method(&self, method: &str, args: &[ArgValue]) -> Result<&MethodSpec> {
        let spec = self
            .interface
            .find(method)
            .ok_or_else(|| AgenticError::UnknownMethod {
                agent: self.interface.name.clone(),
                method: method.to_string(),
            })?;
        if spec.params.len() != args.len() {
            return Err(AgenticError::ArgumentCount {
                method: method.to_string(),
                expected: spec.params.len(),
                actual: args.len(),
            });
        }
        Ok(spec)
    }

    fn resolve_memory(
        &self,
        spec: &MethodSpec,
        args: &[ArgValue],
    ) -> Result<Option<Arc<dyn ChatMemory>>> {
        let Some(service) = self.memory_service() else {
            return Ok(None);
        };
        let id = match spec.memory_id_index() {
            Some(index) => match &args[index] {
                ArgValue::Null => {
                    return Err(AgenticError::NullMemoryId {
                        method: spec.name.clone(),
                        param: spec.params[index]
                            .resolved_name()
                            .unwrap_or_default()
                            .to_string(),
                    })
                }
                value => MemoryId::from(value.to_string()),
            },
            None => MemoryId::default_id(),
        };
        Ok(Some(service.get_or_create(&id)))
    }

    async fn complete(&self, transcript: &mut Transcript) -> Result<String> {
        let mut rounds = 0;
        loop {
            let response = self
                .model
                .complete(
                    transcript.messages(),
                    self.tools.clone(),
                    self.temperature,
                    self.max_tokens,
                )
                .await?;

            if !response.has_tool_calls() {
                let text = response.text().to_string();
                transcript.push(Message::assistant(text.clone()));
                return Ok(text);
            }

            if rounds >= self.max_tool_rounds {
                return Err(AgenticError::MaxToolRounds {
                    max_rounds: self.max_tool_rounds,
                });
            }
            rounds += 1;

            transcript.push(Message::assistant_with_tool_calls(
                response.text(),
                response.tool_calls.clone(),
            ));
            for call in &response.tool_calls {
                let output = self.execute_tool(call).await?;
                transcript.push(Message::tool(output, call.id.clone()));
            }
        }
    }

    async fn execute_tool(&self, call: &ToolCall) -> Result<String> {
        let tool = self
            .tools
            .iter()
            .find(|tool| tool.name() == call.name)
            .ok_or_else(|| AgenticError::ToolExecution {
                message: format!("unknown tool '{}'", call.name),
            })?;
        debug!(tool = %call.name, "executing tool");
        let result = tool.execute(call.arguments.clone()).await?;
        Ok(result.to_content())
    }
}

fn template_vars(spec: &MethodSpec, args: &[ArgValue]) -> Vec<(String, String)> {
    let mut vars: Vec<(String, String)> = spec
        .params
        .iter()
        .zip(args)
        .filter_map(|(param, arg)| {
            param
                .resolved_name()
                .map(|name| (name.to_string(), arg.to_string()))
        })
        .collect();
    if let [only] = args {
        vars.push(("it".to_string(), only.to_string()));
    }
    vars
}

fn format_instructions(schema: &Value) -> String {
    format!(
        "\nYou must answer strictly with a JSON object matching this schema, without any other text:\n{}",
        schema
    )
}

fn parse_answer(returns: &ReturnKind, text: &str) -> Result<Value> {
    match returns {
        ReturnKind::Text => Ok(Value::String(text.to_string())),
        ReturnKind::Json { .. } => {
            serde_json::from_str(strip_code_fence(text)).map_err(|e| AgenticError::ModelBehavior {
                message: format!("answer is not valid JSON ({}): {}", e, text),
            })
        }
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

impl MemoryInjectable for AiService {
    fn set_chat_memory(&self, memory: Arc<dyn ChatMemory>) -> Result<()> {
        let mut current = lock(&self.memory);
        let bound_state = current
            .as_ref()
            .map(|service| service.get_or_create(&MemoryId::default_id()))
            .and_then(|memory| memory.into_conversation_state());
        if bound_state.is_some() {
            return Err(AgenticError::MemoryAlreadyBound);
        }
        *current = Some(Arc::new(ChatMemoryService::fixed(memory)));
        Ok(())
    }
}

#[async_trait]
impl Agent for AiService {
    fn interface(&self) -> &AgentInterface {
        &self.interface
    }

    async fn invoke(&self, method: &str, args: Vec<ArgValue>) -> Result<Value> {
        self.call(method, args).await
    }
}

/// Builder for [`AiService`]
pub struct AiServiceBuilder {
    interface: AgentInterface,
    model: Option<Arc<dyn ModelProvider>>,
    tools: Vec<Arc<dyn Tool>>,
    memory: Option<ChatMemoryService>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    max_tool_rounds: usize,
}

impl AiServiceBuilder {
    pub fn new(interface: AgentInterface) -> Self {
        Self {
            interface,
            model: None,
            tools: Vec::new(),
            memory: None,
            temperature: None,
            max_tokens: None,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn model(mut self, model: Arc<dyn ModelProvider>) -> Self {
        self.model = Some(model);
        self
    }

    /// One memory shared by every session key.
    pub fn chat_memory(mut self, memory: Arc<dyn ChatMemory>) -> Self {
        self.memory = Some(ChatMemoryService::fixed(memory));
        self
    }

    /// One memory per session key, created on first use.
    pub fn chat_memory_provider<F>(mut self, provider: F) -> Self
    where
        F: Fn(&MemoryId) -> Arc<dyn ChatMemory> + Send + Sync + 'static,
    {
        let provider: ChatMemoryProvider = Arc::new(provider);
        self.memory = Some(ChatMemoryService::with_provider(provider));
        self
    }

    pub fn tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    /// Applies sampling and tool-round settings.
    pub fn config(mut self, config: &AgenticConfig) -> Self {
        self.temperature = config.temperature;
        self.max_tokens = config.max_tokens;
        self.max_tool_rounds = config.max_tool_rounds;
        self
    }

    pub fn build(self) -> Result<AiService> {
        let model = self.model.ok_or_else(|| AgenticError::Configuration {
            message: format!("no model configured for agent '{}'", self.interface.name),
        })?;

        for method in &self.interface.methods {
            let memory_ids = method.params.iter().filter(|p| p.memory_id).count();
            if memory_ids > 1 {
                return Err(AgenticError::Configuration {
                    message: format!(
                        "method '{}' declares {} memory id parameters, at most one is allowed",
                        method.name, memory_ids
                    ),
                });
            }
        }

        Ok(AiService {
            interface: self.interface,
            model,
            tools: self.tools,
            memory: Mutex::new(self.memory.map(Arc::new)),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            max_tool_rounds: self.max_tool_rounds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::{ParamSpec, ParamType};
    use crate::items::Role;
    use crate::memory::MessageWindowChatMemory;
    use crate::model::MockProvider;
    use crate::state::DefaultConversationState;
    use crate::tool::FunctionTool;
    use schemars::JsonSchema;
    use serde::Deserialize;
    use serde_json::json;

    fn echo_interface() -> AgentInterface {
        AgentInterface::new("Echo").method(
            MethodSpec::new("ask", "Answer this: {{question}}")
                .system("You are terse.")
                .param(ParamSpec::v("question", ParamType::Str)),
        )
    }

    #[tokio::test]
    async fn test_renders_templates_without_memory() {
        let model = Arc::new(MockProvider::new("mock").with_message("42"));
        let service = AiService::builder(echo_interface())
            .model(model.clone())
            .build()
            .unwrap();

        let answer = service.call("ask", vec!["the meaning".into()]).await.unwrap();
        assert_eq!(answer, json!("42"));

        let request = &model.requests()[0];
        assert_eq!(request.len(), 2);
        assert_eq!(request[0].role, Role::System);
        assert_eq!(request[1].content, "Answer this: the meaning");
    }

    #[tokio::test]
    async fn test_it_placeholder_for_single_parameter() {
        let interface = AgentInterface::new("Echo").method(
            MethodSpec::new("shout", "{{it}}!").param(ParamSpec::named("text", ParamType::Str)),
        );
        let model = Arc::new(MockProvider::new("mock"));
        let service = AiService::builder(interface)
            .model(model.clone())
            .build()
            .unwrap();

        service.call("shout", vec!["hey".into()]).await.unwrap();
        assert_eq!(model.requests()[0][0].content, "hey!");
    }

    #[tokio::test]
    async fn test_unknown_method_and_arity() {
        let service = AiService::builder(echo_interface())
            .model(Arc::new(MockProvider::new("mock")))
            .build()
            .unwrap();

        let err = service.call("nope", vec![]).await.unwrap_err();
        assert!(matches!(err, AgenticError::UnknownMethod { .. }));

        let err = service.call("ask", vec![]).await.unwrap_err();
        assert!(matches!(
            err,
            AgenticError::ArgumentCount {
                expected: 1,
                actual: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_build_requires_model() {
        let err = AiService::builder(echo_interface()).build().unwrap_err();
        assert!(matches!(err, AgenticError::Configuration { .. }));
    }

    #[test]
    fn test_build_rejects_two_memory_ids() {
        let interface = AgentInterface::new("Bad").method(
            MethodSpec::new("chat", "{{a}} {{b}}")
                .param(ParamSpec::memory_id("a"))
                .param(ParamSpec::memory_id("b")),
        );
        let err = AiService::builder(interface)
            .model(Arc::new(MockProvider::new("mock")))
            .build()
            .unwrap_err();
        assert!(matches!(err, AgenticError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_memory_accumulates_per_session() {
        let interface = AgentInterface::new("Chat").method(
            MethodSpec::new("chat", "{{message}}")
                .system("Be nice.")
                .param(ParamSpec::memory_id("user"))
                .param(ParamSpec::v("message", ParamType::Str)),
        );
        let model = Arc::new(MockProvider::new("mock").with_message("hi").with_message("again"));
        let service = AiService::builder(interface)
            .model(model.clone())
            .chat_memory_provider(|id| {
                Arc::new(MessageWindowChatMemory::with_id(id.clone(), 10)) as Arc<dyn ChatMemory>
            })
            .build()
            .unwrap();

        service
            .call("chat", vec!["alice".into(), "hello".into()])
            .await
            .unwrap();
        service
            .call("chat", vec!["alice".into(), "hello?".into()])
            .await
            .unwrap();

        let memory = service.chat_memory(&"alice".into()).unwrap();
        let messages = memory.messages();
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[4].content, "again");
        assert!(service.chat_memory(&"bob".into()).is_none());

        assert!(service.evict_chat_memory(&"alice".into()));
        assert!(service.chat_memory(&"alice".into()).is_none());
    }

    #[tokio::test]
    async fn test_null_memory_id_fails() {
        let interface = AgentInterface::new("Chat").method(
            MethodSpec::new("chat", "{{message}}")
                .param(ParamSpec::memory_id("user"))
                .param(ParamSpec::v("message", ParamType::Str)),
        );
        let service = AiService::builder(interface)
            .model(Arc::new(MockProvider::new("mock")))
            .chat_memory_provider(|_| {
                Arc::new(MessageWindowChatMemory::with_max_messages(10)) as Arc<dyn ChatMemory>
            })
            .build()
            .unwrap();

        let err = service
            .call("chat", vec![ArgValue::Null, "hello".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, AgenticError::NullMemoryId { ref param, .. } if param == "user"));
    }

    #[tokio::test]
    async fn test_tool_loop() {
        let interface = AgentInterface::new("Calc")
            .method(MethodSpec::new("run", "{{it}}").param(ParamSpec::named("q", ParamType::Str)));
        let model = Arc::new(
            MockProvider::new("mock")
                .with_tool_call("double", json!({"n": 21}))
                .with_message("done: 42"),
        );
        let tool = FunctionTool::new("double", "Doubles n", json!({"type": "object"}), |args| {
            Ok(json!(args["n"].as_i64().unwrap_or(0) * 2))
        });
        let service = AiService::builder(interface)
            .model(model.clone())
            .tool(tool)
            .build()
            .unwrap();

        let answer = service.call("run", vec!["go".into()]).await.unwrap();
        assert_eq!(answer, json!("done: 42"));

        let second = &model.requests()[1];
        assert_eq!(second.len(), 3);
        assert!(second[1].has_tool_calls());
        assert_eq!(second[2].role, Role::Tool);
        assert_eq!(second[2].content, "42");
    }

    #[tokio::test]
    async fn test_unknown_tool_and_round_limit() {
        let interface = AgentInterface::new("Calc")
            .method(MethodSpec::new("run", "{{it}}").param(ParamSpec::named("q", ParamType::Str)));
        let service = AiService::builder(interface.clone())
            .model(Arc::new(MockProvider::new("mock").with_tool_call("ghost", json!({}))))
            .build()
            .unwrap();
        let err = service.call("run", vec!["go".into()]).await.unwrap_err();
        assert!(matches!(err, AgenticError::ToolExecution { .. }));

        let looping = MockProvider::new("mock").with_responder(|_| {
            crate::items::ModelResponse::new_tool_calls(vec![ToolCall {
                id: "c".into(),
                name: "noop".into(),
                arguments: json!({}),
            }])
        });
        let service = AiService::builder(interface)
            .model(Arc::new(looping))
            .tool(FunctionTool::simple("noop", "Does nothing", |s: String| s))
            .max_tool_rounds(2)
            .build()
            .unwrap();
        let err = service.call("run", vec!["go".into()]).await.unwrap_err();
        assert!(matches!(err, AgenticError::MaxToolRounds { max_rounds: 2 }));
    }

    #[derive(Debug, Deserialize, JsonSchema)]
    struct Verdict {
        #[allow(dead_code)]
        ok: bool,
    }

    #[tokio::test]
    async fn test_json_answer_with_fences() {
        let interface = AgentInterface::new("Judge").method(
            MethodSpec::new("judge", "{{it}}")
                .param(ParamSpec::named("case", ParamType::Str))
                .returns_json::<Verdict>(),
        );
        let model = Arc::new(
            MockProvider::new("mock")
                .with_message("```json\n{\"ok\": true}\n```")
                .with_message("not json"),
        );
        let service = AiService::builder(interface)
            .model(model.clone())
            .build()
            .unwrap();

        let answer = service.call("judge", vec!["x".into()]).await.unwrap();
        assert_eq!(answer, json!({"ok": true}));
        assert!(model.requests()[0][0].content.contains("JSON"));

        let err = service.call("judge", vec!["y".into()]).await.unwrap_err();
        assert!(matches!(err, AgenticError::ModelBehavior { .. }));
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("```\n[1]```"), "[1]");
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_set_chat_memory() {
        let service = AiService::builder(echo_interface())
            .model(Arc::new(MockProvider::new("mock")))
            .build()
            .unwrap();
        assert!(!service.has_chat_memory());

        let memory: Arc<dyn ChatMemory> = Arc::new(MessageWindowChatMemory::with_max_messages(10));
        service.set_chat_memory(memory.clone()).unwrap();
        service.call("ask", vec!["q".into()]).await.unwrap();
        assert_eq!(memory.messages().len(), 3);
    }

    #[test]
    fn test_set_chat_memory_rejected_with_state() {
        let state = Arc::new(DefaultConversationState::with_max_messages(10));
        let service = AiService::builder(echo_interface())
            .model(Arc::new(MockProvider::new("mock")))
            .chat_memory(state)
            .build()
            .unwrap();

        let err = service
            .set_chat_memory(Arc::new(MessageWindowChatMemory::with_max_messages(10)))
            .unwrap_err();
        assert!(matches!(err, AgenticError::MemoryAlreadyBound));
        assert!(service
            .conversation_state("ask", &[ArgValue::from("q")])
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_set_chat_memory_rejected_with_provider_state() {
        let service = AiService::builder(echo_interface())
            .model(Arc::new(MockProvider::new("mock")))
            .chat_memory_provider(|id| {
                Arc::new(DefaultConversationState::new(Arc::new(
                    MessageWindowChatMemory::with_id(id.clone(), 10),
                ))) as Arc<dyn ChatMemory>
            })
            .build()
            .unwrap();

        let err = service
            .set_chat_memory(Arc::new(MessageWindowChatMemory::with_max_messages(10)))
            .unwrap_err();
        assert!(matches!(err, AgenticError::MemoryAlreadyBound));
        assert!(service
            .conversation_state("ask", &[ArgValue::from("q")])
            .unwrap()
            .is_some());
    }
}
