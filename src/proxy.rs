//! Hook-driven agent proxy.
//!
//! An [`AgentProxy`] wraps an [`AiService`] and runs a small state machine around
//! every method call. The request hook decides whether to prompt the model,
//! redirect to another registered agent, or stop; after a prompt the response
//! hook decides whether to return the value, prompt again, or redirect. Hooks see
//! the session's [`ConversationState`] when one is bound, which is how agents
//! share decisions across calls.
//!
//! ```text
//! ENTRY -> PRE_HOOK -> (REDIRECT | PROMPT) -> POST_HOOK -> (TERMINATE | PRE_HOOK)
//! ```
//!
//! Every transition reuses the caller's original arguments.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use serde_json::Value;
use tower::Service;
use tracing::{debug, info, instrument};

use crate::agent::{Agent, MemoryInjectable};
use crate::config::AgenticConfig;
use crate::directive::{
    default_request_hook, default_response_hook, AgentDirective, AgentRequest, AgentResponse,
    RequestHook, ResponseHook,
};
use crate::error::{AgenticError, Result};
use crate::interface::{AgentInterface, ArgValue};
use crate::memory::{ChatMemory, MemoryId};
use crate::model::ModelProvider;
use crate::registry::AgentRegistry;
use crate::service::{AiService, AiServiceBuilder};
use crate::state::ConversationState;
use crate::tool::Tool;

const DEFAULT_MAX_HOOK_ITERATIONS: usize = 16;

/// Entry point for building hook-driven agents.
pub struct AgentServices;

impl AgentServices {
    pub fn builder(interface: AgentInterface) -> AgentServicesBuilder {
        AgentServicesBuilder::new(interface)
    }
}

/// Builder for [`AgentProxy`]
pub struct AgentServicesBuilder {
    service: AiServiceBuilder,
    agents: Vec<Arc<dyn Agent>>,
    on_request: RequestHook,
    on_response: ResponseHook,
    max_hook_iterations: usize,
}

impl AgentServicesBuilder {
    pub fn new(interface: AgentInterface) -> Self {
        Self {
            service: AiServiceBuilder::new(interface),
            agents: Vec::new(),
            on_request: default_request_hook(),
            on_response: default_response_hook(),
            max_hook_iterations: DEFAULT_MAX_HOOK_ITERATIONS,
        }
    }

    pub fn model(mut self, model: Arc<dyn ModelProvider>) -> Self {
        self.service = self.service.model(model);
        self
    }

    pub fn chat_memory(mut self, memory: Arc<dyn ChatMemory>) -> Self {
        self.service = self.service.chat_memory(memory);
        self
    }

    pub fn chat_memory_provider<F>(mut self, provider: F) -> Self
    where
        F: Fn(&MemoryId) -> Arc<dyn ChatMemory> + Send + Sync + 'static,
    {
        self.service = self.service.chat_memory_provider(provider);
        self
    }

    /// Binds a conversation state shared by every session key.
    pub fn chat_state<S>(mut self, state: Arc<S>) -> Self
    where
        S: ConversationState + 'static,
    {
        self.service = self.service.chat_memory(state);
        self
    }

    pub fn tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.service = self.service.tools(tools);
        self
    }

    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.service = self.service.tool(tool);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.service = self.service.temperature(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.service = self.service.max_tokens(max_tokens);
        self
    }

    pub fn max_tool_rounds(mut self, rounds: usize) -> Self {
        self.service = self.service.max_tool_rounds(rounds);
        self
    }

    /// Agents reachable through `Redirect`.
    pub fn agents(mut self, agents: Vec<Arc<dyn Agent>>) -> Self {
        self.agents.extend(agents);
        self
    }

    pub fn on_request<F>(mut self, hook: F) -> Self
    where
        F: Fn(&AgentRequest) -> AgentDirective + Send + Sync + 'static,
    {
        self.on_request = Arc::new(hook);
        self
    }

    pub fn on_response<F>(mut self, hook: F) -> Self
    where
        F: Fn(&AgentResponse) -> AgentDirective + Send + Sync + 'static,
    {
        self.on_response = Arc::new(hook);
        self
    }

    /// Prompts allowed within one call before it fails with `HookLoopOverflow`.
    pub fn max_hook_iterations(mut self, limit: usize) -> Self {
        self.max_hook_iterations = limit;
        self
    }

    pub fn config(mut self, config: &AgenticConfig) -> Self {
        self.service = self.service.config(config);
        self.max_hook_iterations = config.hook_loop_limit;
        self
    }

    pub fn build(self) -> Result<AgentProxy> {
        let mut registry = AgentRegistry::new();
        for agent in self.agents {
            registry.register(agent)?;
        }
        Ok(AgentProxy {
            inner: Arc::new(ProxyInner {
                service: self.service.build()?,
                registry,
                on_request: self.on_request,
                on_response: self.on_response,
                max_hook_iterations: self.max_hook_iterations,
            }),
        })
    }
}

struct ProxyInner {
    service: AiService,
    registry: AgentRegistry,
    on_request: RequestHook,
    on_response: ResponseHook,
    max_hook_iterations: usize,
}

/// An agent whose calls are steered by request and response hooks.
#[derive(Clone)]
pub struct AgentProxy {
    inner: Arc<ProxyInner>,
}

impl std::fmt::Debug for AgentProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentProxy")
            .field("service", &self.inner.service)
            .field("registry", &self.inner.registry)
            .field("max_hook_iterations", &self.inner.max_hook_iterations)
            .finish()
    }
}

impl AgentProxy {
    /// Runs the directive loop for one method call.
    #[instrument(skip(self, args), fields(agent = %self.name()))]
    pub async fn call(&self, method: &str, args: Vec<ArgValue>) -> Result<Value> {
        let inner = &self.inner;
        let state = inner.service.conversation_state(method, &args)?;
        let mut prompts = 0;

        loop {
            let request = AgentRequest {
                agent_name: method.to_string(),
                state: state.clone(),
            };
            match (inner.on_request)(&request) {
                AgentDirective::Prompt => {}
                AgentDirective::Redirect(target) => return self.redirect(&target, args).await,
                AgentDirective::Terminate => {
                    debug!("request hook terminated before prompting");
                    return Ok(Value::Null);
                }
            }

            if prompts >= inner.max_hook_iterations {
                return Err(AgenticError::HookLoopOverflow {
                    agent: self.name().to_string(),
                    limit: inner.max_hook_iterations,
                });
            }
            prompts += 1;

            let value = inner.service.call(method, args.clone()).await?;
            let response = AgentResponse {
                agent_name: method.to_string(),
                state: state.clone(),
                response: value,
            };
            match (inner.on_response)(&response) {
                AgentDirective::Terminate => return Ok(response.response),
                AgentDirective::Prompt => {
                    debug!(prompts, "response hook asked for another prompt");
                }
                AgentDirective::Redirect(target) => return self.redirect(&target, args).await,
            }
        }
    }

    async fn redirect(&self, target: &str, args: Vec<ArgValue>) -> Result<Value> {
        let entry = self.inner.registry.require(target)?;
        info!(target, "redirecting");
        entry.specification.invoker().invoke(args).await
    }

    /// The underlying service, for memory access.
    pub fn service(&self) -> &AiService {
        &self.inner.service
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.inner.registry
    }
}

impl MemoryInjectable for AgentProxy {
    fn set_chat_memory(&self, memory: Arc<dyn ChatMemory>) -> Result<()> {
        self.inner.service.set_chat_memory(memory)
    }
}

#[async_trait]
impl Agent for AgentProxy {
    fn interface(&self) -> &AgentInterface {
        self.inner.service.interface()
    }

    async fn invoke(&self, method: &str, args: Vec<ArgValue>) -> Result<Value> {
        self.call(method, args).await
    }
}

/// A method call routed through the proxy as a tower request.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentCall {
    pub method: String,
    pub args: Vec<ArgValue>,
}

impl AgentCall {
    pub fn new(method: impl Into<String>, args: Vec<ArgValue>) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }
}

impl Service<AgentCall> for AgentProxy {
    type Response = Value;
    type Error = AgenticError;
    type Future = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: AgentCall) -> Self::Future {
        let proxy = self.clone();
        Box::pin(async move { AgentProxy::call(&proxy, &req.method, req.args).await })
    }
}
