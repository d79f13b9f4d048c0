//! Directives steering the agent proxy loop, and the hook payloads that produce them.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::state::ConversationState;

/// What the proxy does next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentDirective {
    /// Stop and return the current value.
    Terminate,
    /// Invoke the underlying model with the original arguments.
    Prompt,
    /// Delegate to another registered agent with the original arguments.
    Redirect(String),
}

impl AgentDirective {
    pub fn terminate() -> Self {
        AgentDirective::Terminate
    }

    pub fn prompt() -> Self {
        AgentDirective::Prompt
    }

    pub fn redirect_to(agent_name: impl Into<String>) -> Self {
        AgentDirective::Redirect(agent_name.into())
    }
}

/// Payload of the request hook, produced before each model invocation.
#[derive(Clone)]
pub struct AgentRequest {
    pub agent_name: String,
    pub state: Option<Arc<dyn ConversationState>>,
}

/// Payload of the response hook, produced after each model invocation.
#[derive(Clone)]
pub struct AgentResponse {
    pub agent_name: String,
    pub state: Option<Arc<dyn ConversationState>>,
    pub response: Value,
}

impl fmt::Debug for AgentRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentRequest")
            .field("agent_name", &self.agent_name)
            .field("state", &self.state.as_ref().map(|s| s.id()))
            .finish()
    }
}

impl fmt::Debug for AgentResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentResponse")
            .field("agent_name", &self.agent_name)
            .field("state", &self.state.as_ref().map(|s| s.id()))
            .field("response", &self.response)
            .finish()
    }
}

pub type RequestHook = Arc<dyn Fn(&AgentRequest) -> AgentDirective + Send + Sync>;
pub type ResponseHook = Arc<dyn Fn(&AgentResponse) -> AgentDirective + Send + Sync>;

/// Always prompts.
pub fn default_request_hook() -> RequestHook {
    Arc::new(|_| AgentDirective::Prompt)
}

/// Always terminates.
pub fn default_response_hook() -> ResponseHook {
    Arc::new(|_| AgentDirective::Terminate)
}
