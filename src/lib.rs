//! # Agentic orchestration for LLM-backed agents
//!
//! Building blocks for composing prompt-backed agents into multi-agent workflows.
//!
//! ## Core Concepts
//!
//! - **Agent interface**: declarative methods (prompt templates plus typed
//!   parameters) answered by an [`AiService`]
//! - **Proxy**: an [`AgentProxy`] runs request and response hooks around every
//!   call; hooks return an [`AgentDirective`] to prompt, redirect or stop
//! - **Conversation state**: chat memory plus a key/value scratchpad shared by the
//!   hooks of one session
//! - **Planner**: an [`AgentsSystem`] lets an LLM pick which registered agent to
//!   call next until it answers `"done"`
//!
//! ## Getting Started
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use agentic::{
//!     Agent, AgentAnnotation, AgentInterface, AgentsSystem, AiService, MethodSpec,
//!     OpenAIProvider, ParamSpec, ParamType,
//! };
//!
//! # async fn example() -> agentic::Result<()> {
//! let config = agentic::config::from_env();
//! let model = Arc::new(OpenAIProvider::from_config(&config));
//!
//! let medical = AgentInterface::new("MedicalExpert").method(
//!     MethodSpec::new("medical", "{{request}}")
//!         .system("You are a medical expert. Answer briefly.")
//!         .param(ParamSpec::v("request", ParamType::Str))
//!         .agent(AgentAnnotation::new("A medical expert")),
//! );
//! let medical: Arc<dyn Agent> = Arc::new(AiService::builder(medical).model(model.clone()).build()?);
//!
//! let system = AgentsSystem::builder(model)
//!     .agent(medical)
//!     .config_from(&config)
//!     .build()?;
//! let answer = system.execute("I broke my leg, what should I do?").await?;
//! println!("{}", answer);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod directive;
pub mod error;
pub mod interface;
pub mod items;
pub mod memory;
pub mod model;
pub mod planner;
pub mod proxy;
pub mod registry;
pub mod service;
pub mod specification;
pub mod state;
pub mod tool;

pub use agent::{Agent, MemoryInjectable};
pub use config::{AgenticConfig, ArgumentBinding, ConfigBuilder, PlannerConfig};
pub use directive::{AgentDirective, AgentRequest, AgentResponse, RequestHook, ResponseHook};
pub use error::{AgenticError, Result};
pub use interface::{
    AgentAnnotation, AgentInterface, ArgValue, MethodSpec, ParamSpec, ParamType, ReturnKind,
};
pub use items::{Message, ModelResponse, Role, ToolCall};
pub use memory::{ChatMemory, ChatMemoryService, MemoryId, MessageWindowChatMemory};
pub use model::{MockProvider, ModelProvider, OpenAIProvider};
pub use planner::{AgentInvocation, AgentsSystem, PlannerAgent};
pub use proxy::{AgentCall, AgentProxy, AgentServices};
pub use registry::{AgentInvoker, AgentRegistry};
pub use service::AiService;
pub use specification::AgentSpecification;
pub use state::{ConversationState, DefaultConversationState};
pub use tool::{tool_typed, FunctionTool, Tool, ToolResult};
