//! # Agent (orientation)
//!
//! An [`Agent`] is anything that answers the methods of an [`AgentInterface`] when
//! called by name with positional arguments: a bare [`AiService`](crate::service::AiService)
//! or a hook-driven [`AgentProxy`](crate::proxy::AgentProxy). Registries and the
//! planner only ever see this trait, which replaces reflective dispatch over the
//! declared agent methods.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::interface::{AgentInterface, ArgValue};
use crate::memory::ChatMemory;

/// Late binding of a chat memory into an agent that has none.
pub trait MemoryInjectable {
    /// Binds `memory` for every subsequent invocation.
    ///
    /// Fails with [`AgenticError::MemoryAlreadyBound`](crate::AgenticError::MemoryAlreadyBound)
    /// when the agent already carries a conversation state.
    fn set_chat_memory(&self, memory: Arc<dyn ChatMemory>) -> Result<()>;
}

/// A prompt-backed service invocable by method name.
#[async_trait]
pub trait Agent: MemoryInjectable + Send + Sync {
    /// Methods this agent answers.
    fn interface(&self) -> &AgentInterface;

    /// Invokes `method` with positional arguments.
    async fn invoke(&self, method: &str, args: Vec<ArgValue>) -> Result<Value>;

    fn name(&self) -> &str {
        &self.interface().name
    }
}
