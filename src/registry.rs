//! Name-indexed registry of planner-callable agents.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::agent::Agent;
use crate::error::{AgenticError, Result};
use crate::interface::ArgValue;
use crate::specification::AgentSpecification;

/// Invokes one agent method with a positional argument vector.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(&self, args: Vec<ArgValue>) -> Result<Value>;
}

/// Dispatches to a named method of an [`Agent`].
pub struct MethodInvoker {
    agent: Arc<dyn Agent>,
    method: String,
}

impl MethodInvoker {
    pub fn new(agent: Arc<dyn Agent>, method: impl Into<String>) -> Self {
        Self {
            agent,
            method: method.into(),
        }
    }
}

#[async_trait]
impl AgentInvoker for MethodInvoker {
    async fn invoke(&self, args: Vec<ArgValue>) -> Result<Value> {
        self.agent.invoke(&self.method, args).await
    }
}

/// A registered agent: its descriptor and the instance that serves it.
#[derive(Clone)]
pub struct RegisteredAgent {
    pub specification: AgentSpecification,
    pub agent: Arc<dyn Agent>,
}

impl fmt::Debug for RegisteredAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredAgent")
            .field("specification", &self.specification)
            .field("agent", &self.agent.name())
            .finish()
    }
}

/// Agents by name, in registration order.
#[derive(Default, Clone)]
pub struct AgentRegistry {
    agents: Vec<RegisteredAgent>,
    index: HashMap<String, usize>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every annotated method of `agent`; returns how many were added.
    ///
    /// A name already present is replaced in place.
    pub fn register(&mut self, agent: Arc<dyn Agent>) -> Result<usize> {
        let mut registered = 0;
        for method in &agent.interface().methods {
            let invoker = Arc::new(MethodInvoker::new(agent.clone(), method.name.clone()));
            let Some(specification) = AgentSpecification::from_method(method, invoker)? else {
                continue;
            };
            let name = specification.name.clone();
            let entry = RegisteredAgent {
                specification,
                agent: agent.clone(),
            };
            match self.index.get(&name) {
                Some(&slot) => {
                    warn!(agent = %name, "duplicate agent name, replacing previous registration");
                    self.agents[slot] = entry;
                }
                None => {
                    debug!(agent = %name, "registered agent");
                    self.index.insert(name, self.agents.len());
                    self.agents.push(entry);
                }
            }
            registered += 1;
        }
        Ok(registered)
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredAgent> {
        self.index.get(name).map(|&slot| &self.agents[slot])
    }

    /// Like [`get`](Self::get), failing with `MissingAgent`.
    pub fn require(&self, name: &str) -> Result<&RegisteredAgent> {
        self.get(name).ok_or_else(|| AgenticError::missing_agent(name))
    }

    /// `{name: description}, {name: description}, ...`
    pub fn catalog(&self) -> String {
        self.agents
            .iter()
            .map(|a| {
                format!(
                    "{{{}: {}}}",
                    a.specification.name, a.specification.description
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn names(&self) -> Vec<&str> {
        self.agents
            .iter()
            .map(|a| a.specification.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agents", &self.names())
            .finish()
    }
}
