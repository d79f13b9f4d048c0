//! LLM-driven planner over a set of registered agents.
//!
//! [`AgentsSystem::execute`] asks the [`PlannerAgent`] which agent to call next,
//! invokes it with the arguments the planner produced, and feeds the answer back
//! until the planner answers `"done"` or the step budget is spent. Each invoked
//! agent receives a shared scratch memory for the duration of its call; on
//! success that exchange is copied into the planner's own memory so later steps
//! see what happened.

use std::collections::HashMap;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use crate::agent::{Agent, MemoryInjectable};
use crate::config::{AgenticConfig, ArgumentBinding, PlannerConfig};
use crate::error::{AgenticError, Result};
use crate::interface::{AgentInterface, ArgValue, MethodSpec, ParamSpec, ParamType};
use crate::items::Role;
use crate::memory::{ChatMemory, MemoryId, MessageWindowChatMemory};
use crate::model::ModelProvider;
use crate::registry::AgentRegistry;
use crate::service::AiService;
use crate::specification::AgentSpecification;

const PLANNER_SYSTEM_PROMPT: &str = "\
You are a planner expert that is provided with a set of agents.
You know nothing about any domain, don't take any assumptions about the user request,
the only thing that you can do is relying on the provided agents.

Your role is to analyze the user request and decide which of the provided agent to call
next to address it. You return an agent invocation containing the name of the agent and the arguments
to pass to it. Generate the agent invocation also considering the past messages.
If the last response already contains an appropriate answer, simply return an agent invocation with agent name \"done\".

For each agent it will be provided both the name and description in the format {name: description}.
";

const PLANNER_USER_PROMPT: &str = "\
Decide which agent to invoke next, doing things in small steps and never taking any shortcuts or relying on your own knowledge.
Ignore the fact the user's request is already clear or explicit.
Don't try to answer the user request on any intermediary doubt on your own.
You know nothing except the provided agents and their descriptions.
You MUST query all necessary agents.

The comma separated list of available agents is: '{{agents}}'.
The user request is: '{{request}}'.
The last received response is: '{{lastResponse}}'.
";

const PLAN_METHOD: &str = "plan";

/// The planner's decision for one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AgentInvocation {
    /// Agent to call next, or `"done"`.
    #[serde(rename = "agentName", alias = "agent_name")]
    pub agent_name: String,

    /// Arguments by parameter name, in the order the model emitted them.
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl AgentInvocation {
    pub fn new(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            arguments: Map::new(),
        }
    }

    pub fn argument(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    pub fn is_done(&self) -> bool {
        self.agent_name.trim().eq_ignore_ascii_case("done")
    }

    /// Arguments as text keyed by name.
    pub fn string_arguments(&self) -> HashMap<String, String> {
        self.arguments
            .iter()
            .map(|(name, value)| (name.clone(), value_to_string(value)))
            .collect()
    }

    /// Argument values as text, in emitted order.
    pub fn ordered_values(&self) -> Vec<String> {
        self.arguments.values().map(value_to_string).collect()
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Meta-agent choosing the next agent to invoke.
#[derive(Debug)]
pub struct PlannerAgent {
    service: AiService,
}

impl PlannerAgent {
    pub fn new(model: Arc<dyn ModelProvider>, config: &PlannerConfig) -> Result<Self> {
        let window = config.planner_memory_window;
        let service = AiService::builder(Self::interface())
            .model(model)
            .chat_memory_provider(move |id| {
                Arc::new(MessageWindowChatMemory::with_id(id.clone(), window)) as Arc<dyn ChatMemory>
            })
            .build()?;
        Ok(Self { service })
    }

    fn interface() -> AgentInterface {
        AgentInterface::new("PlannerAgent").method(
            MethodSpec::new(PLAN_METHOD, PLANNER_USER_PROMPT)
                .system(PLANNER_SYSTEM_PROMPT)
                .param(ParamSpec::memory_id("userId"))
                .param(ParamSpec::v("agents", ParamType::Str))
                .param(ParamSpec::v("request", ParamType::Str))
                .param(ParamSpec::v("lastResponse", ParamType::Str))
                .returns_json::<AgentInvocation>(),
        )
    }

    pub async fn plan(
        &self,
        memory_id: &MemoryId,
        agents: &str,
        request: &str,
        last_response: &str,
    ) -> Result<AgentInvocation> {
        let value = self
            .service
            .call(
                PLAN_METHOD,
                vec![
                    memory_id.as_str().into(),
                    agents.into(),
                    request.into(),
                    last_response.into(),
                ],
            )
            .await?;
        serde_json::from_value(value).map_err(|e| AgenticError::ModelBehavior {
            message: format!("planner answer is not an agent invocation: {}", e),
        })
    }

    pub fn chat_memory(&self, id: &MemoryId) -> Option<Arc<dyn ChatMemory>> {
        self.service.chat_memory(id)
    }

    pub fn evict_chat_memory(&self, id: &MemoryId) -> bool {
        self.service.evict_chat_memory(id)
    }

    /// Number of sessions currently holding a planner memory.
    pub fn session_count(&self) -> usize {
        self.service.session_count()
    }
}

/// A planner plus the agents it may call.
#[derive(Debug)]
pub struct AgentsSystem {
    planner: PlannerAgent,
    registry: AgentRegistry,
    config: PlannerConfig,
}

impl AgentsSystem {
    /// Builds a system with the default planner configuration.
    pub fn new(model: Arc<dyn ModelProvider>, agents: Vec<Arc<dyn Agent>>) -> Result<Self> {
        Self::builder(model).agents(agents).build()
    }

    pub fn builder(model: Arc<dyn ModelProvider>) -> AgentsSystemBuilder {
        AgentsSystemBuilder {
            model,
            agents: Vec::new(),
            config: PlannerConfig::default(),
        }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn planner(&self) -> &PlannerAgent {
        &self.planner
    }

    /// Serves `request` and returns the last agent response.
    ///
    /// The planner memory of this run is evicted whether it succeeds or fails.
    ///
    /// # Concurrency
    ///
    /// Each step binds the injected memory of this run into the chosen agent.
    /// Concurrent calls on one system share the agent instances, so a call may
    /// observe the injected memory of another. Use one system per concurrent
    /// request when agents must not see each other's turns.
    #[instrument(skip(self))]
    pub async fn execute(&self, request: &str) -> Result<String> {
        let memory_id = MemoryId::random();
        let catalog = self.registry.catalog();
        let injected: Arc<dyn ChatMemory> = Arc::new(MessageWindowChatMemory::with_max_messages(
            self.config.injected_memory_window,
        ));

        let result = self.run_steps(&memory_id, &catalog, request, &injected).await;
        self.planner.evict_chat_memory(&memory_id);
        result
    }

    async fn run_steps(
        &self,
        memory_id: &MemoryId,
        catalog: &str,
        request: &str,
        injected: &Arc<dyn ChatMemory>,
    ) -> Result<String> {
        let mut response = String::new();

        for step in 0..self.config.max_steps {
            let invocation = self
                .planner
                .plan(memory_id, catalog, request, &response)
                .await?;
            info!(step, agent = %invocation.agent_name, "planner decision");
            if invocation.is_done() {
                break;
            }

            let entry = self.registry.require(&invocation.agent_name)?;
            let args = self.bind(&entry.specification, &invocation)?;

            entry.agent.set_chat_memory(injected.clone())?;
            let outcome = entry.specification.invoker().invoke(args).await;
            if outcome.is_ok() {
                self.record_exchange(memory_id, injected);
            }
            injected.clear();

            let value = outcome.map_err(|source| AgenticError::AgentInvocation {
                agent: invocation.agent_name.clone(),
                source: Box::new(source),
            })?;
            response = value_to_string(&value);
            debug!(step, response = %response, "agent answered");
        }

        Ok(response)
    }

    fn bind(
        &self,
        specification: &AgentSpecification,
        invocation: &AgentInvocation,
    ) -> Result<Vec<ArgValue>> {
        match self.config.argument_binding {
            ArgumentBinding::ByName => {
                specification.to_invocation_arguments(&invocation.string_arguments())
            }
            ArgumentBinding::Positional => {
                specification.positional_arguments(&invocation.ordered_values())
            }
        }
    }

    /// Copies the agent's exchange into the planner memory, keeping the
    /// planner's own system message.
    fn record_exchange(&self, memory_id: &MemoryId, injected: &Arc<dyn ChatMemory>) {
        let Some(planner_memory) = self.planner.chat_memory(memory_id) else {
            return;
        };
        injected
            .messages()
            .into_iter()
            .filter(|message| message.role != Role::System)
            .for_each(|message| planner_memory.add(message));
    }
}

/// Builder for [`AgentsSystem`]
pub struct AgentsSystemBuilder {
    model: Arc<dyn ModelProvider>,
    agents: Vec<Arc<dyn Agent>>,
    config: PlannerConfig,
}

impl AgentsSystemBuilder {
    pub fn agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.agents.push(agent);
        self
    }

    pub fn agents(mut self, agents: Vec<Arc<dyn Agent>>) -> Self {
        self.agents.extend(agents);
        self
    }

    pub fn config(mut self, config: PlannerConfig) -> Self {
        self.config = config;
        self
    }

    /// Takes the planner section of the crate-wide configuration.
    pub fn config_from(self, config: &AgenticConfig) -> Self {
        self.config(config.planner.clone())
    }

    pub fn build(self) -> Result<AgentsSystem> {
        let planner = PlannerAgent::new(self.model, &self.config)?;
        let mut registry = AgentRegistry::new();
        for agent in self.agents {
            registry.register(agent)?;
        }
        Ok(AgentsSystem {
            planner,
            registry,
            config: self.config,
        })
    }
}
