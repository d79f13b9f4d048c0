//! Configuration for agent services, proxies and the planner
//!
//! Every knob has a default; [`from_env`] and [`from_file`] overlay them.

use serde::{Deserialize, Serialize};

use crate::error::{AgenticError, Result};

/// How planner-emitted arguments are bound to agent parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentBinding {
    /// Look each parameter up by its resolved name.
    #[default]
    ByName,
    /// Take the values in the order the model emitted them.
    Positional,
}

/// Planner loop tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Maximum agent invocations per `execute`
    pub max_steps: usize,

    /// Message window of the planner's per-session memory
    pub planner_memory_window: usize,

    /// Message window of the memory spliced into each invoked agent
    pub injected_memory_window: usize,

    pub argument_binding: ArgumentBinding,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_steps: 5,
            planner_memory_window: 10,
            injected_memory_window: 10,
            argument_binding: ArgumentBinding::ByName,
        }
    }
}

/// Crate-wide configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgenticConfig {
    /// Model used by [`OpenAIProvider::from_config`](crate::model::OpenAIProvider::from_config)
    pub default_model: String,

    pub temperature: Option<f32>,

    pub max_tokens: Option<u32>,

    /// Model/tool round trips allowed within one method invocation
    pub max_tool_rounds: usize,

    /// Prompts allowed within one proxied call before the hook loop fails
    pub hook_loop_limit: usize,

    pub planner: PlannerConfig,
}

impl Default for AgenticConfig {
    fn default() -> Self {
        Self {
            default_model: "gpt-4o-mini".to_string(),
            temperature: None,
            max_tokens: None,
            max_tool_rounds: 10,
            hook_loop_limit: 16,
            planner: PlannerConfig::default(),
        }
    }
}

/// Configuration builder
#[derive(Default)]
pub struct ConfigBuilder {
    config: AgenticConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.default_model = model.into();
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.temperature = Some(temp);
        self
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.config.max_tokens = Some(tokens);
        self
    }

    pub fn max_tool_rounds(mut self, rounds: usize) -> Self {
        self.config.max_tool_rounds = rounds;
        self
    }

    pub fn hook_loop_limit(mut self, limit: usize) -> Self {
        self.config.hook_loop_limit = limit;
        self
    }

    pub fn max_steps(mut self, steps: usize) -> Self {
        self.config.planner.max_steps = steps;
        self
    }

    pub fn argument_binding(mut self, binding: ArgumentBinding) -> Self {
        self.config.planner.argument_binding = binding;
        self
    }

    pub fn build(self) -> AgenticConfig {
        self.config
    }
}

/// Load configuration from environment variables
pub fn from_env() -> AgenticConfig {
    let mut config = AgenticConfig::default();

    if let Ok(model) = std::env::var("AGENTIC_MODEL") {
        config.default_model = model;
    }

    if let Ok(temp) = std::env::var("AGENTIC_TEMPERATURE") {
        if let Ok(temp) = temp.parse::<f32>() {
            config.temperature = Some(temp);
        }
    }

    if let Ok(steps) = std::env::var("AGENTIC_MAX_STEPS") {
        if let Ok(steps) = steps.parse::<usize>() {
            config.planner.max_steps = steps;
        }
    }

    if let Ok(limit) = std::env::var("AGENTIC_HOOK_LOOP_LIMIT") {
        if let Ok(limit) = limit.parse::<usize>() {
            config.hook_loop_limit = limit;
        }
    }

    config
}

/// Load configuration from a TOML file
pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<AgenticConfig> {
    let contents = std::fs::read_to_string(path)?;
    toml::from_str(&contents).map_err(|e| AgenticError::Configuration {
        message: e.to_string(),
    })
}
