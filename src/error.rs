//! Error types for agent orchestration

use thiserror::Error;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, AgenticError>;

/// Main error type for agent orchestration
#[derive(Debug, Error)]
pub enum AgenticError {
    /// An agent method descriptor cannot be turned into a specification
    #[error("Invalid agent specification: {message}")]
    InvalidSpecification { message: String },

    /// A redirect or planner decision named an agent that is not registered
    #[error("No agent found with name '{name}'")]
    MissingAgent { name: String },

    /// A named argument required by an agent method is absent
    #[error("Missing argument: {name}")]
    MissingArgument { name: String },

    /// An agent parameter type cannot be marshalled from text
    #[error("Unsupported type: {type_name}")]
    UnsupportedType { type_name: String },

    /// A textual argument could not be parsed into the declared type
    #[error("Cannot parse argument '{name}' from '{value}': {reason}")]
    ArgumentParse {
        name: String,
        value: String,
        reason: String,
    },

    /// Positional arguments do not match the method arity
    #[error("Method '{method}' expects {expected} argument(s), got {actual}")]
    ArgumentCount {
        method: String,
        expected: usize,
        actual: usize,
    },

    /// Late memory injection into an agent that already owns conversation state
    #[error("Memory already present, cannot inject a different one")]
    MemoryAlreadyBound,

    /// The memory-id argument of a method was null
    #[error("The value of parameter '{param}' marked as memory id in method '{method}' must not be null")]
    NullMemoryId { method: String, param: String },

    /// Post-hook kept asking for another prompt
    #[error("Hook loop exceeded {limit} iterations for agent '{agent}'")]
    HookLoopOverflow { agent: String, limit: usize },

    /// The invoked method is not declared by the agent interface
    #[error("Unknown method '{method}' on agent '{agent}'")]
    UnknownMethod { agent: String, method: String },

    /// The model kept requesting tools past the configured limit
    #[error("Maximum tool rounds exceeded: {max_rounds}")]
    MaxToolRounds { max_rounds: usize },

    /// Tool execution error
    #[error("Tool execution error: {message}")]
    ToolExecution { message: String },

    /// Model behavior error
    #[error("Model behavior error: {message}")]
    ModelBehavior { message: String },

    /// An agent chosen by the planner failed
    #[error("Agent '{agent}' failed: {source}")]
    AgentInvocation {
        agent: String,
        #[source]
        source: Box<AgenticError>,
    },

    /// Builder or configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Error from the OpenAI API
    #[error("OpenAI API error: {0}")]
    OpenAI(#[from] async_openai::error::OpenAIError),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl AgenticError {
    pub(crate) fn missing_agent(name: impl Into<String>) -> Self {
        Self::MissingAgent { name: name.into() }
    }

    pub(crate) fn invalid_spec(message: impl Into<String>) -> Self {
        Self::InvalidSpecification {
            message: message.into(),
        }
    }
}
