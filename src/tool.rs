//! Tools exposed to agent services
//!
//! Tools are plain functions the model may call while answering a prompt. The
//! agent service executes them between model turns and feeds the results back.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;

use crate::error::{AgenticError, Result};

/// Result from a tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The output from the tool
    pub output: Value,
    /// Optional error message if the tool failed
    pub error: Option<String>,
}

impl ToolResult {
    /// Create a successful tool result
    pub fn success(output: Value) -> Self {
        Self {
            output,
            error: None,
        }
    }

    /// Create an error result
    pub fn error(message: String) -> Self {
        Self {
            output: Value::Null,
            error: Some(message),
        }
    }

    /// Text sent back to the model as the tool message content.
    pub fn to_content(&self) -> String {
        match (&self.error, &self.output) {
            (Some(error), _) => format!("Error: {}", error),
            (None, Value::String(s)) => s.clone(),
            (None, other) => other.to_string(),
        }
    }
}

/// Trait for all tools that can be used by agent services
#[async_trait]
pub trait Tool: Send + Sync + Debug {
    /// Get the name of the tool
    fn name(&self) -> &str;

    /// Get the description of the tool
    fn description(&self) -> &str;

    /// Get the JSON schema for the tool's parameters
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given arguments
    async fn execute(&self, arguments: Value) -> Result<ToolResult>;
}

type ToolFn = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// A function-based tool
#[derive(Clone)]
pub struct FunctionTool {
    name: String,
    description: String,
    parameters_schema: Value,
    function: ToolFn,
}

impl Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters_schema", &self.parameters_schema)
            .finish()
    }
}

impl FunctionTool {
    /// Create a new function tool
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters_schema: Value,
        function: F,
    ) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters_schema,
            function: Arc::new(function),
        }
    }

    /// Create a function tool with a simple string-to-string function
    pub fn simple<F>(name: &str, description: &str, function: F) -> Self
    where
        F: Fn(String) -> String + Send + Sync + 'static,
    {
        let wrapped = move |args: Value| {
            let input = args
                .get("input")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            Ok(Value::String(function(input)))
        };

        Self::new(
            name,
            description,
            serde_json::json!({
                "type": "object",
                "properties": {
                    "input": {
                        "type": "string",
                        "description": "Input to the function"
                    }
                },
                "required": ["input"]
            }),
            wrapped,
        )
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.parameters_schema.clone()
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult> {
        match (self.function)(arguments) {
            Ok(output) => Ok(ToolResult::success(output)),
            Err(e) => Ok(ToolResult::error(e.to_string())),
        }
    }
}

/// Create a tool from a typed handler.
///
/// `A` is deserialized from the model's arguments and its schema is generated
/// with schemars; `R` is serialized back into the tool message.
pub fn tool_typed<A, R, F>(name: &str, description: &str, handler: F) -> FunctionTool
where
    A: DeserializeOwned + JsonSchema + 'static,
    R: Serialize + 'static,
    F: Fn(A) -> Result<R> + Send + Sync + 'static,
{
    let schema = schemars::schema_for!(A);
    let parameters = serde_json::to_value(schema.schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object"}));
    FunctionTool::new(name, description, parameters, move |raw: Value| {
        let args: A = serde_json::from_value(raw).map_err(|e| AgenticError::ToolExecution {
            message: format!("invalid arguments: {}", e),
        })?;
        Ok(serde_json::to_value(handler(args)?)?)
    })
}
