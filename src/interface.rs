//! Declarative agent interfaces.
//!
//! An [`AgentInterface`] lists the methods an agent service answers, each one a
//! prompt template plus typed parameters. Parameters carry the naming metadata the
//! registry needs (tool-parameter name, template-variable name, or a preserved
//! declared name) and may be marked as the session memory id. Methods marked with
//! an [`AgentAnnotation`] are callable by the planner.

use std::fmt;

use schemars::JsonSchema;
use serde_json::Value;

/// Static type of an agent method parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    Str,
    Int,
    Long,
    Double,
    Bool,
    /// Any other type; can be declared but never marshalled from text.
    Other(String),
}

impl ParamType {
    pub fn type_name(&self) -> &str {
        match self {
            ParamType::Str => "String",
            ParamType::Int => "i32",
            ParamType::Long => "i64",
            ParamType::Double => "f64",
            ParamType::Bool => "bool",
            ParamType::Other(name) => name,
        }
    }
}

/// One parameter of an agent method.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub tool_param: Option<String>,
    pub template_var: Option<String>,
    pub declared_name: Option<String>,
    pub ty: ParamType,
    pub memory_id: bool,
}

impl ParamSpec {
    fn empty(ty: ParamType) -> Self {
        Self {
            tool_param: None,
            template_var: None,
            declared_name: None,
            ty,
            memory_id: false,
        }
    }

    /// Parameter named by a tool-parameter annotation.
    pub fn p(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            tool_param: Some(name.into()),
            ..Self::empty(ty)
        }
    }

    /// Parameter named by a template-variable annotation.
    pub fn v(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            template_var: Some(name.into()),
            ..Self::empty(ty)
        }
    }

    /// Parameter whose declared name is available.
    pub fn named(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            declared_name: Some(name.into()),
            ..Self::empty(ty)
        }
    }

    /// Parameter with no recoverable name.
    pub fn unnamed(ty: ParamType) -> Self {
        Self::empty(ty)
    }

    /// String parameter carrying the session memory id.
    pub fn memory_id(name: impl Into<String>) -> Self {
        Self {
            declared_name: Some(name.into()),
            memory_id: true,
            ..Self::empty(ParamType::Str)
        }
    }

    /// Name by priority: tool parameter, template variable, declared name.
    pub fn resolved_name(&self) -> Option<&str> {
        self.tool_param
            .as_deref()
            .or(self.template_var.as_deref())
            .or(self.declared_name.as_deref())
    }
}

/// Marks a method as callable by the planner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentAnnotation {
    /// Overrides the method name when non-blank.
    pub name: Option<String>,
    /// Description lines, joined with newlines.
    pub description: Vec<String>,
}

impl AgentAnnotation {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            name: None,
            description: vec![description.into()],
        }
    }

    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: None,
            description: lines.into_iter().map(Into::into).collect(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// How the model's final text is turned into the method's return value.
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnKind {
    /// The text itself, as a JSON string.
    Text,
    /// The text parsed as JSON matching `schema`.
    Json { schema: Value },
}

/// One prompt-backed method of an agent interface.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSpec {
    pub name: String,
    pub system_template: Option<String>,
    pub user_template: String,
    pub params: Vec<ParamSpec>,
    pub agent: Option<AgentAnnotation>,
    pub returns: ReturnKind,
}

impl MethodSpec {
    pub fn new(name: impl Into<String>, user_template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system_template: None,
            user_template: user_template.into(),
            params: Vec::new(),
            agent: None,
            returns: ReturnKind::Text,
        }
    }

    pub fn system(mut self, template: impl Into<String>) -> Self {
        self.system_template = Some(template.into());
        self
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn agent(mut self, annotation: AgentAnnotation) -> Self {
        self.agent = Some(annotation);
        self
    }

    /// Parse the answer as JSON shaped like `T`.
    pub fn returns_json<T: JsonSchema>(mut self) -> Self {
        let schema = serde_json::to_value(schemars::schema_for!(T))
            .unwrap_or_else(|_| serde_json::json!({"type": "object"}));
        self.returns = ReturnKind::Json { schema };
        self
    }

    /// Index of the memory-id parameter, if any.
    pub fn memory_id_index(&self) -> Option<usize> {
        self.params.iter().position(|p| p.memory_id)
    }
}

/// The set of methods an agent service answers.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentInterface {
    pub name: String,
    pub methods: Vec<MethodSpec>,
}

impl AgentInterface {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    pub fn method(mut self, method: MethodSpec) -> Self {
        self.methods.push(method);
        self
    }

    pub fn find(&self, method: &str) -> Option<&MethodSpec> {
        self.methods.iter().find(|m| m.name == method)
    }
}

/// One positional argument of an agent method call.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Str(String),
    Int(i32),
    Long(i64),
    Double(f64),
    Bool(bool),
    Null,
}

impl ArgValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ArgValue::Null)
    }

    pub fn to_json(&self) -> Value {
        match self {
            ArgValue::Str(s) => Value::String(s.clone()),
            ArgValue::Int(n) => Value::from(*n),
            ArgValue::Long(n) => Value::from(*n),
            ArgValue::Double(n) => Value::from(*n),
            ArgValue::Bool(b) => Value::Bool(*b),
            ArgValue::Null => Value::Null,
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Str(s) => f.write_str(s),
            ArgValue::Int(n) => write!(f, "{}", n),
            ArgValue::Long(n) => write!(f, "{}", n),
            ArgValue::Double(n) => write!(f, "{:?}", n),
            ArgValue::Bool(b) => write!(f, "{}", b),
            ArgValue::Null => f.write_str("null"),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        ArgValue::Str(s.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(s: String) -> Self {
        ArgValue::Str(s)
    }
}

impl From<i32> for ArgValue {
    fn from(n: i32) -> Self {
        ArgValue::Int(n)
    }
}

impl From<i64> for ArgValue {
    fn from(n: i64) -> Self {
        ArgValue::Long(n)
    }
}

impl From<f64> for ArgValue {
    fn from(n: f64) -> Self {
        ArgValue::Double(n)
    }
}

impl From<bool> for ArgValue {
    fn from(b: bool) -> Self {
        ArgValue::Bool(b)
    }
}

/// Replaces `{{name}}` placeholders; unknown names are left as written.
pub fn render_template(template: &str, vars: &[(String, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let key = after[..end].trim();
        match vars.iter().find(|(name, _)| name == key) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}
