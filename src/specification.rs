//! Uniform descriptors of planner-callable agent methods.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::{AgenticError, Result};
use crate::interface::{ArgValue, MethodSpec, ParamType};
use crate::registry::AgentInvoker;

/// A planner-callable agent method: its name, description, typed parameters
/// and the invoker that dispatches to it.
#[derive(Clone)]
pub struct AgentSpecification {
    pub name: String,
    pub description: String,
    pub parameter_names: Vec<String>,
    pub parameter_types: Vec<ParamType>,
    /// Name of the interface method backing this agent.
    pub method: String,
    invoker: Arc<dyn AgentInvoker>,
}

impl AgentSpecification {
    /// Builds the descriptor of an annotated method.
    ///
    /// Returns `Ok(None)` for methods without an agent annotation.
    pub fn from_method(method: &MethodSpec, invoker: Arc<dyn AgentInvoker>) -> Result<Option<Self>> {
        let Some(annotation) = &method.agent else {
            return Ok(None);
        };

        let name = match annotation.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => method.name.clone(),
        };

        let mut parameter_names = Vec::with_capacity(method.params.len());
        let mut seen = HashSet::new();
        for (index, param) in method.params.iter().enumerate() {
            let resolved = param.resolved_name().ok_or_else(|| {
                AgenticError::invalid_spec(format!(
                    "parameter name unresolved for argument {} of method '{}'",
                    index, method.name
                ))
            })?;
            if !seen.insert(resolved) {
                return Err(AgenticError::invalid_spec(format!(
                    "duplicate parameter name '{}' in method '{}'",
                    resolved, method.name
                )));
            }
            parameter_names.push(resolved.to_string());
        }

        Ok(Some(Self {
            name,
            description: annotation.description.join("\n"),
            parameter_names,
            parameter_types: method.params.iter().map(|p| p.ty.clone()).collect(),
            method: method.name.clone(),
            invoker,
        }))
    }

    pub fn invoker(&self) -> &Arc<dyn AgentInvoker> {
        &self.invoker
    }

    /// Marshals named textual arguments into the positional vector, in
    /// declaration order.
    pub fn to_invocation_arguments(&self, named: &HashMap<String, String>) -> Result<Vec<ArgValue>> {
        self.parameter_names
            .iter()
            .zip(&self.parameter_types)
            .map(|(name, ty)| {
                let raw = named
                    .get(name)
                    .ok_or_else(|| AgenticError::MissingArgument { name: name.clone() })?;
                parse_argument(name, ty, raw)
            })
            .collect()
    }

    /// Marshals textual arguments taken in the order they were emitted.
    pub fn positional_arguments(&self, values: &[String]) -> Result<Vec<ArgValue>> {
        if values.len() != self.parameter_names.len() {
            return Err(AgenticError::ArgumentCount {
                method: self.name.clone(),
                expected: self.parameter_names.len(),
                actual: values.len(),
            });
        }
        self.parameter_names
            .iter()
            .zip(&self.parameter_types)
            .zip(values)
            .map(|((name, ty), raw)| parse_argument(name, ty, raw))
            .collect()
    }

    /// `{name: description, [p1, p2]}`
    pub fn to_card(&self) -> String {
        format!(
            "{{{}: {}, [{}]}}",
            self.name,
            self.description,
            self.parameter_names.join(", ")
        )
    }
}

impl PartialEq for AgentSpecification {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.description == other.description
            && self.parameter_names == other.parameter_names
    }
}

impl fmt::Debug for AgentSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentSpecification")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameter_names", &self.parameter_names)
            .field("parameter_types", &self.parameter_types)
            .finish()
    }
}

fn parse_argument(name: &str, ty: &ParamType, raw: &str) -> Result<ArgValue> {
    let parse_error = |reason: String| AgenticError::ArgumentParse {
        name: name.to_string(),
        value: raw.to_string(),
        reason,
    };
    match ty {
        ParamType::Str => Ok(ArgValue::Str(raw.to_string())),
        ParamType::Int => raw
            .trim()
            .parse::<i32>()
            .map(ArgValue::Int)
            .map_err(|e| parse_error(e.to_string())),
        ParamType::Long => raw
            .trim()
            .parse::<i64>()
            .map(ArgValue::Long)
            .map_err(|e| parse_error(e.to_string())),
        ParamType::Double => raw
            .trim()
            .parse::<f64>()
            .map(ArgValue::Double)
            .map_err(|e| parse_error(e.to_string())),
        ParamType::Bool => match raw.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(ArgValue::Bool(true)),
            "false" => Ok(ArgValue::Bool(false)),
            _ => Err(parse_error("expected 'true' or 'false'".to_string())),
        },
        ParamType::Other(type_name) => Err(AgenticError::UnsupportedType {
            type_name: type_name.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::{AgentAnnotation, ParamSpec};
    use async_trait::async_trait;
    use proptest::prelude::*;
    use serde_json::Value;

    #[derive(Debug)]
    struct NoopInvoker;

    #[async_trait]
    impl AgentInvoker for NoopInvoker {
        async fn invoke(&self, _args: Vec<ArgValue>) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    fn credit() -> MethodSpec {
        MethodSpec::new("credit", "Credit {{amount}} to {{user}}")
            .param(ParamSpec::p("user", ParamType::Str))
            .param(ParamSpec::p("amount", ParamType::Double))
            .agent(AgentAnnotation::new("A banker that credits money"))
    }

    fn spec_of(method: &MethodSpec) -> AgentSpecification {
        AgentSpecification::from_method(method, Arc::new(NoopInvoker))
            .unwrap()
            .unwrap()
    }

    fn named(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_from_method() {
        let spec = spec_of(&credit());
        assert_eq!(spec.name, "credit");
        assert_eq!(spec.description, "A banker that credits money");
        assert_eq!(spec.parameter_names, vec!["user", "amount"]);
        assert_eq!(spec.to_card(), "{credit: A banker that credits money, [user, amount]}");
    }

    #[test]
    fn test_rebuilt_specs_are_equal() {
        assert_eq!(spec_of(&credit()), spec_of(&credit()));

        let renamed = credit().agent(AgentAnnotation::new("A banker that credits money").named("deposit"));
        assert_ne!(spec_of(&credit()), spec_of(&renamed));
    }

    #[test]
    fn test_annotation_name_and_lines() {
        let method = MethodSpec::new("answer", "{{it}}")
            .param(ParamSpec::v("request", ParamType::Str))
            .agent(AgentAnnotation::lines(["An expert", "in law"]).named("legal"));
        let spec = spec_of(&method);
        assert_eq!(spec.name, "legal");
        assert_eq!(spec.description, "An expert\nin law");

        let blank = MethodSpec::new("answer", "{{it}}").agent(AgentAnnotation::new("x").named("  "));
        assert_eq!(spec_of(&blank).name, "answer");
    }

    #[test]
    fn test_unannotated_method_is_skipped() {
        let method = MethodSpec::new("plain", "hi");
        let spec = AgentSpecification::from_method(&method, Arc::new(NoopInvoker)).unwrap();
        assert!(spec.is_none());
    }

    #[test]
    fn test_unresolved_parameter_name() {
        let method = MethodSpec::new("answer", "{{it}}")
            .param(ParamSpec::unnamed(ParamType::Str))
            .agent(AgentAnnotation::new("x"));
        let err = AgentSpecification::from_method(&method, Arc::new(NoopInvoker)).unwrap_err();
        assert!(matches!(err, AgenticError::InvalidSpecification { .. }));
    }

    #[test]
    fn test_duplicate_parameter_name() {
        let method = MethodSpec::new("answer", "{{a}}")
            .param(ParamSpec::p("a", ParamType::Str))
            .param(ParamSpec::v("a", ParamType::Str))
            .agent(AgentAnnotation::new("x"));
        let err = AgentSpecification::from_method(&method, Arc::new(NoopInvoker)).unwrap_err();
        assert!(matches!(err, AgenticError::InvalidSpecification { .. }));
    }

    #[test]
    fn test_to_invocation_arguments() {
        let spec = spec_of(&credit());
        let args = spec
            .to_invocation_arguments(&named(&[("amount", "100"), ("user", "Mario")]))
            .unwrap();
        assert_eq!(args, vec![ArgValue::from("Mario"), ArgValue::Double(100.0)]);

        let err = spec
            .to_invocation_arguments(&named(&[("user", "Mario")]))
            .unwrap_err();
        assert!(matches!(err, AgenticError::MissingArgument { ref name } if name == "amount"));

        let err = spec
            .to_invocation_arguments(&named(&[("user", "Mario"), ("amount", "lots")]))
            .unwrap_err();
        assert!(matches!(err, AgenticError::ArgumentParse { .. }));
    }

    #[test]
    fn test_positional_arguments() {
        let spec = spec_of(&credit());
        let args = spec
            .positional_arguments(&["Georgios".to_string(), "100".to_string()])
            .unwrap();
        assert_eq!(args[1], ArgValue::Double(100.0));

        let err = spec.positional_arguments(&["Georgios".to_string()]).unwrap_err();
        assert!(matches!(
            err,
            AgenticError::ArgumentCount {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_types() {
        assert_eq!(parse_argument("n", &ParamType::Int, " 7 ").unwrap(), ArgValue::Int(7));
        assert_eq!(
            parse_argument("n", &ParamType::Long, "9000000000").unwrap(),
            ArgValue::Long(9_000_000_000)
        );
        assert_eq!(parse_argument("b", &ParamType::Bool, "TRUE").unwrap(), ArgValue::Bool(true));
        assert!(parse_argument("b", &ParamType::Bool, "yes").is_err());
        assert!(parse_argument("n", &ParamType::Int, "3000000000").is_err());

        let err = parse_argument("when", &ParamType::Other("Date".into()), "today").unwrap_err();
        assert!(matches!(err, AgenticError::UnsupportedType { ref type_name } if type_name == "Date"));
    }

    proptest! {
        #[test]
        fn marshals_any_named_order(user in "[A-Za-z]{1,10}", amount in -1.0e9f64..1.0e9) {
            let spec = spec_of(&credit());
            let args = spec
                .to_invocation_arguments(&named(&[("amount", amount.to_string().as_str()), ("user", user.as_str())]))
                .unwrap();
            prop_assert_eq!(args, vec![ArgValue::Str(user), ArgValue::Double(amount)]);
        }

        #[test]
        fn integers_round_trip_through_text(n in any::<i64>()) {
            prop_assert_eq!(
                parse_argument("n", &ParamType::Long, &n.to_string()).unwrap(),
                ArgValue::Long(n)
            );
        }
    }
}
