//! Resolution context: parameter values, pseudo parameters and resource attributes
//!
//! A [`ParameterContext`] is everything the resolver may read from outside the
//! template. It can be built in code or loaded from a TOML file:
//!
//! ```toml
//! [pseudo]
//! region = "eu-west-1"
//! account_id = "123456789012"
//!
//! [parameters]
//! Env = "prod"
//!
//! [attributes.Bucket]
//! Arn = "arn:aws:s3:::web-prod"
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::document::{Mapping, Value};

/// Errors that can occur when loading a context file
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Failed to read context file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse context TOML: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Value of a pseudo parameter lookup
#[derive(Debug, Clone, PartialEq)]
pub enum PseudoValue {
    Value(Value),
    /// `AWS::NoValue`: remove the enclosing property
    NoValue,
}

/// Account- and stack-level values exposed as `AWS::*` references
#[derive(Debug, Clone, PartialEq)]
pub struct PseudoParameters {
    pub region: Option<String>,
    pub account_id: Option<String>,
    pub stack_name: Option<String>,
    pub stack_id: Option<String>,
    pub partition: String,
    pub url_suffix: String,
    pub notification_arns: Vec<String>,
}

impl Default for PseudoParameters {
    fn default() -> Self {
        Self {
            region: None,
            account_id: None,
            stack_name: None,
            stack_id: None,
            partition: "aws".to_string(),
            url_suffix: "amazonaws.com".to_string(),
            notification_arns: Vec::new(),
        }
    }
}

impl PseudoParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    pub fn with_stack_name(mut self, stack_name: impl Into<String>) -> Self {
        self.stack_name = Some(stack_name.into());
        self
    }

    pub fn with_stack_id(mut self, stack_id: impl Into<String>) -> Self {
        self.stack_id = Some(stack_id.into());
        self
    }

    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = partition.into();
        self
    }

    /// Look up an `AWS::*` name.
    ///
    /// Returns `None` for unknown names and for known names with no value set.
    pub fn lookup(&self, name: &str) -> Option<PseudoValue> {
        let text = |v: &Option<String>| v.clone().map(|s| PseudoValue::Value(Value::String(s)));
        match name {
            "AWS::Region" => text(&self.region),
            "AWS::AccountId" => text(&self.account_id),
            "AWS::StackName" => text(&self.stack_name),
            "AWS::StackId" => text(&self.stack_id),
            "AWS::Partition" => Some(PseudoValue::Value(Value::String(self.partition.clone()))),
            "AWS::URLSuffix" => Some(PseudoValue::Value(Value::String(self.url_suffix.clone()))),
            "AWS::NotificationARNs" => Some(PseudoValue::Value(Value::Sequence(
                self.notification_arns
                    .iter()
                    .map(|arn| Value::String(arn.clone()))
                    .collect(),
            ))),
            "AWS::NoValue" => Some(PseudoValue::NoValue),
            _ => None,
        }
    }
}

/// Caller-supplied values for one resolution call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterContext {
    parameters: HashMap<String, Value>,
    pseudo: PseudoParameters,
    attributes: HashMap<String, HashMap<String, Value>>,
}

/// TOML structure for deserializing context files
#[derive(Deserialize)]
struct TomlContext {
    pseudo: Option<TomlPseudo>,
    #[serde(default)]
    parameters: HashMap<String, toml::Value>,
    #[serde(default)]
    attributes: HashMap<String, HashMap<String, toml::Value>>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlPseudo {
    region: Option<String>,
    account_id: Option<String>,
    stack_name: Option<String>,
    stack_id: Option<String>,
    partition: Option<String>,
    url_suffix: Option<String>,
    notification_arns: Option<Vec<String>>,
}

impl ParameterContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a context from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ContextError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load a context from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ContextError> {
        let parsed: TomlContext = toml::from_str(content)?;

        let mut pseudo = PseudoParameters::default();
        if let Some(p) = parsed.pseudo {
            pseudo.region = p.region;
            pseudo.account_id = p.account_id;
            pseudo.stack_name = p.stack_name;
            pseudo.stack_id = p.stack_id;
            if let Some(partition) = p.partition {
                pseudo.partition = partition;
            }
            if let Some(suffix) = p.url_suffix {
                pseudo.url_suffix = suffix;
            }
            if let Some(arns) = p.notification_arns {
                pseudo.notification_arns = arns;
            }
        }

        Ok(Self {
            parameters: parsed
                .parameters
                .into_iter()
                .map(|(k, v)| (k, from_toml_value(v)))
                .collect(),
            pseudo,
            attributes: parsed
                .attributes
                .into_iter()
                .map(|(resource, attrs)| {
                    let attrs = attrs
                        .into_iter()
                        .map(|(k, v)| (k, from_toml_value(v)))
                        .collect();
                    (resource, attrs)
                })
                .collect(),
        })
    }

    /// Set a parameter value
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Set the pseudo parameters
    pub fn with_pseudo(mut self, pseudo: PseudoParameters) -> Self {
        self.pseudo = pseudo;
        self
    }

    /// Set an attribute of a provisioned resource
    pub fn with_attribute(
        mut self,
        resource: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.attributes
            .entry(resource.into())
            .or_default()
            .insert(attribute.into(), value.into());
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    pub fn pseudo(&self) -> &PseudoParameters {
        &self.pseudo
    }

    pub fn attribute(&self, resource: &str, attribute: &str) -> Option<&Value> {
        self.attributes.get(resource)?.get(attribute)
    }

    /// Physical id of a resource, supplied as its `Ref` attribute
    pub fn physical_id(&self, resource: &str) -> Option<&Value> {
        self.attribute(resource, "Ref")
    }
}

fn from_toml_value(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i as f64),
        toml::Value::Float(f) => Value::Number(f),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Sequence(items.into_iter().map(from_toml_value).collect()),
        toml::Value::Table(table) => Value::Mapping(
            table
                .into_iter()
                .map(|(k, v)| (k, from_toml_value(v)))
                .collect::<Mapping>(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_context_toml() {
        let toml = r#"
[pseudo]
region = "eu-west-1"
account_id = "123456789012"

[parameters]
Env = "prod"
Port = 8080
Subnets = ["a", "b"]

[attributes.Bucket]
Arn = "arn:aws:s3:::web-prod"
Ref = "web-prod"
"#;
        let ctx = ParameterContext::from_toml(toml).unwrap();
        assert_eq!(ctx.parameter("Env"), Some(&Value::from("prod")));
        assert_eq!(ctx.parameter("Port"), Some(&Value::Number(8080.0)));
        assert_eq!(
            ctx.parameter("Subnets"),
            Some(&Value::Sequence(vec![Value::from("a"), Value::from("b")]))
        );
        assert_eq!(
            ctx.attribute("Bucket", "Arn"),
            Some(&Value::from("arn:aws:s3:::web-prod"))
        );
        assert_eq!(ctx.physical_id("Bucket"), Some(&Value::from("web-prod")));
        assert_eq!(ctx.pseudo().region.as_deref(), Some("eu-west-1"));
        assert_eq!(ctx.pseudo().partition, "aws");
    }

    #[test]
    fn test_empty_toml_is_empty_context() {
        let ctx = ParameterContext::from_toml("").unwrap();
        assert_eq!(ctx, ParameterContext::new());
    }

    #[test]
    fn test_unknown_pseudo_key_rejected() {
        let result = ParameterContext::from_toml("[pseudo]\nregoin = \"x\"\n");
        assert!(matches!(result, Err(ContextError::ParseError(_))));
    }

    #[test]
    fn test_pseudo_lookup() {
        let pseudo = PseudoParameters::new().with_region("us-east-1");
        assert_eq!(
            pseudo.lookup("AWS::Region"),
            Some(PseudoValue::Value(Value::from("us-east-1")))
        );
        assert_eq!(pseudo.lookup("AWS::AccountId"), None);
        assert_eq!(
            pseudo.lookup("AWS::Partition"),
            Some(PseudoValue::Value(Value::from("aws")))
        );
        assert_eq!(pseudo.lookup("AWS::NoValue"), Some(PseudoValue::NoValue));
        assert_eq!(pseudo.lookup("AWS::Bogus"), None);
    }

    #[test]
    fn test_builder_pattern() {
        let ctx = ParameterContext::new()
            .with_parameter("Env", "dev")
            .with_attribute("Queue", "Arn", "arn:aws:sqs:q")
            .with_pseudo(PseudoParameters::new().with_stack_name("demo"));
        assert_eq!(ctx.parameter("Env"), Some(&Value::from("dev")));
        assert_eq!(ctx.attribute("Queue", "Arn"), Some(&Value::from("arn:aws:sqs:q")));
        assert_eq!(ctx.attribute("Queue", "Url"), None);
        assert_eq!(ctx.pseudo().stack_name.as_deref(), Some("demo"));
    }
}
