//! Parameter storage and reference resolution for profiler rules.
//!
//! Values flowing through a rule are addressed by fully-qualified names:
//!
//! - `$variables.<path>` reads the rule's variables;
//! - `$parameter.<name>[.value|.details][...]` reads a parameter built
//!   earlier for the current domain;
//! - `$domain.domain_kwargs.<key>` reads the current domain.
//!
//! Paths traverse nested objects by key and arrays by `[index]`, e.g.
//! `$parameter.row_counts.value[0]`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use super::domain::Domain;
use crate::error::{Result, TermError};
use crate::metrics::Kwargs;

pub const VARIABLES_KEY: &str = "$variables";
pub const PARAMETER_KEY: &str = "$parameter";
pub const DOMAIN_KEY: &str = "$domain";
pub const VALUE_KEY: &str = "value";
pub const DETAILS_KEY: &str = "details";

/// Computed value of a parameter plus metadata about how it was computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterNode {
    pub value: Value,
    #[serde(default)]
    pub details: Kwargs,
}

impl ParameterNode {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            details: Kwargs::new(),
        }
    }

    pub fn with_details(mut self, details: Kwargs) -> Self {
        self.details = details;
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }

    fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert(VALUE_KEY.to_string(), self.value.clone());
        object.insert(
            DETAILS_KEY.to_string(),
            Value::Object(self.details.clone().into_iter().collect()),
        );
        Value::Object(object)
    }

    fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        Some(Self {
            value: object.get(VALUE_KEY)?.clone(),
            details: object
                .get(DETAILS_KEY)
                .and_then(Value::as_object)
                .map(|d| d.clone().into_iter().collect())
                .unwrap_or_default(),
        })
    }
}

/// Fully-qualified parameter name for a builder name.
pub fn fully_qualified_parameter_name(name: &str) -> String {
    format!("{PARAMETER_KEY}.{name}")
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Key(String),
    Index(usize),
}

fn parse_reference(reference: &str) -> Result<(&str, Vec<Segment>)> {
    let invalid = || TermError::configuration(format!("invalid parameter reference '{reference}'"));
    let mut parts = reference.split('.');
    let namespace = parts.next().ok_or_else(invalid)?;
    if ![VARIABLES_KEY, PARAMETER_KEY, DOMAIN_KEY].contains(&namespace) {
        return Err(invalid());
    }

    let mut segments = Vec::new();
    for part in parts {
        let (key, mut rest) = match part.find('[') {
            Some(i) => (&part[..i], &part[i..]),
            None => (part, ""),
        };
        if !key.is_empty() {
            segments.push(Segment::Key(key.to_string()));
        } else if rest.is_empty() {
            return Err(invalid());
        }
        while !rest.is_empty() {
            let close = rest.find(']').ok_or_else(invalid)?;
            let index = rest[1..close].trim().parse::<usize>().map_err(|_| invalid())?;
            segments.push(Segment::Index(index));
            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return Err(invalid());
            }
        }
    }
    Ok((namespace, segments))
}

fn traverse<'a>(mut value: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    for segment in segments {
        value = match segment {
            Segment::Key(key) => value.as_object()?.get(key)?,
            Segment::Index(index) => value.as_array()?.get(*index)?,
        };
    }
    Some(value)
}

fn insert_at(object: &mut Map<String, Value>, keys: &[&str], node: Value) {
    match keys {
        [] => {}
        [last] => {
            let mut node = node;
            // Keep nested child parameters of a node that is being replaced.
            if let (Some(Value::Object(existing)), Value::Object(new)) = (object.get(*last), &mut node)
            {
                for (k, v) in existing {
                    if k != VALUE_KEY && k != DETAILS_KEY {
                        new.insert(k.clone(), v.clone());
                    }
                }
            }
            object.insert(last.to_string(), node);
        }
        [first, rest @ ..] => {
            let child = object
                .entry(first.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(map) = child {
                insert_at(map, rest, node);
            }
        }
    }
}

/// Parameters built for one domain within one rule execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterContainer {
    root: Map<String, Value>,
    names: BTreeSet<String>,
}

impl ParameterContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a node under a `$parameter.`-prefixed name, replacing any
    /// previous node of that name. Dotted names nest.
    pub fn set(&mut self, fully_qualified_name: &str, node: ParameterNode) -> Result<()> {
        let (namespace, segments) = parse_reference(fully_qualified_name)?;
        if namespace != PARAMETER_KEY || segments.is_empty() {
            return Err(TermError::configuration(format!(
                "parameters must be stored under '{PARAMETER_KEY}.', got '{fully_qualified_name}'"
            )));
        }
        let keys = segments
            .iter()
            .map(|s| match s {
                Segment::Key(k) => Ok(k.as_str()),
                Segment::Index(_) => Err(TermError::configuration(format!(
                    "parameter names cannot contain indices: '{fully_qualified_name}'"
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        insert_at(&mut self.root, &keys, node.to_json());
        self.names.insert(fully_qualified_name.to_string());
        Ok(())
    }

    pub fn contains(&self, fully_qualified_name: &str) -> bool {
        self.names.contains(fully_qualified_name)
    }

    pub fn get(&self, fully_qualified_name: &str) -> Option<ParameterNode> {
        let (namespace, segments) = parse_reference(fully_qualified_name).ok()?;
        if namespace != PARAMETER_KEY {
            return None;
        }
        let root = Value::Object(self.root.clone());
        traverse(&root, &segments).and_then(ParameterNode::from_json)
    }

    fn lookup(&self, segments: &[Segment]) -> Option<Value> {
        let (first, rest) = segments.split_first()?;
        let Segment::Key(key) = first else {
            return None;
        };
        traverse(self.root.get(key)?, rest).cloned()
    }

    /// Names of every stored parameter, sorted.
    pub fn fully_qualified_parameter_names(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Parameter containers of one rule execution, keyed by [`Domain::id`].
pub type Parameters = BTreeMap<String, ParameterContainer>;

/// True for strings that reference a variable, parameter or domain value.
pub fn is_reference(value: &Value) -> bool {
    value.as_str().is_some_and(|s| {
        [VARIABLES_KEY, PARAMETER_KEY, DOMAIN_KEY]
            .iter()
            .any(|prefix| s == *prefix || s.starts_with(&format!("{prefix}.")))
    })
}

/// Looks up a fully-qualified reference.
pub fn get_parameter_value(
    reference: &str,
    domain: &Domain,
    variables: &Kwargs,
    parameters: &Parameters,
) -> Result<Value> {
    let (namespace, segments) = parse_reference(reference)?;
    let found = match namespace {
        VARIABLES_KEY => {
            let root = Value::Object(variables.clone().into_iter().collect());
            traverse(&root, &segments).cloned()
        }
        DOMAIN_KEY => {
            let root = serde_json::to_value(domain)?;
            traverse(&root, &segments).cloned()
        }
        _ => parameters
            .get(&domain.id())
            .and_then(|container| container.lookup(&segments)),
    };
    found.ok_or_else(|| {
        TermError::configuration(format!(
            "reference '{reference}' could not be resolved for domain {domain}"
        ))
    })
}

/// Replaces every reference inside `value` (recursively through arrays and
/// objects) with the value it points to.
pub fn resolve_references(
    value: &Value,
    domain: &Domain,
    variables: &Kwargs,
    parameters: &Parameters,
) -> Result<Value> {
    match value {
        Value::String(reference) if is_reference(value) => {
            get_parameter_value(reference, domain, variables, parameters)
        }
        Value::Array(items) => Ok(Value::Array(
            items
                .iter()
                .map(|item| resolve_references(item, domain, variables, parameters))
                .collect::<Result<_>>()?,
        )),
        Value::Object(map) => Ok(Value::Object(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), resolve_references(v, domain, variables, parameters)?)))
                .collect::<Result<_>>()?,
        )),
        other => Ok(other.clone()),
    }
}
