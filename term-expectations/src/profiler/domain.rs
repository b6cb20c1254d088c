//! Domains: the slices of data rules reason about.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::metrics::{canonical_kwargs, Kwargs};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainType {
    Table,
    Column,
    ColumnPair,
    MultiColumn,
    Map,
}

impl fmt::Display for DomainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DomainType::Table => "table",
            DomainType::Column => "column",
            DomainType::ColumnPair => "column_pair",
            DomainType::MultiColumn => "multicolumn",
            DomainType::Map => "map",
        };
        f.write_str(name)
    }
}

/// A logical scope of data, such as one column of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub domain_type: DomainType,
    #[serde(default)]
    pub domain_kwargs: Kwargs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,
    #[serde(default, skip_serializing_if = "Kwargs::is_empty")]
    pub details: Kwargs,
}

impl Domain {
    pub fn new(domain_type: DomainType, domain_kwargs: Kwargs) -> Self {
        Self {
            domain_type,
            domain_kwargs,
            rule_name: None,
            details: Kwargs::new(),
        }
    }

    pub fn table() -> Self {
        Self::new(DomainType::Table, Kwargs::new())
    }

    pub fn column(column: impl Into<String>) -> Self {
        Self::new(
            DomainType::Column,
            Kwargs::from([("column".to_string(), Value::String(column.into()))]),
        )
    }

    pub fn with_rule_name(mut self, rule_name: impl Into<String>) -> Self {
        self.rule_name = Some(rule_name.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }

    /// True when `other` has the same type and each of its kwargs appears here.
    pub fn is_superset(&self, other: &Domain) -> bool {
        self.domain_type == other.domain_type
            && other
                .domain_kwargs
                .iter()
                .all(|(k, v)| self.domain_kwargs.get(k) == Some(v))
    }

    /// Stable identity keyed on type and kwargs.
    pub fn id(&self) -> String {
        format!("{}:{}", self.domain_type, canonical_kwargs(&self.domain_kwargs))
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}
