//! Metadata predicates for narrowing searches.

use std::fmt;

use serde::Serialize;

use crate::types::Metadata;

/// Conjunction of metadata equality checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataFilter {
    Eq { key: String, value: String },
    And(Vec<MetadataFilter>),
}

impl MetadataFilter {
    pub fn eq(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Eq {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Combine conditions: none yields no filter, one is used as-is,
    /// several are joined with AND.
    pub fn all(mut conditions: Vec<MetadataFilter>) -> Option<Self> {
        match conditions.len() {
            0 => None,
            1 => conditions.pop(),
            _ => Some(Self::And(conditions)),
        }
    }

    /// Whether a document's metadata satisfies every clause.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            Self::Eq { key, value } => metadata.get(key) == Some(value),
            Self::And(parts) => parts.iter().all(|p| p.matches(metadata)),
        }
    }

    /// Flattened `(key, value)` equality clauses.
    pub fn clauses(&self) -> Vec<(&str, &str)> {
        let mut out = Vec::new();
        self.collect_clauses(&mut out);
        out
    }

    fn collect_clauses<'a>(&'a self, out: &mut Vec<(&'a str, &'a str)>) {
        match self {
            Self::Eq { key, value } => out.push((key, value)),
            Self::And(parts) => {
                for p in parts {
                    p.collect_clauses(out);
                }
            }
        }
    }
}

impl fmt::Display for MetadataFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .clauses()
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        write!(f, "{}", parts.join(" AND "))
    }
}
