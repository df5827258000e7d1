//! Metadata filter predicates (§4.3) — a canonical tree the vector store translates
//! into a JSONB containment query, and the cache tier folds into its fingerprint.
//!
//! Canonical form is load-bearing: two logically equivalent filters (same clauses,
//! different construction order) must produce byte-identical `canonical_json()`
//! output, or equal requests would miss the cache under different keys.

use serde::Serialize;
use serde_json::Value;

/// One clause in a filter's conjunction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FilterClause {
    /// `field = value`.
    Eq { field: String, value: String },
    /// `field in [values]`.
    In { field: String, values: Vec<String> },
}

impl FilterClause {
    fn field(&self) -> &str {
        match self {
            Self::Eq { field, .. } => field,
            Self::In { field, .. } => field,
        }
    }

    fn canonicalized(mut self) -> Self {
        if let Self::In { values, .. } = &mut self {
            values.sort();
            values.dedup();
        }
        self
    }
}

/// A conjunction of [`FilterClause`]s. The default (§4.3) is `status = active`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Filter {
    clauses: Vec<FilterClause>,
}

impl Filter {
    /// The empty filter: no predicate restriction at all.
    pub fn none() -> Self {
        Self { clauses: vec![] }
    }

    /// The spec's default predicate: `status = active`.
    pub fn default_status_active() -> Self {
        Self {
            clauses: vec![FilterClause::Eq {
                field: "status".to_string(),
                value: "active".to_string(),
            }],
        }
    }

    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Evaluates this filter against a passage's metadata plus its own `status` field,
    /// matching the predicate semantics the store is expected to apply.
    pub fn matches(&self, status: &str, metadata: &serde_json::Map<String, Value>) -> bool {
        self.clauses.iter().all(|clause| match clause {
            FilterClause::Eq { field, value } => field_value(field, status, metadata)
                .map(|v| &v == value)
                .unwrap_or(false),
            FilterClause::In { field, values } => field_value(field, status, metadata)
                .map(|v| values.contains(&v))
                .unwrap_or(false),
        })
    }

    /// Canonical JSON rendering: clauses sorted by field name, value lists sorted and
    /// deduplicated. This is what the cache fingerprint (§4.4) hashes.
    pub fn canonical_json(&self) -> String {
        let mut clauses: Vec<FilterClause> = self
            .clauses
            .iter()
            .cloned()
            .map(FilterClause::canonicalized)
            .collect();
        clauses.sort_by(|a, b| a.field().cmp(b.field()));
        serde_json::to_string(&clauses).unwrap_or_default()
    }
}

fn field_value(field: &str, status: &str, metadata: &serde_json::Map<String, Value>) -> Option<String> {
    if field == "status" {
        return Some(status.to_string());
    }
    metadata.get(field).map(|v| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

/// Builder for [`Filter`]s, mirroring the spec's "callers may widen, narrow, or
/// disable it" language around the default status predicate.
#[derive(Debug, Clone, Default)]
pub struct FilterBuilder {
    clauses: Vec<FilterClause>,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from the default `status = active` predicate.
    pub fn with_status_active() -> Self {
        Self {
            clauses: vec![FilterClause::Eq {
                field: "status".to_string(),
                value: "active".to_string(),
            }],
        }
    }

    /// Widens to a set of acceptable statuses (e.g. include `superseded`).
    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = String>) -> Self {
        self.clauses.retain(|c| c.field() != "status");
        self.clauses.push(FilterClause::In {
            field: "status".to_string(),
            values: statuses.into_iter().collect(),
        });
        self
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.clauses.push(FilterClause::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn r#in(mut self, field: impl Into<String>, values: Vec<String>) -> Self {
        self.clauses.push(FilterClause::In {
            field: field.into(),
            values,
        });
        self
    }

    /// Disables filtering entirely (no predicate).
    pub fn disabled() -> Filter {
        Filter::none()
    }

    pub fn build(self) -> Filter {
        Filter {
            clauses: self.clauses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_matches_active_only() {
        let f = Filter::default_status_active();
        let md = serde_json::Map::new();
        assert!(f.matches("active", &md));
        assert!(!f.matches("expired", &md));
    }

    #[test]
    fn canonical_json_sorts_clauses_and_values() {
        let a = FilterBuilder::new()
            .eq("status", "active")
            .r#in("doc_type", vec!["decree".into(), "law".into()])
            .build();
        let b = FilterBuilder::new()
            .r#in("doc_type", vec!["law".into(), "decree".into()])
            .eq("status", "active")
            .build();
        assert_eq!(a.canonical_json(), b.canonical_json());
    }

    #[test]
    fn disabled_filter_matches_everything() {
        let f = FilterBuilder::disabled();
        let md = serde_json::Map::new();
        assert!(f.matches("expired", &md));
        assert!(f.is_empty());
    }

    #[test]
    fn in_clause_dedup_does_not_change_match_semantics() {
        let f = FilterBuilder::new()
            .r#in("status", vec!["active".into(), "active".into()])
            .build();
        let md = serde_json::Map::new();
        assert!(f.matches("active", &md));
        assert!(f.canonical_json().matches("active").count() >= 1);
    }
}
