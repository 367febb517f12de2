//! RefObjectMap structures
//!
//! RefObjectMaps reference subjects generated by another TriplesMap,
//! optionally filtered by join conditions over child and parent records.

use serde::{Deserialize, Serialize};

/// Reference to a parent TriplesMap with join conditions
///
/// With no join conditions, the reference is a direct product over parent
/// subjects sharing the child's logical source (a per-record self-join).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefObjectMap {
    /// Resource IRI of this map in the mapping graph, if IRI-rooted
    pub id: Option<String>,
    /// Node key of the parent TriplesMap
    pub parent_triples_map: String,
    /// Join conditions; empty means same-source self-join
    pub join_conditions: Vec<JoinCondition>,
}

impl RefObjectMap {
    /// Create a RefObjectMap with no join conditions
    pub fn new(parent_triples_map: impl Into<String>) -> Self {
        Self {
            id: None,
            parent_triples_map: parent_triples_map.into(),
            join_conditions: Vec::new(),
        }
    }

    /// Create a RefObjectMap with a single join condition
    pub fn with_join(
        parent_triples_map: impl Into<String>,
        child: impl Into<String>,
        parent: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            parent_triples_map: parent_triples_map.into(),
            join_conditions: vec![JoinCondition::new(child, parent)],
        }
    }

    /// Add a join condition
    pub fn add_condition(&mut self, child: impl Into<String>, parent: impl Into<String>) {
        self.join_conditions.push(JoinCondition::new(child, parent));
    }

    /// Whether any join conditions are declared
    pub fn has_conditions(&self) -> bool {
        !self.join_conditions.is_empty()
    }

    /// Child-side expressions of all join conditions
    pub fn child_expressions(&self) -> impl Iterator<Item = &str> {
        self.join_conditions.iter().map(|jc| jc.child.as_str())
    }

    /// Parent-side expressions of all join conditions
    pub fn parent_expressions(&self) -> impl Iterator<Item = &str> {
        self.join_conditions.iter().map(|jc| jc.parent.as_str())
    }
}

/// A single join condition
///
/// The child expression evaluated against the child record must equal the
/// parent expression evaluated against the parent record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JoinCondition {
    /// Expression over the child record
    pub child: String,
    /// Expression over the parent record
    pub parent: String,
}

impl JoinCondition {
    /// Create a new join condition
    pub fn new(child: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            child: child.into(),
            parent: parent.into(),
        }
    }
}
