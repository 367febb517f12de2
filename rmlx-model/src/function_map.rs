//! Function term map structures
//!
//! A function map (`fnml:functionValue`) describes a function call as a
//! nested mapping: its predicate-object maps are evaluated against the
//! current record to produce the execution description. The predicate
//! `fno:executes` names the function; every other predicate is a parameter
//! binding.

use serde::{Deserialize, Serialize};

use crate::term_map::PredicateObjectMap;

/// A function call described as a nested mapping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionMap {
    /// Resource IRI of this map in the mapping graph, if IRI-rooted
    pub id: Option<String>,
    /// Predicate-object maps forming the execution description
    pub predicate_object_maps: Vec<PredicateObjectMap>,
}

impl FunctionMap {
    /// Create a function map from its predicate-object maps
    pub fn new(predicate_object_maps: Vec<PredicateObjectMap>) -> Self {
        Self {
            id: None,
            predicate_object_maps,
        }
    }
}
