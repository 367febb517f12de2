//! Term map structures
//!
//! Term maps define how RDF terms are generated from a source record. The
//! core [`TermMap`] carries the value specification (constant, reference,
//! template, or function); the position-specific wrappers add what each
//! position needs: classes and graphs for subjects, datatype and language
//! for objects.

use serde::{Deserialize, Serialize};

use rmlx_graph::Term;

use crate::error::{ModelError, ModelResult};
use crate::function_map::FunctionMap;
use crate::ref_object_map::RefObjectMap;

/// Kind of RDF term a term map generates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TermType {
    /// Generate an IRI (default for subject, predicate, and graph maps)
    Iri,
    /// Generate a blank node
    BlankNode,
    /// Generate a literal (default for reference-valued object maps)
    Literal,
}

impl TermType {
    /// Parse a term type from its R2RML IRI
    pub fn from_iri(iri: &str) -> Option<Self> {
        match iri {
            rmlx_vocab::rr::IRI => Some(TermType::Iri),
            rmlx_vocab::rr::BLANK_NODE => Some(TermType::BlankNode),
            rmlx_vocab::rr::LITERAL => Some(TermType::Literal),
            _ => None,
        }
    }

    /// The R2RML IRI naming this term type
    pub fn as_iri(&self) -> &'static str {
        match self {
            TermType::Iri => rmlx_vocab::rr::IRI,
            TermType::BlankNode => rmlx_vocab::rr::BLANK_NODE,
            TermType::Literal => rmlx_vocab::rr::LITERAL,
        }
    }
}

/// Core term map: how a value is obtained from a record
///
/// # Invariant
///
/// At most one of `constant`, `reference`, `template`, `function_map` is
/// set. A term map with none of them produces no terms (and makes an
/// enclosing subject map unmappable).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermMap {
    /// `rr:constant` - a fixed term
    pub constant: Option<Term>,
    /// `rml:reference` - a source field expression
    pub reference: Option<String>,
    /// `rr:template` - a template over source fields
    pub template: Option<String>,
    /// `fnml:functionValue` - a function call over nested term maps
    pub function_map: Option<FunctionMap>,
    /// `rr:termType` - explicit term type; position default when absent
    pub term_type: Option<TermType>,
}

impl TermMap {
    /// Create a constant term map
    pub fn constant(term: Term) -> Self {
        Self {
            constant: Some(term),
            ..Default::default()
        }
    }

    /// Create a reference term map
    pub fn reference(expression: impl Into<String>) -> Self {
        Self {
            reference: Some(expression.into()),
            ..Default::default()
        }
    }

    /// Create a template term map
    pub fn template(template: impl Into<String>) -> Self {
        Self {
            template: Some(template.into()),
            ..Default::default()
        }
    }

    /// Create a function term map
    pub fn function(function_map: FunctionMap) -> Self {
        Self {
            function_map: Some(function_map),
            ..Default::default()
        }
    }

    /// Set an explicit term type
    pub fn with_term_type(mut self, term_type: TermType) -> Self {
        self.term_type = Some(term_type);
        self
    }

    /// Whether any value specification is present
    pub fn has_term_spec(&self) -> bool {
        self.constant.is_some()
            || self.reference.is_some()
            || self.template.is_some()
            || self.function_map.is_some()
    }

    /// Validate the one-of invariant
    pub fn validate(&self, position: &str) -> ModelResult<()> {
        let set = [
            self.constant.is_some(),
            self.reference.is_some(),
            self.template.is_some(),
            self.function_map.is_some(),
        ]
        .iter()
        .filter(|b| **b)
        .count();

        if set > 1 {
            return Err(ModelError::Malformed(format!(
                "{position} sets more than one of constant, reference, template, functionValue"
            )));
        }
        Ok(())
    }

    /// Effective term type given the position default
    pub fn effective_term_type(&self, default: TermType) -> TermType {
        self.term_type.unwrap_or(default)
    }
}

/// Subject map: generates IRIs or blank nodes, may declare classes and graphs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectMap {
    /// Resource IRI of this map in the mapping graph, if IRI-rooted
    pub id: Option<String>,
    /// The core term map
    pub term_map: TermMap,
    /// `rr:class` - classes emitted as rdf:type triples per subject
    pub classes: Vec<Term>,
    /// `rr:graphMap` - graphs for all triples of the triples map
    pub graph_maps: Vec<GraphMap>,
}

impl SubjectMap {
    /// Create a template subject map
    pub fn template(template: impl Into<String>) -> Self {
        Self {
            term_map: TermMap::template(template),
            ..Default::default()
        }
    }

    /// Create a constant subject map
    pub fn constant(term: Term) -> Self {
        Self {
            term_map: TermMap::constant(term),
            ..Default::default()
        }
    }

    /// Create a reference subject map
    pub fn reference(expression: impl Into<String>) -> Self {
        Self {
            term_map: TermMap::reference(expression),
            ..Default::default()
        }
    }

    /// Add a class
    pub fn with_class(mut self, class: Term) -> Self {
        self.classes.push(class);
        self
    }

    /// Set the term type
    pub fn with_term_type(mut self, term_type: TermType) -> Self {
        self.term_map.term_type = Some(term_type);
        self
    }

    /// Add a graph map
    pub fn with_graph_map(mut self, graph_map: GraphMap) -> Self {
        self.graph_maps.push(graph_map);
        self
    }
}

/// Predicate map: generates predicate IRIs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredicateMap {
    /// Resource IRI of this map in the mapping graph, if IRI-rooted
    pub id: Option<String>,
    /// The core term map
    pub term_map: TermMap,
}

impl PredicateMap {
    /// Create a constant predicate map from an IRI
    pub fn constant_iri(iri: impl AsRef<str>) -> Self {
        Self {
            id: None,
            term_map: TermMap::constant(Term::iri(iri)),
        }
    }

    /// Create a template predicate map
    pub fn template(template: impl Into<String>) -> Self {
        Self {
            id: None,
            term_map: TermMap::template(template),
        }
    }
}

/// Object map generating values directly (not via a parent join)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMap {
    /// Resource IRI of this map in the mapping graph, if IRI-rooted
    pub id: Option<String>,
    /// The core term map
    pub term_map: TermMap,
    /// `rr:datatype` - datatype IRI for typed literals
    pub datatype: Option<String>,
    /// `rr:language` - language tag for language-tagged strings
    pub language: Option<String>,
}

impl ObjectMap {
    /// Create a reference object map (literal by default)
    pub fn reference(expression: impl Into<String>) -> Self {
        Self {
            term_map: TermMap::reference(expression),
            ..Default::default()
        }
    }

    /// Create a template object map
    pub fn template(template: impl Into<String>) -> Self {
        Self {
            term_map: TermMap::template(template),
            ..Default::default()
        }
    }

    /// Create a constant object map
    pub fn constant(term: Term) -> Self {
        Self {
            term_map: TermMap::constant(term),
            ..Default::default()
        }
    }

    /// Set the datatype IRI
    pub fn with_datatype(mut self, datatype: impl Into<String>) -> Self {
        self.datatype = Some(datatype.into());
        self
    }

    /// Set the language tag
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Set the term type
    pub fn with_term_type(mut self, term_type: TermType) -> Self {
        self.term_map.term_type = Some(term_type);
        self
    }
}

/// Either a value-generating object map or a reference to a parent map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObjectMapKind {
    /// Values generated from the current record
    Value(ObjectMap),
    /// Values joined in from a parent TriplesMap's subjects
    Ref(RefObjectMap),
}

impl ObjectMapKind {
    /// Get the RefObjectMap if this is a reference
    pub fn as_ref_map(&self) -> Option<&RefObjectMap> {
        match self {
            ObjectMapKind::Ref(rom) => Some(rom),
            _ => None,
        }
    }

    /// Get the value object map if this is not a reference
    pub fn as_value(&self) -> Option<&ObjectMap> {
        match self {
            ObjectMapKind::Value(om) => Some(om),
            _ => None,
        }
    }
}

/// Graph map: generates named-graph IRIs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphMap {
    /// Resource IRI of this map in the mapping graph, if IRI-rooted
    pub id: Option<String>,
    /// The core term map
    pub term_map: TermMap,
}

impl GraphMap {
    /// Create a constant graph map from an IRI
    pub fn constant_iri(iri: impl AsRef<str>) -> Self {
        Self {
            id: None,
            term_map: TermMap::constant(Term::iri(iri)),
        }
    }

    /// Create a template graph map
    pub fn template(template: impl Into<String>) -> Self {
        Self {
            id: None,
            term_map: TermMap::template(template),
        }
    }
}

/// Predicate-object map
///
/// Groups sets of predicate maps, object maps, and graph maps; the engine
/// expands their product per record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredicateObjectMap {
    /// Resource IRI of this map in the mapping graph, if IRI-rooted
    pub id: Option<String>,
    /// The predicate maps
    pub predicate_maps: Vec<PredicateMap>,
    /// The object maps (values or parent references)
    pub object_maps: Vec<ObjectMapKind>,
    /// POM-scoped graph maps
    pub graph_maps: Vec<GraphMap>,
}

impl PredicateObjectMap {
    /// Create a predicate-object map with a single predicate and object
    pub fn new(predicate_map: PredicateMap, object_map: ObjectMapKind) -> Self {
        Self {
            id: None,
            predicate_maps: vec![predicate_map],
            object_maps: vec![object_map],
            graph_maps: Vec::new(),
        }
    }

    /// Iterate the RefObjectMaps among this POM's object maps
    pub fn ref_object_maps(&self) -> impl Iterator<Item = &RefObjectMap> {
        self.object_maps.iter().filter_map(|om| om.as_ref_map())
    }
}
