//! TriplesMap and LogicalSource structures

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::term_map::{PredicateObjectMap, SubjectMap};

/// The source reference of a logical source
///
/// Opaque to the model; the engine's source resolvers interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceSpec {
    /// A literal or IRI reference resolved by the configured resolvers
    /// (file path, embedded asset name, URL, ...)
    Reference(String),
    /// A named input stream provided at mapping time; `None` binds to the
    /// sole unnamed input
    NamedStream(Option<String>),
}

impl SourceSpec {
    /// Create a plain reference
    pub fn reference(reference: impl Into<String>) -> Self {
        SourceSpec::Reference(reference.into())
    }

    /// Create a named stream reference
    pub fn stream(name: impl Into<String>) -> Self {
        SourceSpec::NamedStream(Some(name.into()))
    }

    /// Create an unnamed stream reference
    pub fn unnamed_stream() -> Self {
        SourceSpec::NamedStream(None)
    }

    /// Human-readable description for diagnostics
    pub fn describe(&self) -> String {
        match self {
            SourceSpec::Reference(r) => r.clone(),
            SourceSpec::NamedStream(Some(name)) => format!("stream:{name}"),
            SourceSpec::NamedStream(None) => "stream:<unnamed>".to_string(),
        }
    }
}

/// The input description of a TriplesMap
///
/// Equality and hashing are by value, ignoring the graph resource id: two
/// TriplesMaps with equal logical sources share one pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalSource {
    /// Resource IRI of this logical source in the mapping graph, if
    /// IRI-rooted
    pub id: Option<String>,
    /// The source reference
    pub source: SourceSpec,
    /// Reference formulation IRI selecting the decoder
    pub reference_formulation: String,
    /// Iterator expression into the decoded document
    pub iterator: Option<String>,
}

impl LogicalSource {
    /// Create a logical source
    pub fn new(source: SourceSpec, reference_formulation: impl Into<String>) -> Self {
        Self {
            id: None,
            source,
            reference_formulation: reference_formulation.into(),
            iterator: None,
        }
    }

    /// Set the iterator expression
    pub fn with_iterator(mut self, iterator: impl Into<String>) -> Self {
        self.iterator = Some(iterator.into());
        self
    }
}

impl PartialEq for LogicalSource {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
            && self.reference_formulation == other.reference_formulation
            && self.iterator == other.iterator
    }
}

impl Eq for LogicalSource {}

impl Hash for LogicalSource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
        self.reference_formulation.hash(state);
        self.iterator.hash(state);
    }
}

/// One mapping rule producing a set of triples sharing a subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriplesMap {
    /// Stable node key of this TriplesMap in the mapping graph (IRI or
    /// `_:label`)
    pub id: String,
    /// The input description
    pub logical_source: LogicalSource,
    /// The subject map
    pub subject_map: SubjectMap,
    /// The predicate-object maps
    pub predicate_object_maps: Vec<PredicateObjectMap>,
}

impl TriplesMap {
    /// Create a TriplesMap
    pub fn new(
        id: impl Into<String>,
        logical_source: LogicalSource,
        subject_map: SubjectMap,
    ) -> Self {
        Self {
            id: id.into(),
            logical_source,
            subject_map,
            predicate_object_maps: Vec::new(),
        }
    }

    /// Add a predicate-object map
    pub fn with_pom(mut self, pom: PredicateObjectMap) -> Self {
        self.predicate_object_maps.push(pom);
        self
    }

    /// Whether this TriplesMap can produce subjects
    ///
    /// A TriplesMap is mappable iff its subject map carries a term
    /// specification (template, reference, constant, or function).
    pub fn is_mappable(&self) -> bool {
        self.subject_map.term_map.has_term_spec()
    }
}

/// Keep only the mappable TriplesMaps
pub fn filter_mappable(triples_maps: &[TriplesMap]) -> Vec<TriplesMap> {
    triples_maps
        .iter()
        .filter(|tm| tm.is_mappable())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term_map::TermMap;

    fn csv_source(path: &str) -> LogicalSource {
        LogicalSource::new(SourceSpec::reference(path), rmlx_vocab::ql::CSV)
    }

    #[test]
    fn test_logical_source_equality_ignores_id() {
        let mut a = csv_source("data.csv");
        let mut b = csv_source("data.csv");
        a.id = Some("http://ex/ls1".to_string());
        b.id = Some("http://ex/ls2".to_string());
        assert_eq!(a, b);

        let c = csv_source("other.csv");
        assert_ne!(a, c);
    }

    #[test]
    fn test_logical_source_iterator_distinguishes() {
        let a = LogicalSource::new(SourceSpec::reference("d.json"), rmlx_vocab::ql::JSON_PATH)
            .with_iterator("$.items[*]");
        let b = LogicalSource::new(SourceSpec::reference("d.json"), rmlx_vocab::ql::JSON_PATH)
            .with_iterator("$.users[*]");
        assert_ne!(a, b);
    }

    #[test]
    fn test_mappable() {
        let mappable = TriplesMap::new(
            "http://ex/M1",
            csv_source("data.csv"),
            SubjectMap::template("http://ex/{id}"),
        );
        assert!(mappable.is_mappable());

        let bare = TriplesMap::new(
            "http://ex/M2",
            csv_source("data.csv"),
            SubjectMap {
                id: None,
                term_map: TermMap::default(),
                classes: Vec::new(),
                graph_maps: Vec::new(),
            },
        );
        assert!(!bare.is_mappable());

        let kept = filter_mappable(&[mappable, bare]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "http://ex/M1");
    }

    #[test]
    fn test_source_spec_describe() {
        assert_eq!(SourceSpec::reference("a.csv").describe(), "a.csv");
        assert_eq!(SourceSpec::stream("feed").describe(), "stream:feed");
        assert_eq!(SourceSpec::unnamed_stream().describe(), "stream:<unnamed>");
    }
}
