//! Mapping extractor
//!
//! Walks an RDF graph and produces the typed mapping model. The walk is
//! driven by an explicit schema (no reflection): for each entity kind, the
//! set of recognized predicates is enumerated here, and unknown predicates
//! are ignored without error.
//!
//! The one polymorphic decision - ordinary object map versus RefObjectMap -
//! is made by the presence of `rr:parentTriplesMap` on the object map
//! resource.

use std::collections::{HashMap, HashSet};

use rmlx_graph::{Graph, Statement, Term};
use rmlx_vocab::{carml, fnml, rdf, rml, rr};

use crate::error::{ModelError, ModelResult};
use crate::function_map::FunctionMap;
use crate::ref_object_map::{JoinCondition, RefObjectMap};
use crate::term_map::{
    GraphMap, ObjectMap, ObjectMapKind, PredicateMap, PredicateObjectMap, SubjectMap, TermMap,
    TermType,
};
use crate::triples_map::{LogicalSource, SourceSpec, TriplesMap};

/// Extract all TriplesMap definitions from a mapping graph
///
/// A resource is a TriplesMap root when it is typed `rr:TriplesMap`, or
/// when it carries both a logical source and a subject map. Roots are
/// processed in sorted node-key order for deterministic output.
pub fn load_mapping(graph: &Graph) -> ModelResult<Vec<TriplesMap>> {
    let extractor = Extractor::new(graph);
    let triples_maps = extractor.extract_all()?;

    // Parent references must name a TriplesMap in the same document.
    let known: HashSet<&str> = triples_maps.iter().map(|tm| tm.id.as_str()).collect();
    for tm in &triples_maps {
        for pom in &tm.predicate_object_maps {
            for rom in pom.ref_object_maps() {
                if !known.contains(rom.parent_triples_map.as_str()) {
                    return Err(ModelError::UnknownTriplesMap(
                        rom.parent_triples_map.clone(),
                    ));
                }
            }
        }
    }

    Ok(triples_maps)
}

struct Extractor<'a> {
    by_subject: HashMap<String, Vec<&'a Statement>>,
}

impl<'a> Extractor<'a> {
    fn new(graph: &'a Graph) -> Self {
        let mut by_subject: HashMap<String, Vec<&Statement>> = HashMap::new();
        for st in graph.iter() {
            if let Some(key) = st.subject.node_key() {
                by_subject.entry(key).or_default().push(st);
            }
        }
        Self { by_subject }
    }

    fn statements_of(&self, key: &str) -> &[&'a Statement] {
        self.by_subject
            .get(key)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    fn objects_of(&self, key: &str, predicate: &str) -> Vec<&'a Term> {
        self.statements_of(key)
            .iter()
            .filter(|st| st.predicate.as_iri() == Some(predicate))
            .map(|st| &st.object)
            .collect()
    }

    fn object_of(&self, key: &str, predicate: &str) -> Option<&'a Term> {
        self.objects_of(key, predicate).into_iter().next()
    }

    fn literal_of(&self, key: &str, predicate: &str) -> Option<String> {
        self.object_of(key, predicate)
            .and_then(|t| t.as_literal().map(|(lex, _, _)| lex.to_string()))
    }

    fn has_predicate(&self, key: &str, predicate: &str) -> bool {
        self.object_of(key, predicate).is_some()
    }

    fn is_type(&self, key: &str, class: &str) -> bool {
        self.objects_of(key, rdf::TYPE)
            .iter()
            .any(|t| t.as_iri() == Some(class))
    }

    /// IRI id of an entity node, None for blank-node-rooted entities
    fn iri_id(term: &Term) -> Option<String> {
        term.as_iri().map(str::to_string)
    }

    fn extract_all(&self) -> ModelResult<Vec<TriplesMap>> {
        let mut roots: Vec<&String> = self
            .by_subject
            .keys()
            .filter(|key| self.is_triples_map(key))
            .collect();
        roots.sort();

        roots
            .into_iter()
            .map(|key| self.extract_triples_map(key))
            .collect()
    }

    fn is_triples_map(&self, key: &str) -> bool {
        self.is_type(key, rr::TRIPLES_MAP)
            || (self.has_predicate(key, rml::LOGICAL_SOURCE)
                && (self.has_predicate(key, rr::SUBJECT_MAP)
                    || self.has_predicate(key, rr::SUBJECT)))
    }

    fn extract_triples_map(&self, key: &str) -> ModelResult<TriplesMap> {
        let logical_source = self.extract_logical_source(key)?;
        let subject_map = self.extract_subject_map(key)?;

        let mut poms = Vec::new();
        for node in self.objects_of(key, rr::PREDICATE_OBJECT_MAP) {
            let pom_key = node.node_key().ok_or_else(|| ModelError::InvalidValue {
                property: "rr:predicateObjectMap".to_string(),
                message: "expected a resource".to_string(),
            })?;
            poms.push(self.extract_pom(&pom_key)?);
        }

        Ok(TriplesMap {
            id: key.to_string(),
            logical_source,
            subject_map,
            predicate_object_maps: poms,
        })
    }

    fn extract_logical_source(&self, tm_key: &str) -> ModelResult<LogicalSource> {
        let ls_node = self
            .object_of(tm_key, rml::LOGICAL_SOURCE)
            .ok_or_else(|| ModelError::MissingProperty(format!("rml:logicalSource on {tm_key}")))?;
        let ls_key = ls_node.node_key().ok_or_else(|| ModelError::InvalidValue {
            property: "rml:logicalSource".to_string(),
            message: "expected a resource".to_string(),
        })?;

        let source_term = self
            .object_of(&ls_key, rml::SOURCE)
            .ok_or_else(|| ModelError::MissingProperty(format!("rml:source on {ls_key}")))?;

        let source = match source_term {
            Term::Literal { lexical, .. } => SourceSpec::Reference(lexical.to_string()),
            term => {
                let source_key = term.node_key().expect("resource term has a node key");
                if self.is_type(&source_key, carml::STREAM)
                    || self.has_predicate(&source_key, carml::STREAM_NAME)
                {
                    SourceSpec::NamedStream(self.literal_of(&source_key, carml::STREAM_NAME))
                } else if let Some(iri) = term.as_iri() {
                    SourceSpec::Reference(iri.to_string())
                } else {
                    return Err(ModelError::InvalidValue {
                        property: "rml:source".to_string(),
                        message: format!("unrecognized source resource {source_key}"),
                    });
                }
            }
        };

        let reference_formulation = self
            .object_of(&ls_key, rml::REFERENCE_FORMULATION)
            .and_then(|t| t.as_iri())
            .ok_or_else(|| {
                ModelError::MissingProperty(format!("rml:referenceFormulation on {ls_key}"))
            })?
            .to_string();

        Ok(LogicalSource {
            id: Extractor::iri_id(ls_node),
            source,
            reference_formulation,
            iterator: self.literal_of(&ls_key, rml::ITERATOR),
        })
    }

    fn extract_subject_map(&self, tm_key: &str) -> ModelResult<SubjectMap> {
        // Shorthand rr:subject declares a constant subject.
        if let Some(subject) = self.object_of(tm_key, rr::SUBJECT) {
            if !subject.is_resource() {
                return Err(ModelError::InvalidValue {
                    property: "rr:subject".to_string(),
                    message: "subject cannot be a literal".to_string(),
                });
            }
            return Ok(SubjectMap::constant(subject.clone()));
        }

        let sm_node = self
            .object_of(tm_key, rr::SUBJECT_MAP)
            .ok_or_else(|| ModelError::MissingProperty(format!("rr:subjectMap on {tm_key}")))?;
        let sm_key = sm_node.node_key().ok_or_else(|| ModelError::InvalidValue {
            property: "rr:subjectMap".to_string(),
            message: "expected a resource".to_string(),
        })?;

        let term_map = self.extract_term_map(&sm_key)?;
        term_map.validate("subject map")?;

        Ok(SubjectMap {
            id: Extractor::iri_id(sm_node),
            term_map,
            classes: self
                .objects_of(&sm_key, rr::CLASS)
                .into_iter()
                .cloned()
                .collect(),
            graph_maps: self.extract_graph_maps(&sm_key)?,
        })
    }

    fn extract_graph_maps(&self, key: &str) -> ModelResult<Vec<GraphMap>> {
        let mut graph_maps = Vec::new();

        // Shorthand rr:graph.
        for graph in self.objects_of(key, rr::GRAPH) {
            graph_maps.push(GraphMap {
                id: None,
                term_map: TermMap::constant(graph.clone()),
            });
        }

        for node in self.objects_of(key, rr::GRAPH_MAP) {
            let gm_key = node.node_key().ok_or_else(|| ModelError::InvalidValue {
                property: "rr:graphMap".to_string(),
                message: "expected a resource".to_string(),
            })?;
            let term_map = self.extract_term_map(&gm_key)?;
            term_map.validate("graph map")?;
            graph_maps.push(GraphMap {
                id: Extractor::iri_id(node),
                term_map,
            });
        }

        Ok(graph_maps)
    }

    fn extract_pom(&self, key: &str) -> ModelResult<PredicateObjectMap> {
        let mut predicate_maps = Vec::new();

        // Shorthand rr:predicate.
        for predicate in self.objects_of(key, rr::PREDICATE) {
            if !predicate.is_iri() {
                return Err(ModelError::InvalidValue {
                    property: "rr:predicate".to_string(),
                    message: "expected an IRI".to_string(),
                });
            }
            predicate_maps.push(PredicateMap {
                id: None,
                term_map: TermMap::constant(predicate.clone()),
            });
        }

        for node in self.objects_of(key, rr::PREDICATE_MAP) {
            let pm_key = node.node_key().ok_or_else(|| ModelError::InvalidValue {
                property: "rr:predicateMap".to_string(),
                message: "expected a resource".to_string(),
            })?;
            let term_map = self.extract_term_map(&pm_key)?;
            term_map.validate("predicate map")?;
            predicate_maps.push(PredicateMap {
                id: Extractor::iri_id(node),
                term_map,
            });
        }

        let mut object_maps = Vec::new();

        // Shorthand rr:object declares a constant object.
        for object in self.objects_of(key, rr::OBJECT) {
            object_maps.push(ObjectMapKind::Value(ObjectMap::constant(object.clone())));
        }

        for node in self.objects_of(key, rr::OBJECT_MAP) {
            let om_key = node.node_key().ok_or_else(|| ModelError::InvalidValue {
                property: "rr:objectMap".to_string(),
                message: "expected a resource".to_string(),
            })?;
            object_maps.push(self.extract_object_map(node, &om_key)?);
        }

        Ok(PredicateObjectMap {
            id: if key.starts_with("_:") {
                None
            } else {
                Some(key.to_string())
            },
            predicate_maps,
            object_maps,
            graph_maps: self.extract_graph_maps(key)?,
        })
    }

    fn extract_object_map(&self, node: &Term, key: &str) -> ModelResult<ObjectMapKind> {
        // The discriminator rule: rr:parentTriplesMap makes a RefObjectMap.
        if self.has_predicate(key, rr::PARENT_TRIPLES_MAP) {
            return Ok(ObjectMapKind::Ref(self.extract_ref_object_map(node, key)?));
        }

        let term_map = self.extract_term_map(key)?;
        term_map.validate("object map")?;

        Ok(ObjectMapKind::Value(ObjectMap {
            id: Extractor::iri_id(node),
            term_map,
            datatype: self
                .object_of(key, rr::DATATYPE)
                .and_then(|t| t.as_iri())
                .map(str::to_string),
            language: self.literal_of(key, rr::LANGUAGE),
        }))
    }

    fn extract_ref_object_map(&self, node: &Term, key: &str) -> ModelResult<RefObjectMap> {
        let parent = self
            .object_of(key, rr::PARENT_TRIPLES_MAP)
            .and_then(|t| t.node_key())
            .ok_or_else(|| ModelError::InvalidValue {
                property: "rr:parentTriplesMap".to_string(),
                message: "expected a resource".to_string(),
            })?;

        let mut join_conditions = Vec::new();
        for jc_node in self.objects_of(key, rr::JOIN_CONDITION) {
            let jc_key = jc_node.node_key().ok_or_else(|| ModelError::InvalidValue {
                property: "rr:joinCondition".to_string(),
                message: "expected a resource".to_string(),
            })?;
            let child = self
                .literal_of(&jc_key, rr::CHILD)
                .ok_or_else(|| ModelError::MissingProperty(format!("rr:child on {jc_key}")))?;
            let parent_expr = self
                .literal_of(&jc_key, rr::PARENT)
                .ok_or_else(|| ModelError::MissingProperty(format!("rr:parent on {jc_key}")))?;
            join_conditions.push(JoinCondition::new(child, parent_expr));
        }

        Ok(RefObjectMap {
            id: Extractor::iri_id(node),
            parent_triples_map: parent,
            join_conditions,
        })
    }

    fn extract_term_map(&self, key: &str) -> ModelResult<TermMap> {
        let function_map = match self.object_of(key, fnml::FUNCTION_VALUE) {
            Some(node) => {
                let fm_key = node.node_key().ok_or_else(|| ModelError::InvalidValue {
                    property: "fnml:functionValue".to_string(),
                    message: "expected a resource".to_string(),
                })?;
                let mut poms = Vec::new();
                for pom_node in self.objects_of(&fm_key, rr::PREDICATE_OBJECT_MAP) {
                    let pom_key =
                        pom_node
                            .node_key()
                            .ok_or_else(|| ModelError::InvalidValue {
                                property: "rr:predicateObjectMap".to_string(),
                                message: "expected a resource".to_string(),
                            })?;
                    poms.push(self.extract_pom(&pom_key)?);
                }
                Some(FunctionMap {
                    id: Extractor::iri_id(node),
                    predicate_object_maps: poms,
                })
            }
            None => None,
        };

        let term_type = match self.object_of(key, rr::TERM_TYPE) {
            Some(term) => {
                let iri = term.as_iri().ok_or_else(|| ModelError::InvalidValue {
                    property: "rr:termType".to_string(),
                    message: "expected an IRI".to_string(),
                })?;
                Some(
                    TermType::from_iri(iri).ok_or_else(|| ModelError::InvalidValue {
                        property: "rr:termType".to_string(),
                        message: format!("unknown term type {iri}"),
                    })?,
                )
            }
            None => None,
        };

        Ok(TermMap {
            constant: self.object_of(key, rr::CONSTANT).cloned(),
            reference: self.literal_of(key, rml::REFERENCE),
            template: self.literal_of(key, rr::TEMPLATE),
            function_map,
            term_type,
        })
    }
}
