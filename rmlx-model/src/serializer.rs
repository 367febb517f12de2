//! Mapping serializer
//!
//! Emits the typed mapping model back as RDF. Blank nodes are regenerated
//! deterministically from traversal order, so serializing the result of a
//! load yields a graph that is stable under repeated round-trips (equal as
//! an unordered triple set modulo blank-node relabeling).

use std::collections::HashMap;

use rmlx_graph::{Graph, Term};
use rmlx_vocab::{carml, fnml, rdf, rml, rr};

use crate::function_map::FunctionMap;
use crate::ref_object_map::RefObjectMap;
use crate::term_map::{
    GraphMap, ObjectMapKind, PredicateObjectMap, TermMap,
};
use crate::triples_map::{SourceSpec, TriplesMap};

/// Serialize a set of TriplesMaps into an RDF graph
pub fn serialize_mapping(triples_maps: &[TriplesMap]) -> Graph {
    let mut sorted: Vec<&TriplesMap> = triples_maps.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let mut serializer = Serializer::default();

    // Mint TriplesMap nodes up front so parent references resolve to the
    // regenerated node regardless of emission order.
    let mut tm_nodes: HashMap<String, Term> = HashMap::new();
    for tm in &sorted {
        let node = serializer.node_for_key(&tm.id);
        tm_nodes.insert(tm.id.clone(), node);
    }

    for tm in &sorted {
        serializer.emit_triples_map(tm, &tm_nodes);
    }

    serializer.graph
}

#[derive(Default)]
struct Serializer {
    graph: Graph,
    bnode_counter: usize,
}

impl Serializer {
    fn fresh_bnode(&mut self) -> Term {
        let term = Term::blank(format!("m{}", self.bnode_counter));
        self.bnode_counter += 1;
        term
    }

    /// Node for a graph key: IRIs survive, blank labels are regenerated.
    fn node_for_key(&mut self, key: &str) -> Term {
        if key.starts_with("_:") {
            self.fresh_bnode()
        } else {
            Term::iri(key)
        }
    }

    /// Node for an optional entity id: IRI-rooted entities keep their IRI.
    fn node_for_id(&mut self, id: &Option<String>) -> Term {
        match id {
            Some(iri) if !iri.starts_with("_:") => Term::iri(iri),
            _ => self.fresh_bnode(),
        }
    }

    fn emit(&mut self, subject: &Term, predicate: &str, object: Term) {
        self.graph
            .add_triple(subject.clone(), Term::iri(predicate), object);
    }

    fn emit_triples_map(&mut self, tm: &TriplesMap, tm_nodes: &HashMap<String, Term>) {
        let node = tm_nodes
            .get(&tm.id)
            .cloned()
            .expect("node minted for every TriplesMap");
        self.emit(&node, rdf::TYPE, Term::iri(rr::TRIPLES_MAP));

        // Logical source.
        let ls_node = self.node_for_id(&tm.logical_source.id);
        self.emit(&node, rml::LOGICAL_SOURCE, ls_node.clone());
        self.emit(&ls_node, rdf::TYPE, Term::iri(rml::LOGICAL_SOURCE_CLASS));
        match &tm.logical_source.source {
            SourceSpec::Reference(reference) => {
                self.emit(&ls_node, rml::SOURCE, Term::string(reference));
            }
            SourceSpec::NamedStream(name) => {
                let stream_node = self.fresh_bnode();
                self.emit(&ls_node, rml::SOURCE, stream_node.clone());
                self.emit(&stream_node, rdf::TYPE, Term::iri(carml::STREAM));
                if let Some(name) = name {
                    self.emit(&stream_node, carml::STREAM_NAME, Term::string(name));
                }
            }
        }
        self.emit(
            &ls_node,
            rml::REFERENCE_FORMULATION,
            Term::iri(&tm.logical_source.reference_formulation),
        );
        if let Some(iterator) = &tm.logical_source.iterator {
            self.emit(&ls_node, rml::ITERATOR, Term::string(iterator));
        }

        // Subject map.
        let sm_node = self.node_for_id(&tm.subject_map.id);
        self.emit(&node, rr::SUBJECT_MAP, sm_node.clone());
        self.emit(&sm_node, rdf::TYPE, Term::iri(rr::SUBJECT_MAP_CLASS));
        self.emit_term_map(&sm_node, &tm.subject_map.term_map, tm_nodes);
        for class in &tm.subject_map.classes {
            self.emit(&sm_node, rr::CLASS, class.clone());
        }
        for graph_map in &tm.subject_map.graph_maps {
            self.emit_graph_map(&sm_node, graph_map, tm_nodes);
        }

        for pom in &tm.predicate_object_maps {
            self.emit_pom(&node, pom, tm_nodes);
        }
    }

    fn emit_pom(
        &mut self,
        parent: &Term,
        pom: &PredicateObjectMap,
        tm_nodes: &HashMap<String, Term>,
    ) {
        let node = self.node_for_id(&pom.id);
        self.emit(parent, rr::PREDICATE_OBJECT_MAP, node.clone());
        self.emit(&node, rdf::TYPE, Term::iri(rr::PREDICATE_OBJECT_MAP_CLASS));

        for pm in &pom.predicate_maps {
            let pm_node = self.node_for_id(&pm.id);
            self.emit(&node, rr::PREDICATE_MAP, pm_node.clone());
            self.emit(&pm_node, rdf::TYPE, Term::iri(rr::PREDICATE_MAP_CLASS));
            self.emit_term_map(&pm_node, &pm.term_map, tm_nodes);
        }

        for om in &pom.object_maps {
            match om {
                ObjectMapKind::Value(object_map) => {
                    let om_node = self.node_for_id(&object_map.id);
                    self.emit(&node, rr::OBJECT_MAP, om_node.clone());
                    self.emit(&om_node, rdf::TYPE, Term::iri(rr::OBJECT_MAP_CLASS));
                    self.emit_term_map(&om_node, &object_map.term_map, tm_nodes);
                    if let Some(datatype) = &object_map.datatype {
                        self.emit(&om_node, rr::DATATYPE, Term::iri(datatype));
                    }
                    if let Some(language) = &object_map.language {
                        self.emit(&om_node, rr::LANGUAGE, Term::string(language));
                    }
                }
                ObjectMapKind::Ref(rom) => self.emit_ref_object_map(&node, rom, tm_nodes),
            }
        }

        for graph_map in &pom.graph_maps {
            self.emit_graph_map(&node, graph_map, tm_nodes);
        }
    }

    fn emit_ref_object_map(
        &mut self,
        pom_node: &Term,
        rom: &RefObjectMap,
        tm_nodes: &HashMap<String, Term>,
    ) {
        let node = self.node_for_id(&rom.id);
        self.emit(pom_node, rr::OBJECT_MAP, node.clone());
        self.emit(&node, rdf::TYPE, Term::iri(rr::REF_OBJECT_MAP_CLASS));

        let parent_node = tm_nodes
            .get(&rom.parent_triples_map)
            .cloned()
            .unwrap_or_else(|| Term::iri(&rom.parent_triples_map));
        self.emit(&node, rr::PARENT_TRIPLES_MAP, parent_node);

        for jc in &rom.join_conditions {
            let jc_node = self.fresh_bnode();
            self.emit(&node, rr::JOIN_CONDITION, jc_node.clone());
            self.emit(&jc_node, rdf::TYPE, Term::iri(rr::JOIN_CLASS));
            self.emit(&jc_node, rr::CHILD, Term::string(&jc.child));
            self.emit(&jc_node, rr::PARENT, Term::string(&jc.parent));
        }
    }

    fn emit_graph_map(
        &mut self,
        parent: &Term,
        graph_map: &GraphMap,
        tm_nodes: &HashMap<String, Term>,
    ) {
        let node = self.node_for_id(&graph_map.id);
        self.emit(parent, rr::GRAPH_MAP, node.clone());
        self.emit(&node, rdf::TYPE, Term::iri(rr::GRAPH_MAP_CLASS));
        self.emit_term_map(&node, &graph_map.term_map, tm_nodes);
    }

    fn emit_term_map(&mut self, node: &Term, term_map: &TermMap, tm_nodes: &HashMap<String, Term>) {
        if let Some(constant) = &term_map.constant {
            self.emit(node, rr::CONSTANT, constant.clone());
        }
        if let Some(reference) = &term_map.reference {
            self.emit(node, rml::REFERENCE, Term::string(reference));
        }
        if let Some(template) = &term_map.template {
            self.emit(node, rr::TEMPLATE, Term::string(template));
        }
        if let Some(function_map) = &term_map.function_map {
            self.emit_function_map(node, function_map, tm_nodes);
        }
        if let Some(term_type) = &term_map.term_type {
            self.emit(node, rr::TERM_TYPE, Term::iri(term_type.as_iri()));
        }
    }

    fn emit_function_map(
        &mut self,
        parent: &Term,
        function_map: &FunctionMap,
        tm_nodes: &HashMap<String, Term>,
    ) {
        let node = self.node_for_id(&function_map.id);
        self.emit(parent, fnml::FUNCTION_VALUE, node.clone());
        for pom in &function_map.predicate_object_maps {
            self.emit_pom(&node, pom, tm_nodes);
        }
    }
}
