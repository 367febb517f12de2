//! RDF vocabulary constants for the rmlx mapping engine
//!
//! This crate provides a centralized location for the vocabulary IRIs used
//! throughout the rmlx ecosystem.
//!
//! # Organization
//!
//! Constants are organized by vocabulary:
//! - `rdf` - RDF vocabulary (http://www.w3.org/1999/02/22-rdf-syntax-ns#)
//! - `xsd` - XSD vocabulary (http://www.w3.org/2001/XMLSchema#)
//! - `rr` - R2RML vocabulary (http://www.w3.org/ns/r2rml#)
//! - `rml` - RML vocabulary (http://semweb.mmlab.be/ns/rml#)
//! - `ql` - query language / reference formulation vocabulary
//! - `carml` - carml stream extensions (http://carml.taxonic.com/carml/)
//! - `fnml` - function mapping vocabulary (http://semweb.mmlab.be/ns/fnml#)
//! - `fno` - function ontology (https://w3id.org/function/ontology#)

/// RDF vocabulary constants
pub mod rdf {
    /// rdf:type IRI
    pub const TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

    /// rdf:langString IRI
    pub const LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";
}

/// XSD vocabulary constants
pub mod xsd {
    /// xsd:string IRI
    pub const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";

    /// xsd:integer IRI
    pub const INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";

    /// xsd:decimal IRI
    pub const DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";

    /// xsd:double IRI
    pub const DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";

    /// xsd:boolean IRI
    pub const BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";

    /// xsd:date IRI
    pub const DATE: &str = "http://www.w3.org/2001/XMLSchema#date";

    /// xsd:dateTime IRI
    pub const DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
}

/// R2RML vocabulary constants
///
/// Defined by the W3C R2RML Recommendation: <https://www.w3.org/TR/r2rml/>
pub mod rr {
    /// R2RML namespace IRI
    pub const NS: &str = "http://www.w3.org/ns/r2rml#";

    // Classes

    /// rr:TriplesMap
    pub const TRIPLES_MAP: &str = "http://www.w3.org/ns/r2rml#TriplesMap";

    /// rr:SubjectMap
    pub const SUBJECT_MAP_CLASS: &str = "http://www.w3.org/ns/r2rml#SubjectMap";

    /// rr:PredicateMap
    pub const PREDICATE_MAP_CLASS: &str = "http://www.w3.org/ns/r2rml#PredicateMap";

    /// rr:ObjectMap
    pub const OBJECT_MAP_CLASS: &str = "http://www.w3.org/ns/r2rml#ObjectMap";

    /// rr:PredicateObjectMap
    pub const PREDICATE_OBJECT_MAP_CLASS: &str = "http://www.w3.org/ns/r2rml#PredicateObjectMap";

    /// rr:RefObjectMap
    pub const REF_OBJECT_MAP_CLASS: &str = "http://www.w3.org/ns/r2rml#RefObjectMap";

    /// rr:GraphMap
    pub const GRAPH_MAP_CLASS: &str = "http://www.w3.org/ns/r2rml#GraphMap";

    /// rr:Join
    pub const JOIN_CLASS: &str = "http://www.w3.org/ns/r2rml#Join";

    // Properties

    /// rr:subjectMap
    pub const SUBJECT_MAP: &str = "http://www.w3.org/ns/r2rml#subjectMap";

    /// rr:subject - shortcut for a constant-valued subject map
    pub const SUBJECT: &str = "http://www.w3.org/ns/r2rml#subject";

    /// rr:predicateObjectMap
    pub const PREDICATE_OBJECT_MAP: &str = "http://www.w3.org/ns/r2rml#predicateObjectMap";

    /// rr:predicateMap
    pub const PREDICATE_MAP: &str = "http://www.w3.org/ns/r2rml#predicateMap";

    /// rr:predicate - shortcut for a constant-valued predicate map
    pub const PREDICATE: &str = "http://www.w3.org/ns/r2rml#predicate";

    /// rr:objectMap
    pub const OBJECT_MAP: &str = "http://www.w3.org/ns/r2rml#objectMap";

    /// rr:object - shortcut for a constant-valued object map
    pub const OBJECT: &str = "http://www.w3.org/ns/r2rml#object";

    /// rr:graphMap
    pub const GRAPH_MAP: &str = "http://www.w3.org/ns/r2rml#graphMap";

    /// rr:graph - shortcut for a constant-valued graph map
    pub const GRAPH: &str = "http://www.w3.org/ns/r2rml#graph";

    /// rr:class
    pub const CLASS: &str = "http://www.w3.org/ns/r2rml#class";

    /// rr:template
    pub const TEMPLATE: &str = "http://www.w3.org/ns/r2rml#template";

    /// rr:constant
    pub const CONSTANT: &str = "http://www.w3.org/ns/r2rml#constant";

    /// rr:termType
    pub const TERM_TYPE: &str = "http://www.w3.org/ns/r2rml#termType";

    /// rr:datatype
    pub const DATATYPE: &str = "http://www.w3.org/ns/r2rml#datatype";

    /// rr:language
    pub const LANGUAGE: &str = "http://www.w3.org/ns/r2rml#language";

    /// rr:parentTriplesMap
    pub const PARENT_TRIPLES_MAP: &str = "http://www.w3.org/ns/r2rml#parentTriplesMap";

    /// rr:joinCondition
    pub const JOIN_CONDITION: &str = "http://www.w3.org/ns/r2rml#joinCondition";

    /// rr:child
    pub const CHILD: &str = "http://www.w3.org/ns/r2rml#child";

    /// rr:parent
    pub const PARENT: &str = "http://www.w3.org/ns/r2rml#parent";

    // Term type values

    /// rr:IRI term type
    pub const IRI: &str = "http://www.w3.org/ns/r2rml#IRI";

    /// rr:BlankNode term type
    pub const BLANK_NODE: &str = "http://www.w3.org/ns/r2rml#BlankNode";

    /// rr:Literal term type
    pub const LITERAL: &str = "http://www.w3.org/ns/r2rml#Literal";

    /// rr:defaultGraph - sentinel graph IRI for the unnamed graph
    pub const DEFAULT_GRAPH: &str = "http://www.w3.org/ns/r2rml#defaultGraph";
}

/// RML vocabulary constants
///
/// Defined by the RML specification: <https://rml.io/specs/rml/>
pub mod rml {
    /// RML namespace IRI
    pub const NS: &str = "http://semweb.mmlab.be/ns/rml#";

    /// rml:LogicalSource class
    pub const LOGICAL_SOURCE_CLASS: &str = "http://semweb.mmlab.be/ns/rml#LogicalSource";

    /// rml:logicalSource
    pub const LOGICAL_SOURCE: &str = "http://semweb.mmlab.be/ns/rml#logicalSource";

    /// rml:source
    pub const SOURCE: &str = "http://semweb.mmlab.be/ns/rml#source";

    /// rml:referenceFormulation
    pub const REFERENCE_FORMULATION: &str = "http://semweb.mmlab.be/ns/rml#referenceFormulation";

    /// rml:iterator
    pub const ITERATOR: &str = "http://semweb.mmlab.be/ns/rml#iterator";

    /// rml:reference
    pub const REFERENCE: &str = "http://semweb.mmlab.be/ns/rml#reference";
}

/// Reference formulation IRIs
pub mod ql {
    /// ql namespace IRI
    pub const NS: &str = "http://semweb.mmlab.be/ns/ql#";

    /// ql:CSV - comma-separated tabular sources
    pub const CSV: &str = "http://semweb.mmlab.be/ns/ql#CSV";

    /// ql:JSONPath - JSON documents iterated by JSONPath expressions
    pub const JSON_PATH: &str = "http://semweb.mmlab.be/ns/ql#JSONPath";

    /// ql:XPath - XML documents iterated by XPath expressions
    pub const XPATH: &str = "http://semweb.mmlab.be/ns/ql#XPath";
}

/// carml extension vocabulary
pub mod carml {
    /// carml namespace IRI
    pub const NS: &str = "http://carml.taxonic.com/carml/";

    /// carml:Stream class - a named input stream source
    pub const STREAM: &str = "http://carml.taxonic.com/carml/Stream";

    /// carml:streamName
    pub const STREAM_NAME: &str = "http://carml.taxonic.com/carml/streamName";
}

/// Function mapping vocabulary (FnO / FNML)
pub mod fnml {
    /// fnml namespace IRI
    pub const NS: &str = "http://semweb.mmlab.be/ns/fnml#";

    /// fnml:functionValue - links a term map to its function description
    pub const FUNCTION_VALUE: &str = "http://semweb.mmlab.be/ns/fnml#functionValue";
}

/// Function ontology vocabulary
pub mod fno {
    /// fno namespace IRI
    pub const NS: &str = "https://w3id.org/function/ontology#";

    /// fno:executes - names the function an execution invokes
    pub const EXECUTES: &str = "https://w3id.org/function/ontology#executes";

    /// Legacy fno:executes form used by older mapping documents
    pub const EXECUTES_LEGACY: &str = "http://semweb.datasciencelab.be/ns/function#executes";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rr_namespace() {
        assert!(rr::TRIPLES_MAP.starts_with(rr::NS));
        assert!(rr::SUBJECT_MAP.starts_with(rr::NS));
        assert!(rr::PARENT_TRIPLES_MAP.starts_with(rr::NS));
        assert!(rr::DEFAULT_GRAPH.starts_with(rr::NS));
    }

    #[test]
    fn test_rml_namespace() {
        assert!(rml::LOGICAL_SOURCE.starts_with(rml::NS));
        assert!(rml::REFERENCE.starts_with(rml::NS));
    }

    #[test]
    fn test_term_types() {
        assert_eq!(rr::IRI, "http://www.w3.org/ns/r2rml#IRI");
        assert_eq!(rr::BLANK_NODE, "http://www.w3.org/ns/r2rml#BlankNode");
        assert_eq!(rr::LITERAL, "http://www.w3.org/ns/r2rml#Literal");
    }

    #[test]
    fn test_formulations_distinct() {
        assert_ne!(ql::CSV, ql::JSON_PATH);
        assert_ne!(ql::JSON_PATH, ql::XPATH);
    }
}
