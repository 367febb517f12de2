//! Typed RML mapping model with RDF (de)serialization
//!
//! This crate provides the in-memory representation of an RML mapping
//! document and its bidirectional bridge to an RDF graph:
//!
//! - **Model types**: [`TriplesMap`], [`LogicalSource`], [`SubjectMap`],
//!   [`PredicateObjectMap`], [`PredicateMap`], [`ObjectMap`],
//!   [`RefObjectMap`], [`JoinCondition`], [`GraphMap`], [`FunctionMap`]
//! - **Loading**: [`load_mapping`] walks a graph with an explicit schema
//!   (no reflection) and produces the typed model. An object map is
//!   classified as a [`RefObjectMap`] exactly when its resource carries
//!   `rr:parentTriplesMap`. Unknown predicates are ignored.
//! - **Serialization**: [`serialize_mapping`] emits the model back as RDF
//!   with deterministically regenerated blank nodes, so that
//!   load-serialize round-trips are stable up to graph isomorphism.

mod error;
mod function_map;
mod loader;
mod ref_object_map;
mod serializer;
mod term_map;
mod triples_map;

pub use error::{ModelError, ModelResult};
pub use function_map::FunctionMap;
pub use loader::load_mapping;
pub use ref_object_map::{JoinCondition, RefObjectMap};
pub use serializer::serialize_mapping;
pub use term_map::{
    GraphMap, ObjectMap, ObjectMapKind, PredicateMap, PredicateObjectMap, SubjectMap, TermMap,
    TermType,
};
pub use triples_map::{filter_mappable, LogicalSource, SourceSpec, TriplesMap};
