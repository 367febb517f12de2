//! Asynchronous RML mapping execution engine
//!
//! This crate executes RML mappings: given a set of
//! [`TriplesMap`](rmlx_model::TriplesMap)s and byte sources, it produces a
//! stream of RDF statements.
//!
//! # Architecture
//!
//! - **Term generators** ([`terms`]): term maps compile into functions
//!   from a record to zero or more terms, with template expansion,
//!   IRI-safe encoding, record-scoped blank nodes, and user-defined
//!   functions.
//! - **Pipelines** ([`pipeline`]): one per distinct logical source; the
//!   source is decoded once and records fan out over bounded channels to
//!   every triples mapper sharing it.
//! - **Join engine** ([`join`]): RefObjectMaps with join conditions buffer
//!   child rows and index parent subjects, then hash-join when both
//!   pipelines complete.
//! - **Orchestrator** ([`mapper`]): validates configuration, compiles
//!   pipelines, binds sources, and exposes the `map*` surfaces.
//!
//! # Example
//!
//! ```no_run
//! use rmlx_engine::RmlMapper;
//! use rmlx_model::load_mapping;
//!
//! # async fn run(mapping_graph: rmlx_graph::Graph) -> rmlx_engine::EngineResult<()> {
//! let triples_maps = load_mapping(&mapping_graph)?;
//! let mapper = RmlMapper::builder()
//!     .triples_maps(triples_maps)
//!     .default_logical_source_resolvers()
//!     .file_resolver("./data")
//!     .build()?;
//! let graph = mapper.map_to_graph().await?;
//! # Ok(())
//! # }
//! ```

pub mod decoders;
pub mod encode;
mod error;
pub mod functions;
pub mod join;
pub mod mapper;
pub mod pipeline;
pub mod records;
pub mod resolvers;
mod template;
pub mod terms;

pub use encode::NormalizationForm;
pub use error::{EngineError, EngineResult};
pub use functions::{FunctionArgs, FunctionError, Functions, RmlFunction};
pub use join::StatementResult;
pub use mapper::{RmlMapper, RmlMapperBuilder, TriplesMapFilter};
pub use records::{CsvRecord, EvaluateExpression, ItemRecord, JsonRecord, Record};
pub use resolvers::{
    ByteStream, CompositeResolver, EmbeddedResolver, FileResolver, NamedInputResolver,
    SourceResolver,
};
pub use template::{Segment, Template};
pub use terms::{GeneratorOptions, RecordContext, TermGenerator, TermGeneratorFactory};
