//! RDF value model and in-memory graph for the rmlx mapping engine
//!
//! This crate provides the value types shared by the mapping model and the
//! execution engine:
//!
//! - [`Term`]: IRI, blank node, or literal (lexical form + datatype IRI +
//!   optional language tag)
//! - [`Statement`]: subject, predicate, object, and an optional named graph
//! - [`Graph`]: a bag-semantics collection of statements with explicit
//!   `sort()` / `dedupe()` / `canonicalize()`
//! - [`TermFactory`]: the plug-point used by the engine to mint terms
//!
//! Duplicates are preserved on purpose: mapping execution emits a statement
//! per generated combination and deduplication is the caller's concern.

mod factory;
mod graph;
mod statement;
mod term;

pub use factory::{DefaultTermFactory, TermFactory};
pub use graph::Graph;
pub use statement::Statement;
pub use term::{BlankId, Term};
