//! Term factory plug-point
//!
//! The engine mints every generated term through a [`TermFactory`] so that
//! embedders can substitute their own value construction (interning,
//! validation, alternative blank node schemes).

use crate::Term;

/// Constructs RDF terms for the mapping engine
///
/// Implementations must be cheap to call; term generation sits on the
/// per-record hot path.
pub trait TermFactory: Send + Sync {
    /// Mint an IRI term
    fn iri(&self, iri: &str) -> Term;

    /// Mint a blank node term from a scoped label
    fn blank_node(&self, label: &str) -> Term;

    /// Mint a literal term
    ///
    /// `language` implies `rdf:langString`; otherwise `datatype` applies,
    /// defaulting to `xsd:string`.
    fn literal(&self, lexical: &str, datatype: Option<&str>, language: Option<&str>) -> Term;
}

/// The default term factory
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTermFactory;

impl TermFactory for DefaultTermFactory {
    fn iri(&self, iri: &str) -> Term {
        Term::iri(iri)
    }

    fn blank_node(&self, label: &str) -> Term {
        Term::blank(label)
    }

    fn literal(&self, lexical: &str, datatype: Option<&str>, language: Option<&str>) -> Term {
        match (language, datatype) {
            (Some(lang), _) => Term::lang_string(lexical, lang),
            (None, Some(dt)) => Term::typed(lexical, dt),
            (None, None) => Term::string(lexical),
        }
    }
}
