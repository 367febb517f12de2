//! RDF statements: a triple plus an optional named graph

use serde::{Deserialize, Serialize};

use crate::Term;

/// An RDF statement
///
/// A statement is a triple with an optional named-graph component. Mapping
/// execution emits statements; mapping documents are plain triples
/// (`graph == None`).
///
/// # Invariants
///
/// - `subject` is an IRI or blank node
/// - `predicate` is an IRI
/// - `graph`, when set, is an IRI or blank node
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Statement {
    /// Subject term (IRI or blank node)
    pub subject: Term,
    /// Predicate term (IRI)
    pub predicate: Term,
    /// Object term (IRI, blank node, or literal)
    pub object: Term,
    /// Named graph, absent for the default graph
    pub graph: Option<Term>,
}

impl Statement {
    /// Create a statement in the default graph
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
            graph: None,
        }
    }

    /// Create a statement in a named graph
    pub fn in_graph(subject: Term, predicate: Term, object: Term, graph: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
            graph: Some(graph),
        }
    }

    /// The (subject, predicate, object) triple without the graph component
    pub fn triple(&self) -> (&Term, &Term, &Term) {
        (&self.subject, &self.predicate, &self.object)
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)?;
        if let Some(graph) = &self.graph {
            write!(f, " {}", graph)?;
        }
        write!(f, " .")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_new() {
        let st = Statement::new(
            Term::iri("http://ex/s"),
            Term::iri("http://ex/p"),
            Term::string("o"),
        );
        assert!(st.graph.is_none());
        assert_eq!(format!("{}", st), "<http://ex/s> <http://ex/p> \"o\" .");
    }

    #[test]
    fn test_statement_in_graph() {
        let st = Statement::in_graph(
            Term::iri("http://ex/s"),
            Term::iri("http://ex/p"),
            Term::iri("http://ex/o"),
            Term::iri("http://ex/g"),
        );
        assert_eq!(st.graph.as_ref().and_then(|g| g.as_iri()), Some("http://ex/g"));
        assert_eq!(
            format!("{}", st),
            "<http://ex/s> <http://ex/p> <http://ex/o> <http://ex/g> ."
        );
    }

    #[test]
    fn test_statement_ordering_groups_subjects() {
        let a = Statement::new(
            Term::iri("http://ex/a"),
            Term::iri("http://ex/p"),
            Term::string("1"),
        );
        let b = Statement::new(
            Term::iri("http://ex/b"),
            Term::iri("http://ex/p"),
            Term::string("0"),
        );
        assert!(a < b);
    }
}
