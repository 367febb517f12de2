//! RDF graph - a collection of statements
//!
//! The `Graph` type uses `Vec<Statement>` to preserve duplicates (bag
//! semantics). Call `dedupe()` explicitly if you want set semantics.

use crate::{Statement, Term};

/// A collection of RDF statements
///
/// # Design Decisions
///
/// - **Vec storage**: preserves duplicates from mapping execution.
/// - **Explicit deduplication**: call `dedupe()` for set semantics.
/// - **Deterministic output**: call `sort()` before comparison or
///   formatting for stable ordering.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    statements: Vec<Statement>,
}

impl Graph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a statement to the graph
    pub fn add(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    /// Add a default-graph statement by components
    pub fn add_triple(&mut self, s: Term, p: Term, o: Term) {
        self.add(Statement::new(s, p, o));
    }

    /// Get the number of statements
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Check if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Iterate over statements
    pub fn iter(&self) -> impl Iterator<Item = &Statement> {
        self.statements.iter()
    }

    /// Sort statements for deterministic output
    pub fn sort(&mut self) {
        self.statements.sort();
    }

    /// Remove duplicate statements (apply set semantics)
    ///
    /// Sorts first to group duplicates.
    pub fn dedupe(&mut self) {
        self.statements.sort();
        self.statements.dedup();
    }

    /// Sort and dedupe in one pass
    pub fn canonicalize(&mut self) {
        self.dedupe();
    }

    /// Get all statements (consuming the graph)
    pub fn into_statements(self) -> Vec<Statement> {
        self.statements
    }

    /// Get a reference to the statements
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }
}

impl IntoIterator for Graph {
    type Item = Statement;
    type IntoIter = std::vec::IntoIter<Statement>;

    fn into_iter(self) -> Self::IntoIter {
        self.statements.into_iter()
    }
}

impl<'a> IntoIterator for &'a Graph {
    type Item = &'a Statement;
    type IntoIter = std::slice::Iter<'a, Statement>;

    fn into_iter(self) -> Self::IntoIter {
        self.statements.iter()
    }
}

impl FromIterator<Statement> for Graph {
    fn from_iter<T: IntoIterator<Item = Statement>>(iter: T) -> Self {
        Graph {
            statements: iter.into_iter().collect(),
        }
    }
}

impl Extend<Statement> for Graph {
    fn extend<T: IntoIterator<Item = Statement>>(&mut self, iter: T) {
        self.statements.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_graph() -> Graph {
        let mut graph = Graph::new();

        graph.add_triple(
            Term::iri("http://example.org/bob"),
            Term::iri("http://xmlns.com/foaf/0.1/name"),
            Term::string("Bob"),
        );
        graph.add_triple(
            Term::iri("http://example.org/alice"),
            Term::iri("http://xmlns.com/foaf/0.1/name"),
            Term::string("Alice"),
        );
        graph.add_triple(
            Term::iri("http://example.org/alice"),
            Term::iri("http://xmlns.com/foaf/0.1/age"),
            Term::typed("30", rmlx_vocab::xsd::INTEGER),
        );

        graph
    }

    #[test]
    fn test_graph_creation() {
        let graph = Graph::new();
        assert!(graph.is_empty());
        assert_eq!(graph.len(), 0);
    }

    #[test]
    fn test_graph_sort() {
        let mut graph = make_test_graph();
        graph.sort();

        let first = graph.iter().next().unwrap();
        assert_eq!(first.subject.as_iri(), Some("http://example.org/alice"));
    }

    #[test]
    fn test_graph_dedupe() {
        let mut graph = Graph::new();
        let st = Statement::new(
            Term::iri("http://example.org/s"),
            Term::iri("http://example.org/p"),
            Term::string("o"),
        );

        graph.add(st.clone());
        graph.add(st.clone());
        graph.add(st);
        assert_eq!(graph.len(), 3);

        graph.dedupe();
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_from_iterator() {
        let statements = vec![Statement::new(
            Term::iri("http://example.org/s"),
            Term::iri("http://example.org/p"),
            Term::string("o"),
        )];

        let graph: Graph = statements.into_iter().collect();
        assert_eq!(graph.len(), 1);
    }
}
