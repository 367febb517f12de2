//! RDF term types: IRI, blank node, and literal
//!
//! Terms are the building blocks of statements. A term can be:
//! - An IRI (always expanded, never prefixed)
//! - A blank node (with a stable identifier)
//! - A literal (lexical form + datatype IRI + optional language tag)

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Blank node identifier
///
/// Blank node IDs are stable within a graph but have no global meaning.
/// The label never includes the `_:` prefix.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlankId(Arc<str>);

impl BlankId {
    /// Create a blank node ID from a label (without the `_:` prefix)
    pub fn new(label: impl AsRef<str>) -> Self {
        Self(Arc::from(label.as_ref()))
    }

    /// Get the label (without `_:` prefix)
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BlankId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "_:{}", self.0)
    }
}

/// An RDF term (subject, predicate, object, or graph position)
///
/// # Invariants
///
/// - `Term::Iri` always contains an expanded IRI, never a prefixed form.
/// - For `Term::Literal` with a language tag, the datatype is `rdf:langString`.
/// - The predicate position of a statement can only be `Term::Iri`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Term {
    /// Full expanded IRI (e.g. "http://schema.org/Person")
    Iri(Arc<str>),

    /// Blank node with stable identifier
    BlankNode(BlankId),

    /// Literal with its lexical form kept verbatim
    Literal {
        /// The lexical form
        lexical: Arc<str>,
        /// Datatype IRI (always present; `xsd:string` when unstated)
        datatype: Arc<str>,
        /// Language tag (only set when datatype is rdf:langString)
        language: Option<Arc<str>>,
    },
}

impl Term {
    /// Create an IRI term from an expanded IRI string
    pub fn iri(iri: impl AsRef<str>) -> Self {
        Term::Iri(Arc::from(iri.as_ref()))
    }

    /// Create a blank node term
    pub fn blank(label: impl AsRef<str>) -> Self {
        Term::BlankNode(BlankId::new(label))
    }

    /// Create a plain string literal (xsd:string)
    pub fn string(value: impl AsRef<str>) -> Self {
        Term::Literal {
            lexical: Arc::from(value.as_ref()),
            datatype: Arc::from(rmlx_vocab::xsd::STRING),
            language: None,
        }
    }

    /// Create a typed literal, keeping the lexical form verbatim
    pub fn typed(value: impl AsRef<str>, datatype: impl AsRef<str>) -> Self {
        Term::Literal {
            lexical: Arc::from(value.as_ref()),
            datatype: Arc::from(datatype.as_ref()),
            language: None,
        }
    }

    /// Create a language-tagged string literal (rdf:langString)
    pub fn lang_string(value: impl AsRef<str>, lang: impl AsRef<str>) -> Self {
        Term::Literal {
            lexical: Arc::from(value.as_ref()),
            datatype: Arc::from(rmlx_vocab::rdf::LANG_STRING),
            language: Some(Arc::from(lang.as_ref())),
        }
    }

    /// Check if this is an IRI term
    pub fn is_iri(&self) -> bool {
        matches!(self, Term::Iri(_))
    }

    /// Check if this is a blank node
    pub fn is_blank(&self) -> bool {
        matches!(self, Term::BlankNode(_))
    }

    /// Check if this is a literal
    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Literal { .. })
    }

    /// Check if this term may occupy a subject position (IRI or blank node)
    pub fn is_resource(&self) -> bool {
        !self.is_literal()
    }

    /// Try to get as IRI string
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    /// Try to get literal components: (lexical, datatype, language)
    pub fn as_literal(&self) -> Option<(&str, &str, Option<&str>)> {
        match self {
            Term::Literal {
                lexical,
                datatype,
                language,
            } => Some((lexical, datatype, language.as_deref())),
            _ => None,
        }
    }

    /// The lexical form of the term, regardless of kind
    ///
    /// IRIs yield the IRI string, blank nodes their label, literals the
    /// lexical form.
    pub fn lexical(&self) -> &str {
        match self {
            Term::Iri(iri) => iri,
            Term::BlankNode(id) => id.as_str(),
            Term::Literal { lexical, .. } => lexical,
        }
    }

    /// Stable string key identifying this term as a graph node
    ///
    /// IRIs map to themselves, blank nodes to their `_:label` form.
    /// Literals have no node key.
    pub fn node_key(&self) -> Option<String> {
        match self {
            Term::Iri(iri) => Some(iri.to_string()),
            Term::BlankNode(id) => Some(id.to_string()),
            Term::Literal { .. } => None,
        }
    }
}

impl PartialOrd for Term {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Term {
    fn cmp(&self, other: &Self) -> Ordering {
        // Type ordering: BlankNode < Iri < Literal
        let type_ord = |t: &Term| -> u8 {
            match t {
                Term::BlankNode(_) => 0,
                Term::Iri(_) => 1,
                Term::Literal { .. } => 2,
            }
        };

        match type_ord(self).cmp(&type_ord(other)) {
            Ordering::Equal => {}
            ord => return ord,
        }

        match (self, other) {
            (Term::Iri(a), Term::Iri(b)) => a.cmp(b),
            (Term::BlankNode(a), Term::BlankNode(b)) => a.cmp(b),
            (
                Term::Literal {
                    lexical: v1,
                    datatype: d1,
                    language: l1,
                },
                Term::Literal {
                    lexical: v2,
                    datatype: d2,
                    language: l2,
                },
            ) => (d1, l1, v1).cmp(&(d2, l2, v2)),
            _ => Ordering::Equal,
        }
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "<{}>", iri),
            Term::BlankNode(id) => write!(f, "{}", id),
            Term::Literal {
                lexical,
                datatype,
                language,
            } => {
                write!(f, "\"{}\"", lexical)?;
                if let Some(lang) = language {
                    write!(f, "@{}", lang)
                } else if datatype.as_ref() != rmlx_vocab::xsd::STRING {
                    write!(f, "^^<{}>", datatype)
                } else {
                    Ok(())
                }
            }
        }
    }
}
