//! User-defined function registry
//!
//! Function term maps resolve their function IRI through a [`Functions`]
//! registry. Arguments arrive as a parameter-IRI to values map, evaluated
//! from the nested function mapping against the current record; the
//! function returns zero or more RDF terms.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use rmlx_graph::Term;

/// Function evaluation failures
#[derive(Debug, Error)]
pub enum FunctionError {
    /// The function IRI is not registered
    #[error("no function registered for {0}")]
    Unregistered(String),

    /// Arity or type mismatch on the arguments
    #[error("invalid arguments for {function}: {message}")]
    Arguments {
        function: String,
        message: String,
    },

    /// The function itself failed
    #[error("function {function} failed: {message}")]
    Failed {
        function: String,
        message: String,
    },
}

/// Evaluated arguments of one function call, keyed by parameter IRI
#[derive(Debug, Clone, Default)]
pub struct FunctionArgs {
    values: HashMap<String, Vec<Term>>,
}

impl FunctionArgs {
    /// Create an empty argument set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add values for a parameter
    pub fn add(&mut self, parameter: impl Into<String>, mut values: Vec<Term>) {
        self.values
            .entry(parameter.into())
            .or_default()
            .append(&mut values);
    }

    /// All values of a parameter
    pub fn get(&self, parameter: &str) -> &[Term] {
        self.values
            .get(parameter)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Lexical forms of a parameter's values
    pub fn strings(&self, parameter: &str) -> Vec<String> {
        self.get(parameter)
            .iter()
            .map(|t| t.lexical().to_string())
            .collect()
    }

    /// The single string value of a parameter
    pub fn single_string(&self, function: &str, parameter: &str) -> Result<String, FunctionError> {
        let values = self.get(parameter);
        match values {
            [one] => Ok(one.lexical().to_string()),
            [] => Err(FunctionError::Arguments {
                function: function.to_string(),
                message: format!("missing parameter {parameter}"),
            }),
            _ => Err(FunctionError::Arguments {
                function: function.to_string(),
                message: format!("parameter {parameter} has {} values, expected 1", values.len()),
            }),
        }
    }

    /// Number of distinct parameters
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no parameters are bound
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A registered function
pub type RmlFunction =
    Arc<dyn Fn(&FunctionArgs) -> Result<Vec<Term>, FunctionError> + Send + Sync>;

/// Registry of user-defined functions, keyed by function IRI
#[derive(Clone, Default)]
pub struct Functions {
    functions: HashMap<String, RmlFunction>,
}

impl Functions {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function under its IRI
    pub fn register<F>(&mut self, iri: impl Into<String>, function: F)
    where
        F: Fn(&FunctionArgs) -> Result<Vec<Term>, FunctionError> + Send + Sync + 'static,
    {
        self.functions.insert(iri.into(), Arc::new(function));
    }

    /// Look up a function, failing with `Unregistered` when absent
    pub fn get(&self, iri: &str) -> Result<RmlFunction, FunctionError> {
        self.functions
            .get(iri)
            .cloned()
            .ok_or_else(|| FunctionError::Unregistered(iri.to_string()))
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl std::fmt::Debug for Functions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Functions")
            .field("registered", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}
