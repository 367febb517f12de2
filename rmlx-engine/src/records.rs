//! Source records and expression evaluation
//!
//! A record is whatever one iteration of a logical source produced: a CSV
//! row, one JSON node, or a caller-provided item. Term generators see
//! records only through [`EvaluateExpression`]: a reference expression
//! evaluates to zero or more string values. Absent and null both evaluate
//! to no values.

use std::sync::Arc;

use serde_json::Value;

/// Evaluate reference expressions against a record
pub trait EvaluateExpression: Send + Sync {
    /// Evaluate an expression to its values
    ///
    /// Returns an empty vector when the expression names no value in this
    /// record; multi-valued references return every value.
    fn eval(&self, expression: &str) -> Vec<String>;
}

/// A shared record handle
pub type Record = Arc<dyn EvaluateExpression>;

/// A CSV row with its header
#[derive(Debug, Clone)]
pub struct CsvRecord {
    headers: Arc<Vec<String>>,
    fields: Vec<String>,
}

impl CsvRecord {
    /// Create a record from a shared header and its field values
    pub fn new(headers: Arc<Vec<String>>, fields: Vec<String>) -> Self {
        Self { headers, fields }
    }
}

impl EvaluateExpression for CsvRecord {
    fn eval(&self, expression: &str) -> Vec<String> {
        // Empty cells count as absent, matching the common CSVW null
        // convention.
        self.headers
            .iter()
            .position(|h| h == expression)
            .and_then(|i| self.fields.get(i))
            .filter(|v| !v.is_empty())
            .map(|v| vec![v.clone()])
            .unwrap_or_default()
    }
}

/// One JSON node selected by the logical source iterator
#[derive(Debug, Clone)]
pub struct JsonRecord {
    value: Value,
}

impl JsonRecord {
    /// Wrap a JSON node
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    /// The wrapped node
    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl EvaluateExpression for JsonRecord {
    fn eval(&self, expression: &str) -> Vec<String> {
        select(&self.value, expression)
            .into_iter()
            .flat_map(scalar_values)
            .collect()
    }
}

/// A caller-provided record backed by a flat key-multivalue map
///
/// Used by `map_item` embedders that already hold their data as key/value
/// pairs.
#[derive(Debug, Clone, Default)]
pub struct ItemRecord {
    entries: Vec<(String, Vec<String>)>,
}

impl ItemRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single-valued entry
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.push((key.into(), vec![value.into()]));
        self
    }

    /// Add a multi-valued entry
    pub fn with_values(mut self, key: impl Into<String>, values: Vec<String>) -> Self {
        self.entries.push((key.into(), values));
        self
    }
}

impl EvaluateExpression for ItemRecord {
    fn eval(&self, expression: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(k, _)| k == expression)
            .flat_map(|(_, vs)| vs.iter().cloned())
            .collect()
    }
}

// ============================================================================
// JSONPath subset
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathStep {
    /// `.key`
    Key(String),
    /// `[*]` or `.*`
    Wildcard,
    /// `[n]`
    Index(usize),
    /// `..key` - the key at any depth
    Descend(String),
}

/// Parse the supported JSONPath subset: `$`, `.key`, `[*]`, `[n]`, `..key`
fn parse_path(path: &str) -> Vec<PathStep> {
    let mut steps = Vec::new();
    let mut rest = path.trim();
    rest = rest.strip_prefix('$').unwrap_or(rest);

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("..") {
            let end = after
                .find(|c| c == '.' || c == '[')
                .unwrap_or(after.len());
            if end > 0 {
                steps.push(PathStep::Descend(after[..end].to_string()));
            }
            rest = &after[end..];
        } else if let Some(after) = rest.strip_prefix('[') {
            let Some(close) = after.find(']') else { break };
            let inner = &after[..close];
            if inner == "*" {
                steps.push(PathStep::Wildcard);
            } else if let Ok(index) = inner.parse::<usize>() {
                steps.push(PathStep::Index(index));
            } else {
                // Quoted key: ['key'] or ["key"]
                let key = inner.trim_matches(|c| c == '\'' || c == '"');
                steps.push(PathStep::Key(key.to_string()));
            }
            rest = &after[close + 1..];
        } else {
            let after = rest.strip_prefix('.').unwrap_or(rest);
            if after.starts_with('.') {
                // `..` handled at the top of the loop
                rest = after;
                continue;
            }
            let end = after
                .find(|c| c == '.' || c == '[')
                .unwrap_or(after.len());
            let key = &after[..end];
            if key == "*" {
                steps.push(PathStep::Wildcard);
            } else if !key.is_empty() {
                steps.push(PathStep::Key(key.to_string()));
            }
            rest = &after[end..];
        }
    }

    steps
}

/// Select the nodes a path names, relative to `root`
pub fn select<'a>(root: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut nodes = vec![root];
    for step in parse_path(path) {
        let mut next = Vec::new();
        for node in nodes {
            match &step {
                PathStep::Key(key) => {
                    if let Some(v) = node.get(key.as_str()) {
                        next.push(v);
                    }
                }
                PathStep::Wildcard => match node {
                    Value::Array(items) => next.extend(items.iter()),
                    Value::Object(map) => next.extend(map.values()),
                    _ => {}
                },
                PathStep::Index(i) => {
                    if let Some(v) = node.get(*i) {
                        next.push(v);
                    }
                }
                PathStep::Descend(key) => descend(node, key, &mut next),
            }
        }
        nodes = next;
    }
    nodes
}

fn descend<'a>(node: &'a Value, key: &str, out: &mut Vec<&'a Value>) {
    match node {
        Value::Object(map) => {
            for (k, v) in map {
                if k == key {
                    out.push(v);
                }
                descend(v, key, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                descend(item, key, out);
            }
        }
        _ => {}
    }
}

/// Stringify a selected node
///
/// Scalars yield their natural lexical form, arrays flatten to their
/// scalar elements, null and objects yield nothing.
fn scalar_values(node: &Value) -> Vec<String> {
    match node {
        Value::Null => vec![],
        Value::Bool(b) => vec![b.to_string()],
        Value::Number(n) => vec![n.to_string()],
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items.iter().flat_map(scalar_values).collect(),
        Value::Object(_) => vec![],
    }
}
