//! Template parsing
//!
//! A template is a sequence of literal text and `{reference}` holes.
//! `\{`, `\}`, and `\\` escape the delimiters and the backslash itself,
//! inside and outside holes.

use crate::error::{EngineError, EngineResult};

/// One parsed piece of a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text emitted verbatim
    Text(String),
    /// A reference hole looked up against the record
    Reference(String),
}

/// A parsed template
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a template string
    ///
    /// Fails on unbalanced braces and on empty `{}` holes.
    pub fn parse(input: &str) -> EngineResult<Self> {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut reference: Option<String> = None;
        let mut chars = input.chars();

        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    let escaped = chars.next().ok_or_else(|| {
                        EngineError::Configuration(format!(
                            "invalid template {input:?}: dangling escape"
                        ))
                    })?;
                    match escaped {
                        '{' | '}' | '\\' => match reference.as_mut() {
                            Some(r) => r.push(escaped),
                            None => text.push(escaped),
                        },
                        other => {
                            return Err(EngineError::Configuration(format!(
                                "invalid template {input:?}: unknown escape \\{other}"
                            )));
                        }
                    }
                }
                '{' => {
                    if reference.is_some() {
                        return Err(EngineError::Configuration(format!(
                            "invalid template {input:?}: nested '{{'"
                        )));
                    }
                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    reference = Some(String::new());
                }
                '}' => match reference.take() {
                    Some(r) if r.is_empty() => {
                        return Err(EngineError::Configuration(format!(
                            "invalid template {input:?}: empty reference"
                        )));
                    }
                    Some(r) => segments.push(Segment::Reference(r)),
                    None => {
                        return Err(EngineError::Configuration(format!(
                            "invalid template {input:?}: unmatched '}}'"
                        )));
                    }
                },
                c => match reference.as_mut() {
                    Some(r) => r.push(c),
                    None => text.push(c),
                },
            }
        }

        if reference.is_some() {
            return Err(EngineError::Configuration(format!(
                "invalid template {input:?}: unclosed '{{'"
            )));
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }

        Ok(Self { segments })
    }

    /// The parsed segments in order
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The references of all holes, in order of appearance
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Reference(r) => Some(r.as_str()),
            Segment::Text(_) => None,
        })
    }

    /// Whether the template contains any holes
    pub fn has_references(&self) -> bool {
        self.references().next().is_some()
    }
}
