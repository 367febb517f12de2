//! Engine error types
//!
//! One variant per error kind in the engine's taxonomy. Per-record term
//! generation failures are non-fatal by default (the offending term is
//! treated as absent and a warning recorded); everything else is fatal to
//! its pipeline or to the whole run.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while building or running a mapper
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid configuration: missing resolver binding, no mappable
    /// TriplesMaps, malformed mapping entity
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No source resolver matched a logical source reference
    #[error("No source resolver matched reference: {0}")]
    SourceResolution(String),

    /// Source bytes invalid for the declared reference formulation.
    /// Fatal to its pipeline; sibling pipelines continue.
    #[error("Decoder error in pipeline {pipeline}: {message}")]
    Decoder {
        /// The failed pipeline, named by its source
        pipeline: String,
        message: String,
    },

    /// Template referenced a non-existent field, or a function call failed
    #[error("Term generation error: {0}")]
    TermGeneration(String),

    /// I/O failure from a spillable join store
    #[error("Join store error: {0}")]
    JoinStore(String),

    /// Orchestrator-level duration exceeded
    #[error("Mapping timed out after {0:?}")]
    MappingTimeout(Duration),

    /// Malformed mapping model
    #[error(transparent)]
    Model(#[from] rmlx_model::ModelError),
}

impl EngineError {
    /// Attach a pipeline name to a decoder error
    pub(crate) fn in_pipeline(self, pipeline: &str) -> Self {
        match self {
            EngineError::Decoder { message, .. } => EngineError::Decoder {
                pipeline: pipeline.to_string(),
                message,
            },
            other => other,
        }
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
