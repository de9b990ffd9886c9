use thiserror::Error;

use crate::pipeline::state::{StageKind, StageMarker};

/// Failure modes of the retrieval capability.
/// Permanent per call site; stages that can tolerate a missing evidence set
/// substitute an empty one instead of propagating (see gap analysis).
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("corpus not found: {0}")]
    CorpusNotFound(String),

    #[error("retrieval backend unavailable: {0}")]
    Backend(String),
}

/// Failure modes of the generation capability.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// Call timed out or the backend was transiently unavailable. Retried.
    #[error("generation timed out: {0}")]
    Timeout(String),

    /// Backend refused the request (e.g. content policy). Never retried.
    #[error("generation refused: {0}")]
    Refused(String),

    /// Output failed schema validation. Retried with a corrective reprompt.
    #[error("schema validation failed: {0}")]
    Schema(String),
}

impl GenerateError {
    /// Transient errors are eligible for retry; `Refused` is permanent.
    pub fn is_transient(&self) -> bool {
        matches!(self, GenerateError::Timeout(_) | GenerateError::Schema(_))
    }
}

/// Cause carried by a `StageError` once a stage gives up.
#[derive(Debug, Error)]
pub enum StageCause {
    #[error(transparent)]
    Generate(#[from] GenerateError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    /// A stage-level precondition failed; downstream stages have nothing
    /// valid to consume (e.g. no requirements could be extracted at all).
    #[error("stage produced nothing usable: {0}")]
    Empty(String),
}

/// Top-level pipeline error taxonomy.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Bad input. Fatal, raised before any stage runs.
    #[error("validation error: {0}")]
    Validation(String),

    /// A stage exhausted its retry budget or hit a permanent failure.
    #[error("stage {stage:?} failed: {cause}")]
    Stage {
        stage: StageKind,
        #[source]
        cause: StageCause,
    },

    /// Cooperative cancellation between stage transitions. Not a failure:
    /// the partial state up to the last committed stage is preserved.
    #[error("run cancelled at {marker:?}")]
    Cancelled { marker: StageMarker },
}

impl PipelineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled { .. })
    }
}
