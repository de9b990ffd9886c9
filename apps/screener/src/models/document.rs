//! Source documents: the job description and candidate resumes.
//!
//! Both are immutable once loaded and shared read-only across the pipeline
//! via `Arc`. The `corpus_id` ties a document to its searchable passage
//! collection in the retriever.

use serde::{Deserialize, Serialize};

/// Stable identifier for one candidate (by convention the resume file stem).
pub type CandidateId = String;

/// The target role's requirement document. One per batch run; the source of
/// truth for required skills and competencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescription {
    pub corpus_id: String,
    pub text: String,
}

impl JobDescription {
    pub fn new(corpus_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            corpus_id: corpus_id.into(),
            text: text.into(),
        }
    }
}

/// One candidate's resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resume {
    pub candidate_id: CandidateId,
    pub corpus_id: String,
    pub text: String,
}

impl Resume {
    /// Resume corpora are namespaced per candidate so retrieval never mixes
    /// two candidates' passages.
    pub fn new(candidate_id: impl Into<CandidateId>, text: impl Into<String>) -> Self {
        let candidate_id = candidate_id.into();
        Self {
            corpus_id: format!("resume:{candidate_id}"),
            candidate_id,
            text: text.into(),
        }
    }
}
