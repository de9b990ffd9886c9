//! The aggregate screening report, the one externally persisted artifact.
//!
//! Every submitted candidate appears exactly once, either with a complete
//! state or a clearly marked partial/failed state plus cause. The encoding
//! is lossless: parsing a serialized report yields field-for-field equal
//! data.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::models::document::{CandidateId, JobDescription};
use crate::pipeline::batch::CandidateOutcome;
use crate::pipeline::{PipelineState, StageKind};

/// Per-candidate entry in the aggregate report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CandidateReport {
    Complete {
        state: PipelineState,
    },
    Failed {
        partial: PipelineState,
        /// Stage the run died in, when the failure was stage-scoped.
        failed_stage: Option<StageKind>,
        error: String,
    },
    Cancelled {
        partial: PipelineState,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningReport {
    pub report_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub jd_corpus_id: String,
    pub candidates: BTreeMap<CandidateId, CandidateReport>,
}

impl ScreeningReport {
    pub fn from_outcomes(
        jd: &JobDescription,
        outcomes: BTreeMap<CandidateId, CandidateOutcome>,
    ) -> Self {
        let candidates = outcomes
            .into_iter()
            .map(|(id, outcome)| (id, CandidateReport::from(outcome)))
            .collect();
        Self {
            report_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            jd_corpus_id: jd.corpus_id.clone(),
            candidates,
        }
    }

    pub fn complete_count(&self) -> usize {
        self.candidates
            .values()
            .filter(|c| matches!(c, CandidateReport::Complete { .. }))
            .count()
    }
}

impl From<CandidateOutcome> for CandidateReport {
    fn from(outcome: CandidateOutcome) -> Self {
        match outcome {
            CandidateOutcome::Complete(state) => CandidateReport::Complete { state },
            CandidateOutcome::Failed { partial, error } => {
                let failed_stage = match &error {
                    PipelineError::Stage { stage, .. } => Some(*stage),
                    _ => None,
                };
                CandidateReport::Failed {
                    partial,
                    failed_stage,
                    error: error.to_string(),
                }
            }
            CandidateOutcome::Cancelled { partial } => CandidateReport::Cancelled { partial },
        }
    }
}

impl CandidateReport {
    /// The state snapshot, complete or partial.
    pub fn state(&self) -> &PipelineState {
        match self {
            CandidateReport::Complete { state } => state,
            CandidateReport::Failed { partial, .. } => partial,
            CandidateReport::Cancelled { partial } => partial,
        }
    }
}
