//! Per-candidate pipeline state: the record accumulated across stages.
//!
//! A `PipelineState` is exclusively owned by one orchestrator run. Mutation
//! is additive only (append to the sequences, advance the marker); nothing is
//! edited in place, so a partial state at failure time is always a faithful
//! prefix of a complete run.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::models::document::{JobDescription, Resume};
use crate::models::screening::{AnswerEvaluation, Gap, InterviewQuestion, LearningPlanItem};

/// The four units of work the orchestrator sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageKind {
    GapAnalysis,
    QuestionGen,
    AnswerEval,
    PlanGen,
}

/// Where a candidate's run currently stands. `Failed` is terminal; the
/// sequences already committed are preserved alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageMarker {
    Init,
    GapAnalysis,
    QuestionGen,
    AnswerEval,
    PlanGen,
    Done,
    Failed,
}

impl StageMarker {
    /// The last stage that committed its output, if any. Used to report where
    /// a cancelled or failed run stopped.
    pub fn last_committed(self) -> Option<StageKind> {
        match self {
            StageMarker::GapAnalysis => Some(StageKind::GapAnalysis),
            StageMarker::QuestionGen => Some(StageKind::QuestionGen),
            StageMarker::AnswerEval => Some(StageKind::AnswerEval),
            StageMarker::PlanGen | StageMarker::Done => Some(StageKind::PlanGen),
            StageMarker::Init | StageMarker::Failed => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    pub jd: Arc<JobDescription>,
    pub resume: Arc<Resume>,
    pub gaps: Vec<Gap>,
    pub questions: Vec<InterviewQuestion>,
    pub evaluations: Vec<AnswerEvaluation>,
    pub plan: Vec<LearningPlanItem>,
    /// Per-item degradations (skipped gaps, fallback evaluations). Never
    /// empty silently: anything the pipeline skipped is recorded here.
    pub warnings: Vec<String>,
    pub marker: StageMarker,
}

impl PipelineState {
    pub fn new(jd: Arc<JobDescription>, resume: Arc<Resume>) -> Self {
        Self {
            jd,
            resume,
            gaps: Vec::new(),
            questions: Vec::new(),
            evaluations: Vec::new(),
            plan: Vec::new(),
            warnings: Vec::new(),
            marker: StageMarker::Init,
        }
    }

    /// Gap indices still open after evaluation, in gap order.
    ///
    /// With evaluations present, a gap is open iff some evaluation targeting
    /// it reports a residual gap, or no evaluation ever addressed it. With no
    /// evaluations at all, every gap is open.
    pub fn open_gaps(&self) -> Vec<usize> {
        if self.evaluations.is_empty() {
            return (0..self.gaps.len()).collect();
        }

        (0..self.gaps.len())
            .filter(|&gap_idx| {
                let mut addressed = false;
                for eval in &self.evaluations {
                    let targets = &self.questions[eval.question].targets;
                    if targets.contains(&gap_idx) {
                        addressed = true;
                        if eval.residual_gap {
                            return true;
                        }
                    }
                }
                !addressed
            })
            .collect()
    }

    /// The evaluation for a question index, if one was produced.
    pub fn evaluation_for(&self, question_idx: usize) -> Option<&AnswerEvaluation> {
        self.evaluations.iter().find(|e| e.question == question_idx)
    }
}
