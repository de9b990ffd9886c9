//! The per-candidate state machine.
//!
//! `Init → GapAnalysis → QuestionGen → AnswerEval → PlanGen → Done`, with
//! `Failed` reachable from any non-terminal state and `AnswerEval` skipped
//! when no answers were supplied. Every transition runs exactly one stage;
//! the stage's output is committed to state before the marker advances, so
//! a failed or cancelled run always carries a consistent partial state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::errors::{PipelineError, StageCause};
use crate::llm::Generator;
use crate::models::document::{JobDescription, Resume};
use crate::pipeline::answer_eval::AnswerEvaluationStage;
use crate::pipeline::gap_analysis::GapAnalysisStage;
use crate::pipeline::learning_plan::LearningPlanStage;
use crate::pipeline::question_gen::QuestionGenerationStage;
use crate::pipeline::{
    AnswerSheet, PipelineState, Stage, StageContext, StageKind, StageMarker,
};
use crate::retrieval::Retriever;

/// Cooperative cancellation flag, checked between stage transitions (never
/// mid-stage). Cheap to clone and share across tasks.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A failed or cancelled run: the error plus everything committed before it.
#[derive(Debug)]
pub struct PipelineFailure {
    pub partial: PipelineState,
    pub error: PipelineError,
}

pub struct Orchestrator {
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn Generator>,
    config: PipelineConfig,
    cancel: CancelHandle,
}

impl Orchestrator {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Generator>,
        config: PipelineConfig,
    ) -> Self {
        Self::with_cancel(retriever, generator, config, CancelHandle::new())
    }

    /// Orchestrator sharing an externally owned cancel flag; the batch
    /// runner gives all its workers the same one.
    pub fn with_cancel(
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Generator>,
        config: PipelineConfig,
        cancel: CancelHandle,
    ) -> Self {
        Self {
            retriever,
            generator,
            config,
            cancel,
        }
    }

    /// Handle for cancelling this orchestrator's runs from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Drives one candidate through the full stage sequence.
    ///
    /// `answers` maps question index → raw answer text; `None` skips the
    /// evaluation stage entirely (every gap is then open for the plan).
    pub async fn run(
        &self,
        jd: Arc<JobDescription>,
        resume: Arc<Resume>,
        answers: Option<&AnswerSheet>,
    ) -> Result<PipelineState, PipelineFailure> {
        let mut state = PipelineState::new(jd, resume);

        if state.jd.text.trim().is_empty() {
            let error = PipelineError::Validation("job description text is empty".to_string());
            return Err(fail(state, error));
        }
        if state.resume.text.trim().is_empty() {
            let error = PipelineError::Validation(format!(
                "resume text for candidate '{}' is empty",
                state.resume.candidate_id
            ));
            return Err(fail(state, error));
        }

        let ctx = StageContext::new(
            self.retriever.as_ref(),
            self.generator.as_ref(),
            &self.config,
            answers,
        );

        while let Some(kind) = next_stage(state.marker, answers.is_some()) {
            if self.cancel.is_cancelled() {
                info!(
                    candidate = %state.resume.candidate_id,
                    marker = ?state.marker,
                    "run cancelled between stages"
                );
                let marker = state.marker;
                return Err(fail(state, PipelineError::Cancelled { marker }));
            }

            let stage = stage_for(kind);
            match stage.run(&mut state, &ctx).await {
                Ok(()) => {
                    state.marker = marker_for(kind);
                }
                Err(cause) => {
                    error!(
                        candidate = %state.resume.candidate_id,
                        stage = ?stage.kind(),
                        error = %cause,
                        "stage failed, run aborted"
                    );
                    state.marker = StageMarker::Failed;
                    return Err(PipelineFailure {
                        partial: state,
                        error: PipelineError::Stage {
                            stage: stage.kind(),
                            cause,
                        },
                    });
                }
            }
        }

        state.marker = StageMarker::Done;
        info!(
            candidate = %state.resume.candidate_id,
            gaps = state.gaps.len(),
            questions = state.questions.len(),
            evaluations = state.evaluations.len(),
            plan_items = state.plan.len(),
            "candidate run complete"
        );
        Ok(state)
    }
}

fn fail(mut partial: PipelineState, error: PipelineError) -> PipelineFailure {
    if !error.is_cancelled() {
        partial.marker = StageMarker::Failed;
    }
    PipelineFailure { partial, error }
}

/// Exhaustive successor map of the state machine. `None` means terminal.
fn next_stage(marker: StageMarker, has_answers: bool) -> Option<StageKind> {
    match marker {
        StageMarker::Init => Some(StageKind::GapAnalysis),
        StageMarker::GapAnalysis => Some(StageKind::QuestionGen),
        StageMarker::QuestionGen if has_answers => Some(StageKind::AnswerEval),
        StageMarker::QuestionGen => Some(StageKind::PlanGen),
        StageMarker::AnswerEval => Some(StageKind::PlanGen),
        StageMarker::PlanGen | StageMarker::Done | StageMarker::Failed => None,
    }
}

fn marker_for(kind: StageKind) -> StageMarker {
    match kind {
        StageKind::GapAnalysis => StageMarker::GapAnalysis,
        StageKind::QuestionGen => StageMarker::QuestionGen,
        StageKind::AnswerEval => StageMarker::AnswerEval,
        StageKind::PlanGen => StageMarker::PlanGen,
    }
}

fn stage_for(kind: StageKind) -> &'static dyn Stage {
    match kind {
        StageKind::GapAnalysis => &GapAnalysisStage,
        StageKind::QuestionGen => &QuestionGenerationStage,
        StageKind::AnswerEval => &AnswerEvaluationStage,
        StageKind::PlanGen => &LearningPlanStage,
    }
}
