//! The screening pipeline: four retrieval-augmented generation stages
//! sequenced by an explicit state machine, batched over candidates.
//!
//! Flow per candidate: gap analysis → question generation →
//! (answer evaluation, skipped when no answers) → learning plan.
//! Data flows strictly forward; no stage re-reads a later stage's output.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::config::PipelineConfig;
use crate::errors::StageCause;
use crate::llm::{Generator, RetryPolicy};
use crate::retrieval::Retriever;

pub mod answer_eval;
pub mod batch;
pub mod gap_analysis;
pub mod learning_plan;
pub mod orchestrator;
pub mod prompts;
pub mod question_gen;
pub mod report;
pub mod state;

pub use batch::BatchRunner;
pub use state::{PipelineState, StageKind, StageMarker};

/// Candidate answers keyed by question index (presentation order). A missing
/// index means that question was not answered.
pub type AnswerSheet = BTreeMap<usize, String>;

/// Capabilities and knobs handed to every stage. Stages hold no state of
/// their own; everything they produce goes into the `PipelineState`.
pub struct StageContext<'a> {
    pub retriever: &'a dyn Retriever,
    pub generator: &'a dyn Generator,
    pub config: &'a PipelineConfig,
    pub retry: RetryPolicy,
    pub answers: Option<&'a AnswerSheet>,
}

impl<'a> StageContext<'a> {
    pub fn new(
        retriever: &'a dyn Retriever,
        generator: &'a dyn Generator,
        config: &'a PipelineConfig,
        answers: Option<&'a AnswerSheet>,
    ) -> Self {
        Self {
            retriever,
            generator,
            config,
            retry: RetryPolicy::from_config(config),
            answers,
        }
    }
}

/// One unit of work in the pipeline. Each implementation appends its output
/// to the state; the orchestrator owns marker advancement and failure
/// wrapping.
#[async_trait]
pub trait Stage: Send + Sync {
    fn kind(&self) -> StageKind;

    async fn run(
        &self,
        state: &mut PipelineState,
        ctx: &StageContext<'_>,
    ) -> Result<(), StageCause>;
}
