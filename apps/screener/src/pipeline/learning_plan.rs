//! Learning plan: one study recommendation per gap still open after
//! evaluation.
//!
//! The open-gap rule lives on `PipelineState::open_gaps`; this stage only
//! turns each open gap into a concrete plan item. Closed gaps produce
//! nothing, and a fully closed candidate gets an empty plan.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::StageCause;
use crate::llm::generate_validated_with_retry;
use crate::models::screening::LearningPlanItem;
use crate::pipeline::prompts::{PLAN_PROMPT_TEMPLATE, PLAN_SYSTEM};
use crate::pipeline::{PipelineState, Stage, StageContext, StageKind};

#[derive(Debug, Deserialize)]
struct PlanReply {
    resources: Vec<String>,
    estimated_effort: String,
}

pub struct LearningPlanStage;

#[async_trait]
impl Stage for LearningPlanStage {
    fn kind(&self) -> StageKind {
        StageKind::PlanGen
    }

    async fn run(
        &self,
        state: &mut PipelineState,
        ctx: &StageContext<'_>,
    ) -> Result<(), StageCause> {
        let open = state.open_gaps();
        info!(
            candidate = %state.resume.candidate_id,
            open = open.len(),
            total = state.gaps.len(),
            "building learning plan for open gaps"
        );

        let mut items = Vec::new();
        let mut warnings = Vec::new();

        for gap_idx in open {
            let gap = &state.gaps[gap_idx];
            let prompt = PLAN_PROMPT_TEMPLATE
                .replace("{skill}", &gap.skill)
                .replace("{severity}", &format!("{:?}", gap.severity).to_lowercase())
                .replace("{jd_evidence}", &gap.jd_evidence.join("\n\n"));

            let result = generate_validated_with_retry::<PlanReply, _>(
                ctx.generator,
                &prompt,
                PLAN_SYSTEM,
                &ctx.retry,
                |reply| {
                    if reply.resources.is_empty() {
                        Err("resources must not be empty".to_string())
                    } else {
                        Ok(())
                    }
                },
            )
            .await;

            match result {
                Ok(reply) => items.push(LearningPlanItem {
                    topic: gap.skill.clone(),
                    resources: reply.resources,
                    estimated_effort: reply.estimated_effort,
                }),
                Err(e) => {
                    warn!(skill = %gap.skill, error = %e, "plan generation failed; skipping topic");
                    warnings.push(format!(
                        "learning plan generation failed for '{}': {e}; topic skipped",
                        gap.skill
                    ));
                }
            }
        }

        info!(
            candidate = %state.resume.candidate_id,
            items = items.len(),
            "learning plan complete"
        );
        state.plan.extend(items);
        state.warnings.extend(warnings);
        Ok(())
    }
}
