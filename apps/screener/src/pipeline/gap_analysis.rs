//! Gap analysis: extracts JD requirements and scores resume coverage.
//!
//! One generator call extracts the ordered requirement list from retrieved JD
//! context; each requirement is then checked against the candidate's resume
//! corpus. Requirements with strong resume evidence produce no gap at all.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::StageCause;
use crate::llm::generate_json_with_retry;
use crate::models::screening::{Gap, Severity};
use crate::pipeline::prompts::{REQUIREMENTS_PROMPT_TEMPLATE, REQUIREMENTS_SYSTEM};
use crate::pipeline::{PipelineState, Stage, StageContext, StageKind};

/// Query used to pull requirement-bearing passages out of the JD corpus.
const REQUIREMENTS_QUERY: &str =
    "required skills qualifications must have experience responsibilities";

#[derive(Debug, Deserialize)]
struct RequirementsReply {
    requirements: Vec<String>,
}

pub struct GapAnalysisStage;

#[async_trait]
impl Stage for GapAnalysisStage {
    fn kind(&self) -> StageKind {
        StageKind::GapAnalysis
    }

    async fn run(
        &self,
        state: &mut PipelineState,
        ctx: &StageContext<'_>,
    ) -> Result<(), StageCause> {
        // JD context for extraction. A retrieval failure here is fatal for
        // the stage (nothing downstream is valid without requirements), but
        // an empty result just falls back to the raw JD text.
        let jd_hits = ctx
            .retriever
            .retrieve(&state.jd.corpus_id, REQUIREMENTS_QUERY, ctx.config.retrieval_k)
            .await?;
        let jd_context = if jd_hits.is_empty() {
            state.jd.text.clone()
        } else {
            join_passages(jd_hits.iter().map(|p| p.text.as_str()))
        };

        let prompt = REQUIREMENTS_PROMPT_TEMPLATE.replace("{jd_context}", &jd_context);
        let reply: RequirementsReply =
            generate_json_with_retry(ctx.generator, &prompt, REQUIREMENTS_SYSTEM, &ctx.retry)
                .await?;

        let requirements = dedupe_preserving_order(reply.requirements);
        if requirements.is_empty() {
            return Err(StageCause::Empty(
                "no requirements extracted from the job description".to_string(),
            ));
        }
        info!(
            candidate = %state.resume.candidate_id,
            count = requirements.len(),
            "extracted JD requirements"
        );

        let jd_corpus_id = state.jd.corpus_id.clone();
        let resume_corpus_id = state.resume.corpus_id.clone();
        let mut gaps = Vec::new();
        let mut warnings = Vec::new();
        for skill in &requirements {
            let jd_evidence =
                evidence(ctx, &jd_corpus_id, skill, &mut warnings).await;
            let resume_result = ctx
                .retriever
                .retrieve(&resume_corpus_id, skill, ctx.config.retrieval_k)
                .await;
            let resume_evidence_scored = match resume_result {
                Ok(hits) => hits,
                Err(e) => {
                    // Missing resume evidence is the maximal gap, not a
                    // stage failure.
                    warn!(skill, error = %e, "resume evidence retrieval failed; treating as no evidence");
                    warnings.push(format!("resume evidence retrieval failed for '{skill}': {e}"));
                    Vec::new()
                }
            };

            let top_score = resume_evidence_scored.first().map(|p| p.score);
            let severity = match top_score {
                None => Severity::Critical,
                Some(s) if s < ctx.config.weak_evidence_threshold => Severity::Moderate,
                Some(s) if s < ctx.config.strong_evidence_threshold => Severity::Minor,
                Some(_) => continue, // requirement covered, no gap
            };

            gaps.push(Gap {
                skill: skill.clone(),
                jd_evidence,
                resume_evidence: resume_evidence_scored
                    .into_iter()
                    .map(|p| p.text)
                    .collect(),
                severity,
            });
        }

        // Critical first; stable sort keeps JD extraction order within a
        // severity band.
        gaps.sort_by(|a, b| b.severity.cmp(&a.severity));

        info!(
            candidate = %state.resume.candidate_id,
            gaps = gaps.len(),
            "gap analysis complete"
        );
        state.gaps.extend(gaps);
        state.warnings.extend(warnings);
        Ok(())
    }
}

/// JD evidence for one skill. Retrieval failure degrades to an empty
/// evidence set with a warning; the gap itself still stands.
async fn evidence(
    ctx: &StageContext<'_>,
    corpus_id: &str,
    skill: &str,
    warnings: &mut Vec<String>,
) -> Vec<String> {
    let result = ctx
        .retriever
        .retrieve(corpus_id, skill, ctx.config.retrieval_k)
        .await;
    match result {
        Ok(hits) => hits.into_iter().map(|p| p.text).collect(),
        Err(e) => {
            warn!(skill, error = %e, "JD evidence retrieval failed");
            warnings.push(format!("JD evidence retrieval failed for '{skill}': {e}"));
            Vec::new()
        }
    }
}

fn join_passages<'a>(passages: impl Iterator<Item = &'a str>) -> String {
    passages.collect::<Vec<_>>().join("\n\n")
}

fn dedupe_preserving_order(raw: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    raw.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_lowercase()))
        .collect()
}
