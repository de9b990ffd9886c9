//! Question generation: exactly one JD-grounded question per gap.
//!
//! Difficulty is fixed in code from the gap's severity; the model only
//! writes the question text. A gap whose generation keeps failing is skipped
//! with a recorded warning; one bad gap never blocks the others.

use async_trait::async_trait;
use tracing::{info, warn};

use serde::Deserialize;

use crate::errors::StageCause;
use crate::llm::generate_json_with_retry;
use crate::models::screening::{Difficulty, InterviewQuestion};
use crate::pipeline::prompts::{QUESTION_PROMPT_TEMPLATE, QUESTION_SYSTEM};
use crate::pipeline::{PipelineState, Stage, StageContext, StageKind};

#[derive(Debug, Deserialize)]
struct QuestionReply {
    question: String,
}

pub struct QuestionGenerationStage;

#[async_trait]
impl Stage for QuestionGenerationStage {
    fn kind(&self) -> StageKind {
        StageKind::QuestionGen
    }

    async fn run(
        &self,
        state: &mut PipelineState,
        ctx: &StageContext<'_>,
    ) -> Result<(), StageCause> {
        // An empty gap list is a strong candidate, not an error.
        if state.gaps.is_empty() {
            info!(candidate = %state.resume.candidate_id, "no gaps, no questions");
            return Ok(());
        }

        let jd_corpus_id = state.jd.corpus_id.clone();
        let mut questions = Vec::new();
        let mut warnings = Vec::new();

        for (gap_idx, gap) in state.gaps.iter().enumerate() {
            let jd_context = match ctx
                .retriever
                .retrieve(&jd_corpus_id, &gap.skill, ctx.config.retrieval_k)
                .await
            {
                Ok(hits) if !hits.is_empty() => hits
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("\n\n"),
                // Fall back to the gap's own JD evidence captured earlier.
                Ok(_) => gap.jd_evidence.join("\n\n"),
                Err(e) => {
                    warn!(skill = %gap.skill, error = %e, "JD grounding retrieval failed");
                    gap.jd_evidence.join("\n\n")
                }
            };

            let difficulty = Difficulty::for_severity(gap.severity);
            let prompt = QUESTION_PROMPT_TEMPLATE
                .replace("{skill}", &gap.skill)
                .replace("{difficulty}", &format!("{difficulty:?}").to_lowercase())
                .replace("{jd_context}", &jd_context);

            match generate_json_with_retry::<QuestionReply>(
                ctx.generator,
                &prompt,
                QUESTION_SYSTEM,
                &ctx.retry,
            )
            .await
            {
                Ok(reply) if !reply.question.trim().is_empty() => {
                    questions.push(InterviewQuestion {
                        text: reply.question.trim().to_string(),
                        targets: vec![gap_idx],
                        difficulty,
                    });
                }
                Ok(_) => {
                    warn!(skill = %gap.skill, "generator returned an empty question; skipping gap");
                    warnings.push(format!(
                        "question generation returned empty output for '{}'; gap skipped",
                        gap.skill
                    ));
                }
                Err(e) => {
                    warn!(skill = %gap.skill, error = %e, "question generation failed; skipping gap");
                    warnings.push(format!(
                        "question generation failed for '{}': {e}; gap skipped",
                        gap.skill
                    ));
                }
            }
        }

        info!(
            candidate = %state.resume.candidate_id,
            questions = questions.len(),
            "question generation complete"
        );
        state.questions.extend(questions);
        state.warnings.extend(warnings);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::errors::GenerateError;
    use crate::llm::test_support::ScriptedGenerator;
    use crate::models::screening::Severity;
    use crate::pipeline::state::test_support::{blank_state, gap};
    use crate::retrieval::KeywordRetriever;

    fn retriever() -> KeywordRetriever {
        let mut r = KeywordRetriever::new();
        r.add_corpus(
            "job_description",
            vec!["You will run Kubernetes and write SQL.".to_string()],
        );
        r
    }

    fn state_with_gaps(severities: &[(&str, Severity)]) -> PipelineState {
        let mut state = blank_state();
        for (skill, severity) in severities {
            state.gaps.push(gap(skill, *severity));
        }
        state
    }

    #[tokio::test]
    async fn test_one_question_per_gap_in_gap_order() {
        let retriever = retriever();
        let generator = ScriptedGenerator::new(vec![
            Ok(r#"{"question": "How do you debug a CrashLoopBackOff?"}"#.to_string()),
            Ok(r#"{"question": "Explain an index-only scan."}"#.to_string()),
        ]);
        let mut state = state_with_gaps(&[
            ("Kubernetes", Severity::Critical),
            ("SQL", Severity::Moderate),
        ]);
        let config = PipelineConfig::default();
        let ctx = StageContext::new(&retriever, &generator, &config, None);

        QuestionGenerationStage.run(&mut state, &ctx).await.unwrap();

        assert_eq!(state.questions.len(), 2);
        assert_eq!(state.questions[0].targets, vec![0]);
        assert_eq!(state.questions[1].targets, vec![1]);
        assert_eq!(state.questions[0].difficulty, Difficulty::Advanced);
        assert_eq!(state.questions[1].difficulty, Difficulty::Intermediate);
    }

    #[tokio::test]
    async fn test_empty_gap_list_yields_zero_questions_without_error() {
        let retriever = retriever();
        let generator = ScriptedGenerator::always(r#"{"question": "unused"}"#);
        let mut state = blank_state();
        let config = PipelineConfig::default();
        let ctx = StageContext::new(&retriever, &generator, &config, None);

        QuestionGenerationStage.run(&mut state, &ctx).await.unwrap();

        assert!(state.questions.is_empty());
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistently_failing_gap_is_skipped_with_warning() {
        let retriever = retriever();
        // First gap: three malformed replies exhaust the budget; the script
        // then settles on valid output for the second gap.
        let generator = ScriptedGenerator::new(vec![
            Ok("no json here".to_string()),
            Ok("still no json".to_string()),
            Ok("nope".to_string()),
            Ok(r#"{"question": "Explain an index-only scan."}"#.to_string()),
        ]);
        let mut state = state_with_gaps(&[
            ("Kubernetes", Severity::Critical),
            ("SQL", Severity::Moderate),
        ]);
        let config = PipelineConfig::default();
        let ctx = StageContext::new(&retriever, &generator, &config, None);

        QuestionGenerationStage.run(&mut state, &ctx).await.unwrap();

        assert_eq!(state.questions.len(), 1);
        assert_eq!(state.questions[0].targets, vec![1]);
        assert_eq!(state.warnings.len(), 1);
        assert!(state.warnings[0].contains("Kubernetes"));
    }

    #[tokio::test]
    async fn test_refused_generation_skips_gap_rather_than_aborting() {
        let retriever = retriever();
        let generator = ScriptedGenerator::new(vec![
            Err(GenerateError::Refused("policy".to_string())),
            Ok(r#"{"question": "Explain an index-only scan."}"#.to_string()),
        ]);
        let mut state = state_with_gaps(&[
            ("Kubernetes", Severity::Critical),
            ("SQL", Severity::Moderate),
        ]);
        let config = PipelineConfig::default();
        let ctx = StageContext::new(&retriever, &generator, &config, None);

        QuestionGenerationStage.run(&mut state, &ctx).await.unwrap();

        assert_eq!(state.questions.len(), 1);
        assert!(state.warnings[0].contains("refused"));
    }
}
