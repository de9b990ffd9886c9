//! Answer evaluation: scores each supplied answer against the role's
//! expected competency.
//!
//! Questions without a supplied answer are skipped silently (that is normal,
//! not an error). When an evaluation cannot be obtained within the retry
//! budget, a conservative fallback is recorded instead: score 0.0 and
//! `residual_gap = true`. An unresolved evaluation never silently clears a
//! gap.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::StageCause;
use crate::llm::generate_validated_with_retry;
use crate::models::screening::AnswerEvaluation;
use crate::pipeline::prompts::{EVALUATION_PROMPT_TEMPLATE, EVALUATION_SYSTEM};
use crate::pipeline::{PipelineState, Stage, StageContext, StageKind};

#[derive(Debug, Deserialize)]
struct EvaluationReply {
    score: f64,
    rationale: String,
    residual_gap: bool,
}

pub struct AnswerEvaluationStage;

#[async_trait]
impl Stage for AnswerEvaluationStage {
    fn kind(&self) -> StageKind {
        StageKind::AnswerEval
    }

    async fn run(
        &self,
        state: &mut PipelineState,
        ctx: &StageContext<'_>,
    ) -> Result<(), StageCause> {
        let Some(answers) = ctx.answers else {
            // The orchestrator skips this stage entirely when no answers are
            // supplied; an empty sheet reaching us still means zero work.
            return Ok(());
        };

        let jd_corpus_id = state.jd.corpus_id.clone();
        let mut evaluations = Vec::new();
        let mut warnings = Vec::new();

        for (question_idx, question) in state.questions.iter().enumerate() {
            let Some(answer) = answers.get(&question_idx) else {
                continue; // unanswered questions get no evaluation
            };

            // Expected-competency context is grounded in the first targeted
            // gap's skill; re-retrieved rather than cached from the previous
            // stage.
            let skill = question
                .targets
                .first()
                .map(|&i| state.gaps[i].skill.as_str())
                .unwrap_or("the role's requirements");
            let jd_context = match ctx
                .retriever
                .retrieve(&jd_corpus_id, skill, ctx.config.retrieval_k)
                .await
            {
                Ok(hits) => hits
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("\n\n"),
                Err(e) => {
                    warn!(skill, error = %e, "competency context retrieval failed");
                    String::new()
                }
            };

            let prompt = EVALUATION_PROMPT_TEMPLATE
                .replace("{skill}", skill)
                .replace("{jd_context}", &jd_context)
                .replace("{question}", &question.text)
                .replace("{answer}", answer);

            // An out-of-range score is a schema violation: it re-enters the
            // retry loop with a corrective reprompt like any malformed reply.
            let result = generate_validated_with_retry::<EvaluationReply, _>(
                ctx.generator,
                &prompt,
                EVALUATION_SYSTEM,
                &ctx.retry,
                |reply| {
                    if (0.0..=1.0).contains(&reply.score) {
                        Ok(())
                    } else {
                        Err(format!("score {} is outside [0.0, 1.0]", reply.score))
                    }
                },
            )
            .await;

            let evaluation = match result {
                Ok(reply) => AnswerEvaluation {
                    question: question_idx,
                    answer_text: answer.clone(),
                    score: reply.score,
                    rationale: reply.rationale,
                    residual_gap: reply.residual_gap,
                },
                Err(e) => {
                    warn!(question = question_idx, error = %e, "evaluation failed; using conservative fallback");
                    warnings.push(format!(
                        "evaluation failed for question {question_idx}: {e}; marked residual"
                    ));
                    fallback_evaluation(question_idx, answer)
                }
            };

            evaluations.push(evaluation);
        }

        info!(
            candidate = %state.resume.candidate_id,
            evaluations = evaluations.len(),
            "answer evaluation complete"
        );
        state.evaluations.extend(evaluations);
        state.warnings.extend(warnings);
        Ok(())
    }
}

/// The conservative default when no trustworthy evaluation exists.
fn fallback_evaluation(question_idx: usize, answer: &str) -> AnswerEvaluation {
    AnswerEvaluation {
        question: question_idx,
        answer_text: answer.to_string(),
        score: 0.0,
        rationale: "Evaluation unavailable; gap conservatively kept open.".to_string(),
        residual_gap: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::llm::test_support::ScriptedGenerator;
    use crate::models::screening::{Difficulty, Severity};
    use crate::pipeline::state::test_support::{blank_state, gap, question};
    use crate::pipeline::AnswerSheet;
    use crate::retrieval::KeywordRetriever;

    fn retriever() -> KeywordRetriever {
        let mut r = KeywordRetriever::new();
        r.add_corpus(
            "job_description",
            vec!["You will run Kubernetes and write SQL.".to_string()],
        );
        r
    }

    fn state_with_questions() -> PipelineState {
        let mut state = blank_state();
        state.gaps.push(gap("Kubernetes", Severity::Critical));
        state.gaps.push(gap("SQL", Severity::Moderate));
        state
            .questions
            .push(question("How do you debug a CrashLoopBackOff?", 0, Difficulty::Advanced));
        state
            .questions
            .push(question("Explain an index-only scan.", 1, Difficulty::Intermediate));
        state
    }

    fn answers(pairs: &[(usize, &str)]) -> AnswerSheet {
        pairs
            .iter()
            .map(|(i, a)| (*i, a.to_string()))
            .collect()
    }

    const GOOD_EVAL: &str =
        r#"{"score": 0.8, "rationale": "Solid and specific.", "residual_gap": false}"#;

    #[tokio::test]
    async fn test_unanswered_questions_get_no_evaluation() {
        let retriever = retriever();
        let generator = ScriptedGenerator::always(GOOD_EVAL);
        let mut state = state_with_questions();
        let sheet = answers(&[(1, "Index-only scans read just the index.")]);
        let config = PipelineConfig::default();
        let ctx = StageContext::new(&retriever, &generator, &config, Some(&sheet));

        AnswerEvaluationStage.run(&mut state, &ctx).await.unwrap();

        assert_eq!(state.evaluations.len(), 1);
        assert_eq!(state.evaluations[0].question, 1);
        assert!(state.evaluation_for(0).is_none());
    }

    #[tokio::test]
    async fn test_at_most_one_evaluation_per_question_even_on_rerun() {
        let retriever = retriever();
        let config = PipelineConfig::default();
        let sheet = answers(&[(0, "Check events, then container logs.")]);

        let run = |mut state: PipelineState| {
            let retriever = &retriever;
            let config = &config;
            let sheet = &sheet;
            async move {
                let generator = ScriptedGenerator::always(GOOD_EVAL);
                let ctx = StageContext::new(retriever, &generator, config, Some(sheet));
                AnswerEvaluationStage.run(&mut state, &ctx).await.unwrap();
                state
            }
        };

        let first = run(state_with_questions()).await;
        let second = run(state_with_questions()).await;
        assert_eq!(first.evaluations.len(), 1);
        assert_eq!(second.evaluations.len(), first.evaluations.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_score_is_retried_then_accepted() {
        let retriever = retriever();
        let generator = ScriptedGenerator::new(vec![
            Ok(r#"{"score": 7.5, "rationale": "ten point scale", "residual_gap": false}"#
                .to_string()),
            Ok(GOOD_EVAL.to_string()),
        ]);
        let mut state = state_with_questions();
        let sheet = answers(&[(0, "Check events, then container logs.")]);
        let config = PipelineConfig::default();
        let ctx = StageContext::new(&retriever, &generator, &config, Some(&sheet));

        AnswerEvaluationStage.run(&mut state, &ctx).await.unwrap();

        assert_eq!(state.evaluations.len(), 1);
        assert_eq!(state.evaluations[0].score, 0.8);
        assert!(!state.evaluations[0].residual_gap);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_failure_falls_back_to_residual_gap_true() {
        let retriever = retriever();
        let generator = ScriptedGenerator::always("not json ever");
        let mut state = state_with_questions();
        let sheet = answers(&[(0, "Check events, then container logs.")]);
        let config = PipelineConfig::default();
        let ctx = StageContext::new(&retriever, &generator, &config, Some(&sheet));

        AnswerEvaluationStage.run(&mut state, &ctx).await.unwrap();

        assert_eq!(state.evaluations.len(), 1);
        let eval = &state.evaluations[0];
        assert!(eval.residual_gap);
        assert_eq!(eval.score, 0.0);
        assert!(!state.warnings.is_empty());
    }
}
