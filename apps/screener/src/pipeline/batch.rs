//! Batch execution: one orchestrator run per candidate over a bounded
//! worker pool.
//!
//! Candidates are independent: each run owns its state, shares only the
//! read-only JD and the capability trait objects, and one candidate's
//! failure never touches another's outcome. Every submitted candidate
//! appears in the result exactly once, whether it completed, failed or was
//! cancelled.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info};

use crate::config::PipelineConfig;
use crate::errors::PipelineError;
use crate::llm::Generator;
use crate::models::document::{CandidateId, JobDescription, Resume};
use crate::pipeline::orchestrator::{CancelHandle, Orchestrator};
use crate::pipeline::{AnswerSheet, PipelineState};
use crate::retrieval::Retriever;

/// One unit of batch work: a resume plus that candidate's answers, if any.
pub struct CandidateInput {
    pub resume: Arc<Resume>,
    pub answers: Option<AnswerSheet>,
}

/// Terminal result of one candidate's run.
#[derive(Debug)]
pub enum CandidateOutcome {
    Complete(PipelineState),
    Failed {
        partial: PipelineState,
        error: PipelineError,
    },
    Cancelled {
        partial: PipelineState,
    },
}

/// Shared receiver for multiple workers pulling from one queue.
struct SharedReceiver<T> {
    rx: Arc<Mutex<mpsc::UnboundedReceiver<T>>>,
}

impl<T> SharedReceiver<T> {
    fn new(rx: mpsc::UnboundedReceiver<T>) -> Self {
        Self {
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    async fn recv(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }
}

impl<T> Clone for SharedReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

pub struct BatchRunner {
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn Generator>,
    config: PipelineConfig,
    cancel: CancelHandle,
}

impl BatchRunner {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Generator>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            retriever,
            generator,
            config,
            cancel: CancelHandle::new(),
        }
    }

    /// Handle for cancelling the whole batch; in-flight candidates stop at
    /// their next stage boundary.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Screens every candidate against the JD and collects per-candidate
    /// outcomes keyed by candidate id.
    pub async fn run(
        &self,
        jd: Arc<JobDescription>,
        candidates: Vec<CandidateInput>,
    ) -> BTreeMap<CandidateId, CandidateOutcome> {
        let total = candidates.len();
        if total == 0 {
            return BTreeMap::new();
        }

        let (job_tx, job_rx) = mpsc::unbounded_channel();
        for candidate in candidates {
            // Receiver is alive below, send cannot fail.
            let _ = job_tx.send(candidate);
        }
        drop(job_tx);
        let jobs = SharedReceiver::new(job_rx);

        let (result_tx, mut result_rx) = mpsc::unbounded_channel();
        let workers = self.config.concurrency.max(1).min(total);
        info!(candidates = total, workers, "starting screening batch");

        for worker in 0..workers {
            let jobs = jobs.clone();
            let result_tx = result_tx.clone();
            let jd = jd.clone();
            let orchestrator = Orchestrator::with_cancel(
                self.retriever.clone(),
                self.generator.clone(),
                self.config.clone(),
                self.cancel.clone(),
            );

            tokio::spawn(async move {
                debug!(worker, "screening worker started");
                while let Some(job) = jobs.recv().await {
                    let candidate_id = job.resume.candidate_id.clone();
                    let outcome = match orchestrator
                        .run(jd.clone(), job.resume, job.answers.as_ref())
                        .await
                    {
                        Ok(state) => CandidateOutcome::Complete(state),
                        Err(failure) if failure.error.is_cancelled() => {
                            CandidateOutcome::Cancelled {
                                partial: failure.partial,
                            }
                        }
                        Err(failure) => {
                            error!(
                                candidate = %candidate_id,
                                error = %failure.error,
                                "candidate run failed"
                            );
                            CandidateOutcome::Failed {
                                partial: failure.partial,
                                error: failure.error,
                            }
                        }
                    };
                    let _ = result_tx.send((candidate_id, outcome));
                }
                debug!(worker, "screening worker stopped");
            });
        }
        drop(result_tx);

        let mut results = BTreeMap::new();
        while let Some((candidate_id, outcome)) = result_rx.recv().await {
            results.insert(candidate_id, outcome);
        }
        info!(results = results.len(), "screening batch finished");
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::GenerateError;
    use crate::llm::test_support::ScriptedGenerator;
    use crate::pipeline::StageKind;
    use crate::retrieval::KeywordRetriever;

    const REQ_JSON: &str = r#"{"requirements": ["Python"]}"#;

    /// JD requiring only Python; every fixture resume covers it, so a
    /// successful candidate run costs exactly one generator call (the
    /// extraction) and produces zero gaps.
    fn fixtures(candidates: &[&str]) -> (Arc<JobDescription>, Arc<dyn Retriever>, Vec<CandidateInput>) {
        let jd = Arc::new(JobDescription::new("job_description", "Required: Python."));
        let mut retriever = KeywordRetriever::new();
        retriever.add_corpus(jd.corpus_id.clone(), vec![jd.text.clone()]);

        let inputs: Vec<CandidateInput> = candidates
            .iter()
            .map(|id| {
                let resume = Arc::new(Resume::new(*id, "Seasoned Python engineer."));
                retriever.add_corpus(resume.corpus_id.clone(), vec![resume.text.clone()]);
                CandidateInput {
                    resume,
                    answers: None,
                }
            })
            .collect();

        (jd, Arc::new(retriever), inputs)
    }

    fn config(concurrency: usize) -> PipelineConfig {
        PipelineConfig {
            concurrency,
            ..PipelineConfig::default()
        }
    }

    #[tokio::test]
    async fn test_all_candidates_complete_with_pooled_workers() {
        let (jd, retriever, inputs) = fixtures(&["alice", "bob", "carol", "dave"]);
        let generator = Arc::new(ScriptedGenerator::always(REQ_JSON));
        let runner = BatchRunner::new(retriever, generator, config(3));

        let results = runner.run(jd, inputs).await;

        assert_eq!(results.len(), 4);
        assert!(results
            .values()
            .all(|o| matches!(o, CandidateOutcome::Complete(_))));
    }

    #[tokio::test]
    async fn test_one_failed_candidate_does_not_abort_the_batch() {
        let (jd, retriever, inputs) = fixtures(&["alice", "bob", "carol"]);
        // Single worker processes candidates in submission order: bob (the
        // second) hits a refusal during gap analysis.
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok(REQ_JSON.to_string()),
            Err(GenerateError::Refused("content policy".to_string())),
            Ok(REQ_JSON.to_string()),
        ]));
        let runner = BatchRunner::new(retriever, generator, config(1));

        let results = runner.run(jd, inputs).await;

        assert_eq!(results.len(), 3);
        let complete = results
            .values()
            .filter(|o| matches!(o, CandidateOutcome::Complete(_)))
            .count();
        assert_eq!(complete, 2);

        match &results["bob"] {
            CandidateOutcome::Failed { error, partial } => {
                assert!(matches!(
                    error,
                    PipelineError::Stage {
                        stage: StageKind::GapAnalysis,
                        ..
                    }
                ));
                assert!(partial.gaps.is_empty());
            }
            other => panic!("expected bob to fail, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_batch_reports_every_candidate_as_cancelled() {
        let (jd, retriever, inputs) = fixtures(&["alice", "bob"]);
        let generator = Arc::new(ScriptedGenerator::always(REQ_JSON));
        let runner = BatchRunner::new(retriever, generator.clone(), config(2));
        runner.cancel_handle().cancel();

        let results = runner.run(jd, inputs).await;

        assert_eq!(results.len(), 2);
        assert!(results
            .values()
            .all(|o| matches!(o, CandidateOutcome::Cancelled { .. })));
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_batch_returns_empty_result() {
        let (jd, retriever, _) = fixtures(&[]);
        let generator = Arc::new(ScriptedGenerator::always(REQ_JSON));
        let runner = BatchRunner::new(retriever, generator, config(4));

        let results = runner.run(jd, Vec::new()).await;
        assert!(results.is_empty());
    }
}
