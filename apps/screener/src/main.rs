mod config;
mod errors;
mod ingest;
mod llm;
mod models;
mod pipeline;
mod retrieval;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm::anthropic::AnthropicGenerator;
use crate::pipeline::batch::CandidateInput;
use crate::pipeline::report::{CandidateReport, ScreeningReport};
use crate::pipeline::BatchRunner;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting screener v{}", env!("CARGO_PKG_VERSION"));

    // Load documents
    let jd = Arc::new(ingest::load_job_description(
        Path::new(&config.jd_path),
        &config.pipeline.jd_corpus_id,
    )?);
    let resumes: Vec<_> = ingest::load_resumes(Path::new(&config.resumes_dir))?
        .into_iter()
        .map(Arc::new)
        .collect();
    info!(candidates = resumes.len(), "documents loaded");

    // Optional answer sheets for the evaluation stage
    let mut answer_sheets = match &config.answers_path {
        Some(path) => ingest::load_answer_sheets(Path::new(path))?,
        None => Default::default(),
    };

    // Index retrieval corpora
    let retriever = Arc::new(ingest::build_retriever(&jd, &resumes));

    // Initialize LLM client
    let generator = Arc::new(AnthropicGenerator::new(config.anthropic_api_key.clone())?);
    info!(model = llm::anthropic::MODEL, "LLM client initialized");

    // Screen the batch
    let candidates: Vec<CandidateInput> = resumes
        .into_iter()
        .map(|resume| {
            let answers = answer_sheets.remove(&resume.candidate_id);
            CandidateInput { resume, answers }
        })
        .collect();
    for orphan in answer_sheets.keys() {
        warn!(candidate = %orphan, "answer sheet has no matching resume");
    }

    let runner = BatchRunner::new(retriever, generator, config.pipeline.clone());

    // Ctrl-C stops cleanly: in-flight stages commit, nothing new starts.
    let cancel = runner.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling batch");
            cancel.cancel();
        }
    });

    let outcomes = runner.run(jd.clone(), candidates).await;

    // Write the aggregate report
    let report = ScreeningReport::from_outcomes(&jd, outcomes);
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(&config.report_path, json)
        .with_context(|| format!("writing report to {}", config.report_path))?;

    info!(
        report = %config.report_path,
        complete = report.complete_count(),
        total = report.candidates.len(),
        "screening finished"
    );
    for (candidate, entry) in &report.candidates {
        match entry {
            CandidateReport::Complete { state } => info!(
                candidate = %candidate,
                gaps = state.gaps.len(),
                questions = state.questions.len(),
                plan_items = state.plan.len(),
                "complete"
            ),
            CandidateReport::Failed { error, .. } => {
                warn!(candidate = %candidate, error = %error, "failed")
            }
            CandidateReport::Cancelled { partial } => warn!(
                candidate = %candidate,
                last_committed = ?partial.marker.last_committed(),
                "cancelled"
            ),
        }
    }

    Ok(())
}
