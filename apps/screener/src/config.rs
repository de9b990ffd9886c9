use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    /// Path to the job description document (.txt, .md or .pdf).
    pub jd_path: String,
    /// Directory of candidate resumes. Candidate id = file stem.
    pub resumes_dir: String,
    /// Optional JSON file of candidate answers: {candidate_id: {question_index: answer}}.
    pub answers_path: Option<String>,
    /// Where the aggregate screening report is written.
    pub report_path: String,
    pub rust_log: String,
    pub pipeline: PipelineConfig,
}

/// Tunable knobs of the screening pipeline. Every threshold and budget the
/// stages consult lives here; nothing is hardcoded at call sites.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Corpus id under which JD passages are indexed.
    pub jd_corpus_id: String,
    /// Passages fetched per retrieval query.
    pub retrieval_k: usize,
    /// Total attempts per generator call (first try included).
    pub retry_budget: u32,
    /// Base delay for exponential backoff between retries.
    pub backoff_base_ms: u64,
    /// Resume evidence scoring at/above this clears a requirement entirely.
    pub strong_evidence_threshold: f32,
    /// Resume evidence below this (but present) is a moderate gap;
    /// between the two thresholds it is a minor gap.
    pub weak_evidence_threshold: f32,
    /// Concurrent candidate runs in the batch worker pool.
    pub concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            jd_corpus_id: "job_description".to_string(),
            retrieval_k: 6,
            retry_budget: 3,
            backoff_base_ms: 500,
            strong_evidence_threshold: 0.55,
            weak_evidence_threshold: 0.25,
            concurrency: 4,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = PipelineConfig::default();
        let pipeline = PipelineConfig {
            jd_corpus_id: defaults.jd_corpus_id,
            retrieval_k: env_parse("RETRIEVAL_K", defaults.retrieval_k)?,
            retry_budget: env_parse("RETRY_BUDGET", defaults.retry_budget)?,
            backoff_base_ms: env_parse("BACKOFF_BASE_MS", defaults.backoff_base_ms)?,
            strong_evidence_threshold: env_parse(
                "STRONG_EVIDENCE_THRESHOLD",
                defaults.strong_evidence_threshold,
            )?,
            weak_evidence_threshold: env_parse(
                "WEAK_EVIDENCE_THRESHOLD",
                defaults.weak_evidence_threshold,
            )?,
            concurrency: env_parse("BATCH_CONCURRENCY", defaults.concurrency)?,
        };

        Ok(Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            jd_path: std::env::var("JD_PATH").unwrap_or_else(|_| "./data/jd.txt".to_string()),
            resumes_dir: std::env::var("RESUMES_DIR")
                .unwrap_or_else(|_| "./data/resumes".to_string()),
            answers_path: std::env::var("ANSWERS_PATH").ok(),
            report_path: std::env::var("REPORT_PATH")
                .unwrap_or_else(|_| "./screening_report.json".to_string()),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            pipeline,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value")),
        Err(_) => Ok(default),
    }
}
