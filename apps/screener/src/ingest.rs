//! Document loading: the job description, the resume directory, and the
//! optional answer sheets. Plain text (.txt/.md) is read directly; .pdf goes
//! through `pdf_extract`. The candidate identifier is the resume file stem.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::models::document::{CandidateId, JobDescription, Resume};
use crate::pipeline::AnswerSheet;
use crate::retrieval::chunker::chunk_text;
use crate::retrieval::KeywordRetriever;

const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "pdf"];

/// Reads one document file into plain text.
fn read_document(path: &Path) -> Result<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let text = match ext.as_str() {
        "txt" | "md" => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        "pdf" => pdf_extract::extract_text(path)
            .with_context(|| format!("extracting text from {}", path.display()))?,
        other => bail!(
            "unsupported file type .{other} ({}); use .txt, .md, or .pdf",
            path.display()
        ),
    };

    Ok(text)
}

pub fn load_job_description(path: &Path, corpus_id: &str) -> Result<JobDescription> {
    let text = read_document(path)?;
    if text.trim().is_empty() {
        bail!("job description {} is empty", path.display());
    }
    info!(path = %path.display(), chars = text.len(), "loaded job description");
    Ok(JobDescription::new(corpus_id, text))
}

/// Loads every supported file in the resumes directory, sorted by file name.
/// Unsupported and unreadable files are skipped with a warning; an empty
/// result is an error since there is nothing to screen.
pub fn load_resumes(dir: &Path) -> Result<Vec<Resume>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("reading resumes directory {}", dir.display()))?;

    let mut paths: Vec<_> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    paths.sort();

    let mut resumes = Vec::new();
    for path in paths {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            warn!(path = %path.display(), "skipping unsupported resume file");
            continue;
        }

        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            warn!(path = %path.display(), "skipping resume with unreadable name");
            continue;
        };

        match read_document(&path) {
            Ok(text) if !text.trim().is_empty() => {
                info!(candidate = stem, chars = text.len(), "loaded resume");
                resumes.push(Resume::new(stem, text));
            }
            Ok(_) => warn!(path = %path.display(), "skipping empty resume"),
            Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable resume"),
        }
    }

    if resumes.is_empty() {
        bail!("no usable resumes found under {}", dir.display());
    }
    Ok(resumes)
}

/// Builds the retrieval corpora: one for the job description and one per
/// resume, each chunked for passage-level lookup.
pub fn build_retriever(jd: &JobDescription, resumes: &[Arc<Resume>]) -> KeywordRetriever {
    let mut retriever = KeywordRetriever::new();
    retriever.add_corpus(&jd.corpus_id, chunk_text(&jd.text));
    for resume in resumes {
        retriever.add_corpus(&resume.corpus_id, chunk_text(&resume.text));
    }
    retriever
}

/// Parses the optional answer-sheet file: a JSON object keyed by candidate
/// identifier, each value mapping question index to answer text.
pub fn load_answer_sheets(path: &Path) -> Result<BTreeMap<CandidateId, AnswerSheet>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading answer sheets {}", path.display()))?;
    let sheets: BTreeMap<CandidateId, AnswerSheet> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing answer sheets {}", path.display()))?;
    info!(candidates = sheets.len(), "loaded answer sheets");
    Ok(sheets)
}
