//! Keyword retrieval backend: in-memory, deterministic, no embeddings.
//!
//! Scoring is lexical: the fraction of query terms a passage contains, with
//! a small bonus when the whole query appears as a phrase. This keeps runs
//! reproducible (identical input ⇒ identical evidence, scores and ordering),
//! which the gap-severity policy and the tests rely on.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::errors::RetrievalError;
use crate::retrieval::{Retriever, ScoredPassage};

/// Bonus added when the passage contains the full query as a substring.
const PHRASE_BONUS: f32 = 0.25;

#[derive(Debug, Default)]
pub struct KeywordRetriever {
    corpora: HashMap<String, Vec<String>>,
}

impl KeywordRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a corpus. Passage order is preserved and used
    /// as the tie-break for equal scores.
    pub fn add_corpus(&mut self, corpus_id: impl Into<String>, passages: Vec<String>) {
        self.corpora.insert(corpus_id.into(), passages);
    }

    pub fn corpus_len(&self, corpus_id: &str) -> usize {
        self.corpora.get(corpus_id).map_or(0, Vec::len)
    }
}

#[async_trait]
impl Retriever for KeywordRetriever {
    async fn retrieve(
        &self,
        corpus_id: &str,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredPassage>, RetrievalError> {
        let passages = self
            .corpora
            .get(corpus_id)
            .ok_or_else(|| RetrievalError::CorpusNotFound(corpus_id.to_string()))?;

        let query_terms = tokenize(query);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }
        let query_lower = query.trim().to_lowercase();

        let mut scored: Vec<(usize, ScoredPassage)> = passages
            .iter()
            .enumerate()
            .filter_map(|(idx, passage)| {
                let score = score_passage(passage, &query_terms, &query_lower);
                (score > 0.0).then(|| {
                    (
                        idx,
                        ScoredPassage {
                            text: passage.clone(),
                            score,
                        },
                    )
                })
            })
            .collect();

        // Best first; stable on corpus order for equal scores.
        scored.sort_by(|(ia, a), (ib, b)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(ia.cmp(ib))
        });

        Ok(scored.into_iter().take(k).map(|(_, p)| p).collect())
    }
}

fn score_passage(passage: &str, query_terms: &[String], query_lower: &str) -> f32 {
    let passage_lower = passage.to_lowercase();
    let hits = query_terms
        .iter()
        .filter(|t| passage_lower.contains(t.as_str()))
        .count();
    if hits == 0 {
        return 0.0;
    }

    let mut score = hits as f32 / query_terms.len() as f32;
    if query_terms.len() > 1 && passage_lower.contains(query_lower) {
        score += PHRASE_BONUS;
    }
    score.min(1.0)
}

/// Lowercased alphanumeric terms, short stop-words dropped.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '+' && c != '#')
        .filter(|t| t.len() > 2 || t.contains(['+', '#']))
        .map(str::to_string)
        .collect()
}
