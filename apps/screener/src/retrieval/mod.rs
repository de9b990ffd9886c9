//! Retrieval capability: similarity search over named passage corpora.
//!
//! The pipeline only ever sees the `Retriever` trait. The default backend is
//! `KeywordRetriever` (pure-Rust, deterministic, fully testable); an
//! embedding-backed store can be swapped in behind the same trait without
//! touching any stage code.

use async_trait::async_trait;

use crate::errors::RetrievalError;

pub mod chunker;
pub mod keyword;

pub use keyword::KeywordRetriever;

/// One retrieved passage with its relevance score in [0, 1], higher is better.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPassage {
    pub text: String,
    pub score: f32,
}

/// Similarity search over a named corpus. Implementations must be stateless
/// per request and safe for concurrent invocation; the batch runner shares
/// one instance across all candidate workers.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Returns the top-`k` most relevant passages of `corpus_id` for `query`,
    /// best match first. Passages with no relevance at all are omitted, so
    /// the result may be shorter than `k` (or empty).
    async fn retrieve(
        &self,
        corpus_id: &str,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredPassage>, RetrievalError>;
}
