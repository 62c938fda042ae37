//! Hybrid retrieval: semantic similarity plus a question-derived section bonus.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::deadline::Deadline;
use crate::embeddings::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::storage::{SimilarityQuery, StoredHit, VectorStore};
use crate::types::{round_score, ProviderKind, RetrievalResult, SectionWeights};

pub struct RetrievalEngine {
    /// Query embedder. Questions are not sensitive, so this is the cloud provider.
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    top_k: usize,
}

impl RetrievalEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            top_k,
        }
    }

    pub async fn retrieve(
        &self,
        question: &str,
        weights: &SectionWeights,
        deadline: &Deadline,
    ) -> Result<Vec<RetrievalResult>> {
        let vector = self
            .embedder
            .embed(&[question.to_string()], deadline)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::provider(self.embedder.name(), "no query embedding returned"))?;

        let query = SimilarityQuery {
            vector,
            k: self.top_k,
            section_weights: weights.clone(),
            provider: ProviderKind::Cloud,
        };

        let hits = deadline
            .run("similarity search", self.store.similarity_search(&query, deadline))
            .await?;
        tracing::debug!("Store returned {} candidates", hits.len());

        Ok(rank(hits, weights, self.top_k))
    }
}

/// Score, order and cut candidates.
///
/// Ties on score go to the lower chunk index; remaining ties keep store order.
pub fn rank(hits: Vec<StoredHit>, weights: &SectionWeights, k: usize) -> Vec<RetrievalResult> {
    let mut scored: Vec<(f32, StoredHit)> = hits
        .into_iter()
        .map(|hit| (hit.similarity + weights.bonus(hit.section), hit))
        .collect();

    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.1.chunk_index.cmp(&b.1.chunk_index))
    });
    scored.truncate(k);

    scored
        .into_iter()
        .map(|(score, hit)| RetrievalResult {
            content: hit.content,
            score: round_score(score),
            section: hit.section,
            document: hit.document,
            chunk_index: hit.chunk_index,
        })
        .collect()
}
