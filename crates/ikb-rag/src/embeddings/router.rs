//! Sensitivity-aware dispatch of chunk embeddings.
//!
//! Sensitive chunks (PII-flagged, or in a policy/safety/compliance section)
//! are embedded by the local provider, everything else by the cloud provider.
//! The result lines up index-for-index with the input chunks.

use std::sync::Arc;

use super::EmbeddingProvider;
use crate::deadline::Deadline;
use crate::error::{RagError, Result};
use crate::types::{Chunk, Embedding, ProviderKind};

/// Which provider each input index went to, plus the per-provider batches.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingPlan {
    pub assignments: Vec<ProviderKind>,
    pub local_indices: Vec<usize>,
    pub cloud_indices: Vec<usize>,
}

impl RoutingPlan {
    pub fn for_chunks(chunks: &[Chunk]) -> Self {
        let mut plan = Self {
            assignments: Vec::with_capacity(chunks.len()),
            local_indices: Vec::new(),
            cloud_indices: Vec::new(),
        };

        for (index, chunk) in chunks.iter().enumerate() {
            let provider = if chunk.routes_locally() {
                plan.local_indices.push(index);
                ProviderKind::Local
            } else {
                plan.cloud_indices.push(index);
                ProviderKind::Cloud
            };
            tracing::debug!(
                chunk = index,
                provider = provider.as_str(),
                sensitive = chunk.sensitive,
                section = chunk.section.as_str(),
                "Embedding routing"
            );
            plan.assignments.push(provider);
        }

        plan
    }
}

pub struct EmbeddingRouter {
    local: Arc<dyn EmbeddingProvider>,
    cloud: Arc<dyn EmbeddingProvider>,
    parallel: bool,
}

impl EmbeddingRouter {
    pub fn new(
        local: Arc<dyn EmbeddingProvider>,
        cloud: Arc<dyn EmbeddingProvider>,
        parallel: bool,
    ) -> Self {
        Self {
            local,
            cloud,
            parallel,
        }
    }

    /// Provider used for query embeddings.
    pub fn cloud(&self) -> Arc<dyn EmbeddingProvider> {
        Arc::clone(&self.cloud)
    }

    /// Embed every chunk, preserving order. Any provider failure fails the whole call.
    pub async fn embed_chunks(&self, chunks: &[Chunk], deadline: &Deadline) -> Result<Vec<Embedding>> {
        let plan = RoutingPlan::for_chunks(chunks);

        let local_texts = collect_texts(chunks, &plan.local_indices);
        let cloud_texts = collect_texts(chunks, &plan.cloud_indices);

        let (local_vectors, cloud_vectors) = if self.parallel {
            tokio::try_join!(
                embed_partition(self.local.as_ref(), &local_texts, deadline),
                embed_partition(self.cloud.as_ref(), &cloud_texts, deadline),
            )?
        } else {
            let local = embed_partition(self.local.as_ref(), &local_texts, deadline).await?;
            let cloud = embed_partition(self.cloud.as_ref(), &cloud_texts, deadline).await?;
            (local, cloud)
        };

        let mut local_iter = local_vectors.into_iter();
        let mut cloud_iter = cloud_vectors.into_iter();

        let embeddings: Vec<Embedding> = plan
            .assignments
            .iter()
            .map(|provider| {
                let vector = match provider {
                    ProviderKind::Local => local_iter.next(),
                    ProviderKind::Cloud => cloud_iter.next(),
                };
                vector.map(|vector| Embedding {
                    vector,
                    provider: *provider,
                })
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| RagError::provider("router", "provider returned too few vectors"))?;

        tracing::info!(
            "Embedded {} chunks ({} local, {} cloud)",
            embeddings.len(),
            plan.local_indices.len(),
            plan.cloud_indices.len()
        );

        Ok(embeddings)
    }
}

fn collect_texts(chunks: &[Chunk], indices: &[usize]) -> Vec<String> {
    indices.iter().map(|&i| chunks[i].content.clone()).collect()
}

/// One provider call for a whole partition; skipped entirely when the partition is empty.
async fn embed_partition(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    deadline: &Deadline,
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let vectors = provider.embed(texts, deadline).await?;
    if vectors.len() != texts.len() {
        return Err(RagError::provider(
            provider.name(),
            format!("returned {} vectors for {} texts", vectors.len(), texts.len()),
        ));
    }
    Ok(vectors)
}
