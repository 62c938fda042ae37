use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use super::{DocumentDetail, DocumentSummary, SimilarityQuery, StoreStats, StoredHit, VectorStore};
use crate::deadline::Deadline;
use crate::embeddings::cosine_similarity;
use crate::error::{RagError, Result};
use crate::types::{Chunk, DocumentMeta, Embedding, ProviderKind, Section};

struct ChunkRow {
    document_id: Uuid,
    content: String,
    section: Section,
    chunk_index: usize,
    vector: Vec<f32>,
    provider: ProviderKind,
}

/// Process-local store with brute-force cosine search.
#[derive(Default)]
pub struct InMemoryVectorStore {
    documents: RwLock<HashMap<Uuid, DocumentMeta>>,
    rows: RwLock<Vec<ChunkRow>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document_count(&self) -> usize {
        self.documents.read().len()
    }

    pub fn chunk_count(&self) -> usize {
        self.rows.read().len()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn similarity_search(
        &self,
        query: &SimilarityQuery,
        _deadline: &Deadline,
    ) -> Result<Vec<StoredHit>> {
        if query.k == 0 {
            return Ok(Vec::new());
        }

        let documents = self.documents.read();
        let rows = self.rows.read();

        let mut hits: Vec<(f32, StoredHit)> = rows
            .iter()
            .filter(|row| row.provider == query.provider && row.vector.len() == query.vector.len())
            .filter_map(|row| {
                let document = documents.get(&row.document_id)?;
                let similarity = cosine_similarity(&query.vector, &row.vector);
                let ranking = similarity + query.section_weights.bonus(row.section);
                Some((
                    ranking,
                    StoredHit {
                        content: row.content.clone(),
                        section: row.section,
                        chunk_index: row.chunk_index,
                        document: document.clone(),
                        similarity,
                    },
                ))
            })
            .collect();

        hits.sort_by(|a, b| b.0.total_cmp(&a.0));
        hits.truncate(query.k);

        Ok(hits.into_iter().map(|(_, hit)| hit).collect())
    }

    async fn save_document(&self, document: &DocumentMeta, _deadline: &Deadline) -> Result<()> {
        self.documents.write().insert(document.id, document.clone());
        Ok(())
    }

    async fn save_chunks_with_embeddings(
        &self,
        document_id: Uuid,
        chunks: &[Chunk],
        embeddings: &[Embedding],
        _deadline: &Deadline,
    ) -> Result<()> {
        if chunks.len() != embeddings.len() {
            return Err(RagError::Storage(format!(
                "{} chunks but {} embeddings for document {}",
                chunks.len(),
                embeddings.len(),
                document_id
            )));
        }
        if !self.documents.read().contains_key(&document_id) {
            return Err(RagError::Storage(format!("unknown document {}", document_id)));
        }

        let mut rows = self.rows.write();
        rows.extend(chunks.iter().zip(embeddings).map(|(chunk, embedding)| ChunkRow {
            document_id,
            content: chunk.content.clone(),
            section: chunk.section,
            chunk_index: chunk.sequence_index,
            vector: embedding.vector.clone(),
            provider: embedding.provider,
        }));

        tracing::debug!("Stored {} chunks for document {}", chunks.len(), document_id);
        Ok(())
    }

    async fn list_documents(&self, _deadline: &Deadline) -> Result<Vec<DocumentSummary>> {
        let documents = self.documents.read();
        let rows = self.rows.read();

        let mut chunk_counts: HashMap<Uuid, usize> = HashMap::new();
        for row in rows.iter() {
            *chunk_counts.entry(row.document_id).or_default() += 1;
        }

        let mut summaries: Vec<DocumentSummary> = documents
            .values()
            .map(|document| DocumentSummary {
                document: document.clone(),
                chunk_count: chunk_counts.get(&document.id).copied().unwrap_or(0),
            })
            .collect();
        summaries.sort_by(|a, b| {
            b.document
                .created_at
                .cmp(&a.document.created_at)
                .then_with(|| a.document.name.cmp(&b.document.name))
        });
        Ok(summaries)
    }

    async fn document_detail(
        &self,
        document_id: Uuid,
        _deadline: &Deadline,
    ) -> Result<Option<DocumentDetail>> {
        let documents = self.documents.read();
        let Some(document) = documents.get(&document_id) else {
            return Ok(None);
        };

        let mut detail = DocumentDetail {
            document: document.clone(),
            chunk_count: 0,
            local_embeddings: 0,
            cloud_embeddings: 0,
            sections: BTreeMap::new(),
        };
        for row in self.rows.read().iter().filter(|row| row.document_id == document_id) {
            detail.chunk_count += 1;
            match row.provider {
                ProviderKind::Local => detail.local_embeddings += 1,
                ProviderKind::Cloud => detail.cloud_embeddings += 1,
            }
            *detail.sections.entry(row.section).or_default() += 1;
        }
        Ok(Some(detail))
    }

    async fn delete_document(&self, document_id: Uuid, _deadline: &Deadline) -> Result<bool> {
        let mut documents = self.documents.write();
        let mut rows = self.rows.write();

        let before = rows.len();
        rows.retain(|row| row.document_id != document_id);
        let removed_chunks = before - rows.len();

        let existed = documents.remove(&document_id).is_some();
        if existed {
            tracing::debug!("Deleted document {} and {} chunks", document_id, removed_chunks);
        }
        Ok(existed)
    }

    async fn stats(&self, _deadline: &Deadline) -> Result<StoreStats> {
        let documents = self.documents.read();
        let rows = self.rows.read();

        let mut stats = StoreStats {
            total_documents: documents.len(),
            total_chunks: rows.len(),
            ..StoreStats::default()
        };
        for document in documents.values() {
            *stats.by_department.entry(document.department.clone()).or_default() += 1;
        }
        for row in rows.iter() {
            match row.provider {
                ProviderKind::Local => stats.local_embeddings += 1,
                ProviderKind::Cloud => stats.cloud_embeddings += 1,
            }
            *stats.by_section.entry(row.section).or_default() += 1;
        }
        Ok(stats)
    }
}
