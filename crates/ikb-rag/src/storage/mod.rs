//! Vector store boundary.
//!
//! The core hands the store a typed [`SimilarityQuery`]; how section weights
//! are applied inside the backend is the backend's business.

pub mod memory;

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::deadline::Deadline;
use crate::error::Result;
use crate::types::{Chunk, DocumentMeta, Embedding, ProviderKind, Section, SectionWeights};

pub use memory::InMemoryVectorStore;

#[derive(Debug, Clone)]
pub struct SimilarityQuery {
    /// Unit-norm query vector.
    pub vector: Vec<f32>,
    pub k: usize,
    pub section_weights: SectionWeights,
    /// Only embeddings produced by this provider are comparable with `vector`.
    pub provider: ProviderKind,
}

/// One candidate row returned by the store, before hybrid scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredHit {
    pub content: String,
    pub section: Section,
    pub chunk_index: usize,
    pub document: DocumentMeta,
    /// `1 - cosine_distance`.
    pub similarity: f32,
}

/// A stored document with the number of chunks indexed under it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSummary {
    #[serde(flatten)]
    pub document: DocumentMeta,
    pub chunk_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentDetail {
    #[serde(flatten)]
    pub document: DocumentMeta,
    pub chunk_count: usize,
    pub local_embeddings: usize,
    pub cloud_embeddings: usize,
    pub sections: BTreeMap<Section, usize>,
}

/// Corpus-wide counts. The local/cloud split shows where sensitive text was embedded.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreStats {
    pub total_documents: usize,
    pub total_chunks: usize,
    pub local_embeddings: usize,
    pub cloud_embeddings: usize,
    pub by_department: BTreeMap<String, usize>,
    pub by_section: BTreeMap<Section, usize>,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn similarity_search(
        &self,
        query: &SimilarityQuery,
        deadline: &Deadline,
    ) -> Result<Vec<StoredHit>>;

    async fn save_document(&self, document: &DocumentMeta, deadline: &Deadline) -> Result<()>;

    /// `chunks` and `embeddings` must line up one-to-one.
    async fn save_chunks_with_embeddings(
        &self,
        document_id: Uuid,
        chunks: &[Chunk],
        embeddings: &[Embedding],
        deadline: &Deadline,
    ) -> Result<()>;

    /// Newest first.
    async fn list_documents(&self, deadline: &Deadline) -> Result<Vec<DocumentSummary>>;

    async fn document_detail(
        &self,
        document_id: Uuid,
        deadline: &Deadline,
    ) -> Result<Option<DocumentDetail>>;

    /// Removes the document together with its chunks and embeddings.
    /// Returns `false` when no such document exists.
    async fn delete_document(&self, document_id: Uuid, deadline: &Deadline) -> Result<bool>;

    async fn stats(&self, deadline: &Deadline) -> Result<StoreStats>;
}
