use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::audit::{AuditEntry, AuditMetadata, AuditRecord, AuditSink, MemoryAuditSink};
use crate::config::RagConfig;
use crate::deadline::Deadline;
use crate::embeddings::{CloudEmbedder, EmbeddingProvider, EmbeddingRouter, LocalEmbedder};
use crate::error::{RagError, Result};
use crate::llm::{AnswerGenerator, ChatModel, OpenAiCompatibleClient};
use crate::processing::{contains_masked_pii, mask_pii, TextChunker};
use crate::rag::gate::{ConfidenceGate, GateDecision, RejectReason, NOT_FOUND_MESSAGE};
use crate::rag::retrieval::RetrievalEngine;
use crate::rag::section_weights::detect_section_weights;
use crate::storage::{
    DocumentDetail, DocumentSummary, InMemoryVectorStore, StoreStats, VectorStore,
};
use crate::types::{ChatAnswer, DocumentMeta, ProviderKind, RetrievalResultView, SectionWeights};

/// External collaborators the engine is assembled from.
pub struct EngineParts {
    pub local_embedder: Arc<dyn EmbeddingProvider>,
    pub cloud_embedder: Arc<dyn EmbeddingProvider>,
    pub chat: Arc<dyn ChatModel>,
    pub store: Arc<dyn VectorStore>,
    pub audit: Arc<dyn AuditSink>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestRequest {
    pub name: String,
    pub text: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub doc_type: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub uploaded_by: Option<String>,
}

impl IngestRequest {
    fn document_meta(&self) -> DocumentMeta {
        let mut meta = DocumentMeta::new(self.name.trim());
        let fields = [
            (&mut meta.department, &self.department),
            (&mut meta.doc_type, &self.doc_type),
            (&mut meta.version, &self.version),
            (&mut meta.status, &self.status),
            (&mut meta.uploaded_by, &self.uploaded_by),
        ];
        for (slot, value) in fields {
            if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                *slot = v.to_string();
            }
        }
        meta
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub document_id: Uuid,
    /// Length of the submitted text, in characters.
    pub characters: usize,
    pub chunks: usize,
    pub local_chunks: usize,
    pub cloud_chunks: usize,
}

pub struct RagEngine {
    chunker: TextChunker,
    router: EmbeddingRouter,
    retrieval: RetrievalEngine,
    gate: ConfidenceGate,
    generator: AnswerGenerator,
    store: Arc<dyn VectorStore>,
    audit: Arc<dyn AuditSink>,
    record_rejections: bool,
    audit_list_limit: usize,
    max_question_chars: usize,
}

impl RagEngine {
    pub fn new(config: &RagConfig, parts: EngineParts) -> Result<Self> {
        config.validate()?;

        let chunker = TextChunker::from_config(&config.chunking)?;
        let router = EmbeddingRouter::new(
            parts.local_embedder,
            parts.cloud_embedder,
            config.embedding.parallel_providers,
        );
        let retrieval = RetrievalEngine::new(router.cloud(), parts.store.clone(), config.search.top_k);

        tracing::info!(
            top_k = config.search.top_k,
            min_results = config.gate.min_results,
            min_score = config.gate.min_score,
            min_context_chars = config.gate.min_context_chars,
            parallel_providers = config.embedding.parallel_providers,
            "RAG engine initialized"
        );

        Ok(Self {
            chunker,
            router,
            retrieval,
            gate: ConfidenceGate::new(&config.gate),
            generator: AnswerGenerator::from_config(parts.chat, &config.llm),
            store: parts.store,
            audit: parts.audit,
            record_rejections: config.audit.record_rejections,
            audit_list_limit: config.audit.list_limit,
            max_question_chars: config.server.max_question_chars,
        })
    }

    /// Production wiring: HTTP cloud embedder, subprocess local embedder,
    /// OpenAI-compatible chat client, in-memory store and audit trail.
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let parts = EngineParts {
            local_embedder: Arc::new(LocalEmbedder::new(&config.embedding.local)),
            cloud_embedder: Arc::new(CloudEmbedder::new(&config.embedding.cloud)?),
            chat: Arc::new(OpenAiCompatibleClient::new(&config.llm)?),
            store: Arc::new(InMemoryVectorStore::new()),
            audit: Arc::new(MemoryAuditSink::new()),
        };
        Self::new(config, parts)
    }

    /// Answer `question` strictly from the ingested corpus.
    ///
    /// Insufficient evidence is not an error: the fixed not-found answer comes
    /// back with an empty retrieval list.
    pub async fn answer(&self, question: &str, deadline: &Deadline) -> Result<ChatAnswer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::Validation("Question is required".to_string()));
        }
        let length = question.chars().count();
        if length > self.max_question_chars {
            return Err(RagError::Validation(format!(
                "Question is too long ({} characters, limit {})",
                length, self.max_question_chars
            )));
        }

        let weights = detect_section_weights(question);
        tracing::debug!(?weights, "Section weights");

        let results = self.retrieval.retrieve(question, &weights, deadline).await?;

        let context = match self.gate.evaluate(&results) {
            GateDecision::Accept { context } => context,
            GateDecision::Reject { reason } => {
                if self.record_rejections {
                    self.record_rejection(question, &weights, reason, deadline)
                        .await?;
                }
                return Ok(ChatAnswer {
                    answer: NOT_FOUND_MESSAGE.to_string(),
                    retrieval: Vec::new(),
                });
            }
        };

        let answer = self.generator.generate(question, &context, deadline).await?;
        let retrieval = RetrievalResultView::from_results(&context);

        let entry = AuditEntry {
            question: question.to_string(),
            answer: answer.clone(),
            retrieved_documents: retrieval.clone(),
            metadata: AuditMetadata {
                section_weights: weights,
                result_count: retrieval.len(),
                rejection: None,
            },
        };
        deadline
            .run("audit", self.audit.record(entry, deadline))
            .await?;

        Ok(ChatAnswer { answer, retrieval })
    }

    async fn record_rejection(
        &self,
        question: &str,
        weights: &SectionWeights,
        reason: RejectReason,
        deadline: &Deadline,
    ) -> Result<()> {
        let entry = AuditEntry {
            question: question.to_string(),
            answer: NOT_FOUND_MESSAGE.to_string(),
            retrieved_documents: Vec::new(),
            metadata: AuditMetadata {
                section_weights: weights.clone(),
                result_count: 0,
                rejection: Some(reason),
            },
        };
        deadline
            .run("audit", self.audit.record(entry, deadline))
            .await?;
        Ok(())
    }

    /// Mask, chunk, embed and store one document.
    ///
    /// Nothing is written to the store unless every chunk was embedded, and a
    /// document whose chunks fail to save is removed again.
    pub async fn ingest(&self, request: IngestRequest, deadline: &Deadline) -> Result<IngestReport> {
        if request.name.trim().is_empty() {
            return Err(RagError::Validation("Document name is required".to_string()));
        }
        if request.text.trim().is_empty() {
            return Err(RagError::Validation("Document text is required".to_string()));
        }

        let masked = mask_pii(&request.text);
        if masked.has_pii() {
            tracing::info!("Masked {} PII spans in '{}'", masked.masked, request.name.trim());
        }

        let mut chunks = self.chunker.chunk(&masked.text);
        for chunk in chunks.iter_mut() {
            chunk.sensitive = contains_masked_pii(&chunk.content);
        }

        let embeddings = self.router.embed_chunks(&chunks, deadline).await?;

        let document = request.document_meta();
        deadline
            .run("save document", self.store.save_document(&document, deadline))
            .await?;
        let saved = deadline
            .run(
                "save chunks",
                self.store
                    .save_chunks_with_embeddings(document.id, &chunks, &embeddings, deadline),
            )
            .await;
        if let Err(err) = saved {
            tracing::warn!(
                error = %err,
                "Saving chunks of '{}' failed, removing document",
                document.name
            );
            // Runs even when the deadline has passed so no chunkless document survives.
            if let Err(cleanup) = self.store.delete_document(document.id, deadline).await {
                tracing::error!(error = %cleanup, "Failed to remove document {}", document.id);
            }
            return Err(err);
        }

        let local_chunks = embeddings
            .iter()
            .filter(|e| e.provider == ProviderKind::Local)
            .count();
        let report = IngestReport {
            document_id: document.id,
            characters: request.text.chars().count(),
            chunks: chunks.len(),
            local_chunks,
            cloud_chunks: chunks.len() - local_chunks,
        };

        tracing::info!(
            "Ingested document '{}' ({} chunks, {} local, {} cloud)",
            document.name,
            report.chunks,
            report.local_chunks,
            report.cloud_chunks
        );

        Ok(report)
    }

    /// Stored documents, newest first.
    pub async fn list_documents(&self, deadline: &Deadline) -> Result<Vec<DocumentSummary>> {
        deadline
            .run("list documents", self.store.list_documents(deadline))
            .await
    }

    pub async fn document(&self, id: Uuid, deadline: &Deadline) -> Result<Option<DocumentDetail>> {
        deadline
            .run("document detail", self.store.document_detail(id, deadline))
            .await
    }

    /// Returns `false` when the document does not exist.
    pub async fn delete_document(&self, id: Uuid, deadline: &Deadline) -> Result<bool> {
        let deleted = deadline
            .run("delete document", self.store.delete_document(id, deadline))
            .await?;
        if deleted {
            tracing::info!("Deleted document {}", id);
        }
        Ok(deleted)
    }

    pub async fn stats(&self, deadline: &Deadline) -> Result<StoreStats> {
        deadline.run("store stats", self.store.stats(deadline)).await
    }

    /// Most recent audit records, newest first.
    pub async fn audit_log(&self) -> Result<Vec<AuditRecord>> {
        self.audit.recent(self.audit_list_limit).await
    }
}
