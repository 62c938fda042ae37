pub mod audit;
pub mod config;
pub mod deadline;
pub mod embeddings;
pub mod error;
pub mod llm;
pub mod processing;
pub mod rag;
pub mod rag_engine;
pub mod storage;
pub mod types;

// Re-export primary types for convenience
pub use audit::{AuditEntry, AuditRecord, AuditSink, MemoryAuditSink};
pub use config::RagConfig;
pub use deadline::Deadline;
pub use error::{RagError, Result};
pub use rag::{GateDecision, RejectReason, NOT_FOUND_MESSAGE};
pub use rag_engine::{EngineParts, IngestReport, IngestRequest, RagEngine};
pub use storage::{
    DocumentDetail, DocumentSummary, InMemoryVectorStore, SimilarityQuery, StoreStats, StoredHit,
    VectorStore,
};
pub use types::{
    ChatAnswer, Chunk, DocumentMeta, Embedding, ProviderKind, RetrievalResult,
    RetrievalResultView, Section, SectionWeights,
};

pub use uuid::Uuid;
