use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Coarse topical label attached to chunks and used to bias ranking.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Section {
    Safety,
    Policy,
    Procedure,
    Technical,
    Training,
    Compliance,
    #[default]
    General,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safety => "safety",
            Self::Policy => "policy",
            Self::Procedure => "procedure",
            Self::Technical => "technical",
            Self::Training => "training",
            Self::Compliance => "compliance",
            Self::General => "general",
        }
    }

    /// Labels a store may hand back; anything unknown reads as `General`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "safety" => Self::Safety,
            "policy" => Self::Policy,
            "procedure" => Self::Procedure,
            "technical" => Self::Technical,
            "training" => Self::Training,
            "compliance" => Self::Compliance,
            _ => Self::General,
        }
    }

    /// Sections whose text never leaves the premises for embedding.
    pub fn is_sensitive(&self) -> bool {
        matches!(self, Self::Policy | Self::Safety | Self::Compliance)
    }
}

impl From<String> for Section {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic retrievable unit produced at ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub section: Section,
    pub sequence_index: usize,
    /// Character offset of the window this chunk was cut from.
    pub start_offset: usize,
    /// PII/compliance flag; forces local embedding.
    pub sensitive: bool,
}

impl Chunk {
    pub fn routes_locally(&self) -> bool {
        self.sensitive || self.section.is_sensitive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Local,
    Cloud,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Cloud => "cloud",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit-norm vector with the provider that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub provider: ProviderKind,
}

/// Per-question additive ranking bonus, keyed by section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionWeights(BTreeMap<Section, f32>);

impl SectionWeights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, section: Section, weight: f32) {
        self.0.insert(section, weight);
    }

    /// Bonus for `section`, zero when the question expressed no preference for it.
    pub fn bonus(&self, section: Section) -> f32 {
        self.0.get(&section).copied().unwrap_or(0.0)
    }

    pub fn get(&self, section: Section) -> Option<f32> {
        self.0.get(&section).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Section, f32)> for SectionWeights {
    fn from_iter<I: IntoIterator<Item = (Section, f32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Document-level metadata attached to every chunk of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub id: Uuid,
    pub name: String,
    pub department: String,
    pub doc_type: String,
    pub version: String,
    pub status: String,
    pub uploaded_by: String,
    pub created_at: DateTime<Utc>,
}

impl DocumentMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            department: "general".to_string(),
            doc_type: "general".to_string(),
            version: "v1.0".to_string(),
            status: "active".to_string(),
            uploaded_by: "system".to_string(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub content: String,
    pub score: f32,
    pub section: Section,
    pub document: DocumentMeta,
    pub chunk_index: usize,
}

const PREVIEW_CHARS: usize = 200;

/// Client-facing view of one retrieved chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResultView {
    pub rank: usize,
    pub score: f32,
    pub document: DocumentView,
    pub chunk: ChunkView,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentView {
    pub id: Uuid,
    pub name: String,
    pub department: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub version: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkView {
    pub index: usize,
    pub section: Section,
    pub preview: String,
}

impl RetrievalResultView {
    /// `rank` is 1-based.
    pub fn from_result(rank: usize, result: &RetrievalResult) -> Self {
        let preview: String = result.content.chars().take(PREVIEW_CHARS).collect();
        Self {
            rank,
            score: result.score,
            document: DocumentView {
                id: result.document.id,
                name: result.document.name.clone(),
                department: result.document.department.clone(),
                doc_type: result.document.doc_type.clone(),
                version: result.document.version.clone(),
                status: result.document.status.clone(),
            },
            chunk: ChunkView {
                index: result.chunk_index,
                section: result.section,
                preview: format!("{}...", preview),
            },
        }
    }

    pub fn from_results(results: &[RetrievalResult]) -> Vec<Self> {
        results
            .iter()
            .enumerate()
            .map(|(i, r)| Self::from_result(i + 1, r))
            .collect()
    }
}

/// Response to a question, whether answered or turned away by the gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatAnswer {
    pub answer: String,
    pub retrieval: Vec<RetrievalResultView>,
}

/// Round to 4 decimal places, the precision scores are reported with.
pub fn round_score(score: f32) -> f32 {
    (score * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(content: &str) -> RetrievalResult {
        RetrievalResult {
            content: content.to_string(),
            score: 0.8123,
            section: Section::Safety,
            document: DocumentMeta::new("manual.pdf"),
            chunk_index: 3,
        }
    }

    #[test]
    fn test_section_serde_lowercase_and_unknown() {
        assert_eq!(serde_json::to_string(&Section::Safety).unwrap(), "\"safety\"");
        let parsed: Section = serde_json::from_str("\"maintenance\"").unwrap();
        assert_eq!(parsed, Section::General);
        assert_eq!(Section::from_label(" Policy "), Section::Policy);
        assert_eq!(Section::from_label(""), Section::General);
    }

    #[test]
    fn test_sensitive_sections() {
        assert!(Section::Policy.is_sensitive());
        assert!(Section::Safety.is_sensitive());
        assert!(Section::Compliance.is_sensitive());
        assert!(!Section::Technical.is_sensitive());
        assert!(!Section::General.is_sensitive());
    }

    #[test]
    fn test_section_weights_serialize_as_map() {
        let weights: SectionWeights = [(Section::Technical, 0.15), (Section::Safety, 0.12)]
            .into_iter()
            .collect();
        let json = serde_json::to_value(&weights).unwrap();
        assert_eq!(json["technical"], serde_json::json!(0.15f32));
        assert_eq!(weights.bonus(Section::Policy), 0.0);
        assert_eq!(weights.get(Section::Safety), Some(0.12));
    }

    #[test]
    fn test_view_preview_truncates_to_200_chars() {
        let long = "é".repeat(250);
        let view = RetrievalResultView::from_result(1, &result(&long));
        assert_eq!(view.chunk.preview.chars().count(), 203);
        assert!(view.chunk.preview.ends_with("..."));

        let short = RetrievalResultView::from_result(2, &result("short"));
        assert_eq!(short.chunk.preview, "short...");
        assert_eq!(short.rank, 2);
    }

    #[test]
    fn test_view_serializes_document_type() {
        let view = RetrievalResultView::from_result(1, &result("text"));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["document"]["type"], "general");
        assert_eq!(json["chunk"]["section"], "safety");
        assert_eq!(json["chunk"]["index"], 3);
    }

    #[test]
    fn test_round_score() {
        assert_eq!(round_score(0.812_345), 0.8123);
        assert_eq!(round_score(0.55), 0.55);
    }
}
