use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{RagError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub chunking: ChunkingConfig,
    pub search: SearchConfig,
    pub gate: GateConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub audit: AuditConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub top_k: usize,
}

/// Thresholds for the three-stage confidence gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub min_results: usize,
    /// Compared against the combined score (similarity plus section bonus).
    pub min_score: f32,
    pub min_context_chars: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Issue the local and cloud batches concurrently instead of one after the other.
    pub parallel_providers: bool,
    pub cloud: CloudEmbeddingConfig,
    pub local: LocalEmbeddingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudEmbeddingConfig {
    pub base_url: String,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalEmbeddingConfig {
    pub command: String,
    pub args: Vec<String>,
    pub timeout_secs: u64,
    /// Upper bound on embedder processes alive at the same time.
    pub max_concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub primary_model: String,
    pub fallback_model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Also audit questions the confidence gate turned away.
    pub record_rejections: bool,
    pub list_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub request_timeout_secs: u64,
    pub max_question_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 150,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { top_k: 4 }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_results: 2,
            min_score: 0.55,
            min_context_chars: 300,
        }
    }
}

impl Default for CloudEmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "text-embedding-004".to_string(),
            api_key: String::new(),
            timeout_secs: 30,
        }
    }
}

impl Default for LocalEmbeddingConfig {
    fn default() -> Self {
        Self {
            command: "python".to_string(),
            args: vec!["scripts/local_embedder.py".to_string()],
            timeout_secs: 60,
            max_concurrency: 4,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            api_key: String::new(),
            primary_model: "llama-3.1-8b-instant".to_string(),
            fallback_model: "llama-3.1-70b-versatile".to_string(),
            temperature: 0.0,
            timeout_secs: 60,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            record_rejections: false,
            list_limit: 100,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3001".to_string(),
            request_timeout_secs: 120,
            max_question_chars: 4000,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl RagConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(RagError::Config(msg.to_string()));

        if self.chunking.chunk_size == 0 {
            return fail("chunking.chunk_size must be > 0");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return fail("chunking.chunk_overlap must be < chunk_size");
        }
        if self.search.top_k == 0 {
            return fail("search.top_k must be > 0");
        }
        if self.gate.min_results == 0 {
            return fail("gate.min_results must be > 0");
        }
        // Scores carry an additive section bonus on top of cosine similarity.
        if !(0.0..=2.0).contains(&self.gate.min_score) {
            return fail("gate.min_score must be in [0.0, 2.0]");
        }
        if self.embedding.cloud.model.trim().is_empty() {
            return fail("embedding.cloud.model must not be empty");
        }
        if self.embedding.local.command.trim().is_empty() {
            return fail("embedding.local.command must not be empty");
        }
        if self.embedding.local.max_concurrency == 0 {
            return fail("embedding.local.max_concurrency must be > 0");
        }
        if self.embedding.cloud.timeout_secs == 0 || self.embedding.local.timeout_secs == 0 {
            return fail("embedding timeouts must be > 0");
        }
        if self.llm.primary_model.trim().is_empty() || self.llm.fallback_model.trim().is_empty() {
            return fail("llm.primary_model and llm.fallback_model must not be empty");
        }
        if self.llm.timeout_secs == 0 {
            return fail("llm.timeout_secs must be > 0");
        }
        if self.server.request_timeout_secs == 0 {
            return fail("server.request_timeout_secs must be > 0");
        }
        if self.server.max_question_chars == 0 {
            return fail("server.max_question_chars must be > 0");
        }
        Ok(())
    }

    /// Load config from a JSON file, falling back to defaults for missing fields.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RagError::Config(format!("Failed to read config file: {}", e)))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| RagError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay secrets and model ids from the process environment.
    pub fn apply_env(mut self) -> Self {
        self.apply_vars(|key| std::env::var(key).ok());
        self
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("GEMINI_API_KEY") {
            self.embedding.cloud.api_key = key;
        }
        if let Some(key) = non_empty("GROQ_API_KEY") {
            self.llm.api_key = key;
        }
        if let Some(model) = non_empty("LLM_PRIMARY_MODEL") {
            self.llm.primary_model = model;
        }
        if let Some(model) = non_empty("LLM_FALLBACK_MODEL") {
            self.llm.fallback_model = model;
        }
        if let Some(bind) = non_empty("IKB_BIND") {
            self.server.bind = bind;
        }
    }

    /// Build the process-wide config: `IKB_CONFIG` file if set, defaults otherwise,
    /// then environment overrides, then validation.
    pub fn load() -> Result<Self> {
        let base = match std::env::var("IKB_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(&path))?,
            _ => Self::default(),
        };
        let config = base.apply_env();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = RagConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunking.chunk_size, 800);
        assert_eq!(config.chunking.chunk_overlap, 150);
        assert_eq!(config.search.top_k, 4);
        assert_eq!(config.gate.min_results, 2);
        assert_eq!(config.gate.min_score, 0.55);
        assert_eq!(config.gate.min_context_chars, 300);
        assert!(!config.audit.record_rejections);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let mut config = RagConfig::default();
        config.chunking.chunk_overlap = 800;
        assert!(matches!(config.validate(), Err(RagError::Config(_))));
    }

    #[test]
    fn test_from_file_fills_missing_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"gate": {{"min_score": 0.7}}, "search": {{"top_k": 6}}}}"#).unwrap();

        let config = RagConfig::from_file(file.path()).unwrap();
        assert_eq!(config.gate.min_score, 0.7);
        assert_eq!(config.gate.min_results, 2);
        assert_eq!(config.search.top_k, 6);
        assert_eq!(config.chunking.chunk_size, 800);
    }

    #[test]
    fn test_from_file_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"chunking": {{"chunk_size": 100, "chunk_overlap": 100}}}}"#).unwrap();
        assert!(RagConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("GROQ_API_KEY", "gsk-test"),
            ("LLM_PRIMARY_MODEL", "small-model"),
            ("LLM_FALLBACK_MODEL", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = RagConfig::default();
        config.apply_vars(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.llm.api_key, "gsk-test");
        assert_eq!(config.llm.primary_model, "small-model");
        assert_eq!(config.llm.fallback_model, "llama-3.1-70b-versatile");
    }

    #[test]
    fn test_api_keys_are_not_serialized() {
        let mut config = RagConfig::default();
        config.llm.api_key = "secret".to_string();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
