//! Grounded answer generation with a single fallback tier.

use std::sync::Arc;

use super::{ChatMessage, ChatModel};
use crate::config::LlmConfig;
use crate::deadline::Deadline;
use crate::error::Result;
use crate::types::RetrievalResult;

const SYSTEM_PROMPT: &str = "\
You are an enterprise knowledge assistant helping users find information from uploaded documents.

Rules:
- Use ONLY information explicitly stated in the provided context.
- If the context does not contain the answer, reply exactly: \"The requested information is not found in the provided documents.\"
- Never invent facts, procedures or technical specifications.
- Never answer from general knowledge that is not in the context.
- If the context only partially answers the question, say which parts are missing.
- Cite the source numbers you relied on when possible.";

/// Number the accepted results as `Source N:` blocks separated by blank lines.
pub fn build_context(results: &[RetrievalResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("Source {}:\n{}", i + 1, r.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_messages(context: &str, question: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(format!("Context:\n{}\n\nQuestion:\n{}", context, question)),
    ]
}

pub struct AnswerGenerator {
    model: Arc<dyn ChatModel>,
    primary_model: String,
    fallback_model: String,
}

impl AnswerGenerator {
    pub fn new(
        model: Arc<dyn ChatModel>,
        primary_model: impl Into<String>,
        fallback_model: impl Into<String>,
    ) -> Self {
        Self {
            model,
            primary_model: primary_model.into(),
            fallback_model: fallback_model.into(),
        }
    }

    pub fn from_config(model: Arc<dyn ChatModel>, config: &LlmConfig) -> Self {
        Self::new(model, config.primary_model.clone(), config.fallback_model.clone())
    }

    pub async fn generate(
        &self,
        question: &str,
        results: &[RetrievalResult],
        deadline: &Deadline,
    ) -> Result<String> {
        let context = build_context(results);
        let messages = build_messages(&context, question);

        match self.model.complete(&self.primary_model, &messages, deadline).await {
            Ok(answer) => Ok(answer),
            Err(primary_err) if deadline.is_expired() => {
                tracing::warn!(
                    model = %self.primary_model,
                    error = %primary_err,
                    "Primary model failed with no time left for fallback"
                );
                Err(primary_err)
            }
            Err(primary_err) => {
                tracing::warn!(
                    model = %self.primary_model,
                    error = %primary_err,
                    "Primary model failed, trying fallback"
                );
                self.model
                    .complete(&self.fallback_model, &messages, deadline)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RagError;
    use crate::llm::ChatRole;
    use crate::types::{DocumentMeta, Section};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Fails for the models listed in `failing`, answers `"{model} answer"` otherwise.
    struct ScriptedModel {
        failing: Vec<&'static str>,
        calls: Mutex<Vec<(String, Vec<ChatMessage>)>>,
    }

    impl ScriptedModel {
        fn new(failing: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                failing,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(
            &self,
            model: &str,
            messages: &[ChatMessage],
            _deadline: &Deadline,
        ) -> Result<String> {
            self.calls.lock().push((model.to_string(), messages.to_vec()));
            if self.failing.iter().any(|m| *m == model) {
                return Err(RagError::provider("llm", format!("{} is overloaded", model)));
            }
            Ok(format!("{} answer", model))
        }
    }

    fn result(content: &str) -> RetrievalResult {
        RetrievalResult {
            content: content.to_string(),
            score: 0.8,
            section: Section::Procedure,
            document: DocumentMeta::new("sop.pdf"),
            chunk_index: 0,
        }
    }

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(5))
    }

    #[test]
    fn test_context_format() {
        let context = build_context(&[result("first"), result("second")]);
        assert_eq!(context, "Source 1:\nfirst\n\nSource 2:\nsecond");
    }

    #[test]
    fn test_messages_layout() {
        let messages = build_messages("Source 1:\nx", "How?");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::System);
        assert!(messages[0]
            .content
            .contains("The requested information is not found in the provided documents."));
        assert_eq!(messages[1].role, ChatRole::User);
        assert_eq!(messages[1].content, "Context:\nSource 1:\nx\n\nQuestion:\nHow?");
    }

    #[tokio::test]
    async fn test_primary_answer_is_returned() {
        let model = ScriptedModel::new(vec![]);
        let generator = AnswerGenerator::new(model.clone(), "small", "large");
        let answer = generator
            .generate("q", &[result("a")], &deadline())
            .await
            .unwrap();

        assert_eq!(answer, "small answer");
        assert_eq!(model.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_fallback_gets_identical_messages() {
        let model = ScriptedModel::new(vec!["small"]);
        let generator = AnswerGenerator::new(model.clone(), "small", "large");
        let answer = generator
            .generate("q", &[result("a"), result("b")], &deadline())
            .await
            .unwrap();

        assert_eq!(answer, "large answer");
        let calls = model.calls.lock();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "small");
        assert_eq!(calls[1].0, "large");
        assert_eq!(calls[0].1, calls[1].1);
    }

    #[tokio::test]
    async fn test_fallback_failure_propagates_after_one_attempt() {
        let model = ScriptedModel::new(vec!["small", "large"]);
        let generator = AnswerGenerator::new(model.clone(), "small", "large");
        let err = generator
            .generate("q", &[result("a")], &deadline())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("large is overloaded"));
        assert_eq!(model.calls.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_no_fallback_once_deadline_has_passed() {
        let model = ScriptedModel::new(vec!["small"]);
        let generator = AnswerGenerator::new(model.clone(), "small", "large");
        let err = generator
            .generate("q", &[result("a")], &Deadline::after(Duration::ZERO))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("small is overloaded"));
        assert_eq!(model.calls.lock().len(), 1);
    }
}
