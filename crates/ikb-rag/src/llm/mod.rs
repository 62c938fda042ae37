//! Chat model access and grounded answer generation.

pub mod generator;
pub mod openai_compatible;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::deadline::Deadline;
use crate::error::Result;

pub use generator::AnswerGenerator;
pub use openai_compatible::OpenAiCompatibleClient;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
}

/// A hosted chat-completion backend. The model id is chosen per call so one
/// client can serve both generation tiers.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        deadline: &Deadline,
    ) -> Result<String>;
}
