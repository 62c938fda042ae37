use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{RagError, Result};

/// Per-request time budget threaded through every external call.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Await `fut`, failing with [`RagError::Timeout`] naming `stage` once the deadline passes.
    /// The future is dropped on expiry, which cancels it.
    pub async fn run<T, F>(&self, stage: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout_at(self.at, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Deadline exceeded during {}", stage);
                Err(RagError::Timeout(stage.to_string()))
            }
        }
    }
}
