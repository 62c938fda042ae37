//! Deterministic evidence gate in front of answer generation.
//!
//! Three checks run in order (volume, confidence, coverage) and the first
//! failing one rejects. A rejection is a normal outcome, not an error.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::GateConfig;
use crate::types::RetrievalResult;

/// Fixed answer returned whenever the gate rejects.
pub const NOT_FOUND_MESSAGE: &str =
    "The requested information is not found in the provided documents.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    TooFewResults,
    LowConfidence,
    InsufficientContext,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TooFewResults => "too_few_results",
            Self::LowConfidence => "low_confidence",
            Self::InsufficientContext => "insufficient_context",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// Results that passed the confidence filter, in ranked order.
    Accept { context: Vec<RetrievalResult> },
    Reject { reason: RejectReason },
}

impl GateDecision {
    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ConfidenceGate {
    min_results: usize,
    min_score: f32,
    min_context_chars: usize,
}

impl ConfidenceGate {
    pub fn new(config: &GateConfig) -> Self {
        Self {
            min_results: config.min_results,
            min_score: config.min_score,
            min_context_chars: config.min_context_chars,
        }
    }

    pub fn evaluate(&self, results: &[RetrievalResult]) -> GateDecision {
        if results.len() < self.min_results {
            return self.reject(RejectReason::TooFewResults, results.len());
        }

        let filtered: Vec<RetrievalResult> = results
            .iter()
            .filter(|r| r.score >= self.min_score)
            .cloned()
            .collect();
        if filtered.is_empty() {
            return self.reject(RejectReason::LowConfidence, results.len());
        }

        let combined = filtered
            .iter()
            .map(|r| r.content.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        if combined.chars().count() < self.min_context_chars {
            return self.reject(RejectReason::InsufficientContext, results.len());
        }

        tracing::debug!(
            "Gate accepted {} of {} results",
            filtered.len(),
            results.len()
        );
        GateDecision::Accept { context: filtered }
    }

    fn reject(&self, reason: RejectReason, result_count: usize) -> GateDecision {
        tracing::info!(stage = reason.as_str(), result_count, "Confidence gate rejected question");
        GateDecision::Reject { reason }
    }
}

impl Default for ConfidenceGate {
    fn default() -> Self {
        Self::new(&GateConfig::default())
    }
}
