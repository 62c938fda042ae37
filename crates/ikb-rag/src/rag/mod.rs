//! Question-time pipeline: section weighting, hybrid retrieval and the evidence gate.

pub mod gate;
pub mod retrieval;
pub mod section_weights;

pub use gate::{ConfidenceGate, GateDecision, RejectReason, NOT_FOUND_MESSAGE};
pub use retrieval::RetrievalEngine;
pub use section_weights::detect_section_weights;
