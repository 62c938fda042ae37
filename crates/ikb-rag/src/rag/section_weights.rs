//! Question-derived section bias.
//!
//! Unlike document classification, every matching rule contributes its own
//! weight, so a question can favour several sections at once.

use crate::types::{Section, SectionWeights};

/// Bonus applied when the question matches no rule.
pub const DEFAULT_GENERAL_WEIGHT: f32 = 0.05;

struct WeightRule {
    section: Section,
    keywords: &'static [&'static str],
    weight: f32,
}

const WEIGHT_RULES: &[WeightRule] = &[
    WeightRule {
        section: Section::Technical,
        keywords: &["architecture", "system", "technical", "configuration", "stack"],
        weight: 0.15,
    },
    WeightRule {
        section: Section::Procedure,
        keywords: &["procedure", "process", "steps", "how to"],
        weight: 0.12,
    },
    WeightRule {
        section: Section::Safety,
        keywords: &["safety", "hazard", "risk", "emergency"],
        weight: 0.12,
    },
    WeightRule {
        section: Section::Policy,
        keywords: &["policy", "compliance", "regulation"],
        weight: 0.10,
    },
    WeightRule {
        section: Section::Training,
        keywords: &["training", "course", "certification", "learning"],
        weight: 0.10,
    },
];

pub fn detect_section_weights(question: &str) -> SectionWeights {
    let q = question.to_lowercase();

    let weights: SectionWeights = WEIGHT_RULES
        .iter()
        .filter(|rule| rule.keywords.iter().any(|k| q.contains(k)))
        .map(|rule| (rule.section, rule.weight))
        .collect();

    if weights.is_empty() {
        [(Section::General, DEFAULT_GENERAL_WEIGHT)].into_iter().collect()
    } else {
        weights
    }
}
