//! Keyword-based topical classification of document text.
//!
//! Rules are evaluated in order and the first rule with any keyword
//! contained in the lowercased text decides the section.

use crate::types::Section;

struct SectionRule {
    section: Section,
    keywords: &'static [&'static str],
}

const SECTION_RULES: &[SectionRule] = &[
    SectionRule {
        section: Section::Safety,
        keywords: &[
            "safety",
            "ppe",
            "hazard",
            "emergency",
            "risk",
            "incident",
            "accident",
            "protective equipment",
        ],
    },
    SectionRule {
        section: Section::Policy,
        keywords: &[
            "policy",
            "rules",
            "guidelines",
            "compliance",
            "code of conduct",
            "regulation",
        ],
    },
    SectionRule {
        section: Section::Procedure,
        keywords: &[
            "procedure",
            "steps",
            "process",
            "workflow",
            "how to",
            "instructions",
        ],
    },
    SectionRule {
        section: Section::Technical,
        keywords: &[
            "architecture",
            "system",
            "technical",
            "implementation",
            "configuration",
            "api",
            "database",
        ],
    },
    SectionRule {
        section: Section::Training,
        keywords: &[
            "training",
            "course",
            "learning",
            "certification",
            "workshop",
            "curriculum",
        ],
    },
];

/// Section of a text span; `General` when no rule matches.
pub fn detect_section(text: &str) -> Section {
    let normalized = text.to_lowercase();

    SECTION_RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|k| normalized.contains(k)))
        .map(|rule| rule.section)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_rule() {
        assert_eq!(detect_section("Wear protective equipment"), Section::Safety);
        assert_eq!(detect_section("Code of Conduct for contractors"), Section::Policy);
        assert_eq!(detect_section("Follow these instructions"), Section::Procedure);
        assert_eq!(detect_section("DATABASE schema"), Section::Technical);
        assert_eq!(detect_section("Annual workshop schedule"), Section::Training);
    }

    #[test]
    fn test_first_rule_wins() {
        // Matches procedure ("steps") and safety ("emergency"); safety is listed first.
        assert_eq!(detect_section("Steps for an emergency shutdown"), Section::Safety);
        // Matches technical ("system") and policy ("rules"); policy comes first.
        assert_eq!(detect_section("System access rules"), Section::Policy);
    }

    #[test]
    fn test_substring_matching() {
        // "api" inside "capital" is a deliberate substring hit.
        assert_eq!(detect_section("Capital expenditure"), Section::Technical);
    }

    #[test]
    fn test_general_fallback_and_determinism() {
        assert_eq!(detect_section("Quarterly revenue summary"), Section::General);
        assert_eq!(detect_section(""), Section::General);
        let text = "Lockout and tagout process";
        assert_eq!(detect_section(text), detect_section(text));
    }
}
