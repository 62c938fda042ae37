//! PII masking applied to document text before chunking.
//!
//! Masked spans are replaced with bracketed placeholders. Chunks that carry a
//! placeholder are flagged sensitive so their embeddings stay local.

use std::sync::LazyLock;

static EMAIL_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")
        .expect("email regex is valid")
});
static NATIONAL_ID_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("national id regex is valid")
});
static PHONE_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?:\+\d{1,3}[\s.-]?)?\(?\d{3}\)?[\s.-]\d{3}[\s.-]\d{4}\b")
        .expect("phone regex is valid")
});

pub const EMAIL_PLACEHOLDER: &str = "[EMAIL]";
pub const ID_PLACEHOLDER: &str = "[ID]";
pub const PHONE_PLACEHOLDER: &str = "[PHONE]";

#[derive(Debug, Clone, PartialEq)]
pub struct MaskedText {
    pub text: String,
    /// Number of spans replaced.
    pub masked: usize,
}

impl MaskedText {
    pub fn has_pii(&self) -> bool {
        self.masked > 0
    }
}

pub fn mask_pii(text: &str) -> MaskedText {
    let mut masked = 0;
    let mut current = text.to_string();

    for (re, placeholder) in [
        (&*EMAIL_RE, EMAIL_PLACEHOLDER),
        (&*NATIONAL_ID_RE, ID_PLACEHOLDER),
        (&*PHONE_RE, PHONE_PLACEHOLDER),
    ] {
        let hits = re.find_iter(&current).count();
        if hits > 0 {
            masked += hits;
            current = re.replace_all(&current, placeholder).into_owned();
        }
    }

    MaskedText {
        text: current,
        masked,
    }
}

/// Whether `text` carries a placeholder left by [`mask_pii`].
pub fn contains_masked_pii(text: &str) -> bool {
    [EMAIL_PLACEHOLDER, ID_PLACEHOLDER, PHONE_PLACEHOLDER]
        .iter()
        .any(|p| text.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks_email_phone_and_id() {
        let masked = mask_pii(
            "Contact j.doe@plant.example.com or +1 555-123-4567. Employee SSN 123-45-6789.",
        );
        assert_eq!(
            masked.text,
            "Contact [EMAIL] or [PHONE]. Employee SSN [ID]."
        );
        assert_eq!(masked.masked, 3);
        assert!(masked.has_pii());
        assert!(contains_masked_pii(&masked.text));
    }

    #[test]
    fn test_leaves_dates_and_part_numbers_alone() {
        let text = "Inspected on 2024-01-15, replaced part 4471-22 at 14:30.";
        let masked = mask_pii(text);
        assert_eq!(masked.text, text);
        assert!(!masked.has_pii());
        assert!(!contains_masked_pii(text));
    }
}
