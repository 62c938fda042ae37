pub mod chunker;
pub mod pii;
pub mod sections;

pub use chunker::TextChunker;
pub use pii::{contains_masked_pii, mask_pii, MaskedText};
pub use sections::detect_section;
