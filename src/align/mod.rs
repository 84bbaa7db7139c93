//! Vocabulary alignment.
//!
//! Stages, in pipeline order:
//! - `align`: target token → donor id sequence (exact match or re-tokenization)
//! - `apply_overrides`: user-supplied mappings replace automatic ones
//! - `resolve_special_tokens`: bos/eos/pad cross-model assignment
//!
//! ```text
//! Vocabulary ──▶ align ──▶ apply_overrides ──▶ resolve_special_tokens ──▶ TokenMapping
//! ```

pub mod aligner;
pub mod mapping;
pub mod overrides;
pub mod special;

pub use aligner::align;
pub use mapping::{MappingEntry, MappingSource, TokenMapping};
pub use overrides::apply_overrides;
pub use special::{resolve_special_tokens, BosHandling, RoleStatus, SpecialResolution, SpecialTokenSet};
