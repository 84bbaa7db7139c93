//! vocab-transplant: move a donor model onto a target model's vocabulary.
//!
//! The donor's transformer weights are kept; its input embedding and output
//! head are rebuilt row by row for the target tokenizer, without any
//! training. The result shares the target's vocabulary and can serve as a
//! draft model for speculative decoding against the target.
//!
//! - Token alignment: exact match, donor re-tokenization, unknown-token fallback
//! - Manual overrides and bos/eos/pad resolution
//! - Embedding synthesis: last subtoken for input rows, front-loaded weighted
//!   mean for head rows

pub mod config;
pub mod error;

pub mod align;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod transplant;
pub mod vocab;

pub use align::{
    align, apply_overrides, resolve_special_tokens, BosHandling, MappingEntry, MappingSource,
    RoleStatus, SpecialResolution, SpecialTokenSet, TokenMapping,
};
pub use config::{DecayFactor, TokenOverride, TransplantConfig};
pub use error::{Error, Result};
pub use model::{DonorWeights, HfConfig, ModelFiles, ModelTokenizer, ModelWriter};
pub use pipeline::{AlignedVocabulary, TransplantOutput, VocabTransplant};
pub use report::{MappingRecord, Outcome, TransplantReport, TransplantStats};
pub use transplant::{ensure_compatible, transplant, weights, TransplantedEmbeddings};
pub use vocab::{DonorTokenizer, HfTokenizer, SpecialRole, SpecialTokenIds, VocabEntry, Vocabulary};
