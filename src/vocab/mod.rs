//! Vocabulary model.
//!
//! This module contains:
//! - `Vocabulary`: id ↔ token tables for one model
//! - `DonorTokenizer`: the re-tokenization capability the aligner depends on
//! - `HfTokenizer`: `DonorTokenizer` over a HuggingFace `tokenizer.json`
//! - `SpecialTokenIds`: declared bos/eos/pad ids of one model

pub mod special;
pub mod tokenizer;
pub mod vocabulary;

pub use special::{SpecialRole, SpecialTokenIds};
pub use tokenizer::{DonorTokenizer, HfTokenizer};
pub use vocabulary::{VocabEntry, Vocabulary};
