//! Donor-side tokenization.
//!
//! The aligner never talks to a concrete tokenizer. It needs only the
//! `DonorTokenizer` capability, so tests can substitute a deterministic fake.

use std::path::Path;

use tokenizers::Tokenizer;

use crate::error::{Error, Result};

/// Unknown-token spellings probed when the tokenizer config names none.
const UNKNOWN_CANDIDATES: [&str; 4] = ["<unk>", "[UNK]", "<|unk|>", "<|endoftext|>"];

/// Re-tokenization capability of the donor model.
pub trait DonorTokenizer {
    /// Tokenizes arbitrary text exactly as the donor model would, without
    /// adding special tokens.
    fn tokenize(&self, text: &str) -> Result<Vec<u32>>;

    /// Id of a single vocabulary piece.
    fn token_to_id(&self, piece: &str) -> Option<u32>;

    /// Piece for an id.
    fn id_to_token(&self, id: u32) -> Option<String>;

    /// Decodes ids to text, keeping special tokens.
    fn decode(&self, ids: &[u32]) -> Result<String>;

    /// Fallback id for text that tokenizes to nothing.
    fn unknown_token_id(&self) -> Option<u32>;
}

/// `DonorTokenizer` over a HuggingFace `tokenizers::Tokenizer`.
#[derive(Clone)]
pub struct HfTokenizer {
    inner: Tokenizer,
    unknown_id: Option<u32>,
}

impl HfTokenizer {
    /// Wraps a loaded tokenizer, probing common unknown-token spellings.
    pub fn new(inner: Tokenizer) -> Self {
        let unknown_id = UNKNOWN_CANDIDATES
            .iter()
            .find_map(|piece| inner.token_to_id(piece));
        Self { inner, unknown_id }
    }

    /// Loads `tokenizer.json`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let inner = Tokenizer::from_file(path).map_err(|e| {
            Error::ModelLoad(format!("Failed to load tokenizer {}: {e}", path.display()))
        })?;
        Ok(Self::new(inner))
    }

    /// Uses `piece` as the unknown token if it is in the vocabulary.
    pub fn with_unknown_token(mut self, piece: &str) -> Self {
        if let Some(id) = self.inner.token_to_id(piece) {
            self.unknown_id = Some(id);
        }
        self
    }

    /// The wrapped tokenizer.
    pub fn inner(&self) -> &Tokenizer {
        &self.inner
    }
}

impl std::fmt::Debug for HfTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HfTokenizer")
            .field("vocab_size", &self.inner.get_vocab_size(true))
            .field("unknown_id", &self.unknown_id)
            .finish()
    }
}

impl DonorTokenizer for HfTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| Error::Tokenization(format!("Failed to encode {text:?}: {e}")))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn token_to_id(&self, piece: &str) -> Option<u32> {
        self.inner.token_to_id(piece)
    }

    fn id_to_token(&self, id: u32) -> Option<String> {
        self.inner.id_to_token(id)
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        self.inner
            .decode(ids, false)
            .map_err(|e| Error::Tokenization(format!("Failed to decode {ids:?}: {e}")))
    }

    fn unknown_token_id(&self) -> Option<u32> {
        self.unknown_id
    }
}
