//! Token ↔ id tables.

use std::collections::HashMap;

use tokenizers::Tokenizer;

use crate::error::{Error, Result};

/// One vocabulary entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabEntry {
    /// Raw vocabulary piece (e.g. `"Ġhello"` for byte-level BPE).
    pub piece: String,
    /// Text the piece decodes to (e.g. `" hello"`).
    pub text: String,
}

impl VocabEntry {
    /// Creates an entry whose decoded text equals its piece.
    pub fn plain(piece: impl Into<String>) -> Self {
        let piece = piece.into();
        Self {
            text: piece.clone(),
            piece,
        }
    }
}

/// Bijective token ↔ id table for one model.
///
/// Ids are dense: entry `i` has id `i`.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    entries: Vec<VocabEntry>,
    piece_to_id: HashMap<String, u32>,
    text_to_id: HashMap<String, u32>,
}

impl Vocabulary {
    /// Builds a vocabulary from entries ordered by id.
    ///
    /// Fails if two entries share the same piece.
    pub fn new(entries: Vec<VocabEntry>) -> Result<Self> {
        let mut piece_to_id = HashMap::with_capacity(entries.len());
        let mut text_to_id = HashMap::with_capacity(entries.len());

        for (id, entry) in entries.iter().enumerate() {
            let id = id as u32;
            if let Some(previous) = piece_to_id.insert(entry.piece.clone(), id) {
                return Err(Error::Config(format!(
                    "vocabulary piece {:?} appears at ids {previous} and {id}",
                    entry.piece
                )));
            }
            // Several pieces can decode to the same text; the lowest id wins.
            text_to_id.entry(entry.text.clone()).or_insert(id);
        }

        Ok(Self {
            entries,
            piece_to_id,
            text_to_id,
        })
    }

    /// Builds a vocabulary whose pieces are their own text.
    pub fn from_pieces<I, S>(pieces: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(pieces.into_iter().map(VocabEntry::plain).collect())
    }

    /// Reads the full vocabulary (added tokens included) from a HuggingFace tokenizer.
    ///
    /// Every id up to the highest used one must be present. Tokenizers with
    /// holes in their id space are rejected rather than guessed at.
    pub fn from_tokenizer(tokenizer: &Tokenizer) -> Result<Self> {
        let used = tokenizer
            .get_vocab(true)
            .values()
            .max()
            .map(|&max| max as usize + 1)
            .unwrap_or(0);

        let mut entries = Vec::with_capacity(used);
        for id in 0..used as u32 {
            let piece = tokenizer
                .id_to_token(id)
                .ok_or_else(|| {
                    Error::Config(format!(
                        "vocabulary has no token for id {id} below its highest id {}; \
                         tokenizers with id gaps are not supported",
                        used - 1
                    ))
                })?;
            let text = tokenizer
                .decode(&[id], false)
                .map_err(|e| Error::Tokenization(format!("Failed to decode id {id}: {e}")))?;
            entries.push(VocabEntry { piece, text });
        }

        Self::new(entries)
    }

    /// Number of ids in use.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the vocabulary has no tokens.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for `id`.
    pub fn entry(&self, id: u32) -> Option<&VocabEntry> {
        self.entries.get(id as usize)
    }

    /// Raw piece for `id`.
    pub fn piece(&self, id: u32) -> Option<&str> {
        self.entry(id).map(|e| e.piece.as_str())
    }

    /// Decoded text for `id`.
    pub fn text(&self, id: u32) -> Option<&str> {
        self.entry(id).map(|e| e.text.as_str())
    }

    /// Id of an exact piece.
    pub fn id_of_piece(&self, piece: &str) -> Option<u32> {
        self.piece_to_id.get(piece).copied()
    }

    /// Resolves a user-supplied token string: piece first, then decoded text.
    pub fn resolve(&self, token: &str) -> Option<u32> {
        self.id_of_piece(token)
            .or_else(|| self.text_to_id.get(token).copied())
    }

    /// Iterates `(id, entry)` in id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &VocabEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(id, entry)| (id as u32, entry))
    }
}
