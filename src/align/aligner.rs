//! Token aligner.
//!
//! For each target token:
//! 1. Exact match: the target piece is a single donor token that decodes to
//!    the same text.
//! 2. Decomposition: the target text is re-tokenized by the donor.
//! 3. Fallback: empty decompositions use the donor unknown token.

use tracing::{debug, warn};

use super::mapping::{MappingEntry, MappingSource, TokenMapping};
use crate::error::{Error, Result};
use crate::vocab::{DonorTokenizer, VocabEntry, Vocabulary};

/// Maps every target id to an ordered, non-empty donor id sequence.
///
/// Deterministic: the same vocabulary and donor tokenizer always give the
/// same mapping.
///
/// # Errors
///
/// `UnresolvableToken` if a target token decomposes to nothing and the donor
/// has no unknown token.
pub fn align<T>(target: &Vocabulary, donor: &T) -> Result<TokenMapping>
where
    T: DonorTokenizer + ?Sized,
{
    let mut entries = Vec::with_capacity(target.len());
    let (mut exact, mut fallback) = (0usize, 0usize);

    for (id, token) in target.iter() {
        let entry = if let Some(donor_id) = exact_match(token, donor)? {
            exact += 1;
            MappingEntry::new(vec![donor_id], MappingSource::Exact)?
        } else {
            let ids = donor.tokenize(&token.text)?;
            if ids.is_empty() {
                let unknown = donor.unknown_token_id().ok_or_else(|| Error::UnresolvableToken {
                    id,
                    text: token.text.clone(),
                })?;
                warn!(id, piece = %token.piece, unknown, "empty decomposition, using donor unknown token");
                fallback += 1;
                MappingEntry::new(vec![unknown], MappingSource::Fallback)?
            } else {
                MappingEntry::new(ids, MappingSource::Decomposed)?
            }
        };
        entries.push(entry);
    }

    debug!(
        total = entries.len(),
        exact,
        fallback,
        decomposed = entries.len() - exact - fallback,
        "aligned target vocabulary"
    );

    Ok(TokenMapping::from_entries(entries))
}

fn exact_match<T>(token: &VocabEntry, donor: &T) -> Result<Option<u32>>
where
    T: DonorTokenizer + ?Sized,
{
    let Some(donor_id) = donor.token_to_id(&token.piece) else {
        return Ok(None);
    };
    // Same piece, different byte encoding: not the same token.
    if donor.decode(&[donor_id])? == token.text {
        Ok(Some(donor_id))
    } else {
        Ok(None)
    }
}
