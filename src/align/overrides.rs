//! Manual override applier.

use tracing::{info, warn};

use super::mapping::{MappingEntry, MappingSource, TokenMapping};
use crate::config::TokenOverride;
use crate::error::{Error, Result};
use crate::vocab::{DonorTokenizer, Vocabulary};

/// Replaces automatic mappings with user-supplied ones.
///
/// Target tokens are matched by string (piece, then decoded text). Donor
/// strings are always re-tokenized, never exact-matched, so literal
/// multi-token sequences like `"<|im_start|>user\n"` survive as given.
///
/// # Errors
///
/// - `UnknownTargetToken` if a target string is not in the target vocabulary
/// - `EmptyOverride` if a donor string tokenizes to nothing
pub fn apply_overrides<T>(
    mut mapping: TokenMapping,
    overrides: &[TokenOverride],
    target: &Vocabulary,
    donor: &T,
) -> Result<TokenMapping>
where
    T: DonorTokenizer + ?Sized,
{
    for o in overrides {
        let target_id = target
            .resolve(&o.target)
            .ok_or_else(|| Error::UnknownTargetToken(o.target.clone()))?;

        let donor_text = o.donor_text();
        let donor_ids = donor.tokenize(&donor_text)?;
        if donor_ids.is_empty() {
            return Err(Error::EmptyOverride {
                target: o.target.clone(),
                donor: o.donor.clone(),
            });
        }

        if mapping.get(target_id).map(MappingEntry::source) == Some(MappingSource::Override) {
            warn!(target_id, token = %o.target, "token overridden more than once, last override wins");
        }

        info!(target_id, token = ?o.target, donor = ?donor_text, ?donor_ids, "override");
        mapping.replace(target_id, MappingEntry::new(donor_ids, MappingSource::Override)?)?;
    }

    Ok(mapping)
}
