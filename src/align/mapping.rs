//! Target id → donor id sequence mapping.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::vocab::SpecialRole;

/// How a mapping entry was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingSource {
    /// The target token exists verbatim as one donor token.
    Exact,
    /// The target text was re-tokenized by the donor.
    Decomposed,
    /// Re-tokenization produced nothing; the donor unknown token was used.
    Fallback,
    /// A manual override.
    Override,
    /// Special-token resolution.
    Special(SpecialRole),
}

/// Donor ids for one target token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    donor_ids: Vec<u32>,
    source: MappingSource,
}

impl MappingEntry {
    /// Creates an entry. The donor sequence must not be empty.
    pub fn new(donor_ids: Vec<u32>, source: MappingSource) -> Result<Self> {
        if donor_ids.is_empty() {
            return Err(Error::Config(format!(
                "empty donor sequence for {source:?} mapping"
            )));
        }
        Ok(Self { donor_ids, source })
    }

    /// Ordered donor ids, never empty.
    pub fn donor_ids(&self) -> &[u32] {
        &self.donor_ids
    }

    /// Last donor id, the one the input embedding is taken from.
    pub fn last(&self) -> u32 {
        self.donor_ids[self.donor_ids.len() - 1]
    }

    /// How the entry was produced.
    pub fn source(&self) -> MappingSource {
        self.source
    }
}

/// Dense mapping from every target id to a non-empty donor id sequence.
///
/// Entry `i` belongs to target id `i`. Stages take the mapping by value and
/// hand it on, so nothing mutates it once the transplant engine has it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMapping {
    entries: Vec<MappingEntry>,
}

impl TokenMapping {
    /// Builds a mapping from entries ordered by target id.
    pub fn from_entries(entries: Vec<MappingEntry>) -> Self {
        Self { entries }
    }

    /// Builds a mapping from `(target id, donor ids)` pairs that must cover
    /// `0..n` exactly once.
    pub fn from_pairs<I>(pairs: I, source: MappingSource) -> Result<Self>
    where
        I: IntoIterator<Item = (u32, Vec<u32>)>,
    {
        let mut by_id = BTreeMap::new();
        for (id, donor_ids) in pairs {
            if by_id.insert(id, MappingEntry::new(donor_ids, source)?).is_some() {
                return Err(Error::Config(format!("target id {id} mapped twice")));
            }
        }
        let mut entries = Vec::with_capacity(by_id.len());
        for (expected, (id, entry)) in by_id.into_iter().enumerate() {
            if id as usize != expected {
                return Err(Error::Config(format!("target id {expected} has no mapping")));
            }
            entries.push(entry);
        }
        Ok(Self { entries })
    }

    /// Number of target ids.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no target ids are mapped.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for a target id.
    pub fn get(&self, target_id: u32) -> Option<&MappingEntry> {
        self.entries.get(target_id as usize)
    }

    /// Donor ids for a target id.
    pub fn donor_ids(&self, target_id: u32) -> Option<&[u32]> {
        self.get(target_id).map(MappingEntry::donor_ids)
    }

    /// Replaces the entry for an existing target id.
    pub fn replace(&mut self, target_id: u32, entry: MappingEntry) -> Result<()> {
        let len = self.entries.len();
        let slot = self.entries.get_mut(target_id as usize).ok_or_else(|| {
            Error::Config(format!(
                "target id {target_id} is outside a mapping of {len} tokens"
            ))
        })?;
        *slot = entry;
        Ok(())
    }

    /// Iterates `(target id, entry)` in id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &MappingEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(id, entry)| (id as u32, entry))
    }

    /// Largest donor id referenced by any entry.
    pub fn max_donor_id(&self) -> Option<u32> {
        self.entries
            .iter()
            .flat_map(|e| e.donor_ids.iter().copied())
            .max()
    }
}
