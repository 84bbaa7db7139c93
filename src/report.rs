//! Transplant report.
//!
//! Structured per-token records plus aggregate statistics. Rendering is a
//! `Display` impl: terse by default, one line per token when verbose.

use std::collections::BTreeMap;
use std::fmt;

use crate::align::{MappingSource, RoleStatus, SpecialResolution, TokenMapping};
use crate::error::Result;
use crate::vocab::{DonorTokenizer, Vocabulary};

/// Outcome of one mapping decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Conflict,
    Fallback,
}

/// One mapping decision.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingRecord {
    pub target_id: u32,
    pub target_text: String,
    /// Raw target piece, as stored in the tokenizer.
    pub target_piece: String,
    pub donor_ids: Vec<u32>,
    /// Raw donor piece per donor id.
    pub donor_pieces: Vec<String>,
    pub donor_text: String,
    pub source: MappingSource,
    pub outcome: Outcome,
}

/// Aggregate statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransplantStats {
    /// Donor sequence length → number of target tokens.
    pub sequence_lengths: BTreeMap<usize, usize>,
    /// Head rows copied from a single donor row.
    pub head_copies: usize,
    /// Head rows combined from several donor rows.
    pub head_means: usize,
    /// Padding rows left at zero.
    pub zero_rows: usize,
}

impl TransplantStats {
    /// Rows in the output matrices.
    pub fn total_rows(&self) -> usize {
        self.head_copies + self.head_means + self.zero_rows
    }

    /// Target tokens actually mapped.
    pub fn used_rows(&self) -> usize {
        self.head_copies + self.head_means
    }
}

/// Everything the run decided, ready for rendering.
#[derive(Debug, Clone)]
pub struct TransplantReport {
    /// One record per target id, in id order.
    pub tokens: Vec<MappingRecord>,
    /// Special role resolution.
    pub special: SpecialResolution,
    pub stats: TransplantStats,
    /// Render one line per token.
    pub verbose: bool,
}

impl TransplantReport {
    /// Builds the report from the final mapping.
    ///
    /// `total_rows` is the row count of the written matrices, which may
    /// exceed the mapping when the target config reserves unused ids.
    pub fn build<T>(
        mapping: &TokenMapping,
        target: &Vocabulary,
        donor: &T,
        special: SpecialResolution,
        total_rows: usize,
    ) -> Result<Self>
    where
        T: DonorTokenizer + ?Sized,
    {
        let mut stats = TransplantStats::default();
        let mut tokens = Vec::with_capacity(mapping.len());

        for (target_id, entry) in mapping.iter() {
            let n = entry.donor_ids().len();
            *stats.sequence_lengths.entry(n).or_insert(0) += 1;
            if n == 1 {
                stats.head_copies += 1;
            } else {
                stats.head_means += 1;
            }

            let outcome = match entry.source() {
                MappingSource::Fallback => Outcome::Fallback,
                _ => Outcome::Success,
            };
            let donor_pieces = entry
                .donor_ids()
                .iter()
                .map(|&id| donor.id_to_token(id).unwrap_or_default())
                .collect();
            tokens.push(MappingRecord {
                target_id,
                target_text: target.text(target_id).unwrap_or_default().to_string(),
                target_piece: target.piece(target_id).unwrap_or_default().to_string(),
                donor_ids: entry.donor_ids().to_vec(),
                donor_pieces,
                donor_text: donor.decode(entry.donor_ids())?,
                source: entry.source(),
                outcome,
            });
        }
        stats.zero_rows = total_rows.saturating_sub(mapping.len());

        Ok(Self {
            tokens,
            special,
            stats,
            verbose: false,
        })
    }

    /// Records whose outcome is not `Success`, special-role conflicts included.
    pub fn problems(&self) -> Vec<MappingRecord> {
        let mut out: Vec<MappingRecord> = self
            .tokens
            .iter()
            .filter(|r| r.outcome != Outcome::Success)
            .cloned()
            .collect();

        for (role, status) in self.special.conflicts() {
            if let RoleStatus::AlreadyMapped {
                target_id,
                donor_id,
                ..
            } = status
            {
                let (target_text, target_piece) = self
                    .tokens
                    .get(*target_id as usize)
                    .map(|r| (r.target_text.clone(), r.target_piece.clone()))
                    .unwrap_or_default();
                out.push(MappingRecord {
                    target_id: *target_id,
                    target_text,
                    target_piece,
                    donor_ids: vec![*donor_id],
                    donor_pieces: Vec::new(),
                    donor_text: String::new(),
                    source: MappingSource::Special(role),
                    outcome: Outcome::Conflict,
                });
            }
        }
        out
    }

    /// Records produced by manual overrides.
    pub fn overrides(&self) -> impl Iterator<Item = &MappingRecord> {
        self.tokens
            .iter()
            .filter(|r| r.source == MappingSource::Override)
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

impl fmt::Display for TransplantReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Special tokens:")?;
        for (role, status) in &self.special.statuses {
            match status {
                RoleStatus::NotApplicable => {
                    writeln!(f, "✘ {role} : Not found for target model")?
                }
                RoleStatus::DonorMissing { .. } => {
                    writeln!(f, "✘ {role} : Not found for donor model")?
                }
                RoleStatus::TargetOutOfRange { target_id } => {
                    writeln!(f, "✘ {role} : {target_id} is outside the target vocabulary")?
                }
                RoleStatus::AlreadyMapped {
                    target_id,
                    existing,
                    ..
                } => writeln!(f, "✘ {role} : {target_id} is already mapped to {existing:?}")?,
                RoleStatus::Mapped {
                    target_id,
                    donor_id,
                } => {
                    let text = self
                        .tokens
                        .get(*target_id as usize)
                        .map(|r| r.target_text.as_str())
                        .unwrap_or_default();
                    writeln!(f, "✔ {role} : {target_id} {text:?} → [{donor_id}]")?
                }
            }
        }

        let overrides: Vec<_> = self.overrides().collect();
        if !overrides.is_empty() {
            writeln!(f, "\nManual overrides:")?;
            for r in overrides {
                writeln!(
                    f,
                    "✔ {:6} : {:?} → {:?} {:?}",
                    r.target_id, r.target_text, r.donor_ids, r.donor_text
                )?;
            }
        }

        if self.verbose {
            writeln!(f, "\nTransplanted tokens:")?;
            for r in &self.tokens {
                writeln!(
                    f,
                    "- {:6} : {:?} → {:?} {:?}",
                    r.target_id, r.target_piece, r.donor_pieces, r.donor_ids
                )?;
            }
        }

        let used = self.stats.used_rows();
        writeln!(f, "\nTransplant mappings:")?;
        for (len, count) in &self.stats.sequence_lengths {
            let label = format!("{len} to 1");
            writeln!(f, "- {label:<8}: {count} ({:.2}%)", percent(*count, used))?;
        }

        let total = self.stats.total_rows();
        writeln!(f, "\nHead initialized with:")?;
        writeln!(
            f,
            "- Copies : {} ({:.2}%)",
            self.stats.head_copies,
            percent(self.stats.head_copies, total)
        )?;
        writeln!(
            f,
            "- Means  : {} ({:.2}%)",
            self.stats.head_means,
            percent(self.stats.head_means, total)
        )?;
        write!(
            f,
            "- Zeros  : {} ({:.2}%)",
            self.stats.zero_rows,
            percent(self.stats.zero_rows, total)
        )
    }
}
