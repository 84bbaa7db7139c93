//! The transplant pipeline.
//!
//! ```text
//! Vocabulary ─▶ align ─▶ apply_overrides ─▶ resolve_special_tokens ─▶ transplant ─▶ report
//! ```
//!
//! Every stage takes its input by value or shared reference and hands a new
//! value on; nothing here touches the filesystem.

use candle_core::Tensor;
use tracing::info;

use crate::align::{align, apply_overrides, resolve_special_tokens, SpecialResolution, TokenMapping};
use crate::config::{DecayFactor, TokenOverride};
use crate::error::Result;
use crate::report::TransplantReport;
use crate::transplant::{pad_rows, transplant, TransplantedEmbeddings};
use crate::vocab::{DonorTokenizer, SpecialTokenIds, Vocabulary};

/// Final mapping plus special-token resolution.
#[derive(Debug, Clone)]
pub struct AlignedVocabulary {
    pub mapping: TokenMapping,
    pub special: SpecialResolution,
}

/// Output of a full run.
#[derive(Debug, Clone)]
pub struct TransplantOutput {
    /// Matrices padded to the requested row count.
    pub embeddings: TransplantedEmbeddings,
    pub mapping: TokenMapping,
    pub report: TransplantReport,
}

/// Inputs shared by every stage.
pub struct VocabTransplant<'a, T: DonorTokenizer + ?Sized> {
    target: &'a Vocabulary,
    donor: &'a T,
    target_special: SpecialTokenIds,
    donor_special: SpecialTokenIds,
    overrides: Vec<TokenOverride>,
    decay: DecayFactor,
}

impl<'a, T: DonorTokenizer + ?Sized> VocabTransplant<'a, T> {
    /// Creates a pipeline with no overrides, no special tokens and the default decay.
    pub fn new(target: &'a Vocabulary, donor: &'a T) -> Self {
        Self {
            target,
            donor,
            target_special: SpecialTokenIds::default(),
            donor_special: SpecialTokenIds::default(),
            overrides: Vec::new(),
            decay: DecayFactor::default(),
        }
    }

    /// Set both models' special token ids.
    pub fn special_tokens(mut self, donor: SpecialTokenIds, target: SpecialTokenIds) -> Self {
        self.donor_special = donor;
        self.target_special = target;
        self
    }

    /// Set manual overrides.
    pub fn overrides(mut self, overrides: Vec<TokenOverride>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Set the output-head decay factor.
    pub fn decay(mut self, decay: DecayFactor) -> Self {
        self.decay = decay;
        self
    }

    /// Runs alignment, overrides and special token resolution.
    pub fn align(&self) -> Result<AlignedVocabulary> {
        info!(target_tokens = self.target.len(), "aligning vocabulary");
        let mapping = align(self.target, self.donor)?;

        if !self.overrides.is_empty() {
            info!(count = self.overrides.len(), "applying manual overrides");
        }
        let mapping = apply_overrides(mapping, &self.overrides, self.target, self.donor)?;

        let (mapping, special) =
            resolve_special_tokens(mapping, &self.donor_special, &self.target_special)?;

        Ok(AlignedVocabulary { mapping, special })
    }

    /// Runs the whole pipeline.
    ///
    /// `total_rows` is the row count of the produced matrices; rows past the
    /// target vocabulary are zero.
    pub fn run(
        &self,
        donor_embedding: &Tensor,
        donor_head: &Tensor,
        total_rows: usize,
    ) -> Result<TransplantOutput> {
        let AlignedVocabulary { mapping, special } = self.align()?;

        info!(decay = self.decay.value(), "transplanting embeddings");
        let synthesized = transplant(&mapping, donor_embedding, donor_head, self.decay)?;
        let embeddings = TransplantedEmbeddings {
            input_embedding: pad_rows(&synthesized.input_embedding, total_rows)?,
            output_head: pad_rows(&synthesized.output_head, total_rows)?,
        };

        let report = TransplantReport::build(&mapping, self.target, self.donor, special, total_rows)?;

        Ok(TransplantOutput {
            embeddings,
            mapping,
            report,
        })
    }
}
