//! Embedding transplant engine.
//!
//! Both output matrices are allocated fresh and row-indexed by target id.
//! Every row comes from donor data; the target model's own embeddings are
//! never read.

use candle_core::{DType, Tensor};
use tracing::debug;

use super::weights::weights;
use crate::align::TokenMapping;
use crate::config::DecayFactor;
use crate::error::{Error, Result};

/// Target ids processed per batch when building the output head.
const CHUNK_ROWS: usize = 4096;

/// Synthesized target matrices.
#[derive(Debug, Clone)]
pub struct TransplantedEmbeddings {
    /// Input embedding [target_vocab, hidden].
    pub input_embedding: Tensor,
    /// Output head [target_vocab, hidden].
    pub output_head: Tensor,
}

/// Checks that the donor matrices can serve every donor id in `mapping`.
///
/// Both matrices must be rank 2 with equal hidden width, and every
/// referenced donor id must be a valid row of both.
pub fn ensure_compatible(
    mapping: &TokenMapping,
    donor_embedding: &Tensor,
    donor_head: &Tensor,
) -> Result<()> {
    let (embed_rows, embed_hidden) = matrix_dims(donor_embedding, "donor input embedding")?;
    let (head_rows, head_hidden) = matrix_dims(donor_head, "donor output head")?;

    if embed_hidden != head_hidden {
        return Err(Error::ArchitectureMismatch(format!(
            "input embedding hidden size {embed_hidden} != output head hidden size {head_hidden}"
        )));
    }

    if let Some(max_id) = mapping.max_donor_id() {
        let rows = embed_rows.min(head_rows);
        if max_id as usize >= rows {
            return Err(Error::DonorIdOutOfRange { id: max_id, rows });
        }
    }

    Ok(())
}

fn matrix_dims(t: &Tensor, what: &str) -> Result<(usize, usize)> {
    t.dims2().map_err(|_| {
        Error::ArchitectureMismatch(format!("{what} must be 2-D, got shape {:?}", t.dims()))
    })
}

/// Builds the target input embedding and output head.
///
/// For target id `t` mapped to `[d0, ..., dk]`:
/// - input row = donor input row `dk`
/// - head row = Σ `weights(k + 1, decay)[i]` · donor head row `d_i`
///
/// Output dtypes match the donor matrices. The head is accumulated in f32.
pub fn transplant(
    mapping: &TokenMapping,
    donor_embedding: &Tensor,
    donor_head: &Tensor,
    decay: DecayFactor,
) -> Result<TransplantedEmbeddings> {
    ensure_compatible(mapping, donor_embedding, donor_head)?;

    let device = donor_embedding.device();

    let last_ids: Vec<u32> = mapping.iter().map(|(_, entry)| entry.last()).collect();
    let input_embedding =
        donor_embedding.index_select(&Tensor::new(last_ids.as_slice(), device)?, 0)?;

    let entries: Vec<_> = mapping.iter().map(|(_, entry)| entry.donor_ids()).collect();
    let mut chunks = Vec::with_capacity(entries.len().div_ceil(CHUNK_ROWS));
    for chunk in entries.chunks(CHUNK_ROWS) {
        chunks.push(combine_head_rows(chunk, donor_head, decay)?);
    }
    let output_head = if chunks.is_empty() {
        let (_, hidden) = donor_head.dims2()?;
        Tensor::zeros((0, hidden), donor_head.dtype(), donor_head.device())?
    } else {
        Tensor::cat(&chunks, 0)?
    };

    debug!(
        rows = mapping.len(),
        embed_shape = ?input_embedding.dims(),
        head_shape = ?output_head.dims(),
        "transplanted embeddings"
    );

    Ok(TransplantedEmbeddings {
        input_embedding,
        output_head,
    })
}

/// Weighted head rows for a batch of target ids.
///
/// All donor rows of the batch are gathered once, scaled by their weight,
/// then summed into their target row with `index_add`.
fn combine_head_rows(
    sequences: &[&[u32]],
    donor_head: &Tensor,
    decay: DecayFactor,
) -> Result<Tensor> {
    let device = donor_head.device();
    let (_, hidden) = donor_head.dims2()?;

    let total: usize = sequences.iter().map(|s| s.len()).sum();
    let mut donor_ids = Vec::with_capacity(total);
    let mut row_ids = Vec::with_capacity(total);
    let mut row_weights = Vec::with_capacity(total);

    for (row, ids) in sequences.iter().enumerate() {
        donor_ids.extend_from_slice(ids);
        row_ids.extend(std::iter::repeat(row as u32).take(ids.len()));
        row_weights.extend(weights(ids.len(), decay).into_iter().map(|w| w as f32));
    }

    let gathered = donor_head
        .index_select(&Tensor::new(donor_ids.as_slice(), device)?, 0)?
        .to_dtype(DType::F32)?;
    let scale = Tensor::from_vec(row_weights, (total, 1), device)?;
    let scaled = gathered.broadcast_mul(&scale)?;

    let rows = Tensor::new(row_ids.as_slice(), device)?;
    let combined = Tensor::zeros((sequences.len(), hidden), DType::F32, device)?
        .index_add(&rows, &scaled, 0)?;

    Ok(combined.to_dtype(donor_head.dtype())?)
}

/// Extends a [rows, hidden] matrix with zero rows up to `total_rows`.
///
/// Used for target configs whose `vocab_size` exceeds the ids the tokenizer
/// actually uses.
pub fn pad_rows(t: &Tensor, total_rows: usize) -> Result<Tensor> {
    let (rows, hidden) = matrix_dims(t, "embedding")?;
    if total_rows < rows {
        return Err(Error::ArchitectureMismatch(format!(
            "target vocab_size {total_rows} is smaller than the {rows} tokens in its tokenizer"
        )));
    }
    if total_rows == rows {
        return Ok(t.clone());
    }
    let zeros = Tensor::zeros((total_rows - rows, hidden), t.dtype(), t.device())?;
    Ok(Tensor::cat(&[t, &zeros], 0)?)
}
