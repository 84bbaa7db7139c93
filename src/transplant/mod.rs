//! Embedding transplant.
//!
//! This module contains:
//! - `weights`: front-loaded geometric weighting of a donor id sequence
//! - `transplant`: synthesis of target input-embedding and output-head rows
//!
//! ## Row synthesis
//!
//! ```text
//! target t ─▶ [d0, d1, ..., dk]
//!
//! embed[t] = donor_embed[dk]                    (last subtoken: what the network "just saw")
//! head[t]  = Σ_i w_i · donor_head[d_i]          (first subtoken dominates the prediction)
//!            w = weights(k + 1, decay)
//! ```

pub mod engine;
pub mod weights;

pub use engine::{ensure_compatible, pad_rows, transplant, TransplantedEmbeddings};
pub use weights::weights;
