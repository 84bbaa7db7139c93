//! Error types for vocab-transplant.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for vocab-transplant operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for vocab-transplant.
#[derive(Error, Debug)]
pub enum Error {
    /// A target token could not be decomposed into any donor sequence.
    #[error("target token {id} ({text:?}) has no donor decomposition and the donor has no unknown token")]
    UnresolvableToken { id: u32, text: String },

    /// An override names a token that is not in the target vocabulary.
    #[error("override target token {0:?} is not in the target vocabulary")]
    UnknownTargetToken(String),

    /// An override's donor string tokenizes to nothing.
    #[error("override donor string {donor:?} for target token {target:?} encodes to 0 tokens")]
    EmptyOverride { target: String, donor: String },

    /// Donor and target (or donor weights and donor config) are structurally incompatible.
    #[error("architecture mismatch: {0}")]
    ArchitectureMismatch(String),

    /// Weighting decay factor outside [0, 1].
    #[error("weighting decay factor must be between 0.0 and 1.0 (got {0})")]
    InvalidDecayFactor(f64),

    /// A mapping references a donor row that does not exist.
    #[error("donor token id {id} is out of range for a matrix with {rows} rows")]
    DonorIdOutOfRange { id: u32, rows: usize },

    /// Output directory already exists and overwriting was not requested.
    #[error("output directory exists (use --overwrite to replace): {}", .0.display())]
    OutputExists(PathBuf),

    /// Model loading failed.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Tokenization error.
    #[error("tokenization error: {0}")]
    Tokenization(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Tensor operation error.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
