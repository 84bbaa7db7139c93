//! Model I/O.
//!
//! This module contains:
//! - Model file discovery (local directories and HuggingFace Hub)
//! - config.json and generation_config.json access and rewriting
//! - Tokenizer loading with special-token metadata
//! - Memory-mapped donor weights
//! - The output model writer

pub mod hf_config;
pub mod loader;
pub mod tokenizer_info;
pub mod weights;
pub mod writer;

pub use hf_config::{generation_config_for_target, HfConfig};
pub use loader::{download_model, ModelFiles};
pub use tokenizer_info::ModelTokenizer;
pub use weights::{check_architecture, DonorWeights};
pub use writer::{check_output_dir, patch_tokenizer_config, ModelWriter};
