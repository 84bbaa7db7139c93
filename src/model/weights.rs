//! Donor weight access.

use std::path::PathBuf;

use candle_core::safetensors::MmapedSafetensors;
use candle_core::{DType, Device, Tensor};
use tracing::{debug, warn};

use super::hf_config::HfConfig;
use crate::error::{Error, Result};

const EMBED_SUFFIX: &str = "embed_tokens.weight";

/// Memory-mapped donor SafeTensors with the embedding tensors located.
pub struct DonorWeights {
    st: MmapedSafetensors,
    names: Vec<String>,
    embed_name: String,
    head_name: String,
    head_present: bool,
}

impl DonorWeights {
    /// Memory-maps the donor shards and finds `*embed_tokens.weight` and the
    /// `lm_head.weight` beside it.
    ///
    /// # Safety
    ///
    /// Uses memory-mapped file access. This is safe as long as the files are
    /// not modified while being read.
    #[allow(unsafe_code)]
    pub fn open(paths: &[PathBuf]) -> Result<Self> {
        let st = unsafe { MmapedSafetensors::multi(paths)? };

        let mut names: Vec<String> = st.tensors().into_iter().map(|(name, _)| name).collect();
        names.sort();

        // Shortest match prefers the language model over e.g. vision towers.
        let embed_name = names
            .iter()
            .filter(|n| n.ends_with(EMBED_SUFFIX))
            .min_by_key(|n| n.len())
            .cloned()
            .ok_or_else(|| {
                Error::ModelLoad(format!("no tensor named *{EMBED_SUFFIX} in donor weights"))
            })?;

        let prefix = embed_name
            .strip_suffix(&format!("model.{EMBED_SUFFIX}"))
            .unwrap_or("");
        let head_name = format!("{prefix}lm_head.weight");
        let head_present = names.binary_search(&head_name).is_ok();

        debug!(%embed_name, %head_name, head_present, "located donor embeddings");

        Ok(Self {
            st,
            names,
            embed_name,
            head_name,
            head_present,
        })
    }

    /// Name of the input embedding tensor.
    pub fn embed_name(&self) -> &str {
        &self.embed_name
    }

    /// Name the output head is (or will be) stored under.
    pub fn head_name(&self) -> &str {
        &self.head_name
    }

    /// Every tensor name, sorted.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Loads a tensor, optionally converting its dtype.
    pub fn load(&self, name: &str, dtype: Option<DType>, device: &Device) -> Result<Tensor> {
        let t = self.st.load(name, device)?;
        Ok(match dtype {
            Some(dtype) => t.to_dtype(dtype)?,
            None => t,
        })
    }

    /// Donor input embedding.
    pub fn embedding(&self, dtype: Option<DType>, device: &Device) -> Result<Tensor> {
        self.load(&self.embed_name, dtype, device)
    }

    /// Donor output head. Tied (or head-less) models reuse the embedding.
    pub fn head(&self, tied: bool, dtype: Option<DType>, device: &Device) -> Result<Tensor> {
        if tied || !self.head_present {
            if !tied {
                warn!("donor has no {} tensor, using the input embedding", self.head_name);
            }
            self.embedding(dtype, device)
        } else {
            self.load(&self.head_name, dtype, device)
        }
    }
}

/// Rejects donor matrices that do not match the donor's declared architecture.
pub fn check_architecture(config: &HfConfig, embedding: &Tensor, head: &Tensor) -> Result<()> {
    let hidden = config.hidden_size()?;
    for (what, t) in [("input embedding", embedding), ("output head", head)] {
        let (_, cols) = t.dims2().map_err(|_| {
            Error::ArchitectureMismatch(format!("donor {what} must be 2-D, got {:?}", t.dims()))
        })?;
        if cols != hidden {
            return Err(Error::ArchitectureMismatch(format!(
                "donor {what} has {cols} columns but config hidden_size is {hidden}"
            )));
        }
    }
    Ok(())
}
