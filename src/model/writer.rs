//! Output model writer.
//!
//! The output is staged in a sibling directory and only moved into place
//! once every file has been written, so a failed run leaves no model behind.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use candle_core::{DType, Device, Tensor};
use tracing::{info, warn};

use super::hf_config::{generation_config_for_target, HfConfig};
use super::weights::DonorWeights;
use crate::align::BosHandling;
use crate::error::{Error, Result};
use crate::transplant::TransplantedEmbeddings;
use crate::vocab::SpecialTokenIds;

/// Output weights file name.
pub const WEIGHTS_FILE: &str = "model.safetensors";

/// Fails early if `output` exists and may not be replaced.
pub fn check_output_dir(output: &Path, overwrite: bool) -> Result<()> {
    if output.exists() && !overwrite {
        return Err(Error::OutputExists(output.to_path_buf()));
    }
    Ok(())
}

/// Everything needed to assemble the output model directory.
pub struct ModelWriter<'a> {
    pub donor_weights: &'a DonorWeights,
    pub donor_config: &'a HfConfig,
    pub donor_generation_config: Option<&'a Path>,
    pub target_tokenizer_files: &'a [PathBuf],
    pub target_special: SpecialTokenIds,
    /// Dtype for every written tensor; `None` keeps each donor tensor's own.
    pub dtype: Option<DType>,
    pub device: &'a Device,
}

impl ModelWriter<'_> {
    /// Writes the output model to `output`, replacing it when `overwrite`.
    pub fn write(
        &self,
        output: &Path,
        embeddings: &TransplantedEmbeddings,
        bos: BosHandling,
        overwrite: bool,
    ) -> Result<()> {
        check_output_dir(output, overwrite)?;

        let staging = staging_dir(output);
        if staging.exists() {
            std::fs::remove_dir_all(&staging)?;
        }
        std::fs::create_dir_all(&staging)?;

        if let Err(e) = self.write_into(&staging, embeddings, bos) {
            let _ = std::fs::remove_dir_all(&staging);
            return Err(e);
        }

        if output.exists() {
            std::fs::remove_dir_all(output)?;
        }
        std::fs::rename(&staging, output)?;
        info!(output = %output.display(), "saved model and tokenizer");
        Ok(())
    }

    fn write_into(
        &self,
        dir: &Path,
        embeddings: &TransplantedEmbeddings,
        bos: BosHandling,
    ) -> Result<()> {
        self.write_weights(dir, embeddings)?;

        let (vocab_rows, _) = embeddings.input_embedding.dims2()?;
        let config = self.donor_config.for_target(vocab_rows, &self.target_special);
        std::fs::write(dir.join("config.json"), serde_json::to_string_pretty(&config)?)?;

        if let Some(generation) = self.donor_generation_config {
            let raw: serde_json::Value =
                serde_json::from_str(&std::fs::read_to_string(generation)?)?;
            let rewritten = generation_config_for_target(raw, &self.target_special);
            std::fs::write(
                dir.join("generation_config.json"),
                serde_json::to_string_pretty(&rewritten)?,
            )?;
        }

        for file in self.target_tokenizer_files {
            if let Some(name) = file.file_name() {
                std::fs::copy(file, dir.join(name))?;
            }
        }

        match bos {
            BosHandling::DisableTargetBos => {
                let path = dir.join("tokenizer_config.json");
                if path.is_file() {
                    info!(path = %path.display(), "patching BOS handling");
                    if let Err(e) = patch_tokenizer_config(&path) {
                        warn!("failed to patch tokenizer configuration: {e}");
                    }
                }
            }
            BosHandling::NeedsSyntheticBos => warn!(
                "target tokenizer declares no BOS token but the donor was trained with one; \
                 prompts will reach the model without it"
            ),
            BosHandling::Unchanged => {}
        }

        Ok(())
    }

    /// Copies every donor tensor, swapping in the new embedding and an untied head.
    fn write_weights(&self, dir: &Path, embeddings: &TransplantedEmbeddings) -> Result<()> {
        let weights = self.donor_weights;
        let mut tensors: HashMap<String, Tensor> = HashMap::with_capacity(weights.names().len() + 1);

        for name in weights.names() {
            if name == weights.embed_name() || name == weights.head_name() {
                continue;
            }
            tensors.insert(name.clone(), weights.load(name, self.dtype, self.device)?);
        }

        let embed = self.cast(&embeddings.input_embedding)?;
        let head = self.cast(&embeddings.output_head)?;
        tensors.insert(weights.embed_name().to_string(), embed);
        tensors.insert(weights.head_name().to_string(), head);

        let path = dir.join(WEIGHTS_FILE);
        info!(tensors = tensors.len(), path = %path.display(), "writing weights");
        candle_core::safetensors::save(&tensors, &path)?;
        Ok(())
    }

    fn cast(&self, t: &Tensor) -> Result<Tensor> {
        Ok(match self.dtype {
            Some(dtype) => t.to_dtype(dtype)?,
            None => t.clone(),
        })
    }
}

fn staging_dir(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    output.with_file_name(name)
}

/// Stops the target tokenizer from prepending BOS.
///
/// Sets `"add_bos_token": false` and strips `{{ bos_token }}` from the chat
/// template. Edited as text so the rest of the file is left byte-for-byte.
pub fn patch_tokenizer_config(path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)?;
    std::fs::write(path, patch_bos_text(&text))?;
    Ok(())
}

fn patch_bos_text(text: &str) -> String {
    text.replace("\"add_bos_token\": true", "\"add_bos_token\": false")
        .replace("{{ bos_token }}", "")
        .replace("{{bos_token}}", "")
}
