//! Model file discovery.
//!
//! This module provides functions for:
//! - Scanning a local model directory
//! - Downloading models from HuggingFace Hub
//! - Resolving sharded SafeTensors weights

use std::path::{Path, PathBuf};

use hf_hub::{api::sync::Api, Repo, RepoType};

use crate::error::{Error, Result};

/// Tokenizer files carried over from the target model, when present.
pub const TOKENIZER_FILES: [&str; 7] = [
    "tokenizer.json",
    "tokenizer_config.json",
    "special_tokens_map.json",
    "added_tokens.json",
    "tokenizer.model",
    "vocab.json",
    "merges.txt",
];

/// Paths to a model's files.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    /// Path to config.json.
    pub config: PathBuf,
    /// Paths to weight files (SafeTensors).
    pub weights: Vec<PathBuf>,
    /// Path to tokenizer.json.
    pub tokenizer: PathBuf,
    /// Path to tokenizer_config.json, if present.
    pub tokenizer_config: Option<PathBuf>,
    /// Every file from `TOKENIZER_FILES` that exists.
    pub tokenizer_files: Vec<PathBuf>,
    /// Path to generation_config.json, if present.
    pub generation_config: Option<PathBuf>,
}

impl ModelFiles {
    /// Resolves a local directory, or else downloads a HuggingFace model ID.
    pub fn resolve(path_or_id: &str, revision: &str) -> Result<Self> {
        let path = Path::new(path_or_id);
        if path.is_dir() {
            Self::from_dir(path)
        } else {
            download_model(path_or_id, revision)
        }
    }

    /// Scans a local model directory.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let config = dir.join("config.json");
        if !config.is_file() {
            return Err(Error::ModelLoad(format!(
                "Config file not found at {}",
                config.display()
            )));
        }

        let tokenizer = dir.join("tokenizer.json");
        if !tokenizer.is_file() {
            return Err(Error::ModelLoad(format!(
                "Tokenizer file not found at {}",
                tokenizer.display()
            )));
        }

        let tokenizer_files = TOKENIZER_FILES
            .iter()
            .map(|name| dir.join(name))
            .filter(|p| p.is_file())
            .collect();

        Ok(Self {
            config,
            weights: local_weights(dir)?,
            tokenizer,
            tokenizer_config: existing(dir.join("tokenizer_config.json")),
            tokenizer_files,
            generation_config: existing(dir.join("generation_config.json")),
        })
    }
}

fn existing(path: PathBuf) -> Option<PathBuf> {
    path.is_file().then_some(path)
}

/// Finds weight files in a local directory.
///
/// `model.safetensors` first, then the shards named by
/// `model.safetensors.index.json`, then every `*.safetensors` file.
fn local_weights(dir: &Path) -> Result<Vec<PathBuf>> {
    let single = dir.join("model.safetensors");
    if single.is_file() {
        return Ok(vec![single]);
    }

    let index = dir.join("model.safetensors.index.json");
    if index.is_file() {
        let content = std::fs::read_to_string(&index)
            .map_err(|e| Error::ModelLoad(format!("Failed to read safetensors index: {e}")))?;
        return Ok(shard_names(&content)?
            .into_iter()
            .map(|name| dir.join(name))
            .collect());
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("safetensors"))
        .collect();
    if paths.is_empty() {
        return Err(Error::ModelLoad(format!(
            "No SafeTensors weights found in {}. Only SafeTensors format is supported.",
            dir.display()
        )));
    }
    paths.sort();
    Ok(paths)
}

/// Unique, sorted shard file names from a `model.safetensors.index.json`.
pub fn shard_names(index_content: &str) -> Result<Vec<String>> {
    let index: serde_json::Value = serde_json::from_str(index_content)
        .map_err(|e| Error::ModelLoad(format!("Failed to parse safetensors index: {e}")))?;

    let weight_map = index["weight_map"]
        .as_object()
        .ok_or_else(|| Error::ModelLoad("Invalid safetensors index: missing weight_map".into()))?;

    let mut shard_files: Vec<String> = weight_map
        .values()
        .filter_map(|v| v.as_str())
        .map(|s| s.to_string())
        .collect();
    shard_files.sort();
    shard_files.dedup();
    Ok(shard_files)
}

/// Downloads model files from HuggingFace Hub.
///
/// # Arguments
///
/// * `model_id` - HuggingFace model ID (e.g., "Qwen/Qwen2.5-0.5B-Instruct")
/// * `revision` - Git revision (branch, tag, or commit hash). Use "main" for latest.
pub fn download_model(model_id: &str, revision: &str) -> Result<ModelFiles> {
    let api = Api::new().map_err(|e| Error::ModelLoad(format!("Failed to create HF API: {e}")))?;

    let repo = api.repo(Repo::with_revision(
        model_id.to_string(),
        RepoType::Model,
        revision.to_string(),
    ));

    let config = repo
        .get("config.json")
        .map_err(|e| Error::ModelLoad(format!("Failed to download config.json: {e}")))?;

    let weights = download_weights(&repo)?;

    let tokenizer = repo
        .get("tokenizer.json")
        .map_err(|e| Error::ModelLoad(format!("Failed to download tokenizer.json: {e}")))?;

    // Optional files: missing ones are simply absent from the repo.
    let tokenizer_files: Vec<PathBuf> = TOKENIZER_FILES
        .iter()
        .filter_map(|name| repo.get(name).ok())
        .collect();
    let tokenizer_config = tokenizer_files
        .iter()
        .find(|p| p.file_name().and_then(|n| n.to_str()) == Some("tokenizer_config.json"))
        .cloned();

    Ok(ModelFiles {
        config,
        weights,
        tokenizer,
        tokenizer_config,
        tokenizer_files,
        generation_config: repo.get("generation_config.json").ok(),
    })
}

/// Downloads model weight files.
fn download_weights(repo: &hf_hub::api::sync::ApiRepo) -> Result<Vec<PathBuf>> {
    if let Ok(path) = repo.get("model.safetensors") {
        return Ok(vec![path]);
    }

    if let Ok(index_path) = repo.get("model.safetensors.index.json") {
        let index_content = std::fs::read_to_string(&index_path)
            .map_err(|e| Error::ModelLoad(format!("Failed to read safetensors index: {e}")))?;

        let mut paths = Vec::new();
        for filename in shard_names(&index_content)? {
            let path = repo
                .get(&filename)
                .map_err(|e| Error::ModelLoad(format!("Failed to download {filename}: {e}")))?;
            paths.push(path);
        }
        return Ok(paths);
    }

    Err(Error::ModelLoad(
        "No SafeTensors weights found. This implementation only supports SafeTensors format."
            .into(),
    ))
}
