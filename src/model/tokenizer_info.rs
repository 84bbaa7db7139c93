//! Tokenizer loading with special-token metadata.

use std::path::Path;

use serde_json::Value;
use tokenizers::Tokenizer;
use tracing::debug;

use super::hf_config::HfConfig;
use super::loader::ModelFiles;
use crate::error::{Error, Result};
use crate::vocab::{HfTokenizer, SpecialRole, SpecialTokenIds, Vocabulary};

/// A model's tokenizer plus its declared special tokens.
#[derive(Debug, Clone)]
pub struct ModelTokenizer {
    pub tokenizer: HfTokenizer,
    pub special: SpecialTokenIds,
}

impl ModelTokenizer {
    /// Loads tokenizer.json and resolves bos/eos/pad.
    ///
    /// Special ids come from tokenizer_config.json when it names them, else
    /// from config.json.
    pub fn load(files: &ModelFiles, config: &HfConfig) -> Result<Self> {
        let tokenizer_config = match &files.tokenizer_config {
            Some(path) => Some(read_json(path)?),
            None => None,
        };

        let mut tokenizer = HfTokenizer::from_file(&files.tokenizer)?;
        if let Some(unk) = tokenizer_config
            .as_ref()
            .and_then(|c| token_content(c.get("unk_token")))
        {
            tokenizer = tokenizer.with_unknown_token(&unk);
        }

        let special = special_ids(tokenizer.inner(), tokenizer_config.as_ref(), config);
        debug!(?special, "special tokens");

        Ok(Self { tokenizer, special })
    }

    /// Full vocabulary of this tokenizer.
    pub fn vocabulary(&self) -> Result<Vocabulary> {
        Vocabulary::from_tokenizer(self.tokenizer.inner())
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::ModelLoad(format!("Failed to read {}: {e}", path.display())))?;
    Ok(serde_json::from_str(&content)?)
}

/// Token text from a tokenizer_config entry: a string or `{"content": ..}`.
fn token_content(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj.get("content")?.as_str().map(str::to_string),
        _ => None,
    }
}

/// Resolves special ids from tokenizer_config.json, then config.json.
pub fn special_ids(
    tokenizer: &Tokenizer,
    tokenizer_config: Option<&Value>,
    config: &HfConfig,
) -> SpecialTokenIds {
    let mut ids = SpecialTokenIds::default();
    for role in SpecialRole::ALL {
        let from_tokenizer = tokenizer_config
            .and_then(|c| token_content(c.get(role.token_key())))
            .and_then(|piece| tokenizer.token_to_id(&piece));
        ids.set(role, from_tokenizer.or_else(|| config.special_id(role)));
    }

    ids.add_bos = match tokenizer_config.and_then(|c| c.get("add_bos_token")) {
        Some(Value::Bool(flag)) => *flag,
        // No flag: see whether the post-processor prepends bos.
        _ => ids.bos.is_some_and(|bos| {
            tokenizer
                .encode("a", true)
                .map(|enc| enc.get_ids().first() == Some(&bos))
                .unwrap_or(false)
        }),
    };

    ids
}
