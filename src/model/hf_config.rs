//! HuggingFace config.json access.
//!
//! Kept as a raw JSON value so every key the donor config carries survives
//! into the output model untouched. Multimodal configs nest the language
//! model's fields under `text_config`; lookups check there first.

use std::path::Path;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::vocab::{SpecialRole, SpecialTokenIds};

/// A model's config.json.
#[derive(Debug, Clone)]
pub struct HfConfig {
    raw: Value,
}

impl HfConfig {
    /// Loads config.json.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ModelLoad(format!("Failed to read {}: {e}", path.display())))?;
        let raw: Value = serde_json::from_str(&content)
            .map_err(|e| Error::ModelLoad(format!("Failed to parse {}: {e}", path.display())))?;
        Ok(Self::from_value(raw))
    }

    /// Wraps an already parsed config.
    pub fn from_value(raw: Value) -> Self {
        Self { raw }
    }

    fn lookup(&self, key: &str) -> Option<&Value> {
        self.raw
            .get("text_config")
            .and_then(|t| t.get(key))
            .or_else(|| self.raw.get(key))
    }

    fn required_usize(&self, key: &str) -> Result<usize> {
        self.lookup(key)
            .and_then(Value::as_u64)
            .map(|v| v as usize)
            .ok_or_else(|| Error::ModelLoad(format!("{key} not found in model config")))
    }

    /// Vocabulary size (rows of the embedding matrices).
    pub fn vocab_size(&self) -> Result<usize> {
        self.required_usize("vocab_size")
    }

    /// Hidden dimension.
    pub fn hidden_size(&self) -> Result<usize> {
        self.required_usize("hidden_size")
    }

    /// Whether lm_head shares the input embedding.
    pub fn tie_word_embeddings(&self) -> bool {
        self.lookup("tie_word_embeddings")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Special token id declared for `role`. Arrays yield their first element.
    pub fn special_id(&self, role: SpecialRole) -> Option<u32> {
        match self.lookup(role.attr())? {
            Value::Number(n) => n.as_u64().map(|v| v as u32),
            Value::Array(items) => items.first().and_then(Value::as_u64).map(|v| v as u32),
            _ => None,
        }
    }

    /// Config for the transplanted model: the donor's config with the
    /// target's vocabulary size and special ids, and untied embeddings.
    pub fn for_target(&self, vocab_size: usize, target: &SpecialTokenIds) -> Value {
        let mut out = self.raw.clone();

        let nested_vocab = out
            .get("text_config")
            .map_or(false, |t| t.get("vocab_size").is_some());
        if nested_vocab {
            out["text_config"]["vocab_size"] = Value::from(vocab_size);
        } else {
            out["vocab_size"] = Value::from(vocab_size);
        }

        out["bos_token_id"] = target.bos.map_or(Value::Null, Value::from);
        out["eos_token_id"] = target.eos.map_or(Value::Null, Value::from);

        if out.get("pad_token_id").is_some() {
            // Default to eos when the target has no pad to copy.
            out["pad_token_id"] = target.pad.or(target.eos).map_or(Value::Null, Value::from);
        }

        for section in [None, Some("text_config")] {
            let obj = match section {
                None => Some(&mut out),
                Some(key) => out.get_mut(key),
            };
            if let Some(obj) = obj {
                if obj.get("tie_word_embeddings").is_some() {
                    obj["tie_word_embeddings"] = Value::Bool(false);
                }
            }
        }

        out
    }
}

/// Points the special ids of a generation_config.json at the target
/// vocabulary. Only keys the file already carries are rewritten; pad falls
/// back to the target eos.
pub fn generation_config_for_target(mut raw: Value, target: &SpecialTokenIds) -> Value {
    for role in SpecialRole::ALL {
        if raw.get(role.attr()).is_none() {
            continue;
        }
        let id = match role {
            SpecialRole::Pad => target.pad.or(target.eos),
            _ => target.get(role),
        };
        raw[role.attr()] = id.map_or(Value::Null, Value::from);
    }
    raw
}
