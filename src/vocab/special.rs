//! Special token roles.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Structural token roles that are mapped across models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecialRole {
    /// Beginning of sequence.
    Bos,
    /// End of sequence.
    Eos,
    /// Padding.
    Pad,
}

impl SpecialRole {
    /// Resolution order. Bos and eos claim their slots before pad.
    pub const ALL: [SpecialRole; 3] = [SpecialRole::Bos, SpecialRole::Eos, SpecialRole::Pad];

    /// Config attribute name for this role (`bos_token_id`, ...).
    pub fn attr(self) -> &'static str {
        match self {
            SpecialRole::Bos => "bos_token_id",
            SpecialRole::Eos => "eos_token_id",
            SpecialRole::Pad => "pad_token_id",
        }
    }

    /// tokenizer_config.json key holding this role's token (`bos_token`, ...).
    pub fn token_key(self) -> &'static str {
        match self {
            SpecialRole::Bos => "bos_token",
            SpecialRole::Eos => "eos_token",
            SpecialRole::Pad => "pad_token",
        }
    }
}

impl fmt::Display for SpecialRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attr())
    }
}

/// Special token ids declared by one model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialTokenIds {
    pub bos: Option<u32>,
    pub eos: Option<u32>,
    pub pad: Option<u32>,
    /// Whether the tokenizer prepends bos when encoding.
    #[serde(default)]
    pub add_bos: bool,
}

impl SpecialTokenIds {
    /// Id declared for `role`, if any.
    pub fn get(&self, role: SpecialRole) -> Option<u32> {
        match role {
            SpecialRole::Bos => self.bos,
            SpecialRole::Eos => self.eos,
            SpecialRole::Pad => self.pad,
        }
    }

    /// Sets the id for `role`.
    pub fn set(&mut self, role: SpecialRole, id: Option<u32>) {
        match role {
            SpecialRole::Bos => self.bos = id,
            SpecialRole::Eos => self.eos = id,
            SpecialRole::Pad => self.pad = id,
        }
    }

    /// True when the model actually feeds a bos token to the network.
    pub fn uses_bos(&self) -> bool {
        self.bos.is_some() && self.add_bos
    }
}
