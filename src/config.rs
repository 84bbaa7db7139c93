//! Configuration types for vocab-transplant.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Decay factor for combining multi-token output-head rows.
///
/// - `0.0`: first donor token only
/// - `0.5`: weights 1, 0.5, 0.25, ... (normalized)
/// - `1.0`: uniform arithmetic mean
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct DecayFactor(f64);

impl DecayFactor {
    /// Creates a decay factor, rejecting values outside `[0, 1]` (and NaN).
    pub fn new(value: f64) -> Result<Self> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(Error::InvalidDecayFactor(value))
        }
    }

    /// The raw factor.
    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for DecayFactor {
    fn default() -> Self {
        Self(0.5)
    }
}

impl TryFrom<f64> for DecayFactor {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<DecayFactor> for f64 {
    fn from(factor: DecayFactor) -> Self {
        factor.0
    }
}

/// A manual mapping from a target token to a donor-side string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenOverride {
    /// Target token, matched by string identity.
    pub target: String,
    /// Donor-side text, re-tokenized by the donor tokenizer.
    pub donor: String,
}

impl TokenOverride {
    /// Creates a new override.
    pub fn new(target: impl Into<String>, donor: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            donor: donor.into(),
        }
    }

    /// Donor text with literal `\n` sequences turned into real newlines.
    ///
    /// Shell arguments like `"<|im_start|>user\n"` otherwise encode as the
    /// two characters `\` and `n`.
    pub fn donor_text(&self) -> String {
        self.donor.replace("\\n", "\n")
    }
}

/// Transplant run configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransplantConfig {
    /// Decay factor for multi-token output-head rows.
    #[serde(default)]
    pub decay_factor: DecayFactor,
    /// Manual token overrides, in the order they were given.
    #[serde(default)]
    pub overrides: Vec<TokenOverride>,
    /// Load and save in f32 on the CPU.
    #[serde(default)]
    pub use_cpu_only: bool,
    /// Replace an existing output directory.
    #[serde(default)]
    pub overwrite: bool,
    /// Print one line per transplanted token.
    #[serde(default)]
    pub verbose: bool,
}

impl TransplantConfig {
    /// Creates a config with the given decay factor.
    pub fn new(decay_factor: DecayFactor) -> Self {
        Self {
            decay_factor,
            ..Default::default()
        }
    }

    /// Append a manual override.
    pub fn with_override(mut self, target: impl Into<String>, donor: impl Into<String>) -> Self {
        self.overrides.push(TokenOverride::new(target, donor));
        self
    }

    /// Load and save in f32 on the CPU.
    pub fn cpu_only(mut self, enabled: bool) -> Self {
        self.use_cpu_only = enabled;
        self
    }

    /// Replace an existing output directory.
    pub fn overwrite(mut self, enabled: bool) -> Self {
        self.overwrite = enabled;
        self
    }

    /// Print one line per transplanted token.
    pub fn verbose(mut self, enabled: bool) -> Self {
        self.verbose = enabled;
        self
    }

    /// Reads overrides from a JSON array of `{"target": .., "donor": ..}` objects.
    pub fn load_overrides(path: &std::path::Path) -> Result<Vec<TokenOverride>> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;
        let overrides: Vec<TokenOverride> = serde_json::from_str(&content)?;
        Ok(overrides)
    }
}
