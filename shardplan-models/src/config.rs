//! Architecture descriptor parsed from HF-style config fragments.

use serde::Deserialize;
use std::path::Path;

use shardplan::{Error, Module, Result};

/// The subset of a model's `config.json` the tree builders need.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelDescriptor {
    /// Family key, e.g. `llama` (the `model_type` field).
    pub model_type: String,

    /// Exported architecture class names, e.g. `["LlamaForCausalLM"]`.
    #[serde(default)]
    pub architectures: Vec<String>,

    /// Number of repeated decoder blocks.
    #[serde(default = "default_num_hidden_layers")]
    pub num_hidden_layers: usize,
}

fn default_num_hidden_layers() -> usize {
    2
}

impl ModelDescriptor {
    /// Load a descriptor from a JSON file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let descriptor: Self = serde_json::from_str(&content)?;
        Ok(descriptor)
    }

    /// Build the structural module tree for this descriptor's family.
    ///
    /// # Errors
    /// Returns [`Error::UnknownArchitecture`] if `model_type` is not a
    /// known family.
    pub fn build_tree(&self) -> Result<Module> {
        match self.model_type.as_str() {
            "llama" => Ok(crate::families::llama(self.num_hidden_layers)),
            "opt" => Ok(crate::families::opt(self.num_hidden_layers)),
            "t5" => Ok(crate::families::t5(self.num_hidden_layers)),
            "gpt2" => Ok(crate::families::gpt2(self.num_hidden_layers)),
            other => Err(Error::UnknownArchitecture(other.to_string())),
        }
    }
}
