//! Error types for shardplan

use thiserror::Error;

/// Result type alias using shardplan's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for policy inference
#[derive(Error, Debug)]
pub enum Error {
    /// No family matcher produced a name from the rendered module tree.
    #[error("not able to determine the model family automatically; please provide an explicit policy")]
    FamilyNameUnresolved,

    /// The resolved family is on the deny-list: its layer topology breaks
    /// the assumptions of automatic classification.
    #[error("automatic tensor parallelism is not supported for the `{family}` model family; {}", kernel_advice(.kernel_available))]
    UnsupportedFamily {
        family: String,
        kernel_available: bool,
    },

    /// Classification found no gem-bearing blocks anywhere in the tree.
    #[error("no shardable projection layers found in any repeated block; {}", kernel_advice(.kernel_available))]
    NoShardableLayers { kernel_available: bool },

    #[error("unknown architecture: {0}")]
    UnknownArchitecture(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

fn kernel_advice(kernel_available: &bool) -> &'static str {
    if *kernel_available {
        "a kernel injection policy exists for this model, use kernel injection instead"
    } else {
        "please provide an explicit policy"
    }
}
