//! Model-family structural descriptions for shardplan
//!
//! Builders that produce the module tree for known architecture families,
//! plus a serde descriptor for dispatching from HF-style `config.json`
//! fragments. Only the hierarchy matters here — no weights, no dims.

mod config;
mod families;

pub use config::ModelDescriptor;
pub use families::{gpt2, llama, opt, t5};
