//! Shard-strategy mapping for classified layers.
//!
//! Translates an inferred [`Policy`](crate::Policy) into per-layer
//! partition strategies. Gems are row-parallel (their output dimension
//! must be reassembled with an all-reduce, so their normalization partner
//! stays with them); every other projection is column-parallel; norms are
//! replicated. Applying the strategies to actual weight tensors is a
//! downstream concern.

use serde::{Deserialize, Serialize};

use crate::module_tree::Module;
use crate::planner::{classify_layers, LayerTag};
use crate::policy::GemSet;

/// How a layer's weight should be partitioned across a tensor-parallel
/// group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardStrategy {
    /// Keep a full copy on every rank (norms, embeddings).
    Replicate,
    /// Split along the output dimension (`q_proj`, `k_proj`, `v_proj`,
    /// `gate_proj`, `up_proj`, ...).
    Column,
    /// Split along the input dimension; requires an all-reduce after the
    /// matmul (`o_proj`, `out_proj`, `down_proj`, norm-adjacent gems).
    Row,
}

/// Strategy for a single classified tag under a block's gem set.
#[must_use]
pub fn shard_strategy_for_tag(tag: &LayerTag, gems: &GemSet) -> ShardStrategy {
    match tag {
        LayerTag::Norm => ShardStrategy::Replicate,
        LayerTag::Proj(name) if gems.contains(name) => ShardStrategy::Row,
        LayerTag::Proj(_) => ShardStrategy::Column,
    }
}

/// Classify `block` and pair each projection tag with its strategy.
///
/// Normalization layers are always replicated and are omitted from the
/// plan.
#[must_use]
pub fn partition_plan(block: &Module, gems: &GemSet) -> Vec<(String, ShardStrategy)> {
    classify_layers("", block)
        .into_iter()
        .filter_map(|tag| {
            let strategy = shard_strategy_for_tag(&tag, gems);
            match tag {
                LayerTag::Proj(name) => Some((name, strategy)),
                LayerTag::Norm => None,
            }
        })
        .collect()
}
