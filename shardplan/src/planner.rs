//! Automatic tensor-parallelism policy inference.
//!
//! The planner walks the module tree in four passes: discover the repeated
//! block classes, validate the model family against the deny-list,
//! classify each representative block's layers into an ordered tag
//! sequence, and scan that sequence for gems. The result is merged into a
//! single [`Policy`].

use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::family::{FamilyResolver, DEFAULT_DENY_LIST};
use crate::module_tree::{Module, ModuleKind};
use crate::policy::{GemSet, Policy};
use crate::registry::KernelRegistry;

/// Classification of one child slot of a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerTag {
    /// Path-qualified dense projection, e.g. `self_attn.q_proj` or `.fc1`.
    Proj(String),
    /// Normalization layer.
    Norm,
}

/// Substrings marking projections whose output dimension must not be
/// split without an all-reduce.
const ROW_PARALLEL_MARKERS: &[&str] = &["out_proj", "o_proj", "down_proj"];

/// Infers a [`Policy`] from a model's module tree.
///
/// The family resolver, deny-list, and kernel registry are all injectable
/// so callers (and tests) can substitute their own; the defaults match
/// the stock transformer-library naming conventions.
pub struct TpPlanner {
    resolver: FamilyResolver,
    deny_list: BTreeSet<String>,
    registry: KernelRegistry,
}

impl Default for TpPlanner {
    fn default() -> Self {
        Self::new()
    }
}

impl TpPlanner {
    #[must_use]
    pub fn new() -> Self {
        Self {
            resolver: FamilyResolver::default(),
            deny_list: DEFAULT_DENY_LIST.iter().map(|f| (*f).to_string()).collect(),
            registry: KernelRegistry::new(),
        }
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: FamilyResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replace the deny-list. Entries are compared case-insensitively.
    #[must_use]
    pub fn with_deny_list(mut self, families: impl IntoIterator<Item = String>) -> Self {
        self.deny_list = families.into_iter().map(|f| f.to_lowercase()).collect();
        self
    }

    #[must_use]
    pub fn with_registry(mut self, registry: KernelRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Infer the sharding policy for `model`.
    ///
    /// # Errors
    /// Returns [`Error::FamilyNameUnresolved`] if no family matcher
    /// applies, [`Error::UnsupportedFamily`] for deny-listed families, and
    /// [`Error::NoShardableLayers`] if no repeated block carries gems. The
    /// latter two report whether a hand-written kernel policy would cover
    /// the model instead.
    pub fn plan(&self, model: &Module) -> Result<Policy> {
        let blocks = discover_repeated_blocks(model);
        tracing::debug!(blocks = blocks.len(), "discovered repeated block classes");

        let family = self.resolver.resolve(&model.to_string())?;
        tracing::debug!(family = %family, "resolved model family");
        if self.deny_list.contains(&family.to_lowercase()) {
            return Err(Error::UnsupportedFamily {
                family,
                kernel_available: self.registry.covers_any(&blocks),
            });
        }

        let mut policy = Policy::default();
        for block in &blocks {
            let tags = classify_layers("", block);
            let gems = extract_gems(&tags);
            tracing::debug!(
                class = block.class_name(),
                tags = tags.len(),
                gems = gems.len(),
                "classified block"
            );
            if !gems.is_empty() {
                policy.merge(block.class_name(), gems);
            }
        }

        if policy.is_empty() {
            return Err(Error::NoShardableLayers {
                kernel_available: self.registry.covers_any(&blocks),
            });
        }
        Ok(policy)
    }
}

/// Collect one representative module per distinct class found inside
/// repetition containers, in depth-first first-occurrence order.
///
/// Modules that are direct named children (not wrapped in any repetition
/// container) are intentionally invisible to this pass: the shardable
/// block of the supported architectures is always a repeated list.
#[must_use]
pub fn discover_repeated_blocks(root: &Module) -> Vec<&Module> {
    let mut region = Vec::new();
    collect_repeated(root, &mut region);
    region
}

fn collect_repeated<'a>(node: &'a Module, region: &mut Vec<&'a Module>) {
    for (_, child) in node.children() {
        if child.kind() == ModuleKind::Repeated {
            for (_, member) in child.children() {
                if !region.iter().any(|m| m.class_name() == member.class_name()) {
                    region.push(member);
                }
            }
        } else {
            collect_repeated(child, region);
        }
    }
}

/// Classify a module's children into an ordered tag sequence.
///
/// `context` is the immediate parent's key: leaf projection tags render
/// as `{context}.{key}`, and recursion replaces the context with the
/// child's own key rather than accumulating a full path. Top-level calls
/// pass an empty context, which yields the `.{key}` form for a block's
/// direct projections.
///
/// A child named `LayerNorm` or `layer_norm` counts as normalization even
/// if its structural kind says otherwise, matching how some families name
/// custom norm implementations.
#[must_use]
pub fn classify_layers(context: &str, module: &Module) -> Vec<LayerTag> {
    let mut tags = Vec::new();
    for (key, child) in module.children() {
        if child.kind() == ModuleKind::Linear {
            tags.push(LayerTag::Proj(format!("{context}.{key}")));
        } else if child.kind() == ModuleKind::Norm || key == "LayerNorm" || key == "layer_norm" {
            tags.push(LayerTag::Norm);
        } else {
            tags.extend(classify_layers(key, child));
        }
    }
    tags
}

/// Scan a tag sequence for gems.
///
/// A normalization tag claims its immediately preceding projection (a
/// leading norm has no predecessor and claims nothing; consecutive norms
/// only claim once). Projections matching the row-parallel name markers
/// are recorded regardless of adjacency.
#[must_use]
pub fn extract_gems(tags: &[LayerTag]) -> GemSet {
    let mut gems = GemSet::new();
    for (i, tag) in tags.iter().enumerate() {
        match tag {
            LayerTag::Norm => {
                if i > 0 {
                    if let LayerTag::Proj(name) = &tags[i - 1] {
                        gems.insert(name.clone());
                    }
                }
            }
            LayerTag::Proj(name) => {
                if ROW_PARALLEL_MARKERS.iter().any(|marker| name.contains(marker)) {
                    gems.insert(name.clone());
                }
            }
        }
    }
    gems
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proj(name: &str) -> LayerTag {
        LayerTag::Proj(name.to_string())
    }

    fn attention_block() -> Module {
        Module::other("Attention")
            .with_child("q_proj", Module::linear("Linear"))
            .with_child("k_proj", Module::linear("Linear"))
            .with_child("v_proj", Module::linear("Linear"))
            .with_child("o_proj", Module::linear("Linear"))
    }

    fn decoder_layer() -> Module {
        Module::other("DecoderLayer")
            .with_child("self_attn", attention_block())
            .with_child("fc1", Module::linear("Linear"))
            .with_child("fc2", Module::linear("Linear"))
            .with_child("final_layer_norm", Module::norm("LayerNorm"))
    }

    fn model_with_layers(layers: Vec<Module>) -> Module {
        let mut list = Module::repeated("ModuleList");
        for (i, layer) in layers.into_iter().enumerate() {
            list.push_child(i.to_string(), layer);
        }
        Module::other("TestForCausalLM").with_child(
            "model",
            Module::other("TestModel").with_child("layers", list),
        )
    }

    #[test]
    fn test_discovery_dedups_by_class_name() {
        let model = model_with_layers(vec![decoder_layer(), decoder_layer(), decoder_layer()]);
        let blocks = discover_repeated_blocks(&model);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].class_name(), "DecoderLayer");
    }

    #[test]
    fn test_discovery_keeps_first_occurrence_order() {
        let mut list = Module::repeated("ModuleList");
        list.push_child("0", Module::other("BlockA"));
        list.push_child("1", Module::other("BlockB"));
        list.push_child("2", Module::other("BlockA"));
        let model = Module::other("Root").with_child("layers", list);

        let classes: Vec<&str> = discover_repeated_blocks(&model)
            .iter()
            .map(|m| m.class_name())
            .collect();
        assert_eq!(classes, ["BlockA", "BlockB"]);
    }

    #[test]
    fn test_discovery_ignores_unrepeated_modules() {
        let model = Module::other("Root")
            .with_child("standalone", decoder_layer())
            .with_child(
                "inner",
                Module::other("Inner").with_child(
                    "layers",
                    Module::repeated("ModuleList").with_child("0", Module::other("BlockC")),
                ),
            );

        let classes: Vec<&str> = discover_repeated_blocks(&model)
            .iter()
            .map(|m| m.class_name())
            .collect();
        assert_eq!(classes, ["BlockC"]);
    }

    #[test]
    fn test_classification_qualifies_with_parent_key() {
        let tags = classify_layers("", &decoder_layer());
        assert_eq!(
            tags,
            vec![
                proj("self_attn.q_proj"),
                proj("self_attn.k_proj"),
                proj("self_attn.v_proj"),
                proj("self_attn.o_proj"),
                proj(".fc1"),
                proj(".fc2"),
                LayerTag::Norm,
            ]
        );
    }

    #[test]
    fn test_classification_context_is_immediate_parent_only() {
        // Two levels of nesting: the leaf tag carries only the innermost key.
        let block = Module::other("Block").with_child(
            "outer",
            Module::other("Outer")
                .with_child("inner", Module::other("Inner").with_child("wo", Module::linear("Linear"))),
        );
        assert_eq!(classify_layers("", &block), vec![proj("inner.wo")]);
    }

    #[test]
    fn test_classification_norm_by_child_name() {
        let block = Module::other("Block")
            .with_child("layer_norm", Module::other("T5LayerNorm"))
            .with_child("LayerNorm", Module::other("CustomNorm"));
        assert_eq!(classify_layers("", &block), vec![LayerTag::Norm, LayerTag::Norm]);
    }

    #[test]
    fn test_gem_claims_projection_before_norm() {
        let tags = vec![proj(".a"), LayerTag::Norm, proj(".b"), proj(".c")];
        let gems = extract_gems(&tags);
        assert_eq!(gems.len(), 1);
        assert!(gems.contains(".a"));
    }

    #[test]
    fn test_consecutive_norms_claim_once() {
        let tags = vec![proj(".a"), LayerTag::Norm, LayerTag::Norm];
        let gems = extract_gems(&tags);
        assert_eq!(gems.len(), 1);
        assert!(gems.contains(".a"));
    }

    #[test]
    fn test_leading_norm_claims_nothing() {
        let tags = vec![LayerTag::Norm, proj(".a")];
        assert!(extract_gems(&tags).is_empty());
    }

    #[test]
    fn test_row_parallel_markers_without_norm() {
        let tags = vec![proj(".q_proj"), proj(".k_proj"), proj("mlp.down_proj")];
        let gems = extract_gems(&tags);
        assert_eq!(gems.len(), 1);
        assert!(gems.contains("mlp.down_proj"));
    }

    #[test]
    fn test_plan_collects_gems() {
        let model = model_with_layers(vec![decoder_layer(), decoder_layer()]);
        let policy = TpPlanner::new().plan(&model).unwrap();

        assert_eq!(policy.len(), 1);
        let gems = policy.gems_for("DecoderLayer").unwrap();
        // o_proj by marker, .fc2 by norm adjacency.
        assert!(gems.contains("self_attn.o_proj"));
        assert!(gems.contains(".fc2"));
        assert_eq!(gems.len(), 2);
    }

    #[test]
    fn test_plan_norm_only_model_fails() {
        let norm_layer = Module::other("NormLayer")
            .with_child("ln_1", Module::norm("LayerNorm"))
            .with_child("ln_2", Module::norm("LayerNorm"));
        let model = model_with_layers(vec![norm_layer]);

        let err = TpPlanner::new().plan(&model).unwrap_err();
        assert!(matches!(
            err,
            Error::NoShardableLayers {
                kernel_available: false
            }
        ));
    }

    #[test]
    fn test_plan_deny_listed_family_fails() {
        let mut list = Module::repeated("ModuleList");
        list.push_child("0", decoder_layer());
        let model = Module::other("GPT2LMHeadModel").with_child(
            "transformer",
            Module::other("GPT2Model").with_child("h", list),
        );

        let err = TpPlanner::new().plan(&model).unwrap_err();
        match err {
            Error::UnsupportedFamily { family, .. } => assert_eq!(family, "GPT2"),
            other => panic!("expected UnsupportedFamily, got {other}"),
        }
    }

    #[test]
    fn test_plan_custom_deny_list_is_case_insensitive() {
        let model = model_with_layers(vec![decoder_layer()]);
        let planner = TpPlanner::new().with_deny_list(["TEST".to_string()]);

        let err = planner.plan(&model).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFamily { .. }));
    }

    #[test]
    fn test_plan_reports_kernel_availability() {
        struct DecoderPolicy;
        impl crate::registry::KernelPolicy for DecoderPolicy {
            fn original_layer_classes(&self) -> Vec<String> {
                vec!["NormLayer".to_string()]
            }
        }

        let norm_layer = Module::other("NormLayer").with_child("ln", Module::norm("LayerNorm"));
        let model = model_with_layers(vec![norm_layer]);

        let mut registry = KernelRegistry::new();
        registry.register(DecoderPolicy);
        let err = TpPlanner::new().with_registry(registry).plan(&model).unwrap_err();

        assert!(matches!(
            err,
            Error::NoShardableLayers {
                kernel_available: true
            }
        ));
        assert!(err.to_string().contains("kernel injection"));
    }

    #[test]
    fn test_plan_is_idempotent() {
        let model = model_with_layers(vec![decoder_layer()]);
        let planner = TpPlanner::new();
        assert_eq!(planner.plan(&model).unwrap(), planner.plan(&model).unwrap());
    }
}
