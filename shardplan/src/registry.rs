//! Registry of hand-written kernel injection policies.
//!
//! Some model families ship with a curated, hand-authored sharding policy
//! that bypasses automatic inference entirely. The planner never applies
//! those policies; it only asks the registry whether one covers the model,
//! so that failures can point the caller at the better alternative.

use std::collections::BTreeSet;

use crate::module_tree::Module;

/// A descriptor for one hand-authored policy.
///
/// Descriptors are inspected without a model attached, so implementations
/// must be constructible in a standalone, side-effect-free mode.
pub trait KernelPolicy {
    /// Class names of the upstream modules this policy was written
    /// against. Empty if the policy is not tied to a specific class.
    fn original_layer_classes(&self) -> Vec<String>;
}

/// Externally-owned collection of [`KernelPolicy`] descriptors.
#[derive(Default)]
pub struct KernelRegistry {
    policies: Vec<Box<dyn KernelPolicy>>,
}

impl KernelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, policy: impl KernelPolicy + 'static) {
        self.policies.push(Box::new(policy));
    }

    /// Union of every descriptor's declared layer classes.
    #[must_use]
    pub fn supported_classes(&self) -> BTreeSet<String> {
        self.policies
            .iter()
            .flat_map(|policy| policy.original_layer_classes())
            .collect()
    }

    /// Whether any of `modules` has a class some registered policy covers.
    #[must_use]
    pub fn covers_any(&self, modules: &[&Module]) -> bool {
        let supported = self.supported_classes();
        modules
            .iter()
            .any(|module| supported.contains(module.class_name()))
    }
}
