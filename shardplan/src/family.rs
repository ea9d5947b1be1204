//! Model-family name resolution.
//!
//! Derives a canonical family identifier (e.g. `llama`, `opt`) from the
//! rendered module tree. Matching runs over the tree's printable
//! description because upstream model libraries encode the family only in
//! their class names; the ordered fallback patterns below reproduce the
//! conventional `FooModel` / `FooStack` naming exactly.

use regex::Regex;

use crate::error::{Error, Result};

/// Families whose layer topology breaks the classification pass
/// (fused QKV projections, non-standard normalization placement).
pub const DEFAULT_DENY_LIST: &[&str] = &[
    "codegen",
    "deberta",
    "flaubert",
    "fsmt",
    "gpt2",
    "led",
    "longformer",
    "xlm",
    "xlnet",
];

fn re(s: &str) -> Regex {
    Regex::new(s).expect("built-in family matcher must compile")
}

/// Ordered list of family-name matchers.
///
/// Each pattern must carry one capture group holding the family name; the
/// first pattern that matches wins. The default list tries, in order:
///
/// 1. a `Model`-suffixed submodule class (`(model): LlamaModel(`),
/// 2. a `Stack`-suffixed submodule class (`(encoder): T5Stack(`),
/// 3. a `Model`-suffixed class at the start of the description.
pub struct FamilyResolver {
    matchers: Vec<Regex>,
}

impl Default for FamilyResolver {
    fn default() -> Self {
        Self::new(vec![
            re(r": (.*?)Model"),
            re(r": (.*?)Stack"),
            re(r"^(.*?)Model"),
        ])
    }
}

impl FamilyResolver {
    #[must_use]
    pub fn new(matchers: Vec<Regex>) -> Self {
        Self { matchers }
    }

    /// Resolve the family name from a rendered module tree.
    ///
    /// Returns the first capture of the first matching pattern, as
    /// written in the class name (callers lowercase for comparisons).
    ///
    /// # Errors
    /// Returns [`Error::FamilyNameUnresolved`] if no pattern matches.
    pub fn resolve(&self, description: &str) -> Result<String> {
        for matcher in &self.matchers {
            if let Some(captures) = matcher.captures(description) {
                if let Some(family) = captures.get(1) {
                    return Ok(family.as_str().to_string());
                }
            }
        }
        Err(Error::FamilyNameUnresolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_suffix_in_submodule() {
        let resolver = FamilyResolver::default();
        let desc = "LlamaForCausalLM(\n  (model): LlamaModel(\n    (layers): ModuleList()\n  )\n)";
        assert_eq!(resolver.resolve(desc).unwrap(), "Llama");
    }

    #[test]
    fn test_stack_fallback() {
        let resolver = FamilyResolver::default();
        let desc = "T5ForConditionalGeneration(\n  (encoder): T5Stack(\n    (block): ModuleList()\n  )\n)";
        assert_eq!(resolver.resolve(desc).unwrap(), "T5");
    }

    #[test]
    fn test_anchored_model_fallback() {
        let resolver = FamilyResolver::default();
        let desc = "GPTNeoXModel(\n  (embed_in): Embedding()\n)";
        assert_eq!(resolver.resolve(desc).unwrap(), "GPTNeoX");
    }

    #[test]
    fn test_leftmost_match_wins() {
        let resolver = FamilyResolver::default();
        let desc = "Wrapper(\n  (a): FooModel()\n  (b): BarModel()\n)";
        assert_eq!(resolver.resolve(desc).unwrap(), "Foo");
    }

    #[test]
    fn test_unresolved() {
        let resolver = FamilyResolver::default();
        let err = resolver.resolve("Sequential(\n  (0): Linear()\n)").unwrap_err();
        assert!(matches!(err, Error::FamilyNameUnresolved));
    }
}
