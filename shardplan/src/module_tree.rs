//! Structural description of a model's module tree.
//!
//! The planner never touches tensors or weights; it only needs the shape
//! of the module hierarchy. [`Module`] is that shape: a class name, a
//! closed structural tag, and insertion-ordered named children. Adapters
//! build the tree once from whatever runtime actually hosts the model and
//! hand it to the planner read-only.

use std::fmt;

/// Closed structural classification of a module node.
///
/// The planner dispatches on this tag rather than on any runtime type
/// identity, so the adapter answers the capability question once, while
/// building the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// Dense/linear projection leaf (a matmul against a weight matrix).
    Linear,
    /// Normalization leaf (LayerNorm / RMSNorm).
    Norm,
    /// List-like container of repeated, structurally identical blocks
    /// (e.g. the stack of decoder layers).
    Repeated,
    /// Anything else: attention blocks, MLPs, embeddings, activations.
    Other,
}

/// A node in the model's module tree.
///
/// Children keep declaration order; layer classification and gem
/// extraction depend on it.
#[derive(Debug, Clone)]
pub struct Module {
    class_name: String,
    kind: ModuleKind,
    children: Vec<(String, Module)>,
}

impl Module {
    #[must_use]
    pub fn new(class_name: impl Into<String>, kind: ModuleKind) -> Self {
        Self {
            class_name: class_name.into(),
            kind,
            children: Vec::new(),
        }
    }

    /// Dense projection leaf.
    #[must_use]
    pub fn linear(class_name: impl Into<String>) -> Self {
        Self::new(class_name, ModuleKind::Linear)
    }

    /// Normalization leaf.
    #[must_use]
    pub fn norm(class_name: impl Into<String>) -> Self {
        Self::new(class_name, ModuleKind::Norm)
    }

    /// Homogeneous-repetition container.
    #[must_use]
    pub fn repeated(class_name: impl Into<String>) -> Self {
        Self::new(class_name, ModuleKind::Repeated)
    }

    /// Ordinary module.
    #[must_use]
    pub fn other(class_name: impl Into<String>) -> Self {
        Self::new(class_name, ModuleKind::Other)
    }

    /// Append a named child, builder-style.
    #[must_use]
    pub fn with_child(mut self, name: impl Into<String>, child: Module) -> Self {
        self.push_child(name, child);
        self
    }

    /// Append a named child.
    pub fn push_child(&mut self, name: impl Into<String>, child: Module) {
        self.children.push((name.into(), child));
    }

    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    #[must_use]
    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    /// Named children in declaration order.
    pub fn children(&self) -> impl Iterator<Item = (&str, &Module)> {
        self.children.iter().map(|(name, child)| (name.as_str(), child))
    }

    fn fmt_with_indent(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        write!(f, "{}(", self.class_name)?;
        if !self.children.is_empty() {
            for (name, child) in &self.children {
                write!(f, "\n{:indent$}({name}): ", "", indent = (depth + 1) * 2)?;
                child.fmt_with_indent(f, depth + 1)?;
            }
            write!(f, "\n{:indent$}", "", indent = depth * 2)?;
        }
        write!(f, ")")
    }
}

/// Renders the tree in the indented `(name): Class(...)` form that the
/// family matchers run against.
impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_with_indent(f, 0)
    }
}
