//! Constructor-side API used by external parsers (and tests) to assemble a
//! [`SyntaxTree`] bottom-up.

use compact_str::CompactString;
use smallvec::SmallVec;

use super::{NodeId, SyntaxKind, SyntaxTree};

/// Builds a [`SyntaxTree`] from leaves upward.
///
/// Nodes are created detached and adopted when passed as children; the tree
/// is sealed by [`TreeBuilder::finish`] with the chosen root.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    tree: Option<SyntaxTree>,
}

impl TreeBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tree: Some(SyntaxTree::from_parts(Vec::new(), NodeId::placeholder())),
        }
    }

    fn tree_mut(&mut self) -> &mut SyntaxTree {
        // The option is only vacated by finish(), which consumes self.
        #[allow(clippy::unwrap_used)]
        self.tree.as_mut().unwrap()
    }

    /// Creates a leaf token with the given text payload.
    pub fn leaf(&mut self, kind: SyntaxKind, text: &str) -> NodeId {
        self.tree_mut()
            .alloc(kind, Some(CompactString::from(text)), SmallVec::new())
    }

    /// Shorthand for a whitespace leaf.
    pub fn whitespace(&mut self, text: &str) -> NodeId {
        self.leaf(SyntaxKind::Whitespace, text)
    }

    /// Creates a composite node adopting the given children in order.
    ///
    /// # Panics
    /// Panics if a child is already attached; builders construct each node
    /// exactly once, so reattachment is a bug in the caller.
    pub fn node(&mut self, kind: SyntaxKind, children: Vec<NodeId>) -> NodeId {
        #[allow(clippy::expect_used)]
        self.tree_mut()
            .new_node(kind, children)
            .expect("builder children must be detached")
    }

    /// Seals the tree with the given root node.
    ///
    /// # Panics
    /// Panics if the root is attached to a parent.
    #[must_use]
    pub fn finish(mut self, root: NodeId) -> SyntaxTree {
        #[allow(clippy::unwrap_used)]
        let mut tree = self.tree.take().unwrap();
        assert!(
            tree.parent(root).is_none(),
            "root node must not have a parent"
        );
        tree.set_root(root);
        tree
    }
}

impl NodeId {
    pub(crate) fn placeholder() -> Self {
        Self(0)
    }
}

impl SyntaxTree {
    pub(crate) fn set_root(&mut self, root: NodeId) {
        self.root = root;
    }
}
