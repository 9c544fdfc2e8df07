//! Lossless concrete syntax tree with in-place mutation support.
//!
//! Nodes live in a per-file arena and are addressed by [`NodeId`]. Parent
//! links are navigation-only; ownership is strictly child-in-parent, so the
//! structure is a tree even though ids make arbitrary references cheap.
//! Whitespace and comments are first-class nodes, which keeps `text()` a
//! faithful round-trip of the original source.

mod builder;
pub mod position;

pub use builder::TreeBuilder;

use compact_str::CompactString;
use smallvec::SmallVec;

/// Closed set of node kinds produced by the external Kotlin parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum SyntaxKind {
    File,
    Class,
    ClassBody,
    Fun,
    Property,
    Block,
    CallExpression,
    ValueArgumentList,
    ValueArgument,
    ValueParameterList,
    ValueParameter,
    SuperTypeList,
    SuperTypeCallEntry,
    TypeParameterList,
    TypeParameter,
    LambdaExpression,
    FunctionLiteral,
    StringTemplate,
    BinaryExpression,
    DotQualifiedExpression,
    OperationReference,
    When,
    WhenEntry,
    AnnotationEntry,
    Whitespace,
    EolComment,
    BlockComment,
    KDoc,
    LPar,
    RPar,
    LBrace,
    RBrace,
    Comma,
    Identifier,
    Keyword,
    Literal,
    Operator,
}

impl SyntaxKind {
    /// Whether this kind is a comment (EOL, block, or KDoc).
    #[must_use]
    pub fn is_comment(self) -> bool {
        matches!(self, Self::EolComment | Self::BlockComment | Self::KDoc)
    }

    /// Whether this kind is a whitespace token.
    #[must_use]
    pub fn is_whitespace(self) -> bool {
        matches!(self, Self::Whitespace)
    }
}

/// Stable index of a node within its file's [`SyntaxTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: SyntaxKind,
    /// Leaf token payload; `None` for composite nodes.
    text: Option<CompactString>,
    children: SmallVec<[NodeId; 4]>,
    parent: Option<NodeId>,
}

/// Error raised by a tree mutation that would corrupt the tree.
///
/// These are programming errors in a rule, not recoverable runtime
/// conditions: the engine aborts the offending rule's application for the
/// current node and continues with the next one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    /// The given node is not a child of the given parent.
    #[error("{child:?} node is not a child of {parent:?} node")]
    NotAChild {
        /// Kind of the alleged parent.
        parent: SyntaxKind,
        /// Kind of the alleged child.
        child: SyntaxKind,
    },
    /// A node that already has a parent cannot be attached elsewhere.
    #[error("{kind:?} node is already attached to a parent")]
    AlreadyAttached {
        /// Kind of the offending node.
        kind: SyntaxKind,
    },
    /// Text payloads exist on leaf tokens only.
    #[error("text can only be set on a leaf token, not on a {kind:?} node")]
    NotALeaf {
        /// Kind of the offending node.
        kind: SyntaxKind,
    },
    /// The anchor of an insertion has no parent to insert into.
    #[error("{kind:?} node has no parent; cannot insert relative to it")]
    NoParent {
        /// Kind of the anchor node.
        kind: SyntaxKind,
    },
    /// Removing one half of a delimiter pair leaves an unparseable tree.
    #[error("removing {kind:?} would leave its matching delimiter unbalanced")]
    UnbalancedDelimiter {
        /// Kind of the delimiter being removed.
        kind: SyntaxKind,
    },
}

/// A mutable, lossless concrete syntax tree for one file.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl SyntaxTree {
    pub(crate) fn from_parts(nodes: Vec<NodeData>, root: NodeId) -> Self {
        Self { nodes, root }
    }

    fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.index()]
    }

    pub(crate) fn alloc(
        &mut self,
        kind: SyntaxKind,
        text: Option<CompactString>,
        children: SmallVec<[NodeId; 4]>,
    ) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(NodeData {
            kind,
            text,
            children,
            parent: None,
        });
        id
    }

    /// Root node of the file.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Kind of the given node.
    #[must_use]
    pub fn kind(&self, id: NodeId) -> SyntaxKind {
        self.node(id).kind
    }

    /// Whether the node is a leaf token (carries a text payload).
    #[must_use]
    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.node(id).text.is_some()
    }

    /// Ordered children of the node.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Parent of the node, if attached.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Next sibling under the same parent.
    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&c| c == id)?;
        siblings.get(pos + 1).copied()
    }

    /// Previous sibling under the same parent.
    #[must_use]
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&c| c == id)?;
        pos.checked_sub(1).map(|p| siblings[p])
    }

    /// Text payload of a leaf token; `None` for composite nodes.
    #[must_use]
    pub fn leaf_text(&self, id: NodeId) -> Option<&str> {
        self.node(id).text.as_deref()
    }

    /// Source text of the node: the leaf payload, or the concatenation of
    /// the children's text for composite nodes.
    #[must_use]
    pub fn text(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        if let Some(text) = self.leaf_text(id) {
            out.push_str(text);
        } else {
            for &child in self.children(id) {
                self.collect_text(child, out);
            }
        }
    }

    /// Length in bytes of the node's text, recomputed from the current tree.
    #[must_use]
    pub fn text_len(&self, id: NodeId) -> usize {
        if let Some(text) = self.leaf_text(id) {
            text.len()
        } else {
            self.children(id).iter().map(|&c| self.text_len(c)).sum()
        }
    }

    /// Byte offset of the node's start within the root text, derived from
    /// the current tree shape. Never cached, so it is always consistent
    /// with prior mutations.
    #[must_use]
    pub fn start_offset(&self, id: NodeId) -> usize {
        let mut offset = 0;
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            for &sibling in self.children(parent) {
                if sibling == current {
                    break;
                }
                offset += self.text_len(sibling);
            }
            current = parent;
        }
        offset
    }

    /// First leaf token within the node's subtree (the node itself if leaf).
    #[must_use]
    pub fn first_leaf(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(&child) = self.children(current).first() {
            current = child;
        }
        current
    }

    /// Last leaf token within the node's subtree (the node itself if leaf).
    #[must_use]
    pub fn last_leaf(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(&child) = self.children(current).last() {
            current = child;
        }
        current
    }

    /// Leaf token immediately preceding the node in source order.
    #[must_use]
    pub fn prev_leaf(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            if let Some(prev) = self.prev_sibling(current) {
                return Some(self.last_leaf(prev));
            }
            current = self.parent(current)?;
        }
    }

    /// Leaf token immediately following the node in source order.
    #[must_use]
    pub fn next_leaf(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            if let Some(next) = self.next_sibling(current) {
                return Some(self.first_leaf(next));
            }
            current = self.parent(current)?;
        }
    }

    /// Whether the node is a whitespace token containing a line break.
    #[must_use]
    pub fn is_whitespace_with_newline(&self, id: NodeId) -> bool {
        self.kind(id) == SyntaxKind::Whitespace
            && self.leaf_text(id).is_some_and(|t| t.contains('\n'))
    }

    /// Whether the node is a raw (triple-quoted) string literal.
    #[must_use]
    pub fn is_raw_string(&self, id: NodeId) -> bool {
        self.kind(id) == SyntaxKind::StringTemplate && self.text(id).starts_with("\"\"\"")
    }

    /// Whether a line break separates two siblings, answered by scanning the
    /// whitespace and comment nodes between them rather than by comparing
    /// positions (positions may be stale mid-pass).
    #[must_use]
    pub fn has_newline_between(&self, a: NodeId, b: NodeId) -> bool {
        let mut current = self.next_sibling(a);
        while let Some(node) = current {
            if node == b {
                return false;
            }
            if self.is_whitespace_with_newline(node) {
                return true;
            }
            current = self.next_sibling(node);
        }
        false
    }

    /// Text on the line before the node's first leaf, up to but excluding
    /// the node itself.
    #[must_use]
    pub fn line_prefix(&self, id: NodeId) -> String {
        let mut prefix = String::new();
        let mut current = self.prev_leaf(self.first_leaf(id));
        while let Some(leaf) = current {
            let text = self.leaf_text(leaf).unwrap_or("");
            if let Some(pos) = text.rfind('\n') {
                prefix.insert_str(0, &text[pos + 1..]);
                break;
            }
            prefix.insert_str(0, text);
            current = self.prev_leaf(leaf);
        }
        prefix
    }

    /// Leading whitespace of the line on which the node starts.
    #[must_use]
    pub fn line_indent(&self, id: NodeId) -> String {
        self.line_prefix(id)
            .chars()
            .take_while(|c| *c == ' ' || *c == '\t')
            .collect()
    }

    /// Character count of the full line containing the node's start.
    #[must_use]
    pub fn line_length_at(&self, id: NodeId) -> usize {
        let mut len = self.line_prefix(id).chars().count();
        let mut current = Some(self.first_leaf(id));
        while let Some(leaf) = current {
            let text = self.leaf_text(leaf).unwrap_or("");
            if let Some(pos) = text.find('\n') {
                len += text[..pos].chars().count();
                return len;
            }
            len += text.chars().count();
            current = self.next_leaf(leaf);
        }
        len
    }

    /// Creates a detached leaf token.
    pub fn new_leaf(&mut self, kind: SyntaxKind, text: &str) -> NodeId {
        self.alloc(kind, Some(CompactString::from(text)), SmallVec::new())
    }

    /// Creates a composite node owning the given (detached) children.
    pub fn new_node(
        &mut self,
        kind: SyntaxKind,
        children: Vec<NodeId>,
    ) -> Result<NodeId, MutationError> {
        for &child in &children {
            if self.parent(child).is_some() {
                return Err(MutationError::AlreadyAttached {
                    kind: self.kind(child),
                });
            }
        }
        let id = self.alloc(kind, None, SmallVec::from_vec(children));
        for i in 0..self.children(id).len() {
            let child = self.children(id)[i];
            self.node_mut(child).parent = Some(id);
        }
        Ok(id)
    }

    /// Inserts a detached node before `anchor` under the anchor's parent.
    /// The mutation is local and immediate; later rules in the same pass
    /// observe it.
    pub fn insert_before(&mut self, anchor: NodeId, new: NodeId) -> Result<(), MutationError> {
        let parent = self.parent(anchor).ok_or(MutationError::NoParent {
            kind: self.kind(anchor),
        })?;
        self.attach(parent, anchor, new, 0)
    }

    /// Inserts a detached node after `anchor` under the anchor's parent.
    pub fn insert_after(&mut self, anchor: NodeId, new: NodeId) -> Result<(), MutationError> {
        let parent = self.parent(anchor).ok_or(MutationError::NoParent {
            kind: self.kind(anchor),
        })?;
        self.attach(parent, anchor, new, 1)
    }

    fn attach(
        &mut self,
        parent: NodeId,
        anchor: NodeId,
        new: NodeId,
        offset: usize,
    ) -> Result<(), MutationError> {
        if self.parent(new).is_some() {
            return Err(MutationError::AlreadyAttached {
                kind: self.kind(new),
            });
        }
        let pos = self
            .children(parent)
            .iter()
            .position(|&c| c == anchor)
            .ok_or(MutationError::NotAChild {
                parent: self.kind(parent),
                child: self.kind(anchor),
            })?;
        self.node_mut(parent).children.insert(pos + offset, new);
        self.node_mut(new).parent = Some(parent);
        Ok(())
    }

    /// Detaches a child from its parent. Deleting one half of a delimiter
    /// pair while the other remains is rejected as unparseable.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), MutationError> {
        let pos = self
            .children(parent)
            .iter()
            .position(|&c| c == child)
            .ok_or(MutationError::NotAChild {
                parent: self.kind(parent),
                child: self.kind(child),
            })?;
        let kind = self.kind(child);
        let counterpart = match kind {
            SyntaxKind::LPar => Some(SyntaxKind::RPar),
            SyntaxKind::RPar => Some(SyntaxKind::LPar),
            SyntaxKind::LBrace => Some(SyntaxKind::RBrace),
            SyntaxKind::RBrace => Some(SyntaxKind::LBrace),
            _ => None,
        };
        if let Some(counterpart) = counterpart {
            let still_paired = self
                .children(parent)
                .iter()
                .any(|&c| c != child && self.kind(c) == counterpart);
            if still_paired {
                return Err(MutationError::UnbalancedDelimiter { kind });
            }
        }
        self.node_mut(parent).children.remove(pos);
        self.node_mut(child).parent = None;
        Ok(())
    }

    /// Replaces a child with a detached node, detaching the old child.
    pub fn replace_child(
        &mut self,
        parent: NodeId,
        old: NodeId,
        new: NodeId,
    ) -> Result<(), MutationError> {
        if self.parent(new).is_some() {
            return Err(MutationError::AlreadyAttached {
                kind: self.kind(new),
            });
        }
        let pos = self
            .children(parent)
            .iter()
            .position(|&c| c == old)
            .ok_or(MutationError::NotAChild {
                parent: self.kind(parent),
                child: self.kind(old),
            })?;
        self.node_mut(parent).children[pos] = new;
        self.node_mut(old).parent = None;
        self.node_mut(new).parent = Some(parent);
        Ok(())
    }

    /// Replaces the text payload of a leaf token.
    pub fn set_leaf_text(&mut self, id: NodeId, text: &str) -> Result<(), MutationError> {
        let kind = self.kind(id);
        let node = self.node_mut(id);
        if node.text.is_none() {
            return Err(MutationError::NotALeaf { kind });
        }
        node.text = Some(CompactString::from(text));
        Ok(())
    }
}
