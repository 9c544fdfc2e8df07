//! Rule abstraction: the capability interface every style rule implements,
//! plus the violation record consumed by external reporters.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::config::ResolvedConfig;
use crate::tree::{MutationError, NodeId, SyntaxKind, SyntaxTree};

/// Module containing rule id constants.
pub mod ids;

/// Argument/parameter/super-type list wrapping rule.
pub mod argument_list_wrapping;
/// Indentation rule.
pub mod indentation;

/// Stable, namespaced rule identifier (`ruleset:name`).
///
/// Used for suppression lookups, dependency declarations, and per-rule
/// configuration keys. Unique within a loaded rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleId {
    /// Name of the rule set the rule belongs to.
    pub ruleset: &'static str,
    /// Short rule name within the rule set.
    pub name: &'static str,
}

impl RuleId {
    /// Creates a rule id from its rule set and short name.
    #[must_use]
    pub const fn new(ruleset: &'static str, name: &'static str) -> Self {
        Self { ruleset, name }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ruleset, self.name)
    }
}

/// A single style violation found by a rule.
///
/// Immutable once emitted; collected into a per-file list ordered by
/// position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Id of the rule that emitted the violation.
    pub rule_id: String,
    /// 1-indexed line number.
    pub line: usize,
    /// 1-indexed column number.
    pub col: usize,
    /// Description of the violation.
    pub message: String,
    /// Whether format mode can fix this violation.
    pub can_be_autocorrected: bool,
}

/// Decision returned by the emit sink: whether the rule may apply the fix
/// for the violation it just reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutocorrectDecision {
    /// The fix may be applied.
    Allow,
    /// The fix must not be applied (lint mode, suppression, or the
    /// violation is not correctable).
    Deny,
}

impl AutocorrectDecision {
    /// Runs the fix closure when autocorrection is allowed.
    pub fn if_allowed<E>(self, fix: impl FnOnce() -> Result<(), E>) -> Result<(), E> {
        match self {
            Self::Allow => fix(),
            Self::Deny => Ok(()),
        }
    }
}

/// Kind of file being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// A regular source file.
    Regular,
    /// A top-level script.
    Script,
}

/// Context passed to rules during a traversal.
#[derive(Debug, Clone)]
pub struct Context {
    /// Path of the file being processed (informational only; the engine
    /// does no file I/O).
    pub filename: PathBuf,
    /// Kind of the file being processed.
    pub file_kind: FileKind,
    /// Typed configuration resolved for this file.
    pub config: ResolvedConfig,
}

/// Which nodes and files a rule wants to visit.
#[derive(Debug, Clone, Copy)]
pub struct Applicability {
    /// Node kinds of interest; `None` visits every node.
    pub node_kinds: Option<&'static [SyntaxKind]>,
    /// File kinds the rule applies to.
    pub file_kinds: &'static [FileKind],
}

impl Applicability {
    /// Applies to every node of every file kind.
    pub const ALL: Self = Self {
        node_kinds: None,
        file_kinds: &[FileKind::Regular, FileKind::Script],
    };

    /// Whether the rule wants to see nodes of this kind.
    #[must_use]
    pub fn covers_kind(&self, kind: SyntaxKind) -> bool {
        self.node_kinds.is_none_or(|kinds| kinds.contains(&kind))
    }

    /// Whether the rule runs on this file kind.
    #[must_use]
    pub fn covers_file(&self, file_kind: FileKind) -> bool {
        self.file_kinds.contains(&file_kind)
    }
}

/// Metadata associated with a rule: identity, scheduling constraints, and
/// applicability.
#[derive(Debug, Clone, Copy)]
pub struct RuleMetadata {
    /// Unique id of the rule.
    pub id: RuleId,
    /// Rules that must run before this one. Used purely for scheduling,
    /// never for data passing.
    pub runs_after: &'static [RuleId],
    /// Rules that must run after this one.
    pub runs_before: &'static [RuleId],
    /// Node and file kinds the rule visits.
    pub applicability: Applicability,
}

/// Sink a rule reports violations to.
///
/// Arguments are the tree as the rule currently sees it, the byte offset of
/// the violation within that tree's text, the message, and whether the
/// violation can be autocorrected. The returned decision tells the rule
/// whether to apply the corresponding fix. The sink resolves the offset
/// against the passed tree, so offsets stay valid across fixes the rule
/// applied earlier in the same hook.
pub type Emit<'a> = dyn FnMut(&SyntaxTree, usize, String, bool) -> AutocorrectDecision + 'a;

/// A unit of analysis and correction.
///
/// A rule performs exactly one depth-first traversal per file; it is not
/// re-run after its own edits within a pass, so it must track any state its
/// earlier edits affect incrementally.
pub trait Rule: Send {
    /// Returns the rule's metadata.
    fn metadata(&self) -> RuleMetadata;

    /// Called once before the first node is visited; resets per-file state.
    fn before_first_node(&mut self, tree: &SyntaxTree, ctx: &Context) {
        let _ = (tree, ctx);
    }

    /// Called on a node before its children are visited.
    fn enter_node(
        &mut self,
        tree: &mut SyntaxTree,
        node: NodeId,
        ctx: &Context,
        emit: &mut Emit<'_>,
    ) -> Result<(), MutationError> {
        let _ = (tree, node, ctx, emit);
        Ok(())
    }

    /// Called on a node after its children were visited. Needed because
    /// decisions about a closing delimiter depend on having already
    /// processed everything inside it.
    fn leave_node(
        &mut self,
        tree: &mut SyntaxTree,
        node: NodeId,
        ctx: &Context,
        emit: &mut Emit<'_>,
    ) -> Result<(), MutationError> {
        let _ = (tree, node, ctx, emit);
        Ok(())
    }
}

/// Creates a fresh [`Rule`] instance per file, so rules may hold traversal
/// state without being shared across files.
pub struct RuleProvider {
    metadata: RuleMetadata,
    factory: fn() -> Box<dyn Rule>,
}

impl RuleProvider {
    /// Creates a provider from static metadata and a rule factory.
    #[must_use]
    pub const fn new(metadata: RuleMetadata, factory: fn() -> Box<dyn Rule>) -> Self {
        Self { metadata, factory }
    }

    /// The provided rule's metadata, available without instantiation.
    #[must_use]
    pub fn metadata(&self) -> RuleMetadata {
        self.metadata
    }

    /// Instantiates a fresh rule for one file.
    #[must_use]
    pub fn create(&self) -> Box<dyn Rule> {
        (self.factory)()
    }
}

impl fmt::Debug for RuleProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleProvider")
            .field("id", &self.metadata.id.to_string())
            .finish_non_exhaustive()
    }
}
