//! Suppression directive handling.
//!
//! Violations are dropped (and never autocorrected) when their position
//! falls inside a suppressed scope. Scopes come from three sources:
//!
//! - `// kstyle-disable-file [rule-ids]` anywhere in the file suppresses the
//!   named rules (or all rules) for the whole file;
//! - a trailing `// kstyle-disable [rule-ids]` comment suppresses its own
//!   line, while a stand-alone one opens a scope closed by the matching
//!   `// kstyle-enable` (or end of file);
//! - `@Suppress("kstyle:ruleset:rule")` annotations suppress the annotated
//!   declaration's whole text range.
//!
//! The locator is a snapshot of the tree; the engine rebuilds it after any
//! applied fix so offsets stay accurate.

use rustc_hash::FxHashSet;

use crate::tree::{NodeId, SyntaxKind, SyntaxTree};

const DISABLE_FILE: &str = "kstyle-disable-file";
const DISABLE: &str = "kstyle-disable";
const ENABLE: &str = "kstyle-enable";
const ANNOTATION_PREFIX: &str = "kstyle:";

/// Rules a scope applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RuleFilter {
    /// Every rule.
    All,
    /// Only the listed `ruleset:name` ids.
    Listed(FxHashSet<String>),
}

impl RuleFilter {
    fn from_args(args: &str) -> Self {
        let listed: FxHashSet<String> = args
            .split_whitespace()
            .map(ToOwned::to_owned)
            .collect();
        if listed.is_empty() {
            Self::All
        } else {
            Self::Listed(listed)
        }
    }

    fn covers(&self, rule_id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Listed(rules) => rules.contains(rule_id),
        }
    }
}

#[derive(Debug, Clone)]
struct SuppressedRange {
    /// Byte range, end exclusive.
    start: usize,
    end: usize,
    filter: RuleFilter,
}

/// Position-indexed view of every suppression scope in a file.
#[derive(Debug, Clone, Default)]
pub struct SuppressionLocator {
    ranges: Vec<SuppressedRange>,
}

impl SuppressionLocator {
    /// Scans the tree for suppression directives.
    #[must_use]
    pub fn new(tree: &SyntaxTree) -> Self {
        let mut builder = LocatorBuilder {
            ranges: Vec::new(),
            open: Vec::new(),
            file_len: tree.text_len(tree.root()),
        };
        builder.scan(tree, tree.root(), 0);
        builder.finish()
    }

    /// Whether a violation of `rule_id` at the given byte offset must be
    /// dropped.
    #[must_use]
    pub fn is_suppressed(&self, rule_id: &str, offset: usize) -> bool {
        self.ranges
            .iter()
            .any(|r| offset >= r.start && offset < r.end && r.filter.covers(rule_id))
    }
}

struct LocatorBuilder {
    ranges: Vec<SuppressedRange>,
    /// Stand-alone disable scopes awaiting their enable directive.
    open: Vec<(usize, RuleFilter)>,
    file_len: usize,
}

impl LocatorBuilder {
    fn scan(&mut self, tree: &SyntaxTree, node: NodeId, offset: usize) {
        if tree.kind(node) == SyntaxKind::AnnotationEntry {
            self.record_annotation(tree, node);
        }
        if tree.kind(node).is_comment() {
            self.record_comment(tree, node, offset);
        }
        let mut child_offset = offset;
        for &child in tree.children(node) {
            self.scan(tree, child, child_offset);
            child_offset += tree.text_len(child);
        }
    }

    fn record_comment(&mut self, tree: &SyntaxTree, node: NodeId, offset: usize) {
        let text = tree.text(node);
        let body = text
            .trim_start_matches("//")
            .trim_start_matches("/*")
            .trim_end_matches("*/")
            .trim();

        if let Some(args) = body.strip_prefix(DISABLE_FILE) {
            self.ranges.push(SuppressedRange {
                start: 0,
                end: self.file_len,
                filter: RuleFilter::from_args(args),
            });
            return;
        }
        if let Some(args) = body.strip_prefix(ENABLE) {
            let filter = RuleFilter::from_args(args);
            if let Some(pos) = self.open.iter().rposition(|(_, f)| *f == filter) {
                let (start, filter) = self.open.remove(pos);
                self.ranges.push(SuppressedRange {
                    start,
                    end: offset,
                    filter,
                });
            }
            return;
        }
        if let Some(args) = body.strip_prefix(DISABLE) {
            let filter = RuleFilter::from_args(args);
            if line_has_code(tree, node) {
                // Trailing comment: suppress from the start of its line to
                // the end of the comment.
                let line_start = offset - tree.line_prefix(node).len();
                self.ranges.push(SuppressedRange {
                    start: line_start,
                    end: offset + text.len(),
                    filter,
                });
            } else {
                self.open.push((offset, filter));
            }
        }
    }

    fn record_annotation(&mut self, tree: &SyntaxTree, node: NodeId) {
        let text = tree.text(node);
        if !text.contains("@Suppress") {
            return;
        }
        let mut rules = FxHashSet::default();
        for literal in quoted_strings(&text) {
            if let Some(rule_id) = literal.strip_prefix(ANNOTATION_PREFIX) {
                rules.insert(rule_id.to_owned());
            }
        }
        if rules.is_empty() {
            return;
        }
        // The scope is the annotated declaration, which owns the annotation.
        let target = tree.parent(node).unwrap_or(node);
        let start = tree.start_offset(target);
        self.ranges.push(SuppressedRange {
            start,
            end: start + tree.text_len(target),
            filter: RuleFilter::Listed(rules),
        });
    }

    fn finish(mut self) -> SuppressionLocator {
        // Unclosed stand-alone scopes run to end of file.
        for (start, filter) in self.open.drain(..) {
            self.ranges.push(SuppressedRange {
                start,
                end: self.file_len,
                filter,
            });
        }
        SuppressionLocator {
            ranges: self.ranges,
        }
    }
}

/// Whether anything other than whitespace precedes the node on its line.
fn line_has_code(tree: &SyntaxTree, node: NodeId) -> bool {
    !tree.line_prefix(node).trim().is_empty()
}

/// Extracts double-quoted string literals from annotation text.
fn quoted_strings(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find('"') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('"') else {
            break;
        };
        out.push(&after[..close]);
        rest = &after[close + 1..];
    }
    out
}
