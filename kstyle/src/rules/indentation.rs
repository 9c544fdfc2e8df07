//! Indentation checking and correction.
//!
//! A single top-down traversal maintains an indent stack. Delimiter tokens
//! push and pop frames; every whitespace token containing a line break is a
//! checkpoint where the following line's actual leading whitespace is
//! compared against the expected indent derived from the stack. Wrapped
//! continuations of an unfinished expression (binary operators, elvis and
//! method chains) get one extra unit, but only on continuation lines, never
//! on the first line of the statement.

use super::{ids, Applicability, Context, Emit, FileKind, Rule, RuleMetadata, RuleProvider};
use crate::tree::{MutationError, NodeId, SyntaxKind, SyntaxTree};

/// What token closes the indent frame currently on the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Closer {
    Brace,
    Paren,
    AngleBracket,
}

/// Rule comparing each line's leading whitespace against the indent derived
/// from its enclosing constructs.
#[derive(Debug, Default)]
pub struct IndentationRule {
    frames: Vec<Closer>,
}

impl IndentationRule {
    /// Static metadata for this rule. Runs after the wrapping rule so it
    /// sees the line breaks that rule introduced.
    pub const METADATA: RuleMetadata = RuleMetadata {
        id: ids::INDENTATION_RULE_ID,
        runs_after: &[ids::ARGUMENT_LIST_WRAPPING_RULE_ID],
        runs_before: &[],
        applicability: Applicability {
            node_kinds: None,
            file_kinds: &[FileKind::Regular, FileKind::Script],
        },
    };

    /// Creates a fresh rule instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider registering this rule with an engine.
    #[must_use]
    pub fn provider() -> RuleProvider {
        RuleProvider::new(Self::METADATA, || Box::new(Self::new()))
    }

    /// Checks the indent of the line opened by the line break inside `ws`.
    fn check_line_break(
        &mut self,
        tree: &mut SyntaxTree,
        ws: NodeId,
        ctx: &Context,
        emit: &mut Emit<'_>,
    ) -> Result<(), MutationError> {
        let Some(next) = tree.next_leaf(ws) else {
            // Trailing newline at end of file; nothing on the new line.
            return Ok(());
        };
        let text = tree.leaf_text(ws).unwrap_or("").to_owned();
        let Some(break_pos) = text.rfind('\n') else {
            return Ok(());
        };
        let actual = &text[break_pos + 1..];

        // A comment flushed to column 0 is an intentional outdent.
        if tree.kind(next).is_comment() && actual.is_empty() {
            return Ok(());
        }

        let mut depth = self.frames.len();
        // A closing delimiter pops its frame before the line is measured.
        if self
            .frames
            .last()
            .is_some_and(|&top| closer_kind(tree, next) == Some(top))
        {
            depth -= 1;
        }
        if is_continuation(tree, ws, next) {
            depth += 1;
        }

        let expected = ctx.config.indent_unit().repeat(depth);
        if actual == expected {
            return Ok(());
        }
        let offset = tree.start_offset(ws) + break_pos + 1;
        let message = format!(
            "Unexpected indentation ({}) (should be {})",
            actual.chars().count(),
            expected.chars().count()
        );
        emit(tree, offset, message, true).if_allowed(|| {
            let fixed = format!("{}{expected}", &text[..=break_pos]);
            tree.set_leaf_text(ws, &fixed)
        })
    }

    /// Checks the closing-delimiter line of a multi-line raw string literal.
    /// Interior lines are literal content and are never touched; the closing
    /// quotes align with the line the literal starts on. Mixed tabs and
    /// spaces in front of the closing quotes have no unambiguous fix and are
    /// reported as not correctable.
    fn check_raw_string(
        &mut self,
        tree: &mut SyntaxTree,
        node: NodeId,
        emit: &mut Emit<'_>,
    ) -> Result<(), MutationError> {
        let closer = tree.last_leaf(node);
        let Some(text) = tree.leaf_text(closer).map(ToOwned::to_owned) else {
            return Ok(());
        };
        let Some(break_pos) = text.rfind('\n') else {
            return Ok(());
        };
        let line = &text[break_pos + 1..];
        let ws_len = line.len() - line.trim_start_matches([' ', '\t']).len();
        let actual = &line[..ws_len];
        let expected = tree.line_indent(node);
        if actual == expected {
            return Ok(());
        }
        let offset = tree.start_offset(closer) + break_pos + 1;
        let message = format!(
            "Unexpected indentation ({}) (should be {})",
            actual.chars().count(),
            expected.chars().count()
        );
        if actual.contains(' ') && actual.contains('\t') {
            emit(tree, offset, message, false);
            return Ok(());
        }
        emit(tree, offset, message, true).if_allowed(|| {
            let fixed = format!("{}{expected}{}", &text[..=break_pos], &line[ws_len..]);
            tree.set_leaf_text(closer, &fixed)
        })
    }
}

impl Rule for IndentationRule {
    fn metadata(&self) -> RuleMetadata {
        Self::METADATA
    }

    fn before_first_node(&mut self, _tree: &SyntaxTree, _ctx: &Context) {
        self.frames.clear();
    }

    fn enter_node(
        &mut self,
        tree: &mut SyntaxTree,
        node: NodeId,
        ctx: &Context,
        emit: &mut Emit<'_>,
    ) -> Result<(), MutationError> {
        if tree.is_raw_string(node) {
            if tree.text(node).contains('\n') {
                self.check_raw_string(tree, node, emit)?;
            }
            return Ok(());
        }
        if !tree.is_leaf(node) || inside_raw_string(tree, node) {
            return Ok(());
        }
        if let Some(closer) = opener_kind(tree, node) {
            self.frames.push(closer);
            return Ok(());
        }
        if self
            .frames
            .last()
            .is_some_and(|&top| closer_kind(tree, node) == Some(top))
        {
            self.frames.pop();
            return Ok(());
        }
        if tree.is_whitespace_with_newline(node) {
            self.check_line_break(tree, node, ctx, emit)?;
        }
        Ok(())
    }
}

/// Frame pushed by this token, if it opens one.
fn opener_kind(tree: &SyntaxTree, leaf: NodeId) -> Option<Closer> {
    match tree.kind(leaf) {
        SyntaxKind::LBrace => Some(Closer::Brace),
        SyntaxKind::LPar => Some(Closer::Paren),
        SyntaxKind::Operator
            if tree.leaf_text(leaf) == Some("<")
                && tree
                    .parent(leaf)
                    .is_some_and(|p| tree.kind(p) == SyntaxKind::TypeParameterList) =>
        {
            Some(Closer::AngleBracket)
        }
        _ => None,
    }
}

/// Frame popped by this token, if it closes one.
fn closer_kind(tree: &SyntaxTree, leaf: NodeId) -> Option<Closer> {
    match tree.kind(leaf) {
        SyntaxKind::RBrace => Some(Closer::Brace),
        SyntaxKind::RPar => Some(Closer::Paren),
        SyntaxKind::Operator
            if tree.leaf_text(leaf) == Some(">")
                && tree
                    .parent(leaf)
                    .is_some_and(|p| tree.kind(p) == SyntaxKind::TypeParameterList) =>
        {
            Some(Closer::AngleBracket)
        }
        _ => None,
    }
}

/// Whether the line opened by `ws` continues an unfinished expression: the
/// previous line ends with an operator, or the new line leads with one
/// (chained calls, elvis).
fn is_continuation(tree: &SyntaxTree, ws: NodeId, next: NodeId) -> bool {
    if let Some(prev) = tree.prev_leaf(ws) {
        if is_continuation_operator(tree, prev) {
            return true;
        }
    }
    is_continuation_operator(tree, next)
}

fn is_continuation_operator(tree: &SyntaxTree, leaf: NodeId) -> bool {
    match tree.kind(leaf) {
        SyntaxKind::OperationReference => true,
        SyntaxKind::Operator => {
            let text = tree.leaf_text(leaf).unwrap_or("");
            matches!(
                text,
                "." | "?." | "?:" | "=" | "+" | "-" | "*" | "/" | "&&" | "||" | "->" | ":"
            )
        }
        _ => false,
    }
}

/// Whether the node sits inside a raw string literal (interpolated content
/// keeps its own layout).
fn inside_raw_string(tree: &SyntaxTree, node: NodeId) -> bool {
    let mut current = tree.parent(node);
    while let Some(ancestor) = current {
        if tree.is_raw_string(ancestor) {
            return true;
        }
        current = tree.parent(ancestor);
    }
    false
}
