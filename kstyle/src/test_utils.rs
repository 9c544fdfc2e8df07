//! Helpers shared by unit and integration tests.
//!
//! Provides canned syntax trees and a single-rule runner that mimics the
//! engine's traversal without scheduling or suppression handling.

use std::path::PathBuf;

use crate::config::ResolvedConfig;
use crate::rules::{AutocorrectDecision, Context, FileKind, Rule, RuleMetadata, Violation};
use crate::tree::position::LineIndex;
use crate::tree::{NodeId, SyntaxKind, SyntaxTree, TreeBuilder};

/// A default context for a regular file named `Test.kt`.
#[must_use]
pub fn context() -> Context {
    Context {
        filename: PathBuf::from("Test.kt"),
        file_kind: FileKind::Regular,
        config: ResolvedConfig::default(),
    }
}

/// Builds `val x = f(...)` with one already-broken line per entry; each
/// entry holds one or more comma-separated arguments.
///
/// `&["a", "b, c"]` produces:
///
/// ```text
/// val x = f(
///     a,
///     b, c
/// )
/// ```
#[must_use]
pub fn kotlin_call_file(lines: &[&str]) -> SyntaxTree {
    let mut b = TreeBuilder::new();
    let val = b.leaf(SyntaxKind::Keyword, "val");
    let ws0 = b.whitespace(" ");
    let x = b.leaf(SyntaxKind::Identifier, "x");
    let ws1 = b.whitespace(" ");
    let eq = b.leaf(SyntaxKind::Operator, "=");
    let ws2 = b.whitespace(" ");
    let callee = b.leaf(SyntaxKind::Identifier, "f");

    let mut children = vec![b.leaf(SyntaxKind::LPar, "(")];
    let last_line = lines.len().saturating_sub(1);
    for (i, line) in lines.iter().enumerate() {
        children.push(b.whitespace("\n    "));
        let args: Vec<&str> = line.split(", ").collect();
        let last_arg = args.len().saturating_sub(1);
        for (j, arg) in args.iter().enumerate() {
            let id = b.leaf(SyntaxKind::Identifier, arg);
            let wrapped = b.node(SyntaxKind::ValueArgument, vec![id]);
            children.push(wrapped);
            if i != last_line || j != last_arg {
                children.push(b.leaf(SyntaxKind::Comma, ","));
                if j != last_arg {
                    children.push(b.whitespace(" "));
                }
            }
        }
    }
    children.push(b.whitespace("\n"));
    children.push(b.leaf(SyntaxKind::RPar, ")"));

    let list = b.node(SyntaxKind::ValueArgumentList, children);
    let call = b.node(SyntaxKind::CallExpression, vec![callee, list]);
    let prop = b.node(SyntaxKind::Property, vec![val, ws0, x, ws1, eq, ws2, call]);
    let file = b.node(SyntaxKind::File, vec![prop]);
    b.finish(file)
}

/// Builds `val x = f(a, b, c)` on a single line.
#[must_use]
pub fn single_line_call(args: &[&str]) -> SyntaxTree {
    let mut b = TreeBuilder::new();
    let val = b.leaf(SyntaxKind::Keyword, "val");
    let ws0 = b.whitespace(" ");
    let x = b.leaf(SyntaxKind::Identifier, "x");
    let ws1 = b.whitespace(" ");
    let eq = b.leaf(SyntaxKind::Operator, "=");
    let ws2 = b.whitespace(" ");
    let callee = b.leaf(SyntaxKind::Identifier, "f");

    let mut children = vec![b.leaf(SyntaxKind::LPar, "(")];
    let last_arg = args.len().saturating_sub(1);
    for (j, arg) in args.iter().enumerate() {
        let id = b.leaf(SyntaxKind::Identifier, arg);
        let wrapped = b.node(SyntaxKind::ValueArgument, vec![id]);
        children.push(wrapped);
        if j != last_arg {
            children.push(b.leaf(SyntaxKind::Comma, ","));
            children.push(b.whitespace(" "));
        }
    }
    children.push(b.leaf(SyntaxKind::RPar, ")"));

    let list = b.node(SyntaxKind::ValueArgumentList, children);
    let call = b.node(SyntaxKind::CallExpression, vec![callee, list]);
    let prop = b.node(SyntaxKind::Property, vec![val, ws0, x, ws1, eq, ws2, call]);
    let file = b.node(SyntaxKind::File, vec![prop]);
    b.finish(file)
}

/// Runs a single rule in lint mode (no fixes applied) and returns the
/// violations in traversal order.
pub fn run_rule_lint(rule: &mut dyn Rule, tree: &mut SyntaxTree, ctx: &Context) -> Vec<Violation> {
    run_rule(rule, tree, ctx, false)
}

/// Runs a single rule in format mode (correctable fixes applied).
pub fn run_rule_format(rule: &mut dyn Rule, tree: &mut SyntaxTree, ctx: &Context) -> Vec<Violation> {
    run_rule(rule, tree, ctx, true)
}

fn run_rule(rule: &mut dyn Rule, tree: &mut SyntaxTree, ctx: &Context, format: bool) -> Vec<Violation> {
    let metadata = rule.metadata();
    let mut violations = Vec::new();
    rule.before_first_node(tree, ctx);
    visit(rule, tree, tree.root(), ctx, format, &metadata, &mut violations);
    violations
}

fn visit(
    rule: &mut dyn Rule,
    tree: &mut SyntaxTree,
    node: NodeId,
    ctx: &Context,
    format: bool,
    metadata: &RuleMetadata,
    violations: &mut Vec<Violation>,
) {
    let covered = metadata.applicability.covers_kind(tree.kind(node));
    if covered {
        hook(rule, tree, node, ctx, format, metadata, violations, true);
    }
    // The enter hook may have detached the node; its subtree is then gone.
    if node != tree.root() && tree.parent(node).is_none() {
        return;
    }
    let children: Vec<NodeId> = tree.children(node).to_vec();
    for child in children {
        if tree.parent(child) == Some(node) {
            visit(rule, tree, child, ctx, format, metadata, violations);
        }
    }
    if covered {
        hook(rule, tree, node, ctx, format, metadata, violations, false);
    }
}

#[allow(clippy::too_many_arguments)]
fn hook(
    rule: &mut dyn Rule,
    tree: &mut SyntaxTree,
    node: NodeId,
    ctx: &Context,
    format: bool,
    metadata: &RuleMetadata,
    violations: &mut Vec<Violation>,
    enter: bool,
) {
    let rule_id = metadata.id.to_string();
    let mut emit = |tree: &SyntaxTree, offset: usize, message: String, can_be_autocorrected: bool| {
        // Resolve against the tree as it stands at this emit, matching the
        // engine's sink.
        let pos = LineIndex::new(&tree.text(tree.root())).position(offset);
        violations.push(Violation {
            rule_id: rule_id.clone(),
            line: pos.line,
            col: pos.column,
            message,
            can_be_autocorrected,
        });
        if format && can_be_autocorrected {
            AutocorrectDecision::Allow
        } else {
            AutocorrectDecision::Deny
        }
    };
    let result = if enter {
        rule.enter_node(tree, node, ctx, &mut emit)
    } else {
        rule.leave_node(tree, node, ctx, &mut emit)
    };
    assert!(result.is_ok(), "rule mutation failed: {result:?}");
}
