//! Wrapping of argument, parameter, type-parameter and super-type lists.
//!
//! Decides whether a delimited list must be laid out single-line or
//! one-item-per-line and corrects the whitespace accordingly. Each item
//! should be on a separate line if at least one of the items already is, if
//! the line exceeds the maximum length, or if the item count reaches the
//! force-multiline threshold. Applying the rule to already-wrapped input is
//! a no-op.

use super::{ids, Applicability, Context, Emit, FileKind, Rule, RuleMetadata, RuleProvider};
use crate::tree::{MutationError, NodeId, SyntaxKind, SyntaxTree};

/// Rule wrapping delimited lists to one item per line.
#[derive(Debug, Default)]
pub struct ArgumentListWrappingRule;

const LIST_KINDS: [SyntaxKind; 4] = [
    SyntaxKind::ValueArgumentList,
    SyntaxKind::ValueParameterList,
    SyntaxKind::TypeParameterList,
    SyntaxKind::SuperTypeList,
];

impl ArgumentListWrappingRule {
    /// Static metadata for this rule.
    pub const METADATA: RuleMetadata = RuleMetadata {
        id: ids::ARGUMENT_LIST_WRAPPING_RULE_ID,
        runs_after: &[],
        runs_before: &[],
        applicability: Applicability {
            node_kinds: Some(&LIST_KINDS),
            file_kinds: &[FileKind::Regular, FileKind::Script],
        },
    };

    /// Creates a fresh rule instance.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Provider registering this rule with an engine.
    #[must_use]
    pub fn provider() -> RuleProvider {
        RuleProvider::new(Self::METADATA, || Box::new(Self::new()))
    }

    fn visit_list(
        &self,
        tree: &mut SyntaxTree,
        list: NodeId,
        ctx: &Context,
        emit: &mut Emit<'_>,
    ) -> Result<(), MutationError> {
        // Lambda argument lists are laid out by the lambda itself.
        if tree.parent(list).is_some_and(|p| {
            matches!(
                tree.kind(p),
                SyntaxKind::FunctionLiteral | SyntaxKind::LambdaExpression
            )
        }) {
            return Ok(());
        }

        let item_kind = item_kind(tree.kind(list));
        let items: Vec<NodeId> = tree
            .children(list)
            .iter()
            .copied()
            .filter(|&c| tree.kind(c) == item_kind)
            .collect();

        if items.is_empty() {
            return self.visit_empty_list(tree, list, emit);
        }

        let correctable = !has_blocking_comment(tree, list, item_kind);
        let force = items.len()
            >= ctx
                .config
                .force_multiline_when_parameter_count_greater_or_equal_than;
        // An item should go on its own line if one already is. Newlines
        // confined to a multi-line lambda or raw string do not count: such
        // an item is unsplittable, and only its internal layout is at
        // stake, not the list's.
        let has_newline = contains_newline_outside_unsplittable(tree, list)
            // A super-type list has no opening delimiter; the break that puts
            // its first entry on a fresh line precedes the list itself.
            || (tree.kind(list) == SyntaxKind::SuperTypeList
                && tree
                    .prev_leaf(list)
                    .is_some_and(|leaf| tree.is_whitespace_with_newline(leaf)));
        let exceeds = ctx.config.max_line_length_set()
            && !tree.text(list).contains('\n')
            && tree.line_length_at(list) > ctx.config.max_line_length;

        if force || has_newline || exceeds {
            self.wrap_list(tree, list, item_kind, ctx, emit, correctable)?;
        }
        Ok(())
    }

    /// Removes the redundant empty parens of a class primary constructor
    /// (`class Foo()` becomes `class Foo`), unless a comment occupies the
    /// otherwise-empty list.
    fn visit_empty_list(
        &self,
        tree: &mut SyntaxTree,
        list: NodeId,
        emit: &mut Emit<'_>,
    ) -> Result<(), MutationError> {
        if tree.kind(list) != SyntaxKind::ValueParameterList {
            return Ok(());
        }
        let Some(parent) = tree.parent(list) else {
            return Ok(());
        };
        if tree.kind(parent) != SyntaxKind::Class {
            return Ok(());
        }
        if tree
            .children(list)
            .iter()
            .any(|&c| tree.kind(c).is_comment())
        {
            return Ok(());
        }
        let Some(&lpar) = tree
            .children(list)
            .iter()
            .find(|&&c| tree.kind(c) == SyntaxKind::LPar)
        else {
            return Ok(());
        };
        emit(
            tree,
            tree.start_offset(lpar),
            "No parenthesis expected".to_owned(),
            true,
        )
        .if_allowed(|| tree.remove_child(parent, list))
    }

    fn wrap_list(
        &self,
        tree: &mut SyntaxTree,
        list: NodeId,
        item_kind: SyntaxKind,
        ctx: &Context,
        emit: &mut Emit<'_>,
        correctable: bool,
    ) -> Result<(), MutationError> {
        let base_indent = tree.line_indent(tree.parent(list).unwrap_or(list));
        let unit = ctx.config.indent_unit();
        let item_indent = format!("\n{base_indent}{unit}");
        let closing_indent = format!("\n{base_indent}");

        let children: Vec<NodeId> = tree.children(list).to_vec();
        for child in children {
            if is_opening_delimiter(tree, child) {
                // A newline between the callee and the opening delimiter is
                // never wanted.
                if let Some(prev) = tree.prev_leaf(child) {
                    if tree.is_whitespace_with_newline(prev) {
                        let message = format!(
                            "Unnecessary newline before \"{}\"",
                            tree.leaf_text(child).unwrap_or("(")
                        );
                        emit(tree, tree.start_offset(child), message, correctable).if_allowed(
                            || match tree.parent(prev) {
                                Some(ws_parent) => tree.remove_child(ws_parent, prev),
                                None => Ok(()),
                            },
                        )?;
                    }
                }
                continue;
            }

            let is_item = tree.kind(child) == item_kind;
            let is_closing = is_closing_delimiter(tree, child);
            if !is_item && !is_closing {
                continue;
            }
            // Super-type lists carry no closing delimiter; in particular the
            // class-body brace that follows stays on the entry's line.
            if is_closing && tree.kind(list) == SyntaxKind::SuperTypeList {
                continue;
            }

            // A block comment directly in front of an item belongs to it and
            // wraps together with it.
            let anchor = attached_comment_anchor(tree, child);
            if already_on_own_line(tree, anchor) {
                // Fixing the exact indent width is the indentation rule's
                // responsibility.
                continue;
            }

            let message = if is_item {
                item_message(item_kind).to_owned()
            } else {
                format!(
                    "Missing newline before \"{}\"",
                    tree.leaf_text(child).unwrap_or(")")
                )
            };
            let indent_text = if is_item { &item_indent } else { &closing_indent };

            match tree.prev_sibling(anchor) {
                Some(ws) if tree.kind(ws) == SyntaxKind::Whitespace => {
                    emit(tree, tree.start_offset(child), message, correctable)
                        .if_allowed(|| tree.set_leaf_text(ws, indent_text))?;
                }
                _ => {
                    emit(tree, tree.start_offset(child), message, correctable).if_allowed(|| {
                        let ws = tree.new_leaf(SyntaxKind::Whitespace, indent_text);
                        tree.insert_before(anchor, ws)
                    })?;
                }
            }
        }
        Ok(())
    }
}

impl Rule for ArgumentListWrappingRule {
    fn metadata(&self) -> RuleMetadata {
        Self::METADATA
    }

    fn enter_node(
        &mut self,
        tree: &mut SyntaxTree,
        node: NodeId,
        ctx: &Context,
        emit: &mut Emit<'_>,
    ) -> Result<(), MutationError> {
        if LIST_KINDS.contains(&tree.kind(node)) {
            self.visit_list(tree, node, ctx, emit)?;
        }
        Ok(())
    }
}

fn item_kind(list_kind: SyntaxKind) -> SyntaxKind {
    match list_kind {
        SyntaxKind::ValueParameterList => SyntaxKind::ValueParameter,
        SyntaxKind::TypeParameterList => SyntaxKind::TypeParameter,
        SyntaxKind::SuperTypeList => SyntaxKind::SuperTypeCallEntry,
        _ => SyntaxKind::ValueArgument,
    }
}

fn item_message(item_kind: SyntaxKind) -> &'static str {
    match item_kind {
        SyntaxKind::ValueParameter => {
            "Parameter should be on a separate line (unless all parameters can fit a single line)"
        }
        SyntaxKind::TypeParameter => {
            "Type parameter should be on a separate line (unless all type parameters can fit a single line)"
        }
        SyntaxKind::SuperTypeCallEntry => {
            "Super type should be on a separate line (unless all super types can fit a single line)"
        }
        _ => "Argument should be on a separate line (unless all arguments can fit a single line)",
    }
}

fn is_opening_delimiter(tree: &SyntaxTree, child: NodeId) -> bool {
    match tree.kind(child) {
        SyntaxKind::LPar => true,
        SyntaxKind::Operator => tree.leaf_text(child) == Some("<"),
        _ => false,
    }
}

fn is_closing_delimiter(tree: &SyntaxTree, child: NodeId) -> bool {
    match tree.kind(child) {
        SyntaxKind::RPar => true,
        SyntaxKind::Operator => tree.leaf_text(child) == Some(">"),
        _ => false,
    }
}

/// Comments anywhere in the list disable autocorrection, except a block
/// comment sitting directly in front of an item (it wraps with the item).
fn has_blocking_comment(tree: &SyntaxTree, list: NodeId, item_kind: SyntaxKind) -> bool {
    for &child in tree.children(list) {
        let kind = tree.kind(child);
        if !kind.is_comment() {
            continue;
        }
        if kind == SyntaxKind::BlockComment && attaches_to_item(tree, child, item_kind) {
            continue;
        }
        return true;
    }
    false
}

/// Whether a block comment is immediately followed (over non-newline
/// whitespace) by an item.
fn attaches_to_item(tree: &SyntaxTree, comment: NodeId, item_kind: SyntaxKind) -> bool {
    let mut current = tree.next_sibling(comment);
    while let Some(node) = current {
        match tree.kind(node) {
            SyntaxKind::Whitespace => {
                if tree.is_whitespace_with_newline(node) {
                    return false;
                }
                current = tree.next_sibling(node);
            }
            kind => return kind == item_kind,
        }
    }
    false
}

/// Resolves the node the wrap whitespace goes in front of: the item itself,
/// or its attached leading block comment.
fn attached_comment_anchor(tree: &SyntaxTree, item: NodeId) -> NodeId {
    let mut anchor = item;
    let mut current = tree.prev_sibling(item);
    while let Some(node) = current {
        match tree.kind(node) {
            SyntaxKind::Whitespace if !tree.is_whitespace_with_newline(node) => {
                current = tree.prev_sibling(node);
            }
            SyntaxKind::BlockComment => {
                anchor = node;
                current = tree.prev_sibling(node);
            }
            _ => break,
        }
    }
    anchor
}

/// Whether the node is already preceded by a line break, scanning back over
/// whitespace and comments.
fn already_on_own_line(tree: &SyntaxTree, node: NodeId) -> bool {
    let mut current = tree.prev_leaf(node);
    while let Some(leaf) = current {
        let kind = tree.kind(leaf);
        if tree.is_whitespace_with_newline(leaf) {
            return true;
        }
        if kind != SyntaxKind::Whitespace && !kind.is_comment() {
            return false;
        }
        current = tree.prev_leaf(leaf);
    }
    false
}

/// Whether the subtree contains a line break outside unsplittable content
/// (multi-line lambdas and raw string literals).
fn contains_newline_outside_unsplittable(tree: &SyntaxTree, node: NodeId) -> bool {
    match tree.kind(node) {
        SyntaxKind::LambdaExpression | SyntaxKind::FunctionLiteral => false,
        SyntaxKind::StringTemplate if tree.is_raw_string(node) => false,
        _ => {
            if let Some(text) = tree.leaf_text(node) {
                text.contains('\n')
            } else {
                tree.children(node)
                    .iter()
                    .any(|&c| contains_newline_outside_unsplittable(tree, c))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        context, kotlin_call_file, run_rule_format, run_rule_lint, single_line_call,
    };
    use crate::tree::TreeBuilder;

    #[test]
    fn wraps_trailing_argument_onto_its_own_line() {
        // val x = f(
        //     a,
        //     b, c
        // )
        let mut tree = kotlin_call_file(&["a", "b, c"]);
        let violations = run_rule_format(&mut ArgumentListWrappingRule::new(), &mut tree, &context());
        assert_eq!(violations.len(), 1);
        assert_eq!(
            violations[0].message,
            "Argument should be on a separate line (unless all arguments can fit a single line)"
        );
        assert!(violations[0].can_be_autocorrected);
        assert_eq!(tree.text(tree.root()), "val x = f(\n    a,\n    b,\n    c\n)");
    }

    #[test]
    fn wrapping_is_idempotent() {
        let mut tree = kotlin_call_file(&["a", "b, c"]);
        let ctx = context();
        run_rule_format(&mut ArgumentListWrappingRule::new(), &mut tree, &ctx);
        let first = tree.text(tree.root());
        let violations = run_rule_format(&mut ArgumentListWrappingRule::new(), &mut tree, &ctx);
        assert!(violations.is_empty());
        assert_eq!(tree.text(tree.root()), first);
    }

    #[test]
    fn single_line_list_within_limit_is_untouched() {
        let mut b = TreeBuilder::new();
        let callee = b.leaf(SyntaxKind::Identifier, "f");
        let lpar = b.leaf(SyntaxKind::LPar, "(");
        let a = b.leaf(SyntaxKind::Identifier, "a");
        let arg = b.node(SyntaxKind::ValueArgument, vec![a]);
        let rpar = b.leaf(SyntaxKind::RPar, ")");
        let list = b.node(SyntaxKind::ValueArgumentList, vec![lpar, arg, rpar]);
        let call = b.node(SyntaxKind::CallExpression, vec![callee, list]);
        let file = b.node(SyntaxKind::File, vec![call]);
        let mut tree = b.finish(file);

        let violations = run_rule_lint(&mut ArgumentListWrappingRule::new(), &mut tree, &context());
        assert!(violations.is_empty());
    }

    #[test]
    fn removes_empty_class_parens() {
        // class Foo()
        let mut b = TreeBuilder::new();
        let kw = b.leaf(SyntaxKind::Keyword, "class");
        let ws = b.whitespace(" ");
        let name = b.leaf(SyntaxKind::Identifier, "Foo");
        let lpar = b.leaf(SyntaxKind::LPar, "(");
        let rpar = b.leaf(SyntaxKind::RPar, ")");
        let params = b.node(SyntaxKind::ValueParameterList, vec![lpar, rpar]);
        let class = b.node(SyntaxKind::Class, vec![kw, ws, name, params]);
        let file = b.node(SyntaxKind::File, vec![class]);
        let mut tree = b.finish(file);

        let violations = run_rule_format(&mut ArgumentListWrappingRule::new(), &mut tree, &context());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].message, "No parenthesis expected");
        assert_eq!((violations[0].line, violations[0].col), (1, 10));
        assert_eq!(tree.text(tree.root()), "class Foo");
    }

    #[test]
    fn empty_class_parens_with_comment_are_kept() {
        let mut b = TreeBuilder::new();
        let kw = b.leaf(SyntaxKind::Keyword, "class");
        let ws = b.whitespace(" ");
        let name = b.leaf(SyntaxKind::Identifier, "Foo");
        let lpar = b.leaf(SyntaxKind::LPar, "(");
        let comment = b.leaf(SyntaxKind::BlockComment, "/* todo */");
        let rpar = b.leaf(SyntaxKind::RPar, ")");
        let params = b.node(SyntaxKind::ValueParameterList, vec![lpar, comment, rpar]);
        let class = b.node(SyntaxKind::Class, vec![kw, ws, name, params]);
        let file = b.node(SyntaxKind::File, vec![class]);
        let mut tree = b.finish(file);

        let violations = run_rule_format(&mut ArgumentListWrappingRule::new(), &mut tree, &context());
        assert!(violations.is_empty());
        assert_eq!(tree.text(tree.root()), "class Foo(/* todo */)");
    }

    #[test]
    fn multiline_lambda_alone_does_not_force_wrapping() {
        // f(a, { \n it \n })
        let mut b = TreeBuilder::new();
        let callee = b.leaf(SyntaxKind::Identifier, "f");
        let lpar = b.leaf(SyntaxKind::LPar, "(");
        let a = b.leaf(SyntaxKind::Identifier, "a");
        let arg_a = b.node(SyntaxKind::ValueArgument, vec![a]);
        let comma = b.leaf(SyntaxKind::Comma, ",");
        let ws = b.whitespace(" ");
        let lambda_text = b.leaf(SyntaxKind::Literal, "{\n    it\n}");
        let literal = b.node(SyntaxKind::FunctionLiteral, vec![lambda_text]);
        let lambda = b.node(SyntaxKind::LambdaExpression, vec![literal]);
        let arg_l = b.node(SyntaxKind::ValueArgument, vec![lambda]);
        let rpar = b.leaf(SyntaxKind::RPar, ")");
        let list = b.node(
            SyntaxKind::ValueArgumentList,
            vec![lpar, arg_a, comma, ws, arg_l, rpar],
        );
        let call = b.node(SyntaxKind::CallExpression, vec![callee, list]);
        let file = b.node(SyntaxKind::File, vec![call]);
        let mut tree = b.finish(file);

        let before = tree.text(tree.root());
        let violations = run_rule_format(&mut ArgumentListWrappingRule::new(), &mut tree, &context());
        assert!(violations.is_empty());
        assert_eq!(tree.text(tree.root()), before);
    }

    #[test]
    fn force_multiline_threshold_wraps_fitting_list() {
        let mut tree = single_line_call(&["a", "b", "c"]);
        let mut ctx = context();
        ctx.config
            .force_multiline_when_parameter_count_greater_or_equal_than = 3;
        // The list fits on one line; the count threshold forces the wrap
        // regardless.
        let violations = run_rule_format(&mut ArgumentListWrappingRule::new(), &mut tree, &ctx);
        assert_eq!(violations.len(), 4);
        assert_eq!(tree.text(tree.root()), "val x = f(\n    a,\n    b,\n    c\n)");
        // Each violation is positioned in the text as it stood when that
        // violation was found, fixes applied so far included.
        let positions: Vec<(usize, usize)> =
            violations.iter().map(|v| (v.line, v.col)).collect();
        assert_eq!(positions, vec![(1, 11), (2, 8), (3, 8), (4, 6)]);
    }

    #[test]
    fn eol_comment_in_list_reports_without_correcting() {
        // f(a, // first
        //   b)
        let mut b = TreeBuilder::new();
        let callee = b.leaf(SyntaxKind::Identifier, "f");
        let lpar = b.leaf(SyntaxKind::LPar, "(");
        let a = b.leaf(SyntaxKind::Identifier, "a");
        let arg_a = b.node(SyntaxKind::ValueArgument, vec![a]);
        let comma = b.leaf(SyntaxKind::Comma, ",");
        let ws1 = b.whitespace(" ");
        let comment = b.leaf(SyntaxKind::EolComment, "// first");
        let ws2 = b.whitespace("\n  ");
        let bb = b.leaf(SyntaxKind::Identifier, "b");
        let arg_b = b.node(SyntaxKind::ValueArgument, vec![bb]);
        let rpar = b.leaf(SyntaxKind::RPar, ")");
        let list = b.node(
            SyntaxKind::ValueArgumentList,
            vec![lpar, arg_a, comma, ws1, comment, ws2, arg_b, rpar],
        );
        let call = b.node(SyntaxKind::CallExpression, vec![callee, list]);
        let file = b.node(SyntaxKind::File, vec![call]);
        let mut tree = b.finish(file);

        let before = tree.text(tree.root());
        let violations = run_rule_format(&mut ArgumentListWrappingRule::new(), &mut tree, &context());
        assert!(!violations.is_empty());
        assert!(violations.iter().all(|v| !v.can_be_autocorrected));
        assert_eq!(tree.text(tree.root()), before);
    }

    #[test]
    fn leading_block_comment_travels_with_its_argument() {
        // f(
        //     a,
        //     /* named */ b, c
        // )
        let mut b = TreeBuilder::new();
        let callee = b.leaf(SyntaxKind::Identifier, "f");
        let lpar = b.leaf(SyntaxKind::LPar, "(");
        let ws1 = b.whitespace("\n    ");
        let a = b.leaf(SyntaxKind::Identifier, "a");
        let arg_a = b.node(SyntaxKind::ValueArgument, vec![a]);
        let comma1 = b.leaf(SyntaxKind::Comma, ",");
        let ws2 = b.whitespace("\n    ");
        let comment = b.leaf(SyntaxKind::BlockComment, "/* named */");
        let ws3 = b.whitespace(" ");
        let bb = b.leaf(SyntaxKind::Identifier, "b");
        let arg_b = b.node(SyntaxKind::ValueArgument, vec![bb]);
        let comma2 = b.leaf(SyntaxKind::Comma, ",");
        let ws4 = b.whitespace(" ");
        let cc = b.leaf(SyntaxKind::Identifier, "c");
        let arg_c = b.node(SyntaxKind::ValueArgument, vec![cc]);
        let ws5 = b.whitespace("\n");
        let rpar = b.leaf(SyntaxKind::RPar, ")");
        let list = b.node(
            SyntaxKind::ValueArgumentList,
            vec![
                lpar, ws1, arg_a, comma1, ws2, comment, ws3, arg_b, comma2, ws4, arg_c, ws5, rpar,
            ],
        );
        let call = b.node(SyntaxKind::CallExpression, vec![callee, list]);
        let file = b.node(SyntaxKind::File, vec![call]);
        let mut tree = b.finish(file);

        let violations = run_rule_format(&mut ArgumentListWrappingRule::new(), &mut tree, &context());
        // Only `c` needs wrapping: `b` is already on its own line together
        // with its attached comment.
        assert_eq!(violations.len(), 1);
        assert_eq!(
            tree.text(tree.root()),
            "f(\n    a,\n    /* named */ b,\n    c\n)"
        );
    }

    #[test]
    fn super_type_entries_wrap_without_touching_body_brace() {
        // class Foo : Bar(), Baz() { }  with an entry already on its own line
        let mut b = TreeBuilder::new();
        let kw = b.leaf(SyntaxKind::Keyword, "class");
        let ws1 = b.whitespace(" ");
        let name = b.leaf(SyntaxKind::Identifier, "Foo");
        let ws2 = b.whitespace(" ");
        let colon = b.leaf(SyntaxKind::Operator, ":");
        let ws3 = b.whitespace("\n    ");
        let bar = b.leaf(SyntaxKind::Identifier, "Bar()");
        let entry_bar = b.node(SyntaxKind::SuperTypeCallEntry, vec![bar]);
        let comma = b.leaf(SyntaxKind::Comma, ",");
        let ws4 = b.whitespace(" ");
        let baz = b.leaf(SyntaxKind::Identifier, "Baz()");
        let entry_baz = b.node(SyntaxKind::SuperTypeCallEntry, vec![baz]);
        let list = b.node(
            SyntaxKind::SuperTypeList,
            vec![entry_bar, comma, ws4, entry_baz],
        );
        let ws5 = b.whitespace(" ");
        let lbrace = b.leaf(SyntaxKind::LBrace, "{");
        let rbrace = b.leaf(SyntaxKind::RBrace, "}");
        let body = b.node(SyntaxKind::ClassBody, vec![lbrace, rbrace]);
        let class = b.node(
            SyntaxKind::Class,
            vec![kw, ws1, name, ws2, colon, ws3, list, ws5, body],
        );
        let file = b.node(SyntaxKind::File, vec![class]);
        let mut tree = b.finish(file);

        let violations = run_rule_format(&mut ArgumentListWrappingRule::new(), &mut tree, &context());
        assert_eq!(violations.len(), 1);
        // The class-body brace stays on the last entry's line.
        assert_eq!(
            tree.text(tree.root()),
            "class Foo :\n    Bar(),\n    Baz() {}"
        );
    }
}
