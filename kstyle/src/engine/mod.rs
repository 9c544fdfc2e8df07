//! Lint/format driver.
//!
//! Per file, rules run strictly sequentially in scheduled order, each
//! performing one depth-first traversal with in-place edits that later rules
//! observe. Across files, processing is embarrassingly parallel: every file
//! owns its tree and resolved configuration, so batches fan out over a
//! worker pool with no shared mutable state.

pub mod scheduler;

pub use scheduler::SchedulingError;

use std::path::PathBuf;

use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::{self, ConfigError};
use crate::rules::argument_list_wrapping::ArgumentListWrappingRule;
use crate::rules::indentation::IndentationRule;
use crate::rules::{
    AutocorrectDecision, Context, FileKind, Rule, RuleMetadata, RuleProvider, Violation,
};
use crate::suppression::SuppressionLocator;
use crate::tree::position::LineIndex;
use crate::tree::{MutationError, NodeId, SyntaxTree};

/// Upper bound on correction passes per file in format mode. Each pass may
/// unlock further fixes (an earlier rule's edit can create new work for a
/// later one); a well-behaved rule set reaches its fixpoint in one or two.
const MAX_FORMAT_RUNS: usize = 3;

/// Fatal, file-scoped failure. Distinct from [`Violation`]s: a violation is
/// the expected product of a run, an `EngineError` means the run itself went
/// wrong. One file's error never aborts its siblings in a batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The active rules cannot be ordered.
    #[error(transparent)]
    Scheduling(#[from] SchedulingError),
    /// A rule's fix was rejected by the tree. The rule's traversal was
    /// abandoned; fixes it applied before the failure are kept.
    #[error("rule '{rule}' failed to apply a fix: {source}")]
    Mutation {
        /// Id of the offending rule.
        rule: String,
        /// The rejected mutation.
        source: MutationError,
    },
}

/// One file handed to the engine: a parsed tree plus its raw (pre-cascade)
/// configuration properties. The engine performs no file I/O; the caller
/// parses sources and loads configuration files.
#[derive(Debug)]
pub struct FileInput {
    /// Path of the file, used for reporting only.
    pub filename: PathBuf,
    /// Kind of the file.
    pub file_kind: FileKind,
    /// Parsed lossless tree of the file's text.
    pub tree: SyntaxTree,
    /// Raw property map for the file.
    pub properties: FxHashMap<String, String>,
}

impl FileInput {
    /// Convenience constructor for a regular file without properties.
    #[must_use]
    pub fn new(filename: impl Into<PathBuf>, tree: SyntaxTree) -> Self {
        Self {
            filename: filename.into(),
            file_kind: FileKind::Regular,
            tree,
            properties: FxHashMap::default(),
        }
    }
}

/// Result of linting or formatting one file.
#[derive(Debug)]
pub struct RunOutcome {
    /// Path of the processed file.
    pub filename: PathBuf,
    /// The tree after processing (mutated in format mode).
    pub tree: SyntaxTree,
    /// The tree's text after processing; in format mode this is the
    /// corrected source.
    pub text: String,
    /// Violations ordered by (line, column, rule id).
    pub violations: Vec<Violation>,
    /// Warnings from configuration resolution; the run proceeded on
    /// defaults for the affected properties.
    pub config_warnings: Vec<ConfigError>,
    /// Non-fatal errors encountered mid-run (abandoned rule traversals).
    pub errors: Vec<EngineError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Lint,
    Format,
}

/// The rule engine: a rule registry plus configuration overrides, reusable
/// across files and threads.
#[derive(Debug)]
pub struct Engine {
    providers: Vec<RuleProvider>,
    overrides: FxHashMap<String, String>,
}

impl Engine {
    /// Creates an engine over the given rules.
    #[must_use]
    pub fn new(providers: Vec<RuleProvider>) -> Self {
        Self {
            providers,
            overrides: FxHashMap::default(),
        }
    }

    /// An engine loaded with the standard rule set.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(vec![
            ArgumentListWrappingRule::provider(),
            IndentationRule::provider(),
        ])
    }

    /// Adds a configuration override that wins over every file's own
    /// properties.
    #[must_use]
    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    /// Lints one file: reports violations without mutating the tree's text.
    ///
    /// # Errors
    /// Returns a fatal [`EngineError`] when the active rules cannot be
    /// scheduled.
    pub fn lint(&self, input: FileInput) -> Result<RunOutcome, EngineError> {
        self.run(input, Mode::Lint)
    }

    /// Formats one file: applies every correctable fix, re-running the rule
    /// pipeline until a fixpoint or the run budget is reached.
    ///
    /// # Errors
    /// Returns a fatal [`EngineError`] when the active rules cannot be
    /// scheduled.
    pub fn format(&self, input: FileInput) -> Result<RunOutcome, EngineError> {
        self.run(input, Mode::Format)
    }

    /// Lints a batch of files in parallel. Outcomes keep the input order;
    /// one file's fatal error does not abort the others.
    #[must_use]
    pub fn lint_batch(&self, inputs: Vec<FileInput>) -> Vec<Result<RunOutcome, EngineError>> {
        inputs.into_par_iter().map(|input| self.lint(input)).collect()
    }

    /// Formats a batch of files in parallel.
    #[must_use]
    pub fn format_batch(&self, inputs: Vec<FileInput>) -> Vec<Result<RunOutcome, EngineError>> {
        inputs
            .into_par_iter()
            .map(|input| self.format(input))
            .collect()
    }

    fn run(&self, input: FileInput, mode: Mode) -> Result<RunOutcome, EngineError> {
        let FileInput {
            filename,
            file_kind,
            mut tree,
            properties,
        } = input;
        let (resolved, config_warnings) = config::resolve(&self.overrides, &properties);

        let active: Vec<&RuleProvider> = self
            .providers
            .iter()
            .filter(|p| resolved.rule_enabled(&p.metadata().id.to_string()))
            .filter(|p| p.metadata().applicability.covers_file(file_kind))
            .collect();
        let metadata: Vec<RuleMetadata> = active.iter().map(|p| p.metadata()).collect();
        let order = scheduler::schedule(&metadata)?;

        tracing::debug!(
            file = %filename.display(),
            rules = active.len(),
            ?mode,
            "processing file"
        );

        let ctx = Context {
            filename: filename.clone(),
            file_kind,
            config: resolved,
        };
        let mut sink = ViolationSink::default();
        let mut errors = Vec::new();

        match mode {
            Mode::Lint => {
                run_pass(&mut tree, &active, &order, &ctx, false, &mut sink, &mut errors);
            }
            Mode::Format => {
                let mut last_fixed = 0;
                for run in 0..MAX_FORMAT_RUNS {
                    last_fixed =
                        run_pass(&mut tree, &active, &order, &ctx, true, &mut sink, &mut errors);
                    if last_fixed == 0 {
                        break;
                    }
                    tracing::debug!(run, fixed = last_fixed, "format pass applied fixes");
                }
                if last_fixed > 0 {
                    // Budget exhausted while fixes were still landing; one
                    // report-only pass catches what is left.
                    tracing::warn!(
                        file = %filename.display(),
                        runs = MAX_FORMAT_RUNS,
                        "format run budget exhausted before reaching a fixpoint"
                    );
                    run_pass(&mut tree, &active, &order, &ctx, false, &mut sink, &mut errors);
                }
            }
        }

        let mut violations = sink.violations;
        violations.sort_by(|a, b| {
            (a.line, a.col, &a.rule_id).cmp(&(b.line, b.col, &b.rule_id))
        });

        let text = tree.text(tree.root());
        Ok(RunOutcome {
            filename,
            tree,
            text,
            violations,
            config_warnings,
            errors,
        })
    }
}

/// Violation collector deduplicating repeats across format passes (a
/// non-correctable violation is rediscovered by every pass).
#[derive(Default)]
struct ViolationSink {
    violations: Vec<Violation>,
    seen: FxHashSet<(String, usize, usize, String)>,
}

impl ViolationSink {
    fn push(&mut self, violation: Violation) {
        let key = (
            violation.rule_id.clone(),
            violation.line,
            violation.col,
            violation.message.clone(),
        );
        if self.seen.insert(key) {
            self.violations.push(violation);
        }
    }
}

/// Runs every active rule once, in order. Returns the number of applied
/// fixes.
fn run_pass(
    tree: &mut SyntaxTree,
    providers: &[&RuleProvider],
    order: &[usize],
    ctx: &Context,
    format: bool,
    sink: &mut ViolationSink,
    errors: &mut Vec<EngineError>,
) -> usize {
    let mut total_fixed = 0;
    for &i in order {
        let metadata = providers[i].metadata();
        let mut rule = providers[i].create();
        rule.before_first_node(tree, ctx);
        let mut visitor = RuleVisitor {
            rule_id: metadata.id.to_string(),
            format,
            index: LineIndex::new(&tree.text(tree.root())),
            locator: SuppressionLocator::new(tree),
            dirty: false,
            fixed: 0,
        };
        if let Err(source) = visitor.visit(rule.as_mut(), tree, tree.root(), ctx, &metadata, sink) {
            tracing::warn!(
                rule = %metadata.id,
                error = %source,
                "rule traversal abandoned after rejected mutation"
            );
            errors.push(EngineError::Mutation {
                rule: metadata.id.to_string(),
                source,
            });
        }
        total_fixed += visitor.fixed;
    }
    total_fixed
}

/// One rule's traversal state: position index and suppression snapshot,
/// rebuilt lazily after any applied fix so both stay consistent with the
/// mutated tree.
struct RuleVisitor {
    rule_id: String,
    format: bool,
    index: LineIndex,
    locator: SuppressionLocator,
    dirty: bool,
    fixed: usize,
}

impl RuleVisitor {
    fn visit(
        &mut self,
        rule: &mut dyn Rule,
        tree: &mut SyntaxTree,
        node: NodeId,
        ctx: &Context,
        metadata: &RuleMetadata,
        sink: &mut ViolationSink,
    ) -> Result<(), MutationError> {
        let covered = metadata.applicability.covers_kind(tree.kind(node));
        if covered {
            self.hook(rule, tree, node, ctx, sink, true)?;
        }
        // The enter hook may have detached this node; its subtree is gone.
        if node != tree.root() && tree.parent(node).is_none() {
            return Ok(());
        }
        let children: Vec<NodeId> = tree.children(node).to_vec();
        for child in children {
            if tree.parent(child) == Some(node) {
                self.visit(rule, tree, child, ctx, metadata, sink)?;
            }
        }
        if covered {
            self.hook(rule, tree, node, ctx, sink, false)?;
        }
        Ok(())
    }

    fn hook(
        &mut self,
        rule: &mut dyn Rule,
        tree: &mut SyntaxTree,
        node: NodeId,
        ctx: &Context,
        sink: &mut ViolationSink,
        enter: bool,
    ) -> Result<(), MutationError> {
        let Self {
            rule_id,
            format,
            index,
            locator,
            dirty,
            fixed,
        } = self;
        let mut emit = |tree: &SyntaxTree, offset: usize, message: String, can_be_autocorrected: bool| {
            // An applied fix shifts offsets; rebuild against the text the
            // rule sees right now, even mid-hook.
            if *dirty {
                *index = LineIndex::new(&tree.text(tree.root()));
                *locator = SuppressionLocator::new(tree);
                *dirty = false;
            }
            if locator.is_suppressed(rule_id, offset) {
                return AutocorrectDecision::Deny;
            }
            let pos = index.position(offset);
            sink.push(Violation {
                rule_id: rule_id.clone(),
                line: pos.line,
                col: pos.column,
                message,
                can_be_autocorrected,
            });
            if *format && can_be_autocorrected {
                *fixed += 1;
                *dirty = true;
                AutocorrectDecision::Allow
            } else {
                AutocorrectDecision::Deny
            }
        };
        if enter {
            rule.enter_node(tree, node, ctx, &mut emit)
        } else {
            rule.leave_node(tree, node, ctx, &mut emit)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::kotlin_call_file;
    use crate::tree::{SyntaxKind, TreeBuilder};

    fn properties(entries: &[(&str, &str)]) -> FxHashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn lint_reports_without_mutating() {
        let engine = Engine::standard();
        let tree = kotlin_call_file(&["a", "b, c"]);
        let original = tree.text(tree.root());
        let outcome = engine.lint(FileInput::new("Call.kt", tree)).unwrap();
        assert_eq!(outcome.text, original);
        assert!(outcome
            .violations
            .iter()
            .any(|v| v.rule_id == "standard:argument-list-wrapping"));
    }

    #[test]
    fn format_applies_wrapping_and_indentation_in_one_run() {
        let engine = Engine::standard();
        let tree = kotlin_call_file(&["a", "b, c"]);
        let outcome = engine.format(FileInput::new("Call.kt", tree)).unwrap();
        assert_eq!(outcome.text, "val x = f(\n    a,\n    b,\n    c\n)");
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn disabled_rule_does_not_run() {
        let engine = Engine::standard();
        let tree = kotlin_call_file(&["a", "b, c"]);
        let mut input = FileInput::new("Call.kt", tree);
        input.properties = properties(&[("kstyle_standard_argument-list-wrapping", "disabled")]);
        let outcome = engine.lint(input).unwrap();
        assert!(outcome
            .violations
            .iter()
            .all(|v| v.rule_id != "standard:argument-list-wrapping"));
    }

    #[test]
    fn file_suppression_silences_all_rules() {
        let mut b = TreeBuilder::new();
        let comment = b.leaf(SyntaxKind::EolComment, "// kstyle-disable-file");
        let ws = b.whitespace("\n");
        let kw = b.leaf(SyntaxKind::Keyword, "class");
        let ws2 = b.whitespace(" ");
        let name = b.leaf(SyntaxKind::Identifier, "Foo");
        let lpar = b.leaf(SyntaxKind::LPar, "(");
        let rpar = b.leaf(SyntaxKind::RPar, ")");
        let params = b.node(SyntaxKind::ValueParameterList, vec![lpar, rpar]);
        let class = b.node(SyntaxKind::Class, vec![kw, ws2, name, params]);
        let file = b.node(SyntaxKind::File, vec![comment, ws, class]);
        let tree = b.finish(file);
        let original = tree.text(tree.root());

        let engine = Engine::standard();
        let outcome = engine.format(FileInput::new("Foo.kt", tree)).unwrap();
        assert!(outcome.violations.is_empty());
        assert_eq!(outcome.text, original);
    }

    #[test]
    fn override_wins_over_file_properties() {
        let engine = Engine::standard().with_override("indent_size", "2");
        let mut b = TreeBuilder::new();
        let kw = b.leaf(SyntaxKind::Keyword, "fun");
        let ws0 = b.whitespace(" ");
        let name = b.leaf(SyntaxKind::Identifier, "main()");
        let ws1 = b.whitespace(" ");
        let lbrace = b.leaf(SyntaxKind::LBrace, "{");
        let ws2 = b.whitespace("\n   ");
        let body = b.leaf(SyntaxKind::Identifier, "x()");
        let ws3 = b.whitespace("\n");
        let rbrace = b.leaf(SyntaxKind::RBrace, "}");
        let block = b.node(SyntaxKind::Block, vec![lbrace, ws2, body, ws3, rbrace]);
        let fun = b.node(SyntaxKind::Fun, vec![kw, ws0, name, ws1, block]);
        let file = b.node(SyntaxKind::File, vec![fun]);
        let tree = b.finish(file);

        let mut input = FileInput::new("Main.kt", tree);
        input.properties = properties(&[("indent_size", "4")]);
        let outcome = engine.format(input).unwrap();
        assert_eq!(outcome.text, "fun main() {\n  x()\n}");
    }

    #[test]
    fn batch_preserves_order_and_isolates_files() {
        let engine = Engine::standard();
        let inputs = vec![
            FileInput::new("A.kt", kotlin_call_file(&["a", "b, c"])),
            FileInput::new("B.kt", kotlin_call_file(&["a"])),
        ];
        let outcomes = engine.format_batch(inputs);
        assert_eq!(outcomes.len(), 2);
        let first = outcomes[0].as_ref().unwrap();
        let second = outcomes[1].as_ref().unwrap();
        assert_eq!(first.filename, PathBuf::from("A.kt"));
        assert_eq!(second.filename, PathBuf::from("B.kt"));
        assert!(!first.violations.is_empty());
        assert!(second.violations.is_empty());
    }

    #[test]
    fn config_warnings_surface_without_failing_the_run() {
        let engine = Engine::standard();
        let mut input = FileInput::new("Call.kt", kotlin_call_file(&["a"]));
        input.properties = properties(&[("max_line_length", "tiny")]);
        let outcome = engine.lint(input).unwrap();
        assert_eq!(outcome.config_warnings.len(), 1);
    }
}
