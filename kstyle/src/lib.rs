//! Core library of the kstyle formatting engine.
//!
//! Takes a parsed, lossless syntax tree of a Kotlin source file and runs an
//! ordered set of style rules over it, either reporting violations (lint)
//! or correcting the tree in place (format). Parsing, file I/O, and the CLI
//! live in external drivers; this crate owns the tree model, configuration
//! resolution, rule scheduling, suppression handling, and the rules
//! themselves.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

/// Module containing the lossless syntax tree model and mutation API.
pub mod tree;

/// Module resolving raw configuration properties into typed values.
pub mod config;

/// Module defining the rule abstraction and the standard rules.
pub mod rules;

/// Module containing the lint/format driver and the rule scheduler.
pub mod engine;

/// Module handling inline suppression directives.
pub mod suppression;

/// Module containing test utilities.
/// This helps in writing tests for the engine and rules.
pub mod test_utils;

pub use engine::{Engine, EngineError, FileInput, RunOutcome, SchedulingError};
pub use rules::{Rule, RuleId, RuleProvider, Violation};
pub use tree::{NodeId, SyntaxKind, SyntaxTree, TreeBuilder};
