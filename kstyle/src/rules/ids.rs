//! Centralized rule ids for the standard rule set.

use super::RuleId;

/// Wrapping of argument, parameter, type-parameter and super-type lists.
pub const ARGUMENT_LIST_WRAPPING_RULE_ID: RuleId = RuleId::new("standard", "argument-list-wrapping");
/// Indentation width checking and correction.
pub const INDENTATION_RULE_ID: RuleId = RuleId::new("standard", "indentation");
