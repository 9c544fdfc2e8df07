//! Rule execution ordering.
//!
//! Rules declare `runs_after`/`runs_before` constraints against other rule
//! ids. The scheduler builds a dependency graph over the active rules and
//! produces a total order respecting every declared edge. Ties are broken
//! deterministically: rules of the `standard` rule set first, then by rule
//! id, then by registration order. A cycle is fatal for the file; no rule
//! runs in a nonsensical order.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use rustc_hash::FxHashMap;

use crate::rules::RuleMetadata;

/// Rule set whose rules win scheduling ties.
const STANDARD_RULESET: &str = "standard";

/// Error computing a rule execution order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulingError {
    /// The `runs_after`/`runs_before` declarations form a cycle.
    #[error("cyclic rule dependency involving {}", rules.join(", "))]
    Cycle {
        /// Ids of the rules on the cycle, sorted.
        rules: Vec<String>,
    },
    /// Two active rules share an id; the order would be ambiguous.
    #[error("duplicate rule id '{rule}'")]
    DuplicateId {
        /// The colliding id.
        rule: String,
    },
}

/// Computes the execution order of the given active rules, as indices into
/// the input slice.
///
/// Constraints naming a rule that is not active are ignored; there is
/// nothing to order against.
pub fn schedule(metadata: &[RuleMetadata]) -> Result<Vec<usize>, SchedulingError> {
    let mut by_id: FxHashMap<String, usize> = FxHashMap::default();
    for (i, meta) in metadata.iter().enumerate() {
        if by_id.insert(meta.id.to_string(), i).is_some() {
            return Err(SchedulingError::DuplicateId {
                rule: meta.id.to_string(),
            });
        }
    }

    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let nodes: Vec<NodeIndex> = (0..metadata.len()).map(|i| graph.add_node(i)).collect();
    for (i, meta) in metadata.iter().enumerate() {
        for dep in meta.runs_after {
            if let Some(&j) = by_id.get(&dep.to_string()) {
                graph.add_edge(nodes[j], nodes[i], ());
            }
        }
        for successor in meta.runs_before {
            if let Some(&j) = by_id.get(&successor.to_string()) {
                graph.add_edge(nodes[i], nodes[j], ());
            }
        }
    }

    // Tarjan reports strongly connected components; any component with more
    // than one member (or a self edge) is a cycle.
    for component in tarjan_scc(&graph) {
        let cyclic = component.len() > 1 || component.iter().any(|&n| graph.contains_edge(n, n));
        if cyclic {
            let mut rules: Vec<String> = component
                .iter()
                .map(|&n| metadata[graph[n]].id.to_string())
                .collect();
            rules.sort_unstable();
            return Err(SchedulingError::Cycle { rules });
        }
    }

    // Kahn's algorithm with a deterministic tie-break, so identical inputs
    // always yield identical orders.
    let mut indegree: Vec<usize> = nodes
        .iter()
        .map(|&n| graph.neighbors_directed(n, Direction::Incoming).count())
        .collect();
    let mut ready: Vec<usize> = (0..metadata.len()).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(metadata.len());
    while !ready.is_empty() {
        ready.sort_unstable_by(|&a, &b| {
            tie_break_key(&metadata[a], a).cmp(&tie_break_key(&metadata[b], b))
        });
        let next = ready.remove(0);
        order.push(next);
        for neighbor in graph.neighbors_directed(nodes[next], Direction::Outgoing) {
            let i = graph[neighbor];
            indegree[i] -= 1;
            if indegree[i] == 0 {
                ready.push(i);
            }
        }
    }

    log_order_once(&order, metadata);
    Ok(order)
}

/// Logs each distinct execution order once per process; batches of files
/// sharing a configuration would otherwise repeat the same line per file.
fn log_order_once(order: &[usize], metadata: &[RuleMetadata]) {
    use std::sync::{Mutex, OnceLock};

    static LOGGED: OnceLock<Mutex<rustc_hash::FxHashSet<Vec<String>>>> = OnceLock::new();

    let ids: Vec<String> = order.iter().map(|&i| metadata[i].id.to_string()).collect();
    let logged = LOGGED.get_or_init(|| Mutex::new(rustc_hash::FxHashSet::default()));
    if let Ok(mut seen) = logged.lock() {
        if seen.insert(ids.clone()) {
            tracing::debug!(order = ?ids, "resolved rule execution order");
        }
    }
}

fn tie_break_key(meta: &RuleMetadata, index: usize) -> (bool, String, usize) {
    (
        meta.id.ruleset != STANDARD_RULESET,
        meta.id.to_string(),
        index,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Applicability, RuleId};

    const fn meta(
        id: RuleId,
        runs_after: &'static [RuleId],
        runs_before: &'static [RuleId],
    ) -> RuleMetadata {
        RuleMetadata {
            id,
            runs_after,
            runs_before,
            applicability: Applicability::ALL,
        }
    }

    const A: RuleId = RuleId::new("standard", "a");
    const B: RuleId = RuleId::new("standard", "b");
    const C: RuleId = RuleId::new("custom", "c");

    #[test]
    fn respects_runs_after_edges() {
        let rules = [meta(B, &[A], &[]), meta(A, &[], &[])];
        let order = schedule(&rules).unwrap();
        assert_eq!(order, vec![1, 0]);
    }

    #[test]
    fn respects_runs_before_edges() {
        let rules = [meta(C, &[], &[]), meta(A, &[], &[C])];
        let order = schedule(&rules).unwrap();
        assert_eq!(order, vec![1, 0]);
    }

    #[test]
    fn standard_ruleset_wins_ties() {
        let rules = [meta(C, &[], &[]), meta(A, &[], &[]), meta(B, &[], &[])];
        let order = schedule(&rules).unwrap();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn cycle_is_fatal() {
        let rules = [meta(A, &[B], &[]), meta(B, &[A], &[])];
        let err = schedule(&rules).unwrap_err();
        assert_eq!(
            err,
            SchedulingError::Cycle {
                rules: vec!["standard:a".to_owned(), "standard:b".to_owned()],
            }
        );
    }

    #[test]
    fn constraint_on_inactive_rule_is_ignored() {
        let rules = [meta(B, &[A], &[])];
        let order = schedule(&rules).unwrap();
        assert_eq!(order, vec![0]);
    }

    #[test]
    fn duplicate_rule_ids_rejected() {
        let rules = [meta(A, &[], &[]), meta(A, &[], &[])];
        let err = schedule(&rules).unwrap_err();
        assert_eq!(
            err,
            SchedulingError::DuplicateId {
                rule: "standard:a".to_owned(),
            }
        );
    }

    #[test]
    fn order_is_stable_across_runs() {
        let rules = [
            meta(B, &[A], &[]),
            meta(C, &[], &[]),
            meta(A, &[], &[]),
        ];
        let first = schedule(&rules).unwrap();
        let second = schedule(&rules).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, vec![2, 0, 1]);
    }
}
