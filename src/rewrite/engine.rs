//! Ranked rewriting to a fixpoint.
//!
//! Each step scans the nodes reachable from the root in pre-order, queues
//! every (node, rule) pair whose head kind fits, and pops candidates in the
//! total order of [`Candidate`]. The first rule that actually fires rewrites
//! its focus: the replacement is built into the current automaton and the
//! graph is re-canonicalized with every edge into the focus redirected to
//! the replacement. Edges inside opaque terms keep the focus even when the
//! node is shared with the rewritten part. The run ends when no candidate
//! fires.
//!
//! # Determinism
//! Identical input types and rule sets produce identical step sequences:
//! automata are canonical between steps and candidate order is total.

use super::registry::RuleRegistry;
use crate::arena::NodeIndex;
use crate::automaton::{Automaton, State};
use crate::config::DEFAULT_REWRITE_BUDGET;
use crate::error::InternalError;
use crate::fingerprint::structural_hash;
use crate::schema::KindId;
use crate::trace::{RewriteStep, RewriteTrace};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};
use tracing::{debug, trace, warn};

/// A rule that may fire at a node.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub rank: i32,
    /// Pre-order position of the focus node.
    pub position: usize,
    /// Index of the rule in the registry.
    pub rule: usize,
    pub focus: NodeIndex,
}

/// Order key:
/// 1. `rank`
/// 2. `position`
/// 3. `rule`
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.rank, self.position, self.rule).cmp(&(other.rank, other.position, other.rule))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

/// Result of a rewrite run.
#[derive(Debug, Clone)]
pub struct RewriteOutcome {
    /// Canonical automaton of the fixpoint, root label 0.
    pub automaton: Automaton,
    /// Number of rewrites applied.
    pub steps: usize,
    pub trace: Option<RewriteTrace>,
}

/// Drives a [`RuleRegistry`] over one automaton.
#[derive(Debug, Clone)]
pub struct Rewriter<'r> {
    registry: &'r RuleRegistry,
    budget: usize,
    opaque: Vec<KindId>,
    record: bool,
}

impl<'r> Rewriter<'r> {
    pub fn new(registry: &'r RuleRegistry) -> Self {
        Self {
            registry,
            budget: DEFAULT_REWRITE_BUDGET,
            opaque: Vec::new(),
            record: false,
        }
    }

    /// Caps the number of rewrites per run.
    pub fn with_budget(mut self, budget: usize) -> Self {
        self.budget = budget;
        self
    }

    /// Terms of `kind` are matched themselves but their contents are never visited.
    pub fn opaque(mut self, kind: KindId) -> Self {
        if !self.opaque.contains(&kind) {
            self.opaque.push(kind);
        }
        self
    }

    pub fn recording(mut self, record: bool) -> Self {
        self.record = record;
        self
    }

    /// Rewrites the graph under `root` until no rule fires.
    pub fn run(&self, a: &Automaton, root: NodeIndex) -> Result<RewriteOutcome, InternalError> {
        let rules = self.registry.rules();
        let mut current = a.canonicalize(root)?;
        let mut trace = if self.record {
            Some(RewriteTrace::new(structural_hash(&current, current.try_root(0)?)?))
        } else {
            None
        };
        let mut steps = 0;

        loop {
            let root = current.try_root(0)?;
            let mut queue = BinaryHeap::new();
            for (position, node) in self.positions(&current, root)?.into_iter().enumerate() {
                if let State::Term { kind, .. } = current.get(node) {
                    for &rule in self.registry.headed_by(*kind) {
                        queue.push(Reverse(Candidate {
                            rank: rules[rule].rank,
                            position,
                            rule,
                            focus: node,
                        }));
                    }
                }
            }
            trace!(candidates = queue.len(), "scanning rewrite candidates");

            let mut fired = None;
            while let Some(Reverse(candidate)) = queue.pop() {
                let rule = &rules[candidate.rule];
                match rule.try_apply(&mut current, candidate.focus)? {
                    Some(replacement) if replacement != candidate.focus => {
                        fired = Some((candidate, replacement));
                        break;
                    }
                    _ => {}
                }
            }
            let Some((candidate, replacement)) = fired else {
                break;
            };
            let rule = &rules[candidate.rule];

            if steps == self.budget {
                warn!(
                    budget = self.budget,
                    rule = %rule.name,
                    "rewrite budget exhausted before reaching a fixpoint"
                );
                return Err(InternalError::BudgetExhausted {
                    budget: self.budget,
                    last_rule: rule.name.clone(),
                });
            }

            let next = current.canonicalize_redirected(root, candidate.focus, replacement, &self.opaque)?;
            debug!(
                rule = %rule.name,
                rank = rule.rank,
                focus = %candidate.focus,
                "rewrite fired"
            );
            if let Some(trace) = trace.as_mut() {
                trace.record_step(RewriteStep {
                    rule: rule.name.clone(),
                    rank: rule.rank,
                    focus: candidate.focus,
                    before: structural_hash(&current, root)?,
                    after: structural_hash(&next, next.try_root(0)?)?,
                });
            }
            current = next;
            steps += 1;
        }

        Ok(RewriteOutcome {
            automaton: current,
            steps,
            trace,
        })
    }

    /// Nodes reachable from `root` in pre-order, without entering opaque terms.
    fn positions(&self, a: &Automaton, root: NodeIndex) -> Result<Vec<NodeIndex>, InternalError> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if !seen.insert(node) {
                continue;
            }
            let state = a.try_get(node)?;
            order.push(node);
            if let State::Term { kind, .. } = state {
                if self.opaque.contains(kind) {
                    continue;
                }
            }
            stack.extend(state.children().iter().rev().copied());
        }
        Ok(order)
    }
}
