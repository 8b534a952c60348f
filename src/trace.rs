//! Rewrite traces.
//!
//! A trace records each fired rule together with fingerprints of the whole
//! type before and after the step, so consecutive steps chain:
//! `steps[i].after == steps[i + 1].before`.

use crate::arena::NodeIndex;
use crate::fingerprint::HashValue;
use serde::{Deserialize, Serialize};

/// One fired rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteStep {
    /// Name of the rule that fired.
    pub rule: String,
    pub rank: i32,
    /// Node rewritten, in the automaton as it was before the step.
    pub focus: NodeIndex,
    /// Fingerprint of the type before the step.
    pub before: HashValue,
    /// Fingerprint of the type after the step.
    pub after: HashValue,
}

/// Ordered record of a normalization run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteTrace {
    initial: HashValue,
    steps: Vec<RewriteStep>,
}

impl RewriteTrace {
    /// Creates an empty trace starting from a type with fingerprint `initial`.
    pub fn new(initial: HashValue) -> Self {
        Self {
            initial,
            steps: Vec::new(),
        }
    }

    pub fn record_step(&mut self, step: RewriteStep) {
        self.steps.push(step);
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn get_step(&self, index: usize) -> Option<&RewriteStep> {
        self.steps.get(index)
    }

    pub fn steps(&self) -> impl Iterator<Item = &RewriteStep> {
        self.steps.iter()
    }

    /// Names of the fired rules, in firing order.
    pub fn rules_fired(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.rule.as_str()).collect()
    }

    pub fn initial_fingerprint(&self) -> HashValue {
        self.initial
    }

    /// Fingerprint after the last step (the initial one for an empty trace).
    pub fn final_fingerprint(&self) -> HashValue {
        self.steps.last().map_or(self.initial, |s| s.after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(tag: &[u8]) -> HashValue {
        HashValue::hash_with_domain(b"TEST", tag)
    }

    #[test]
    fn empty_trace_ends_where_it_starts() {
        let t = RewriteTrace::new(fp(b"a"));
        assert_eq!(t.step_count(), 0);
        assert_eq!(t.final_fingerprint(), fp(b"a"));
        assert!(t.get_step(0).is_none());
    }

    #[test]
    fn records_in_order() {
        let mut t = RewriteTrace::new(fp(b"a"));
        t.record_step(RewriteStep {
            rule: "first".into(),
            rank: 0,
            focus: NodeIndex::new(3),
            before: fp(b"a"),
            after: fp(b"b"),
        });
        t.record_step(RewriteStep {
            rule: "second".into(),
            rank: 2,
            focus: NodeIndex::new(1),
            before: fp(b"b"),
            after: fp(b"c"),
        });
        assert_eq!(t.rules_fired(), vec!["first", "second"]);
        assert_eq!(t.final_fingerprint(), fp(b"c"));
        assert_eq!(t.get_step(1).map(|s| s.rank), Some(2));
    }
}
