//! Validated, rank-ordered rule sets.

use super::rule::{Rule, RuleDecl};
use crate::error::RuleError;
use crate::fingerprint::{HashValue, DOMAIN_RULE_SET_V0};
use crate::schema::{KindId, Schema};
use std::collections::{BTreeMap, HashSet};

/// Immutable registry of resolved rules.
///
/// Rules are kept sorted by rank; declaration order breaks ties. Built once
/// and shared by reference (usually behind an `Arc`) with every normalizer.
#[derive(Debug, Clone)]
pub struct RuleRegistry {
    rules: Vec<Rule>,
    by_head: BTreeMap<KindId, Vec<usize>>,
    fingerprint: HashValue,
}

impl RuleRegistry {
    /// Resolves and validates `decls` against `schema`.
    pub fn new(schema: &Schema, decls: Vec<RuleDecl>) -> Result<Self, RuleError> {
        let mut seen = HashSet::with_capacity(decls.len());
        let mut rules = Vec::with_capacity(decls.len());
        for decl in &decls {
            if !seen.insert(decl.name.clone()) {
                return Err(RuleError::DuplicateName(decl.name.clone()));
            }
            rules.push(decl.resolve(schema)?);
        }
        rules.sort_by_key(|r| r.rank);

        let mut by_head: BTreeMap<KindId, Vec<usize>> = BTreeMap::new();
        for (i, rule) in rules.iter().enumerate() {
            by_head.entry(rule.head).or_default().push(i);
        }

        let mut bytes = Vec::with_capacity(rules.len() * 64);
        bytes.extend_from_slice(&(rules.len() as u64).to_le_bytes());
        for rule in &rules {
            let text = format!("{}|{}|{:?}|{:?}", rule.rank, rule.name, rule.pattern, rule.clauses);
            bytes.extend_from_slice(&(text.len() as u64).to_le_bytes());
            bytes.extend_from_slice(text.as_bytes());
        }
        let fingerprint = HashValue::hash_with_domain(DOMAIN_RULE_SET_V0, &bytes);

        Ok(Self {
            rules,
            by_head,
            fingerprint,
        })
    }

    /// Rules in rank order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Positions (into [`RuleRegistry::rules`]) of the rules headed by `kind`, in rank order.
    pub fn headed_by(&self, kind: KindId) -> &[usize] {
        self.by_head.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Identity of this rule set, part of every normalization cache key.
    pub fn fingerprint(&self) -> HashValue {
        self.fingerprint
    }
}
