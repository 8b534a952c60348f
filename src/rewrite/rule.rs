//! Rule declarations and resolved rules.

use super::guard::Guard;
use super::pattern::{KindSet, Pattern};
use super::template::Template;
use crate::arena::NodeIndex;
use crate::automaton::Automaton;
use crate::error::{InternalError, RuleError};
use crate::schema::{KindId, Schema};

/// Replacement chosen when its guard holds (or unconditionally without one).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Clause<K = KindSet> {
    pub guard: Option<Guard<K>>,
    pub template: Template<K>,
}

/// A rule as written: kinds are still names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDecl {
    pub rank: i32,
    pub name: String,
    pub pattern: Pattern<String>,
    pub clauses: Vec<Clause<String>>,
}

impl RuleDecl {
    pub fn new(rank: i32, name: &str, pattern: Pattern<String>) -> Self {
        Self {
            rank,
            name: name.to_string(),
            pattern,
            clauses: Vec::new(),
        }
    }

    /// Adds an unconditional clause.
    pub fn rewrite_to(mut self, template: Template<String>) -> Self {
        self.clauses.push(Clause {
            guard: None,
            template,
        });
        self
    }

    /// Adds a guarded clause.
    pub fn when(mut self, guard: Guard<String>, template: Template<String>) -> Self {
        self.clauses.push(Clause {
            guard: Some(guard),
            template,
        });
        self
    }

    /// Validates this declaration against `schema`.
    pub fn resolve(&self, schema: &Schema) -> Result<Rule, RuleError> {
        let rule = self.name.as_str();
        let pattern = self.pattern.resolve(rule, schema)?;
        let head = head_kind(&pattern).ok_or_else(|| RuleError::HeadlessPattern {
            rule: rule.to_string(),
        })?;
        if self.clauses.is_empty() {
            return Err(RuleError::NoClauses {
                rule: rule.to_string(),
            });
        }
        let captures = pattern.captures();
        let mut clauses = Vec::with_capacity(self.clauses.len());
        for clause in &self.clauses {
            let guard = match &clause.guard {
                Some(g) => {
                    if let Some(capture) = g.captures().into_iter().find(|c| !captures.contains(c)) {
                        return Err(RuleError::UnboundCapture {
                            rule: rule.to_string(),
                            capture,
                        });
                    }
                    Some(g.resolve(rule, schema)?)
                }
                None => None,
            };
            clause.template.check_captures(&mut captures.clone(), rule)?;
            clauses.push(Clause {
                guard,
                template: clause.template.resolve(rule, schema)?,
            });
        }
        Ok(Rule {
            rank: self.rank,
            name: self.name.clone(),
            head,
            pattern,
            clauses,
        })
    }
}

fn head_kind(pattern: &Pattern<KindSet>) -> Option<KindId> {
    match pattern {
        Pattern::Bind(_, inner) => head_kind(inner),
        Pattern::Kind(kinds) | Pattern::Term { kind: kinds, .. } => kinds.head(),
        _ => None,
    }
}

/// A validated rule over one head kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub rank: i32,
    pub name: String,
    pub head: KindId,
    pub pattern: Pattern<KindSet>,
    pub clauses: Vec<Clause<KindSet>>,
}

impl Rule {
    /// Tries every match at `node` and builds the first clause whose guard
    /// holds. Returns the replacement node, built into `a`.
    pub fn try_apply(&self, a: &mut Automaton, node: NodeIndex) -> Result<Option<NodeIndex>, InternalError> {
        for bindings in self.pattern.matches(a, node)? {
            for clause in &self.clauses {
                let fires = match &clause.guard {
                    Some(g) => g.eval(a, &bindings, &self.name)?,
                    None => true,
                };
                if fires {
                    return clause.template.build(a, &bindings, &self.name).map(Some);
                }
            }
        }
        Ok(None)
    }
}
