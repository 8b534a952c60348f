//! Guards and integer expressions over captures.

use super::pattern::{same_bound, Bindings, Bound, KindSet};
use crate::arena::NodeIndex;
use crate::automaton::{Automaton, State};
use crate::error::{InternalError, RuleError};
use crate::schema::Schema;
use std::fmt;

/// Expression evaluated against a match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Capture(String),
    /// Number of members of a captured rest, collection, or term contents.
    Size(String),
    Int(i64),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn capture(name: &str) -> Self {
        Expr::Capture(name.to_string())
    }

    pub fn size(name: &str) -> Self {
        Expr::Size(name.to_string())
    }

    pub fn add(self, rhs: Expr) -> Self {
        Expr::Add(Box::new(self), Box::new(rhs))
    }

    pub fn sub(self, rhs: Expr) -> Self {
        Expr::Sub(Box::new(self), Box::new(rhs))
    }

    pub(crate) fn captures(&self, out: &mut Vec<String>) {
        match self {
            Expr::Capture(name) | Expr::Size(name) => out.push(name.clone()),
            Expr::Int(_) => {}
            Expr::Add(l, r) | Expr::Sub(l, r) => {
                l.captures(out);
                r.captures(out);
            }
        }
    }

    pub(crate) fn eval(&self, a: &Automaton, b: &Bindings, rule: &str) -> Result<Bound, InternalError> {
        match self {
            Expr::Capture(name) => lookup(b, name, rule).cloned(),
            Expr::Size(name) => {
                let members = members(a, lookup(b, name, rule)?, rule)?;
                Ok(Bound::Int(members.len() as i64))
            }
            Expr::Int(i) => Ok(Bound::Int(*i)),
            Expr::Add(l, r) => {
                let (l, r) = (l.eval_int(a, b, rule)?, r.eval_int(a, b, rule)?);
                Ok(Bound::Int(l.wrapping_add(r)))
            }
            Expr::Sub(l, r) => {
                let (l, r) = (l.eval_int(a, b, rule)?, r.eval_int(a, b, rule)?);
                Ok(Bound::Int(l.wrapping_sub(r)))
            }
        }
    }

    pub(crate) fn eval_int(&self, a: &Automaton, b: &Bindings, rule: &str) -> Result<i64, InternalError> {
        match self.eval(a, b, rule)? {
            Bound::Int(i) => Ok(i),
            other => Err(InternalError::GuardType {
                rule: rule.to_string(),
                detail: format!("`{self}` is {other:?}, not an integer"),
            }),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Capture(name) => write!(f, "{name}"),
            Expr::Size(name) => write!(f, "|{name}|"),
            Expr::Int(i) => write!(f, "{i}"),
            Expr::Add(l, r) => write!(f, "({l} + {r})"),
            Expr::Sub(l, r) => write!(f, "({l} - {r})"),
        }
    }
}

pub(crate) fn lookup<'b>(b: &'b Bindings, name: &str, rule: &str) -> Result<&'b Bound, InternalError> {
    b.get(name).ok_or_else(|| InternalError::UnboundCapture {
        rule: rule.to_string(),
        capture: name.to_string(),
    })
}

/// Members of a bound value: a rest capture, a collection node, or the
/// fields of a term node.
pub(crate) fn members<'a>(
    a: &'a Automaton,
    bound: &'a Bound,
    rule: &str,
) -> Result<&'a [NodeIndex], InternalError> {
    match bound {
        Bound::Many(nodes) => Ok(nodes),
        Bound::Node(node) => match a.try_get(*node)? {
            State::Collection { children, .. } => Ok(children),
            State::Term { .. } => Ok(a.term_fields(*node)?.1.unwrap_or(&[])),
            other => Err(InternalError::GuardType {
                rule: rule.to_string(),
                detail: format!("{} has no members", other.describe()),
            }),
        },
        Bound::Int(i) => Err(InternalError::GuardType {
            rule: rule.to_string(),
            detail: format!("integer {i} has no members"),
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cmp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for Cmp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Cmp::Eq => "==",
            Cmp::Ne => "!=",
            Cmp::Lt => "<",
            Cmp::Le => "<=",
            Cmp::Gt => ">",
            Cmp::Ge => ">=",
        })
    }
}

/// Boolean condition selecting a replacement clause.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Guard<K = KindSet> {
    Compare(Expr, Cmp, Expr),
    /// The capture is a term of one of the kinds.
    Is(String, K),
    Not(Box<Guard<K>>),
    All(Vec<Guard<K>>),
    Any(Vec<Guard<K>>),
}

impl Guard<String> {
    pub fn compare(lhs: Expr, cmp: Cmp, rhs: Expr) -> Self {
        Guard::Compare(lhs, cmp, rhs)
    }

    pub fn equals(lhs: Expr, rhs: Expr) -> Self {
        Guard::Compare(lhs, Cmp::Eq, rhs)
    }

    pub fn differs(lhs: Expr, rhs: Expr) -> Self {
        Guard::Compare(lhs, Cmp::Ne, rhs)
    }

    pub fn is(capture: &str, kind: &str) -> Self {
        Guard::Is(capture.to_string(), kind.to_string())
    }

    pub fn negate(self) -> Self {
        Guard::Not(Box::new(self))
    }

    pub fn resolve(&self, rule: &str, schema: &Schema) -> Result<Guard<KindSet>, RuleError> {
        let all = |gs: &[Guard<String>]| -> Result<Vec<Guard<KindSet>>, RuleError> {
            gs.iter().map(|g| g.resolve(rule, schema)).collect()
        };
        Ok(match self {
            Guard::Compare(l, c, r) => Guard::Compare(l.clone(), *c, r.clone()),
            Guard::Is(cap, name) => Guard::Is(
                cap.clone(),
                schema
                    .resolve(name)
                    .map(KindSet::new)
                    .ok_or_else(|| RuleError::UnknownKind {
                        rule: rule.to_string(),
                        kind: name.clone(),
                    })?,
            ),
            Guard::Not(g) => Guard::Not(Box::new(g.resolve(rule, schema)?)),
            Guard::All(gs) => Guard::All(all(gs)?),
            Guard::Any(gs) => Guard::Any(all(gs)?),
        })
    }
}

impl<K> Guard<K> {
    /// Every capture name read by this guard.
    pub fn captures(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_captures(&mut out);
        out
    }

    fn collect_captures(&self, out: &mut Vec<String>) {
        match self {
            Guard::Compare(l, _, r) => {
                l.captures(out);
                r.captures(out);
            }
            Guard::Is(cap, _) => out.push(cap.clone()),
            Guard::Not(g) => g.collect_captures(out),
            Guard::All(gs) | Guard::Any(gs) => gs.iter().for_each(|g| g.collect_captures(out)),
        }
    }
}

impl Guard<KindSet> {
    pub fn eval(&self, a: &Automaton, b: &Bindings, rule: &str) -> Result<bool, InternalError> {
        match self {
            Guard::Compare(l, cmp, r) => {
                let (lv, rv) = (l.eval(a, b, rule)?, r.eval(a, b, rule)?);
                match (&lv, &rv) {
                    (Bound::Int(x), Bound::Int(y)) => Ok(match cmp {
                        Cmp::Eq => x == y,
                        Cmp::Ne => x != y,
                        Cmp::Lt => x < y,
                        Cmp::Le => x <= y,
                        Cmp::Gt => x > y,
                        Cmp::Ge => x >= y,
                    }),
                    _ => match cmp {
                        Cmp::Eq => same_bound(a, &lv, &rv),
                        Cmp::Ne => Ok(!same_bound(a, &lv, &rv)?),
                        _ => Err(InternalError::GuardType {
                            rule: rule.to_string(),
                            detail: format!("`{l} {cmp} {r}` orders non-integers"),
                        }),
                    },
                }
            }
            Guard::Is(cap, kinds) => match lookup(b, cap, rule)? {
                Bound::Node(node) => Ok(matches!(
                    a.try_get(*node)?,
                    State::Term { kind, .. } if kinds.contains(*kind)
                )),
                _ => Ok(false),
            },
            Guard::Not(g) => Ok(!g.eval(a, b, rule)?),
            Guard::All(gs) => {
                for g in gs {
                    if !g.eval(a, b, rule)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Guard::Any(gs) => {
                for g in gs {
                    if g.eval(a, b, rule)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}
