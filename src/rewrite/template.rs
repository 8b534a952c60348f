//! Replacement templates.
//!
//! A template is instantiated into the automaton being rewritten, reusing
//! captured nodes directly. Collections are built from items: single
//! templates, splices of a captured rest, or comprehensions over the
//! members of a capture or over an integer range.

use super::guard::{lookup, members, Expr, Guard};
use super::pattern::{Bindings, Bound, KindSet};
use crate::arena::NodeIndex;
use crate::automaton::{Automaton, CollectionKind, State};
use crate::error::{InternalError, RuleError};
use crate::schema::Schema;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Template<K = KindSet> {
    /// A captured node.
    Capture(String),
    /// A new term. No fields means VOID contents.
    Term { kind: K, fields: Vec<Template<K>> },
    Set(Vec<Item<K>>),
    List(Vec<Item<K>>),
    /// Member `index` of a capture.
    At(String, Expr),
    /// `then` if the guard holds, `otherwise` if not.
    Cond(Box<Guard<K>>, Box<Template<K>>, Box<Template<K>>),
}

/// One contribution to a constructed collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Item<K = KindSet> {
    One(Template<K>),
    /// Every member of a capture.
    Splice(String),
    /// `body` instantiated once per value of `source`, with `var` bound.
    Each {
        var: String,
        source: Source,
        body: Template<K>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    /// Members of a capture, bound as nodes.
    Elements(String),
    /// Integers `lo..hi`, bound as integers.
    Range(Expr, Expr),
}

impl Source {
    pub fn elements(capture: &str) -> Self {
        Source::Elements(capture.to_string())
    }

    pub fn range(lo: Expr, hi: Expr) -> Self {
        Source::Range(lo, hi)
    }

    fn captures(&self, out: &mut Vec<String>) {
        match self {
            Source::Elements(cap) => out.push(cap.clone()),
            Source::Range(lo, hi) => {
                lo.captures(out);
                hi.captures(out);
            }
        }
    }
}

impl Template<String> {
    pub fn capture(name: &str) -> Self {
        Template::Capture(name.to_string())
    }

    pub fn term<const N: usize>(name: &str, fields: [Template<String>; N]) -> Self {
        Template::Term {
            kind: name.to_string(),
            fields: fields.into(),
        }
    }

    pub fn leaf(name: &str) -> Self {
        Template::Term {
            kind: name.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn set(items: Vec<Item<String>>) -> Self {
        Template::Set(items)
    }

    pub fn list(items: Vec<Item<String>>) -> Self {
        Template::List(items)
    }

    pub fn at(capture: &str, index: Expr) -> Self {
        Template::At(capture.to_string(), index)
    }

    pub fn cond(guard: Guard<String>, then: Template<String>, otherwise: Template<String>) -> Self {
        Template::Cond(Box::new(guard), Box::new(then), Box::new(otherwise))
    }

    /// Resolves constructed kinds, each of which must name exactly one kind.
    pub fn resolve(&self, rule: &str, schema: &Schema) -> Result<Template<KindSet>, RuleError> {
        Ok(match self {
            Template::Capture(name) => Template::Capture(name.clone()),
            Template::Term { kind, fields } => {
                let id = match schema.kind(kind) {
                    Some(id) => id,
                    None if schema.is_group(kind) => {
                        return Err(RuleError::AmbiguousKind {
                            rule: rule.to_string(),
                            name: kind.clone(),
                        })
                    }
                    None => {
                        return Err(RuleError::UnknownKind {
                            rule: rule.to_string(),
                            kind: kind.clone(),
                        })
                    }
                };
                Template::Term {
                    kind: KindSet::new(vec![id]),
                    fields: fields
                        .iter()
                        .map(|t| t.resolve(rule, schema))
                        .collect::<Result<_, _>>()?,
                }
            }
            Template::Set(items) => Template::Set(resolve_items(items, rule, schema)?),
            Template::List(items) => Template::List(resolve_items(items, rule, schema)?),
            Template::At(cap, index) => Template::At(cap.clone(), index.clone()),
            Template::Cond(g, t, e) => Template::Cond(
                Box::new(g.resolve(rule, schema)?),
                Box::new(t.resolve(rule, schema)?),
                Box::new(e.resolve(rule, schema)?),
            ),
        })
    }
}

fn resolve_items(
    items: &[Item<String>],
    rule: &str,
    schema: &Schema,
) -> Result<Vec<Item<KindSet>>, RuleError> {
    items
        .iter()
        .map(|item| {
            Ok(match item {
                Item::One(t) => Item::One(t.resolve(rule, schema)?),
                Item::Splice(cap) => Item::Splice(cap.clone()),
                Item::Each { var, source, body } => Item::Each {
                    var: var.clone(),
                    source: source.clone(),
                    body: body.resolve(rule, schema)?,
                },
            })
        })
        .collect()
}

impl Item<String> {
    pub fn one(t: Template<String>) -> Self {
        Item::One(t)
    }

    pub fn splice(capture: &str) -> Self {
        Item::Splice(capture.to_string())
    }

    pub fn each(var: &str, source: Source, body: Template<String>) -> Self {
        Item::Each {
            var: var.to_string(),
            source,
            body,
        }
    }
}

impl<K> Template<K> {
    /// Fails with the first capture read outside `scope`.
    pub fn check_captures(&self, scope: &mut Vec<String>, rule: &str) -> Result<(), RuleError> {
        let unbound = |name: &String| RuleError::UnboundCapture {
            rule: rule.to_string(),
            capture: name.clone(),
        };
        let require = |names: Vec<String>, scope: &[String]| {
            names
                .into_iter()
                .find(|n| !scope.contains(n))
                .map_or(Ok(()), |n| Err(unbound(&n)))
        };
        match self {
            Template::Capture(name) => require(vec![name.clone()], scope.as_slice()),
            Template::Term { fields, .. } => {
                for t in fields {
                    t.check_captures(scope, rule)?;
                }
                Ok(())
            }
            Template::Set(items) | Template::List(items) => {
                for item in items {
                    match item {
                        Item::One(t) => t.check_captures(scope, rule)?,
                        Item::Splice(cap) => require(vec![cap.clone()], scope.as_slice())?,
                        Item::Each { var, source, body } => {
                            let mut read = Vec::new();
                            source.captures(&mut read);
                            require(read, scope.as_slice())?;
                            scope.push(var.clone());
                            let checked = body.check_captures(scope, rule);
                            scope.pop();
                            checked?;
                        }
                    }
                }
                Ok(())
            }
            Template::At(cap, index) => {
                let mut read = vec![cap.clone()];
                index.captures(&mut read);
                require(read, scope.as_slice())
            }
            Template::Cond(g, t, e) => {
                require(g.captures(), scope.as_slice())?;
                t.check_captures(scope, rule)?;
                e.check_captures(scope, rule)
            }
        }
    }
}

impl Template<KindSet> {
    /// Instantiates this template into `a`.
    pub fn build(&self, a: &mut Automaton, b: &Bindings, rule: &str) -> Result<NodeIndex, InternalError> {
        match self {
            Template::Capture(name) => match lookup(b, name, rule)? {
                Bound::Node(node) => Ok(*node),
                other => Err(InternalError::GuardType {
                    rule: rule.to_string(),
                    detail: format!("capture `{name}` is {other:?}, not a node"),
                }),
            },
            Template::Term { kind, fields } => {
                let kind = kind.head().ok_or_else(|| InternalError::GuardType {
                    rule: rule.to_string(),
                    detail: "constructed term has no single kind".to_string(),
                })?;
                if fields.is_empty() {
                    return Ok(a.add(State::leaf(kind)));
                }
                let mut built = Vec::with_capacity(fields.len());
                for t in fields {
                    built.push(t.build(a, b, rule)?);
                }
                let contents = a.add(State::list(built));
                Ok(a.add(State::term(kind, Some(contents))))
            }
            Template::Set(items) => {
                let children = build_items(items, a, b, rule)?;
                Ok(a.add(State::Collection {
                    kind: CollectionKind::Set,
                    children,
                }))
            }
            Template::List(items) => {
                let children = build_items(items, a, b, rule)?;
                Ok(a.add(State::list(children)))
            }
            Template::At(cap, index) => {
                let i = index.eval_int(a, b, rule)?;
                let ms = members(a, lookup(b, cap, rule)?, rule)?;
                usize::try_from(i)
                    .ok()
                    .and_then(|i| ms.get(i).copied())
                    .ok_or_else(|| InternalError::GuardType {
                        rule: rule.to_string(),
                        detail: format!("index {i} out of range for `{cap}` of {} members", ms.len()),
                    })
            }
            Template::Cond(g, t, e) => {
                if g.eval(a, b, rule)? {
                    t.build(a, b, rule)
                } else {
                    e.build(a, b, rule)
                }
            }
        }
    }
}

fn build_items(
    items: &[Item<KindSet>],
    a: &mut Automaton,
    b: &Bindings,
    rule: &str,
) -> Result<Vec<NodeIndex>, InternalError> {
    let mut out = Vec::new();
    for item in items {
        match item {
            Item::One(t) => out.push(t.build(a, b, rule)?),
            Item::Splice(cap) => out.extend_from_slice(members(a, lookup(b, cap, rule)?, rule)?),
            Item::Each { var, source, body } => {
                let values: Vec<Bound> = match source {
                    Source::Elements(cap) => members(a, lookup(b, cap, rule)?, rule)?
                        .iter()
                        .map(|n| Bound::Node(*n))
                        .collect(),
                    Source::Range(lo, hi) => {
                        let (lo, hi) = (lo.eval_int(a, b, rule)?, hi.eval_int(a, b, rule)?);
                        (lo..hi).map(Bound::Int).collect()
                    }
                };
                for value in values {
                    let mut scoped = b.clone();
                    scoped.insert(var.clone(), value);
                    out.push(body.build(a, &scoped, rule)?);
                }
            }
        }
    }
    Ok(out)
}
