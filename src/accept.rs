//! Value acceptance: does a concrete value inhabit a type?
//!
//! The type is walked together with the value. Nominal types are unwrapped
//! one level at a time, and a (type node, value) pair met again on the
//! current path is rejected, so recursive types over cyclic values terminate
//! with the least fixed point.
//!
//! Tuples are read the way the normalizer reads them: a value term named
//! `Tuple` stands for its field list, a one-field tuple is its field, and the
//! empty tuple type accepts nothing. Term contents are matched as a field
//! list too, so a contents type may be any combination of tuples.
//!
//! Value terms are named through the caller's schema; a value kind the schema
//! does not know is an internal error, as is a type variable left unresolved.

use crate::arena::NodeIndex;
use crate::automaton::{Automaton, CollectionKind, State};
use crate::error::InternalError;
use crate::schema::{KindId, Schema};
use crate::types::{Type, TypeNode};
use std::collections::HashSet;
use tracing::trace;

/// Decides whether the value rooted at `root` of `value` is accepted by `ty`.
pub fn accepts(ty: &Type, value: &Automaton, root: NodeIndex, schema: &Schema) -> Result<bool, InternalError> {
    let mut acceptor = Acceptor {
        ty,
        value,
        schema,
        tuple: schema.kind("Tuple"),
        path: HashSet::new(),
    };
    let accepted = acceptor.accepts(ty.root(), Subject::Node(root))?;
    trace!(ty = %ty, value = %root, accepted, "acceptance");
    Ok(accepted)
}

/// What a type node is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Subject<'a> {
    Node(NodeIndex),
    /// Fields of a tuple value or of term contents.
    Fields(&'a [NodeIndex]),
}

struct Acceptor<'a> {
    ty: &'a Type,
    value: &'a Automaton,
    schema: &'a Schema,
    /// Value kind read as a field list.
    tuple: Option<KindId>,
    path: HashSet<(NodeIndex, Subject<'a>)>,
}

impl<'a> Acceptor<'a> {
    fn accepts(&mut self, t: NodeIndex, subject: Subject<'a>) -> Result<bool, InternalError> {
        let subject = self.resolve(subject)?;
        if !self.path.insert((t, subject)) {
            return Ok(false);
        }
        let result = self.accepts_subject(t, subject);
        self.path.remove(&(t, subject));
        result
    }

    /// Unwraps tuple values until the subject is a non-tuple node or a field
    /// list of any length but one.
    fn resolve(&self, mut subject: Subject<'a>) -> Result<Subject<'a>, InternalError> {
        let value: &'a Automaton = self.value;
        // A cycle of one-field tuples has no fields to reach.
        for _ in 0..=value.len() {
            subject = match subject {
                Subject::Fields([field]) => Subject::Node(*field),
                Subject::Fields(_) => return Ok(subject),
                Subject::Node(v) => match value.try_get(v)? {
                    State::Term { kind, .. } if Some(*kind) == self.tuple => {
                        Subject::Fields(value.term_fields(v)?.1.unwrap_or(&[]))
                    }
                    _ => return Ok(subject),
                },
            };
        }
        Ok(Subject::Fields(&[]))
    }

    fn accepts_subject(&mut self, t: NodeIndex, subject: Subject<'a>) -> Result<bool, InternalError> {
        let (ty, automaton): (&'a Type, &'a Automaton) = (self.ty, self.value);
        let node = match subject {
            Subject::Node(v) => Some((v, automaton.try_get(v)?)),
            Subject::Fields(_) => None,
        };
        match ty.view(t)? {
            TypeNode::Void => Ok(false),
            TypeNode::Any => Ok(true),
            TypeNode::Bool => Ok(matches!(node, Some((_, State::Bool(_))))),
            TypeNode::Int => Ok(matches!(node, Some((_, State::Int(_))))),
            TypeNode::Real => Ok(matches!(node, Some((_, State::Real(_))))),
            TypeNode::String => Ok(matches!(node, Some((_, State::Str(_))))),
            TypeNode::Null => match node {
                Some((v, _)) => Ok(self.term_named(v, "Null")?.is_some_and(|fields| fields.is_none())),
                None => Ok(false),
            },
            TypeNode::Var(name) => Err(InternalError::UnresolvedVariable {
                name: name.to_string(),
            }),
            TypeNode::Nominal { body, .. } => self.accepts(body, subject),
            TypeNode::Not(inner) => Ok(!self.accepts(inner, subject)?),
            TypeNode::And(ts) => {
                if ts.is_empty() {
                    return Ok(false);
                }
                for &t in ts {
                    if !self.accepts(t, subject)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            TypeNode::Or(ts) => {
                for &t in ts {
                    if self.accepts(t, subject)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            TypeNode::Tuple(ts) => match (ts, subject) {
                ([single], _) => self.accepts(*single, subject),
                ([], _) | (_, Subject::Node(_)) => Ok(false),
                (ts, Subject::Fields(fields)) => self.accepts_all(ts, fields),
            },
            TypeNode::Array(element) => match node.and_then(|(_, state)| state.as_list()) {
                Some(items) => {
                    for &item in items {
                        if !self.accepts(element, Subject::Node(item))? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                None => Ok(false),
            },
            TypeNode::Term { name, contents } => {
                let Some((v, _)) = node else {
                    return Ok(false);
                };
                let Some(fields) = self.term_named(v, name)? else {
                    return Ok(false);
                };
                match (contents, fields) {
                    (None, None) => Ok(true),
                    (None, Some(_)) | (Some(_), None) => Ok(false),
                    (Some(t), Some(fields)) => self.accepts(t, Subject::Fields(fields)),
                }
            }
            TypeNode::Collection {
                kind,
                unbounded,
                elements,
            } => match node.and_then(|(_, state)| state.as_collection(kind)) {
                Some(items) => match kind {
                    CollectionKind::List => self.accepts_list(elements, unbounded, items),
                    CollectionKind::Set | CollectionKind::Bag => {
                        let mut used = vec![false; items.len()];
                        self.assign(elements, unbounded, items, &mut used)
                    }
                },
                None => Ok(false),
            },
        }
    }

    /// Fields of `v` when it is a term named `name`: `Some(None)` for VOID contents.
    fn term_named(&self, v: NodeIndex, name: &str) -> Result<Option<Option<&'a [NodeIndex]>>, InternalError> {
        let value: &'a Automaton = self.value;
        let State::Term { kind, .. } = value.try_get(v)? else {
            return Ok(None);
        };
        let registered = self
            .schema
            .name(*kind)
            .ok_or(InternalError::UnknownKind { kind: *kind })?;
        if registered != name {
            return Ok(None);
        }
        Ok(Some(value.term_fields(v)?.1))
    }

    fn accepts_all(&mut self, ts: &[NodeIndex], vs: &[NodeIndex]) -> Result<bool, InternalError> {
        if ts.len() != vs.len() {
            return Ok(false);
        }
        for (&t, &v) in ts.iter().zip(vs) {
            if !self.accepts(t, Subject::Node(v))? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn accepts_list(
        &mut self,
        elements: &[NodeIndex],
        unbounded: Option<NodeIndex>,
        items: &[NodeIndex],
    ) -> Result<bool, InternalError> {
        if items.len() < elements.len() {
            return Ok(false);
        }
        let (prefix, suffix) = items.split_at(elements.len());
        if !self.accepts_all(elements, prefix)? {
            return Ok(false);
        }
        self.accepts_remainder(unbounded, suffix.iter().copied())
    }

    fn accepts_remainder(
        &mut self,
        unbounded: Option<NodeIndex>,
        rest: impl IntoIterator<Item = NodeIndex>,
    ) -> Result<bool, InternalError> {
        for item in rest {
            match unbounded {
                Some(t) if self.accepts(t, Subject::Node(item))? => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Backtracking assignment of element types to distinct members.
    fn assign(
        &mut self,
        elements: &[NodeIndex],
        unbounded: Option<NodeIndex>,
        items: &[NodeIndex],
        used: &mut [bool],
    ) -> Result<bool, InternalError> {
        let Some((&first, others)) = elements.split_first() else {
            let rest: Vec<NodeIndex> = items
                .iter()
                .zip(used.iter())
                .filter(|(_, u)| !**u)
                .map(|(i, _)| *i)
                .collect();
            return self.accepts_remainder(unbounded, rest);
        };
        for i in 0..items.len() {
            if used[i] || !self.accepts(first, Subject::Node(items[i]))? {
                continue;
            }
            used[i] = true;
            let found = self.assign(others, unbounded, items, used)?;
            used[i] = false;
            if found {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Normalizer;
    use crate::schema::{Arity, SchemaBuilder};
    use crate::types::TypeExpr;

    fn schema() -> Schema {
        SchemaBuilder::new()
            .term("Null", Arity::Leaf)
            .term("Origin", Arity::Leaf)
            .term("Tuple", Arity::Between(0, 16))
            .term("Point", Arity::Exactly(2))
            .term("Cons", Arity::Exactly(2))
            .build()
            .unwrap()
    }

    struct Values {
        a: Automaton,
        schema: Schema,
    }

    impl Values {
        fn new() -> Self {
            Self {
                a: Automaton::new(),
                schema: schema(),
            }
        }

        fn term(&mut self, name: &str, fields: Vec<NodeIndex>) -> NodeIndex {
            let kind = self.schema.kind(name).unwrap();
            if fields.is_empty() {
                return self.a.add(State::leaf(kind));
            }
            let list = self.a.add(State::list(fields));
            self.a.add(State::term(kind, Some(list)))
        }

        fn int(&mut self, i: i64) -> NodeIndex {
            self.a.add(State::Int(i))
        }

        fn bool(&mut self, b: bool) -> NodeIndex {
            self.a.add(State::Bool(b))
        }

        fn check(&self, ty: &TypeExpr, v: NodeIndex) -> bool {
            accepts(&ty.lower().unwrap(), &self.a, v, &self.schema).unwrap()
        }
    }

    #[test]
    fn atoms_match_exactly() {
        let mut vs = Values::new();
        let three = vs.int(3);
        let yes = vs.bool(true);
        let text = vs.a.add(State::string("x"));
        let real = vs.a.add(State::real(1.5));
        assert!(vs.check(&TypeExpr::Int, three));
        assert!(!vs.check(&TypeExpr::Bool, three));
        assert!(!vs.check(&TypeExpr::Real, three));
        assert!(vs.check(&TypeExpr::Real, real));
        assert!(vs.check(&TypeExpr::String, text));
        assert!(vs.check(&TypeExpr::or([TypeExpr::Bool, TypeExpr::Int]), yes));
        assert!(vs.check(&TypeExpr::Any, text));
        assert!(!vs.check(&TypeExpr::Void, text));
    }

    #[test]
    fn connectives() {
        let mut vs = Values::new();
        let three = vs.int(3);
        let yes = vs.bool(true);
        let not_int = TypeExpr::not(TypeExpr::Int);
        assert!(vs.check(&not_int, yes));
        assert!(!vs.check(&not_int, three));
        let both = TypeExpr::and([TypeExpr::Int, TypeExpr::not(TypeExpr::Bool)]);
        assert!(vs.check(&both, three));
        assert!(!vs.check(&both, yes));
    }

    #[test]
    fn nominal_is_transparent() {
        let mut vs = Values::new();
        let three = vs.int(3);
        let yes = vs.bool(true);
        let named = TypeExpr::nominal("Count", TypeExpr::Int);
        assert_eq!(vs.check(&named, three), vs.check(&TypeExpr::Int, three));
        assert_eq!(vs.check(&named, yes), vs.check(&TypeExpr::Int, yes));
    }

    #[test]
    fn null_tuples_and_terms() {
        let mut vs = Values::new();
        let null = vs.term("Null", vec![]);
        let (one, two, yes) = (vs.int(1), vs.int(2), vs.bool(true));
        let pair = vs.term("Tuple", vec![one, yes]);
        let flipped = vs.term("Tuple", vec![yes, one]);
        let point = vs.term("Point", vec![one, two]);
        let bad_point = vs.term("Point", vec![one, yes]);
        let origin = vs.term("Origin", vec![]);

        assert!(vs.check(&TypeExpr::Null, null));
        assert!(!vs.check(&TypeExpr::Null, one));

        let tuple = TypeExpr::tuple([TypeExpr::Int, TypeExpr::Bool]);
        assert!(vs.check(&tuple, pair));
        assert!(!vs.check(&tuple, flipped));
        assert!(!vs.check(&tuple, point));

        let point_ty = TypeExpr::term("Point", Some(TypeExpr::tuple([TypeExpr::Int, TypeExpr::Int])));
        assert!(vs.check(&point_ty, point));
        assert!(!vs.check(&point_ty, bad_point));
        assert!(!vs.check(&point_ty, origin));

        let origin_ty = TypeExpr::term("Origin", None);
        assert!(vs.check(&origin_ty, origin));
        assert!(!vs.check(&origin_ty, point));
    }

    #[test]
    fn term_contents_through_connectives_and_names() {
        let mut vs = Values::new();
        let (one, two, yes) = (vs.int(1), vs.int(2), vs.bool(true));
        let point = vs.term("Point", vec![one, two]);
        let mixed = vs.term("Point", vec![one, yes]);
        let ints = TypeExpr::tuple([TypeExpr::Int, TypeExpr::Int]);
        let bools = TypeExpr::tuple([TypeExpr::Bool, TypeExpr::Bool]);

        let union = TypeExpr::term("Point", Some(TypeExpr::or([ints.clone(), bools])));
        assert!(vs.check(&union, point));
        assert!(!vs.check(&union, mixed));
        let normalized = Normalizer::standard().normalize(&union.lower().unwrap()).unwrap();
        assert!(accepts(&normalized, &vs.a, point, &vs.schema).unwrap());

        let named = TypeExpr::term("Point", Some(TypeExpr::nominal("Pair", ints.clone())));
        assert!(vs.check(&named, point));
        assert!(!vs.check(&named, mixed));

        let negated = TypeExpr::term("Point", Some(TypeExpr::not(ints)));
        assert!(!vs.check(&negated, point));
        assert!(vs.check(&negated, mixed));
    }

    #[test]
    fn tuples_agree_with_their_normal_form() {
        let mut vs = Values::new();
        let one = vs.int(1);
        let boxed = vs.term("Tuple", vec![one]);
        let empty = vs.term("Tuple", vec![]);
        let single = TypeExpr::tuple([TypeExpr::Int]);
        for v in [one, boxed] {
            assert!(vs.check(&single, v));
            assert!(vs.check(&TypeExpr::Int, v));
        }
        assert!(!vs.check(&TypeExpr::tuple(Vec::new()), empty));
        assert!(!vs.check(&TypeExpr::tuple(Vec::new()), one));
        assert!(vs.check(&TypeExpr::Any, empty));
        assert!(!vs.check(&TypeExpr::and(Vec::new()), one));

        // Tuple(<self>) has no field to reach.
        let tuple = vs.schema.kind("Tuple").unwrap();
        let cell = vs.a.reserve();
        let fields = vs.a.add(State::list(vec![cell]));
        vs.a.set(cell, State::term(tuple, Some(fields)));
        assert!(!vs.check(&TypeExpr::Int, cell));
        assert!(vs.check(&TypeExpr::Any, cell));
    }

    #[test]
    fn arrays_and_lists() {
        let mut vs = Values::new();
        let (one, two, yes) = (vs.int(1), vs.int(2), vs.bool(true));
        let text = vs.a.add(State::string("s"));
        let ints = vs.a.add(State::list(vec![one, two]));
        let mixed = vs.a.add(State::list(vec![one, yes]));
        let empty = vs.a.add(State::list(vec![]));
        let long = vs.a.add(State::list(vec![one, yes, text, text]));
        let short = vs.a.add(State::list(vec![one]));

        let array = TypeExpr::array(TypeExpr::Int);
        assert!(vs.check(&array, ints));
        assert!(vs.check(&array, empty));
        assert!(!vs.check(&array, mixed));
        assert!(!vs.check(&array, one));

        let open = TypeExpr::list_of(vec![TypeExpr::Int, TypeExpr::Bool], Some(TypeExpr::String));
        assert!(vs.check(&open, mixed));
        assert!(vs.check(&open, long));
        assert!(!vs.check(&open, short));
        let closed = TypeExpr::list_of(vec![TypeExpr::Int, TypeExpr::Bool], None);
        assert!(vs.check(&closed, mixed));
        assert!(!vs.check(&closed, long));
    }

    #[test]
    fn sets_and_bags() {
        let mut vs = Values::new();
        let (three, four) = (vs.int(3), vs.int(4));
        let (yes, no) = (vs.bool(true), vs.bool(false));
        let set = vs.a.add(State::set(vec![three, yes, no]));
        let two_ints = vs.a.add(State::set(vec![three, four]));
        let bag = vs.a.add(State::bag(vec![three, three]));
        let list = vs.a.add(State::list(vec![three, three]));

        let set_ty = TypeExpr::set_of(vec![TypeExpr::Int], Some(TypeExpr::Bool));
        assert!(vs.check(&set_ty, set));
        assert!(!vs.check(&TypeExpr::set_of(vec![TypeExpr::Int], None), two_ints));
        assert!(vs.check(&TypeExpr::set_of(vec![TypeExpr::Int], Some(TypeExpr::Int)), two_ints));

        let bag_ty = TypeExpr::bag_of(vec![TypeExpr::Int, TypeExpr::Int], None);
        assert!(vs.check(&bag_ty, bag));
        assert!(!vs.check(&bag_ty, list));
        assert!(!vs.check(&TypeExpr::bag_of(vec![TypeExpr::Int], None), bag));
    }

    #[test]
    fn recursive_types_and_cyclic_values() {
        let int_list = TypeExpr::nominal(
            "IntList",
            TypeExpr::or([
                TypeExpr::Null,
                TypeExpr::term(
                    "Cons",
                    Some(TypeExpr::tuple([TypeExpr::Int, TypeExpr::reference("IntList")])),
                ),
            ]),
        );
        let mut vs = Values::new();
        let null = vs.term("Null", vec![]);
        let (one, two, yes) = (vs.int(1), vs.int(2), vs.bool(true));
        let tail = vs.term("Cons", vec![two, null]);
        let list = vs.term("Cons", vec![one, tail]);
        let bad_tail = vs.term("Cons", vec![yes, null]);
        let bad = vs.term("Cons", vec![one, bad_tail]);
        assert!(vs.check(&int_list, list));
        assert!(!vs.check(&int_list, bad));

        // Cons(1, <self>) never reaches Null.
        let cons = vs.schema.kind("Cons").unwrap();
        let cell = vs.a.reserve();
        let fields = vs.a.add(State::list(vec![one, cell]));
        vs.a.set(cell, State::term(cons, Some(fields)));
        assert!(!vs.check(&int_list, cell));
    }

    #[test]
    fn unresolved_cases_are_internal_errors() {
        let mut vs = Values::new();
        let three = vs.int(3);
        let err = accepts(&TypeExpr::var("T").lower().unwrap(), &vs.a, three, &vs.schema).unwrap_err();
        assert_eq!(err, InternalError::UnresolvedVariable { name: "T".into() });

        let stray = vs.a.add(State::leaf(crate::schema::KindId::new(99)));
        let err = accepts(&TypeExpr::Null.lower().unwrap(), &vs.a, stray, &vs.schema).unwrap_err();
        assert!(matches!(err, InternalError::UnknownKind { .. }));
    }
}
