use proptest::prelude::*;

use super::*;
use crate::accept::accepts;
use crate::arena::NodeIndex;
use crate::automaton::{Automaton, State};
use crate::error::InternalError;
use crate::schema::{Arity, Schema, SchemaBuilder};
use crate::types::{TypeExpr, TypeNode};

fn lower(e: TypeExpr) -> Type {
    e.lower().unwrap()
}

fn norm(e: TypeExpr) -> Type {
    Normalizer::standard().normalize(&lower(e)).unwrap()
}

fn or2(a: TypeExpr, b: TypeExpr) -> TypeExpr {
    TypeExpr::or([a, b])
}

fn and2(a: TypeExpr, b: TypeExpr) -> TypeExpr {
    TypeExpr::and([a, b])
}

#[test]
fn test_double_negation() {
    assert_eq!(norm(TypeExpr::not(TypeExpr::not(TypeExpr::Int))), lower(TypeExpr::Int));
    assert!(norm(TypeExpr::not(TypeExpr::Any)).is_void());
    assert!(norm(TypeExpr::not(TypeExpr::Void)).is_any());
}

#[test]
fn test_de_morgan() {
    let lhs = norm(TypeExpr::not(and2(TypeExpr::Int, TypeExpr::Bool)));
    let rhs = norm(or2(TypeExpr::not(TypeExpr::Int), TypeExpr::not(TypeExpr::Bool)));
    assert_eq!(lhs, rhs);
    assert_eq!(lhs.to_string(), "Or{Not(Bool), Not(Int)}");

    let lhs = norm(TypeExpr::not(or2(TypeExpr::Int, TypeExpr::Bool)));
    assert_eq!(lhs.to_string(), "And{Not(Bool), Not(Int)}");
}

#[test]
fn test_absorption_and_units() {
    let pair = TypeExpr::tuple([TypeExpr::Int, TypeExpr::Bool]);
    assert_eq!(norm(and2(TypeExpr::Any, pair.clone())), norm(pair));
    let array = TypeExpr::array(TypeExpr::Int);
    assert_eq!(norm(or2(TypeExpr::Void, array.clone())), norm(array));

    assert!(norm(and2(TypeExpr::Void, TypeExpr::Int)).is_void());
    assert!(norm(or2(TypeExpr::Any, TypeExpr::Int)).is_any());
    assert!(norm(TypeExpr::and(Vec::new())).is_void());
    assert!(norm(TypeExpr::or(Vec::new())).is_void());
    assert_eq!(norm(TypeExpr::and([TypeExpr::Real])), lower(TypeExpr::Real));
}

#[test]
fn test_flattening() {
    let nested = TypeExpr::or([
        TypeExpr::Int,
        or2(TypeExpr::Bool, or2(TypeExpr::Real, TypeExpr::String)),
    ]);
    assert_eq!(norm(nested).to_string(), "Or{Bool, Int, Real, String}");
}

#[test]
fn test_distribution() {
    // And{Or{Int, Bool}, Not(Int)} = Bool
    let t = and2(or2(TypeExpr::Int, TypeExpr::Bool), TypeExpr::not(TypeExpr::Int));
    assert_eq!(norm(t), lower(TypeExpr::Bool));
}

#[test]
fn test_leaf_intersections() {
    assert!(norm(and2(TypeExpr::Int, TypeExpr::Bool)).is_void());
    assert!(norm(and2(TypeExpr::Int, TypeExpr::not(TypeExpr::Int))).is_void());
    assert_eq!(norm(and2(TypeExpr::Int, TypeExpr::not(TypeExpr::Bool))), lower(TypeExpr::Int));
    assert_eq!(norm(and2(TypeExpr::Null, TypeExpr::not(TypeExpr::Real))), lower(TypeExpr::Null));
}

#[test]
fn test_tuple_rules() {
    assert!(norm(TypeExpr::tuple(Vec::new())).is_void());
    assert!(norm(TypeExpr::tuple([TypeExpr::Int, TypeExpr::Void])).is_void());
    assert_eq!(norm(TypeExpr::tuple([TypeExpr::Bool])), lower(TypeExpr::Bool));

    let t = and2(
        TypeExpr::tuple([TypeExpr::Int, TypeExpr::Bool]),
        TypeExpr::tuple([TypeExpr::Int, TypeExpr::Any]),
    );
    assert_eq!(norm(t).to_string(), "Tuple[Int, Bool]");

    let mismatch = and2(
        TypeExpr::tuple([TypeExpr::Int, TypeExpr::Int]),
        TypeExpr::tuple([TypeExpr::Int, TypeExpr::Int, TypeExpr::Int]),
    );
    assert!(norm(mismatch).is_void());

    let other_arity = and2(
        TypeExpr::tuple([TypeExpr::Int, TypeExpr::Int]),
        TypeExpr::not(TypeExpr::tuple([TypeExpr::Int, TypeExpr::Int, TypeExpr::Int])),
    );
    assert_eq!(norm(other_arity).to_string(), "Tuple[Int, Int]");
}

#[test]
fn test_tuple_array_disjointness() {
    let t = and2(
        TypeExpr::tuple([TypeExpr::Int, TypeExpr::Int]),
        TypeExpr::array(TypeExpr::Int),
    );
    assert!(norm(t).is_void());

    let kept = and2(
        TypeExpr::tuple([TypeExpr::Int, TypeExpr::Bool]),
        TypeExpr::not(TypeExpr::array(TypeExpr::Int)),
    );
    assert_eq!(norm(kept).to_string(), "Tuple[Int, Bool]");

    let kept = and2(
        TypeExpr::array(TypeExpr::Int),
        TypeExpr::not(TypeExpr::tuple([TypeExpr::Int, TypeExpr::Bool])),
    );
    assert_eq!(norm(kept).to_string(), "Array(Int)");
}

#[test]
fn test_array_rules() {
    assert!(norm(TypeExpr::array(TypeExpr::Void)).is_void());
    let both = and2(
        TypeExpr::array(TypeExpr::Int),
        TypeExpr::array(or2(TypeExpr::Int, TypeExpr::Bool)),
    );
    assert_eq!(norm(both).to_string(), "Array(Int)");
    assert!(norm(and2(TypeExpr::array(TypeExpr::Int), TypeExpr::Int)).is_void());
    assert_eq!(
        norm(and2(TypeExpr::array(TypeExpr::Int), TypeExpr::not(TypeExpr::Int))).to_string(),
        "Array(Int)"
    );
    assert_eq!(
        norm(and2(TypeExpr::Int, TypeExpr::not(TypeExpr::array(TypeExpr::Int)))),
        lower(TypeExpr::Int)
    );
    let same = or2(TypeExpr::array(TypeExpr::Int), TypeExpr::array(TypeExpr::Int));
    assert_eq!(norm(same).to_string(), "Array(Int)");
}

#[test]
fn test_subtyping() {
    let mut n = Normalizer::standard();
    let int = lower(TypeExpr::Int);
    let int_or_bool = lower(or2(TypeExpr::Int, TypeExpr::Bool));
    assert!(n.is_subtype(&int, &int_or_bool).unwrap());
    assert!(!n.is_subtype(&int_or_bool, &int).unwrap());

    let narrow = lower(TypeExpr::tuple([TypeExpr::Int, TypeExpr::Bool]));
    let wide = lower(TypeExpr::tuple([or2(TypeExpr::Int, TypeExpr::Real), TypeExpr::Bool]));
    assert!(n.is_subtype(&narrow, &wide).unwrap());
    assert!(!n.is_subtype(&wide, &narrow).unwrap());

    let ints = lower(TypeExpr::array(TypeExpr::Int));
    let mixed = lower(TypeExpr::array(or2(TypeExpr::Int, TypeExpr::Bool)));
    assert!(n.is_subtype(&ints, &mixed).unwrap());
    assert!(n.is_subtype(&int, &Type::any()).unwrap());
    assert!(n.is_subtype(&Type::void(), &int).unwrap());
}

#[test]
fn test_equivalence_and_intersection() {
    let mut n = Normalizer::standard();
    let a = lower(or2(TypeExpr::Int, TypeExpr::Bool));
    let b = lower(or2(TypeExpr::Bool, TypeExpr::Int));
    assert!(n.equivalent(&a, &b).unwrap());
    assert!(!n.equivalent(&a, &lower(TypeExpr::Int)).unwrap());
    assert!(n
        .equivalent(&lower(and2(TypeExpr::Int, TypeExpr::not(TypeExpr::Bool))), &lower(TypeExpr::Int))
        .unwrap());
    assert_eq!(n.intersect(&a, &lower(TypeExpr::Int)).unwrap(), lower(TypeExpr::Int));
}

#[test]
fn test_absorption_before_negation() {
    // Not(And{Any, Int}) must become Not(Int), never Void or Any.
    let t = lower(TypeExpr::not(and2(TypeExpr::Any, TypeExpr::Int)));
    assert_eq!(Normalizer::standard().normalize(&t).unwrap().to_string(), "Not(Int)");

    let three: Vec<_> = standard_rules()
        .into_iter()
        .filter(|r| ["not-any", "not-void", "and-any"].contains(&r.name.as_str()))
        .collect();
    assert_eq!(three.len(), 3);
    let registry = Arc::new(RuleRegistry::new(crate::schema::type_schema(), three).unwrap());
    let out = Normalizer::new(registry, EngineConfig::default()).normalize(&t).unwrap();
    assert!(!out.is_void() && !out.is_any());
    assert_eq!(out.to_string(), "Not(And{Int})");
}

#[test]
fn test_nominal_bodies_are_opaque() {
    let wrapped = lower(TypeExpr::nominal("N", TypeExpr::not(TypeExpr::not(TypeExpr::Int))));
    assert_eq!(Normalizer::standard().normalize(&wrapped).unwrap(), wrapped);

    let list = lower(TypeExpr::nominal(
        "IntList",
        or2(
            TypeExpr::Null,
            TypeExpr::tuple([TypeExpr::Int, TypeExpr::reference("IntList")]),
        ),
    ));
    assert_eq!(Normalizer::standard().normalize(&list).unwrap(), list);
}

#[test]
fn test_nominal_body_shared_with_a_redex() {
    let double = || TypeExpr::not(TypeExpr::not(TypeExpr::Int));
    let named = || TypeExpr::nominal("N", double());
    let mut n = Normalizer::standard();
    let out = n.normalize(&lower(TypeExpr::tuple([double(), named()]))).unwrap();
    assert_eq!(out, lower(TypeExpr::tuple([TypeExpr::Int, named()])));
    assert_eq!(n.normalize(&lower(named())).unwrap(), lower(named()));
}

#[test]
fn test_cache_reuses_results() {
    let mut n = Normalizer::standard();
    let t = lower(TypeExpr::not(TypeExpr::not(TypeExpr::Int)));
    let first = n.normalize(&t).unwrap();
    assert_eq!(n.cache().len(), 1);
    assert_eq!(n.normalize(&t).unwrap(), first);
    assert_eq!(n.cache().len(), 1);
}

#[test]
fn test_traces_follow_config() {
    let t = lower(TypeExpr::not(TypeExpr::not(TypeExpr::Int)));
    let plain = Normalizer::standard().normalize_traced(&t).unwrap();
    assert_eq!(plain.steps, 1);
    assert!(plain.trace.is_none());

    let config = EngineConfig {
        record_traces: true,
        ..EngineConfig::default()
    };
    let traced = Normalizer::new(standard_registry(), config).normalize_traced(&t).unwrap();
    let trace = traced.trace.unwrap();
    assert_eq!(trace.rules_fired(), vec!["not-not"]);
    assert_eq!(trace.final_fingerprint(), traced.ty.fingerprint().unwrap());
}

#[test]
fn test_budget_exhaustion() {
    let config = EngineConfig {
        rewrite_budget: 1,
        ..EngineConfig::default()
    };
    let mut n = Normalizer::new(standard_registry(), config);
    let t = lower(TypeExpr::not(TypeExpr::not(TypeExpr::not(TypeExpr::not(TypeExpr::Int)))));
    assert!(matches!(
        n.normalize(&t),
        Err(InternalError::BudgetExhausted { budget: 1, .. })
    ));
}

/// Fails on `Not(Not(_))` or an And/Or directly under one of the same kind.
fn assert_canonical(ty: &Type, node: NodeIndex) {
    match ty.view(node).unwrap() {
        TypeNode::Not(inner) => {
            assert!(!matches!(ty.view(inner).unwrap(), TypeNode::Not(_)), "double negation in {ty}");
            assert_canonical(ty, inner);
        }
        TypeNode::And(ts) => {
            for &t in ts {
                assert!(!matches!(ty.view(t).unwrap(), TypeNode::And(_)), "nested And in {ty}");
                assert_canonical(ty, t);
            }
        }
        TypeNode::Or(ts) => {
            for &t in ts {
                assert!(!matches!(ty.view(t).unwrap(), TypeNode::Or(_)), "nested Or in {ty}");
                assert_canonical(ty, t);
            }
        }
        TypeNode::Tuple(ts) => ts.iter().for_each(|&t| assert_canonical(ty, t)),
        TypeNode::Array(t) => assert_canonical(ty, t),
        _ => {}
    }
}

fn arb_leaf() -> impl Strategy<Value = TypeExpr> {
    prop_oneof![
        Just(TypeExpr::Void),
        Just(TypeExpr::Any),
        Just(TypeExpr::Null),
        Just(TypeExpr::Bool),
        Just(TypeExpr::Int),
        Just(TypeExpr::Real),
        Just(TypeExpr::String),
    ]
}

fn arb_type() -> impl Strategy<Value = TypeExpr> {
    arb_leaf().prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            inner.clone().prop_map(TypeExpr::not),
            prop::collection::vec(inner.clone(), 0..3).prop_map(TypeExpr::and),
            prop::collection::vec(inner.clone(), 0..3).prop_map(TypeExpr::or),
            prop::collection::vec(inner.clone(), 0..3).prop_map(TypeExpr::tuple),
            inner.prop_map(TypeExpr::array),
        ]
    })
}

/// Like [`arb_type`] without arrays: `And{Array(a), Not(Array(b))}` is
/// rewritten to `Array(And{a, Not(b)})`, which drops the empty array and
/// arrays with only some elements outside `b`.
fn arb_arrayless_type() -> impl Strategy<Value = TypeExpr> {
    arb_leaf().prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            inner.clone().prop_map(TypeExpr::not),
            prop::collection::vec(inner.clone(), 0..3).prop_map(TypeExpr::and),
            prop::collection::vec(inner.clone(), 0..3).prop_map(TypeExpr::or),
            prop::collection::vec(inner, 0..3).prop_map(TypeExpr::tuple),
        ]
    })
}

#[derive(Debug, Clone)]
enum Sample {
    Bool(bool),
    Int(i64),
    Real,
    Str,
    Null,
    Tuple(Vec<Sample>),
    List(Vec<Sample>),
}

fn arb_sample() -> impl Strategy<Value = Sample> {
    let leaf = prop_oneof![
        any::<bool>().prop_map(Sample::Bool),
        (-2i64..2).prop_map(Sample::Int),
        Just(Sample::Real),
        Just(Sample::Str),
        Just(Sample::Null),
    ];
    leaf.prop_recursive(2, 8, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Sample::Tuple),
            prop::collection::vec(inner, 0..3).prop_map(Sample::List),
        ]
    })
}

fn value_schema() -> Schema {
    SchemaBuilder::new()
        .term("Null", Arity::Leaf)
        .term("Tuple", Arity::Between(0, 16))
        .build()
        .unwrap()
}

fn build(a: &mut Automaton, schema: &Schema, sample: &Sample) -> NodeIndex {
    match sample {
        Sample::Bool(b) => a.add(State::Bool(*b)),
        Sample::Int(i) => a.add(State::Int(*i)),
        Sample::Real => a.add(State::real(0.5)),
        Sample::Str => a.add(State::string("s")),
        Sample::Null => a.add(State::leaf(schema.kind("Null").unwrap())),
        Sample::Tuple(fields) => {
            let tuple = schema.kind("Tuple").unwrap();
            if fields.is_empty() {
                return a.add(State::leaf(tuple));
            }
            let fields: Vec<_> = fields.iter().map(|f| build(a, schema, f)).collect();
            let list = a.add(State::list(fields));
            a.add(State::term(tuple, Some(list)))
        }
        Sample::List(items) => {
            let items: Vec<_> = items.iter().map(|i| build(a, schema, i)).collect();
            a.add(State::list(items))
        }
    }
}

fn uncached() -> Normalizer {
    let config = EngineConfig {
        cache_capacity: 0,
        ..EngineConfig::default()
    };
    Normalizer::new(standard_registry(), config)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_normalization_is_idempotent(e in arb_type()) {
        let mut n = uncached();
        let once = n.normalize(&lower(e)).unwrap();
        let twice = n.normalize(&once).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_results_are_canonical(e in arb_type()) {
        let out = uncached().normalize_traced(&lower(e)).unwrap();
        prop_assert!(out.steps <= crate::config::DEFAULT_REWRITE_BUDGET);
        assert_canonical(&out.ty, out.ty.root());
    }

    #[test]
    fn prop_intersection_commutes(a in arb_type(), b in arb_type()) {
        let mut n = uncached();
        let ab = n.normalize(&lower(and2(a.clone(), b.clone()))).unwrap();
        let ba = n.normalize(&lower(and2(b, a))).unwrap();
        prop_assert_eq!(ab, ba);
    }

    #[test]
    fn prop_normalization_preserves_acceptance(e in arb_arrayless_type(), sample in arb_sample()) {
        let schema = value_schema();
        let mut a = Automaton::new();
        let root = build(&mut a, &schema, &sample);
        let ty = lower(e);
        let normalized = uncached().normalize(&ty).unwrap();
        prop_assert_eq!(
            accepts(&ty, &a, root, &schema).unwrap(),
            accepts(&normalized, &a, root, &schema).unwrap(),
            "{} normalized to {}", ty, normalized
        );
    }

    #[test]
    fn prop_double_negation_cancels(e in arb_type()) {
        let mut n = uncached();
        let plain = n.normalize(&lower(e.clone())).unwrap();
        let doubled = n.normalize(&lower(TypeExpr::not(TypeExpr::not(e)))).unwrap();
        prop_assert_eq!(plain, doubled);
    }
}
