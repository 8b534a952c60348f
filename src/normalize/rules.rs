//! The standard rule set of the type algebra.
//!
//! Ranks are grouped so that size-decreasing rules run before anything that
//! can grow the graph:
//!
//! | ranks   | rules                                              |
//! |---------|----------------------------------------------------|
//! | 0..=1   | constant negation, double negation                 |
//! | 2..=6   | And/Or units, absorption, flattening               |
//! | 7..=8   | degenerate Tuple and Array                         |
//! | 10      | De Morgan                                          |
//! | 20..=31 | pairwise intersection of leaves and shapes         |
//! | 100     | distribution of And over Or                        |
//!
//! `Or{Array(t), Array(t)}` needs no rule: equal members of a Set are merged
//! when the automaton is canonicalized.

use crate::rewrite::{Cmp, Expr, Guard, Item, Pattern, RuleDecl, RuleRegistry, Source, Template};
use crate::schema::{type_schema, GROUP_ATOM, GROUP_LEAF, GROUP_SHAPE};
use std::sync::{Arc, OnceLock};

fn not(p: Pattern<String>) -> Pattern<String> {
    Pattern::term("Not", [p])
}

/// `Kind{elems.., ..rest}` over a Set of operands.
fn connective<const N: usize>(kind: &str, elems: [Pattern<String>; N], rest: Option<&str>) -> Pattern<String> {
    Pattern::term(kind, [Pattern::set(elems, rest)])
}

fn and<const N: usize>(elems: [Pattern<String>; N], rest: &str) -> Pattern<String> {
    connective("And", elems, Some(rest))
}

fn build_and(items: Vec<Item<String>>) -> Template<String> {
    Template::term("And", [Template::set(items)])
}

fn build_or(items: Vec<Item<String>>) -> Template<String> {
    Template::term("Or", [Template::set(items)])
}

fn build_not(t: Template<String>) -> Template<String> {
    Template::term("Not", [t])
}

/// `And{keep, ..ts}`
fn keep(capture: &str) -> Template<String> {
    build_and(vec![Item::one(Template::capture(capture)), Item::splice("ts")])
}

fn negation_rules() -> Vec<RuleDecl> {
    vec![
        RuleDecl::new(0, "not-any", not(Pattern::leaf("Any"))).rewrite_to(Template::leaf("Void")),
        RuleDecl::new(0, "not-void", not(Pattern::leaf("Void"))).rewrite_to(Template::leaf("Any")),
        RuleDecl::new(1, "not-not", not(not(Pattern::wild().bind("x")))).rewrite_to(Template::capture("x")),
        RuleDecl::new(10, "not-or", not(Pattern::term("Or", [Pattern::wild().bind("xs")]))).rewrite_to(
            build_and(vec![Item::each(
                "x",
                Source::elements("xs"),
                build_not(Template::capture("x")),
            )]),
        ),
        RuleDecl::new(10, "not-and", not(Pattern::term("And", [Pattern::wild().bind("xs")]))).rewrite_to(
            build_or(vec![Item::each(
                "x",
                Source::elements("xs"),
                build_not(Template::capture("x")),
            )]),
        ),
    ]
}

fn connective_rules() -> Vec<RuleDecl> {
    let mut rules = Vec::new();
    for (kind, unit, zero) in [("And", "Any", "Void"), ("Or", "Void", "Any")] {
        let lower = kind.to_lowercase();
        let name = |suffix: &str| format!("{lower}-{suffix}");
        rules.push(
            RuleDecl::new(2, &name("empty"), connective(kind, [], None)).rewrite_to(Template::leaf("Void")),
        );
        rules.push(
            RuleDecl::new(3, &name("single"), connective(kind, [Pattern::wild().bind("x")], None))
                .rewrite_to(Template::capture("x")),
        );
        rules.push(
            RuleDecl::new(
                4,
                &name(&zero.to_lowercase()),
                connective(kind, [Pattern::leaf(zero)], Some("xs")),
            )
            .rewrite_to(Template::leaf(zero)),
        );
        rules.push(
            RuleDecl::new(
                5,
                &name(&unit.to_lowercase()),
                connective(kind, [Pattern::leaf(unit)], Some("xs")),
            )
            .when(
                Guard::compare(Expr::size("xs"), Cmp::Gt, Expr::Int(0)),
                Template::term(kind, [Template::set(vec![Item::splice("xs")])]),
            ),
        );
        rules.push(
            RuleDecl::new(
                6,
                &name("flatten"),
                connective(kind, [Pattern::term(kind, [Pattern::wild().bind("inner")])], Some("xs")),
            )
            .rewrite_to(Template::term(
                kind,
                [Template::set(vec![Item::splice("inner"), Item::splice("xs")])],
            )),
        );
    }
    rules.push(
        RuleDecl::new(
            100,
            "and-or-distribute",
            and([Pattern::term("Or", [Pattern::wild().bind("xs")])], "ys"),
        )
        .rewrite_to(build_or(vec![Item::each(
            "x",
            Source::elements("xs"),
            build_and(vec![Item::one(Template::capture("x")), Item::splice("ys")]),
        )])),
    );
    rules
}

fn shape_rules() -> Vec<RuleDecl> {
    let tuple = |xs: &str| Pattern::term("Tuple", [Pattern::wild().bind(xs)]);
    let array = |x: &str| Pattern::term("Array", [Pattern::wild().bind(x)]);
    let n = || Expr::size("xs");

    // Tuple[xs..] minus Tuple[ys..] is the union over i of the tuple whose
    // i-th component is xs[i] minus ys[i]. A single tuple of componentwise
    // differences would drop members that agree with ys in some component:
    // Tuple[Int, Int] minus Tuple[Int, Bool] still holds every pair of Ints.
    let tuple_difference = build_and(vec![
        Item::one(build_or(vec![Item::each(
            "i",
            Source::range(Expr::Int(0), n()),
            Template::term(
                "Tuple",
                [Template::list(vec![Item::each(
                    "j",
                    Source::range(Expr::Int(0), n()),
                    Template::cond(
                        Guard::equals(Expr::capture("i"), Expr::capture("j")),
                        build_and(vec![
                            Item::one(Template::at("xs", Expr::capture("j"))),
                            Item::one(build_not(Template::at("ys", Expr::capture("j")))),
                        ]),
                        Template::at("xs", Expr::capture("j")),
                    ),
                )])],
            ),
        )])),
        Item::splice("ts"),
    ]);

    vec![
        RuleDecl::new(7, "tuple-empty", Pattern::term("Tuple", [Pattern::list([], None)]))
            .rewrite_to(Template::leaf("Void")),
        RuleDecl::new(7, "tuple-void", Pattern::term("Tuple", [Pattern::exists(Pattern::leaf("Void"))]))
            .rewrite_to(Template::leaf("Void")),
        RuleDecl::new(
            8,
            "tuple-single",
            Pattern::term("Tuple", [Pattern::list([Pattern::wild().bind("x")], None)]),
        )
        .rewrite_to(Template::capture("x")),
        RuleDecl::new(8, "array-void", Pattern::term("Array", [Pattern::leaf("Void")]))
            .rewrite_to(Template::leaf("Void")),
        RuleDecl::new(22, "tuple-tuple", and([tuple("xs"), tuple("ys")], "ts"))
            .when(
                Guard::equals(n(), Expr::size("ys")),
                build_and(vec![
                    Item::one(Template::term(
                        "Tuple",
                        [Template::list(vec![Item::each(
                            "i",
                            Source::range(Expr::Int(0), n()),
                            build_and(vec![
                                Item::one(Template::at("xs", Expr::capture("i"))),
                                Item::one(Template::at("ys", Expr::capture("i"))),
                            ]),
                        )])],
                    )),
                    Item::splice("ts"),
                ]),
            )
            .rewrite_to(Template::leaf("Void")),
        RuleDecl::new(23, "tuple-not-tuple", and([tuple("xs").bind("t"), not(tuple("ys"))], "ts"))
            .when(Guard::equals(n(), Expr::Int(0)), Template::leaf("Void"))
            .when(Guard::differs(n(), Expr::size("ys")), keep("t"))
            .rewrite_to(tuple_difference),
        RuleDecl::new(
            24,
            "tuple-not-array",
            and([Pattern::kind("Tuple").bind("t"), not(Pattern::kind("Array"))], "ts"),
        )
        .rewrite_to(keep("t")),
        RuleDecl::new(
            25,
            "array-not-tuple",
            and([Pattern::kind("Array").bind("r"), not(Pattern::kind("Tuple"))], "ts"),
        )
        .rewrite_to(keep("r")),
        RuleDecl::new(
            26,
            "tuple-array",
            and([Pattern::kind("Tuple"), Pattern::kind("Array")], "ts"),
        )
        .rewrite_to(Template::leaf("Void")),
        RuleDecl::new(27, "array-array", and([array("a"), array("b")], "ts")).rewrite_to(build_and(vec![
            Item::one(Template::term(
                "Array",
                [build_and(vec![
                    Item::one(Template::capture("a")),
                    Item::one(Template::capture("b")),
                ])],
            )),
            Item::splice("ts"),
        ])),
        RuleDecl::new(28, "array-not-array", and([array("a"), not(array("b"))], "ts")).rewrite_to(build_and(
            vec![
                Item::one(Template::term(
                    "Array",
                    [build_and(vec![
                        Item::one(Template::capture("a")),
                        Item::one(build_not(Template::capture("b"))),
                    ])],
                )),
                Item::splice("ts"),
            ],
        )),
    ]
}

fn leaf_rules() -> Vec<RuleDecl> {
    vec![
        RuleDecl::new(
            20,
            "and-leaf-leaf",
            and(
                [Pattern::kind(GROUP_LEAF).bind("a"), Pattern::kind(GROUP_LEAF).bind("b")],
                "ts",
            ),
        )
        .when(
            Guard::differs(Expr::capture("a"), Expr::capture("b")),
            Template::leaf("Void"),
        ),
        RuleDecl::new(
            21,
            "and-leaf-not-atom",
            and(
                [Pattern::kind(GROUP_LEAF).bind("a"), not(Pattern::kind(GROUP_ATOM).bind("b"))],
                "ts",
            ),
        )
        .when(
            Guard::equals(Expr::capture("a"), Expr::capture("b")),
            Template::leaf("Void"),
        )
        .when(Guard::is("b", "Any").negate(), keep("a")),
        RuleDecl::new(
            29,
            "shape-leaf",
            and([Pattern::kind(GROUP_SHAPE), Pattern::kind(GROUP_LEAF)], "ts"),
        )
        .rewrite_to(Template::leaf("Void")),
        RuleDecl::new(
            30,
            "shape-not-leaf",
            and([Pattern::kind(GROUP_SHAPE).bind("s"), not(Pattern::kind(GROUP_LEAF))], "ts"),
        )
        .rewrite_to(keep("s")),
        RuleDecl::new(
            31,
            "leaf-not-shape",
            and([Pattern::kind(GROUP_LEAF).bind("l"), not(Pattern::kind(GROUP_SHAPE))], "ts"),
        )
        .rewrite_to(keep("l")),
    ]
}

/// Declarations of the standard rule set.
pub fn standard_rules() -> Vec<RuleDecl> {
    let mut rules = negation_rules();
    rules.extend(connective_rules());
    rules.extend(shape_rules());
    rules.extend(leaf_rules());
    rules
}

/// The standard rule set resolved against the type schema, built once.
pub fn standard_registry() -> Arc<RuleRegistry> {
    static REGISTRY: OnceLock<Arc<RuleRegistry>> = OnceLock::new();
    REGISTRY
        .get_or_init(|| match RuleRegistry::new(type_schema(), standard_rules()) {
            Ok(registry) => Arc::new(registry),
            Err(err) => unreachable!("standard rules are fixed and valid: {err}"),
        })
        .clone()
}
