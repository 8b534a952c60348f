//! Declarative ranked rewriting over automata.
//!
//! Rules are declared with names ([`RuleDecl`]), resolved against a schema
//! into a [`RuleRegistry`], and driven to a fixpoint by a [`Rewriter`].

mod engine;
mod guard;
mod pattern;
mod registry;
mod rule;
mod template;

pub use engine::{Candidate, RewriteOutcome, Rewriter};
pub use guard::{Cmp, Expr, Guard};
pub use pattern::{Bindings, Bound, KindSet, Pattern};
pub use registry::RuleRegistry;
pub use rule::{Clause, Rule, RuleDecl};
pub use template::{Item, Source, Template};
