//! semtype: semantic types as rewritable automata.
//!
//! Types are stored as hash-consed automata whose nodes are terms over a
//! fixed kind schema. A ranked rule set rewrites them to a canonical normal
//! form; emptiness, subtyping and value acceptance are decided on top of
//! that form.
//!
//! # Layers
//!
//! - [`automaton`]: interned states, canonical copies and root labels.
//! - [`types`]: the typed view over an automaton and the [`TypeExpr`] surface.
//! - [`rewrite`]: patterns, guards, templates and the fixpoint rewriter.
//! - [`normalize`]: the standard rule set and the [`Normalizer`].
//! - [`accept`]: whether a value automaton inhabits a type.
//! - [`check`]: declaration-level diagnostics.
//!
//! # Example
//!
//! ```
//! use semtype::prelude::*;
//!
//! # fn main() -> semtype::Result<()> {
//! let mut normalizer = Normalizer::standard();
//! let ty = TypeExpr::not(TypeExpr::not(TypeExpr::Int)).lower()?;
//! assert_eq!(normalizer.normalize(&ty)?.to_string(), "Int");
//!
//! let int = TypeExpr::Int.lower()?;
//! let number = TypeExpr::or([TypeExpr::Int, TypeExpr::Real]).lower()?;
//! assert!(normalizer.is_subtype(&int, &number)?);
//! assert!(!normalizer.is_subtype(&number, &int)?);
//! # Ok(())
//! # }
//! ```

pub mod accept;
pub mod arena;
pub mod automaton;
pub mod cache;
pub mod check;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod normalize;
pub mod pool;
pub mod rewrite;
pub mod schema;
pub mod trace;
pub mod types;

pub use accept::accepts;
pub use automaton::{Automaton, State};
pub use check::Checker;
pub use config::EngineConfig;
pub use error::{Error, InternalError, Result, Span, TypeError};
pub use normalize::{Normalized, Normalizer};
pub use pool::TypePool;
pub use types::{Type, TypeExpr};

/// Prelude for convenient usage.
pub mod prelude {
    pub use crate::accept::accepts;
    pub use crate::arena::NodeIndex;
    pub use crate::automaton::{Automaton, CollectionKind, State};
    pub use crate::cache::{TypeCache, TypeCacheKey};
    pub use crate::check::Checker;
    pub use crate::config::EngineConfig;
    pub use crate::error::{InternalError, Span, TypeError};
    pub use crate::fingerprint::{structural_hash, HashValue};
    pub use crate::normalize::{standard_registry, Normalized, Normalizer};
    pub use crate::pool::TypePool;
    pub use crate::rewrite::{Guard, Pattern, RuleDecl, RuleRegistry, Rewriter, Template};
    pub use crate::schema::{Schema, SchemaBuilder, TypeKind};
    pub use crate::types::{Type, TypeExpr, TypeNode};
}
