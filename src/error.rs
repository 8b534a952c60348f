//! Error types for the semantic type engine.
//!
//! Errors are split by who is at fault:
//! - [`InternalError`]: the engine, its schema or its rule set contradicted
//!   itself. Always fatal for the current compilation unit.
//! - [`RuleError`] / [`SchemaError`]: malformed declarations, rejected before
//!   any program is normalized.
//! - [`TypeError`]: the checked program is wrong. Recoverable per declaration.
//! - [`LowerError`], [`ConfigError`], [`PersistError`]: boundary failures.

use crate::arena::NodeIndex;
use crate::schema::KindId;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Internal consistency failure.
///
/// Signals a bug in the normalizer, schema or rule set rather than in the
/// program being checked.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InternalError {
    /// A node index does not address a node of the automaton.
    #[error("node index {index} out of range for automaton of {len} nodes")]
    IndexOutOfRange { index: NodeIndex, len: usize },
    /// A node does not have the shape its kind requires.
    #[error("shape mismatch at {node}: expected {expected}, found {found}")]
    ShapeMismatch {
        node: NodeIndex,
        expected: &'static str,
        found: String,
    },
    /// A term kind is not registered in the schema it is read with.
    #[error("{kind} is not registered in the schema")]
    UnknownKind { kind: KindId },
    /// A type variable survived until acceptance.
    #[error("type variable `{name}` reached acceptance unresolved")]
    UnresolvedVariable { name: String },
    /// The rewrite system failed to reach a fixpoint within its step budget.
    #[error("rewrite budget of {budget} steps exhausted (last rule `{last_rule}`)")]
    BudgetExhausted { budget: usize, last_rule: String },
    /// A template or guard read a capture the match did not bind.
    #[error("rule `{rule}` read unbound capture `{capture}`")]
    UnboundCapture { rule: String, capture: String },
    /// A guard or template used a capture at the wrong type.
    #[error("rule `{rule}`: {detail}")]
    GuardType { rule: String, detail: String },
    /// A root label was read that was never assigned.
    #[error("automaton has no root labelled {label}")]
    MissingRoot { label: usize },
}

/// Malformed rule definition, rejected at registry construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("duplicate rule name `{0}`")]
    DuplicateName(String),
    #[error("rule `{rule}` references undeclared kind or group `{kind}`")]
    UnknownKind { rule: String, kind: String },
    #[error("rule `{rule}` uses unbound capture `{capture}`")]
    UnboundCapture { rule: String, capture: String },
    #[error("rule `{rule}` does not match a single head kind")]
    HeadlessPattern { rule: String },
    #[error("rule `{rule}` constructs `{name}`, which is a group rather than a kind")]
    AmbiguousKind { rule: String, name: String },
    #[error("rule `{rule}` declares no replacement clause")]
    NoClauses { rule: String },
}

/// Malformed schema declaration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("duplicate kind `{0}`")]
    DuplicateKind(String),
    #[error("duplicate group `{0}`")]
    DuplicateGroup(String),
    #[error("group `{group}` names undeclared kind `{member}`")]
    UnknownGroupMember { group: String, member: String },
}

/// Failure lowering a type expression into an automaton.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LowerError {
    #[error("reference to `{0}` has no enclosing nominal definition")]
    UnboundReference(String),
    #[error(transparent)]
    Internal(#[from] InternalError),
}

/// Failure loading engine configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Failure persisting or reloading automata.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("CBOR error: {0}")]
    Cbor(#[from] serde_cbor::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt automaton: {0}")]
    Corrupt(#[from] InternalError),
}

/// Source location attached to user-facing diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Span {
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// User-facing type error, reported with its source location.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypeError {
    /// A declared type has no inhabitants.
    #[error("{span}: type `{name}` is empty (normalizes to Void)")]
    EmptyType { span: Span, name: String },
    /// A value is not a member of the type it was checked against.
    #[error("{span}: value is not accepted by `{ty}`")]
    NotAccepted { span: Span, ty: String },
    /// A subtype relation required by the program does not hold.
    #[error("{span}: `{sub}` is not a subtype of `{sup}`")]
    NotSubtype { span: Span, sub: String, sup: String },
}

impl TypeError {
    /// Source location of the diagnostic.
    pub fn span(&self) -> Span {
        match self {
            TypeError::EmptyType { span, .. }
            | TypeError::NotAccepted { span, .. }
            | TypeError::NotSubtype { span, .. } => *span,
        }
    }
}

/// Umbrella error for callers that do not distinguish concerns.
#[derive(Error, Debug)]
pub enum Error {
    #[error("internal error: {0}")]
    Internal(#[from] InternalError),
    #[error("rule error: {0}")]
    Rule(#[from] RuleError),
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("lowering error: {0}")]
    Lower(#[from] LowerError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_name_the_node() {
        let err = InternalError::IndexOutOfRange {
            index: NodeIndex::new(9),
            len: 3,
        };
        assert_eq!(err.to_string(), "node index #9 out of range for automaton of 3 nodes");
    }

    #[test]
    fn type_errors_carry_location() {
        let err = TypeError::EmptyType {
            span: Span::new(4, 2),
            name: "nat".into(),
        };
        assert_eq!(err.span(), Span::new(4, 2));
        assert!(err.to_string().starts_with("4:2: type `nat` is empty"));
    }

    #[test]
    fn umbrella_converts() {
        let err: Error = RuleError::DuplicateName("x".into()).into();
        assert!(matches!(err, Error::Rule(_)));
    }
}
