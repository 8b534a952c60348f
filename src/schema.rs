//! Term-kind schemas.
//!
//! A [`Schema`] maps kind ids to names and arities. It is built once, never
//! mutated afterwards, and shared by reference with every automaton and
//! engine call that reads terms of that universe. Type automata use the fixed
//! [`type_schema`]; value automata use a schema supplied by the caller.
//!
//! Groups name unions of kinds for rule authoring only. They are not kinds:
//! no node ever carries a group id.

use crate::error::SchemaError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::OnceLock;

/// Identifier of a term kind within one schema.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KindId(u32);

impl KindId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for KindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "kind#{}", self.0)
    }
}

/// Number of fields a term's contents List carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
    /// No contents (the VOID sentinel).
    Leaf,
    /// Exactly `n` fields.
    Exactly(usize),
    /// Between `lo` and `hi` fields, inclusive.
    Between(usize, usize),
}

impl Arity {
    /// Checks a field count against this arity. `None` means VOID contents.
    pub fn admits(&self, fields: Option<usize>) -> bool {
        match (self, fields) {
            (Arity::Leaf, None) => true,
            (Arity::Leaf, Some(_)) => false,
            (_, None) => false,
            (Arity::Exactly(n), Some(k)) => *n == k,
            (Arity::Between(lo, hi), Some(k)) => *lo <= k && k <= *hi,
        }
    }
}

/// One registered kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaEntry {
    pub kind: KindId,
    pub name: String,
    pub arity: Arity,
}

/// Immutable registry of term kinds and kind groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    entries: Vec<SchemaEntry>,
    by_name: HashMap<String, KindId>,
    groups: BTreeMap<String, Vec<KindId>>,
}

impl Schema {
    /// Looks up an entry by kind id.
    pub fn get(&self, kind: KindId) -> Option<&SchemaEntry> {
        self.entries.get(kind.as_u32() as usize)
    }

    /// Returns the registered name of `kind`.
    pub fn name(&self, kind: KindId) -> Option<&str> {
        self.get(kind).map(|e| e.name.as_str())
    }

    /// Looks up a kind by name.
    pub fn kind(&self, name: &str) -> Option<KindId> {
        self.by_name.get(name).copied()
    }

    /// Returns the members of a group, sorted by kind id.
    pub fn group(&self, name: &str) -> Option<&[KindId]> {
        self.groups.get(name).map(|v| v.as_slice())
    }

    /// Resolves a kind or group name to the set of kinds it denotes.
    pub fn resolve(&self, name: &str) -> Option<Vec<KindId>> {
        if let Some(kind) = self.kind(name) {
            return Some(vec![kind]);
        }
        self.group(name).map(|members| members.to_vec())
    }

    /// Returns `true` if `name` is a group.
    pub fn is_group(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[SchemaEntry] {
        &self.entries
    }
}

/// Builder validating kind and group declarations.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    kinds: Vec<(String, Arity)>,
    groups: Vec<(String, Vec<String>)>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a kind. Ids are assigned in declaration order.
    pub fn term(mut self, name: impl Into<String>, arity: Arity) -> Self {
        self.kinds.push((name.into(), arity));
        self
    }

    /// Declares a group over previously or subsequently declared kinds.
    pub fn group<I, S>(mut self, name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups
            .push((name.into(), members.into_iter().map(Into::into).collect()));
        self
    }

    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut entries = Vec::with_capacity(self.kinds.len());
        let mut by_name = HashMap::with_capacity(self.kinds.len());
        for (i, (name, arity)) in self.kinds.into_iter().enumerate() {
            let kind = KindId::new(i as u32);
            if by_name.insert(name.clone(), kind).is_some() {
                return Err(SchemaError::DuplicateKind(name));
            }
            entries.push(SchemaEntry { kind, name, arity });
        }
        let mut groups = BTreeMap::new();
        for (name, members) in self.groups {
            if by_name.contains_key(&name) || groups.contains_key(&name) {
                return Err(SchemaError::DuplicateGroup(name));
            }
            let mut ids = Vec::with_capacity(members.len());
            for member in members {
                match by_name.get(&member) {
                    Some(&kind) => ids.push(kind),
                    None => {
                        return Err(SchemaError::UnknownGroupMember {
                            group: name,
                            member,
                        })
                    }
                }
            }
            ids.sort();
            ids.dedup();
            groups.insert(name, ids);
        }
        Ok(Schema {
            entries,
            by_name,
            groups,
        })
    }
}

/// The closed algebra of semantic type kinds.
///
/// Discriminants are the kind ids in [`type_schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum TypeKind {
    Void = 0,
    Any,
    Null,
    Bool,
    Int,
    Real,
    String,
    /// `Var[Str name]`: a type variable.
    Var,
    /// `Nominal[Str name, T]`: named indirection, possibly recursive.
    Nominal,
    /// `Not[T]`.
    Not,
    /// `And[Set{T..}]`.
    And,
    /// `Or[Set{T..}]`.
    Or,
    /// `Tuple[List[T..]]`.
    Tuple,
    /// `Array[T]`.
    Array,
    /// `Term[Str name]` or `Term[Str name, T]`: a schema term of the value universe.
    Term,
    /// `SetOf[U, Set{T..}]`.
    SetOf,
    /// `BagOf[U, Bag{T..}]`.
    BagOf,
    /// `ListOf[U, List[T..]]`.
    ListOf,
}

impl TypeKind {
    pub const ALL: [TypeKind; 18] = [
        TypeKind::Void,
        TypeKind::Any,
        TypeKind::Null,
        TypeKind::Bool,
        TypeKind::Int,
        TypeKind::Real,
        TypeKind::String,
        TypeKind::Var,
        TypeKind::Nominal,
        TypeKind::Not,
        TypeKind::And,
        TypeKind::Or,
        TypeKind::Tuple,
        TypeKind::Array,
        TypeKind::Term,
        TypeKind::SetOf,
        TypeKind::BagOf,
        TypeKind::ListOf,
    ];

    /// Kind id of this type kind in [`type_schema`].
    #[inline]
    pub const fn id(self) -> KindId {
        KindId::new(self as u32)
    }

    pub fn from_id(kind: KindId) -> Option<TypeKind> {
        Self::ALL.get(kind.as_u32() as usize).copied()
    }

    pub const fn name(self) -> &'static str {
        match self {
            TypeKind::Void => "Void",
            TypeKind::Any => "Any",
            TypeKind::Null => "Null",
            TypeKind::Bool => "Bool",
            TypeKind::Int => "Int",
            TypeKind::Real => "Real",
            TypeKind::String => "String",
            TypeKind::Var => "Var",
            TypeKind::Nominal => "Nominal",
            TypeKind::Not => "Not",
            TypeKind::And => "And",
            TypeKind::Or => "Or",
            TypeKind::Tuple => "Tuple",
            TypeKind::Array => "Array",
            TypeKind::Term => "Term",
            TypeKind::SetOf => "SetOf",
            TypeKind::BagOf => "BagOf",
            TypeKind::ListOf => "ListOf",
        }
    }

    pub const fn arity(self) -> Arity {
        match self {
            TypeKind::Void
            | TypeKind::Any
            | TypeKind::Null
            | TypeKind::Bool
            | TypeKind::Int
            | TypeKind::Real
            | TypeKind::String => Arity::Leaf,
            TypeKind::Var
            | TypeKind::Not
            | TypeKind::And
            | TypeKind::Or
            | TypeKind::Tuple
            | TypeKind::Array => Arity::Exactly(1),
            TypeKind::Nominal | TypeKind::SetOf | TypeKind::BagOf | TypeKind::ListOf => {
                Arity::Exactly(2)
            }
            TypeKind::Term => Arity::Between(1, 2),
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Group of atomic leaves that intersect to Void when distinct.
pub const GROUP_LEAF: &str = "Leaf";
/// `Leaf` plus `Any`.
pub const GROUP_ATOM: &str = "Atom";
/// Structured shapes: `Tuple` and `Array`.
pub const GROUP_SHAPE: &str = "Shape";

fn type_schema_builder() -> SchemaBuilder {
    let builder = TypeKind::ALL
        .iter()
        .fold(SchemaBuilder::new(), |b, k| b.term(k.name(), k.arity()));
    builder
        .group(GROUP_LEAF, ["Null", "Bool", "Int", "Real", "String"])
        .group(GROUP_ATOM, ["Any", "Null", "Bool", "Int", "Real", "String"])
        .group(GROUP_SHAPE, ["Tuple", "Array"])
}

/// The shared schema of semantic type automata.
pub fn type_schema() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| match type_schema_builder().build() {
        Ok(schema) => schema,
        Err(err) => unreachable!("type schema declarations are fixed and valid: {err}"),
    })
}
