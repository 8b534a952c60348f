//! Shared pool of canonical types.
//!
//! Many types live in one multi-root automaton, one root label per type.
//! Insertion deduplicates by structural fingerprint; extraction copies one
//! type out with [`Automaton::add_all`].

use crate::automaton::Automaton;
use crate::error::{InternalError, PersistError};
use crate::fingerprint::{structural_hash, HashValue};
use crate::types::{decode, Type};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypePool {
    automaton: Automaton,
    #[serde(skip)]
    index: HashMap<HashValue, usize>,
}

impl TypePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `ty`, returning its label. A structurally equal type already in
    /// the pool keeps its label.
    pub fn insert(&mut self, ty: &Type) -> Result<usize, InternalError> {
        let fp = ty.fingerprint()?;
        if let Some(&label) = self.index.get(&fp) {
            return Ok(label);
        }
        let root = self.automaton.add_all(ty.automaton(), ty.root());
        let label = self.automaton.push_root(root);
        self.index.insert(fp, label);
        Ok(label)
    }

    /// Extracts the type with `label`.
    pub fn get(&self, label: usize) -> Result<Type, InternalError> {
        let root = self.automaton.try_root(label)?;
        let mut out = Automaton::new();
        let copied = out.add_all(&self.automaton, root);
        Type::from_automaton(&out, copied)
    }

    pub fn len(&self) -> usize {
        self.automaton.roots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The shared automaton holding every pooled type.
    pub fn automaton(&self) -> &Automaton {
        &self.automaton
    }

    fn rebuild_index(&mut self) -> Result<(), InternalError> {
        self.automaton.validate()?;
        self.index.clear();
        for (label, &root) in self.automaton.roots().iter().enumerate() {
            decode(&self.automaton, root)?;
            let fp = structural_hash(&self.automaton, root)?;
            self.index.entry(fp).or_insert(label);
        }
        Ok(())
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>, PersistError> {
        Ok(serde_cbor::to_vec(self)?)
    }

    /// Deserializes a pool, validating every root.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, PersistError> {
        let mut pool: Self = serde_cbor::from_slice(bytes)?;
        if let Err(err) = pool.rebuild_index() {
            warn!(error = %err, "rejecting corrupt type pool");
            return Err(err.into());
        }
        debug!(types = pool.len(), "loaded type pool");
        Ok(pool)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), PersistError> {
        std::fs::write(path, self.to_cbor()?)?;
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self, PersistError> {
        let bytes = std::fs::read(path)?;
        Self::from_cbor(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::State;
    use crate::types::TypeExpr;

    fn sample() -> Vec<Type> {
        vec![
            TypeExpr::Int.lower().unwrap(),
            TypeExpr::tuple([TypeExpr::Int, TypeExpr::Bool]).lower().unwrap(),
            TypeExpr::nominal(
                "IntList",
                TypeExpr::or([
                    TypeExpr::Null,
                    TypeExpr::tuple([TypeExpr::Int, TypeExpr::reference("IntList")]),
                ]),
            )
            .lower()
            .unwrap(),
        ]
    }

    #[test]
    fn insert_deduplicates_and_get_extracts() {
        let mut pool = TypePool::new();
        let labels: Vec<_> = sample().iter().map(|t| pool.insert(t).unwrap()).collect();
        assert_eq!(labels, vec![0, 1, 2]);
        assert_eq!(pool.insert(&sample()[1]).unwrap(), 1);
        assert_eq!(pool.len(), 3);
        for (label, ty) in sample().iter().enumerate() {
            assert_eq!(&pool.get(label).unwrap(), ty);
        }
        assert_eq!(pool.get(7), Err(InternalError::MissingRoot { label: 7 }));
    }

    #[test]
    fn persists_and_rebuilds_index() {
        let mut pool = TypePool::new();
        for t in sample() {
            pool.insert(&t).unwrap();
        }
        let file = tempfile::NamedTempFile::new().unwrap();
        pool.save_to_file(file.path()).unwrap();
        let mut loaded = TypePool::load_from_file(file.path()).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.get(2).unwrap(), sample()[2]);
        assert_eq!(loaded.insert(&sample()[0]).unwrap(), 0);
    }

    #[test]
    fn rejects_roots_that_are_not_types() {
        let mut a = Automaton::new();
        let stray = a.add(State::Int(1));
        a.push_root(stray);
        let bytes = serde_cbor::to_vec(&TypePool {
            automaton: a,
            index: HashMap::new(),
        })
        .unwrap();
        assert!(matches!(TypePool::from_cbor(&bytes), Err(PersistError::Corrupt(_))));
    }
}
