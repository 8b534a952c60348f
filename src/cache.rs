//! Normalization cache.
//!
//! Canonical types are memoized by structural fingerprint. The key also
//! carries the rule-set fingerprint, so a cache filled under one registry is
//! never consulted under another.
//!
//! Invalidation is coarse: when the cache is full it is cleared.

use crate::error::{InternalError, PersistError};
use crate::fingerprint::{HashValue, DOMAIN_CACHE_KEY_V0};
use crate::types::Type;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Key for normalization cache entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeCacheKey {
    /// Fingerprint of the rule registry.
    pub rules_fp: HashValue,
    /// Structural fingerprint of the input type.
    pub type_fp: HashValue,
}

impl TypeCacheKey {
    pub fn new(rules_fp: HashValue, type_fp: HashValue) -> Self {
        Self { rules_fp, type_fp }
    }

    /// Computes the deterministic hash of this cache key.
    pub fn fingerprint(&self) -> HashValue {
        let mut bytes = Vec::with_capacity(64);
        bytes.extend_from_slice(self.rules_fp.as_bytes());
        bytes.extend_from_slice(self.type_fp.as_bytes());
        HashValue::hash_with_domain(DOMAIN_CACHE_KEY_V0, &bytes)
    }
}

/// Bounded store of normalized types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCache {
    capacity: usize,
    entries: BTreeMap<HashValue, Type>,
}

impl TypeCache {
    /// Creates an empty cache. A capacity of `0` disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, key: &TypeCacheKey) -> Option<&Type> {
        self.entries.get(&key.fingerprint())
    }

    pub fn insert(&mut self, key: TypeCacheKey, ty: Type) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() >= self.capacity {
            debug!(entries = self.entries.len(), "normalization cache full, clearing");
            self.entries.clear();
        }
        self.entries.insert(key.fingerprint(), ty);
    }

    /// Clears all cached results.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn validate(&self) -> Result<(), InternalError> {
        for ty in self.entries.values() {
            ty.automaton().validate()?;
            if ty.automaton().try_root(0)? != ty.root() {
                return Err(InternalError::MissingRoot { label: 0 });
            }
            ty.view(ty.root())?;
        }
        Ok(())
    }
}

impl TypeCache {
    /// Serializes the cache to CBOR bytes.
    pub fn to_cbor(&self) -> Result<Vec<u8>, PersistError> {
        Ok(serde_cbor::to_vec(self)?)
    }

    /// Deserializes and validates a cache from CBOR bytes.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, PersistError> {
        let cache: Self = serde_cbor::from_slice(bytes)?;
        if let Err(err) = cache.validate() {
            warn!(error = %err, "discarding corrupt normalization cache");
            return Err(err.into());
        }
        Ok(cache)
    }

    /// Saves the cache to a file in CBOR format.
    pub fn save_to_file(&self, path: &Path) -> Result<(), PersistError> {
        std::fs::write(path, self.to_cbor()?)?;
        Ok(())
    }

    /// Loads the cache from a CBOR file.
    pub fn load_from_file(path: &Path) -> Result<Self, PersistError> {
        let bytes = std::fs::read(path)?;
        Self::from_cbor(&bytes)
    }
}
