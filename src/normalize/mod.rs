//! Type normalization.
//!
//! A [`Normalizer`] drives a rule registry to a fixpoint over a type and
//! answers the decision queries built on top of it. Nominal types are
//! opaque: their bodies are never rewritten, so recursive definitions do
//! not unfold.

mod rules;
#[cfg(test)]
mod tests;

pub use rules::{standard_registry, standard_rules};

use crate::cache::{TypeCache, TypeCacheKey};
use crate::config::EngineConfig;
use crate::error::InternalError;
use crate::rewrite::{RuleRegistry, Rewriter};
use crate::schema::TypeKind;
use crate::trace::RewriteTrace;
use crate::types::Type;
use std::sync::Arc;
use tracing::trace;

/// Result of a traced normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub ty: Type,
    /// Rewrites applied to reach `ty`.
    pub steps: usize,
    /// Present when the engine is configured to record traces.
    pub trace: Option<RewriteTrace>,
}

/// Rewrites types to canonical form and decides emptiness and subtyping.
#[derive(Debug, Clone)]
pub struct Normalizer {
    registry: Arc<RuleRegistry>,
    config: EngineConfig,
    cache: TypeCache,
}

impl Normalizer {
    pub fn new(registry: Arc<RuleRegistry>, config: EngineConfig) -> Self {
        let cache = TypeCache::new(config.cache_capacity);
        Self {
            registry,
            config,
            cache,
        }
    }

    /// The standard rule set with the default configuration.
    pub fn standard() -> Self {
        Self::new(standard_registry(), EngineConfig::default())
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &TypeCache {
        &self.cache
    }

    /// Replaces the cache, e.g. with one loaded from disk.
    pub fn set_cache(&mut self, cache: TypeCache) {
        self.cache = cache;
    }

    fn key(&self, ty: &Type) -> Result<TypeCacheKey, InternalError> {
        Ok(TypeCacheKey::new(self.registry.fingerprint(), ty.fingerprint()?))
    }

    fn run(&self, ty: &Type, record: bool) -> Result<Normalized, InternalError> {
        let outcome = Rewriter::new(&self.registry)
            .with_budget(self.config.rewrite_budget)
            .opaque(TypeKind::Nominal.id())
            .recording(record)
            .run(ty.automaton(), ty.root())?;
        Ok(Normalized {
            ty: Type::from_canonical(outcome.automaton)?,
            steps: outcome.steps,
            trace: outcome.trace,
        })
    }

    /// Canonical form of `ty`.
    pub fn normalize(&mut self, ty: &Type) -> Result<Type, InternalError> {
        let key = self.key(ty)?;
        if let Some(hit) = self.cache.get(&key) {
            trace!(ty = %ty, "normalization cache hit");
            return Ok(hit.clone());
        }
        let normalized = self.run(ty, false)?.ty;
        self.cache.insert(key, normalized.clone());
        Ok(normalized)
    }

    /// Normalizes without consulting the cache, reporting the steps taken.
    pub fn normalize_traced(&mut self, ty: &Type) -> Result<Normalized, InternalError> {
        let key = self.key(ty)?;
        let result = self.run(ty, self.config.record_traces)?;
        self.cache.insert(key, result.ty.clone());
        Ok(result)
    }

    pub fn is_void(&mut self, ty: &Type) -> Result<bool, InternalError> {
        Ok(self.normalize(ty)?.is_void())
    }

    /// Normal form of `And{a, b}`.
    pub fn intersect(&mut self, a: &Type, b: &Type) -> Result<Type, InternalError> {
        self.normalize(&a.intersect(b)?)
    }

    /// `sub <: sup` iff `And{sub, Not(sup)}` normalizes to Void.
    pub fn is_subtype(&mut self, sub: &Type, sup: &Type) -> Result<bool, InternalError> {
        let difference = sub.intersect(&sup.negate()?)?;
        self.is_void(&difference)
    }

    /// Mutual subtyping.
    pub fn equivalent(&mut self, a: &Type, b: &Type) -> Result<bool, InternalError> {
        if self.normalize(a)? == self.normalize(b)? {
            return Ok(true);
        }
        Ok(self.is_subtype(a, b)? && self.is_subtype(b, a)?)
    }
}
