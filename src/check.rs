//! Declaration-level checks used by the verifier.
//!
//! Type errors are collected and checking continues; internal errors are
//! returned and abort the unit.

use crate::accept::accepts;
use crate::arena::NodeIndex;
use crate::automaton::Automaton;
use crate::error::{InternalError, Span, TypeError};
use crate::normalize::Normalizer;
use crate::schema::Schema;
use crate::types::Type;
use tracing::debug;

#[derive(Debug)]
pub struct Checker {
    normalizer: Normalizer,
    diagnostics: Vec<TypeError>,
}

impl Checker {
    pub fn new(normalizer: Normalizer) -> Self {
        Self {
            normalizer,
            diagnostics: Vec::new(),
        }
    }

    pub fn normalizer(&mut self) -> &mut Normalizer {
        &mut self.normalizer
    }

    /// Normalizes a declared type, recording an error if it is empty.
    pub fn check_declaration(&mut self, name: &str, ty: &Type, span: Span) -> Result<Type, InternalError> {
        let normalized = self.normalizer.normalize(ty)?;
        if normalized.is_void() {
            debug!(name, %span, "declared type is empty");
            self.diagnostics.push(TypeError::EmptyType {
                span,
                name: name.to_string(),
            });
        }
        Ok(normalized)
    }

    /// Checks that the value at `root` inhabits `ty`.
    pub fn check_value(
        &mut self,
        ty: &Type,
        value: &Automaton,
        root: NodeIndex,
        schema: &Schema,
        span: Span,
    ) -> Result<bool, InternalError> {
        let normalized = self.normalizer.normalize(ty)?;
        let accepted = accepts(&normalized, value, root, schema)?;
        if !accepted {
            self.diagnostics.push(TypeError::NotAccepted {
                span,
                ty: normalized.to_string(),
            });
        }
        Ok(accepted)
    }

    pub fn check_subtype(&mut self, sub: &Type, sup: &Type, span: Span) -> Result<bool, InternalError> {
        let holds = self.normalizer.is_subtype(sub, sup)?;
        if !holds {
            self.diagnostics.push(TypeError::NotSubtype {
                span,
                sub: sub.to_string(),
                sup: sup.to_string(),
            });
        }
        Ok(holds)
    }

    pub fn diagnostics(&self) -> &[TypeError] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<TypeError> {
        std::mem::take(&mut self.diagnostics)
    }
}
