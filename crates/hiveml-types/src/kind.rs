//! Component C: base kinds.
//!
//! The source language's kind system is simplified here to what the
//! checker actually needs to decide: whether a type variable is
//! unconstrained (`Universal`) or has been constrained by a record-label
//! projection (`.label` access before the record's full shape is known).
//! A higher-kinded `base-kind^n -> base-kind` arrow calculus is in the
//! surface language's Non-goals' spirit — nothing in the supported
//! scenarios ever builds one — so it is cut here rather than modeled and
//! left unexercised.

use indexmap::IndexMap;

use crate::ty::Type;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BaseKind {
    /// No constraint beyond "is a type".
    Universal,
    /// Must unify with a record carrying (at least) these labels, used
    /// while a `.label` projection is resolved against an as-yet-unknown
    /// record shape.
    Record(IndexMap<String, Type>),
}

impl BaseKind {
    pub fn is_universal(&self) -> bool {
        matches!(self, BaseKind::Universal)
    }
}
