//! Fresh-ID generation (component A).
//!
//! Every namespace in the type checker — type variables, row variables,
//! bound (quantified) variables, synonym/variant/opaque type IDs,
//! constructor IDs, and the two flavors of IR names — is a disjoint,
//! monotonically increasing `u32` counter. IDs are newtypes so the
//! compiler rejects mixing namespaces (passing a `RowVarId` where a
//! `TypeVarId` is expected is a type error, not a runtime bug).
//!
//! `IdGen` owns every counter. It is an explicit value threaded through
//! `InferenceContext` (see `hiveml-types`) rather than a global/singleton,
//! per the "pass the context explicitly" rule: two independent test cases
//! get two independent `IdGen`s and never observe each other's IDs.

use std::fmt;

macro_rules! define_id {
    ($name:ident, $tag:literal) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $tag, self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(self, f)
            }
        }
    };
}

define_id!(TypeVarId, "t");
define_id!(RowVarId, "r");
define_id!(BoundId, "a");
define_id!(BoundRowId, "ar");
define_id!(SynonymId, "syn");
define_id!(VariantId, "var");
define_id!(CtorId, "ctor");
define_id!(OpaqueId, "op");
define_id!(LocalName, "local");
define_id!(GlobalName, "global");
define_id!(FunctorId, "functor");

/// Owns one monotonic counter per ID namespace. Never reset; `fresh_*`
/// always returns a value strictly greater than every value it has ever
/// returned from the same counter.
#[derive(Debug, Default, Clone)]
pub struct IdGen {
    type_var: u32,
    row_var: u32,
    bound: u32,
    bound_row: u32,
    synonym: u32,
    variant: u32,
    ctor: u32,
    opaque: u32,
    local_name: u32,
    global_name: u32,
    functor: u32,
}

macro_rules! fresh_fn {
    ($fn_name:ident, $field:ident, $ty:ident) => {
        pub fn $fn_name(&mut self) -> $ty {
            let id = $ty(self.$field);
            self.$field += 1;
            id
        }
    };
}

/// Which output namespace a resolved name belongs to: a lambda/let-bound
/// local, or a module-level (or primitive) global. Shared between
/// `hiveml-env` (a `Binding` records which kind it resolves to) and
/// `hiveml-elab`'s IR (`IName` mirrors this exact shape).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolvedName {
    Local(LocalName),
    Global(GlobalName),
}

impl IdGen {
    pub fn new() -> Self {
        Self::default()
    }

    fresh_fn!(fresh_type_var, type_var, TypeVarId);
    fresh_fn!(fresh_row_var, row_var, RowVarId);
    fresh_fn!(fresh_bound, bound, BoundId);
    fresh_fn!(fresh_bound_row, bound_row, BoundRowId);
    fresh_fn!(fresh_synonym, synonym, SynonymId);
    fresh_fn!(fresh_variant, variant, VariantId);
    fresh_fn!(fresh_ctor, ctor, CtorId);
    fresh_fn!(fresh_opaque, opaque, OpaqueId);
    fresh_fn!(fresh_local_name, local_name, LocalName);
    fresh_fn!(fresh_global_name, global_name, GlobalName);
    fresh_fn!(fresh_functor, functor, FunctorId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_monotonic_and_disjoint_per_namespace() {
        let mut ids = IdGen::new();
        let a = ids.fresh_type_var();
        let b = ids.fresh_type_var();
        assert!(a.0 < b.0);

        let r = ids.fresh_row_var();
        assert_eq!(r.0, 0, "row namespace starts independently from type_var");
    }

    #[test]
    fn two_contexts_do_not_observe_each_other() {
        let mut a = IdGen::new();
        let mut b = IdGen::new();
        let _ = a.fresh_type_var();
        let _ = a.fresh_type_var();
        let first_of_b = b.fresh_type_var();
        assert_eq!(first_of_b.0, 0);
    }

    #[test]
    fn debug_renders_short_tag() {
        let mut ids = IdGen::new();
        let op = ids.fresh_opaque();
        assert_eq!(format!("{op:?}"), "op0");
    }
}
