//! Type representation, unification, and generalization (components B, C,
//! D, G, H).
//!
//! This crate owns every mutable data structure the checker consults while
//! inferring types: the union-find arenas for type and row variables, the
//! bound-ID kind stores, and the synonym/variant definition table. All of
//! it is reached through one explicit [`InferenceContext`] value — there is
//! no global/thread-local state, matching the "pass the context explicitly"
//! design note.

pub mod cycle;
pub mod defs;
pub mod generalize;
pub mod kind;
pub mod store;
pub mod ty;
pub mod unify;

pub use defs::{CtorDef, OpaqueDef, SynonymDef, TypeDefStore, VariantDef};
pub use generalize::{generalize, instantiate, GeneralizeError, PolyType};
pub use kind::BaseKind;
pub use store::{InferenceContext, TypeStore};
pub use ty::{DataTypeId, Domain, Row, Scalar, Type};
pub use unify::{unify, unify_row, UnifyResult};

pub use hiveml_ids::{BoundId, BoundRowId, CtorId, OpaqueId, RowVarId, SynonymId, TypeVarId, VariantId};
