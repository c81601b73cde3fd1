//! Component B: the type representation.
//!
//! `Type` is shared between monomorphic and polymorphic positions: a mono
//! type's only variable leaf is `Type::Var` (a free, union-find-resolved
//! cell); a poly type's only variable leaf is `Type::Bound` (a quantifier
//! introduced by [`crate::generalize::generalize`]). Nothing enforces this
//! split at the type level — it is a discipline upheld by construction and
//! checked by the `generalize`/`instantiate` unit tests — exactly as
//! spec'd: "Any free variable referenced from a poly type has been
//! generalized away; poly types contain only Bound variable leaves."

use hiveml_ids::{BoundId, BoundRowId, OpaqueId, RowVarId, SynonymId, TypeVarId, VariantId};
use indexmap::IndexMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scalar {
    Unit,
    Bool,
    Int,
    Float,
    Char,
    Binary,
}

/// Three disjoint, nominally-equal-by-serial type ID namespaces (spec §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataTypeId {
    Synonym(SynonymId),
    Variant(VariantId),
    Opaque(OpaqueId),
}

/// The argument-shape of a function or effectful-function type: ordered
/// positional arguments, mandatory labeled arguments (exact key-set
/// equality required on unification), and an optional-argument row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Domain {
    pub ordered: Vec<Type>,
    pub mandatory: IndexMap<String, Type>,
    pub optional: Row,
}

impl Domain {
    pub fn empty() -> Self {
        Domain {
            ordered: Vec::new(),
            mandatory: IndexMap::new(),
            optional: Row::Fixed(IndexMap::new()),
        }
    }
}

/// A row is either a closed label map, a free/rigid row variable, or (only
/// inside a poly type body) a bound row quantifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Row {
    Fixed(IndexMap<String, Type>),
    Var(RowVarId),
    Bound(BoundRowId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Scalar(Scalar),
    /// A product of >= 2 types.
    Product(Vec<Type>),
    /// A row-polymorphic record: `Row::Fixed` for a closed record,
    /// `Row::Var` for `{name: T, ...}`.
    Record(Row),
    Data(DataTypeId, Vec<Type>),
    Function(Box<Domain>, Box<Type>),
    /// `domain -[eff]-> type`: `eff` is the receive type of the enclosing
    /// process, `ret` is the ordinary return type.
    Effectful(Box<Domain>, Box<Type>, Box<Type>),
    Pid(Box<Type>),
    /// A free type variable, resolved through `TypeStore`.
    Var(TypeVarId),
    /// A universally quantified variable; only valid inside a poly type.
    Bound(BoundId),
}

impl Type {
    pub const UNIT: Type = Type::Scalar(Scalar::Unit);
    pub const BOOL: Type = Type::Scalar(Scalar::Bool);
    pub const INT: Type = Type::Scalar(Scalar::Int);
    pub const FLOAT: Type = Type::Scalar(Scalar::Float);
    pub const CHAR: Type = Type::Scalar(Scalar::Char);
    pub const BINARY: Type = Type::Scalar(Scalar::Binary);

    pub fn product(mut items: Vec<Type>) -> Type {
        debug_assert!(items.len() >= 2, "Type::Product requires arity >= 2");
        if items.len() == 1 {
            return items.pop().unwrap();
        }
        Type::Product(items)
    }
}
