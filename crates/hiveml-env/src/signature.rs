//! Module signatures: what a structure exposes after sealing.
//!
//! A `SigRecord` is the result of elaborating a `sig ... end` (or the
//! principal signature inferred for an unsealed structure). Subtyping
//! between two `SigRecord`s (component L) lives in `hiveml-elab`, since
//! it needs the inference context to unify value types and build the
//! opaque-type witness map — this crate only owns the shape.

use indexmap::IndexMap;

use hiveml_ids::OpaqueId;
use hiveml_types::{PolyType, Type};

/// How a type component is exposed through a signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeSigItem {
    /// A transparent type: `type t = int`. Callers outside the module see
    /// the right-hand side directly.
    Manifest { params: usize, body: Type },
    /// An opaque type: `type t`. Callers outside the module only ever see
    /// the identity; the witness for what it actually is lives in the
    /// struct that satisfies this signature, not in the signature itself.
    Abstract { params: usize, witness: OpaqueId },
}

impl TypeSigItem {
    pub fn arity(&self) -> usize {
        match self {
            TypeSigItem::Manifest { params, .. } => *params,
            TypeSigItem::Abstract { params, .. } => *params,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SigRecord {
    pub values: IndexMap<String, PolyType>,
    pub types: IndexMap<String, TypeSigItem>,
    pub submodules: IndexMap<String, SigRecord>,
}

impl SigRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, name: impl Into<String>, scheme: PolyType) -> Self {
        self.values.insert(name.into(), scheme);
        self
    }

    pub fn with_type(mut self, name: impl Into<String>, item: TypeSigItem) -> Self {
        self.types.insert(name.into(), item);
        self
    }

    pub fn with_submodule(mut self, name: impl Into<String>, sig: SigRecord) -> Self {
        self.submodules.insert(name.into(), sig);
        self
    }
}

/// A signature paired with the opaque IDs existentially quantified at its
/// boundary (spec §3's "abstracted signature"). A `ModuleBinding::Structure`
/// carries one of these; so does a named `signature` declaration, so that
/// looking the name back up can mint a fresh copy (see
/// `hiveml_elab::module::copy_abstracted_sig`) rather than reusing the same
/// opaque identities across independent uses.
#[derive(Clone, Debug, Default)]
pub struct AbstractedSig {
    pub opaques: Vec<OpaqueId>,
    pub sig: SigRecord,
}

impl AbstractedSig {
    pub fn new(opaques: Vec<OpaqueId>, sig: SigRecord) -> Self {
        AbstractedSig { opaques, sig }
    }

    pub fn transparent(sig: SigRecord) -> Self {
        AbstractedSig { opaques: Vec::new(), sig }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_methods_compose() {
        let sig = SigRecord::new()
            .with_value("id", PolyType::monomorphic(Type::UNIT))
            .with_type("t", TypeSigItem::Manifest { params: 0, body: Type::INT });
        assert!(sig.values.contains_key("id"));
        assert_eq!(sig.types["t"].arity(), 0);
    }

    #[test]
    fn transparent_abstracted_sig_has_no_opaques() {
        let sig = SigRecord::new().with_value("id", PolyType::monomorphic(Type::UNIT));
        let abstracted = AbstractedSig::transparent(sig);
        assert!(abstracted.opaques.is_empty());
    }
}
