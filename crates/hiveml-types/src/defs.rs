//! Component D: the synonym/variant/constructor definition table.
//!
//! Definitions are registered exactly once, at the point the module
//! elaborator processes a `type`/`data` declaration, and never mutated
//! afterward. A `register_*` call on an ID that already has an entry, or
//! a `get_*` lookup that misses, is a programmer error in the caller (the
//! elaborator should never produce a dangling or duplicate ID) — so both
//! fail loudly via `assert!`/`expect` rather than threading an `Option`
//! or `Result` through call sites that can never legitimately observe it.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use hiveml_ids::{BoundId, CtorId, OpaqueId, SynonymId, VariantId};

use crate::ty::{Domain, Row, Type};

#[derive(Clone, Debug)]
pub struct SynonymDef {
    pub name: String,
    pub params: Vec<BoundId>,
    pub body: Type,
    pub module_path: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct CtorDef {
    pub owner: VariantId,
    pub id: CtorId,
    pub name: String,
    pub params: Vec<Type>,
}

#[derive(Clone, Debug)]
pub struct VariantDef {
    pub name: String,
    pub params: Vec<BoundId>,
    pub ctors: IndexMap<String, CtorDef>,
    pub module_path: Vec<String>,
}

/// An opaque type carries no body the checker can see — only an identity
/// and the arity it was declared with. Equality between two opaque types
/// is pure ID equality, never structural.
#[derive(Clone, Debug)]
pub struct OpaqueDef {
    pub name: String,
    pub arity: usize,
    pub module_path: Vec<String>,
}

#[derive(Debug, Default)]
pub struct TypeDefStore {
    synonyms: FxHashMap<SynonymId, SynonymDef>,
    variants: FxHashMap<VariantId, VariantDef>,
    opaques: FxHashMap<OpaqueId, OpaqueDef>,
}

impl TypeDefStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_synonym(&mut self, id: SynonymId, def: SynonymDef) {
        let prior = self.synonyms.insert(id, def);
        assert!(prior.is_none(), "synonym {id:?} registered twice");
    }

    pub fn register_variant(&mut self, id: VariantId, def: VariantDef) {
        let prior = self.variants.insert(id, def);
        assert!(prior.is_none(), "variant {id:?} registered twice");
    }

    pub fn register_opaque(&mut self, id: OpaqueId, def: OpaqueDef) {
        let prior = self.opaques.insert(id, def);
        assert!(prior.is_none(), "opaque {id:?} registered twice");
    }

    pub fn synonym(&self, id: SynonymId) -> &SynonymDef {
        self.synonyms.get(&id).unwrap_or_else(|| panic!("unregistered synonym {id:?}"))
    }

    pub fn variant(&self, id: VariantId) -> &VariantDef {
        self.variants.get(&id).unwrap_or_else(|| panic!("unregistered variant {id:?}"))
    }

    pub fn opaque(&self, id: OpaqueId) -> &OpaqueDef {
        self.opaques.get(&id).unwrap_or_else(|| panic!("unregistered opaque {id:?}"))
    }

    pub fn ctor(&self, owner: VariantId, label: &str) -> Option<&CtorDef> {
        self.variants.get(&owner)?.ctors.get(label)
    }

    pub fn synonym_ids(&self) -> impl Iterator<Item = SynonymId> + '_ {
        self.synonyms.keys().copied()
    }

    /// Substitutes `args` for the synonym's own parameters inside its
    /// body — the expansion a transparent `type celsius = int` owes
    /// everywhere a `Data(Synonym(..), ..)` leaf is resolved, so the
    /// synonym and its body stay structurally indistinguishable.
    pub fn expand_synonym(&self, id: SynonymId, args: &[Type]) -> Type {
        let def = self.synonym(id);
        debug_assert_eq!(def.params.len(), args.len(), "synonym {id:?} applied with the wrong number of arguments");
        let subst: FxHashMap<BoundId, Type> = def.params.iter().copied().zip(args.iter().cloned()).collect();
        substitute_bound(&def.body, &subst)
    }
}

fn substitute_bound(ty: &Type, subst: &FxHashMap<BoundId, Type>) -> Type {
    match ty {
        Type::Bound(id) => subst.get(id).cloned().unwrap_or_else(|| ty.clone()),
        Type::Var(_) | Type::Scalar(_) => ty.clone(),
        Type::Data(id, args) => Type::Data(*id, args.iter().map(|t| substitute_bound(t, subst)).collect()),
        Type::Product(items) => Type::Product(items.iter().map(|t| substitute_bound(t, subst)).collect()),
        Type::Record(row) => Type::Record(substitute_bound_row(row, subst)),
        Type::Function(dom, ret) => {
            Type::Function(Box::new(substitute_bound_domain(dom, subst)), Box::new(substitute_bound(ret, subst)))
        }
        Type::Effectful(dom, eff, ret) => Type::Effectful(
            Box::new(substitute_bound_domain(dom, subst)),
            Box::new(substitute_bound(eff, subst)),
            Box::new(substitute_bound(ret, subst)),
        ),
        Type::Pid(inner) => Type::Pid(Box::new(substitute_bound(inner, subst))),
    }
}

fn substitute_bound_domain(dom: &Domain, subst: &FxHashMap<BoundId, Type>) -> Domain {
    Domain {
        ordered: dom.ordered.iter().map(|t| substitute_bound(t, subst)).collect(),
        mandatory: dom.mandatory.iter().map(|(k, t)| (k.clone(), substitute_bound(t, subst))).collect(),
        optional: substitute_bound_row(&dom.optional, subst),
    }
}

fn substitute_bound_row(row: &Row, subst: &FxHashMap<BoundId, Type>) -> Row {
    match row {
        Row::Fixed(labels) => Row::Fixed(labels.iter().map(|(k, t)| (k.clone(), substitute_bound(t, subst))).collect()),
        Row::Var(id) => Row::Var(*id),
        Row::Bound(id) => Row::Bound(*id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "registered twice")]
    fn double_registration_panics() {
        let mut store = TypeDefStore::new();
        let id = SynonymId(0);
        let def = SynonymDef { name: "t".into(), params: vec![], body: Type::UNIT, module_path: vec![] };
        store.register_synonym(id, def.clone());
        store.register_synonym(id, def);
    }

    #[test]
    #[should_panic(expected = "unregistered")]
    fn missing_lookup_panics() {
        let store = TypeDefStore::new();
        store.synonym(SynonymId(7));
    }

    #[test]
    fn expand_synonym_substitutes_params_into_the_body() {
        let mut store = TypeDefStore::new();
        let param = BoundId(0);
        let id = SynonymId(0);
        store.register_synonym(
            id,
            SynonymDef { name: "pair".into(), params: vec![param], body: Type::product(vec![Type::Bound(param), Type::INT]), module_path: vec![] },
        );
        assert_eq!(store.expand_synonym(id, &[Type::BOOL]), Type::product(vec![Type::BOOL, Type::INT]));
    }

    #[test]
    fn ctor_lookup_resolves_through_owning_variant() {
        let mut store = TypeDefStore::new();
        let vid = VariantId(0);
        let mut ctors = IndexMap::new();
        ctors.insert(
            "Some".to_string(),
            CtorDef { owner: vid, id: CtorId(0), name: "Some".into(), params: vec![Type::INT] },
        );
        store.register_variant(
            vid,
            VariantDef { name: "option".into(), params: vec![], ctors, module_path: vec![] },
        );
        assert!(store.ctor(vid, "Some").is_some());
        assert!(store.ctor(vid, "None").is_none());
    }
}
