//! Components B/D storage: arenas for type and row variables, plus the
//! explicit context every inference operation threads through.
//!
//! `TypeStore` is a hand-rolled union-find over two parallel `Vec` arenas
//! (one per variable namespace), indexed directly by `TypeVarId`/
//! `RowVarId`. Path compression happens on every `resolve`; there is no
//! union-by-rank because cells never merge symmetrically — `unify`
//! always links the higher-level variable into the lower-level one (or
//! the younger into the older at equal level), so the tree never grows
//! past depth 2 in practice and rank bookkeeping would be unused
//! ceremony.

use indexmap::IndexMap;

use hiveml_ids::{IdGen, RowVarId, TypeVarId};

use crate::defs::TypeDefStore;
use crate::kind::BaseKind;
use crate::ty::{DataTypeId, Row, Type};

#[derive(Clone, Debug)]
pub enum TypeVarCell {
    Free { level: u32, kind: BaseKind },
    Link(Type),
    /// Produced by signature sealing: this variable must end up equal to
    /// a specific bound ID, never resolved to an arbitrary type.
    MustBeBound { kind: BaseKind },
}

#[derive(Clone, Debug)]
pub enum RowVarCell {
    Free { level: u32, kind: IndexMap<String, Type> },
    Link(Row),
    MustBeBound { kind: IndexMap<String, Type> },
}

#[derive(Debug, Default)]
pub struct TypeStore {
    type_vars: Vec<TypeVarCell>,
    row_vars: Vec<RowVarCell>,
}

impl TypeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_type_var(&mut self, id_gen: &mut IdGen, level: u32) -> TypeVarId {
        self.new_type_var_with_kind(id_gen, level, BaseKind::Universal)
    }

    pub fn new_type_var_with_kind(&mut self, id_gen: &mut IdGen, level: u32, kind: BaseKind) -> TypeVarId {
        let id = id_gen.fresh_type_var();
        self.type_vars.push(TypeVarCell::Free { level, kind });
        debug_assert_eq!(id.index(), self.type_vars.len() - 1);
        id
    }

    pub fn new_row_var(&mut self, id_gen: &mut IdGen, level: u32) -> RowVarId {
        let id = id_gen.fresh_row_var();
        self.row_vars.push(RowVarCell::Free { level, kind: IndexMap::new() });
        debug_assert_eq!(id.index(), self.row_vars.len() - 1);
        id
    }

    pub fn cell(&self, id: TypeVarId) -> &TypeVarCell {
        &self.type_vars[id.index()]
    }

    pub fn cell_mut(&mut self, id: TypeVarId) -> &mut TypeVarCell {
        &mut self.type_vars[id.index()]
    }

    pub fn row_cell(&self, id: RowVarId) -> &RowVarCell {
        &self.row_vars[id.index()]
    }

    pub fn row_cell_mut(&mut self, id: RowVarId) -> &mut RowVarCell {
        &mut self.row_vars[id.index()]
    }

    /// Follows `Link` chains (path-compressing as it goes) until it hits
    /// a free or must-be-bound variable, or a non-`Var` type.
    pub fn resolve(&mut self, ty: Type) -> Type {
        let Type::Var(id) = ty else { return ty };
        match self.cell(id).clone() {
            TypeVarCell::Link(inner) => {
                let resolved = self.resolve(inner);
                self.type_vars[id.index()] = TypeVarCell::Link(resolved.clone());
                resolved
            }
            TypeVarCell::Free { .. } | TypeVarCell::MustBeBound { .. } => Type::Var(id),
        }
    }

    pub fn resolve_row(&mut self, row: Row) -> Row {
        let Row::Var(id) = row else { return row };
        match self.row_cell(id).clone() {
            RowVarCell::Link(inner) => {
                let resolved = self.resolve_row(inner);
                self.row_vars[id.index()] = RowVarCell::Link(resolved.clone());
                resolved
            }
            RowVarCell::Free { .. } | RowVarCell::MustBeBound { .. } => Row::Var(id),
        }
    }

    pub fn level_of(&self, id: TypeVarId) -> Option<u32> {
        match self.cell(id) {
            TypeVarCell::Free { level, .. } => Some(*level),
            _ => None,
        }
    }

    pub fn row_level_of(&self, id: RowVarId) -> Option<u32> {
        match self.row_cell(id) {
            RowVarCell::Free { level, .. } => Some(*level),
            _ => None,
        }
    }
}

/// The single mutable context every inference/elaboration operation in
/// this crate is given explicit access to. No global or thread-local
/// state exists anywhere in the workspace; a caller that wants two
/// independent checking sessions constructs two `InferenceContext`s.
#[derive(Debug, Default)]
pub struct InferenceContext {
    pub ids: IdGen,
    pub types: TypeStore,
    pub defs: TypeDefStore,
    /// The nesting depth of `let`/lambda scopes currently open; variables
    /// minted at this level are generalized only once their enclosing
    /// scope closes, per the level-based generalization discipline.
    pub current_level: u32,
}

impl InferenceContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_level(&mut self) {
        self.current_level += 1;
    }

    pub fn exit_level(&mut self) {
        self.current_level = self.current_level.checked_sub(1).expect("level underflow");
    }

    pub fn fresh_type_var(&mut self) -> Type {
        Type::Var(self.types.new_type_var(&mut self.ids, self.current_level))
    }

    pub fn fresh_row_var(&mut self) -> Row {
        Row::Var(self.types.new_row_var(&mut self.ids, self.current_level))
    }

    /// A fresh variable constrained to unify only with records carrying
    /// (at least) the given labels — the "singleton record kind" used by
    /// `r.label` projection before `r`'s full shape is known.
    pub fn fresh_type_var_with_record_kind(&mut self, labels: IndexMap<String, crate::ty::Type>) -> Type {
        self.fresh_type_var_with_kind(BaseKind::Record(labels))
    }

    /// A fresh variable at the current level carrying the given kind —
    /// used by `instantiate` to restore the kind a quantifier was
    /// generalized with, rather than always minting an unconstrained one.
    pub fn fresh_type_var_with_kind(&mut self, kind: BaseKind) -> Type {
        Type::Var(self.types.new_type_var_with_kind(&mut self.ids, self.current_level, kind))
    }

    /// Resolves through `Link` chains like [`TypeStore::resolve`], then
    /// eagerly expands any transparent synonym reached, looping until
    /// neither applies — so callers never observe a
    /// `Type::Data(DataTypeId::Synonym(..), ..)` leaf, only its expansion.
    pub fn resolve(&mut self, ty: Type) -> Type {
        let mut ty = self.types.resolve(ty);
        loop {
            let (sid, args) = match &ty {
                Type::Data(DataTypeId::Synonym(sid), args) => (*sid, args.clone()),
                _ => return ty,
            };
            let args: Vec<Type> = args.into_iter().map(|a| self.types.resolve(a)).collect();
            let expanded = self.defs.expand_synonym(sid, &args);
            ty = self.types.resolve(expanded);
        }
    }

    pub fn resolve_row(&mut self, row: Row) -> Row {
        self.types.resolve_row(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_follows_link_chain_and_compresses() {
        let mut ctx = InferenceContext::new();
        let a = ctx.types.new_type_var(&mut ctx.ids, 0);
        let b = ctx.types.new_type_var(&mut ctx.ids, 0);
        *ctx.types.cell_mut(a) = TypeVarCell::Link(Type::Var(b));
        *ctx.types.cell_mut(b) = TypeVarCell::Link(Type::INT);
        assert_eq!(ctx.types.resolve(Type::Var(a)), Type::INT);
        // path compression: `a` now points directly at INT.
        assert!(matches!(ctx.types.cell(a), TypeVarCell::Link(Type::Scalar(_))));
    }

    #[test]
    fn fresh_vars_record_current_level() {
        let mut ctx = InferenceContext::new();
        ctx.enter_level();
        ctx.enter_level();
        let Type::Var(v) = ctx.fresh_type_var() else { unreachable!() };
        assert_eq!(ctx.types.level_of(v), Some(2));
    }

    #[test]
    fn context_resolve_expands_a_transparent_synonym() {
        use crate::defs::SynonymDef;
        use hiveml_ids::SynonymId;

        let mut ctx = InferenceContext::new();
        let id = SynonymId(0);
        ctx.defs.register_synonym(id, SynonymDef { name: "celsius".into(), params: vec![], body: Type::INT, module_path: vec![] });
        let resolved = ctx.resolve(Type::Data(crate::ty::DataTypeId::Synonym(id), vec![]));
        assert_eq!(resolved, Type::INT);
    }
}
