//! Component L: signature subtyping.
//!
//! A structure's principal signature can be presented under any
//! required signature it is at least as general as: every required
//! value must unify against the offered one without forcing a rigid
//! (universally quantified) parameter of the *required* signature down
//! to something narrower, every required manifest type must match
//! exactly, and every required abstract type gets a witness — the
//! actual type hiding behind it, recorded for the caller to carry
//! forward as an opaque-type binding.
//!
//! The rigid side is realized the same way `hiveml_types::store`
//! documents a sealed signature variable: a `MustBeBound` cell that
//! unification will refuse to resolve to anything but itself. A witness
//! computed this way can never be more specific than what the required
//! signature actually demands, which is exactly the subtyping direction
//! we want.

use std::collections::HashMap;

use hiveml_common::Span;
use hiveml_env::{SigRecord, TypeSigItem};
use hiveml_ids::{BoundId, BoundRowId, OpaqueId, RowVarId, TypeVarId};
use hiveml_types::store::{RowVarCell, TypeVarCell};
use hiveml_types::{generalize, instantiate, BaseKind, DataTypeId, Domain, InferenceContext, PolyType, Row, Type, UnifyResult};
use indexmap::IndexMap;

use crate::error::{ElabError, ElabResult};

struct Skolemizer<'a> {
    ctx: &'a mut InferenceContext,
    vars: HashMap<BoundId, TypeVarId>,
    row_vars: HashMap<BoundRowId, RowVarId>,
}

impl<'a> Skolemizer<'a> {
    fn var_for(&mut self, id: BoundId) -> Type {
        if let Some(&v) = self.vars.get(&id) {
            return Type::Var(v);
        }
        let v = self.ctx.types.new_type_var_with_kind(&mut self.ctx.ids, self.ctx.current_level, BaseKind::Universal);
        *self.ctx.types.cell_mut(v) = TypeVarCell::MustBeBound { kind: BaseKind::Universal };
        self.vars.insert(id, v);
        Type::Var(v)
    }

    fn row_for(&mut self, id: BoundRowId) -> Row {
        if let Some(&v) = self.row_vars.get(&id) {
            return Row::Var(v);
        }
        let v = self.ctx.types.new_row_var(&mut self.ctx.ids, self.ctx.current_level);
        *self.ctx.types.row_cell_mut(v) = RowVarCell::MustBeBound { kind: IndexMap::new() };
        self.row_vars.insert(id, v);
        Row::Var(v)
    }

    fn walk(&mut self, ty: Type) -> Type {
        match ty {
            Type::Bound(id) => self.var_for(id),
            Type::Var(id) => Type::Var(id),
            Type::Scalar(_) => ty,
            Type::Product(items) => Type::Product(items.into_iter().map(|t| self.walk(t)).collect()),
            Type::Record(row) => Type::Record(self.walk_row(row)),
            Type::Data(id, args) => Type::Data(id, args.into_iter().map(|t| self.walk(t)).collect()),
            Type::Function(dom, ret) => Type::Function(Box::new(self.walk_domain(*dom)), Box::new(self.walk(*ret))),
            Type::Effectful(dom, eff, ret) => {
                Type::Effectful(Box::new(self.walk_domain(*dom)), Box::new(self.walk(*eff)), Box::new(self.walk(*ret)))
            }
            Type::Pid(inner) => Type::Pid(Box::new(self.walk(*inner))),
        }
    }

    fn walk_domain(&mut self, dom: Domain) -> Domain {
        Domain {
            ordered: dom.ordered.into_iter().map(|t| self.walk(t)).collect(),
            mandatory: dom.mandatory.into_iter().map(|(k, t)| (k, self.walk(t))).collect(),
            optional: self.walk_row(dom.optional),
        }
    }

    fn walk_row(&mut self, row: Row) -> Row {
        match row {
            Row::Bound(id) => self.row_for(id),
            Row::Var(id) => Row::Var(id),
            Row::Fixed(labels) => Row::Fixed(labels.into_iter().map(|(k, t)| (k, self.walk(t))).collect()),
        }
    }
}

/// Checks that `actual` (a fully inferred, principal scheme) is at least
/// as general as `expected` (the scheme a signature requires): skolemize
/// `expected`'s quantifiers into rigid variables, instantiate `actual`
/// with ordinary flexible ones, and unify. Any attempt to bind a rigid
/// variable to something other than itself is reported against the
/// `BoundId` it was skolemized from.
pub fn subtype_poly_type(ctx: &mut InferenceContext, actual: &PolyType, expected: &PolyType, span: Span) -> ElabResult<()> {
    let mut skolem = Skolemizer { ctx, vars: HashMap::new(), row_vars: HashMap::new() };
    let rigid = skolem.walk(expected.body.clone());
    let reverse: HashMap<TypeVarId, BoundId> = skolem.vars.iter().map(|(&b, &v)| (v, b)).collect();

    let flexible = instantiate(ctx, actual);
    match hiveml_types::unify(ctx, flexible, rigid) {
        UnifyResult::Consistent => Ok(()),
        UnifyResult::Contradiction => Err(ElabError::NotASubtype { span }),
        UnifyResult::Inclusion(id) => {
            let bound = reverse.get(&id).copied().unwrap_or(BoundId(id.0));
            Err(ElabError::PolymorphicContradiction { bound, span })
        }
        UnifyResult::InclusionRow(_) => Err(ElabError::NotASubtype { span }),
    }
}

/// The opaque-type witness map produced by matching a structure's
/// signature against a required one: for each abstract type name in the
/// required signature, what the implementing structure's own type
/// actually resolves to.
pub type WitnessMap = HashMap<OpaqueId, (usize, Type)>;

/// Checks that `actual` satisfies `expected`, collecting a witness for
/// every abstract type `expected` declares. Value subtyping recurses
/// through [`subtype_poly_type`]; submodules recurse structurally.
pub fn subtype_sig_record(
    ctx: &mut InferenceContext,
    actual: &SigRecord,
    expected: &SigRecord,
    span: Span,
) -> ElabResult<WitnessMap> {
    let mut witnesses = WitnessMap::new();
    subtype_sig_record_into(ctx, actual, expected, span, &mut witnesses)?;
    Ok(witnesses)
}

fn subtype_sig_record_into(
    ctx: &mut InferenceContext,
    actual: &SigRecord,
    expected: &SigRecord,
    span: Span,
    witnesses: &mut WitnessMap,
) -> ElabResult<()> {
    for (name, expected_scheme) in &expected.values {
        let actual_scheme = actual
            .values
            .get(name)
            .ok_or_else(|| ElabError::MissingRequiredValName { name: name.clone(), span })?;
        subtype_poly_type(ctx, actual_scheme, expected_scheme, span)?;
    }

    for (name, expected_item) in &expected.types {
        let actual_item = actual
            .types
            .get(name)
            .ok_or_else(|| ElabError::MissingRequiredTypeName { name: name.clone(), span })?;
        if actual_item.arity() != expected_item.arity() {
            return Err(ElabError::InvalidNumberOfTypeArguments {
                name: name.clone(),
                expected: expected_item.arity(),
                found: actual_item.arity(),
                span,
            });
        }
        match expected_item {
            TypeSigItem::Manifest { body: expected_body, .. } => match actual_item {
                TypeSigItem::Manifest { body: actual_body, .. } => {
                    if !manifest_types_match(ctx, expected_body, actual_body) {
                        return Err(ElabError::NotASubtypeSynonym { name: name.clone(), span });
                    }
                }
                TypeSigItem::Abstract { .. } => {
                    return Err(ElabError::NotASubtypeTypeOpacity { name: name.clone(), span });
                }
            },
            TypeSigItem::Abstract { params, witness } => {
                let witness_ty = match actual_item {
                    TypeSigItem::Manifest { body, .. } => body.clone(),
                    TypeSigItem::Abstract { witness: actual_witness, params: actual_params } => {
                        Type::Data(DataTypeId::Opaque(*actual_witness), (0..*actual_params).map(|_| ctx.fresh_type_var()).collect())
                    }
                };
                witnesses.insert(*witness, (*params, witness_ty));
            }
        }
    }

    for (name, expected_sub) in &expected.submodules {
        let actual_sub = actual
            .submodules
            .get(name)
            .ok_or_else(|| ElabError::MissingRequiredModuleName { name: name.clone(), span })?;
        subtype_sig_record_into(ctx, actual_sub, expected_sub, span, witnesses)?;
    }

    Ok(())
}

/// Manifest-type equality is structural once both sides are expanded
/// through `ctx`: a required `int` and an offered `celsius` (a transparent
/// synonym over `int`) must match, so this resolves both bodies before
/// comparing rather than diffing the raw, possibly-synonym-headed `Type`
/// a signature item was decoded into.
fn manifest_types_match(ctx: &mut InferenceContext, a: &Type, b: &Type) -> bool {
    expand_fully(ctx, a.clone()) == expand_fully(ctx, b.clone())
}

/// Expands every synonym reachable from `ty`, not just a head-position
/// one — `ctx.resolve` only unwraps the outermost `Data(Synonym(..), ..)`
/// layer, so a synonym nested inside e.g. a function's domain needs its
/// own recursive walk.
fn expand_fully(ctx: &mut InferenceContext, ty: Type) -> Type {
    let ty = ctx.resolve(ty);
    match ty {
        Type::Scalar(_) | Type::Bound(_) | Type::Var(_) => ty,
        Type::Product(items) => Type::Product(items.into_iter().map(|t| expand_fully(ctx, t)).collect()),
        Type::Record(row) => Type::Record(expand_fully_row(ctx, row)),
        Type::Data(id, args) => Type::Data(id, args.into_iter().map(|t| expand_fully(ctx, t)).collect()),
        Type::Function(dom, ret) => {
            Type::Function(Box::new(expand_fully_domain(ctx, *dom)), Box::new(expand_fully(ctx, *ret)))
        }
        Type::Effectful(dom, eff, ret) => Type::Effectful(
            Box::new(expand_fully_domain(ctx, *dom)),
            Box::new(expand_fully(ctx, *eff)),
            Box::new(expand_fully(ctx, *ret)),
        ),
        Type::Pid(inner) => Type::Pid(Box::new(expand_fully(ctx, *inner))),
    }
}

fn expand_fully_domain(ctx: &mut InferenceContext, dom: Domain) -> Domain {
    Domain {
        ordered: dom.ordered.into_iter().map(|t| expand_fully(ctx, t)).collect(),
        mandatory: dom.mandatory.into_iter().map(|(k, t)| (k, expand_fully(ctx, t))).collect(),
        optional: expand_fully_row(ctx, dom.optional),
    }
}

fn expand_fully_row(ctx: &mut InferenceContext, row: Row) -> Row {
    let row = ctx.resolve_row(row);
    match row {
        Row::Fixed(labels) => Row::Fixed(labels.into_iter().map(|(k, t)| (k, expand_fully(ctx, t))).collect()),
        Row::Var(_) | Row::Bound(_) => row,
    }
}

/// Functor subtyping: the required parameter signature must accept
/// everything the actual parameter signature promises to provide
/// (contravariant), and the actual result must satisfy the required
/// result once instantiated against that same parameter (covariant).
pub fn subtype_functor(
    ctx: &mut InferenceContext,
    actual_param: &SigRecord,
    actual_result: &SigRecord,
    expected_param: &SigRecord,
    expected_result: &SigRecord,
    span: Span,
) -> ElabResult<WitnessMap> {
    subtype_sig_record(ctx, expected_param, actual_param, span)?;
    subtype_sig_record(ctx, actual_result, expected_result, span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hiveml_types::PolyType;

    #[test]
    fn a_polymorphic_identity_satisfies_a_monomorphic_requirement() {
        let mut ctx = InferenceContext::new();
        let a = ctx.ids.fresh_bound();
        let identity = PolyType {
            vars: vec![a],
            var_kinds: vec![],
            row_vars: vec![],
            body: Type::Function(
                Box::new(Domain { ordered: vec![Type::Bound(a)], mandatory: IndexMap::new(), optional: Row::Fixed(IndexMap::new()) }),
                Box::new(Type::Bound(a)),
            ),
        };
        let monomorphic_on_int = PolyType::monomorphic(Type::Function(
            Box::new(Domain { ordered: vec![Type::INT], mandatory: IndexMap::new(), optional: Row::Fixed(IndexMap::new()) }),
            Box::new(Type::INT),
        ));
        assert!(subtype_poly_type(&mut ctx, &identity, &monomorphic_on_int, Span::dummy()).is_ok());
    }

    #[test]
    fn a_monomorphic_function_does_not_satisfy_a_polymorphic_requirement() {
        let mut ctx = InferenceContext::new();
        let monomorphic_on_int = PolyType::monomorphic(Type::Function(
            Box::new(Domain { ordered: vec![Type::INT], mandatory: IndexMap::new(), optional: Row::Fixed(IndexMap::new()) }),
            Box::new(Type::INT),
        ));
        let a = ctx.ids.fresh_bound();
        let identity = PolyType {
            vars: vec![a],
            var_kinds: vec![],
            row_vars: vec![],
            body: Type::Function(
                Box::new(Domain { ordered: vec![Type::Bound(a)], mandatory: IndexMap::new(), optional: Row::Fixed(IndexMap::new()) }),
                Box::new(Type::Bound(a)),
            ),
        };
        let result = subtype_poly_type(&mut ctx, &monomorphic_on_int, &identity, Span::dummy());
        assert!(result.is_err());
    }

    #[test]
    fn missing_required_value_is_reported() {
        let mut ctx = InferenceContext::new();
        let actual = SigRecord::new();
        let expected = SigRecord::new().with_value("f", PolyType::monomorphic(Type::INT));
        let result = subtype_sig_record(&mut ctx, &actual, &expected, Span::dummy());
        assert!(matches!(result, Err(ElabError::MissingRequiredValName { .. })));
    }

    #[test]
    fn a_manifest_matches_another_manifest_expanding_to_the_same_type() {
        let mut ctx = InferenceContext::new();
        let id = ctx.ids.fresh_synonym();
        ctx.defs.register_synonym(id, hiveml_types::SynonymDef { name: "celsius".into(), params: vec![], body: Type::INT, module_path: vec![] });
        let celsius = Type::Data(DataTypeId::Synonym(id), vec![]);
        let actual = SigRecord::new().with_type("t", TypeSigItem::Manifest { params: 0, body: celsius });
        let expected = SigRecord::new().with_type("t", TypeSigItem::Manifest { params: 0, body: Type::INT });
        assert!(subtype_sig_record(&mut ctx, &actual, &expected, Span::dummy()).is_ok());
    }

    #[test]
    fn abstract_type_collects_a_witness_from_a_manifest() {
        let mut ctx = InferenceContext::new();
        let op = ctx.ids.fresh_opaque();
        let actual = SigRecord::new().with_type("t", TypeSigItem::Manifest { params: 0, body: Type::INT });
        let expected = SigRecord::new().with_type("t", TypeSigItem::Abstract { params: 0, witness: op });
        let witnesses = subtype_sig_record(&mut ctx, &actual, &expected, Span::dummy()).expect("manifest satisfies abstract");
        assert_eq!(witnesses.get(&op).map(|(_, ty)| ty.clone()), Some(Type::INT));
    }
}
