//! Component H: generalization and instantiation.
//!
//! `generalize` turns every still-free type/row variable minted at a
//! level deeper than the one it's asked to generalize at into a bound
//! quantifier; `instantiate` is its inverse, replacing each bound
//! quantifier with a fresh free variable at the current level. Together
//! they are the only place `Type::Var`/`Type::Bound` (and their row
//! counterparts) cross over.
//!
//! Before walking, `generalize` runs the same Tarjan-style cycle finder
//! `hiveml-env` uses for synonym dependencies (see [`crate::cycle`]) over
//! the graph of `Link` pointers reachable from the type being
//! generalized. A cycle here can only mean the union-find was corrupted
//! by a caller bypassing `unify`'s occurs-check (`unify` itself can
//! never produce one) — so it is reported rather than walked into an
//! infinite loop.

use std::collections::HashMap;

use hiveml_ids::{BoundId, BoundRowId, RowVarId, TypeVarId};

use crate::cycle;
use crate::kind::BaseKind;
use crate::store::{InferenceContext, RowVarCell, TypeVarCell};
use crate::ty::{Domain, Row, Type};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GeneralizeError {
    CyclicDependency(Vec<TypeVarId>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolyType {
    pub vars: Vec<BoundId>,
    /// The kind each entry in `vars` was generalized with, same length
    /// and order as `vars` — `instantiate` restores it on each fresh
    /// variable instead of always minting an unconstrained one. A
    /// `PolyType` built by hand outside `generalize` (a primitive's
    /// scheme, a test fixture) that leaves this shorter than `vars`
    /// is treated as `Universal` for the missing entries.
    pub var_kinds: Vec<BaseKind>,
    pub row_vars: Vec<BoundRowId>,
    pub body: Type,
}

impl PolyType {
    /// A poly type with no quantifiers: every occurrence of `ty` is
    /// monomorphic as written.
    pub fn monomorphic(ty: Type) -> Self {
        PolyType { vars: Vec::new(), var_kinds: Vec::new(), row_vars: Vec::new(), body: ty }
    }

    fn kind_of(&self, index: usize) -> BaseKind {
        self.var_kinds.get(index).cloned().unwrap_or(BaseKind::Universal)
    }
}

fn immediate_var_refs(ty: &Type, out: &mut Vec<TypeVarId>) {
    match ty {
        Type::Var(id) => out.push(*id),
        Type::Scalar(_) | Type::Bound(_) => {}
        Type::Product(items) => items.iter().for_each(|t| immediate_var_refs(t, out)),
        Type::Record(row) => immediate_row_var_refs(row, out),
        Type::Data(_, args) => args.iter().for_each(|t| immediate_var_refs(t, out)),
        Type::Function(dom, ret) => {
            immediate_domain_var_refs(dom, out);
            immediate_var_refs(ret, out);
        }
        Type::Effectful(dom, eff, ret) => {
            immediate_domain_var_refs(dom, out);
            immediate_var_refs(eff, out);
            immediate_var_refs(ret, out);
        }
        Type::Pid(inner) => immediate_var_refs(inner, out),
    }
}

fn immediate_domain_var_refs(dom: &Domain, out: &mut Vec<TypeVarId>) {
    dom.ordered.iter().for_each(|t| immediate_var_refs(t, out));
    dom.mandatory.values().for_each(|t| immediate_var_refs(t, out));
    immediate_row_var_refs(&dom.optional, out);
}

fn immediate_row_var_refs(row: &Row, out: &mut Vec<TypeVarId>) {
    if let Row::Fixed(labels) = row {
        labels.values().for_each(|t| immediate_var_refs(t, out));
    }
}

fn reachable_vars(ctx: &InferenceContext, ty: &Type, seen: &mut Vec<TypeVarId>) {
    let mut direct = Vec::new();
    immediate_var_refs(ty, &mut direct);
    for v in direct {
        if seen.contains(&v) {
            continue;
        }
        seen.push(v);
        if let TypeVarCell::Link(inner) = ctx.types.cell(v).clone() {
            reachable_vars(ctx, &inner, seen);
        }
    }
}

fn check_link_cycles(ctx: &InferenceContext, ty: &Type) -> Result<(), GeneralizeError> {
    let mut nodes = Vec::new();
    reachable_vars(ctx, ty, &mut nodes);
    let cycles = cycle::find_cycles(&nodes, |v| match ctx.types.cell(*v).clone() {
        TypeVarCell::Link(inner) => {
            let mut refs = Vec::new();
            immediate_var_refs(&inner, &mut refs);
            refs
        }
        _ => Vec::new(),
    });
    if let Some(cyc) = cycles.into_iter().next() {
        return Err(GeneralizeError::CyclicDependency(cyc));
    }
    Ok(())
}

struct Generalizer<'a> {
    ctx: &'a mut InferenceContext,
    level: u32,
    vars: HashMap<TypeVarId, BoundId>,
    row_vars: HashMap<RowVarId, BoundRowId>,
    order: Vec<BoundId>,
    kinds: Vec<BaseKind>,
    row_order: Vec<BoundRowId>,
}

impl<'a> Generalizer<'a> {
    fn walk(&mut self, ty: Type) -> Type {
        let ty = self.ctx.resolve(ty);
        match ty {
            Type::Var(id) => {
                let Some(level) = self.ctx.types.level_of(id) else {
                    return Type::Var(id);
                };
                if level <= self.level {
                    return Type::Var(id);
                }
                if let Some(bound) = self.vars.get(&id) {
                    return Type::Bound(*bound);
                }
                let kind = match self.ctx.types.cell(id).clone() {
                    TypeVarCell::Free { kind, .. } | TypeVarCell::MustBeBound { kind } => kind,
                    TypeVarCell::Link(_) => unreachable!("resolve already followed links"),
                };
                let bound = self.ctx.ids.fresh_bound();
                self.vars.insert(id, bound);
                self.order.push(bound);
                self.kinds.push(kind);
                Type::Bound(bound)
            }
            Type::Scalar(_) | Type::Bound(_) => ty,
            Type::Product(items) => Type::Product(items.into_iter().map(|t| self.walk(t)).collect()),
            Type::Record(row) => Type::Record(self.walk_row(row)),
            Type::Data(id, args) => Type::Data(id, args.into_iter().map(|t| self.walk(t)).collect()),
            Type::Function(dom, ret) => {
                let dom = self.walk_domain(*dom);
                let ret = self.walk(*ret);
                Type::Function(Box::new(dom), Box::new(ret))
            }
            Type::Effectful(dom, eff, ret) => {
                let dom = self.walk_domain(*dom);
                let eff = self.walk(*eff);
                let ret = self.walk(*ret);
                Type::Effectful(Box::new(dom), Box::new(eff), Box::new(ret))
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
        let row = self.ctx.resolve_row(row);
        match row {
            Row::Fixed(labels) => Row::Fixed(labels.into_iter().map(|(k, t)| (k, self.walk(t))).collect()),
            Row::Var(id) => {
                let Some(level) = self.ctx.types.row_level_of(id) else {
                    return Row::Var(id);
                };
                if level <= self.level {
                    return Row::Var(id);
                }
                if let Some(bound) = self.row_vars.get(&id) {
                    return Row::Bound(*bound);
                }
                let bound = self.ctx.ids.fresh_bound_row();
                self.row_vars.insert(id, bound);
                self.row_order.push(bound);
                Row::Bound(bound)
            }
            Row::Bound(id) => Row::Bound(id),
        }
    }
}

pub fn generalize(ctx: &mut InferenceContext, level: u32, ty: Type) -> Result<PolyType, GeneralizeError> {
    check_link_cycles(ctx, &ty)?;
    let mut gen = Generalizer {
        ctx,
        level,
        vars: HashMap::new(),
        row_vars: HashMap::new(),
        order: Vec::new(),
        kinds: Vec::new(),
        row_order: Vec::new(),
    };
    let body = gen.walk(ty);
    Ok(PolyType { vars: gen.order, var_kinds: gen.kinds, row_vars: gen.row_order, body })
}

struct Instantiator<'a> {
    ctx: &'a mut InferenceContext,
    vars: HashMap<BoundId, Type>,
    row_vars: HashMap<BoundRowId, Row>,
}

impl<'a> Instantiator<'a> {
    fn walk(&mut self, ty: Type) -> Type {
        match ty {
            Type::Bound(id) => self
                .vars
                .get(&id)
                .cloned()
                .unwrap_or_else(|| panic!("instantiate: bound var {id:?} not in quantifier list")),
            Type::Var(id) => Type::Var(id),
            Type::Scalar(_) => ty,
            Type::Product(items) => Type::Product(items.into_iter().map(|t| self.walk(t)).collect()),
            Type::Record(row) => Type::Record(self.walk_row(row)),
            Type::Data(id, args) => Type::Data(id, args.into_iter().map(|t| self.walk(t)).collect()),
            Type::Function(dom, ret) => {
                let dom = self.walk_domain(*dom);
                let ret = self.walk(*ret);
                Type::Function(Box::new(dom), Box::new(ret))
            }
            Type::Effectful(dom, eff, ret) => {
                let dom = self.walk_domain(*dom);
                let eff = self.walk(*eff);
                let ret = self.walk(*ret);
                Type::Effectful(Box::new(dom), Box::new(eff), Box::new(ret))
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
            Row::Bound(id) => self
                .row_vars
                .get(&id)
                .cloned()
                .unwrap_or_else(|| panic!("instantiate: bound row {id:?} not in quantifier list")),
            Row::Var(id) => Row::Var(id),
            Row::Fixed(labels) => Row::Fixed(labels.into_iter().map(|(k, t)| (k, self.walk(t))).collect()),
        }
    }
}

pub fn instantiate(ctx: &mut InferenceContext, poly: &PolyType) -> Type {
    let vars = poly
        .vars
        .iter()
        .enumerate()
        .map(|(i, &bound)| (bound, ctx.fresh_type_var_with_kind(poly.kind_of(i))))
        .collect::<HashMap<_, _>>();
    let row_vars = poly
        .row_vars
        .iter()
        .map(|&bound| (bound, ctx.fresh_row_var()))
        .collect::<HashMap<_, _>>();
    let mut inst = Instantiator { ctx, vars, row_vars };
    inst.walk(poly.body.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unify::unify;

    #[test]
    fn generalize_then_instantiate_round_trips_structure() {
        let mut ctx = InferenceContext::new();
        ctx.enter_level();
        let v = ctx.fresh_type_var();
        let identity = Type::Function(
            Box::new(Domain { ordered: vec![v.clone()], mandatory: Default::default(), optional: Row::Fixed(Default::default()) }),
            Box::new(v),
        );
        let poly = generalize(&mut ctx, 0, identity).expect("no cycle");
        assert_eq!(poly.vars.len(), 1, "the single free var should be generalized into one quantifier");

        let a = instantiate(&mut ctx, &poly);
        let b = instantiate(&mut ctx, &poly);
        // Two instantiations must be unifiable with each other (same shape)
        // but must not be the *same* variable.
        assert_eq!(unify(&mut ctx, a.clone(), b.clone()), crate::unify::UnifyResult::Consistent);
    }

    #[test]
    fn variables_at_or_above_the_generalization_level_stay_free() {
        let mut ctx = InferenceContext::new();
        // current_level is 0; a var minted here is not deeper than level 0.
        let v = ctx.fresh_type_var();
        let poly = generalize(&mut ctx, 0, v.clone()).expect("no cycle");
        assert!(poly.vars.is_empty());
        assert_eq!(poly.body, v);
    }

    #[test]
    fn link_cycle_is_rejected_instead_of_looping() {
        let mut ctx = InferenceContext::new();
        let a = ctx.types.new_type_var(&mut ctx.ids, 1);
        let b = ctx.types.new_type_var(&mut ctx.ids, 1);
        // A corrupted store: a -> Pid(b), b -> Pid(a). `unify` could never
        // produce this because of its occurs-check.
        *ctx.types.cell_mut(a) = TypeVarCell::Link(Type::Pid(Box::new(Type::Var(b))));
        *ctx.types.cell_mut(b) = TypeVarCell::Link(Type::Pid(Box::new(Type::Var(a))));
        let result = generalize(&mut ctx, 0, Type::Var(a));
        assert!(matches!(result, Err(GeneralizeError::CyclicDependency(_))));
    }
}
