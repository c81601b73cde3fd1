//! Component J: the expression and pattern checker.
//!
//! Walks the surface [`Expr`]/[`Pattern`] AST, producing both a [`Type`]
//! (the checked type) and an [`IExpr`] (what the code generator consumes).
//! The "effect" — the receive type of the enclosing process — is never
//! stored in a mutable checker struct; it is threaded as a plain `&Type`
//! argument, rebound only at a `spawn` boundary, so two independently
//! scoped checks (the spawned body vs. its surrounding expression) never
//! fight over a shared borrow.

use indexmap::IndexMap;

use hiveml_common::{Diagnostic, Span};
use hiveml_env::Environment;
use hiveml_ids::{LocalName, ResolvedName};
use hiveml_syntax::{CallArgs, Expr, Labeled, Literal, Params, Pattern, Spanned};
use hiveml_types::{
    generalize, instantiate, unify, unify_row, CtorDef, Domain, GeneralizeError, InferenceContext, PolyType, Row,
    Type, UnifyResult, VariantDef,
};

use hiveml_common::limits::MAX_EXPR_CHECK_DEPTH;
use hiveml_common::limits::MAX_ROW_LABELS;

use crate::decode::{decode_type, DecodeDeps, TypeParamScope};
use crate::error::{ElabError, ElabResult};
use crate::ir::{IArgs, IBaseConst, IBranch, IExpr, IName, IOptionalParam, IParams, IPattern};
use crate::primitives::{format_type, frozen_type, list_type, option_type, WellKnownIds};

/// Everything about the checking session that doesn't change as we
/// recurse into sub-scopes: the mutable inference store, the well-known
/// primitive IDs, and the binder's rigid type parameters (if any — empty
/// for a top-level `val` binding with no `external` annotation in scope).
pub struct Checker<'a> {
    pub ctx: &'a mut InferenceContext,
    pub ids: WellKnownIds,
    pub type_params: TypeParamScope,
}

/// Names bound by a pattern, in the order their binding `Pattern::Var`
/// node was encountered, used both to reject a name bound twice in one
/// pattern and to bind each name into the environment once the pattern's
/// type is known in full.
type BindingMap = IndexMap<String, (Type, LocalName, Span)>;

pub(crate) fn unify_checked(ctx: &mut InferenceContext, actual: Type, expected: Type, span: Span) -> ElabResult<()> {
    match unify(ctx, actual.clone(), expected.clone()) {
        UnifyResult::Consistent => Ok(()),
        UnifyResult::Contradiction => Err(ElabError::ContradictionError { actual, expected, span }),
        UnifyResult::Inclusion(fid) => Err(ElabError::InclusionError { fid, actual, expected, span }),
        UnifyResult::InclusionRow(frid) => Err(ElabError::InclusionRowError { frid, span }),
    }
}

fn unify_row_checked(ctx: &mut InferenceContext, actual: Row, expected: Row, span: Span) -> ElabResult<()> {
    match unify_row(ctx, actual, expected) {
        UnifyResult::Consistent => Ok(()),
        UnifyResult::Contradiction => Err(ElabError::KindContradiction { span }),
        UnifyResult::Inclusion(fid) => Err(ElabError::InclusionError { fid, actual: Type::UNIT, expected: Type::UNIT, span }),
        UnifyResult::InclusionRow(frid) => Err(ElabError::InclusionRowError { frid, span }),
    }
}

fn check_depth(depth: u32, span: Span) -> ElabResult<()> {
    if depth > MAX_EXPR_CHECK_DEPTH {
        return Err(ElabError::ExpressionNestedTooDeep { span });
    }
    Ok(())
}

fn check_row_label_count(len: usize, span: Span) -> ElabResult<()> {
    if len > MAX_ROW_LABELS {
        return Err(ElabError::TooManyRowLabels { span });
    }
    Ok(())
}

fn base_const(cx: &mut Checker, lit: &Literal, span: Span) -> ElabResult<(Type, IBaseConst)> {
    Ok(match lit {
        Literal::Unit => (Type::UNIT, IBaseConst::Unit),
        Literal::Bool(b) => (Type::BOOL, IBaseConst::Bool(*b)),
        Literal::Int(i) => (Type::INT, IBaseConst::Int(*i)),
        Literal::Float(f) => (Type::FLOAT, IBaseConst::Float(f.to_bits())),
        Literal::Char(c) => (Type::CHAR, IBaseConst::Char(*c)),
        Literal::Binary(b) => (Type::BINARY, IBaseConst::Binary(b.clone())),
        Literal::Format(s) => {
            let holes = format_hole_types(cx, s, span)?;
            let holes_ty = if holes.is_empty() { Type::UNIT } else { Type::product(holes) };
            (format_type(cx.ids, holes_ty), IBaseConst::Format(s.clone()))
        }
    })
}

/// Derives the hole types of a format-string literal: `%c` -> char,
/// `%f`/`%e`/`%g` -> float, `%s` -> a list of char, `%p`/`%w` -> a fresh
/// unconstrained variable (the hole accepts anything printable), `%%` is
/// an escaped literal percent and contributes no hole.
fn format_hole_types(cx: &mut Checker, s: &str, span: Span) -> ElabResult<Vec<Type>> {
    let mut holes = Vec::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            continue;
        }
        match chars.next() {
            Some('%') => {}
            Some('c') => holes.push(Type::CHAR),
            Some('f') | Some('e') | Some('g') => holes.push(Type::FLOAT),
            Some('s') => holes.push(list_type(cx.ids, Type::CHAR)),
            Some('p') | Some('w') => holes.push(cx.ctx.fresh_type_var()),
            Some(other) => return Err(ElabError::InvalidFormatSpecifier { found: other, span }),
            None => return Err(ElabError::InvalidFormatSpecifier { found: '%', span }),
        }
    }
    Ok(holes)
}

fn ctor_poly_type(variant: &VariantDef, ctor: &CtorDef, owner: hiveml_ids::VariantId) -> PolyType {
    let args: Vec<Type> = variant.params.iter().map(|&b| Type::Bound(b)).collect();
    let result = Type::Data(hiveml_types::DataTypeId::Variant(owner), args);
    let body = if ctor.params.is_empty() {
        result
    } else {
        Type::Function(
            Box::new(Domain { ordered: ctor.params.clone(), mandatory: IndexMap::new(), optional: Row::Fixed(IndexMap::new()) }),
            Box::new(result),
        )
    };
    PolyType { vars: variant.params.clone(), var_kinds: Vec::new(), row_vars: Vec::new(), body }
}

pub(crate) fn map_cycle(cyc: Vec<hiveml_ids::TypeVarId>, span: Span) -> ElabError {
    ElabError::CyclicTypeParameter { names: cyc.iter().map(|id| format!("{id:?}")).collect(), span }
}

/// Turns a pattern that appears directly in parameter position into the
/// single `LocalName` slot the IR needs there. A plain variable or
/// wildcard needs no further work; a composite pattern (a tuple,
/// constructor, etc.) gets a synthetic local and a destructuring wrapper
/// the caller must fold around the lambda body, innermost-pattern last.
fn param_local(cx: &mut Checker, ip: &IPattern, wrappers: &mut Vec<(LocalName, IPattern)>) -> LocalName {
    match ip {
        IPattern::Var(l) => *l,
        IPattern::Wildcard => cx.ctx.ids.fresh_local_name(),
        other => {
            let l = cx.ctx.ids.fresh_local_name();
            wrappers.push((l, other.clone()));
            l
        }
    }
}

fn wrap_destructuring(mut body: IExpr, wrappers: Vec<(LocalName, IPattern)>) -> IExpr {
    for (local, pattern) in wrappers.into_iter().rev() {
        body = IExpr::ICase {
            scrutinee: Box::new(IExpr::IVar(IName::Local(local))),
            branches: vec![IBranch { pattern, body }],
        };
    }
    body
}

struct CheckedParams {
    domain: Domain,
    iparams: IParams,
    wrappers: Vec<(LocalName, IPattern)>,
}

fn check_params(
    cx: &mut Checker,
    env: &mut Environment,
    diagnostics: &mut Vec<Diagnostic>,
    depth: u32,
    params: &Params,
) -> ElabResult<CheckedParams> {
    let mut bindings = BindingMap::new();
    let mut wrappers = Vec::new();

    let mut ordered_ty = Vec::new();
    let mut ordered_local = Vec::new();
    for pat in &params.ordered {
        let (t, ip) = infer_pattern(cx, env, &mut bindings, pat)?;
        ordered_ty.push(t);
        ordered_local.push(param_local(cx, &ip, &mut wrappers));
    }

    let mut mandatory_ty = IndexMap::new();
    let mut mandatory_local = IndexMap::new();
    for Labeled { label, value: pat } in &params.mandatory {
        if mandatory_ty.contains_key(label) {
            return Err(ElabError::DuplicatedLabel { label: label.clone(), span: pat.span });
        }
        let (t, ip) = infer_pattern(cx, env, &mut bindings, pat)?;
        mandatory_ty.insert(label.clone(), t);
        mandatory_local.insert(label.clone(), param_local(cx, &ip, &mut wrappers));
    }

    let mut optional_ty = IndexMap::new();
    let mut ioptional = Vec::new();
    for opt in &params.optional {
        if optional_ty.contains_key(&opt.label) {
            return Err(ElabError::DuplicatedLabel { label: opt.label.clone(), span: opt.pattern.span });
        }
        let inner_ty = cx.ctx.fresh_type_var();
        let (bound_ty, default_ty_ir) = match &opt.default {
            Some(def_expr) => {
                let fresh_tv = cx.ctx.fresh_type_var();
                let (dty, _deff, dir) = infer_expr(cx, env, &fresh_tv, diagnostics, depth + 1, def_expr)?;
                unify_checked(cx.ctx, dty, inner_ty.clone(), def_expr.span)?;
                (inner_ty.clone(), Some(dir))
            }
            None => (option_type(cx.ids, inner_ty.clone()), None),
        };
        optional_ty.insert(opt.label.clone(), inner_ty);
        let (pty, ip) = infer_pattern(cx, env, &mut bindings, &opt.pattern)?;
        unify_checked(cx.ctx, pty, bound_ty, opt.pattern.span)?;
        let local = param_local(cx, &ip, &mut wrappers);
        ioptional.push(IOptionalParam { label: opt.label.clone(), name: local, default: default_ty_ir });
    }

    for (name, (t, local, span)) in &bindings {
        env.bind(name.clone(), PolyType::monomorphic(t.clone()), *span, ResolvedName::Local(*local));
    }

    Ok(CheckedParams {
        domain: Domain { ordered: ordered_ty, mandatory: mandatory_ty, optional: Row::Fixed(optional_ty) },
        iparams: IParams { ordered: ordered_local, mandatory: mandatory_local, optional: ioptional },
        wrappers,
    })
}

/// Shared by a plain `Expr::Lambda` (where `forced_self` is `None`, a
/// fresh self local is minted only if the surface syntax names one) and
/// `letrec` (which forces the IR's self-reference slot to the letrec's
/// own binder, so a recursive call resolves to the same closure without
/// a second indirection).
pub(crate) fn check_lambda(
    cx: &mut Checker,
    env: &mut Environment,
    effect: &Type,
    diagnostics: &mut Vec<Diagnostic>,
    depth: u32,
    self_name: &Option<String>,
    params: &Params,
    body: &Spanned<Expr>,
    span: Span,
    forced_self: Option<LocalName>,
) -> ElabResult<(Type, bool, IExpr)> {
    env.push_scope();
    let checked = check_params(cx, env, diagnostics, depth, params)?;
    let ret0 = cx.ctx.fresh_type_var();
    let self_local = forced_self.unwrap_or_else(|| cx.ctx.ids.fresh_local_name());
    let names_self = forced_self.is_some() || self_name.is_some();
    if names_self {
        let self_ty = Type::Function(Box::new(checked.domain.clone()), Box::new(ret0.clone()));
        if let Some(sname) = self_name {
            env.bind(sname.clone(), PolyType::monomorphic(self_ty), span, ResolvedName::Local(self_local));
        }
    }

    let (bty, beff, body_ir) = infer_expr(cx, env, effect, diagnostics, depth + 1, body)?;
    unify_checked(cx.ctx, bty, ret0.clone(), body.span)?;
    let body_ir = wrap_destructuring(body_ir, checked.wrappers);

    let unused = env.pop_scope();
    for (name, uspan) in unused {
        diagnostics.push(Diagnostic::warning(uspan, format!("unused binding `{name}`")));
    }

    let fn_ty = if beff {
        Type::Effectful(Box::new(checked.domain), Box::new(effect.clone()), Box::new(ret0))
    } else {
        Type::Function(Box::new(checked.domain), Box::new(ret0))
    };
    let self_name_out = if names_self { Some(self_local) } else { None };
    Ok((fn_ty, false, IExpr::ILambda { self_name: self_name_out, params: checked.iparams, body: Box::new(body_ir) }))
}

/// Checks call arguments against a domain already known (the callee's
/// decoded or previously inferred type). Ordered arity must match
/// exactly; mandatory labels must match the declared key set exactly;
/// optional labels may be a subset of a closed declared row, or may
/// extend a still-free optional row (the callee's own type was itself
/// inferred from its body, not decoded from an annotation).
fn check_call_args(
    cx: &mut Checker,
    env: &mut Environment,
    effect: &Type,
    diagnostics: &mut Vec<Diagnostic>,
    depth: u32,
    args: &CallArgs,
    domain: Domain,
    call_span: Span,
) -> ElabResult<(IArgs, bool)> {
    if args.ordered.len() != domain.ordered.len() {
        return Err(ElabError::BadArityOfOrderedArguments { expected: domain.ordered.len(), found: args.ordered.len(), span: call_span });
    }
    let mut eff = false;
    let mut ordered_ir = Vec::new();
    for (a, expected) in args.ordered.iter().zip(domain.ordered.into_iter()) {
        let (t, e, ir) = infer_expr(cx, env, effect, diagnostics, depth + 1, a)?;
        eff |= e;
        unify_checked(cx.ctx, t, expected, a.span)?;
        ordered_ir.push(ir);
    }

    let mut mandatory_ir = IndexMap::new();
    let mut remaining_mandatory = domain.mandatory;
    for Labeled { label, value } in &args.mandatory {
        let Some(expected) = remaining_mandatory.shift_remove(label) else {
            return Err(ElabError::UnexpectedMandatoryLabel { label: label.clone(), span: value.span });
        };
        let (t, e, ir) = infer_expr(cx, env, effect, diagnostics, depth + 1, value)?;
        eff |= e;
        unify_checked(cx.ctx, t, expected, value.span)?;
        mandatory_ir.insert(label.clone(), ir);
    }
    if let Some((label, _)) = remaining_mandatory.into_iter().next() {
        return Err(ElabError::MissingMandatoryLabel { label, span: call_span });
    }

    check_row_label_count(args.optional.len(), call_span)?;
    let resolved_optional = cx.ctx.resolve_row(domain.optional);
    let mut optional_ir = IndexMap::new();
    match resolved_optional {
        Row::Fixed(declared) => {
            let mut remaining = declared;
            for Labeled { label, value } in &args.optional {
                let Some(expected) = remaining.shift_remove(label) else {
                    return Err(ElabError::UnexpectedOptionalLabel { label: label.clone(), span: value.span });
                };
                let (t, e, ir) = infer_expr(cx, env, effect, diagnostics, depth + 1, value)?;
                eff |= e;
                unify_checked(cx.ctx, t, expected, value.span)?;
                optional_ir.insert(label.clone(), ir);
            }
        }
        Row::Var(rid) => {
            let mut extension = IndexMap::new();
            for Labeled { label, value } in &args.optional {
                if extension.contains_key(label) {
                    return Err(ElabError::DuplicatedLabel { label: label.clone(), span: value.span });
                }
                let (t, e, ir) = infer_expr(cx, env, effect, diagnostics, depth + 1, value)?;
                eff |= e;
                extension.insert(label.clone(), t);
                optional_ir.insert(label.clone(), ir);
            }
            unify_row_checked(cx.ctx, Row::Var(rid), Row::Fixed(extension), call_span)?;
        }
        Row::Bound(_) => unreachable!("a concrete call-site domain never carries a bound row quantifier"),
    }

    Ok((IArgs { ordered: ordered_ir, mandatory: mandatory_ir, optional: optional_ir }, eff))
}

/// The callee's type wasn't already known to be a function (a genuinely
/// unconstrained variable): builds a domain directly from the shape of
/// the actual arguments and unifies the callee against it.
fn apply_unknown(
    cx: &mut Checker,
    env: &mut Environment,
    effect: &Type,
    diagnostics: &mut Vec<Diagnostic>,
    depth: u32,
    callee_ty: Type,
    callee_span: Span,
    args: &CallArgs,
) -> ElabResult<(Type, IArgs, bool)> {
    let mut eff = false;
    let mut ordered_ty = Vec::new();
    let mut ordered_ir = Vec::new();
    for a in &args.ordered {
        let (t, e, ir) = infer_expr(cx, env, effect, diagnostics, depth + 1, a)?;
        eff |= e;
        ordered_ty.push(t);
        ordered_ir.push(ir);
    }
    let mut mandatory_ty = IndexMap::new();
    let mut mandatory_ir = IndexMap::new();
    for Labeled { label, value } in &args.mandatory {
        if mandatory_ty.contains_key(label) {
            return Err(ElabError::DuplicatedLabel { label: label.clone(), span: value.span });
        }
        let (t, e, ir) = infer_expr(cx, env, effect, diagnostics, depth + 1, value)?;
        eff |= e;
        mandatory_ty.insert(label.clone(), t);
        mandatory_ir.insert(label.clone(), ir);
    }
    let mut optional_ty = IndexMap::new();
    let mut optional_ir = IndexMap::new();
    for Labeled { label, value } in &args.optional {
        if optional_ty.contains_key(label) {
            return Err(ElabError::DuplicatedLabel { label: label.clone(), span: value.span });
        }
        let (t, e, ir) = infer_expr(cx, env, effect, diagnostics, depth + 1, value)?;
        eff |= e;
        optional_ty.insert(label.clone(), t);
        optional_ir.insert(label.clone(), ir);
    }
    let domain = Domain { ordered: ordered_ty, mandatory: mandatory_ty, optional: Row::Fixed(optional_ty) };
    let ret = cx.ctx.fresh_type_var();
    let fn_ty = Type::Function(Box::new(domain), Box::new(ret.clone()));
    unify_checked(cx.ctx, callee_ty, fn_ty, callee_span)?;
    Ok((ret, IArgs { ordered: ordered_ir, mandatory: mandatory_ir, optional: optional_ir }, eff))
}

/// Turns an already-elaborated callee expression into the single `IName`
/// `IApply` needs, hoisting it into a `let` first if it isn't already a
/// bare variable reference (e.g. the callee of `(fun (x) -> x)(1)`).
fn as_iname(cx: &mut Checker, ir: IExpr) -> (IName, Option<(LocalName, IExpr)>) {
    if let IExpr::IVar(name) = ir {
        (name, None)
    } else {
        let local = cx.ctx.ids.fresh_local_name();
        (IName::Local(local), Some((local, ir)))
    }
}

fn wrap_prelude(prelude: Option<(LocalName, IExpr)>, body: IExpr) -> IExpr {
    match prelude {
        Some((name, value)) => IExpr::ILetIn { name, value: Box::new(value), body: Box::new(body) },
        None => body,
    }
}

pub fn infer_expr(
    cx: &mut Checker,
    env: &mut Environment,
    effect: &Type,
    diagnostics: &mut Vec<Diagnostic>,
    depth: u32,
    expr: &Spanned<Expr>,
) -> ElabResult<(Type, bool, IExpr)> {
    check_depth(depth, expr.span)?;
    match &expr.node {
        Expr::Lit(lit) => {
            let (t, c) = base_const(cx, lit, expr.span)?;
            Ok((t, false, IExpr::IBaseConst(c)))
        }

        Expr::Var(name) => {
            let binding = env.lookup(name).ok_or_else(|| ElabError::UnboundVariable { name: name.clone(), span: expr.span })?;
            let resolved = binding.resolved;
            let ty = instantiate(cx.ctx, &binding.scheme);
            Ok((ty, false, IExpr::IVar(resolved)))
        }

        Expr::ModuleVar(path, name) => {
            // The module elaborator binds every exposed member under both
            // its bare name and its path-qualified name (see
            // `crate::module::qualify`); the qualified one only differs
            // when two in-scope structures expose the same field name
            // (e.g. two functor parameters sealed against the same
            // signature), so prefer it and fall back to the bare name.
            let qualified = crate::module::qualify(path, name);
            let binding = env
                .lookup(&qualified)
                .or_else(|| env.lookup(name))
                .ok_or_else(|| ElabError::UnboundVariable { name: qualified.clone(), span: expr.span })?;
            let resolved = binding.resolved;
            let ty = instantiate(cx.ctx, &binding.scheme);
            Ok((ty, false, IExpr::IVar(resolved)))
        }

        Expr::Annot(inner, ty) => {
            let mut deps = DecodeDeps::default();
            let decoded = decode_type(cx.ctx, env, &cx.type_params, &mut deps, ty)?;
            let (ity, ieff, iir) = infer_expr(cx, env, effect, diagnostics, depth + 1, inner)?;
            unify_checked(cx.ctx, ity, decoded.clone(), expr.span)?;
            Ok((decoded, ieff, iir))
        }

        Expr::Lambda { self_name, params, body } => {
            check_lambda(cx, env, effect, diagnostics, depth, self_name, params, body, expr.span, None)
        }

        Expr::Apply(callee, args) => {
            let (callee_ty, ceff, callee_ir) = infer_expr(cx, env, effect, diagnostics, depth + 1, callee)?;
            let resolved = cx.ctx.resolve(callee_ty);
            let (result_ty, iargs, aeff) = match resolved {
                Type::Function(dom, ret) => {
                    let (iargs, e) = check_call_args(cx, env, effect, diagnostics, depth, args, *dom, expr.span)?;
                    (*ret, iargs, e)
                }
                Type::Effectful(dom, eff_ty, ret) => {
                    unify_checked(cx.ctx, *eff_ty, effect.clone(), expr.span)?;
                    let (iargs, e) = check_call_args(cx, env, effect, diagnostics, depth, args, *dom, expr.span)?;
                    (*ret, iargs, true || e)
                }
                other => apply_unknown(cx, env, effect, diagnostics, depth, other, callee.span, args)?,
            };
            let (name, prelude) = as_iname(cx, callee_ir);
            let applied = IExpr::IApply(name, iargs);
            Ok((result_ty, ceff || aeff, wrap_prelude(prelude, applied)))
        }

        Expr::If(c, t, e) => {
            let (cty, ceff, cir) = infer_expr(cx, env, effect, diagnostics, depth + 1, c)?;
            unify_checked(cx.ctx, cty, Type::BOOL, c.span)?;
            let (tty, teff, tir) = infer_expr(cx, env, effect, diagnostics, depth + 1, t)?;
            let (ety, eeff, eir) = infer_expr(cx, env, effect, diagnostics, depth + 1, e)?;
            unify_checked(cx.ctx, ety, tty.clone(), e.span)?;
            Ok((
                tty,
                ceff || teff || eeff,
                IExpr::ICase {
                    scrutinee: Box::new(cir),
                    branches: vec![
                        IBranch { pattern: IPattern::BaseConst(IBaseConst::Bool(true)), body: tir },
                        IBranch { pattern: IPattern::BaseConst(IBaseConst::Bool(false)), body: eir },
                    ],
                },
            ))
        }

        Expr::Let { name, value, body } => {
            cx.ctx.enter_level();
            let (vty, veff, vir) = infer_expr(cx, env, effect, diagnostics, depth + 1, value)?;
            cx.ctx.exit_level();
            let resolved_vty = cx.ctx.resolve(vty);
            let poly = generalize(cx.ctx, cx.ctx.current_level, resolved_vty)
                .map_err(|GeneralizeError::CyclicDependency(cyc)| map_cycle(cyc, expr.span))?;
            let local = cx.ctx.ids.fresh_local_name();
            env.push_scope();
            env.bind(name.clone(), poly, expr.span, ResolvedName::Local(local));
            let (bty, beff, bir) = infer_expr(cx, env, effect, diagnostics, depth + 1, body)?;
            let unused = env.pop_scope();
            for (uname, uspan) in unused {
                diagnostics.push(Diagnostic::warning(uspan, format!("unused binding `{uname}`")));
            }
            Ok((bty, veff || beff, IExpr::ILetIn { name: local, value: Box::new(vir), body: Box::new(bir) }))
        }

        Expr::LetRec { bindings, body } => {
            env.push_scope();
            cx.ctx.enter_level();
            let mut placeholders = Vec::new();
            let mut locals = Vec::new();
            for (name, _) in bindings {
                let ph = cx.ctx.fresh_type_var();
                let local = cx.ctx.ids.fresh_local_name();
                env.bind(name.clone(), PolyType::monomorphic(ph.clone()), expr.span, ResolvedName::Local(local));
                placeholders.push(ph);
                locals.push(local);
            }
            let mut value_irs = Vec::new();
            let mut any_eff = false;
            for ((name, value_expr), (ph, local)) in bindings.iter().zip(placeholders.iter().zip(locals.iter())) {
                let Expr::Lambda { self_name, params, body: lbody } = &value_expr.node else {
                    return Err(ElabError::LetRecBindingMustBeAFunction { name: name.clone(), span: value_expr.span });
                };
                let (vty, veff, vir) =
                    check_lambda(cx, env, effect, diagnostics, depth + 1, self_name, params, lbody, value_expr.span, Some(*local))?;
                any_eff |= veff;
                unify_checked(cx.ctx, vty, ph.clone(), value_expr.span)?;
                value_irs.push(vir);
            }
            cx.ctx.exit_level();
            for ((name, _), (ph, local)) in bindings.iter().zip(placeholders.iter().zip(locals.iter())) {
                let resolved_ty = cx.ctx.resolve(ph.clone());
                let poly = generalize(cx.ctx, cx.ctx.current_level, resolved_ty)
                    .map_err(|GeneralizeError::CyclicDependency(cyc)| map_cycle(cyc, expr.span))?;
                env.bind(name.clone(), poly, expr.span, ResolvedName::Local(*local));
            }
            let (bty, beff, bir) = infer_expr(cx, env, effect, diagnostics, depth + 1, body)?;
            let unused = env.pop_scope();
            for (uname, uspan) in unused {
                diagnostics.push(Diagnostic::warning(uspan, format!("unused binding `{uname}`")));
            }
            let mut final_ir = bir;
            for (local, vir) in locals.into_iter().zip(value_irs).rev() {
                final_ir = IExpr::ILetIn { name: local, value: Box::new(vir), body: Box::new(final_ir) };
            }
            Ok((bty, any_eff || beff, final_ir))
        }

        Expr::Tuple(items) => {
            let mut tys = Vec::new();
            let mut irs = Vec::new();
            let mut eff = false;
            for it in items {
                let (t, e, ir) = infer_expr(cx, env, effect, diagnostics, depth + 1, it)?;
                eff |= e;
                tys.push(t);
                irs.push(ir);
            }
            Ok((Type::product(tys), eff, IExpr::ITuple(irs)))
        }

        Expr::ListNil => {
            let elem = cx.ctx.fresh_type_var();
            Ok((list_type(cx.ids, elem), false, IExpr::IListNil))
        }

        Expr::ListCons(h, t) => {
            let (hty, heff, hir) = infer_expr(cx, env, effect, diagnostics, depth + 1, h)?;
            let (tty, teff, tir) = infer_expr(cx, env, effect, diagnostics, depth + 1, t)?;
            unify_checked(cx.ctx, tty, list_type(cx.ids, hty.clone()), t.span)?;
            Ok((list_type(cx.ids, hty), heff || teff, IExpr::IListCons(Box::new(hir), Box::new(tir))))
        }

        Expr::RecordLit(fields) => {
            check_row_label_count(fields.len(), expr.span)?;
            let mut map = IndexMap::new();
            let mut imap = IndexMap::new();
            let mut eff = false;
            for Labeled { label, value } in fields {
                if map.contains_key(label) {
                    return Err(ElabError::DuplicatedLabel { label: label.clone(), span: value.span });
                }
                let (t, e, ir) = infer_expr(cx, env, effect, diagnostics, depth + 1, value)?;
                eff |= e;
                map.insert(label.clone(), t);
                imap.insert(label.clone(), ir);
            }
            Ok((Type::Record(Row::Fixed(map)), eff, IExpr::IRecord(imap)))
        }

        Expr::RecordAccess(obj, label) => {
            let (oty, oeff, oir) = infer_expr(cx, env, effect, diagnostics, depth + 1, obj)?;
            let field_ty = cx.ctx.fresh_type_var();
            let mut required = IndexMap::new();
            required.insert(label.clone(), field_ty.clone());
            let kinded = cx.ctx.fresh_type_var_with_record_kind(required);
            unify_checked(cx.ctx, oty, kinded, expr.span)?;
            Ok((field_ty, oeff, IExpr::IRecordAccess(Box::new(oir), label.clone())))
        }

        Expr::RecordUpdate(obj, fields) => {
            check_row_label_count(fields.len(), expr.span)?;
            let (oty, mut eff, oir) = infer_expr(cx, env, effect, diagnostics, depth + 1, obj)?;
            let mut required = IndexMap::new();
            let mut ifields = IndexMap::new();
            for Labeled { label, value } in fields {
                if required.contains_key(label) {
                    return Err(ElabError::DuplicatedLabel { label: label.clone(), span: value.span });
                }
                let (t, e, ir) = infer_expr(cx, env, effect, diagnostics, depth + 1, value)?;
                eff |= e;
                required.insert(label.clone(), t);
                ifields.insert(label.clone(), ir);
            }
            let kinded = cx.ctx.fresh_type_var_with_record_kind(required);
            unify_checked(cx.ctx, oty.clone(), kinded, expr.span)?;
            Ok((oty, eff, IExpr::IRecordUpdate(Box::new(oir), ifields)))
        }

        Expr::Constructor(name, args) => {
            let owner = env.lookup_ctor(name).ok_or_else(|| ElabError::UndefinedConstructor { name: name.clone(), span: expr.span })?;
            let variant = cx.ctx.defs.variant(owner).clone();
            let ctor = cx
                .ctx
                .defs
                .ctor(owner, name)
                .cloned()
                .ok_or_else(|| ElabError::UndefinedConstructor { name: name.clone(), span: expr.span })?;
            if ctor.params.len() != args.len() {
                return Err(ElabError::InvalidNumberOfConstructorArguments {
                    name: name.clone(),
                    expected: ctor.params.len(),
                    found: args.len(),
                    span: expr.span,
                });
            }
            let poly = ctor_poly_type(&variant, &ctor, owner);
            let instantiated = instantiate(cx.ctx, &poly);
            let (param_types, result_ty) = match instantiated {
                Type::Function(dom, ret) => (dom.ordered, *ret),
                other => (Vec::new(), other),
            };
            let mut eff = false;
            let mut iargs = Vec::new();
            for (a, expected) in args.iter().zip(param_types.into_iter()) {
                let (t, e, ir) = infer_expr(cx, env, effect, diagnostics, depth + 1, a)?;
                eff |= e;
                unify_checked(cx.ctx, t, expected, a.span)?;
                iargs.push(ir);
            }
            Ok((result_ty, eff, IExpr::IConstructor { variant: owner, ctor: name.clone(), args: iargs }))
        }

        Expr::Case(scrutinee, branches) => {
            let (sty, seff, sir) = infer_expr(cx, env, effect, diagnostics, depth + 1, scrutinee)?;
            let mut ibranches = Vec::new();
            let mut result_ty: Option<Type> = None;
            let mut eff = seff;
            for branch in branches {
                env.push_scope();
                let mut bindings = BindingMap::new();
                let (pty, ipat) = infer_pattern(cx, env, &mut bindings, &branch.pattern)?;
                unify_checked(cx.ctx, pty, sty.clone(), branch.pattern.span)?;
                for (name, (t, local, pspan)) in &bindings {
                    env.bind(name.clone(), PolyType::monomorphic(t.clone()), *pspan, ResolvedName::Local(*local));
                }
                let (bty, beff, bir) = infer_expr(cx, env, effect, diagnostics, depth + 1, &branch.body)?;
                eff |= beff;
                match &result_ty {
                    None => result_ty = Some(bty),
                    Some(prev) => unify_checked(cx.ctx, bty, prev.clone(), branch.body.span)?,
                }
                let unused = env.pop_scope();
                for (uname, uspan) in unused {
                    diagnostics.push(Diagnostic::warning(uspan, format!("unused binding `{uname}`")));
                }
                ibranches.push(IBranch { pattern: ipat, body: bir });
            }
            let result = result_ty.unwrap_or(Type::UNIT);
            Ok((result, eff, IExpr::ICase { scrutinee: Box::new(sir), branches: ibranches }))
        }

        Expr::Receive(branches) => {
            let mut ibranches = Vec::new();
            let mut result_ty: Option<Type> = None;
            for branch in branches {
                env.push_scope();
                let mut bindings = BindingMap::new();
                let (pty, ipat) = infer_pattern(cx, env, &mut bindings, &branch.pattern)?;
                unify_checked(cx.ctx, pty, effect.clone(), branch.pattern.span)?;
                for (name, (t, local, pspan)) in &bindings {
                    env.bind(name.clone(), PolyType::monomorphic(t.clone()), *pspan, ResolvedName::Local(*local));
                }
                let (bty, _beff, bir) = infer_expr(cx, env, effect, diagnostics, depth + 1, &branch.body)?;
                match &result_ty {
                    None => result_ty = Some(bty),
                    Some(prev) => unify_checked(cx.ctx, bty, prev.clone(), branch.body.span)?,
                }
                let unused = env.pop_scope();
                for (uname, uspan) in unused {
                    diagnostics.push(Diagnostic::warning(uspan, format!("unused binding `{uname}`")));
                }
                ibranches.push(IBranch { pattern: ipat, body: bir });
            }
            let result = result_ty.unwrap_or(Type::UNIT);
            Ok((result, true, IExpr::IReceive { branches: ibranches }))
        }

        Expr::Do { name, value, body } => {
            let (vty, veff, vir) = infer_expr(cx, env, effect, diagnostics, depth + 1, value)?;
            let local = cx.ctx.ids.fresh_local_name();
            env.push_scope();
            env.bind(name.clone(), PolyType::monomorphic(vty), expr.span, ResolvedName::Local(local));
            let (bty, _beff, bir) = infer_expr(cx, env, effect, diagnostics, depth + 1, body)?;
            let unused = env.pop_scope();
            for (uname, uspan) in unused {
                diagnostics.push(Diagnostic::warning(uspan, format!("unused binding `{uname}`")));
            }
            let _ = veff;
            Ok((bty, true, IExpr::ILetIn { name: local, value: Box::new(vir), body: Box::new(bir) }))
        }

        Expr::Spawn(body) => {
            let binding = env.lookup("spawn").ok_or_else(|| ElabError::UnboundVariable { name: "spawn".into(), span: expr.span })?;
            let spawn_resolved = binding.resolved;
            let spawn_instantiated = instantiate(cx.ctx, &binding.scheme);
            let spawn_ty = cx.ctx.resolve(spawn_instantiated);
            let Type::Function(domain, ret) = spawn_ty else {
                unreachable!("`spawn` is always bound to a function type by the primitives environment")
            };

            let new_effect = cx.ctx.fresh_type_var();
            env.push_scope();
            let (bty, _beff, bir) = infer_expr(cx, env, &new_effect, diagnostics, depth + 1, body)?;
            let unused = env.pop_scope();
            for (uname, uspan) in unused {
                diagnostics.push(Diagnostic::warning(uspan, format!("unused binding `{uname}`")));
            }
            unify_checked(cx.ctx, bty, Type::UNIT, body.span)?;

            let thunk_ty = Type::Effectful(Box::new(Domain::empty()), Box::new(new_effect), Box::new(Type::UNIT));
            let expected_thunk = domain.ordered.into_iter().next().expect("spawn's domain always has exactly one ordered parameter");
            unify_checked(cx.ctx, thunk_ty, expected_thunk, expr.span)?;

            let thunk_ir = IExpr::ILambda { self_name: None, params: IParams::default(), body: Box::new(bir) };
            let args = IArgs { ordered: vec![thunk_ir], mandatory: IndexMap::new(), optional: IndexMap::new() };
            Ok((*ret, false, IExpr::IApply(spawn_resolved, args)))
        }

        Expr::SelfPid => {
            let binding = env.lookup("self").ok_or_else(|| ElabError::UnboundVariable { name: "self".into(), span: expr.span })?;
            let self_resolved = binding.resolved;
            let self_instantiated = instantiate(cx.ctx, &binding.scheme);
            let self_ty = cx.ctx.resolve(self_instantiated);
            let Type::Function(_domain, ret) = self_ty else {
                unreachable!("`self` is always bound to a function type by the primitives environment")
            };
            let Type::Pid(r) = *ret else { unreachable!("`self`'s return type is always `pid<r>`") };
            unify_checked(cx.ctx, *r, effect.clone(), expr.span)?;
            Ok((Type::Pid(Box::new(effect.clone())), false, IExpr::IApply(self_resolved, IArgs::default())))
        }

        Expr::Send(target, msg) => {
            let binding = env.lookup("send").ok_or_else(|| ElabError::UnboundVariable { name: "send".into(), span: expr.span })?;
            let send_resolved = binding.resolved;
            let send_instantiated = instantiate(cx.ctx, &binding.scheme);
            let send_ty = cx.ctx.resolve(send_instantiated);
            let Type::Function(domain, ret) = send_ty else {
                unreachable!("`send` is always bound to a function type by the primitives environment")
            };
            let mut params = domain.ordered.into_iter();
            let expected_target = params.next().expect("send's domain always has exactly two ordered parameters");
            let expected_msg = params.next().expect("send's domain always has exactly two ordered parameters");

            let (tty, teff, tir) = infer_expr(cx, env, effect, diagnostics, depth + 1, target)?;
            unify_checked(cx.ctx, tty, expected_target, target.span)?;
            let (mty, meff, mir) = infer_expr(cx, env, effect, diagnostics, depth + 1, msg)?;
            unify_checked(cx.ctx, mty, expected_msg, msg.span)?;

            let args = IArgs { ordered: vec![tir, mir], mandatory: IndexMap::new(), optional: IndexMap::new() };
            Ok((*ret, teff || meff, IExpr::IApply(send_resolved, args)))
        }

        Expr::Freeze(name, args) => {
            let binding = env.lookup(name).ok_or_else(|| ElabError::UnboundVariable { name: name.clone(), span: expr.span })?;
            let ResolvedName::Global(g) = binding.resolved else {
                return Err(ElabError::CannotFreezeNonGlobalName { name: name.clone(), span: expr.span });
            };
            let fn_instantiated = instantiate(cx.ctx, &binding.scheme);
            let fn_ty = cx.ctx.resolve(fn_instantiated);
            let (domain, receive_ty, ret_ty) = match fn_ty {
                Type::Function(dom, ret) => (*dom, cx.ctx.fresh_type_var(), *ret),
                Type::Effectful(dom, eff_ty, ret) => (*dom, *eff_ty, *ret),
                other => return Err(ElabError::ContradictionError { actual: other, expected: Type::UNIT, span: expr.span }),
            };
            if args.len() > domain.ordered.len() {
                return Err(ElabError::BadArityOfOrderedArguments { expected: domain.ordered.len(), found: args.len(), span: expr.span });
            }
            let mut eff = false;
            let mut filled = Vec::new();
            let mut ordered = domain.ordered.into_iter();
            for arg in args {
                let expected = ordered.next().expect("checked above: args.len() <= domain.ordered.len()");
                let (t, e, ir) = infer_expr(cx, env, effect, diagnostics, depth + 1, arg)?;
                eff |= e;
                unify_checked(cx.ctx, t, expected, arg.span)?;
                filled.push(ir);
            }
            let rest_types: Vec<Type> = ordered.collect();
            let rest = if rest_types.is_empty() { Type::UNIT } else { Type::product(rest_types) };
            let result = frozen_type(cx.ids, rest, receive_ty, ret_ty);
            Ok((result, eff, IExpr::IFreeze(g, filled)))
        }

        Expr::FreezeUpdate(obj, args) => {
            let (oty, oeff, oir) = infer_expr(cx, env, effect, diagnostics, depth + 1, obj)?;
            let resolved = cx.ctx.resolve(oty.clone());
            let Type::Data(hiveml_types::DataTypeId::Opaque(op), targs) = &resolved else {
                return Err(ElabError::ContradictionError {
                    actual: resolved,
                    expected: frozen_type(cx.ids, Type::UNIT, cx.ctx.fresh_type_var(), cx.ctx.fresh_type_var()),
                    span: expr.span,
                });
            };
            if *op != cx.ids.frozen || targs.len() != 3 {
                return Err(ElabError::ContradictionError { actual: resolved.clone(), expected: resolved, span: expr.span });
            }
            let rest = targs[0].clone();
            let ret = targs[2].clone();
            let expected_holes: Vec<Type> = match cx.ctx.resolve(rest) {
                Type::Scalar(hiveml_types::Scalar::Unit) => Vec::new(),
                Type::Product(items) => items,
                other => vec![other],
            };
            if args.len() != expected_holes.len() {
                return Err(ElabError::BadArityOfOrderedArguments { expected: expected_holes.len(), found: args.len(), span: expr.span });
            }
            let mut eff = oeff;
            let mut hole_irs = Vec::new();
            for (arg, expected) in args.iter().zip(expected_holes.into_iter()) {
                let (t, e, ir) = infer_expr(cx, env, effect, diagnostics, depth + 1, arg)?;
                eff |= e;
                unify_checked(cx.ctx, t, expected, arg.span)?;
                hole_irs.push(ir);
            }
            Ok((ret, eff, IExpr::IFreezeUpdate(Box::new(oir), hole_irs)))
        }
    }
}

pub fn infer_pattern(
    cx: &mut Checker,
    env: &Environment,
    bindings: &mut BindingMap,
    pat: &Spanned<Pattern>,
) -> ElabResult<(Type, IPattern)> {
    match &pat.node {
        Pattern::Var(name) => {
            if bindings.contains_key(name) {
                return Err(ElabError::BoundMoreThanOnceInPattern { name: name.clone(), span: pat.span });
            }
            let ty = cx.ctx.fresh_type_var();
            let local = cx.ctx.ids.fresh_local_name();
            bindings.insert(name.clone(), (ty.clone(), local, pat.span));
            Ok((ty, IPattern::Var(local)))
        }

        Pattern::Wildcard => Ok((cx.ctx.fresh_type_var(), IPattern::Wildcard)),

        Pattern::Lit(lit) => {
            let (t, c) = base_const(cx, lit, pat.span)?;
            Ok((t, IPattern::BaseConst(c)))
        }

        Pattern::Tuple(items) => {
            let mut tys = Vec::new();
            let mut ips = Vec::new();
            for it in items {
                let (t, ip) = infer_pattern(cx, env, bindings, it)?;
                tys.push(t);
                ips.push(ip);
            }
            Ok((Type::product(tys), IPattern::Tuple(ips)))
        }

        Pattern::Constructor(name, args) => {
            let owner = env.lookup_ctor(name).ok_or_else(|| ElabError::UndefinedConstructor { name: name.clone(), span: pat.span })?;
            let variant = cx.ctx.defs.variant(owner).clone();
            let ctor = cx
                .ctx
                .defs
                .ctor(owner, name)
                .cloned()
                .ok_or_else(|| ElabError::UndefinedConstructor { name: name.clone(), span: pat.span })?;
            if ctor.params.len() != args.len() {
                return Err(ElabError::InvalidNumberOfConstructorArguments {
                    name: name.clone(),
                    expected: ctor.params.len(),
                    found: args.len(),
                    span: pat.span,
                });
            }
            let poly = ctor_poly_type(&variant, &ctor, owner);
            let instantiated = instantiate(cx.ctx, &poly);
            let (param_types, result_ty) = match instantiated {
                Type::Function(dom, ret) => (dom.ordered, *ret),
                other => (Vec::new(), other),
            };
            let mut ips = Vec::new();
            for (a, expected) in args.iter().zip(param_types.into_iter()) {
                let (t, ip) = infer_pattern(cx, env, bindings, a)?;
                unify_checked(cx.ctx, t, expected, a.span)?;
                ips.push(ip);
            }
            Ok((result_ty, IPattern::Constructor(owner, name.clone(), ips)))
        }

        Pattern::Record(fields) => {
            check_row_label_count(fields.len(), pat.span)?;
            let mut map = IndexMap::new();
            let mut ipmap = IndexMap::new();
            for Labeled { label, value } in fields {
                if map.contains_key(label) {
                    return Err(ElabError::DuplicatedLabel { label: label.clone(), span: value.span });
                }
                let (t, ip) = infer_pattern(cx, env, bindings, value)?;
                map.insert(label.clone(), t);
                ipmap.insert(label.clone(), ip);
            }
            Ok((Type::Record(Row::Fixed(map)), IPattern::Record(ipmap)))
        }

        Pattern::ListNil => {
            let elem = cx.ctx.fresh_type_var();
            Ok((list_type(cx.ids, elem), IPattern::ListNil))
        }

        Pattern::ListCons(h, t) => {
            let (hty, hip) = infer_pattern(cx, env, bindings, h)?;
            let (tty, tip) = infer_pattern(cx, env, bindings, t)?;
            unify_checked(cx.ctx, tty, list_type(cx.ids, hty.clone()), t.span)?;
            Ok((list_type(cx.ids, hty), IPattern::ListCons(Box::new(hip), Box::new(tip))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hiveml_common::Span;
    use hiveml_syntax::Spanned;

    fn dummy(node: Expr) -> Spanned<Expr> {
        Spanned::new(node, Span::dummy())
    }

    fn fresh_checker(ctx: &mut InferenceContext) -> (Environment, WellKnownIds) {
        crate::primitives::builtin_environment(ctx)
    }

    #[test]
    fn integer_literal_checks_to_int() {
        let mut ctx = InferenceContext::new();
        let (mut env, ids) = fresh_checker(&mut ctx);
        let mut cx = Checker { ctx: &mut ctx, ids, type_params: TypeParamScope::default() };
        let mut diags = Vec::new();
        let fresh_tv = cx.ctx.fresh_type_var();
        let (ty, eff, ir) = infer_expr(&mut cx, &mut env, &fresh_tv, &mut diags, 0, &dummy(Expr::Lit(Literal::Int(3)))).unwrap();
        assert_eq!(ty, Type::INT);
        assert!(!eff);
        assert_eq!(ir, IExpr::IBaseConst(IBaseConst::Int(3)));
    }

    #[test]
    fn unbound_variable_is_reported() {
        let mut ctx = InferenceContext::new();
        let (mut env, ids) = fresh_checker(&mut ctx);
        let mut cx = Checker { ctx: &mut ctx, ids, type_params: TypeParamScope::default() };
        let mut diags = Vec::new();
        let effect = cx.ctx.fresh_type_var();
        let result = infer_expr(&mut cx, &mut env, &effect, &mut diags, 0, &dummy(Expr::Var("nope".into())));
        assert!(matches!(result, Err(ElabError::UnboundVariable { .. })));
    }

    #[test]
    fn identity_lambda_generalizes_over_let() {
        let mut ctx = InferenceContext::new();
        let (mut env, ids) = fresh_checker(&mut ctx);
        let mut cx = Checker { ctx: &mut ctx, ids, type_params: TypeParamScope::default() };
        let mut diags = Vec::new();
        let effect = cx.ctx.fresh_type_var();

        let identity = dummy(Expr::Lambda {
            self_name: None,
            params: Params { ordered: vec![Spanned::new(Pattern::Var("x".into()), Span::dummy())], mandatory: vec![], optional: vec![] },
            body: Box::new(dummy(Expr::Var("x".into()))),
        });
        let body = dummy(Expr::Tuple(vec![
            dummy(Expr::Apply(Box::new(dummy(Expr::Var("id".into()))), CallArgs { ordered: vec![dummy(Expr::Lit(Literal::Int(1)))], mandatory: vec![], optional: vec![] })),
            dummy(Expr::Apply(Box::new(dummy(Expr::Var("id".into()))), CallArgs { ordered: vec![dummy(Expr::Lit(Literal::Bool(true)))], mandatory: vec![], optional: vec![] })),
        ]));
        let let_expr = dummy(Expr::Let { name: "id".into(), value: Box::new(identity), body: Box::new(body) });

        let (ty, eff, _ir) = infer_expr(&mut cx, &mut env, &effect, &mut diags, 0, &let_expr).unwrap();
        assert!(!eff);
        assert_eq!(ty, Type::product(vec![Type::INT, Type::BOOL]));
    }

    #[test]
    fn record_access_constrains_only_the_projected_label() {
        let mut ctx = InferenceContext::new();
        let (mut env, ids) = fresh_checker(&mut ctx);
        let mut cx = Checker { ctx: &mut ctx, ids, type_params: TypeParamScope::default() };
        let mut diags = Vec::new();
        let effect = cx.ctx.fresh_type_var();

        let record = dummy(Expr::RecordLit(vec![
            Labeled { label: "x".into(), value: dummy(Expr::Lit(Literal::Int(1))) },
            Labeled { label: "y".into(), value: dummy(Expr::Lit(Literal::Bool(false))) },
        ]));
        let access = dummy(Expr::RecordAccess(Box::new(record), "x".into()));
        let (ty, _eff, _ir) = infer_expr(&mut cx, &mut env, &effect, &mut diags, 0, &access).unwrap();
        assert_eq!(ty, Type::INT);
    }

    #[test]
    fn letrec_self_recursive_function_type_checks() {
        let mut ctx = InferenceContext::new();
        let (mut env, ids) = fresh_checker(&mut ctx);
        let mut cx = Checker { ctx: &mut ctx, ids, type_params: TypeParamScope::default() };
        let mut diags = Vec::new();
        let effect = cx.ctx.fresh_type_var();

        // let rec count_down(n) = if n then count_down(n) else n in count_down
        let body_fn = dummy(Expr::If(
            Box::new(dummy(Expr::Var("n".into()))),
            Box::new(dummy(Expr::Apply(
                Box::new(dummy(Expr::Var("count_down".into()))),
                CallArgs { ordered: vec![dummy(Expr::Var("n".into()))], mandatory: vec![], optional: vec![] },
            ))),
            Box::new(dummy(Expr::Var("n".into()))),
        ));
        let lambda = dummy(Expr::Lambda {
            self_name: None,
            params: Params { ordered: vec![Spanned::new(Pattern::Var("n".into()), Span::dummy())], mandatory: vec![], optional: vec![] },
            body: Box::new(body_fn),
        });
        let letrec = dummy(Expr::LetRec {
            bindings: vec![("count_down".into(), lambda)],
            body: Box::new(dummy(Expr::Var("count_down".into()))),
        });

        let (ty, eff, _ir) = infer_expr(&mut cx, &mut env, &effect, &mut diags, 0, &letrec).unwrap();
        assert!(!eff);
        assert!(matches!(ty, Type::Function(_, _)));
    }

    #[test]
    fn nonlambda_letrec_binding_is_rejected() {
        let mut ctx = InferenceContext::new();
        let (mut env, ids) = fresh_checker(&mut ctx);
        let mut cx = Checker { ctx: &mut ctx, ids, type_params: TypeParamScope::default() };
        let mut diags = Vec::new();
        let effect = cx.ctx.fresh_type_var();

        let letrec = dummy(Expr::LetRec {
            bindings: vec![("x".into(), dummy(Expr::Lit(Literal::Int(1))))],
            body: Box::new(dummy(Expr::Var("x".into()))),
        });
        let result = infer_expr(&mut cx, &mut env, &effect, &mut diags, 0, &letrec);
        assert!(matches!(result, Err(ElabError::LetRecBindingMustBeAFunction { .. })));
    }

    #[test]
    fn format_literal_derives_hole_types() {
        let mut ctx = InferenceContext::new();
        let (mut env, ids) = fresh_checker(&mut ctx);
        let mut cx = Checker { ctx: &mut ctx, ids, type_params: TypeParamScope::default() };
        let mut diags = Vec::new();
        let effect = cx.ctx.fresh_type_var();
        let (ty, _eff, _ir) =
            infer_expr(&mut cx, &mut env, &effect, &mut diags, 0, &dummy(Expr::Lit(Literal::Format("n=%c f=%f%%".into())))).unwrap();
        assert!(matches!(ty, Type::Data(hiveml_types::DataTypeId::Opaque(op), _) if op == cx.ids.format));
    }

    #[test]
    fn unused_let_binding_is_reported_as_a_warning_not_an_error() {
        let mut ctx = InferenceContext::new();
        let (mut env, ids) = fresh_checker(&mut ctx);
        let mut cx = Checker { ctx: &mut ctx, ids, type_params: TypeParamScope::default() };
        let mut diags = Vec::new();
        let effect = cx.ctx.fresh_type_var();
        let let_expr = dummy(Expr::Let {
            name: "unused".into(),
            value: Box::new(dummy(Expr::Lit(Literal::Int(1)))),
            body: Box::new(dummy(Expr::Lit(Literal::Unit))),
        });
        let result = infer_expr(&mut cx, &mut env, &effect, &mut diags, 0, &let_expr);
        assert!(result.is_ok());
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].category, hiveml_common::DiagnosticCategory::Warning);
    }
}
