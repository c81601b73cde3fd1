//! Component I: the manual-type decoder.
//!
//! Translates a parsed [`TypeExpr`] into an internal [`Type`]. Scalars
//! and `pid<T>` are built in; everything else is resolved against the
//! environment's type namespace and must match its declared arity. The
//! surface grammar has no dedicated type-variable syntax, so a bare
//! lowercase identifier (`TypeExpr::Var`) is resolved against the
//! binder's local rigid parameters first, then scalars, then the
//! environment, in that order — an identifier that matches none of the
//! three is an [`ElabError::UnboundTypeParameter`]; this decoder never
//! silently invents a fresh unification variable for an unresolved
//! name, unlike expression inference.

use std::collections::HashMap;

use hiveml_common::Span;
use hiveml_env::Environment;
use hiveml_ids::{BoundId, SynonymId};
use hiveml_syntax::{DomainExpr, TypeExpr};
use hiveml_types::{DataTypeId, Domain, InferenceContext, Row, Scalar, Type};

use crate::error::{ElabError, ElabResult};

/// Maps a binder's rigid type/row parameters (from an `external` arity
/// annotation, a functor parameter signature, or a `type t(a) = ...`
/// declaration) to the `Bound` IDs the decoder should substitute.
#[derive(Clone, Debug, Default)]
pub struct TypeParamScope {
    pub vars: HashMap<String, BoundId>,
}

/// Side output: every synonym this decode pass referenced, for the
/// dependency graph in `hiveml_env::synonym_graph`.
#[derive(Debug, Default)]
pub struct DecodeDeps {
    pub synonyms: Vec<SynonymId>,
}

fn builtin_scalar(name: &str) -> Option<Scalar> {
    Some(match name {
        "unit" => Scalar::Unit,
        "bool" => Scalar::Bool,
        "int" => Scalar::Int,
        "float" => Scalar::Float,
        "char" => Scalar::Char,
        "binary" => Scalar::Binary,
        _ => return None,
    })
}

pub fn decode_type(
    ctx: &InferenceContext,
    env: &Environment,
    params: &TypeParamScope,
    deps: &mut DecodeDeps,
    ty: &hiveml_syntax::Spanned<TypeExpr>,
) -> ElabResult<Type> {
    match &ty.node {
        // The surface grammar has no quote-prefixed type-variable syntax
        // (`'a`), so a bare lowercase identifier with no type arguments is
        // ambiguous between a rigid parameter and a nullary named type —
        // `TypeExpr::Var` covers both, and this is the one place that
        // resolves which: a name bound in the current binder's scope wins,
        // then a builtin scalar, then the environment's type namespace,
        // exactly as `TypeExpr::Con(name, [])` would resolve it.
        TypeExpr::Var(name) => {
            if let Some(&id) = params.vars.get(name) {
                return Ok(Type::Bound(id));
            }
            if let Some(scalar) = builtin_scalar(name) {
                return Ok(Type::Scalar(scalar));
            }
            if let Some(binding) = env.lookup_type(name).cloned() {
                return decode_named_type(ctx, env, params, deps, name, &binding, &[], ty.span);
            }
            Err(ElabError::UnboundTypeParameter { name: name.clone(), span: ty.span })
        }
        TypeExpr::Pid(inner) => {
            let inner = decode_type(ctx, env, params, deps, inner)?;
            Ok(Type::Pid(Box::new(inner)))
        }
        TypeExpr::Record(fields, _extensible) => {
            let mut map = indexmap::IndexMap::new();
            for (name, field_ty) in fields {
                if map.contains_key(name) {
                    return Err(ElabError::DuplicatedLabel { label: name.clone(), span: field_ty.span });
                }
                map.insert(name.clone(), decode_type(ctx, env, params, deps, field_ty)?);
            }
            Ok(Type::Record(Row::Fixed(map)))
        }
        TypeExpr::Function(domain, ret) => {
            let domain = decode_domain(ctx, env, params, deps, domain)?;
            let ret = decode_type(ctx, env, params, deps, ret)?;
            Ok(Type::Function(Box::new(domain), Box::new(ret)))
        }
        TypeExpr::Effectful(domain, eff, ret) => {
            let domain = decode_domain(ctx, env, params, deps, domain)?;
            let eff = decode_type(ctx, env, params, deps, eff)?;
            let ret = decode_type(ctx, env, params, deps, ret)?;
            Ok(Type::Effectful(Box::new(domain), Box::new(eff), Box::new(ret)))
        }
        TypeExpr::Con(name, args) => {
            if args.is_empty() {
                if let Some(scalar) = builtin_scalar(name) {
                    return Ok(Type::Scalar(scalar));
                }
            }
            if name == "pid" {
                if args.len() != 1 {
                    return Err(ElabError::InvalidNumberOfTypeArguments { name: name.clone(), expected: 1, found: args.len(), span: ty.span });
                }
                let inner = decode_type(ctx, env, params, deps, &args[0])?;
                return Ok(Type::Pid(Box::new(inner)));
            }
            let binding = env
                .lookup_type(name)
                .ok_or_else(|| ElabError::UndefinedTypeName { name: name.clone(), span: ty.span })?
                .clone();
            decode_named_type(ctx, env, params, deps, name, &binding, args, ty.span)
        }
        TypeExpr::ModuleProjected(path, name, args) => {
            // The module elaborator binds every exposed member of a named
            // module twice: once under its bare name (the long-standing
            // flat convention this decoder otherwise relies on) and once
            // under its path-qualified name (`crate::module::qualify`).
            // The qualified entry is only actually distinct from the bare
            // one when two structures sealed against the same signature
            // are both in scope at once (e.g. two functor parameters of
            // the same signature) — exactly the case where ignoring the
            // path would conflate their abstract types. Preferring the
            // qualified lookup here, with the bare name as a fallback for
            // anything decoded outside module elaboration (the `#[cfg(test)]`
            // fixtures below), keeps both working.
            let qualified = crate::module::qualify(path, name);
            if let Some(binding) = env.lookup_type(&qualified).cloned() {
                return decode_named_type(ctx, env, params, deps, &qualified, &binding, args, ty.span);
            }
            let binding = env
                .lookup_type(name)
                .ok_or_else(|| ElabError::UndefinedTypeName { name: qualified.clone(), span: ty.span })?
                .clone();
            decode_named_type(ctx, env, params, deps, name, &binding, args, ty.span)
        }
    }
}

fn decode_named_type(
    ctx: &InferenceContext,
    env: &Environment,
    params: &TypeParamScope,
    deps: &mut DecodeDeps,
    name: &str,
    binding: &hiveml_env::TypeBinding,
    args: &[hiveml_syntax::Spanned<TypeExpr>],
    span: Span,
) -> ElabResult<Type> {
    if binding.arity != args.len() {
        return Err(ElabError::InvalidNumberOfTypeArguments { name: name.to_string(), expected: binding.arity, found: args.len(), span });
    }
    if let DataTypeId::Synonym(sid) = binding.id {
        deps.synonyms.push(sid);
    }
    let decoded_args = args.iter().map(|a| decode_type(ctx, env, params, deps, a)).collect::<ElabResult<Vec<_>>>()?;
    Ok(Type::Data(binding.id, decoded_args))
}

fn decode_domain(
    ctx: &InferenceContext,
    env: &Environment,
    params: &TypeParamScope,
    deps: &mut DecodeDeps,
    domain: &DomainExpr,
) -> ElabResult<Domain> {
    let ordered = domain
        .ordered
        .iter()
        .map(|t| decode_type(ctx, env, params, deps, t))
        .collect::<ElabResult<Vec<_>>>()?;
    let mut mandatory = indexmap::IndexMap::new();
    for (label, t) in &domain.mandatory {
        if mandatory.contains_key(label) {
            return Err(ElabError::DuplicatedLabel { label: label.clone(), span: t.span });
        }
        mandatory.insert(label.clone(), decode_type(ctx, env, params, deps, t)?);
    }
    let mut optional = indexmap::IndexMap::new();
    for (label, t) in &domain.optional {
        if optional.contains_key(label) {
            return Err(ElabError::DuplicatedLabel { label: label.clone(), span: t.span });
        }
        optional.insert(label.clone(), decode_type(ctx, env, params, deps, t)?);
    }
    Ok(Domain { ordered, mandatory, optional: Row::Fixed(optional) })
}

/// Builds rigid (`MustBeBound`) bound IDs for a binder's declared type
/// parameter names, rejecting duplicates per
/// `TypeParameterBoundMoreThanOnce`.
pub fn bind_rigid_params(ctx: &mut InferenceContext, names: &[String], span: Span) -> ElabResult<TypeParamScope> {
    let mut scope = TypeParamScope::default();
    for name in names {
        let id = ctx.ids.fresh_bound();
        if scope.vars.insert(name.clone(), id).is_some() {
            return Err(ElabError::TypeParameterBoundMoreThanOnce { name: name.clone(), span });
        }
    }
    Ok(scope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hiveml_env::TypeBinding;
    use hiveml_syntax::Spanned;

    fn dummy(node: TypeExpr) -> Spanned<TypeExpr> {
        Spanned::new(node, Span::dummy())
    }

    #[test]
    fn builtin_scalar_names_decode_directly() {
        let ctx = InferenceContext::new();
        let env = Environment::new();
        let mut deps = DecodeDeps::default();
        let params = TypeParamScope::default();
        let ty = decode_type(&ctx, &env, &params, &mut deps, &dummy(TypeExpr::Con("int".into(), vec![]))).unwrap();
        assert_eq!(ty, Type::INT);
    }

    #[test]
    fn unbound_type_parameter_is_reported() {
        let ctx = InferenceContext::new();
        let env = Environment::new();
        let mut deps = DecodeDeps::default();
        let params = TypeParamScope::default();
        let result = decode_type(&ctx, &env, &params, &mut deps, &dummy(TypeExpr::Var("a".into())));
        assert!(matches!(result, Err(ElabError::UnboundTypeParameter { .. })));
    }

    #[test]
    fn wrong_arity_named_type_is_rejected() {
        let mut ctx = InferenceContext::new();
        let mut env = Environment::new();
        env.bind_type("pair".to_string(), TypeBinding { id: DataTypeId::Opaque(ctx.ids.fresh_opaque()), arity: 2 });
        let mut deps = DecodeDeps::default();
        let params = TypeParamScope::default();
        let result = decode_type(&ctx, &env, &params, &mut deps, &dummy(TypeExpr::Con("pair".into(), vec![dummy(TypeExpr::Con("int".into(), vec![]))])));
        assert!(matches!(result, Err(ElabError::InvalidNumberOfTypeArguments { .. })));
    }

    #[test]
    fn named_synonym_reference_is_recorded_as_a_dependency() {
        let mut ctx = InferenceContext::new();
        let mut env = Environment::new();
        let sid = ctx.ids.fresh_synonym();
        env.bind_type("my_int".to_string(), TypeBinding { id: DataTypeId::Synonym(sid), arity: 0 });
        let mut deps = DecodeDeps::default();
        let params = TypeParamScope::default();
        decode_type(&ctx, &env, &params, &mut deps, &dummy(TypeExpr::Con("my_int".into(), vec![]))).unwrap();
        assert_eq!(deps.synonyms, vec![sid]);
    }
}
