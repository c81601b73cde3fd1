//! The primitives table (§6): an initial environment providing types
//! for built-ins the parser's surface syntax has direct sugar for
//! (`list`, `option`) and for the actor-runtime intrinsics (`spawn`,
//! `self`, `send`, `receive` is syntax, not a binding, `format`).
//!
//! This is an "external collaborator" per the core's own scope
//! statement — the core only needs *a* primitives environment, not this
//! particular one — but a real core still has to ship a default.

use hiveml_common::Span;
use hiveml_env::{Environment, SigRecord, TypeBinding, TypeSigItem};
use hiveml_ids::{OpaqueId, ResolvedName, VariantId};
use hiveml_types::{generalize, CtorDef, DataTypeId, Domain, InferenceContext, OpaqueDef, Row, Type, VariantDef};
use indexmap::IndexMap;

/// The well-known IDs primitives registers, so the expression checker
/// can build `list`/`option` types and constructors without redoing
/// name lookups for every occurrence.
#[derive(Clone, Copy, Debug)]
pub struct WellKnownIds {
    pub list: VariantId,
    pub option: VariantId,
    /// `format<T>`: the type of a compiled format-string literal, `T`
    /// being the product of its hole types. Opaque because the core
    /// never looks inside a format value — only the target runtime's
    /// printf-style primitive does.
    pub format: OpaqueId,
    /// `frozen<rest, receive, return>`: a partially applied global
    /// function value, `rest` being the product of its still-unfilled
    /// ordered parameter types. Opaque for the same reason `format` is.
    pub frozen: OpaqueId,
}

pub fn list_type(ids: WellKnownIds, elem: Type) -> Type {
    Type::Data(hiveml_types::DataTypeId::Variant(ids.list), vec![elem])
}

pub fn option_type(ids: WellKnownIds, elem: Type) -> Type {
    Type::Data(hiveml_types::DataTypeId::Variant(ids.option), vec![elem])
}

pub fn format_type(ids: WellKnownIds, holes: Type) -> Type {
    Type::Data(DataTypeId::Opaque(ids.format), vec![holes])
}

pub fn frozen_type(ids: WellKnownIds, rest: Type, receive: Type, ret: Type) -> Type {
    Type::Data(DataTypeId::Opaque(ids.frozen), vec![rest, receive, ret])
}

/// Builds the primitives environment and registers `list`/`option` in
/// the context's type-definition store. Call once per fresh
/// `InferenceContext`.
pub fn builtin_environment(ctx: &mut InferenceContext) -> (Environment, WellKnownIds) {
    let list = ctx.ids.fresh_variant();
    let option = ctx.ids.fresh_variant();
    let format = ctx.ids.fresh_opaque();
    let frozen = ctx.ids.fresh_opaque();
    let ids = WellKnownIds { list, option, format, frozen };

    register_list(ctx, list);
    register_option(ctx, option);
    ctx.defs.register_opaque(format, OpaqueDef { name: "format".into(), arity: 1, module_path: vec![] });
    ctx.defs.register_opaque(frozen, OpaqueDef { name: "frozen".into(), arity: 3, module_path: vec![] });

    let mut env = Environment::new();
    env.bind_type("list".to_string(), TypeBinding { id: DataTypeId::Variant(list), arity: 1 });
    env.bind_type("option".to_string(), TypeBinding { id: DataTypeId::Variant(option), arity: 1 });
    env.bind_type("format".to_string(), TypeBinding { id: DataTypeId::Opaque(format), arity: 1 });
    env.bind_type("frozen".to_string(), TypeBinding { id: DataTypeId::Opaque(frozen), arity: 3 });
    env.bind_ctor("Nil".to_string(), list);
    env.bind_ctor("Cons".to_string(), list);
    env.bind_ctor("None".to_string(), option);
    env.bind_ctor("Some".to_string(), option);

    // spawn : (() -[r]-> unit) -> pid<r>
    let r = ctx.fresh_type_var();
    let spawn_effect = Type::Effectful(
        Box::new(Domain::empty()),
        Box::new(r.clone()),
        Box::new(Type::UNIT),
    );
    let spawn_ty = Type::Function(
        Box::new(Domain { ordered: vec![spawn_effect], mandatory: IndexMap::new(), optional: Row::Fixed(IndexMap::new()) }),
        Box::new(Type::Pid(Box::new(r))),
    );
    bind_builtin(ctx, &mut env, "spawn", spawn_ty);

    // self : () -> pid<r>
    let r2 = ctx.fresh_type_var();
    let self_ty = Type::Function(Box::new(Domain::empty()), Box::new(Type::Pid(Box::new(r2))));
    bind_builtin(ctx, &mut env, "self", self_ty);

    // send : (pid<r>, r) -> unit
    let r3 = ctx.fresh_type_var();
    let send_ty = Type::Function(
        Box::new(Domain { ordered: vec![Type::Pid(Box::new(r3.clone())), r3], mandatory: IndexMap::new(), optional: Row::Fixed(IndexMap::new()) }),
        Box::new(Type::UNIT),
    );
    bind_builtin(ctx, &mut env, "send", send_ty);

    (env, ids)
}

fn bind_builtin(ctx: &mut InferenceContext, env: &mut Environment, name: &str, ty: Type) {
    let poly = generalize(ctx, 0, ty).expect("builtin types never contain a corrupted link cycle");
    let resolved = ResolvedName::Global(ctx.ids.fresh_global_name());
    env.bind(name.to_string(), poly, Span::dummy(), resolved);
}

fn register_list(ctx: &mut InferenceContext, id: VariantId) {
    let a = ctx.ids.fresh_bound();
    let mut ctors = IndexMap::new();
    ctors.insert(
        "Nil".to_string(),
        CtorDef { owner: id, id: ctx.ids.fresh_ctor(), name: "Nil".into(), params: vec![] },
    );
    ctors.insert(
        "Cons".to_string(),
        CtorDef {
            owner: id,
            id: ctx.ids.fresh_ctor(),
            name: "Cons".into(),
            params: vec![Type::Bound(a), Type::Data(hiveml_types::DataTypeId::Variant(id), vec![Type::Bound(a)])],
        },
    );
    ctx.defs.register_variant(id, VariantDef { name: "list".into(), params: vec![a], ctors, module_path: vec![] });
}

fn register_option(ctx: &mut InferenceContext, id: VariantId) {
    let a = ctx.ids.fresh_bound();
    let mut ctors = IndexMap::new();
    ctors.insert("None".to_string(), CtorDef { owner: id, id: ctx.ids.fresh_ctor(), name: "None".into(), params: vec![] });
    ctors.insert(
        "Some".to_string(),
        CtorDef { owner: id, id: ctx.ids.fresh_ctor(), name: "Some".into(), params: vec![Type::Bound(a)] },
    );
    ctx.defs.register_variant(id, VariantDef { name: "option".into(), params: vec![a], ctors, module_path: vec![] });
}

/// The signature the top-level module's elaboration can be ascribed
/// against to verify it re-exports the primitives (used by integration
/// tests; not required by ordinary user programs).
pub fn primitives_signature(ctx: &mut InferenceContext, ids: WellKnownIds) -> SigRecord {
    let a = ctx.fresh_type_var();
    SigRecord::new()
        .with_type("list", TypeSigItem::Manifest { params: 1, body: list_type(ids, a.clone()) })
        .with_type("option", TypeSigItem::Manifest { params: 1, body: option_type(ids, a) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_environment_binds_actor_primitives() {
        let mut ctx = InferenceContext::new();
        let (env, _ids) = builtin_environment(&mut ctx);
        assert!(env.peek("spawn").is_some());
        assert!(env.peek("self").is_some());
        assert!(env.peek("send").is_some());
    }

    #[test]
    fn list_and_option_are_registered_variants_with_two_constructors_each() {
        let mut ctx = InferenceContext::new();
        let (_env, ids) = builtin_environment(&mut ctx);
        assert_eq!(ctx.defs.variant(ids.list).ctors.len(), 2);
        assert_eq!(ctx.defs.variant(ids.option).ctors.len(), 2);
    }
}
