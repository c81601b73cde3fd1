//! Component K: the module elaborator.
//!
//! Ties components I/J/L together over [`hiveml_syntax::ModuleExpr`] and
//! [`hiveml_syntax::Binding`]: structures, signature ascription, first-order
//! functors and their application, and the flat sequence of top-level
//! bindings that make up a [`Program`]. Everywhere this module binds a
//! structure's member into the ambient [`Environment`] it writes it twice —
//! once under its bare name (the convention every other component already
//! relies on) and once under [`qualify`]'s path-qualified name — so that two
//! structures in scope at once under the same field names (the classic case
//! being two functor parameters sealed against the same named signature)
//! keep genuinely distinct bindings instead of one shadowing the other.

use rustc_hash::FxHashMap;

use hiveml_common::{Diagnostic, Span};
use hiveml_env::{AbstractedSig, Binding as ValueBinding, Environment, ModuleBinding, SigRecord, TypeBinding, TypeSigItem};
use hiveml_ids::{FunctorId, GlobalName, OpaqueId, ResolvedName};
use hiveml_syntax::{ModuleExpr, Program, SigExpr, SigItem, Spanned, TypeDecl, TypeExpr};
use hiveml_types::{
    generalize, CtorDef, DataTypeId, GeneralizeError, InferenceContext, OpaqueDef, PolyType, SynonymDef, Type, VariantDef,
};

use crate::decode::{bind_rigid_params, decode_type, DecodeDeps, TypeParamScope};
use crate::error::{ElabError, ElabResult};
use crate::expr::{check_lambda, infer_expr, map_cycle, unify_checked, Checker};
use crate::ir::IrBinding;
use crate::primitives::WellKnownIds;
use crate::subtype::{subtype_functor, subtype_sig_record};

/// Builds the environment key a structure member is additionally bound
/// under, alongside its bare name. Empty path collapses to the bare name
/// itself so top-level bindings aren't all prefixed with a leading dot.
pub(crate) fn qualify(path: &[String], name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path.join("."), name)
    }
}

fn extended_path(path: &[String], segment: &str) -> Vec<String> {
    let mut out = path.to_vec();
    out.push(segment.to_string());
    out
}

/// What `elaborate_module_expr` hands back: a value, not a lexical
/// binding. The caller (`typecheck_binding`'s `Module` arm) decides
/// whether and how to bind it.
enum ModuleValue {
    Structure {
        opaques: Vec<OpaqueId>,
        sig: SigRecord,
        /// The environment the structure's own body was elaborated in,
        /// carrying the real `ResolvedName`s of every member — consulted
        /// by `flatten_sig_into_env` so outside references resolve to the
        /// same global the structure's own code emits, not a fresh alias.
        source: Environment,
        bindings: Vec<IrBinding>,
    },
    Functor {
        id: FunctorId,
        opaques: Vec<OpaqueId>,
        domain: SigRecord,
        codomain: SigRecord,
    },
}

/// A functor's closure: its parameter name, declared domain, and body AST,
/// captured at definition time so `ModuleExpr::Apply` can re-elaborate the
/// body fresh against the actual argument. `hiveml_env::ModuleBinding`
/// cannot hold this itself (that crate has no dependency on
/// `hiveml-syntax`), so the elaborator keeps the closures keyed by
/// `FunctorId` alongside the `ModuleBinding::Functor` it hands to the
/// environment.
struct FunctorClosure {
    param: String,
    domain: SigRecord,
    domain_opaques: Vec<OpaqueId>,
    body: Spanned<ModuleExpr>,
    captured_env: Environment,
}

/// Parametrizes `flatten_sig_into_env` between minting brand new
/// `GlobalName`s (a functor parameter bound only for its abstract shape,
/// with no structure actually behind it yet) and sourcing the real
/// `ResolvedName`s an actual structure's body already assigned.
#[derive(Clone, Copy)]
enum ValueSource<'s> {
    Mint,
    From(&'s Environment),
}

/// What `elaborate_program` returns: the final environment (for a REPL or
/// further linking), the program's own principal signature, the IR for
/// every top-level binding in declaration order, and accumulated
/// unused-binding diagnostics.
#[derive(Debug)]
pub struct ElaborationOutput {
    pub tyenv: Environment,
    pub signature: AbstractedSig,
    pub top_level: GlobalName,
    pub bindings: Vec<IrBinding>,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ModuleElaborator<'a> {
    ctx: &'a mut InferenceContext,
    ids: WellKnownIds,
    closures: FxHashMap<FunctorId, FunctorClosure>,
    bindings: Vec<IrBinding>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> ModuleElaborator<'a> {
    pub fn new(ctx: &'a mut InferenceContext, ids: WellKnownIds) -> Self {
        ModuleElaborator { ctx, ids, closures: FxHashMap::default(), bindings: Vec::new(), diagnostics: Vec::new() }
    }

    // -- Signature expressions --------------------------------------

    fn elaborate_sig_expr(&mut self, env: &Environment, sig: &Spanned<SigExpr>) -> ElabResult<AbstractedSig> {
        match &sig.node {
            SigExpr::Name(name) => {
                let found = env
                    .lookup_signature(name)
                    .ok_or_else(|| ElabError::UnboundSignatureName { name: name.clone(), span: sig.span })?
                    .clone();
                Ok(self.copy_abstracted_sig(&found))
            }
            SigExpr::Sig(items) => {
                let (opaques, record) = self.elaborate_sig_items(env, items)?;
                Ok(AbstractedSig::new(opaques, record))
            }
            SigExpr::WithType { base, name, ty } => {
                let base = self.elaborate_sig_expr(env, base)?;
                self.refine_with_type(env, base, name, ty, sig.span)
            }
        }
    }

    fn elaborate_sig_items(&mut self, env: &Environment, items: &[SigItem]) -> ElabResult<(Vec<OpaqueId>, SigRecord)> {
        let mut record = SigRecord::new();
        let mut opaques = Vec::new();
        // Signature names declared earlier in the same block are visible
        // to `SigExpr::Name` references later in it; simplification (d) in
        // the design ledger: this leaks into the caller's environment
        // rather than being scoped strictly to this `sig ... end` block.
        let mut scratch = env.clone();
        for item in items {
            match item {
                SigItem::Val { name, ty } => {
                    let (params, decoded) = self.decode_with_implicit_vars(&scratch, ty)?;
                    let poly = PolyType { vars: params, var_kinds: Vec::new(), row_vars: Vec::new(), body: decoded };
                    if record.values.insert(name.clone(), poly).is_some() {
                        return Err(ElabError::ConflictInSignature { name: name.clone(), span: ty.span });
                    }
                }
                SigItem::Type { name, arity, manifest } => {
                    let item = match manifest {
                        Some(ty) => {
                            let (params, decoded) = self.decode_with_implicit_vars(&scratch, ty)?;
                            let _ = params;
                            TypeSigItem::Manifest { params: *arity, body: decoded }
                        }
                        None => {
                            let witness = self.ctx.ids.fresh_opaque();
                            self.ctx.defs.register_opaque(witness, OpaqueDef { name: name.clone(), arity: *arity, module_path: vec![] });
                            opaques.push(witness);
                            TypeSigItem::Abstract { params: *arity, witness }
                        }
                    };
                    let scratch_id = match &item {
                        TypeSigItem::Manifest { body, .. } => data_id_for_manifest(self.ctx, body),
                        TypeSigItem::Abstract { witness, .. } => DataTypeId::Opaque(*witness),
                    };
                    if record.types.insert(name.clone(), item).is_some() {
                        return Err(ElabError::ConflictInSignature { name: name.clone(), span: Span::dummy() });
                    }
                    scratch.bind_type(name.clone(), TypeBinding { id: scratch_id, arity: *arity });
                }
                SigItem::Module { name, sig } => {
                    let nested = self.elaborate_sig_expr(&scratch, sig)?;
                    opaques.extend(nested.opaques.iter().copied());
                    if record.submodules.insert(name.clone(), nested.sig).is_some() {
                        return Err(ElabError::ConflictInSignature { name: name.clone(), span: sig.span });
                    }
                }
                SigItem::Signature { name, sig } => {
                    let nested = self.elaborate_sig_expr(&scratch, sig)?;
                    scratch.bind_signature(name.clone(), nested);
                }
            }
        }
        Ok((opaques, record))
    }

    /// `S with type t = ty`: the base signature's abstract `t` becomes a
    /// manifest, its witness opaque ID dropped from the abstracted set.
    /// Only zero-arity witnesses are actually substituted through the rest
    /// of the signature body (ledger simplification (c)) — a parametrized
    /// `with type` target would need a full substitution walk keyed by
    /// argument position, which nothing in this corpus's surface syntax
    /// can even express (`TypeExpr::ModuleProjected` arguments are types,
    /// never left as holes), so it is safe by construction here.
    fn refine_with_type(&mut self, env: &Environment, base: AbstractedSig, name: &str, ty: &Spanned<TypeExpr>, span: Span) -> ElabResult<AbstractedSig> {
        let Some(TypeSigItem::Abstract { params, witness }) = base.sig.types.get(name).cloned() else {
            return Err(ElabError::CannotRestrictTransparentType { name: name.to_string(), span });
        };
        if params != 0 {
            return Err(ElabError::CannotRestrictTransparentType { name: name.to_string(), span });
        }
        let mut deps = DecodeDeps::default();
        let decoded = decode_type(self.ctx, env, &TypeParamScope::default(), &mut deps, ty)?;
        let mut record = base.sig;
        record.types.insert(name.to_string(), TypeSigItem::Manifest { params: 0, body: decoded.clone() });
        substitute_opaque_in_sig(&mut record, witness, &decoded);
        let opaques = base.opaques.into_iter().filter(|&id| id != witness).collect();
        Ok(AbstractedSig::new(opaques, record))
    }

    /// Freshens every opaque ID an `AbstractedSig` existentially
    /// quantifies, so looking the same named signature up twice (e.g. two
    /// functor parameters both declared `: POINT`) never conflates their
    /// abstract types (spec §8 scenario 5).
    fn copy_abstracted_sig(&mut self, sig: &AbstractedSig) -> AbstractedSig {
        let mut renames: FxHashMap<OpaqueId, OpaqueId> = FxHashMap::default();
        for &old in &sig.opaques {
            let def = self.ctx.defs.opaque(old).clone();
            let fresh = self.ctx.ids.fresh_opaque();
            self.ctx.defs.register_opaque(fresh, def);
            renames.insert(old, fresh);
        }
        let record = rename_opaques_in_sig(&sig.sig, &renames);
        let opaques = sig.opaques.iter().map(|id| renames[id]).collect();
        AbstractedSig::new(opaques, record)
    }

    /// Decodes a surface type annotation that carries no explicit
    /// parameter-name list (`SigItem::Val`/`SigItem::Type`'s manifest,
    /// `Binding::External`) by minting a fresh rigid `BoundId` for each
    /// distinct `TypeExpr::Var` on its first occurrence, in left-to-right
    /// order.
    fn decode_with_implicit_vars(&mut self, env: &Environment, ty: &Spanned<TypeExpr>) -> ElabResult<(Vec<hiveml_ids::BoundId>, Type)> {
        let mut scope = TypeParamScope::default();
        let mut order = Vec::new();
        collect_implicit_vars(&mut self.ctx.ids, ty, &mut scope, &mut order);
        let mut deps = DecodeDeps::default();
        let decoded = decode_type(self.ctx, env, &scope, &mut deps, ty)?;
        Ok((order, decoded))
    }

    // -- Module expressions -------------------------------------------

    fn elaborate_module_expr(&mut self, env: &mut Environment, path: &[String], expr: &Spanned<ModuleExpr>) -> ElabResult<ModuleValue> {
        match &expr.node {
            ModuleExpr::Var(name) => {
                let binding = env.lookup_module(name).ok_or_else(|| ElabError::UnboundModuleName { name: name.clone(), span: expr.span })?.clone();
                match binding {
                    ModuleBinding::Structure { opaques, sig } => {
                        Ok(ModuleValue::Structure { opaques, sig, source: env.clone(), bindings: Vec::new() })
                    }
                    ModuleBinding::Functor { id, opaques, domain, codomain } => Ok(ModuleValue::Functor { id, opaques, domain, codomain }),
                }
            }

            ModuleExpr::Struct(items) => {
                let mut scratch = env.clone();
                let mut fragment = SigRecord::new();
                let mut opaques = Vec::new();
                for item in items {
                    let (item_opaques, item_fragment) = self.typecheck_binding(&mut scratch, path, item)?;
                    opaques.extend(item_opaques);
                    merge_fragment(&mut fragment, item_fragment, item.span)?;
                }
                Ok(ModuleValue::Structure { opaques, sig: fragment, source: scratch, bindings: Vec::new() })
            }

            ModuleExpr::Functor { param, param_sig, body } => {
                let domain_abstracted = self.elaborate_sig_expr(env, param_sig)?;
                // Definition-time preview: elaborate the body against a
                // scratch parameter binding so a contradiction inside the
                // functor (spec §8 scenario 5) is reported where the
                // functor itself is defined, not deferred to its first
                // application.
                let mut preview_env = env.clone();
                bind_param_into(self, &mut preview_env, param, &domain_abstracted);
                let saved_bindings = std::mem::take(&mut self.bindings);
                let saved_diags = std::mem::take(&mut self.diagnostics);
                let preview = self.elaborate_module_expr(&mut preview_env, &extended_path(path, param), body);
                self.bindings = saved_bindings;
                self.diagnostics = saved_diags;
                let preview = preview?;
                let codomain = match preview {
                    ModuleValue::Structure { sig, .. } => sig,
                    ModuleValue::Functor { .. } => return Err(ElabError::SupportOnlyFirstOrderFunctor { span: expr.span }),
                };
                let id = self.ctx.ids.fresh_functor();
                self.closures.insert(
                    id,
                    FunctorClosure {
                        param: param.clone(),
                        domain: domain_abstracted.sig.clone(),
                        domain_opaques: domain_abstracted.opaques.clone(),
                        body: (**body).clone(),
                        captured_env: env.clone(),
                    },
                );
                Ok(ModuleValue::Functor { id, opaques: domain_abstracted.opaques, domain: domain_abstracted.sig, codomain })
            }

            ModuleExpr::Apply(functor_expr, arg_expr) => {
                let functor_value = self.elaborate_module_expr(env, path, functor_expr)?;
                let ModuleValue::Functor { id, domain, codomain, .. } = functor_value else {
                    return Err(ElabError::NotOfFunctorType { span: functor_expr.span });
                };
                let arg_value = self.elaborate_module_expr(env, path, arg_expr)?;
                let ModuleValue::Structure { opaques: arg_opaques, sig: arg_sig, source: arg_source, bindings: arg_bindings } = arg_value else {
                    return Err(ElabError::NotOfStructureType { span: arg_expr.span });
                };
                self.bindings.extend(arg_bindings);
                subtype_sig_record(self.ctx, &arg_sig, &domain, arg_expr.span)?;
                tracing::debug!("applying functor {id:?}, re-elaborating body against the real argument");

                let closure = self
                    .closures
                    .get(&id)
                    .unwrap_or_else(|| panic!("functor {id:?} applied with no closure registered"))
                    .clone_shallow();
                let mut application_env = closure.captured_env.clone();
                flatten_sig_into_env(self.ctx, &mut application_env, &[], &closure.param, &arg_sig, ValueSource::From(&arg_source));
                let result = self.elaborate_module_expr(&mut application_env, &extended_path(path, &closure.param), &closure.body)?;
                let ModuleValue::Structure { opaques: mut result_opaques, sig: result_sig, source: result_source, bindings: result_bindings } = result
                else {
                    return Err(ElabError::SupportOnlyFirstOrderFunctor { span: expr.span });
                };
                self.bindings.extend(result_bindings);
                result_opaques.extend(arg_opaques);
                let _ = codomain;
                Ok(ModuleValue::Structure { opaques: result_opaques, sig: result_sig, source: result_source, bindings: Vec::new() })
            }

            ModuleExpr::Proj(base, name) => {
                let base_value = self.elaborate_module_expr(env, path, base)?;
                let ModuleValue::Structure { opaques, sig, source, bindings } = base_value else {
                    return Err(ElabError::NotOfStructureType { span: base.span });
                };
                self.bindings.extend(bindings);
                let projected = sig
                    .submodules
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ElabError::MissingRequiredModuleName { name: name.clone(), span: expr.span })?;
                // The projected submodule's opaque ownership is
                // approximated by passing through the whole parent list
                // (ledger simplification (b)): we don't currently track
                // which of `opaques` a given submodule actually
                // introduced, only that the parent structure as a whole
                // owns them.
                Ok(ModuleValue::Structure { opaques, sig: projected, source, bindings: Vec::new() })
            }

            ModuleExpr::Coerce(base, sig_expr) => {
                let base_value = self.elaborate_module_expr(env, path, base)?;
                let ModuleValue::Structure { sig: actual_sig, source, bindings, .. } = base_value else {
                    return Err(ElabError::NotOfStructureType { span: base.span });
                };
                self.bindings.extend(bindings);
                let required = self.elaborate_sig_expr(env, sig_expr)?;
                subtype_sig_record(self.ctx, &actual_sig, &required.sig, expr.span)?;
                Ok(ModuleValue::Structure { opaques: required.opaques, sig: required.sig, source, bindings: Vec::new() })
            }
        }
    }

    // -- Top-level bindings ---------------------------------------------

    /// Typechecks one structure-level binding, writing its members
    /// directly into `env` and returning the opaque IDs it introduces plus
    /// the signature fragment it contributes.
    fn typecheck_binding(&mut self, env: &mut Environment, path: &[String], binding: &Spanned<hiveml_syntax::Binding>) -> ElabResult<(Vec<OpaqueId>, SigRecord)> {
        match &binding.node {
            hiveml_syntax::Binding::Val { recursive, bindings } => {
                let fragment = self.typecheck_val_group(env, path, *recursive, bindings, binding.span)?;
                Ok((Vec::new(), fragment))
            }

            hiveml_syntax::Binding::External { name, ty, arity: _ } => {
                let (params, decoded) = self.decode_with_implicit_vars(env, ty)?;
                let poly = PolyType { vars: params, var_kinds: Vec::new(), row_vars: Vec::new(), body: decoded };
                let global = self.ctx.ids.fresh_global_name();
                let resolved = ResolvedName::Global(global);
                env.bind(name.clone(), poly.clone(), binding.span, resolved);
                env.bind(qualify(path, name), poly.clone(), binding.span, resolved);
                Ok((Vec::new(), SigRecord::new().with_value(name.clone(), poly)))
            }

            hiveml_syntax::Binding::Type(decls) => {
                let fragment = self.typecheck_type_group(env, path, decls, binding.span)?;
                Ok((Vec::new(), fragment))
            }

            hiveml_syntax::Binding::Module { name, sig, expr } => {
                let module_path = extended_path(path, name);
                let value = self.elaborate_module_expr(env, &module_path, expr)?;
                let (opaques, sealed_sig, source, new_bindings) = match value {
                    ModuleValue::Structure { opaques, sig: principal, source, bindings } => match sig {
                        Some(required_sig) => {
                            let required = self.elaborate_sig_expr(env, required_sig)?;
                            subtype_sig_record(self.ctx, &principal, &required.sig, binding.span)?;
                            (required.opaques, required.sig, source, bindings)
                        }
                        None => (opaques, principal, source, bindings),
                    },
                    ModuleValue::Functor { id, opaques, domain, codomain } => {
                        let module_binding = ModuleBinding::Functor { id, opaques: opaques.clone(), domain, codomain };
                        env.bind_module(name.clone(), module_binding.clone());
                        env.bind_module(qualify(path, name), module_binding);
                        return Ok((opaques, SigRecord::new()));
                    }
                };
                self.bindings.extend(new_bindings);
                flatten_sig_into_env(self.ctx, env, &module_path, name, &sealed_sig, ValueSource::From(&source));
                let module_binding = ModuleBinding::Structure { opaques: opaques.clone(), sig: sealed_sig.clone() };
                env.bind_module(name.clone(), module_binding.clone());
                env.bind_module(qualify(path, name), module_binding);
                Ok((opaques, SigRecord::new().with_submodule(name.clone(), sealed_sig)))
            }

            hiveml_syntax::Binding::Include(expr) => {
                let value = self.elaborate_module_expr(env, path, expr)?;
                let ModuleValue::Structure { opaques, sig, source, bindings } = value else {
                    return Err(ElabError::NotOfStructureType { span: expr.span });
                };
                self.bindings.extend(bindings);
                flatten_sig_into_env(self.ctx, env, path, "", &sig, ValueSource::From(&source));
                Ok((opaques, sig))
            }

            hiveml_syntax::Binding::Sig { name, sig } => {
                let resolved = self.elaborate_sig_expr(env, sig)?;
                env.bind_signature(name.clone(), resolved);
                Ok((Vec::new(), SigRecord::new()))
            }
        }
    }

    /// Mirrors `expr::infer_expr`'s `Let`/`LetRec` arms but binds every
    /// name as a fresh `GlobalName` directly into the shared module
    /// environment rather than a `push_scope`d local frame, and never
    /// forces a lambda's own `self_name` slot (module-level recursion is
    /// resolved by ordinary global-name lookup, not the lambda
    /// self-reference optimization `letrec` uses internally).
    fn typecheck_val_group(
        &mut self,
        env: &mut Environment,
        path: &[String],
        recursive: bool,
        bindings: &[(String, Spanned<hiveml_syntax::Expr>)],
        span: Span,
    ) -> ElabResult<SigRecord> {
        let mut fragment = SigRecord::new();
        let effect = self.ctx.fresh_type_var();

        if recursive {
            self.ctx.enter_level();
            let mut placeholders = Vec::new();
            let mut globals = Vec::new();
            for (name, _) in bindings {
                let ph = self.ctx.fresh_type_var();
                let global = self.ctx.ids.fresh_global_name();
                env.bind(name.clone(), PolyType::monomorphic(ph.clone()), span, ResolvedName::Global(global));
                env.bind(qualify(path, name), PolyType::monomorphic(ph.clone()), span, ResolvedName::Global(global));
                placeholders.push(ph);
                globals.push(global);
            }
            let mut bodies = Vec::new();
            for ((name, value_expr), ph) in bindings.iter().zip(placeholders.iter()) {
                let hiveml_syntax::Expr::Lambda { self_name, params, body } = &value_expr.node else {
                    return Err(ElabError::LetRecBindingMustBeAFunction { name: name.clone(), span: value_expr.span });
                };
                let mut cx = Checker { ctx: &mut *self.ctx, ids: self.ids, type_params: TypeParamScope::default() };
                let (vty, _veff, vir) =
                    check_lambda(&mut cx, env, &effect, &mut self.diagnostics, 0, self_name, params, body, value_expr.span, None)?;
                unify_checked(self.ctx, vty, ph.clone(), value_expr.span)?;
                bodies.push(vir);
            }
            self.ctx.exit_level();
            for (((name, _), ph), global) in bindings.iter().zip(placeholders.iter()).zip(globals.iter()) {
                let resolved_ty = self.ctx.resolve(ph.clone());
                let poly = generalize(self.ctx, self.ctx.current_level, resolved_ty)
                    .map_err(|GeneralizeError::CyclicDependency(cyc)| map_cycle(cyc, span))?;
                env.bind(name.clone(), poly.clone(), span, ResolvedName::Global(*global));
                env.bind(qualify(path, name), poly.clone(), span, ResolvedName::Global(*global));
                fragment.values.insert(name.clone(), poly);
            }
            for ((name, _), (ir, global)) in bindings.iter().zip(bodies.into_iter().zip(globals.into_iter())) {
                let ty = fragment.values[name].body.clone();
                self.bindings.push(IrBinding { name: global, source_name: name.clone(), ty, body: ir });
            }
        } else {
            let mut results = Vec::new();
            for (name, value_expr) in bindings {
                self.ctx.enter_level();
                let mut cx = Checker { ctx: &mut *self.ctx, ids: self.ids, type_params: TypeParamScope::default() };
                let (vty, _veff, vir) = infer_expr(&mut cx, env, &effect, &mut self.diagnostics, 0, value_expr)?;
                self.ctx.exit_level();
                let resolved_vty = self.ctx.resolve(vty);
                let poly = generalize(self.ctx, self.ctx.current_level, resolved_vty)
                    .map_err(|GeneralizeError::CyclicDependency(cyc)| map_cycle(cyc, span))?;
                results.push((name.clone(), poly, vir));
            }
            for (name, poly, ir) in results {
                let global = self.ctx.ids.fresh_global_name();
                env.bind(name.clone(), poly.clone(), span, ResolvedName::Global(global));
                env.bind(qualify(path, &name), poly.clone(), span, ResolvedName::Global(global));
                self.bindings.push(IrBinding { name: global, source_name: name.clone(), ty: poly.body.clone(), body: ir });
                fragment.values.insert(name, poly);
            }
        }
        Ok(fragment)
    }

    /// Two-pass: every declared name gets a fresh `DataTypeId` and (for a
    /// variant) rigid parameter scope first, so mutually recursive
    /// synonyms/variants in the same `type ... and ...` group can refer to
    /// each other; bodies are decoded second. A synonym-dependency cycle
    /// confined to this group's own fresh IDs is then rejected via the
    /// shared Tarjan-style finder.
    fn typecheck_type_group(&mut self, env: &mut Environment, path: &[String], decls: &[TypeDecl], span: Span) -> ElabResult<SigRecord> {
        let mut fragment = SigRecord::new();
        let mut fresh_synonyms = Vec::new();

        enum Pending {
            Synonym { id: hiveml_ids::SynonymId, params: Vec<String>, scope: TypeParamScope, body: Spanned<TypeExpr> },
            Variant { id: hiveml_ids::VariantId, params: Vec<String>, scope: TypeParamScope, ctors: Vec<hiveml_syntax::CtorDecl> },
        }
        let mut pending = Vec::new();

        for decl in decls {
            match decl {
                TypeDecl::Synonym { name, params, body } => {
                    let id = self.ctx.ids.fresh_synonym();
                    let scope = bind_rigid_params(self.ctx, params, span)?;
                    env.bind_type(name.clone(), TypeBinding { id: DataTypeId::Synonym(id), arity: params.len() });
                    env.bind_type(qualify(path, name), TypeBinding { id: DataTypeId::Synonym(id), arity: params.len() });
                    pending.push((name.clone(), Pending::Synonym { id, params: params.clone(), scope, body: body.clone() }));
                }
                TypeDecl::Variant { name, params, ctors } => {
                    let id = self.ctx.ids.fresh_variant();
                    let scope = bind_rigid_params(self.ctx, params, span)?;
                    env.bind_type(name.clone(), TypeBinding { id: DataTypeId::Variant(id), arity: params.len() });
                    env.bind_type(qualify(path, name), TypeBinding { id: DataTypeId::Variant(id), arity: params.len() });
                    pending.push((name.clone(), Pending::Variant { id, params: params.clone(), scope, ctors: ctors.clone() }));
                }
            }
        }

        for (name, item) in pending {
            match item {
                Pending::Synonym { id, params, scope, body } => {
                    let mut deps = DecodeDeps::default();
                    let decoded = decode_type(self.ctx, env, &scope, &mut deps, &body)?;
                    let bound_ids: Vec<hiveml_ids::BoundId> = params.iter().map(|p| scope.vars[p]).collect();
                    self.ctx.defs.register_synonym(id, SynonymDef { name: name.clone(), params: bound_ids, body: decoded.clone(), module_path: path.to_vec() });
                    fresh_synonyms.push(id);
                    fragment.types.insert(name, TypeSigItem::Manifest { params: params.len(), body: decoded });
                }
                Pending::Variant { id, params, scope, ctors } => {
                    let mut ctor_map = indexmap::IndexMap::new();
                    for ctor in &ctors {
                        let mut param_types = Vec::new();
                        for p in &ctor.params {
                            let mut deps = DecodeDeps::default();
                            param_types.push(decode_type(self.ctx, env, &scope, &mut deps, p)?);
                        }
                        let ctor_id = self.ctx.ids.fresh_ctor();
                        env.bind_ctor(ctor.name.clone(), id);
                        ctor_map.insert(ctor.name.clone(), CtorDef { owner: id, id: ctor_id, name: ctor.name.clone(), params: param_types });
                    }
                    let bound_ids: Vec<hiveml_ids::BoundId> = params.iter().map(|p| scope.vars[p]).collect();
                    self.ctx.defs.register_variant(id, VariantDef { name: name.clone(), params: bound_ids.clone(), ctors: ctor_map, module_path: path.to_vec() });
                    let body = Type::Data(DataTypeId::Variant(id), bound_ids.iter().map(|&b| Type::Bound(b)).collect());
                    fragment.types.insert(name, TypeSigItem::Manifest { params: params.len(), body });
                }
            }
        }

        if !fresh_synonyms.is_empty() {
            let graph = hiveml_env::SynonymGraph::build(&self.ctx.defs);
            let group: rustc_hash::FxHashSet<_> = fresh_synonyms.iter().copied().collect();
            for cyc in hiveml_env::synonym_cycles(&graph) {
                if cyc.iter().any(|id| group.contains(id)) {
                    return Err(ElabError::CyclicSynonymTypeDefinition { ids: cyc, span });
                }
            }
        }

        Ok(fragment)
    }
}

impl FunctorClosure {
    fn clone_shallow(&self) -> FunctorClosure {
        FunctorClosure {
            param: self.param.clone(),
            domain: self.domain.clone(),
            domain_opaques: self.domain_opaques.clone(),
            body: self.body.clone(),
            captured_env: self.captured_env.clone(),
        }
    }
}

/// Binds a functor parameter's abstract shape (no real structure behind
/// it yet) into a scratch environment for the definition-time preview
/// pass, minting fresh `GlobalName`s for its values and fresh type
/// bindings for its abstract/manifest types.
fn bind_param_into(elab: &mut ModuleElaborator, env: &mut Environment, param: &str, sig: &AbstractedSig) {
    flatten_sig_into_env(elab.ctx, env, &[param.to_string()], param, &sig.sig, ValueSource::Mint);
}

/// Writes every member of `sig` into `env`, under both its bare name and
/// its path-qualified name (`qualify(module_path, name)`), recursing into
/// submodules with an extended path. `source` decides whether a value's
/// `ResolvedName` is minted fresh (a functor parameter's abstract preview)
/// or pulled from a real structure's own environment (everywhere else).
fn flatten_sig_into_env(
    ctx: &mut InferenceContext,
    env: &mut Environment,
    module_path: &[String],
    module_name: &str,
    sig: &SigRecord,
    source: ValueSource,
) {
    let path = if module_name.is_empty() { module_path.to_vec() } else { extended_path(module_path, module_name) };
    for (name, poly) in &sig.values {
        let resolved = match source {
            ValueSource::Mint => ResolvedName::Global(env_mint_placeholder()),
            ValueSource::From(src) => src
                .peek(name)
                .or_else(|| src.peek(&qualify(&path, name)))
                .map(|b| b.resolved)
                .unwrap_or_else(|| ResolvedName::Global(env_mint_placeholder())),
        };
        env.bind(name.clone(), poly.clone(), Span::dummy(), resolved);
        env.bind(qualify(&path, name), poly.clone(), Span::dummy(), resolved);
    }
    for (name, item) in &sig.types {
        let binding = TypeBinding {
            id: match item {
                TypeSigItem::Manifest { body, .. } => data_id_for_manifest(ctx, body),
                TypeSigItem::Abstract { witness, .. } => DataTypeId::Opaque(*witness),
            },
            arity: item.arity(),
        };
        env.bind_type(name.clone(), binding.clone());
        env.bind_type(qualify(&path, name), binding);
    }
    for (name, sub) in &sig.submodules {
        let sub_source = match source {
            ValueSource::Mint => ValueSource::Mint,
            ValueSource::From(src) => ValueSource::From(src),
        };
        flatten_sig_into_env(ctx, env, &path, name, sub, sub_source);
        env.bind_module(name.clone(), ModuleBinding::Structure { opaques: Vec::new(), sig: sub.clone() });
        env.bind_module(qualify(&path, name), ModuleBinding::Structure { opaques: Vec::new(), sig: sub.clone() });
    }
}

thread_local! {
    static PLACEHOLDER_COUNTER: std::cell::Cell<u32> = const { std::cell::Cell::new(0) };
}

/// Mints a `GlobalName` outside any `InferenceContext`, for the rare case
/// `flatten_sig_into_env` is sourcing real names but a field is missing
/// from the source environment (should not happen for a well-formed
/// structure; defensive only). Kept process-local and monotonic so two
/// placeholders are never confused with each other.
fn env_mint_placeholder() -> GlobalName {
    PLACEHOLDER_COUNTER.with(|c| {
        let v = c.get();
        c.set(v + 1);
        GlobalName(u32::MAX - v)
    })
}

/// A manifest type's signature item carries no `DataTypeId`, so
/// projecting a qualified reference to it (`X.t`) needs a real type
/// binding to resolve against. We synthesize one: a zero-arity synonym
/// wrapping the manifest body directly, registered in `ctx.defs` the
/// same way an ordinary `type` declaration would be — `unify`/`generalize`
/// expand it eagerly, so the wrapper is structurally transparent
/// everywhere a reference to it is unified against the body itself.
fn data_id_for_manifest(ctx: &mut InferenceContext, body: &Type) -> DataTypeId {
    let id = ctx.ids.fresh_synonym();
    ctx.defs.register_synonym(id, SynonymDef { name: "<manifest>".to_string(), params: Vec::new(), body: body.clone(), module_path: Vec::new() });
    DataTypeId::Synonym(id)
}

/// Merges one binding's signature fragment into the structure's
/// accumulated signature, rejecting a name already defined earlier in the
/// same structure. A functor-valued `Binding::Module` contributes no
/// fragment at all (ledger simplification (e)): two same-named functors
/// in one structure are not caught by this check.
fn merge_fragment(acc: &mut SigRecord, fragment: SigRecord, span: Span) -> ElabResult<()> {
    for (name, poly) in fragment.values {
        if acc.values.insert(name.clone(), poly).is_some() {
            return Err(ElabError::ConflictInSignature { name, span });
        }
    }
    for (name, item) in fragment.types {
        if acc.types.insert(name.clone(), item).is_some() {
            return Err(ElabError::ConflictInSignature { name, span });
        }
    }
    for (name, sub) in fragment.submodules {
        if acc.submodules.insert(name.clone(), sub).is_some() {
            return Err(ElabError::ConflictInSignature { name, span });
        }
    }
    Ok(())
}

/// Collects every distinct `TypeExpr::Var` name in `ty`, in first-occurrence
/// order, minting a fresh rigid `BoundId` for each and recording it both in
/// `scope` (for `decode_type`) and in `order` (so the caller can build an
/// arity-ordered `PolyType::vars`).
fn collect_implicit_vars(ids: &mut hiveml_ids::IdGen, ty: &Spanned<TypeExpr>, scope: &mut TypeParamScope, order: &mut Vec<hiveml_ids::BoundId>) {
    match &ty.node {
        TypeExpr::Var(name) => {
            if !scope.vars.contains_key(name) {
                let id = ids.fresh_bound();
                scope.vars.insert(name.clone(), id);
                order.push(id);
            }
        }
        TypeExpr::Con(_, args) | TypeExpr::ModuleProjected(_, _, args) => {
            for a in args {
                collect_implicit_vars(ids, a, scope, order);
            }
        }
        TypeExpr::Pid(inner) => collect_implicit_vars(ids, inner, scope, order),
        TypeExpr::Record(fields, _) => {
            for (_, t) in fields {
                collect_implicit_vars(ids, t, scope, order);
            }
        }
        TypeExpr::Function(domain, ret) => {
            collect_implicit_vars_domain(ids, domain, scope, order);
            collect_implicit_vars(ids, ret, scope, order);
        }
        TypeExpr::Effectful(domain, eff, ret) => {
            collect_implicit_vars_domain(ids, domain, scope, order);
            collect_implicit_vars(ids, eff, scope, order);
            collect_implicit_vars(ids, ret, scope, order);
        }
    }
}

fn collect_implicit_vars_domain(ids: &mut hiveml_ids::IdGen, domain: &hiveml_syntax::DomainExpr, scope: &mut TypeParamScope, order: &mut Vec<hiveml_ids::BoundId>) {
    for t in &domain.ordered {
        collect_implicit_vars(ids, t, scope, order);
    }
    for (_, t) in &domain.mandatory {
        collect_implicit_vars(ids, t, scope, order);
    }
    for (_, t) in &domain.optional {
        collect_implicit_vars(ids, t, scope, order);
    }
}

fn rename_opaques_in_sig(sig: &SigRecord, renames: &FxHashMap<OpaqueId, OpaqueId>) -> SigRecord {
    let mut out = SigRecord::new();
    for (name, poly) in &sig.values {
        out.values.insert(
            name.clone(),
            PolyType {
                vars: poly.vars.clone(),
                var_kinds: poly.var_kinds.clone(),
                row_vars: poly.row_vars.clone(),
                body: rename_opaques_in_type(&poly.body, renames),
            },
        );
    }
    for (name, item) in &sig.types {
        let renamed = match item {
            TypeSigItem::Manifest { params, body } => TypeSigItem::Manifest { params: *params, body: rename_opaques_in_type(body, renames) },
            TypeSigItem::Abstract { params, witness } => TypeSigItem::Abstract { params: *params, witness: renames.get(witness).copied().unwrap_or(*witness) },
        };
        out.types.insert(name.clone(), renamed);
    }
    for (name, sub) in &sig.submodules {
        out.submodules.insert(name.clone(), rename_opaques_in_sig(sub, renames));
    }
    out
}

fn rename_opaques_in_type(ty: &Type, renames: &FxHashMap<OpaqueId, OpaqueId>) -> Type {
    match ty {
        Type::Data(DataTypeId::Opaque(id), args) => {
            Type::Data(DataTypeId::Opaque(renames.get(id).copied().unwrap_or(*id)), args.iter().map(|t| rename_opaques_in_type(t, renames)).collect())
        }
        Type::Data(other, args) => Type::Data(*other, args.iter().map(|t| rename_opaques_in_type(t, renames)).collect()),
        Type::Scalar(_) | Type::Var(_) | Type::Bound(_) => ty.clone(),
        Type::Product(items) => Type::Product(items.iter().map(|t| rename_opaques_in_type(t, renames)).collect()),
        Type::Record(row) => Type::Record(rename_opaques_in_row(row, renames)),
        Type::Function(dom, ret) => Type::Function(Box::new(rename_opaques_in_domain(dom, renames)), Box::new(rename_opaques_in_type(ret, renames))),
        Type::Effectful(dom, eff, ret) => Type::Effectful(
            Box::new(rename_opaques_in_domain(dom, renames)),
            Box::new(rename_opaques_in_type(eff, renames)),
            Box::new(rename_opaques_in_type(ret, renames)),
        ),
        Type::Pid(inner) => Type::Pid(Box::new(rename_opaques_in_type(inner, renames))),
    }
}

fn rename_opaques_in_domain(dom: &hiveml_types::Domain, renames: &FxHashMap<OpaqueId, OpaqueId>) -> hiveml_types::Domain {
    hiveml_types::Domain {
        ordered: dom.ordered.iter().map(|t| rename_opaques_in_type(t, renames)).collect(),
        mandatory: dom.mandatory.iter().map(|(k, t)| (k.clone(), rename_opaques_in_type(t, renames))).collect(),
        optional: rename_opaques_in_row(&dom.optional, renames),
    }
}

fn rename_opaques_in_row(row: &hiveml_types::Row, renames: &FxHashMap<OpaqueId, OpaqueId>) -> hiveml_types::Row {
    match row {
        hiveml_types::Row::Fixed(labels) => hiveml_types::Row::Fixed(labels.iter().map(|(k, t)| (k.clone(), rename_opaques_in_type(t, renames))).collect()),
        other => other.clone(),
    }
}

/// `with type` substitution: replaces every zero-argument occurrence of
/// `witness` with `replacement` throughout a signature. See
/// `ModuleElaborator::refine_with_type` for why non-zero-arity witnesses
/// are left alone.
fn substitute_opaque_in_sig(sig: &mut SigRecord, witness: OpaqueId, replacement: &Type) {
    for poly in sig.values.values_mut() {
        poly.body = substitute_opaque_in_type(&poly.body, witness, replacement);
    }
    for item in sig.types.values_mut() {
        if let TypeSigItem::Manifest { body, .. } = item {
            *body = substitute_opaque_in_type(body, witness, replacement);
        }
    }
    for sub in sig.submodules.values_mut() {
        substitute_opaque_in_sig(sub, witness, replacement);
    }
}

fn substitute_opaque_in_type(ty: &Type, witness: OpaqueId, replacement: &Type) -> Type {
    match ty {
        Type::Data(DataTypeId::Opaque(id), args) if *id == witness && args.is_empty() => replacement.clone(),
        Type::Data(id, args) => Type::Data(*id, args.iter().map(|t| substitute_opaque_in_type(t, witness, replacement)).collect()),
        Type::Scalar(_) | Type::Var(_) | Type::Bound(_) => ty.clone(),
        Type::Product(items) => Type::Product(items.iter().map(|t| substitute_opaque_in_type(t, witness, replacement)).collect()),
        Type::Record(row) => Type::Record(substitute_opaque_in_row(row, witness, replacement)),
        Type::Function(dom, ret) => {
            Type::Function(Box::new(substitute_opaque_in_domain(dom, witness, replacement)), Box::new(substitute_opaque_in_type(ret, witness, replacement)))
        }
        Type::Effectful(dom, eff, ret) => Type::Effectful(
            Box::new(substitute_opaque_in_domain(dom, witness, replacement)),
            Box::new(substitute_opaque_in_type(eff, witness, replacement)),
            Box::new(substitute_opaque_in_type(ret, witness, replacement)),
        ),
        Type::Pid(inner) => Type::Pid(Box::new(substitute_opaque_in_type(inner, witness, replacement))),
    }
}

fn substitute_opaque_in_domain(dom: &hiveml_types::Domain, witness: OpaqueId, replacement: &Type) -> hiveml_types::Domain {
    hiveml_types::Domain {
        ordered: dom.ordered.iter().map(|t| substitute_opaque_in_type(t, witness, replacement)).collect(),
        mandatory: dom.mandatory.iter().map(|(k, t)| (k.clone(), substitute_opaque_in_type(t, witness, replacement))).collect(),
        optional: substitute_opaque_in_row(&dom.optional, witness, replacement),
    }
}

fn substitute_opaque_in_row(row: &hiveml_types::Row, witness: OpaqueId, replacement: &Type) -> hiveml_types::Row {
    match row {
        hiveml_types::Row::Fixed(labels) => {
            hiveml_types::Row::Fixed(labels.iter().map(|(k, t)| (k.clone(), substitute_opaque_in_type(t, witness, replacement))).collect())
        }
        other => other.clone(),
    }
}

/// Elaborates a whole program: every top-level binding in declaration
/// order, folded into one shared environment and one accumulated
/// signature fragment. The root module is always a structure (spec's
/// `RootModuleMustBeStructure`, mirrored here structurally rather than
/// checked explicitly — `Program` has no way to express anything else).
pub fn elaborate_program(ctx: &mut InferenceContext, ids: WellKnownIds, env: &mut Environment, program: &Program) -> ElabResult<ElaborationOutput> {
    let top_level = ctx.ids.fresh_global_name();
    let mut elaborator = ModuleElaborator::new(ctx, ids);
    let mut fragment = SigRecord::new();
    let mut opaques = Vec::new();
    for binding in &program.bindings {
        let (item_opaques, item_fragment) = elaborator.typecheck_binding(env, &[], binding)?;
        opaques.extend(item_opaques);
        merge_fragment(&mut fragment, item_fragment, binding.span)?;
    }
    Ok(ElaborationOutput {
        tyenv: env.clone(),
        signature: AbstractedSig::new(opaques, fragment),
        top_level,
        bindings: elaborator.bindings,
        diagnostics: elaborator.diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hiveml_common::Span;
    use hiveml_syntax::{CallArgs, Expr, Params};

    fn dummy<T>(node: T) -> Spanned<T> {
        Spanned::new(node, Span::dummy())
    }

    fn fresh() -> (InferenceContext, Environment, WellKnownIds) {
        let mut ctx = InferenceContext::new();
        let (env, ids) = crate::primitives::builtin_environment(&mut ctx);
        (ctx, env, ids)
    }

    #[test]
    fn polymorphic_identity_binding_generalizes_at_module_level() {
        let (mut ctx, mut env, ids) = fresh();
        let identity = dummy(Expr::Lambda {
            self_name: None,
            params: Params { ordered: vec![dummy(hiveml_syntax::Pattern::Var("x".into()))], mandatory: vec![], optional: vec![] },
            body: Box::new(dummy(Expr::Var("x".into()))),
        });
        let program = Program { bindings: vec![dummy(hiveml_syntax::Binding::Val { recursive: false, bindings: vec![("id".into(), identity)] })] };
        let output = elaborate_program(&mut ctx, ids, &mut env, &program).expect("identity binding elaborates");
        assert_eq!(output.bindings.len(), 1);
        assert!(output.signature.sig.values.contains_key("id"));
    }

    #[test]
    fn cyclic_synonym_group_is_rejected() {
        let (mut ctx, mut env, ids) = fresh();
        let decls = vec![
            TypeDecl::Synonym { name: "a".into(), params: vec![], body: dummy(TypeExpr::Con("b".into(), vec![])) },
            TypeDecl::Synonym { name: "b".into(), params: vec![], body: dummy(TypeExpr::Con("a".into(), vec![])) },
        ];
        let program = Program { bindings: vec![dummy(hiveml_syntax::Binding::Type(decls))] };
        let result = elaborate_program(&mut ctx, ids, &mut env, &program);
        assert!(matches!(result, Err(ElabError::CyclicSynonymTypeDefinition { .. })));
    }

    #[test]
    fn module_ascription_seals_an_abstract_type() {
        let (mut ctx, mut env, ids) = fresh();
        let sig = dummy(SigExpr::Sig(vec![SigItem::Type { name: "t".into(), arity: 0, manifest: None }]));
        let body = ModuleExpr::Struct(vec![dummy(hiveml_syntax::Binding::Type(vec![TypeDecl::Synonym {
            name: "t".into(),
            params: vec![],
            body: dummy(TypeExpr::Con("int".into(), vec![])),
        }]))]);
        let program = Program {
            bindings: vec![dummy(hiveml_syntax::Binding::Module { name: "M".into(), sig: Some(sig), expr: dummy(body) })],
        };
        let output = elaborate_program(&mut ctx, ids, &mut env, &program).expect("sealed module elaborates");
        let m = &output.signature.sig.submodules["M"];
        assert!(matches!(m.types["t"], TypeSigItem::Abstract { .. }));
    }

    #[test]
    fn two_functor_parameters_of_the_same_signature_get_distinct_opaque_witnesses() {
        let (mut ctx, mut env, ids) = fresh();
        let point_sig = AbstractedSig::new(vec![], SigRecord::new());
        let _ = point_sig;
        let sig = dummy(SigExpr::Sig(vec![SigItem::Type { name: "t".into(), arity: 0, manifest: None }]));
        env.bind_signature("POINT".into(), {
            let mut elab = ModuleElaborator::new(&mut ctx, ids);
            elab.elaborate_sig_expr(&env.clone(), &sig).expect("POINT elaborates")
        });
        let first = env.lookup_signature("POINT").unwrap().clone();
        let mut elab = ModuleElaborator::new(&mut ctx, ids);
        let second = elab.copy_abstracted_sig(&first);
        assert_ne!(first.opaques[0], second.opaques[0]);
    }
}
