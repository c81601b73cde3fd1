//! Component E: the lexical environment.
//!
//! Scoping is a plain stack of frames, closest scope last, one stack per
//! namespace (values, types, constructors, modules, signatures) so that
//! `type t` and `val t` never collide. Lookup walks each stack from the
//! top down and stops at the first hit — exactly lexical shadowing,
//! nothing fancier. Each value `Binding` carries a `Cell<bool>` marking
//! whether it has been read; `hiveml-elab` checks this when a
//! `let`-scope closes to emit the unused-binding warning named in the
//! error-handling design (a `Diagnostic`, not a hard `ElabError`, since
//! an unused binding never blocks elaboration).

use std::cell::Cell;

use indexmap::IndexMap;

use hiveml_common::Span;
use hiveml_ids::{FunctorId, OpaqueId, ResolvedName, VariantId};
use hiveml_types::{DataTypeId, PolyType};

use crate::signature::{AbstractedSig, SigRecord};

#[derive(Clone, Debug)]
pub struct Binding {
    pub scheme: PolyType,
    pub span: Span,
    /// The name the elaborated IR should reference this binding by.
    pub resolved: ResolvedName,
    used: Cell<bool>,
}

impl Binding {
    pub fn new(scheme: PolyType, span: Span, resolved: ResolvedName) -> Self {
        Binding { scheme, span, resolved, used: Cell::new(false) }
    }

    pub fn mark_used(&self) {
        self.used.set(true);
    }

    pub fn is_used(&self) -> bool {
        self.used.get()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeBinding {
    pub id: DataTypeId,
    pub arity: usize,
}

/// What a bound module name resolves to: either a concrete structure (an
/// abstracted signature, its existentials already witnessed by whatever
/// sealed it) or a functor — domain and codomain signatures for subtyping
/// plus the `FunctorId` keying the closure (parameter name, body AST,
/// definition-site environment) that `hiveml-elab`'s module elaborator
/// keeps alongside, since this crate has no dependency on `hiveml-syntax`
/// and so cannot hold an AST itself.
#[derive(Clone, Debug)]
pub enum ModuleBinding {
    Structure { opaques: Vec<OpaqueId>, sig: SigRecord },
    Functor { id: FunctorId, opaques: Vec<OpaqueId>, domain: SigRecord, codomain: SigRecord },
}

#[derive(Clone, Debug, Default)]
pub struct Environment {
    values: Vec<IndexMap<String, Binding>>,
    types: Vec<IndexMap<String, TypeBinding>>,
    ctors: Vec<IndexMap<String, VariantId>>,
    modules: Vec<IndexMap<String, ModuleBinding>>,
    signatures: Vec<IndexMap<String, AbstractedSig>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: vec![IndexMap::new()],
            types: vec![IndexMap::new()],
            ctors: vec![IndexMap::new()],
            modules: vec![IndexMap::new()],
            signatures: vec![IndexMap::new()],
        }
    }

    pub fn push_scope(&mut self) {
        self.values.push(IndexMap::new());
        self.types.push(IndexMap::new());
        self.ctors.push(IndexMap::new());
        self.modules.push(IndexMap::new());
        self.signatures.push(IndexMap::new());
    }

    /// Pops the innermost scope and returns every value binding in it
    /// that was never looked up, in declaration order, for the caller to
    /// turn into unused-binding diagnostics.
    pub fn pop_scope(&mut self) -> Vec<(String, Span)> {
        self.types.pop();
        self.ctors.pop();
        self.modules.pop();
        self.signatures.pop();
        let frame = self.values.pop().expect("pop_scope called on the root frame");
        frame
            .into_iter()
            .filter(|(_, binding)| !binding.is_used())
            .map(|(name, binding)| (name, binding.span))
            .collect()
    }

    pub fn bind(&mut self, name: String, scheme: PolyType, span: Span, resolved: ResolvedName) {
        self.values
            .last_mut()
            .expect("at least the root frame always exists")
            .insert(name, Binding::new(scheme, span, resolved));
    }

    /// Looks a value up and marks it used if found, the way every real
    /// reference site (`IVar` elaboration) should call it.
    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        for frame in self.values.iter().rev() {
            if let Some(binding) = frame.get(name) {
                binding.mark_used();
                return Some(binding);
            }
        }
        None
    }

    /// Looks a value up without marking it used, for diagnostics that
    /// inspect bindings without counting as a real reference.
    pub fn peek(&self, name: &str) -> Option<&Binding> {
        self.values.iter().rev().find_map(|frame| frame.get(name))
    }

    pub fn bind_type(&mut self, name: String, binding: TypeBinding) {
        self.types.last_mut().expect("root frame exists").insert(name, binding);
    }

    pub fn lookup_type(&self, name: &str) -> Option<&TypeBinding> {
        self.types.iter().rev().find_map(|frame| frame.get(name))
    }

    pub fn bind_ctor(&mut self, name: String, owner: VariantId) {
        self.ctors.last_mut().expect("root frame exists").insert(name, owner);
    }

    pub fn lookup_ctor(&self, name: &str) -> Option<VariantId> {
        self.ctors.iter().rev().find_map(|frame| frame.get(name)).copied()
    }

    pub fn bind_module(&mut self, name: String, binding: ModuleBinding) {
        self.modules.last_mut().expect("root frame exists").insert(name, binding);
    }

    pub fn lookup_module(&self, name: &str) -> Option<&ModuleBinding> {
        self.modules.iter().rev().find_map(|frame| frame.get(name))
    }

    pub fn bind_signature(&mut self, name: String, sig: AbstractedSig) {
        self.signatures.last_mut().expect("root frame exists").insert(name, sig);
    }

    pub fn lookup_signature(&self, name: &str) -> Option<&AbstractedSig> {
        self.signatures.iter().rev().find_map(|frame| frame.get(name))
    }

    pub fn depth(&self) -> usize {
        self.values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheme() -> PolyType {
        PolyType::monomorphic(hiveml_types::Type::UNIT)
    }

    fn local(n: u32) -> ResolvedName {
        ResolvedName::Local(hiveml_ids::LocalName(n))
    }

    #[test]
    fn inner_scope_shadows_outer() {
        let mut env = Environment::new();
        env.bind("x".into(), scheme(), Span::dummy(), local(0));
        env.push_scope();
        env.bind("x".into(), scheme(), Span::dummy(), local(1));
        assert!(env.lookup("x").is_some());
        env.pop_scope();
        assert!(env.lookup("x").is_some(), "outer binding still visible after inner scope closes");
    }

    #[test]
    fn unused_binding_is_reported_on_scope_close() {
        let mut env = Environment::new();
        env.push_scope();
        env.bind("unused".into(), scheme(), Span::dummy(), local(0));
        let unused = env.pop_scope();
        assert_eq!(unused.len(), 1);
        assert_eq!(unused[0].0, "unused");
    }

    #[test]
    fn lookup_marks_binding_used_so_it_is_not_reported() {
        let mut env = Environment::new();
        env.push_scope();
        env.bind("x".into(), scheme(), Span::dummy(), local(0));
        assert!(env.lookup("x").is_some());
        let unused = env.pop_scope();
        assert!(unused.is_empty());
    }

    #[test]
    fn type_and_value_namespaces_do_not_collide() {
        let mut env = Environment::new();
        env.bind("t".into(), scheme(), Span::dummy(), local(0));
        env.bind_type("t".into(), TypeBinding { id: DataTypeId::Opaque(OpaqueId(0)), arity: 0 });
        assert!(env.lookup("t").is_some());
        assert!(env.lookup_type("t").is_some());
    }
}
