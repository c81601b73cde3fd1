//! Spec §8 invariants: principality (two independent inference runs over
//! the same program agree on the inferred polytype) and union-find
//! idempotence (resolving a variable twice gives the same answer).

use hiveml_elab::module::elaborate_program;
use hiveml_elab::primitives::builtin_environment;
use hiveml_types::{unify, InferenceContext, Type, UnifyResult};

const SOURCE: &str = "val rec map(f, xs) = case xs of\n\
     | [] -> []\n\
     | x::t -> f(x) :: map(f, t)\n\
     end\n";

fn run() -> hiveml_elab::module::ElaborationOutput {
    let program = hiveml_syntax::parse(SOURCE).expect("source parses");
    let mut ctx = InferenceContext::new();
    let (mut env, ids) = builtin_environment(&mut ctx);
    elaborate_program(&mut ctx, ids, &mut env, &program).expect("program elaborates")
}

#[test]
fn two_independent_runs_infer_the_same_polytype() {
    let first = run();
    let second = run();
    let first_scheme = first.tyenv.peek("map").expect("map is bound").scheme.clone();
    let second_scheme = second.tyenv.peek("map").expect("map is bound").scheme.clone();
    // Each run starts from a fresh `InferenceContext`, so every counter
    // (and so every `Bound`/`TypeVar` id allocated along the way) walks
    // through the exact same sequence for the exact same program.
    assert_eq!(first_scheme.vars.len(), second_scheme.vars.len());
    assert_eq!(first_scheme.body, second_scheme.body);
}

#[test]
fn resolving_a_variable_twice_after_unrelated_unifications_agrees() {
    let mut ctx = InferenceContext::new();
    let a = ctx.fresh_type_var();
    let b = ctx.fresh_type_var();
    assert_eq!(unify(&mut ctx, a.clone(), Type::INT), UnifyResult::Consistent);
    let resolved_once = ctx.types.resolve(a.clone());

    // An unrelated unification on a fresh variable must not perturb `a`.
    assert_eq!(unify(&mut ctx, b.clone(), Type::BOOL), UnifyResult::Consistent);
    let resolved_twice = ctx.types.resolve(a);
    assert_eq!(resolved_once, resolved_twice);
    assert_eq!(resolved_twice, Type::INT);
}
