//! Spec §8 scenario 3 and the synonym-free-after-expand invariant.

use hiveml_elab::error::ElabError;
use hiveml_elab::module::elaborate_program;
use hiveml_elab::primitives::builtin_environment;
use hiveml_types::{InferenceContext, Type};

#[test]
fn mutually_recursive_synonym_group_is_rejected() {
    let program = hiveml_syntax::parse("type a = b\nand b = a\n").expect("source parses");
    let mut ctx = InferenceContext::new();
    let (mut env, ids) = builtin_environment(&mut ctx);
    let result = elaborate_program(&mut ctx, ids, &mut env, &program);
    match result {
        Err(ElabError::CyclicSynonymTypeDefinition { ids, .. }) => assert_eq!(ids.len(), 2),
        other => panic!("expected CyclicSynonymTypeDefinition, got {other:?}"),
    }
}

#[test]
fn synonym_free_normal_forms_of_the_same_type_unify() {
    let program = hiveml_syntax::parse(
        "type celsius = int\n\
         val freezing = fun(x) -> x\n\
         val zero = (freezing(0)) : celsius\n",
    )
    .expect("source parses");
    let mut ctx = InferenceContext::new();
    let (mut env, ids) = builtin_environment(&mut ctx);
    let output = elaborate_program(&mut ctx, ids, &mut env, &program).expect("program elaborates");
    let zero_ty = output.tyenv.peek("zero").expect("zero is bound").scheme.body.clone();
    // `celsius` is transparent, so once expanded it unifies directly
    // against the builtin scalar rather than staying a distinct `Data`.
    assert_eq!(zero_ty, Type::INT);
}

#[test]
fn a_synonym_referencing_itself_with_no_partner_is_still_a_cycle_of_one() {
    let program = hiveml_syntax::parse("type loop = loop\n").expect("source parses");
    let mut ctx = InferenceContext::new();
    let (mut env, ids) = builtin_environment(&mut ctx);
    let result = elaborate_program(&mut ctx, ids, &mut env, &program);
    assert!(matches!(result, Err(ElabError::CyclicSynonymTypeDefinition { .. })));
}
