//! Spec §8 scenario 5: opaque IDs are freshened on every functor entry,
//! so two parameters sealed against the same named signature are never
//! accidentally treated as sharing one underlying type.

use hiveml_elab::error::ElabError;
use hiveml_elab::module::elaborate_program;
use hiveml_elab::primitives::builtin_environment;
use hiveml_types::InferenceContext;

#[test]
fn two_parameters_of_the_same_signature_do_not_share_an_opaque_witness() {
    let program = hiveml_syntax::parse(
        "signature S = sig\n\
         type t\n\
         end\n\
         module F = fun(X : S) -> fun(Y : S) -> struct\n\
         val f = (fun(x) -> x) : X.t -> Y.t\n\
         end\n",
    )
    .expect("source parses");
    let mut ctx = InferenceContext::new();
    let (mut env, ids) = builtin_environment(&mut ctx);
    let result = elaborate_program(&mut ctx, ids, &mut env, &program);
    assert!(
        matches!(result, Err(ElabError::ContradictionError { .. })),
        "expected a contradiction between X.t and Y.t's distinct opaque IDs, got {result:?}"
    );
}

#[test]
fn a_single_functor_parameter_identifying_the_type_with_itself_is_fine() {
    let program = hiveml_syntax::parse(
        "signature S = sig\n\
         type t\n\
         end\n\
         module F = fun(X : S) -> struct\n\
         val f = (fun(x) -> x) : X.t -> X.t\n\
         end\n",
    )
    .expect("source parses");
    let mut ctx = InferenceContext::new();
    let (mut env, ids) = builtin_environment(&mut ctx);
    elaborate_program(&mut ctx, ids, &mut env, &program).expect("a functor identifying a parameter's opaque type with itself is well-typed");
}
