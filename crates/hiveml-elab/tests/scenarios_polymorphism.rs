//! Spec §8 scenarios 1, 2, and 4: let-polymorphism generalizes a binding
//! once and instantiates it fresh at every use, including through
//! `let rec` and through an unconstrained record access.

use hiveml_elab::module::elaborate_program;
use hiveml_elab::primitives::{builtin_environment, list_type};
use hiveml_types::Type;

fn elaborate(src: &str) -> hiveml_elab::module::ElaborationOutput {
    let program = hiveml_syntax::parse(src).expect("source parses");
    let mut ctx = hiveml_types::InferenceContext::new();
    let (mut env, ids) = builtin_environment(&mut ctx);
    let output = elaborate_program(&mut ctx, ids, &mut env, &program).expect("program elaborates");
    output
}

#[test]
fn identity_generalizes_and_specializes_at_each_call_site() {
    let output = elaborate(
        "val id = fun(x) -> x\n\
         val three = id(3)\n\
         val tru = id(true)\n",
    );
    let id_scheme = output.tyenv.peek("id").expect("id is bound").scheme.clone();
    assert_eq!(id_scheme.vars.len(), 1, "id should generalize over exactly its one parameter");
    assert!(matches!(id_scheme.body, Type::Function(..)));

    let three_ty = output.tyenv.peek("three").expect("three is bound").scheme.body.clone();
    assert_eq!(three_ty, Type::INT);
    let tru_ty = output.tyenv.peek("tru").expect("tru is bound").scheme.body.clone();
    assert_eq!(tru_ty, Type::BOOL);
}

#[test]
fn recursive_map_generalizes_over_both_element_types() {
    let mut ctx = hiveml_types::InferenceContext::new();
    let (mut env, ids) = builtin_environment(&mut ctx);
    let program = hiveml_syntax::parse(
        "val rec map(f, xs) = case xs of\n\
         | [] -> []\n\
         | x::t -> f(x) :: map(f, t)\n\
         end\n\
         val mapped = map(fun(n) -> n, 1 :: 2 :: 3 :: [])\n",
    )
    .expect("source parses");
    let output = elaborate_program(&mut ctx, ids, &mut env, &program).expect("program elaborates");

    let map_scheme = output.tyenv.peek("map").expect("map is bound").scheme.clone();
    assert_eq!(map_scheme.vars.len(), 2, "map is polymorphic in both the element and result type");

    let mapped_ty = output.tyenv.peek("mapped").expect("mapped is bound").scheme.body.clone();
    assert_eq!(mapped_ty, list_type(ids, Type::INT));
}

#[test]
fn unconstrained_record_access_is_row_polymorphic_then_specializes() {
    let output = elaborate(
        "val get_name = fun(r) -> r.name\n\
         val extracted = get_name({name = 3, age = 9})\n",
    );
    let get_name_scheme = output.tyenv.peek("get_name").expect("get_name is bound").scheme.clone();
    assert!(!get_name_scheme.row_vars.is_empty(), "the record's `...` tail should generalize to a row quantifier");

    let extracted_ty = output.tyenv.peek("extracted").expect("extracted is bound").scheme.body.clone();
    assert_eq!(extracted_ty, Type::INT);
}
