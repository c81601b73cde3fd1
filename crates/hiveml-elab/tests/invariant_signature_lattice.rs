//! Spec §8 invariants: signature subtyping transitivity and the
//! disjoint-union symmetry of failure (inserting the same name twice
//! into a signature always loses to `ConflictInSignature`, regardless of
//! which occurrence is "first").

use hiveml_elab::error::ElabError;
use hiveml_elab::module::elaborate_program;
use hiveml_elab::primitives::builtin_environment;
use hiveml_elab::subtype::subtype_sig_record;
use hiveml_common::Span;
use hiveml_env::SigRecord;
use hiveml_types::{Domain, InferenceContext, PolyType, Type};
use indexmap::IndexMap;

fn pair_fn(ordered: Vec<Type>, ret: Type) -> Type {
    Type::Function(Box::new(Domain { ordered, mandatory: IndexMap::new(), optional: hiveml_types::Row::Fixed(IndexMap::new()) }), Box::new(ret))
}

#[test]
fn subtyping_is_transitive_across_three_signatures() {
    let mut ctx = InferenceContext::new();
    let a = ctx.ids.fresh_bound();
    let b = ctx.ids.fresh_bound();

    // sig1: f : forall a b. (a, b) -> a -- most general
    let sig1 = SigRecord::new().with_value(
        "f",
        PolyType { vars: vec![a, b], var_kinds: Vec::new(), row_vars: Vec::new(), body: pair_fn(vec![Type::Bound(a), Type::Bound(b)], Type::Bound(a)) },
    );
    // sig2: f : forall a. (a, int) -> a -- narrower: second argument fixed
    let sig2 = SigRecord::new().with_value(
        "f",
        PolyType { vars: vec![a], var_kinds: Vec::new(), row_vars: Vec::new(), body: pair_fn(vec![Type::Bound(a), Type::INT], Type::Bound(a)) },
    );
    // sig3: f : (bool, int) -> bool -- fully monomorphic
    let sig3 = SigRecord::new().with_value("f", PolyType::monomorphic(pair_fn(vec![Type::BOOL, Type::INT], Type::BOOL)));

    subtype_sig_record(&mut ctx, &sig1, &sig2, Span::dummy()).expect("sig1 satisfies sig2");
    subtype_sig_record(&mut ctx, &sig2, &sig3, Span::dummy()).expect("sig2 satisfies sig3");
    subtype_sig_record(&mut ctx, &sig1, &sig3, Span::dummy()).expect("sig1 must transitively satisfy sig3");
}

#[test]
fn a_name_bound_twice_at_the_top_level_is_a_conflict_regardless_of_order() {
    let mut ctx = InferenceContext::new();
    let (mut env, ids) = builtin_environment(&mut ctx);
    let program = hiveml_syntax::parse("val a = 1\nval a = 2\n").expect("source parses");
    let forward = elaborate_program(&mut ctx, ids, &mut env, &program);
    assert!(matches!(forward, Err(ElabError::ConflictInSignature { ref name, .. }) if name == "a"));

    let mut ctx2 = InferenceContext::new();
    let (mut env2, ids2) = builtin_environment(&mut ctx2);
    let reversed = hiveml_syntax::parse("val a = 2\nval a = 1\n").expect("source parses");
    let backward = elaborate_program(&mut ctx2, ids2, &mut env2, &reversed);
    assert!(matches!(backward, Err(ElabError::ConflictInSignature { ref name, .. }) if name == "a"));
}
