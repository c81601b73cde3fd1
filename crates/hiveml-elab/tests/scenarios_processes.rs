//! Spec §8 scenario 6: a `receive` inside a `spawn`ed process ties the
//! branch pattern's type, the process's own receive type, and the
//! payload type of anything `send` to that process's pid, all to the
//! same type variable.

use hiveml_elab::module::elaborate_program;
use hiveml_elab::primitives::builtin_environment;
use hiveml_types::{InferenceContext, Type};

#[test]
fn receive_pattern_and_send_target_share_one_effect_type() {
    let program = hiveml_syntax::parse("val relay = fun(parent) -> spawn(receive | n -> send(parent, n) end)\n")
        .expect("source parses");
    let mut ctx = InferenceContext::new();
    let (mut env, ids) = builtin_environment(&mut ctx);
    let output = elaborate_program(&mut ctx, ids, &mut env, &program).expect("program elaborates");

    let relay = output.tyenv.peek("relay").expect("relay is bound").scheme.clone();
    assert_eq!(relay.vars.len(), 1, "relay is polymorphic in exactly the one message type it relays");

    let Type::Function(domain, ret) = &relay.body else { panic!("relay should be a function, got {:?}", relay.body) };
    let param_ty = domain.ordered.first().expect("relay takes one ordered parameter");
    let Type::Pid(param_payload) = param_ty else { panic!("relay's parameter should be a pid, got {param_ty:?}") };
    let Type::Pid(ret_payload) = ret.as_ref() else { panic!("relay's return should be a pid, got {ret:?}") };
    assert_eq!(param_payload, ret_payload, "the parent's pid payload and the spawned pid's payload are the same bound variable");
}

#[test]
fn sending_a_mismatched_payload_type_is_rejected() {
    let program = hiveml_syntax::parse(
        "val relay = fun(parent) -> spawn(receive | n -> send(parent, n) end)\n\
         external make_int_pid : pid(int) 0\n\
         val bad = relay(make_int_pid)\n\
         val also_bad = send(make_int_pid, true)\n",
    )
    .expect("source parses");
    let mut ctx = InferenceContext::new();
    let (mut env, ids) = builtin_environment(&mut ctx);
    let result = elaborate_program(&mut ctx, ids, &mut env, &program);
    assert!(result.is_err(), "sending a bool to a pid<int> must be rejected");
}
