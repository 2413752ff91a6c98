//! Method-reference compatibility: exact references emit direct type
//! relations, inexact ones run nested invocation inference (JLS 15.13.1,
//! 18.2.1).

use pretty_assertions::assert_eq;
use vega_infer::{
    reduce, ConstraintFormula, Expr, ExprContext, ExprKind, InferenceContext, MethodRefExpr,
    Reduction,
};
use vega_types::{Type, TypeEnv, TypeStore};

fn method_ref(receiver: Type, name: &str) -> Expr {
    Expr::new(ExprKind::MethodRef(MethodRefExpr {
        receiver,
        name: name.to_string(),
    }))
    .in_ctx(ExprContext::Assignment)
}

#[test]
fn exact_instance_reference_binds_the_receiver() {
    let store = TypeStore::with_minimal_jdk();
    let wk = store.well_known();
    let string = Type::class(wk.string, vec![]);
    let integer = Type::class(wk.integer, vec![]);
    // String::length as Function<String, Integer>: the functional parameter
    // binds the receiver, int boxes to Integer.
    let function = Type::class(wk.function, vec![string.clone(), integer]);
    let mut ctx = InferenceContext::new(&store);

    let formula = ConstraintFormula::expr_compatible(method_ref(string, "length"), function);
    assert!(ctx.reduce_and_incorporate(formula).unwrap());
}

#[test]
fn exact_static_reference_checks_parameters_directly() {
    let store = TypeStore::with_minimal_jdk();
    let wk = store.well_known();
    let string = Type::class(wk.string, vec![]);
    let integer = Type::class(wk.integer, vec![]);
    // Integer::parseInt as Function<String, Integer>.
    let function = Type::class(wk.function, vec![string, integer.clone()]);
    let mut ctx = InferenceContext::new(&store);

    let formula = ConstraintFormula::expr_compatible(method_ref(integer, "parseInt"), function);
    assert!(ctx.reduce_and_incorporate(formula).unwrap());
}

#[test]
fn exact_reference_arity_mismatch_is_false() {
    let store = TypeStore::with_minimal_jdk();
    let wk = store.well_known();
    let string = Type::class(wk.string, vec![]);
    let integer = Type::class(wk.integer, vec![]);
    // String::length as Supplier<Integer> has no receiver to bind.
    let supplier = Type::class(wk.supplier, vec![integer]);
    let mut ctx = InferenceContext::new(&store);

    let formula = ConstraintFormula::expr_compatible(method_ref(string, "length"), supplier);
    assert_eq!(reduce(&mut ctx, formula).unwrap(), Reduction::False);
}

#[test]
fn inexact_reference_runs_nested_inference() {
    let store = TypeStore::with_minimal_jdk();
    let wk = store.well_known();
    let string = Type::class(wk.string, vec![]);
    let integer = Type::class(wk.integer, vec![]);
    // Integer::valueOf is overloaded, hence inexact.
    let function = Type::class(wk.function, vec![string, integer.clone()]);
    let mut ctx = InferenceContext::new(&store);

    let formula = ConstraintFormula::expr_compatible(method_ref(integer, "valueOf"), function);
    assert_eq!(reduce(&mut ctx, formula).unwrap(), Reduction::Incorporated);
    assert_eq!(ctx.invocation_depth(), 0);
}

#[test]
fn inexact_reference_against_void_descriptor_short_circuits() {
    let store = TypeStore::with_minimal_jdk();
    let wk = store.well_known();
    let string = Type::class(wk.string, vec![]);
    let integer = Type::class(wk.integer, vec![]);
    // Consumer<String> discards the produced value.
    let consumer = Type::class(wk.consumer, vec![string]);
    let mut ctx = InferenceContext::new(&store);

    let formula = ConstraintFormula::expr_compatible(method_ref(integer, "valueOf"), consumer);
    assert_eq!(reduce(&mut ctx, formula).unwrap(), Reduction::True);
}

#[test]
fn non_functional_target_is_false() {
    let store = TypeStore::with_minimal_jdk();
    let wk = store.well_known();
    let string = Type::class(wk.string, vec![]);
    let mut ctx = InferenceContext::new(&store);

    let formula =
        ConstraintFormula::expr_compatible(method_ref(string.clone(), "length"), string);
    assert_eq!(reduce(&mut ctx, formula).unwrap(), Reduction::False);
}

#[test]
fn inexact_reference_needs_proper_descriptor_parameters() {
    let store = TypeStore::with_minimal_jdk();
    let wk = store.well_known();
    let integer = Type::class(wk.integer, vec![]);
    let mut ctx = InferenceContext::new(&store);
    let alpha = ctx.bounds_mut().fresh_var().unwrap();
    let function = Type::class(wk.function, vec![Type::Infer(alpha), integer.clone()]);

    let formula = ConstraintFormula::expr_compatible(method_ref(integer, "valueOf"), function);
    assert_eq!(reduce(&mut ctx, formula).unwrap(), Reduction::False);
}

#[test]
fn unknown_candidate_name_is_false() {
    let store = TypeStore::with_minimal_jdk();
    let wk = store.well_known();
    let string = Type::class(wk.string, vec![]);
    let integer = Type::class(wk.integer, vec![]);
    let function = Type::class(wk.function, vec![string.clone(), integer]);
    let mut ctx = InferenceContext::new(&store);

    let formula = ConstraintFormula::expr_compatible(method_ref(string, "reverse"), function);
    assert_eq!(reduce(&mut ctx, formula).unwrap(), Reduction::False);
}
