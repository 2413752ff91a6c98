//! Nested applicability and invocation type inference for generic calls
//! (JLS 18.5.1, 18.5.2).

use pretty_assertions::assert_eq;
use vega_infer::{
    reduce, ConstraintFormula, Expr, ExprContext, ExprKind, InferenceContext, InvocationExpr,
    MethodBinding, Reduction,
};
use vega_types::{
    ClassDef, ClassId, ClassKind, MethodDef, PrimitiveType, Type, TypeEnv, TypeStore,
};

/// A `Util` class with generic static methods:
/// `<T> T id(T)`, `<T> List<T> make()`, `<T> List<T> listOf(T...)`.
fn store_with_util() -> (TypeStore, ClassId) {
    let mut store = TypeStore::with_minimal_jdk();
    let object = Type::class(store.well_known().object, vec![]);
    let list = store.well_known().list;
    let id_t = store.add_type_param("T", vec![object.clone()]);
    let make_t = store.add_type_param("T", vec![object.clone()]);
    let list_of_t = store.add_type_param("T", vec![object.clone()]);
    let util = store.add_class(ClassDef {
        name: "Util".to_string(),
        kind: ClassKind::Class,
        type_params: vec![],
        super_class: Some(object),
        interfaces: vec![],
        constructors: vec![],
        methods: vec![
            MethodDef {
                name: "id".to_string(),
                type_params: vec![id_t],
                params: vec![Type::TypeVar(id_t)],
                return_type: Type::TypeVar(id_t),
                throws: vec![],
                is_static: true,
                is_varargs: false,
                is_abstract: false,
            },
            MethodDef {
                name: "make".to_string(),
                type_params: vec![make_t],
                params: vec![],
                return_type: Type::class(list, vec![Type::TypeVar(make_t)]),
                throws: vec![],
                is_static: true,
                is_varargs: false,
                is_abstract: false,
            },
            MethodDef {
                name: "listOf".to_string(),
                type_params: vec![list_of_t],
                params: vec![Type::array(Type::TypeVar(list_of_t))],
                return_type: Type::class(list, vec![Type::TypeVar(list_of_t)]),
                throws: vec![],
                is_static: true,
                is_varargs: true,
                is_abstract: false,
            },
        ],
    });
    (store, util)
}

const ID: usize = 0;
const MAKE: usize = 1;
const LIST_OF: usize = 2;

fn call(util: ClassId, method: usize, args: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::Invocation(InvocationExpr {
        binding: MethodBinding::method(util, method),
        args: args
            .into_iter()
            .map(|a| a.in_ctx(ExprContext::InvocationArgument))
            .collect(),
        explicit_type_args: vec![],
    }))
    .in_ctx(ExprContext::Assignment)
}

#[test]
fn identity_call_bounds_the_target_variable() {
    let (store, util) = store_with_util();
    let string = Type::class(store.well_known().string, vec![]);
    let mut ctx = InferenceContext::new(&store);
    let alpha = ctx.bounds_mut().fresh_var().unwrap();

    let formula = ConstraintFormula::expr_compatible(
        call(util, ID, vec![Expr::typed(string.clone())]),
        Type::Infer(alpha),
    );
    assert_eq!(reduce(&mut ctx, formula).unwrap(), Reduction::Incorporated);

    // The argument constraint forced T := String, which now lower-bounds α.
    let alpha_bounds = ctx.bounds().bounds(alpha).unwrap();
    assert!(alpha_bounds.lower.contains(&string));

    let solution = ctx.solve().expect("bounds are satisfiable");
    assert_eq!(solution.instantiation(alpha), Some(&string));
}

#[test]
fn return_context_drives_inference_through_capture_variables() {
    let (store, util) = store_with_util();
    let wk = store.well_known();
    let string = Type::class(wk.string, vec![]);
    let list_string = Type::class(wk.list, vec![string.clone()]);
    let mut ctx = InferenceContext::new(&store);

    let formula =
        ConstraintFormula::expr_compatible(call(util, MAKE, vec![]), list_string);
    assert_eq!(reduce(&mut ctx, formula).unwrap(), Reduction::Incorporated);
    assert_eq!(ctx.bounds().captures().len(), 1);

    let solution = ctx.solve().expect("bounds are satisfiable");
    // Both T and its capture variable resolve to String.
    for index in 0..ctx.bounds().num_vars() {
        assert_eq!(
            solution.instantiation(vega_types::InferVarId::new(index as u32)),
            Some(&string)
        );
    }
}

#[test]
fn explicit_type_witness_pins_the_variable() {
    let (store, util) = store_with_util();
    let wk = store.well_known();
    let object = Type::class(wk.object, vec![]);
    let integer = Type::class(wk.integer, vec![]);
    let mut ctx = InferenceContext::new(&store);

    let invocation = Expr::new(ExprKind::Invocation(InvocationExpr {
        binding: MethodBinding::method(util, ID),
        args: vec![Expr::typed(integer.clone()).in_ctx(ExprContext::InvocationArgument)],
        explicit_type_args: vec![integer.clone()],
    }))
    .in_ctx(ExprContext::Assignment);
    let formula = ConstraintFormula::expr_compatible(invocation, object);
    assert_eq!(reduce(&mut ctx, formula).unwrap(), Reduction::Incorporated);

    let solution = ctx.solve().expect("bounds are satisfiable");
    assert_eq!(
        solution.instantiation(vega_types::InferVarId::new(0)),
        Some(&integer)
    );
}

#[test]
fn witness_conflicting_with_argument_fails() {
    let (store, util) = store_with_util();
    let wk = store.well_known();
    let object = Type::class(wk.object, vec![]);
    let string = Type::class(wk.string, vec![]);
    let integer = Type::class(wk.integer, vec![]);
    let mut ctx = InferenceContext::new(&store);

    let invocation = Expr::new(ExprKind::Invocation(InvocationExpr {
        binding: MethodBinding::method(util, ID),
        args: vec![Expr::typed(string).in_ctx(ExprContext::InvocationArgument)],
        explicit_type_args: vec![integer],
    }))
    .in_ctx(ExprContext::Assignment);
    let formula = ConstraintFormula::expr_compatible(invocation, object);
    assert_eq!(reduce(&mut ctx, formula).unwrap(), Reduction::False);
}

#[test]
fn varargs_arguments_check_against_the_element_type() {
    let (store, util) = store_with_util();
    let wk = store.well_known();
    let string = Type::class(wk.string, vec![]);
    let list_string = Type::class(wk.list, vec![string.clone()]);
    let mut ctx = InferenceContext::new(&store);

    let formula = ConstraintFormula::expr_compatible(
        call(
            util,
            LIST_OF,
            vec![Expr::typed(string.clone()), Expr::typed(string)],
        ),
        list_string,
    );
    assert_eq!(reduce(&mut ctx, formula).unwrap(), Reduction::Incorporated);
    assert!(ctx.solve().is_some());
}

#[test]
fn varargs_array_argument_passes_through() {
    let (store, util) = store_with_util();
    let wk = store.well_known();
    let string = Type::class(wk.string, vec![]);
    let list_string = Type::class(wk.list, vec![string.clone()]);
    let mut ctx = InferenceContext::new(&store);

    let formula = ConstraintFormula::expr_compatible(
        call(util, LIST_OF, vec![Expr::typed(Type::array(string))]),
        list_string,
    );
    assert_eq!(reduce(&mut ctx, formula).unwrap(), Reduction::Incorporated);
    assert!(ctx.solve().is_some());
}

#[test]
fn diamond_creation_infers_class_type_arguments() {
    let store = TypeStore::with_minimal_jdk();
    let wk = store.well_known();
    let string = Type::class(wk.string, vec![]);
    let list_string = Type::class(wk.list, vec![string.clone()]);
    let mut ctx = InferenceContext::new(&store);

    let new_array_list = Expr::new(ExprKind::Invocation(InvocationExpr {
        binding: MethodBinding::constructor(wk.array_list, 0),
        args: vec![],
        explicit_type_args: vec![],
    }))
    .in_ctx(ExprContext::Assignment);
    let formula = ConstraintFormula::expr_compatible(new_array_list, list_string);
    assert_eq!(reduce(&mut ctx, formula).unwrap(), Reduction::Incorporated);

    let solution = ctx.solve().expect("bounds are satisfiable");
    // Variable 0 is ArrayList's E.
    assert_eq!(
        solution.instantiation(vega_types::InferVarId::new(0)),
        Some(&string)
    );
}

#[test]
fn unchecked_binding_erases_the_return_type() {
    let (store, util) = store_with_util();
    let raw_list = Type::class(store.well_known().list, vec![]);
    let mut ctx = InferenceContext::new(&store);

    let mut binding = MethodBinding::method(util, MAKE);
    binding.unchecked = true;
    let invocation = Expr::new(ExprKind::Invocation(InvocationExpr {
        binding,
        args: vec![],
        explicit_type_args: vec![],
    }))
    .in_ctx(ExprContext::Assignment);
    let formula = ConstraintFormula::expr_compatible(invocation, raw_list);
    assert_eq!(reduce(&mut ctx, formula).unwrap(), Reduction::Incorporated);
    // The erased return constrains the target directly; no capture happens.
    assert!(ctx.bounds().captures().is_empty());
}

#[test]
fn primitive_target_forces_resolution_through_the_wrapper_bound() {
    let (store, util) = store_with_util();
    let integer = Type::class(store.well_known().integer, vec![]);
    let mut ctx = InferenceContext::new(&store);

    let formula = ConstraintFormula::expr_compatible(
        call(util, ID, vec![Expr::typed(integer.clone())]),
        Type::Primitive(PrimitiveType::Int),
    );
    assert_eq!(reduce(&mut ctx, formula).unwrap(), Reduction::Incorporated);

    let solution = ctx.solve().expect("bounds are satisfiable");
    assert_eq!(
        solution.instantiation(vega_types::InferVarId::new(0)),
        Some(&integer)
    );
}

#[test]
fn nested_generic_calls_flow_bounds_outward() {
    let (store, util) = store_with_util();
    let string = Type::class(store.well_known().string, vec![]);
    let mut ctx = InferenceContext::new(&store);
    let alpha = ctx.bounds_mut().fresh_var().unwrap();

    // id(id("s")) against α.
    let inner = call(util, ID, vec![Expr::typed(string.clone())]);
    let outer = call(util, ID, vec![inner]);
    let formula = ConstraintFormula::expr_compatible(outer, Type::Infer(alpha));
    assert_eq!(reduce(&mut ctx, formula).unwrap(), Reduction::Incorporated);
    assert_eq!(ctx.invocation_depth(), 0);

    let solution = ctx.solve().expect("bounds are satisfiable");
    assert_eq!(solution.instantiation(alpha), Some(&string));
}
