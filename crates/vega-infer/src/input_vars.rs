use std::collections::BTreeSet;

use vega_types::{collect_infer_vars, sam_signature, InferVarId, Type, TypeEnv};

use crate::expr::{exact_method_binding, Expr, ExprKind};
use crate::formula::ConstraintFormula;

/// The inference variables whose instantiation must precede reduction of
/// `formula` (JLS 18.5.2.2).
///
/// Advisory only: the external solver uses this to order variable
/// resolution. No bound-set mutation happens here.
pub fn input_variables(env: &dyn TypeEnv, formula: &ConstraintFormula) -> BTreeSet<InferVarId> {
    let mut out = BTreeSet::new();
    if let ConstraintFormula::ExprCompatible { expr, target, .. } = formula {
        collect(env, expr, target, &mut out);
    }
    out
}

fn collect(env: &dyn TypeEnv, expr: &Expr, target: &Type, out: &mut BTreeSet<InferVarId>) {
    match &expr.unparenthesized().kind {
        ExprKind::Lambda(lambda) => {
            if let Type::Infer(var) = target {
                out.insert(*var);
                return;
            }
            let Some(sig) = sam_signature(env, target) else {
                return;
            };
            if !lambda.has_explicit_param_types() {
                for param in &sig.params {
                    collect_infer_vars(param, out);
                }
            }
            if !matches!(sig.return_type, Type::Void) {
                for result in lambda.result_exprs() {
                    collect(env, result, &sig.return_type, out);
                }
            }
        }
        ExprKind::MethodRef(mref) => {
            if exact_method_binding(env, mref).is_some() {
                return;
            }
            if let Type::Infer(var) = target {
                out.insert(*var);
                return;
            }
            let Some(sig) = sam_signature(env, target) else {
                return;
            };
            for param in &sig.params {
                collect_infer_vars(param, out);
            }
        }
        ExprKind::Conditional {
            then_branch,
            else_branch,
        } => {
            collect(env, then_branch, target, out);
            collect(env, else_branch, target, out);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{LambdaBody, LambdaExpr, LambdaParam, Literal, MethodRefExpr};
    use pretty_assertions::assert_eq;
    use vega_types::{InferVarId, TypeStore};

    fn identity_lambda() -> Expr {
        Expr::new(ExprKind::Lambda(LambdaExpr {
            params: vec![LambdaParam {
                name: "x".into(),
                ty: None,
            }],
            body: LambdaBody::Expr(Box::new(Expr::literal(Literal::Int(0)))),
        }))
    }

    #[test]
    fn lambda_against_bare_variable_returns_that_variable() {
        let store = TypeStore::with_minimal_jdk();
        let alpha = InferVarId::new(0);
        let formula =
            ConstraintFormula::expr_compatible(identity_lambda(), Type::Infer(alpha));
        let vars = input_variables(&store, &formula);
        assert_eq!(vars.into_iter().collect::<Vec<_>>(), vec![alpha]);
    }

    #[test]
    fn elided_lambda_parameters_pull_descriptor_variables() {
        let store = TypeStore::with_minimal_jdk();
        let wk = store.well_known();
        let alpha = InferVarId::new(0);
        let beta = InferVarId::new(1);
        let function = Type::class(wk.function, vec![Type::Infer(alpha), Type::Infer(beta)]);

        let formula = ConstraintFormula::expr_compatible(identity_lambda(), function);
        let vars = input_variables(&store, &formula);
        assert!(vars.contains(&alpha));
        // The literal body result contributes nothing for β.
        assert!(!vars.contains(&beta));
    }

    #[test]
    fn exact_method_reference_contributes_nothing() {
        let store = TypeStore::with_minimal_jdk();
        let wk = store.well_known();
        let alpha = InferVarId::new(0);
        let function = Type::class(
            wk.function,
            vec![Type::Infer(alpha), Type::class(wk.integer, vec![])],
        );
        let mref = Expr::new(ExprKind::MethodRef(MethodRefExpr {
            receiver: Type::class(wk.string, vec![]),
            name: "length".into(),
        }));

        let formula = ConstraintFormula::expr_compatible(mref, function);
        assert!(input_variables(&store, &formula).is_empty());
    }

    #[test]
    fn conditional_unions_both_branches() {
        let store = TypeStore::with_minimal_jdk();
        let alpha = InferVarId::new(0);
        let cond = Expr::new(ExprKind::Conditional {
            then_branch: Box::new(
                Expr::new(ExprKind::Lambda(LambdaExpr {
                    params: vec![],
                    body: LambdaBody::Block {
                        results: vec![],
                        void_compatible: true,
                        value_compatible: false,
                    },
                })),
            ),
            else_branch: Box::new(identity_lambda()),
        });
        let formula = ConstraintFormula::expr_compatible(cond, Type::Infer(alpha));
        let vars = input_variables(&store, &formula);
        assert_eq!(vars.into_iter().collect::<Vec<_>>(), vec![alpha]);
    }
}
