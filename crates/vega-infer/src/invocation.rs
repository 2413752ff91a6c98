use std::collections::HashMap;

use tracing::debug;
use vega_types::{
    erasure, is_assignable_loose, is_proper, substitute, unboxed_primitive, InferVarId, Type,
    TypeEnv, TypeVarId, WildcardBound,
};

use crate::context::InferenceContext;
use crate::error::Result;
use crate::expr::{Expr, InvocationExpr, MemberRef};
use crate::formula::{ConstraintFormula, Reduction, Relation};

/// Nested applicability and invocation type inference for a generic call
/// whose binding is fixed but whose type arguments are open (JLS 18.5.1,
/// 18.5.2).
///
/// The invocation record is scoped; it pops on every exit path. A site whose
/// inference is already on the stack reduces to `False`.
pub(crate) fn reduce_invocation(
    ctx: &mut InferenceContext,
    site: &Expr,
    inv: &InvocationExpr,
    target: &Type,
) -> Result<Reduction> {
    let Some(mut scope) = ctx.enter_invocation(site.id) else {
        return Ok(Reduction::False);
    };
    infer_invocation(&mut scope, inv, target)
}

fn infer_invocation(
    ctx: &mut InferenceContext,
    inv: &InvocationExpr,
    target: &Type,
) -> Result<Reduction> {
    // Re-derive the unsubstituted signature; only the enclosing-type
    // instantiation carries over.
    let Some(class_def) = ctx.env().class(inv.binding.class) else {
        return Ok(Reduction::False);
    };
    let method = match inv.binding.member {
        MemberRef::Method(idx) => class_def.methods.get(idx),
        MemberRef::Constructor(idx) => class_def.constructors.get(idx),
    };
    let Some(method) = method else {
        return Ok(Reduction::False);
    };
    let method = method.clone();
    let class_type_params = class_def.type_params.clone();

    let is_diamond = matches!(inv.binding.member, MemberRef::Constructor(_));
    let mut outer = HashMap::new();
    let infer_params: Vec<TypeVarId> = if is_diamond {
        // Diamond creation infers the declaring type's parameters too.
        class_type_params
            .iter()
            .chain(method.type_params.iter())
            .copied()
            .collect()
    } else {
        for (tp, arg) in class_type_params.iter().zip(inv.binding.outer_args.iter()) {
            outer.insert(*tp, arg.clone());
        }
        method.type_params.clone()
    };

    let (_vars, theta) = {
        let InferenceContext { ty_ctx, bounds, .. } = ctx;
        bounds.create_vars(&*ty_ctx, &infer_params, &outer)?
    };

    let has_witnesses = !inv.explicit_type_args.is_empty();
    if has_witnesses {
        if inv.explicit_type_args.len() != method.type_params.len() {
            return Ok(Reduction::False);
        }
        for (tp, witness) in method.type_params.iter().zip(inv.explicit_type_args.iter()) {
            let Some(var) = theta.get(tp).cloned() else {
                return Ok(Reduction::False);
            };
            let ok = {
                let InferenceContext { ty_ctx, bounds, .. } = ctx;
                bounds.incorporate(&*ty_ctx, &var, Relation::Same, witness)
            };
            if !ok {
                return Ok(Reduction::False);
            }
        }
    }

    // Applicability: one compatibility constraint per formal/actual pair.
    let formals: Vec<Type> = method.params.iter().map(|p| substitute(p, &theta)).collect();
    if !constrain_arguments(ctx, &formals, &inv.args, method.is_varargs)? {
        return Ok(Reduction::False);
    }

    for thrown in &method.throws {
        if let Type::Infer(var) = substitute(thrown, &theta) {
            ctx.bounds.mark_throws(var);
        }
    }

    // Invocation type inference: constrain the return type against the
    // target.
    let raw_return = if is_diamond {
        Type::class(
            inv.binding.class,
            class_type_params
                .iter()
                .map(|tp| substitute(&Type::TypeVar(*tp), &theta))
                .collect(),
        )
    } else {
        method.return_type.clone()
    };
    let ret = substitute(&raw_return, &theta);
    if matches!(ret, Type::Void) {
        // A void invocation has no value to check against a target.
        return Ok(Reduction::False);
    }

    if inv.binding.unchecked {
        // Unchecked applicability erases the return type (JLS 18.5.2.1).
        let raw = erasure(ctx.env(), &ret);
        return Ok(incorporate_verdict(ctx, &raw, target));
    }

    let ret = ctx.bounds.substitute_partial(&ret);
    debug!(?ret, ?target, "constraining invocation return type");
    match &ret {
        Type::Class(ct) if !ct.args.is_empty() && !is_proper(&ret) => {
            // Capture-like: fresh variables stand for the return type's
            // arguments, recorded against the original parameterization.
            let mut fresh = Vec::with_capacity(ct.args.len());
            let mut synthetic_args = Vec::with_capacity(ct.args.len());
            for arg in &ct.args {
                let var = ctx.bounds.fresh_var()?;
                let ok = {
                    let InferenceContext { ty_ctx, bounds, .. } = ctx;
                    match arg {
                        Type::Wildcard(WildcardBound::Unbounded) => true,
                        Type::Wildcard(WildcardBound::Extends(upper)) => {
                            bounds.incorporate(&*ty_ctx, &Type::Infer(var), Relation::Subtype, upper)
                        }
                        Type::Wildcard(WildcardBound::Super(lower)) => {
                            bounds.incorporate(&*ty_ctx, lower, Relation::Subtype, &Type::Infer(var))
                        }
                        other => {
                            bounds.incorporate(&*ty_ctx, &Type::Infer(var), Relation::Same, other)
                        }
                    }
                };
                if !ok {
                    return Ok(Reduction::False);
                }
                fresh.push(var);
                synthetic_args.push(Type::Infer(var));
            }
            let synthetic = Type::class(ct.def, synthetic_args);
            ctx.bounds.record_capture(fresh, ret.clone());
            Ok(incorporate_verdict(ctx, &synthetic, target))
        }
        Type::Infer(var) => {
            let var = *var;
            if force_partial_solve(ctx, var, target) {
                let resolved = {
                    let InferenceContext { ty_ctx, bounds, .. } = ctx;
                    bounds.solve_variable(&*ty_ctx, var)
                };
                let Some(resolved) = resolved else {
                    return Ok(Reduction::False);
                };
                Ok(incorporate_verdict(ctx, &resolved, target))
            } else {
                Ok(incorporate_verdict(ctx, &ret, target))
            }
        }
        _ => Ok(incorporate_verdict(ctx, &ret, target)),
    }
}

fn constrain_arguments(
    ctx: &mut InferenceContext,
    formals: &[Type],
    actuals: &[Expr],
    varargs: bool,
) -> Result<bool> {
    if !varargs {
        if formals.len() != actuals.len() {
            return Ok(false);
        }
        for (formal, actual) in formals.iter().zip(actuals.iter()) {
            let formula = ConstraintFormula::expr_compatible(actual.clone(), formal.clone());
            if !ctx.reduce_and_incorporate(formula)? {
                return Ok(false);
            }
        }
        return Ok(true);
    }

    let Some((last, fixed)) = formals.split_last() else {
        return Ok(false);
    };
    if actuals.len() < fixed.len() {
        return Ok(false);
    }
    // An exact-arity call whose final argument is already an array passes it
    // through; otherwise each trailing argument checks against the element
    // type.
    let pass_through = actuals.len() == formals.len()
        && matches!(
            actuals.last().and_then(|a| ctx.expr_type(a)),
            Some(Type::Array(_))
        );
    for (index, actual) in actuals.iter().enumerate() {
        let formal = if index < fixed.len() {
            fixed[index].clone()
        } else if pass_through {
            last.clone()
        } else {
            match last {
                Type::Array(elem) => (**elem).clone(),
                other => other.clone(),
            }
        };
        let formula = ConstraintFormula::expr_compatible(actual.clone(), formal);
        if !ctx.reduce_and_incorporate(formula)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn incorporate_verdict(ctx: &mut InferenceContext, left: &Type, target: &Type) -> Reduction {
    let InferenceContext { ty_ctx, bounds, .. } = ctx;
    if bounds.incorporate(&*ty_ctx, left, Relation::Compatible, target) {
        Reduction::Incorporated
    } else {
        Reduction::False
    }
}

/// The three trigger conditions for resolving a lone inference-variable
/// return type eagerly: a wrapper-class bound at a primitive target, an
/// existing proper lower bound, or a bound already loosely compatible with a
/// proper target.
fn force_partial_solve(ctx: &InferenceContext, var: InferVarId, target: &Type) -> bool {
    let Some(vb) = ctx.bounds().bounds(var) else {
        return false;
    };
    if matches!(target, Type::Primitive(_)) {
        let wrapper_bound = vb.equal.iter().chain(vb.lower.iter()).any(|t| {
            matches!(t, Type::Class(ct) if unboxed_primitive(ctx.env(), ct.def).is_some())
        });
        if wrapper_bound {
            return true;
        }
    }
    if vb.lower.iter().any(is_proper) {
        return true;
    }
    is_proper(target)
        && vb
            .equal
            .iter()
            .chain(vb.lower.iter())
            .filter(|t| is_proper(t))
            .any(|t| is_assignable_loose(ctx.env(), t, target))
}
