use tracing::{debug, trace};
use vega_types::{
    is_assignable_loose, is_proper, is_subtype, sam_signature, substitute, PrimitiveType, Type,
    TypeEnv,
};

use crate::context::InferenceContext;
use crate::error::{InferenceError, Result};
use crate::expr::{
    exact_method_binding, is_poly_expression, Expr, ExprContext, ExprKind, InvocationExpr,
    LambdaExpr, Literal, MemberRef, MethodBinding, MethodRefExpr,
};
use crate::formula::{ConstraintFormula, Reduction, Relation};
use crate::invocation;

/// Reduce one constraint formula (JLS 18.2).
///
/// `Incorporated` means the formula's effect was folded into the bound set
/// already; `More` hands sibling formulas back to the caller's worklist.
pub fn reduce(ctx: &mut InferenceContext, formula: ConstraintFormula) -> Result<Reduction> {
    trace!(?formula, depth = ctx.invocation_depth(), "reducing formula");
    match formula {
        ConstraintFormula::TypeRelation {
            left,
            relation,
            right,
            ..
        } => Ok(reduce_type_relation(ctx, &left, relation, &right)),
        ConstraintFormula::ExprCompatible { expr, target, .. } => {
            reduce_expr_compatible(ctx, &expr, &target)
        }
    }
}

fn reduce_type_relation(
    ctx: &mut InferenceContext,
    left: &Type,
    relation: Relation,
    right: &Type,
) -> Reduction {
    let left = ctx.bounds.substitute_partial(left);
    let right = ctx.bounds.substitute_partial(right);
    if is_proper(&left) && is_proper(&right) {
        let holds = match relation {
            Relation::Same => left == right || left.is_errorish() || right.is_errorish(),
            Relation::Subtype => is_subtype(ctx.env(), &left, &right),
            Relation::Compatible => is_assignable_loose(ctx.env(), &left, &right),
        };
        return if holds { Reduction::True } else { Reduction::False };
    }
    let InferenceContext { ty_ctx, bounds, .. } = ctx;
    if bounds.incorporate(&*ty_ctx, &left, relation, &right) {
        Reduction::Incorporated
    } else {
        Reduction::False
    }
}

fn reduce_expr_compatible(
    ctx: &mut InferenceContext,
    expr: &Expr,
    target: &Type,
) -> Result<Reduction> {
    if matches!(target, Type::Void) {
        return Err(InferenceError::MalformedFormula(
            "expression compatibility against void",
        ));
    }
    let expr = expr.unparenthesized();

    // A conditional decomposes into one formula per branch before anything
    // else; either branch may independently be a poly expression.
    if let ExprKind::Conditional {
        then_branch,
        else_branch,
    } = &expr.kind
    {
        return Ok(Reduction::More(vec![
            ConstraintFormula::expr_compatible((**then_branch).clone(), target.clone()),
            ConstraintFormula::expr_compatible((**else_branch).clone(), target.clone()),
        ]));
    }

    let target = ctx.bounds.substitute_partial(target);

    if is_proper(&target) {
        // A resolved type decides compatibility outright.
        if let Some(ty) = ctx.expr_type(expr) {
            let holds = !ty.is_errorish() && is_assignable_loose(ctx.env(), &ty, &target);
            debug!(?ty, ?target, holds, "proper-target compatibility");
            return Ok(if holds { Reduction::True } else { Reduction::False });
        }
        // No standalone type: best-effort resolution against this exact
        // target.
        return match &expr.kind {
            ExprKind::Invocation(inv) => invocation::reduce_invocation(ctx, expr, inv, &target),
            ExprKind::Lambda(lambda) => check_lambda(ctx, lambda, &target),
            ExprKind::MethodRef(mref) => check_method_ref(ctx, expr, mref, &target),
            _ => Ok(Reduction::False),
        };
    }

    if !is_poly_expression(ctx.env(), expr, ExprContext::Assignment) {
        let Some(ty) = ctx.expr_type(expr) else {
            return Ok(Reduction::False);
        };
        if ty.is_errorish() {
            return Ok(Reduction::False);
        }
        return Ok(Reduction::More(vec![ConstraintFormula::type_relation(
            ty,
            Relation::Compatible,
            target,
        )]));
    }

    match &expr.kind {
        ExprKind::Invocation(inv) => invocation::reduce_invocation(ctx, expr, inv, &target),
        ExprKind::Lambda(lambda) => check_lambda(ctx, lambda, &target),
        ExprKind::MethodRef(mref) => check_method_ref(ctx, expr, mref, &target),
        _ => Ok(Reduction::False),
    }
}

/// Lambda against a functional-interface target (JLS 18.2.1, 15.27.3).
fn check_lambda(
    ctx: &mut InferenceContext,
    lambda: &LambdaExpr,
    target: &Type,
) -> Result<Reduction> {
    let ground = ctx.ty_ctx.capture_conversion(target);
    let Some(sig) = sam_signature(ctx.env(), &ground) else {
        return Ok(Reduction::False);
    };
    if sig.params.len() != lambda.params.len() {
        return Ok(Reduction::False);
    }
    if !lambda.has_explicit_param_types() && sig.params.iter().any(|p| !is_proper(p)) {
        return Ok(Reduction::False);
    }

    let mut out = Vec::new();
    if lambda.has_explicit_param_types() && !lambda.params.is_empty() {
        let mut derived = ground.clone();
        for (param, formal) in lambda.params.iter().zip(sig.params.iter()) {
            let Some(declared) = &param.ty else {
                return Ok(Reduction::False);
            };
            out.push(ConstraintFormula::type_relation(
                declared.clone(),
                Relation::Same,
                formal.clone(),
            ));
            if let Type::Class(ct) = &mut derived {
                for arg in &mut ct.args {
                    if arg == formal {
                        *arg = declared.clone();
                    }
                }
            }
        }
        // The lambda's own functional type, with the declared parameter
        // types swapped into the interface parameterization, pins the
        // target's instantiation.
        out.push(ConstraintFormula::type_relation(
            derived,
            Relation::Subtype,
            target.clone(),
        ));
    }

    if matches!(sig.return_type, Type::Void) {
        if !lambda.is_void_compatible() {
            return Ok(Reduction::False);
        }
        return Ok(if out.is_empty() {
            Reduction::True
        } else {
            Reduction::More(out)
        });
    }
    if !lambda.is_value_compatible() {
        return Ok(Reduction::False);
    }

    for result in lambda.result_exprs() {
        if is_proper(&sig.return_type) {
            if let Some(ty) = ctx.expr_type(result) {
                let holds = !ty.is_errorish()
                    && (is_assignable_loose(ctx.env(), &ty, &sig.return_type)
                        || narrows_to_constant(result, &sig.return_type));
                if !holds {
                    return Ok(Reduction::False);
                }
                continue;
            }
        }
        out.push(ConstraintFormula::expr_compatible(
            (*result).clone(),
            sig.return_type.clone(),
        ));
    }
    Ok(if out.is_empty() {
        Reduction::True
    } else {
        Reduction::More(out)
    })
}

/// An `int` constant assigns to a narrower integral type when it fits
/// (JLS 5.2).
fn narrows_to_constant(expr: &Expr, target: &Type) -> bool {
    let ExprKind::Literal(Literal::Int(v)) = &expr.unparenthesized().kind else {
        return false;
    };
    match target {
        Type::Primitive(PrimitiveType::Byte) => i8::try_from(*v).is_ok(),
        Type::Primitive(PrimitiveType::Short) => i16::try_from(*v).is_ok(),
        Type::Primitive(PrimitiveType::Char) => {
            u16::try_from(*v).is_ok()
        }
        _ => false,
    }
}

/// Method reference against a functional-interface target (JLS 18.2.1,
/// 15.13.1).
fn check_method_ref(
    ctx: &mut InferenceContext,
    site: &Expr,
    mref: &MethodRefExpr,
    target: &Type,
) -> Result<Reduction> {
    let ground = ctx.ty_ctx.capture_conversion(target);
    let Some(sig) = sam_signature(ctx.env(), &ground) else {
        return Ok(Reduction::False);
    };

    if let Some(exact) = exact_method_binding(ctx.env(), mref) {
        let Some(class_def) = ctx.env().class(exact.class) else {
            return Ok(Reduction::False);
        };
        let Some(method) = class_def.methods.get(exact.method) else {
            return Ok(Reduction::False);
        };
        let method = method.clone();
        let class_type_params = class_def.type_params.clone();

        // Receiver instantiation substitutes into the candidate signature.
        let mut subst = std::collections::HashMap::new();
        if let Type::Class(ct) = &mref.receiver {
            for (tp, arg) in class_type_params.iter().zip(ct.args.iter()) {
                subst.insert(*tp, arg.clone());
            }
        }

        let mut out = Vec::new();
        let formals: Vec<Type> = method.params.iter().map(|p| substitute(p, &subst)).collect();
        if method.is_static {
            if sig.params.len() != formals.len() {
                return Ok(Reduction::False);
            }
            for (functional, formal) in sig.params.iter().zip(formals.iter()) {
                out.push(ConstraintFormula::type_relation(
                    functional.clone(),
                    Relation::Compatible,
                    formal.clone(),
                ));
            }
        } else {
            // The first functional parameter binds the receiver.
            if sig.params.len() != formals.len() + 1 {
                return Ok(Reduction::False);
            }
            out.push(ConstraintFormula::type_relation(
                sig.params[0].clone(),
                Relation::Subtype,
                mref.receiver.clone(),
            ));
            for (functional, formal) in sig.params[1..].iter().zip(formals.iter()) {
                out.push(ConstraintFormula::type_relation(
                    functional.clone(),
                    Relation::Compatible,
                    formal.clone(),
                ));
            }
        }

        if !matches!(sig.return_type, Type::Void) {
            if matches!(method.return_type, Type::Void) {
                // The reference produces no value.
                return Ok(Reduction::False);
            }
            let ret = substitute(&method.return_type, &subst);
            let ret = ctx.ty_ctx.capture_conversion(&ret);
            out.push(ConstraintFormula::type_relation(
                ret,
                Relation::Compatible,
                sig.return_type.clone(),
            ));
        }
        return Ok(if out.is_empty() {
            Reduction::True
        } else {
            Reduction::More(out)
        });
    }

    // Inexact: the candidate's own inference is target-type-dependent, so
    // every descriptor parameter must already be proper.
    if sig.params.iter().any(|p| !is_proper(p)) {
        return Ok(Reduction::False);
    }
    let Type::Class(receiver) = &mref.receiver else {
        return Ok(Reduction::False);
    };
    let Some(class_def) = ctx.env().class(receiver.def) else {
        return Ok(Reduction::False);
    };

    let mut candidate = None;
    for (idx, m) in class_def.methods.iter().enumerate() {
        if m.name != mref.name {
            continue;
        }
        let arity_ok = if m.is_static {
            sig.params.len() == m.params.len()
                || (m.is_varargs && sig.params.len() + 1 >= m.params.len())
        } else {
            sig.params.len() == m.params.len() + 1
                || (m.is_varargs && !sig.params.is_empty() && sig.params.len() >= m.params.len())
        };
        if arity_ok {
            candidate = Some((idx, m.is_static));
            break;
        }
    }
    let Some((method_index, is_static)) = candidate else {
        return Ok(Reduction::False);
    };

    if matches!(sig.return_type, Type::Void) {
        // A void descriptor constrains nothing beyond applicability.
        return Ok(Reduction::True);
    }

    let arg_types: &[Type] = if is_static {
        &sig.params
    } else {
        &sig.params[1..]
    };
    let args: Vec<Expr> = arg_types
        .iter()
        .map(|p| Expr::typed(p.clone()).in_ctx(ExprContext::InvocationArgument))
        .collect();
    let inv = InvocationExpr {
        binding: MethodBinding {
            class: receiver.def,
            member: MemberRef::Method(method_index),
            outer_args: receiver.args.clone(),
            unchecked: false,
        },
        args,
        explicit_type_args: vec![],
    };
    invocation::reduce_invocation(ctx, site, &inv, &sig.return_type)
}
