//! Poly-expression compatibility constraint reduction for generic-method
//! type inference (JLS chapter 18).
//!
//! The surrounding type checker hands this crate [`ConstraintFormula`]s of
//! the form *expression → target type* or *type ⟨relation⟩ type*. [`reduce`]
//! turns one formula into a [`Reduction`] verdict: decided (`True`/`False`),
//! already folded into the shared [`BoundSet`] (`Incorporated`), or a list of
//! sibling formulas still to process. Nested generic invocations run their
//! own applicability and invocation type inference in place (JLS 18.5.1,
//! 18.5.2), guarded by a LIFO stack of invocation records that refuses
//! re-entrant inference on the same call site.
//!
//! The crate mutates nothing outside the [`InferenceContext`] it is given;
//! all shared state lives in that context's bound set.

mod bounds;
mod context;
mod error;
mod expr;
mod formula;
mod input_vars;
mod invocation;
mod reduce;

pub use bounds::{BoundSet, CaptureRecord, Solution, VarBounds};
pub use context::{InferenceContext, InvocationRecord, InvocationScope};
pub use error::{InferenceError, Result};
pub use expr::{
    is_poly_expression, Expr, ExprContext, ExprId, ExprKind, InvocationExpr, LambdaBody,
    LambdaExpr, LambdaParam, Literal, MemberRef, MethodBinding, MethodRefExpr,
};
pub use formula::{ConstraintFormula, Reduction, Relation};
pub use input_vars::input_variables;
pub use reduce::reduce;
