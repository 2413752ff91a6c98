use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use vega_types::{ClassId, MethodDef, PrimitiveType, Type, TypeEnv};

/// Stable identity of one expression node, used to detect re-entrant
/// inference on the same invocation site. Clones share the identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExprId(u32);

impl ExprId {
    fn fresh() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(0);
        ExprId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Where the expression syntactically occurs. Poly expressions only exist in
/// assignment-like contexts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExprContext {
    Vanilla,
    Assignment,
    InvocationArgument,
}

impl ExprContext {
    pub fn is_assignment_like(self) -> bool {
        !matches!(self, ExprContext::Vanilla)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Long(i64),
    Double(f64),
    Char(char),
    Str(String),
    Null,
}

impl Literal {
    pub fn ty(&self, env: &dyn TypeEnv) -> Type {
        match self {
            Literal::Bool(_) => Type::Primitive(PrimitiveType::Boolean),
            Literal::Int(_) => Type::Primitive(PrimitiveType::Int),
            Literal::Long(_) => Type::Primitive(PrimitiveType::Long),
            Literal::Double(_) => Type::Primitive(PrimitiveType::Double),
            Literal::Char(_) => Type::Primitive(PrimitiveType::Char),
            Literal::Str(_) => Type::class(env.well_known().string, vec![]),
            Literal::Null => Type::Null,
        }
    }
}

/// Which member of a class an invocation is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberRef {
    /// Index into [`vega_types::ClassDef::methods`].
    Method(usize),
    /// Index into [`vega_types::ClassDef::constructors`], a diamond
    /// (`new C<>(...)`) site whose class type arguments are inferred.
    Constructor(usize),
}

/// The overload already chosen for an invocation, with its type arguments
/// still to be inferred.
///
/// `outer_args` is the enclosing-type instantiation (fixed by an outer
/// inference round); the member's own type parameters stay free so the
/// handler can re-derive the unsubstituted signature.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MethodBinding {
    pub class: ClassId,
    pub member: MemberRef,
    pub outer_args: Vec<Type>,
    /// The applicability round required an unchecked (raw) conversion.
    pub unchecked: bool,
}

impl MethodBinding {
    pub fn method(class: ClassId, index: usize) -> Self {
        MethodBinding {
            class,
            member: MemberRef::Method(index),
            outer_args: vec![],
            unchecked: false,
        }
    }

    pub fn constructor(class: ClassId, index: usize) -> Self {
        MethodBinding {
            class,
            member: MemberRef::Constructor(index),
            outer_args: vec![],
            unchecked: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvocationExpr {
    pub binding: MethodBinding,
    pub args: Vec<Expr>,
    /// Explicit type witnesses (`Util.<String>id(...)`); empty when inferred.
    pub explicit_type_args: Vec<Type>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LambdaParam {
    pub name: String,
    /// `None` when the parameter type is elided (`x -> ...`).
    pub ty: Option<Type>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LambdaBody {
    Expr(Box<Expr>),
    Block {
        /// Every reachable `return` expression.
        results: Vec<Expr>,
        void_compatible: bool,
        value_compatible: bool,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LambdaExpr {
    pub params: Vec<LambdaParam>,
    pub body: LambdaBody,
}

impl LambdaExpr {
    /// All parameter types are declared (trivially true for zero parameters).
    pub fn has_explicit_param_types(&self) -> bool {
        self.params.iter().all(|p| p.ty.is_some())
    }

    pub fn result_exprs(&self) -> Vec<&Expr> {
        match &self.body {
            LambdaBody::Expr(e) => vec![e],
            LambdaBody::Block { results, .. } => results.iter().collect(),
        }
    }

    /// The body could stand as a statement (JLS 15.27.2 void compatibility).
    pub fn is_void_compatible(&self) -> bool {
        match &self.body {
            LambdaBody::Expr(e) => matches!(e.unparenthesized().kind, ExprKind::Invocation(_)),
            LambdaBody::Block {
                void_compatible, ..
            } => *void_compatible,
        }
    }

    /// Every control path produces a value.
    pub fn is_value_compatible(&self) -> bool {
        match &self.body {
            LambdaBody::Expr(_) => true,
            LambdaBody::Block {
                value_compatible, ..
            } => *value_compatible,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MethodRefExpr {
    /// The type to the left of `::`.
    pub receiver: Type,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    /// Any standalone expression known to the reducer only through its
    /// resolved type.
    Opaque,
    Literal(Literal),
    Invocation(InvocationExpr),
    /// The condition operand never influences typing and is not carried.
    Conditional {
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Lambda(LambdaExpr),
    MethodRef(MethodRefExpr),
    /// Parenthesized expressions are transparent: no shape of their own.
    Paren(Box<Expr>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub id: ExprId,
    pub kind: ExprKind,
    pub ctx: ExprContext,
    /// Filled lazily by the surrounding type checker once known.
    pub resolved: Option<Type>,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Expr {
            id: ExprId::fresh(),
            kind,
            ctx: ExprContext::Vanilla,
            resolved: None,
        }
    }

    /// A standalone expression with an already-resolved type.
    pub fn typed(ty: Type) -> Self {
        Expr::new(ExprKind::Opaque).with_type(ty)
    }

    pub fn literal(lit: Literal) -> Self {
        Expr::new(ExprKind::Literal(lit))
    }

    pub fn in_ctx(mut self, ctx: ExprContext) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn with_type(mut self, ty: Type) -> Self {
        self.resolved = Some(ty);
        self
    }

    /// Strip any parenthesis layers.
    pub fn unparenthesized(&self) -> &Expr {
        let mut expr = self;
        while let ExprKind::Paren(inner) = &expr.kind {
            expr = inner;
        }
        expr
    }
}

/// Whether `expr` is a poly expression when checked in context `ctx`
/// (JLS 15.2). The reducer forces an assignment-like context here to test
/// whether an expression *could* be poly at all.
pub fn is_poly_expression(env: &dyn TypeEnv, expr: &Expr, ctx: ExprContext) -> bool {
    match &expr.unparenthesized().kind {
        ExprKind::Lambda(_) | ExprKind::MethodRef(_) => ctx.is_assignment_like(),
        ExprKind::Conditional {
            then_branch,
            else_branch,
        } => {
            ctx.is_assignment_like()
                && (is_poly_expression(env, then_branch, ctx)
                    || is_poly_expression(env, else_branch, ctx)
                    || then_branch.resolved.is_none()
                    || else_branch.resolved.is_none())
        }
        ExprKind::Invocation(inv) => {
            if !ctx.is_assignment_like() || !inv.explicit_type_args.is_empty() {
                return false;
            }
            let Some(class_def) = env.class(inv.binding.class) else {
                return false;
            };
            match inv.binding.member {
                // A diamond creation is poly whenever the class is generic.
                MemberRef::Constructor(_) => !class_def.type_params.is_empty(),
                MemberRef::Method(idx) => class_def.methods.get(idx).is_some_and(|m| {
                    !m.type_params.is_empty()
                        && mentions_any_type_var(&m.return_type, &m.type_params)
                }),
            }
        }
        _ => false,
    }
}

fn mentions_any_type_var(ty: &Type, vars: &[vega_types::TypeVarId]) -> bool {
    match ty {
        Type::TypeVar(id) => vars.contains(id),
        Type::Class(ct) => ct.args.iter().any(|a| mentions_any_type_var(a, vars)),
        Type::Array(elem) => mentions_any_type_var(elem, vars),
        Type::Wildcard(vega_types::WildcardBound::Extends(b))
        | Type::Wildcard(vega_types::WildcardBound::Super(b)) => mentions_any_type_var(b, vars),
        Type::Intersection(parts) => parts.iter().any(|p| mentions_any_type_var(p, vars)),
        _ => false,
    }
}

/// An *exact* method reference: the receiver class declares exactly one
/// candidate of that name, and it needs neither varargs expansion nor type
/// argument inference (JLS 15.13.1).
pub(crate) struct ExactRef {
    pub class: ClassId,
    pub method: usize,
}

pub(crate) fn exact_method_binding(env: &dyn TypeEnv, mref: &MethodRefExpr) -> Option<ExactRef> {
    let Type::Class(ct) = &mref.receiver else {
        return None;
    };
    let class_def = env.class(ct.def)?;
    let mut found: Option<(usize, &MethodDef)> = None;
    for (idx, m) in class_def.methods.iter().enumerate() {
        if m.name != mref.name {
            continue;
        }
        if found.is_some() {
            return None;
        }
        found = Some((idx, m));
    }
    let (idx, m) = found?;
    if m.is_varargs || !m.type_params.is_empty() {
        return None;
    }
    Some(ExactRef {
        class: ct.def,
        method: idx,
    })
}
