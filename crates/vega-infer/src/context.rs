use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};

use tracing::debug;
use vega_types::{TyContext, Type, TypeEnv};

use crate::bounds::{BoundSet, Solution};
use crate::error::Result;
use crate::expr::{Expr, ExprId, ExprKind};
use crate::formula::{ConstraintFormula, Reduction};
use crate::reduce;

/// One invocation site currently undergoing nested inference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InvocationRecord {
    pub site: ExprId,
}

/// State of one inference problem: the typing context, the shared bound set,
/// and the stack of invocation sites whose inference is in progress.
#[derive(Debug)]
pub struct InferenceContext<'e> {
    pub(crate) ty_ctx: TyContext<'e>,
    pub(crate) bounds: BoundSet,
    pub(crate) invocations: Vec<InvocationRecord>,
}

impl<'e> InferenceContext<'e> {
    pub fn new(env: &'e dyn TypeEnv) -> Self {
        InferenceContext {
            ty_ctx: TyContext::new(env),
            bounds: BoundSet::new(),
            invocations: Vec::new(),
        }
    }

    pub fn env(&self) -> &TyContext<'e> {
        &self.ty_ctx
    }

    pub fn bounds(&self) -> &BoundSet {
        &self.bounds
    }

    pub fn bounds_mut(&mut self) -> &mut BoundSet {
        &mut self.bounds
    }

    pub fn invocation_depth(&self) -> usize {
        self.invocations.len()
    }

    /// Push an invocation record, or `None` when inference for `site` is
    /// already on the stack (a cycle through argument positions). The record
    /// is popped when the returned scope drops.
    pub fn enter_invocation(&mut self, site: ExprId) -> Option<InvocationScope<'_, 'e>> {
        if self.invocations.iter().any(|r| r.site == site) {
            debug!(?site, "re-entrant invocation inference refused");
            return None;
        }
        debug!(?site, depth = self.invocations.len(), "entering invocation inference");
        self.invocations.push(InvocationRecord { site });
        Some(InvocationScope { ctx: self })
    }

    /// Drive `formula` to a fixed point, incorporating every produced type
    /// relation into the bound set. `Ok(false)` means some constraint
    /// reduced to a contradiction.
    pub fn reduce_and_incorporate(&mut self, formula: ConstraintFormula) -> Result<bool> {
        let mut work = VecDeque::new();
        work.push_back(formula);
        while let Some(f) = work.pop_front() {
            match reduce::reduce(self, f)? {
                Reduction::True | Reduction::Incorporated => {}
                Reduction::False => return Ok(false),
                Reduction::More(next) => {
                    for f in next.into_iter().rev() {
                        work.push_front(f);
                    }
                }
            }
        }
        Ok(true)
    }

    /// Resolve every inference variable created so far.
    pub fn solve(&mut self) -> Option<Solution> {
        let InferenceContext { ty_ctx, bounds, .. } = self;
        bounds.solve(&*ty_ctx)
    }

    /// The type of an already-checked standalone expression, with any known
    /// variable instantiations substituted in.
    pub fn expr_type(&self, expr: &Expr) -> Option<Type> {
        let expr = expr.unparenthesized();
        if let Some(t) = &expr.resolved {
            return Some(self.bounds.substitute_partial(t));
        }
        if let ExprKind::Literal(lit) = &expr.kind {
            return Some(lit.ty(self.env()));
        }
        None
    }
}

/// Guard holding one [`InvocationRecord`] on the stack. Derefs to the
/// context so nested reduction can continue through it.
pub struct InvocationScope<'a, 'e> {
    ctx: &'a mut InferenceContext<'e>,
}

impl<'e> Deref for InvocationScope<'_, 'e> {
    type Target = InferenceContext<'e>;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl DerefMut for InvocationScope<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

impl Drop for InvocationScope<'_, '_> {
    fn drop(&mut self) {
        if let Some(record) = self.ctx.invocations.pop() {
            debug!(site = ?record.site, depth = self.ctx.invocations.len(), "leaving invocation inference");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vega_types::TypeStore;

    #[test]
    fn invocation_records_are_lifo() {
        let store = TypeStore::with_minimal_jdk();
        let mut ctx = InferenceContext::new(&store);
        let outer = Expr::new(crate::expr::ExprKind::Opaque);
        let inner = Expr::new(crate::expr::ExprKind::Opaque);

        assert_eq!(ctx.invocation_depth(), 0);
        {
            let mut outer_scope = ctx.enter_invocation(outer.id).expect("fresh site");
            assert_eq!(outer_scope.invocation_depth(), 1);
            {
                let inner_scope = outer_scope.enter_invocation(inner.id).expect("fresh site");
                assert_eq!(inner_scope.invocation_depth(), 2);
            }
            assert_eq!(outer_scope.invocation_depth(), 1);
        }
        assert_eq!(ctx.invocation_depth(), 0);
    }

    #[test]
    fn re_entrant_site_is_refused() {
        let store = TypeStore::with_minimal_jdk();
        let mut ctx = InferenceContext::new(&store);
        let site = Expr::new(crate::expr::ExprKind::Opaque);

        let mut scope = ctx.enter_invocation(site.id).expect("fresh site");
        assert!(scope.enter_invocation(site.id).is_none());
    }
}
