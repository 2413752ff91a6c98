use std::fmt;

use crate::{
    glb, ClassId, ClassType, Type, TypeEnv, TypeParamDef, TypeVarId, WildcardBound,
};

/// Per-inference-problem typing context layered over a base [`TypeEnv`].
///
/// Capture conversion allocates fresh context-local type variables here
/// instead of mutating the shared [`crate::TypeStore`].
pub struct TyContext<'env> {
    base: &'env dyn TypeEnv,
    locals: Vec<TypeParamDef>,
}

impl fmt::Debug for TyContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TyContext")
            .field("locals", &self.locals)
            .finish_non_exhaustive()
    }
}

impl<'env> TyContext<'env> {
    pub fn new(base: &'env dyn TypeEnv) -> Self {
        Self {
            base,
            locals: Vec::new(),
        }
    }

    fn add_capture_type_param(
        &mut self,
        upper_bounds: Vec<Type>,
        lower_bound: Option<Type>,
    ) -> TypeVarId {
        let idx = self.locals.len() as u32;
        let id = TypeVarId::new_context_local(idx);
        self.locals.push(TypeParamDef {
            name: format!("CAP#{idx}"),
            upper_bounds,
            lower_bound,
        });
        id
    }

    /// Capture conversion for parameterized types containing wildcards
    /// (JLS 5.1.10), best-effort.
    pub fn capture_conversion(&mut self, ty: &Type) -> Type {
        let Type::Class(ClassType { def, args }) = ty else {
            return ty.clone();
        };
        if args.iter().all(|a| !matches!(a, Type::Wildcard(_))) {
            return ty.clone();
        }

        let object = Type::class(self.well_known().object, vec![]);
        let formal_bounds: Vec<Type> = match self.class(*def) {
            Some(class_def) => class_def
                .type_params
                .iter()
                .map(|tp| {
                    self.type_param(*tp)
                        .and_then(|d| d.upper_bounds.first().cloned())
                        .unwrap_or_else(|| object.clone())
                })
                .collect(),
            None => return ty.clone(),
        };

        let mut new_args = Vec::with_capacity(args.len());
        for (idx, arg) in args.iter().enumerate() {
            let formal = formal_bounds
                .get(idx)
                .cloned()
                .unwrap_or_else(|| object.clone());
            match arg {
                Type::Wildcard(WildcardBound::Unbounded) => {
                    let cap = self.add_capture_type_param(vec![formal], None);
                    new_args.push(Type::TypeVar(cap));
                }
                Type::Wildcard(WildcardBound::Extends(upper)) => {
                    let upper = glb(self, &formal, upper);
                    let cap = self.add_capture_type_param(vec![upper], None);
                    new_args.push(Type::TypeVar(cap));
                }
                Type::Wildcard(WildcardBound::Super(lower)) => {
                    let cap =
                        self.add_capture_type_param(vec![formal], Some((**lower).clone()));
                    new_args.push(Type::TypeVar(cap));
                }
                other => new_args.push(other.clone()),
            }
        }

        Type::class(*def, new_args)
    }
}

impl TypeEnv for TyContext<'_> {
    fn class(&self, id: ClassId) -> Option<&crate::ClassDef> {
        self.base.class(id)
    }

    fn type_param(&self, id: TypeVarId) -> Option<&TypeParamDef> {
        if let Some(idx) = id.context_local_index() {
            return self.locals.get(idx);
        }
        self.base.type_param(id)
    }

    fn lookup_class(&self, name: &str) -> Option<ClassId> {
        self.base.lookup_class(name)
    }

    fn well_known(&self) -> &crate::WellKnownTypes {
        self.base.well_known()
    }
}

impl TypeVarId {
    const CONTEXT_LOCAL_BIT: u32 = 1 << 31;

    pub(crate) fn new_context_local(index: u32) -> Self {
        Self(Self::CONTEXT_LOCAL_BIT | index)
    }

    pub(crate) fn context_local_index(self) -> Option<usize> {
        if (self.0 & Self::CONTEXT_LOCAL_BIT) == 0 {
            return None;
        }
        Some((self.0 & !Self::CONTEXT_LOCAL_BIT) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{is_subtype, TypeStore};
    use pretty_assertions::assert_eq;

    #[test]
    fn capture_replaces_wildcards_with_fresh_variables() {
        let store = TypeStore::with_minimal_jdk();
        let wk = store.well_known();
        let string = Type::class(wk.string, vec![]);
        let list_ext_string = Type::class(
            wk.list,
            vec![Type::Wildcard(WildcardBound::Extends(Box::new(string.clone())))],
        );

        let mut ctx = TyContext::new(&store);
        let captured = ctx.capture_conversion(&list_ext_string);

        let Type::Class(ClassType { def, args }) = &captured else {
            panic!("capture should keep the class shape");
        };
        assert_eq!(*def, wk.list);
        let Type::TypeVar(cap) = &args[0] else {
            panic!("wildcard argument should become a capture variable");
        };
        assert!(cap.context_local_index().is_some());
        // The capture variable is bounded by the wildcard's upper bound.
        assert!(is_subtype(&ctx, &args[0], &string));
    }

    #[test]
    fn capture_is_identity_without_wildcards() {
        let store = TypeStore::with_minimal_jdk();
        let wk = store.well_known();
        let string = Type::class(wk.string, vec![]);
        let list_string = Type::class(wk.list, vec![string]);

        let mut ctx = TyContext::new(&store);
        assert_eq!(ctx.capture_conversion(&list_string), list_string);
    }
}
