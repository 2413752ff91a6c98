use std::collections::{HashMap, HashSet, VecDeque};

use crate::{
    substitute, unboxed_primitive, wrapper_class, ClassId, ClassType, PrimitiveType, Type, TypeEnv,
    TypeVarId, WildcardBound,
};

/// Widening primitive conversion (JLS 5.1.2).
pub fn widens_to(from: PrimitiveType, to: PrimitiveType) -> bool {
    use PrimitiveType::*;
    if from == to {
        return true;
    }
    match from {
        Byte => matches!(to, Short | Int | Long | Float | Double),
        Short => matches!(to, Int | Long | Float | Double),
        Char => matches!(to, Int | Long | Float | Double),
        Int => matches!(to, Long | Float | Double),
        Long => matches!(to, Float | Double),
        Float => matches!(to, Double),
        Boolean | Double => false,
    }
}

/// View `ty` as an instantiation of the class or interface `target`, walking
/// the supertype graph and substituting type arguments along the way.
///
/// Best-effort: missing class metadata returns `None`, and a raw source stays
/// raw (type arguments of supertypes are dropped rather than guessed).
pub fn instantiate_as_supertype(env: &dyn TypeEnv, ty: &Type, target: ClassId) -> Option<Type> {
    match ty {
        Type::TypeVar(id) => {
            let bounds = env.type_param(*id)?.upper_bounds.clone();
            bounds
                .iter()
                .find_map(|bound| instantiate_as_supertype(env, bound, target))
        }
        Type::Intersection(parts) => parts
            .iter()
            .find_map(|part| instantiate_as_supertype(env, part, target)),
        Type::Array(_) => {
            let wk = env.well_known();
            if target == wk.object || target == wk.cloneable || target == wk.serializable {
                return Some(Type::class(target, vec![]));
            }
            None
        }
        Type::Class(ClassType { def, args }) => {
            let mut queue: VecDeque<(ClassId, Vec<Type>)> = VecDeque::new();
            let mut seen: HashSet<(ClassId, Vec<Type>)> = HashSet::new();
            queue.push_back((*def, args.clone()));

            while let Some((def, args)) = queue.pop_front() {
                if !seen.insert((def, args.clone())) {
                    continue;
                }
                if def == target {
                    return Some(Type::class(def, args));
                }
                let Some(class_def) = env.class(def) else {
                    continue;
                };

                // A raw instantiation of a generic class cannot recover
                // supertype arguments; keep walking rawly.
                let raw = args.is_empty() && !class_def.type_params.is_empty();
                let subst: HashMap<TypeVarId, Type> = if raw {
                    HashMap::new()
                } else {
                    class_def
                        .type_params
                        .iter()
                        .copied()
                        .enumerate()
                        .map(|(idx, formal)| {
                            (formal, args.get(idx).cloned().unwrap_or(Type::Unknown))
                        })
                        .collect()
                };

                let supers = class_def
                    .super_class
                    .iter()
                    .chain(class_def.interfaces.iter());
                for sup in supers {
                    if let Type::Class(ClassType { def, args }) = substitute(sup, &subst) {
                        if raw {
                            queue.push_back((def, vec![]));
                        } else {
                            queue.push_back((def, args));
                        }
                    }
                }
                // Every interface has Object as an implicit supertype (JLS 4.10.2).
                if class_def.super_class.is_none() {
                    queue.push_back((env.well_known().object, vec![]));
                }
            }
            None
        }
        _ => None,
    }
}

/// Reference subtyping over proper types (JLS 4.10), best-effort.
///
/// Lenient on `Unknown`/`Error` so recovery types do not cascade failures.
pub fn is_subtype(env: &dyn TypeEnv, a: &Type, b: &Type) -> bool {
    if a == b {
        return true;
    }
    if a.is_errorish() || b.is_errorish() {
        return true;
    }
    match (a, b) {
        (Type::Null, _) => b.is_reference(),
        (_, Type::Intersection(parts)) => parts.iter().all(|p| is_subtype(env, a, p)),
        (Type::Intersection(parts), _) => parts.iter().any(|p| is_subtype(env, p, b)),
        (Type::TypeVar(id), _) => env
            .type_param(*id)
            .map(|tp| tp.upper_bounds.clone())
            .is_some_and(|bounds| bounds.iter().any(|u| is_subtype(env, u, b))),
        (Type::Array(ae), Type::Array(be)) => match (ae.as_ref(), be.as_ref()) {
            (Type::Primitive(x), Type::Primitive(y)) => x == y,
            (x, y) => is_subtype(env, x, y),
        },
        (Type::Array(_), Type::Class(ct)) if ct.args.is_empty() => {
            let wk = env.well_known();
            ct.def == wk.object || ct.def == wk.cloneable || ct.def == wk.serializable
        }
        (Type::Class(_), Type::Class(bt)) => {
            let Some(Type::Class(inst)) = instantiate_as_supertype(env, a, bt.def) else {
                return false;
            };
            type_args_contained(env, &inst.args, &bt.args)
        }
        _ => false,
    }
}

fn type_args_contained(env: &dyn TypeEnv, source: &[Type], target: &[Type]) -> bool {
    if target.is_empty() {
        // Raw target accepts any instantiation.
        return true;
    }
    if source.len() != target.len() {
        return false;
    }
    source
        .iter()
        .zip(target.iter())
        .all(|(s, t)| arg_contains(env, t, s))
}

/// Type-argument containment `t >= s` (JLS 4.5.1).
fn arg_contains(env: &dyn TypeEnv, t: &Type, s: &Type) -> bool {
    if t == s {
        return true;
    }
    match t {
        Type::Wildcard(WildcardBound::Unbounded) => true,
        Type::Wildcard(WildcardBound::Extends(upper)) => match s {
            Type::Wildcard(WildcardBound::Extends(su)) => is_subtype(env, su, upper),
            Type::Wildcard(_) => false,
            _ => is_subtype(env, s, upper),
        },
        Type::Wildcard(WildcardBound::Super(lower)) => match s {
            Type::Wildcard(WildcardBound::Super(sl)) => is_subtype(env, lower, sl),
            Type::Wildcard(_) => false,
            _ => is_subtype(env, lower, s),
        },
        _ => false,
    }
}

/// Loose invocation compatibility (JLS 5.3): identity, widening, subtyping,
/// and boxing/unboxing composed with either.
pub fn is_assignable_loose(env: &dyn TypeEnv, from: &Type, to: &Type) -> bool {
    if from == to {
        return true;
    }
    if from.is_errorish() || to.is_errorish() {
        return true;
    }
    match (from, to) {
        (Type::Primitive(f), Type::Primitive(t)) => widens_to(*f, *t),
        (Type::Primitive(f), _) => {
            let boxed = Type::class(wrapper_class(env, *f), vec![]);
            is_subtype(env, &boxed, to)
        }
        (_, Type::Primitive(t)) => match from {
            Type::Class(ct) if ct.args.is_empty() => unboxed_primitive(env, ct.def)
                .is_some_and(|p| widens_to(p, *t)),
            _ => false,
        },
        _ => is_subtype(env, from, to),
    }
}

/// Greatest lower bound, best-effort: an intersection when neither side wins.
pub fn glb(env: &dyn TypeEnv, a: &Type, b: &Type) -> Type {
    if is_subtype(env, a, b) {
        a.clone()
    } else if is_subtype(env, b, a) {
        b.clone()
    } else {
        Type::Intersection(vec![a.clone(), b.clone()])
    }
}

/// Least upper bound, best-effort: falls back to `Object` rather than
/// computing the full JLS 4.10.4 lub.
pub fn lub(env: &dyn TypeEnv, a: &Type, b: &Type) -> Type {
    if is_subtype(env, a, b) {
        b.clone()
    } else if is_subtype(env, b, a) {
        a.clone()
    } else {
        Type::class(env.well_known().object, vec![])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TypeStore;
    use pretty_assertions::assert_eq;

    #[test]
    fn generic_supertype_substitution() {
        let store = TypeStore::with_minimal_jdk();
        let wk = store.well_known();
        let string = Type::class(wk.string, vec![]);

        let array_list_string = Type::class(wk.array_list, vec![string.clone()]);
        let list_string = Type::class(wk.list, vec![string.clone()]);
        let list_object = Type::class(wk.list, vec![Type::class(wk.object, vec![])]);

        assert_eq!(
            instantiate_as_supertype(&store, &array_list_string, wk.list),
            Some(list_string.clone())
        );
        assert!(is_subtype(&store, &array_list_string, &list_string));
        // Generic types are invariant in their arguments.
        assert!(!is_subtype(&store, &array_list_string, &list_object));
    }

    #[test]
    fn wildcard_containment() {
        let store = TypeStore::with_minimal_jdk();
        let wk = store.well_known();
        let string = Type::class(wk.string, vec![]);
        let object = Type::class(wk.object, vec![]);

        let list_string = Type::class(wk.list, vec![string.clone()]);
        let list_ext_object = Type::class(
            wk.list,
            vec![Type::Wildcard(WildcardBound::Extends(Box::new(object.clone())))],
        );
        let list_sup_string = Type::class(
            wk.list,
            vec![Type::Wildcard(WildcardBound::Super(Box::new(string.clone())))],
        );
        let list_sup_object = Type::class(
            wk.list,
            vec![Type::Wildcard(WildcardBound::Super(Box::new(object)))],
        );

        assert!(is_subtype(&store, &list_string, &list_ext_object));
        assert!(is_subtype(&store, &list_string, &list_sup_string));
        assert!(!is_subtype(&store, &list_string, &list_sup_object));
    }

    #[test]
    fn everything_reference_is_below_object() {
        let store = TypeStore::with_minimal_jdk();
        let wk = store.well_known();
        let object = Type::class(wk.object, vec![]);
        let string = Type::class(wk.string, vec![]);

        assert!(is_subtype(&store, &string, &object));
        assert!(is_subtype(&store, &Type::class(wk.runnable, vec![]), &object));
        assert!(is_subtype(&store, &Type::array(string.clone()), &object));
        assert!(is_subtype(&store, &Type::Null, &string));
        assert!(!is_subtype(&store, &Type::Primitive(PrimitiveType::Int), &object));
    }

    #[test]
    fn loose_compatibility_boxes_and_widens() {
        let store = TypeStore::with_minimal_jdk();
        let wk = store.well_known();
        let int = Type::Primitive(PrimitiveType::Int);
        let long = Type::Primitive(PrimitiveType::Long);
        let integer = Type::class(wk.integer, vec![]);
        let number = Type::class(wk.number, vec![]);
        let string = Type::class(wk.string, vec![]);

        assert!(is_assignable_loose(&store, &int, &long));
        assert!(!is_assignable_loose(&store, &long, &int));
        assert!(is_assignable_loose(&store, &int, &integer));
        assert!(is_assignable_loose(&store, &int, &number));
        assert!(is_assignable_loose(&store, &integer, &int));
        assert!(is_assignable_loose(&store, &integer, &long));
        assert!(!is_assignable_loose(&store, &string, &int));
    }

    #[test]
    fn raw_targets_are_lenient_raw_sources_are_not() {
        let store = TypeStore::with_minimal_jdk();
        let wk = store.well_known();
        let string = Type::class(wk.string, vec![]);
        let list_string = Type::class(wk.list, vec![string]);
        let raw_list = Type::class(wk.list, vec![]);
        let raw_array_list = Type::class(wk.array_list, vec![]);

        assert!(is_subtype(&store, &list_string, &raw_list));
        assert!(is_subtype(&store, &raw_array_list, &raw_list));
        // Raw to parameterized is an unchecked conversion, not a subtyping.
        assert!(!is_subtype(&store, &raw_list, &list_string));
    }

    #[test]
    fn glb_and_lub_prefer_the_tighter_side() {
        let store = TypeStore::with_minimal_jdk();
        let wk = store.well_known();
        let object = Type::class(wk.object, vec![]);
        let string = Type::class(wk.string, vec![]);
        let runnable = Type::class(wk.runnable, vec![]);

        assert_eq!(glb(&store, &object, &string), string);
        assert_eq!(lub(&store, &object, &string), object);
        assert_eq!(
            glb(&store, &string, &runnable),
            Type::Intersection(vec![string.clone(), runnable.clone()])
        );
        assert_eq!(lub(&store, &string, &runnable), object);
    }
}
