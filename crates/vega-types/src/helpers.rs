use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::{
    ClassId, ClassKind, ClassType, InferVarId, PrimitiveType, Type, TypeEnv, TypeVarId,
    WildcardBound,
};

/// Whether `ty` mentions no inference variable, transitively.
pub fn is_proper(ty: &Type) -> bool {
    match ty {
        Type::Infer(_) => false,
        Type::Class(ClassType { args, .. }) => args.iter().all(is_proper),
        Type::Array(elem) => is_proper(elem),
        Type::Wildcard(WildcardBound::Extends(b)) | Type::Wildcard(WildcardBound::Super(b)) => {
            is_proper(b)
        }
        Type::Intersection(parts) => parts.iter().all(is_proper),
        _ => true,
    }
}

/// Collect every inference variable mentioned in `ty` into `out`.
pub fn collect_infer_vars(ty: &Type, out: &mut BTreeSet<InferVarId>) {
    match ty {
        Type::Infer(v) => {
            out.insert(*v);
        }
        Type::Class(ClassType { args, .. }) => {
            for arg in args {
                collect_infer_vars(arg, out);
            }
        }
        Type::Array(elem) => collect_infer_vars(elem, out),
        Type::Wildcard(WildcardBound::Extends(b)) | Type::Wildcard(WildcardBound::Super(b)) => {
            collect_infer_vars(b, out)
        }
        Type::Intersection(parts) => {
            for part in parts {
                collect_infer_vars(part, out);
            }
        }
        _ => {}
    }
}

/// Apply a type-variable substitution to `ty`.
pub fn substitute(ty: &Type, subst: &HashMap<TypeVarId, Type>) -> Type {
    if subst.is_empty() {
        return ty.clone();
    }
    match ty {
        Type::TypeVar(id) => subst.get(id).cloned().unwrap_or_else(|| ty.clone()),
        Type::Class(ClassType { def, args }) => {
            Type::class(*def, args.iter().map(|a| substitute(a, subst)).collect())
        }
        Type::Array(elem) => Type::array(substitute(elem, subst)),
        Type::Wildcard(WildcardBound::Extends(b)) => {
            Type::Wildcard(WildcardBound::Extends(Box::new(substitute(b, subst))))
        }
        Type::Wildcard(WildcardBound::Super(b)) => {
            Type::Wildcard(WildcardBound::Super(Box::new(substitute(b, subst))))
        }
        Type::Intersection(parts) => {
            Type::Intersection(parts.iter().map(|p| substitute(p, subst)).collect())
        }
        other => other.clone(),
    }
}

/// Rewrite inference variables in `ty` through `f`; variables `f` does not map
/// are left in place.
pub fn map_infer_vars(ty: &Type, f: &mut dyn FnMut(InferVarId) -> Option<Type>) -> Type {
    match ty {
        Type::Infer(v) => f(*v).unwrap_or_else(|| ty.clone()),
        Type::Class(ClassType { def, args }) => {
            Type::class(*def, args.iter().map(|a| map_infer_vars(a, f)).collect())
        }
        Type::Array(elem) => Type::array(map_infer_vars(elem, f)),
        Type::Wildcard(WildcardBound::Extends(b)) => {
            Type::Wildcard(WildcardBound::Extends(Box::new(map_infer_vars(b, f))))
        }
        Type::Wildcard(WildcardBound::Super(b)) => {
            Type::Wildcard(WildcardBound::Super(Box::new(map_infer_vars(b, f))))
        }
        Type::Intersection(parts) => {
            Type::Intersection(parts.iter().map(|p| map_infer_vars(p, f)).collect())
        }
        other => other.clone(),
    }
}

/// The erasure of `ty` (JLS 4.6): raw classes, erased array components, and
/// the leftmost bound for type variables.
pub fn erasure(env: &dyn TypeEnv, ty: &Type) -> Type {
    match ty {
        Type::Class(ClassType { def, .. }) => Type::class(*def, vec![]),
        Type::Array(elem) => Type::array(erasure(env, elem)),
        Type::TypeVar(id) => match env.type_param(*id).and_then(|tp| tp.upper_bounds.first()) {
            Some(bound) => erasure(env, &bound.clone()),
            None => Type::class(env.well_known().object, vec![]),
        },
        Type::Intersection(parts) => match parts.first() {
            Some(first) => erasure(env, &first.clone()),
            None => Type::class(env.well_known().object, vec![]),
        },
        Type::Wildcard(_) | Type::Infer(_) => Type::Unknown,
        other => other.clone(),
    }
}

/// A functional interface's single-abstract-method signature, with the
/// interface's type arguments substituted in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SamSignature {
    pub params: Vec<Type>,
    pub return_type: Type,
}

/// Best-effort functional-interface detection and single-abstract-method
/// extraction.
///
/// Walks the interface inheritance graph applying type-argument substitution,
/// ignores `Object` methods and non-abstract members, and requires exactly one
/// surviving abstract method. Type variables are functional when their bounds
/// agree on a signature; intersections when their functional components do.
pub fn sam_signature(env: &dyn TypeEnv, ty: &Type) -> Option<SamSignature> {
    let mut seen_type_vars = HashSet::new();
    sam_inner(env, ty, &mut seen_type_vars)
}

fn sam_inner(
    env: &dyn TypeEnv,
    ty: &Type,
    seen_type_vars: &mut HashSet<TypeVarId>,
) -> Option<SamSignature> {
    match ty {
        Type::TypeVar(id) => {
            if !seen_type_vars.insert(*id) {
                return None;
            }
            let mut sig: Option<SamSignature> = None;
            if let Some(tp) = env.type_param(*id) {
                for bound in tp.upper_bounds.clone() {
                    let Some(bound_sig) = sam_inner(env, &bound, seen_type_vars) else {
                        continue;
                    };
                    match &sig {
                        None => sig = Some(bound_sig),
                        Some(existing) if *existing == bound_sig => {}
                        Some(_) => {
                            seen_type_vars.remove(id);
                            return None;
                        }
                    }
                }
            }
            seen_type_vars.remove(id);
            sig
        }
        Type::Intersection(parts) => {
            let mut sig: Option<SamSignature> = None;
            for part in parts {
                let Some(part_sig) = sam_inner(env, part, seen_type_vars) else {
                    continue;
                };
                match &sig {
                    None => sig = Some(part_sig),
                    Some(existing) if *existing == part_sig => {}
                    Some(_) => return None,
                }
            }
            sig
        }
        Type::Class(ClassType { def, args }) => sam_of_interface(env, *def, args),
        _ => None,
    }
}

fn sam_of_interface(env: &dyn TypeEnv, def: ClassId, args: &[Type]) -> Option<SamSignature> {
    if env.class(def)?.kind != ClassKind::Interface {
        return None;
    }

    let mut queue: VecDeque<(ClassId, Vec<Type>)> = VecDeque::new();
    let mut seen: HashSet<(ClassId, Vec<Type>)> = HashSet::new();
    queue.push_back((def, args.to_vec()));

    // (name, parameter types) -> return type of the abstract methods seen so far.
    let mut candidates: HashMap<(String, Vec<Type>), Type> = HashMap::new();

    while let Some((def, args)) = queue.pop_front() {
        if !seen.insert((def, args.clone())) {
            continue;
        }
        let Some(class_def) = env.class(def) else {
            continue;
        };

        let mut subst: HashMap<TypeVarId, Type> =
            HashMap::with_capacity(class_def.type_params.len());
        for (idx, formal) in class_def.type_params.iter().copied().enumerate() {
            subst.insert(formal, args.get(idx).cloned().unwrap_or(Type::Unknown));
        }

        for m in &class_def.methods {
            if m.is_static || !m.is_abstract {
                continue;
            }
            let params: Vec<Type> = m.params.iter().map(|p| substitute(p, &subst)).collect();
            let return_type = substitute(&m.return_type, &subst);
            if is_object_method(env, &m.name, &params, &return_type) {
                continue;
            }
            let key = (m.name.clone(), params);
            match candidates.get(&key) {
                None => {
                    candidates.insert(key, return_type);
                }
                Some(existing) if *existing == return_type => {}
                Some(existing) => {
                    // Override-equivalent declarations must agree on the most
                    // specific return type.
                    if crate::is_subtype(env, &return_type, existing) {
                        candidates.insert(key, return_type);
                    } else if !crate::is_subtype(env, existing, &return_type) {
                        return None;
                    }
                }
            }
        }

        for iface in &class_def.interfaces {
            if let Type::Class(ClassType { def, args }) = substitute(iface, &subst) {
                queue.push_back((def, args));
            }
        }
        if let Some(sc) = &class_def.super_class {
            if let Type::Class(ClassType { def, args }) = substitute(sc, &subst) {
                queue.push_back((def, args));
            }
        }
    }

    if candidates.len() != 1 {
        return None;
    }
    let ((_name, params), return_type) = candidates.into_iter().next()?;
    Some(SamSignature {
        params,
        return_type,
    })
}

fn is_object_method(env: &dyn TypeEnv, name: &str, params: &[Type], return_type: &Type) -> bool {
    let wk = env.well_known();
    match name {
        "equals" => {
            params.len() == 1
                && params[0] == Type::class(wk.object, vec![])
                && *return_type == Type::Primitive(PrimitiveType::Boolean)
        }
        "hashCode" => params.is_empty() && *return_type == Type::Primitive(PrimitiveType::Int),
        "toString" => params.is_empty() && *return_type == Type::class(wk.string, vec![]),
        _ => false,
    }
}
