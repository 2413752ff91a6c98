use std::collections::{BTreeSet, HashMap};

use vega_types::{
    collect_infer_vars, glb, instantiate_as_supertype, is_assignable_loose, is_proper,
    is_subtype, lub, map_infer_vars, substitute, wrapper_class, InferVarId, Type, TypeEnv,
    TypeVarId, WildcardBound,
};

use crate::error::{InferenceError, Result};
use crate::formula::Relation;

/// Bounds accumulated for one inference variable.
#[derive(Clone, Debug, Default)]
pub struct VarBounds {
    pub equal: Vec<Type>,
    pub upper: Vec<Type>,
    pub lower: Vec<Type>,
    /// The variable appears in a `throws` clause being inferred.
    pub throws: bool,
}

/// A capture-to-parameterization mapping recorded during invocation type
/// inference: `vars` stand for the type arguments of `of`.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureRecord {
    pub vars: Vec<InferVarId>,
    pub of: Type,
}

/// Instantiations chosen by [`BoundSet::solve`].
#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    instantiations: Vec<Type>,
}

impl Solution {
    pub fn instantiation(&self, v: InferVarId) -> Option<&Type> {
        self.instantiations.get(v.index())
    }
}

/// The accumulated bounds of one inference problem.
///
/// This is the single piece of shared mutable state the reducer touches; it
/// is only ever mutated through incorporation and (partial) solving.
#[derive(Debug, Default)]
pub struct BoundSet {
    vars: Vec<VarBounds>,
    captures: Vec<CaptureRecord>,
    instantiations: HashMap<InferVarId, Type>,
}

impl BoundSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn bounds(&self, v: InferVarId) -> Option<&VarBounds> {
        self.vars.get(v.index())
    }

    pub fn captures(&self) -> &[CaptureRecord] {
        &self.captures
    }

    pub fn fresh_var(&mut self) -> Result<InferVarId> {
        let index =
            u32::try_from(self.vars.len()).map_err(|_| InferenceError::TooManyVariables)?;
        self.vars.push(VarBounds::default());
        Ok(InferVarId::new(index))
    }

    /// One fresh inference variable per type parameter, with the declared
    /// upper bounds seeded under the substitution θ = `outer` ∪
    /// {parameter ↦ its variable}. Returns the variables and θ.
    pub fn create_vars(
        &mut self,
        env: &dyn TypeEnv,
        type_params: &[TypeVarId],
        outer: &HashMap<TypeVarId, Type>,
    ) -> Result<(Vec<InferVarId>, HashMap<TypeVarId, Type>)> {
        let mut vars = Vec::with_capacity(type_params.len());
        let mut theta = outer.clone();
        for tp in type_params {
            let v = self.fresh_var()?;
            theta.insert(*tp, Type::Infer(v));
            vars.push(v);
        }
        for (tp, v) in type_params.iter().zip(vars.iter()) {
            let declared = env
                .type_param(*tp)
                .map(|d| d.upper_bounds.clone())
                .unwrap_or_default();
            for bound in declared {
                self.add_upper(env, *v, substitute(&bound, &theta));
            }
        }
        Ok((vars, theta))
    }

    pub fn mark_throws(&mut self, v: InferVarId) {
        if let Some(vb) = self.vars.get_mut(v.index()) {
            vb.throws = true;
        }
    }

    pub fn record_capture(&mut self, vars: Vec<InferVarId>, of: Type) {
        self.captures.push(CaptureRecord { vars, of });
    }

    /// The proper instantiation of `v`, if one is already pinned down.
    pub fn instantiation(&self, v: InferVarId) -> Option<Type> {
        if let Some(t) = self.instantiations.get(&v) {
            return Some(t.clone());
        }
        self.vars
            .get(v.index())
            .and_then(|vb| vb.equal.iter().find(|t| is_proper(t)).cloned())
    }

    /// Replace every inference variable with a known proper instantiation.
    pub fn substitute_partial(&self, ty: &Type) -> Type {
        map_infer_vars(ty, &mut |v| self.instantiation(v))
    }

    /// Fold one type relation into the bound set. `false` means the bounds
    /// became unsatisfiable.
    pub fn incorporate(
        &mut self,
        env: &dyn TypeEnv,
        left: &Type,
        relation: Relation,
        right: &Type,
    ) -> bool {
        let left = self.substitute_partial(left);
        let right = self.substitute_partial(right);
        self.incorporate_inner(env, &left, relation, &right)
    }

    fn incorporate_inner(
        &mut self,
        env: &dyn TypeEnv,
        left: &Type,
        relation: Relation,
        right: &Type,
    ) -> bool {
        if is_proper(left) && is_proper(right) {
            return match relation {
                Relation::Same => {
                    left == right || left.is_errorish() || right.is_errorish()
                }
                Relation::Subtype => is_subtype(env, left, right),
                Relation::Compatible => is_assignable_loose(env, left, right),
            };
        }

        match (left, right) {
            (Type::Infer(v), Type::Infer(w)) => match relation {
                Relation::Same => {
                    self.add_equal(env, *v, right.clone())
                        && self.add_equal(env, *w, left.clone())
                }
                Relation::Subtype | Relation::Compatible => {
                    self.add_upper(env, *v, right.clone())
                        && self.add_lower(env, *w, left.clone())
                }
            },
            (Type::Infer(v), _) => match relation {
                Relation::Same => self.add_equal(env, *v, right.clone()),
                Relation::Subtype | Relation::Compatible => {
                    self.add_upper(env, *v, right.clone())
                }
            },
            (_, Type::Infer(v)) => match relation {
                Relation::Same => self.add_equal(env, *v, left.clone()),
                Relation::Subtype | Relation::Compatible => {
                    self.add_lower(env, *v, left.clone())
                }
            },
            _ => self.incorporate_structural(env, left, relation, right),
        }
    }

    fn incorporate_structural(
        &mut self,
        env: &dyn TypeEnv,
        left: &Type,
        relation: Relation,
        right: &Type,
    ) -> bool {
        if left.is_errorish() || right.is_errorish() {
            return true;
        }
        match (left, right) {
            (Type::Class(lct), Type::Class(rct)) if relation == Relation::Same => {
                lct.def == rct.def
                    && lct.args.len() == rct.args.len()
                    && lct
                        .args
                        .iter()
                        .zip(rct.args.iter())
                        .all(|(s, t)| self.incorporate_arg_same(env, s, t))
            }
            (Type::Array(ae), Type::Array(be)) => match (ae.as_ref(), be.as_ref()) {
                (Type::Primitive(x), Type::Primitive(y)) => x == y,
                (x, y) => {
                    let rel = if relation == Relation::Same {
                        Relation::Same
                    } else {
                        Relation::Subtype
                    };
                    self.incorporate_inner(env, &x.clone(), rel, &y.clone())
                }
            },
            (Type::Primitive(p), _) if relation == Relation::Compatible => {
                let boxed = Type::class(wrapper_class(env, *p), vec![]);
                self.incorporate_inner(env, &boxed, Relation::Subtype, right)
            }
            (_, Type::Class(rct)) if relation != Relation::Same => {
                let Some(Type::Class(inst)) = instantiate_as_supertype(env, left, rct.def)
                else {
                    return false;
                };
                if rct.args.is_empty() {
                    return true;
                }
                if inst.args.len() != rct.args.len() {
                    return false;
                }
                let targs = rct.args.clone();
                inst.args
                    .iter()
                    .zip(targs.iter())
                    .all(|(s, t)| self.incorporate_containment(env, s, t))
            }
            _ => false,
        }
    }

    fn incorporate_arg_same(&mut self, env: &dyn TypeEnv, s: &Type, t: &Type) -> bool {
        match (s, t) {
            (
                Type::Wildcard(WildcardBound::Extends(sb)),
                Type::Wildcard(WildcardBound::Extends(tb)),
            )
            | (
                Type::Wildcard(WildcardBound::Super(sb)),
                Type::Wildcard(WildcardBound::Super(tb)),
            ) => self.incorporate_inner(env, &sb.clone(), Relation::Same, &tb.clone()),
            (Type::Wildcard(WildcardBound::Unbounded), Type::Wildcard(WildcardBound::Unbounded)) => {
                true
            }
            (Type::Wildcard(_), _) | (_, Type::Wildcard(_)) => false,
            _ => self.incorporate_inner(env, s, Relation::Same, t),
        }
    }

    /// Containment `t >= s` lifted to non-proper arguments (JLS 4.5.1 over
    /// bounds rather than decided subtyping).
    fn incorporate_containment(&mut self, env: &dyn TypeEnv, s: &Type, t: &Type) -> bool {
        match t {
            Type::Wildcard(WildcardBound::Unbounded) => true,
            Type::Wildcard(WildcardBound::Extends(upper)) => match s {
                Type::Wildcard(WildcardBound::Extends(su)) => {
                    self.incorporate_inner(env, &su.clone(), Relation::Subtype, &upper.clone())
                }
                Type::Wildcard(_) => false,
                _ => self.incorporate_inner(env, s, Relation::Subtype, &upper.clone()),
            },
            Type::Wildcard(WildcardBound::Super(lower)) => match s {
                Type::Wildcard(WildcardBound::Super(sl)) => {
                    self.incorporate_inner(env, &lower.clone(), Relation::Subtype, &sl.clone())
                }
                Type::Wildcard(_) => false,
                _ => self.incorporate_inner(env, &lower.clone(), Relation::Subtype, s),
            },
            _ => self.incorporate_arg_same(env, s, t),
        }
    }

    fn add_equal(&mut self, env: &dyn TypeEnv, v: InferVarId, t: Type) -> bool {
        if let Type::Infer(w) = t {
            if w == v {
                return true;
            }
        }
        let Some(vb) = self.vars.get(v.index()) else {
            return false;
        };
        if is_proper(&t) && !t.is_errorish() {
            for e in vb.equal.iter().filter(|e| is_proper(e)) {
                if *e != t && !e.is_errorish() {
                    return false;
                }
            }
            for u in vb.upper.iter().filter(|u| is_proper(u)) {
                if !is_assignable_loose(env, &t, u) {
                    return false;
                }
            }
            for l in vb.lower.iter().filter(|l| is_proper(l)) {
                if !is_assignable_loose(env, l, &t) {
                    return false;
                }
            }
        }
        self.vars[v.index()].equal.push(t);
        true
    }

    fn add_upper(&mut self, env: &dyn TypeEnv, v: InferVarId, t: Type) -> bool {
        let Some(vb) = self.vars.get(v.index()) else {
            return false;
        };
        if is_proper(&t) && !t.is_errorish() {
            for e in vb.equal.iter().filter(|e| is_proper(e)) {
                if !is_assignable_loose(env, e, &t) {
                    return false;
                }
            }
            for l in vb.lower.iter().filter(|l| is_proper(l)) {
                if !is_assignable_loose(env, l, &t) {
                    return false;
                }
            }
        }
        self.vars[v.index()].upper.push(t);
        true
    }

    fn add_lower(&mut self, env: &dyn TypeEnv, v: InferVarId, t: Type) -> bool {
        let Some(vb) = self.vars.get(v.index()) else {
            return false;
        };
        if is_proper(&t) && !t.is_errorish() {
            for e in vb.equal.iter().filter(|e| is_proper(e)) {
                if !is_assignable_loose(env, &t, e) {
                    return false;
                }
            }
            for u in vb.upper.iter().filter(|u| is_proper(u)) {
                if !is_assignable_loose(env, &t, u) {
                    return false;
                }
            }
        }
        self.vars[v.index()].lower.push(t);
        true
    }

    fn compute_instantiation(&self, env: &dyn TypeEnv, v: InferVarId) -> Option<Type> {
        let vb = self.vars.get(v.index())?;
        if let Some(e) = vb.equal.iter().find(|t| is_proper(t) && !t.is_errorish()) {
            return Some(e.clone());
        }
        let lowers: Vec<&Type> = vb.lower.iter().filter(|t| is_proper(t)).collect();
        if let Some((first, rest)) = lowers.split_first() {
            let mut acc = (*first).clone();
            for l in rest {
                acc = lub(env, &acc, l);
            }
            return Some(acc);
        }
        let uppers: Vec<&Type> = vb
            .upper
            .iter()
            .filter(|t| is_proper(t) && !t.is_errorish())
            .collect();
        if vb.throws {
            let runtime_exception =
                Type::class(env.well_known().runtime_exception, vec![]);
            if uppers
                .iter()
                .all(|u| is_subtype(env, &runtime_exception, u))
            {
                return Some(runtime_exception);
            }
        }
        if let Some((first, rest)) = uppers.split_first() {
            let mut acc = (*first).clone();
            for u in rest {
                acc = glb(env, &acc, u);
            }
            return Some(acc);
        }
        Some(Type::class(env.well_known().object, vec![]))
    }

    fn apply_instantiation(&mut self, env: &dyn TypeEnv, v: InferVarId, t: &Type) -> bool {
        {
            let Some(vb) = self.vars.get(v.index()) else {
                return false;
            };
            for u in vb.upper.iter().filter(|u| is_proper(u)) {
                if !is_assignable_loose(env, t, u) {
                    return false;
                }
            }
            for l in vb.lower.iter().filter(|l| is_proper(l)) {
                if !is_assignable_loose(env, l, t) {
                    return false;
                }
            }
            for e in vb.equal.iter().filter(|e| is_proper(e) && !e.is_errorish()) {
                if e != t && !t.is_errorish() {
                    return false;
                }
            }
        }
        self.instantiations.insert(v, t.clone());
        let mut replace =
            |ty: &Type| map_infer_vars(ty, &mut |w| (w == v).then(|| t.clone()));
        for vb in &mut self.vars {
            for b in vb
                .equal
                .iter_mut()
                .chain(vb.upper.iter_mut())
                .chain(vb.lower.iter_mut())
            {
                *b = replace(b);
            }
        }
        true
    }

    /// Pin down the instantiation of a single variable from its current
    /// bounds, folding the choice back into every other bound.
    pub fn solve_variable(&mut self, env: &dyn TypeEnv, v: InferVarId) -> Option<Type> {
        if let Some(t) = self.instantiations.get(&v) {
            return Some(t.clone());
        }
        let t = self.compute_instantiation(env, v)?;
        if !self.apply_instantiation(env, v, &t) {
            return None;
        }
        Some(t)
    }

    /// Resolve every variable. Resolution prefers variables that are already
    /// pinned by a proper equal bound, then ones with proper lower bounds,
    /// then ones whose bounds mention no unresolved variable.
    pub fn solve(&mut self, env: &dyn TypeEnv) -> Option<Solution> {
        loop {
            let unresolved: Vec<usize> = (0..self.vars.len())
                .filter(|i| !self.instantiations.contains_key(&InferVarId::new(*i as u32)))
                .collect();
            if unresolved.is_empty() {
                break;
            }
            let pick = unresolved
                .iter()
                .copied()
                .find(|i| self.vars[*i].equal.iter().any(|t| is_proper(t) && !t.is_errorish()))
                .or_else(|| {
                    unresolved
                        .iter()
                        .copied()
                        .find(|i| self.vars[*i].lower.iter().any(is_proper))
                })
                .or_else(|| {
                    unresolved.iter().copied().find(|i| {
                        let mut mentioned = BTreeSet::new();
                        let vb = &self.vars[*i];
                        for b in vb.equal.iter().chain(&vb.upper).chain(&vb.lower) {
                            collect_infer_vars(b, &mut mentioned);
                        }
                        mentioned
                            .iter()
                            .all(|w| self.instantiations.contains_key(w) || w.index() == *i)
                    })
                })
                .unwrap_or(unresolved[0]);
            self.solve_variable(env, InferVarId::new(pick as u32))?;
        }

        let mut instantiations = Vec::with_capacity(self.vars.len());
        for i in 0..self.vars.len() {
            let v = InferVarId::new(i as u32);
            let t = self.instantiations.get(&v)?.clone();
            let vb = &self.vars[i];
            for u in vb.upper.iter().filter(|u| is_proper(u)) {
                if !is_assignable_loose(env, &t, u) {
                    return None;
                }
            }
            for l in vb.lower.iter().filter(|l| is_proper(l)) {
                if !is_assignable_loose(env, l, &t) {
                    return None;
                }
            }
            instantiations.push(t);
        }
        Some(Solution { instantiations })
    }
}
