use serde::{Deserialize, Serialize};
use vega_types::Type;

use crate::expr::Expr;

/// The type-to-type relation a [`ConstraintFormula::TypeRelation`] asserts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    /// `left` and `right` denote the same type.
    Same,
    /// `left` is a subtype of `right`.
    Subtype,
    /// `left` converts to `right` in a loose invocation context.
    Compatible,
}

/// One constraint awaiting reduction.
///
/// `ExprCompatible` carries an expression on the left; `TypeRelation` carries
/// a type. The `soft` flag marks constraints whose failure should not veto an
/// applicability search outright (advisory for the surrounding solver).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConstraintFormula {
    ExprCompatible {
        expr: Expr,
        target: Type,
        soft: bool,
    },
    TypeRelation {
        left: Type,
        relation: Relation,
        right: Type,
        soft: bool,
    },
}

impl ConstraintFormula {
    pub fn expr_compatible(expr: Expr, target: Type) -> Self {
        ConstraintFormula::ExprCompatible {
            expr,
            target,
            soft: false,
        }
    }

    pub fn type_relation(left: Type, relation: Relation, right: Type) -> Self {
        ConstraintFormula::TypeRelation {
            left,
            relation,
            right,
            soft: false,
        }
    }
}

/// Outcome of reducing one constraint formula.
///
/// `Incorporated` means the effect has already been folded into the bound set
/// and the caller must not re-process the formula.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Reduction {
    True,
    False,
    Incorporated,
    More(Vec<ConstraintFormula>),
}

impl Reduction {
    pub fn is_false(&self) -> bool {
        matches!(self, Reduction::False)
    }
}
