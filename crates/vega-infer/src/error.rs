/// Crate-local result alias.
pub type Result<T> = std::result::Result<T, InferenceError>;

/// Unrecoverable inference-engine failures.
///
/// Expected negative outcomes (arity mismatches, inapplicable methods, failed
/// incorporation, re-entrant invocation sites) are *verdicts*, see
/// [`crate::Reduction::False`], so that sibling constraints are still
/// attempted. An `InferenceError` means the caller handed the reducer
/// something it must never see.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("malformed constraint formula: {0}")]
    MalformedFormula(&'static str),

    #[error("too many inference variables in one inference problem")]
    TooManyVariables,
}
