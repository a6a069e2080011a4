//! Error types shared by the library modules

/// Errors raised while building schemas, rules, or squashing configurations.
///
/// Degenerate metric values (a zero antecedent count, a zero consequent support)
/// are not errors; they are reported as `0.0` by the metric accessors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("feature `{name}`: invalid numeric domain [{min}, {max}]")]
    InvalidDomain { name: String, min: f64, max: f64 },

    #[error("feature `{name}`: category set is empty")]
    EmptyCategories { name: String },

    #[error("feature `{name}`: selection {selection} lies outside the base domain")]
    SelectionOutOfDomain { name: String, selection: String },

    #[error("feature `{name}`: {reason}")]
    KindMismatch { name: String, reason: String },

    #[error("feature `{name}` appears in both antecedent and consequent")]
    OverlappingFeature { name: String },

    #[error("feature `{name}` is listed more than once in the same condition list")]
    DuplicateCondition { name: String },

    #[error("{side} must contain at least one condition")]
    EmptyConditions { side: &'static str },

    #[error("schema lists feature `{name}` more than once")]
    DuplicateFeature { name: String },

    #[error("unknown feature `{name}`")]
    UnknownFeature { name: String },

    #[error("transaction {index} has {found} values, schema has {expected} features")]
    ArityMismatch {
        index: usize,
        found: usize,
        expected: usize,
    },

    #[error("transaction {index}: value for feature `{name}` does not fit its kind")]
    CellKindMismatch { index: usize, name: String },

    #[error("no complete rows to infer a schema from")]
    EmptyDataset,

    #[error("squash threshold must lie in (0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("unknown similarity measure `{0}`")]
    UnknownSimilarity(String),

    #[error("invalid condition `{0}`")]
    InvalidCondition(String),

    #[error("unknown metric `{0}`")]
    UnknownMetric(String),

    #[error("failed to read tabular data: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}

/// Result alias used throughout the library
pub type Result<T, E = Error> = std::result::Result<T, E>;
