//! RuleForge: numerical association rule mining over mixed-type tabular data
//!
//! This library measures the quality of IF-THEN rules whose conditions are
//! numeric ranges or category subsets, and reduces datasets by squashing
//! near-duplicate transactions into summary records.

pub mod cli;
pub mod data;
pub mod error;
pub mod feature;
pub mod rule;
pub mod similarity;
pub mod squash;

// Re-export public items for easier access
pub use cli::Args;
pub use data::{Dataset, Transaction, Transactions, Value};
pub use error::{Error, Result};
pub use feature::{Condition, Domain, Feature, FeatureKind, Selection};
pub use rule::{evaluate_all, Metric, Rule, SupportCounts};
pub use similarity::{Point, Similarity, SimilarityMeasure};
pub use squash::{squash, Cluster, Squasher};
