//! Command-line interface definitions and argument parsing

use clap::Parser;

use crate::data::Value;
use crate::error::{Error, Result};
use crate::feature::{Condition, Feature};
use crate::rule::Metric;
use crate::similarity::Similarity;

/// Numerical association rule mining: squash a dataset and evaluate rules
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV file
    #[arg(short, long, default_value = "data.csv")]
    pub input: String,

    /// Squash the dataset, merging transactions at least this similar (0, 1]
    #[arg(short, long)]
    pub threshold: Option<f64>,

    /// Similarity measure used for squashing
    #[arg(short, long, value_enum, default_value_t = Similarity::Euclidean)]
    pub similarity: Similarity,

    /// Rule antecedent, conditions separated by ';'
    /// Example: --antecedent "age=29..60;thal={normal|fixed};sex=1"
    #[arg(short, long)]
    pub antecedent: Option<String>,

    /// Rule consequent, same syntax as the antecedent
    #[arg(short, long)]
    pub consequent: Option<String>,

    /// Comma-separated metrics to report for the rule
    #[arg(short, long, default_value = "support,confidence,lift")]
    pub metrics: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Parse the requested metric names
    pub fn parse_metrics(&self) -> Result<Vec<Metric>> {
        self.metrics
            .split(',')
            .filter(|name| !name.trim().is_empty())
            .map(str::parse)
            .collect()
    }

    /// Resolve the antecedent and consequent against a schema.
    /// Returns `None` when no rule was requested.
    pub fn parse_rule(&self, features: &[Feature]) -> Result<Option<(Vec<Condition>, Vec<Condition>)>> {
        match (&self.antecedent, &self.consequent) {
            (None, None) => Ok(None),
            (Some(antecedent), Some(consequent)) => Ok(Some((
                parse_conditions(antecedent, features)?,
                parse_conditions(consequent, features)?,
            ))),
            _ => Err(Error::InvalidCondition(
                "a rule needs both --antecedent and --consequent".to_string(),
            )),
        }
    }
}

/// Parse `;`-separated conditions
///
/// Each condition is one of `name` (whole domain), `name=lo..hi` (range),
/// `name={a|b}` (category subset) or `name=value` (scalar).
pub fn parse_conditions(input: &str, features: &[Feature]) -> Result<Vec<Condition>> {
    input
        .split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| parse_condition(part, features))
        .collect()
}

fn parse_condition(input: &str, features: &[Feature]) -> Result<Condition> {
    let (name, selection) = match input.split_once('=') {
        Some((name, selection)) => (name.trim(), Some(selection.trim())),
        None => (input, None),
    };
    let feature = features
        .iter()
        .find(|f| f.name() == name)
        .ok_or_else(|| Error::UnknownFeature {
            name: name.to_string(),
        })?;

    let Some(selection) = selection else {
        return Ok(feature.whole());
    };

    if let Some(inner) = selection.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        return feature.one_of(inner.split('|').map(str::trim).filter(|c| !c.is_empty()));
    }

    if feature.kind().is_numeric() {
        let number = |s: &str| {
            s.trim()
                .parse::<f64>()
                .map_err(|_| Error::InvalidCondition(input.to_string()))
        };
        match selection.split_once("..") {
            Some((lo, hi)) => feature.between(number(lo)?, number(hi)?),
            None => feature.equals(&Value::Number(number(selection)?)),
        }
    } else {
        feature.equals(&Value::from(selection))
    }
}
