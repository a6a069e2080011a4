//! Association rules and their quality metrics
//!
//! A [`Rule`] borrows the transactions it is evaluated against. All metrics are
//! derived from one pass over the data that counts antecedent, consequent and
//! joint matches; the counts are cached on first access.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use rayon::prelude::*;

use crate::data::{Transaction, Transactions};
use crate::error::{Error, Result};
use crate::feature::Condition;

/// Guards denominators that may legitimately reach zero
const EPSILON: f64 = f64::EPSILON;

/// Match counts gathered in a single pass over the transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SupportCounts {
    pub total: usize,
    pub antecedent: usize,
    pub consequent: usize,
    pub joint: usize,
}

impl SupportCounts {
    /// Transactions matching neither side
    pub fn neither(&self) -> usize {
        self.total + self.joint - self.antecedent - self.consequent
    }
}

/// IF antecedent THEN consequent
#[derive(Debug, Clone)]
pub struct Rule<'a> {
    antecedent: Vec<Condition>,
    consequent: Vec<Condition>,
    antecedent_columns: Vec<usize>,
    consequent_columns: Vec<usize>,
    transactions: Transactions<'a>,
    counts: OnceLock<SupportCounts>,
}

impl<'a> Rule<'a> {
    /// Create a rule over the given transactions
    ///
    /// # Arguments
    /// * `antecedent` - IF-part conditions, non-empty
    /// * `consequent` - THEN-part conditions, non-empty and disjoint from the antecedent
    /// * `transactions` - Data the metrics are computed against
    ///
    /// # Returns
    /// * An error when a side is empty, a feature is repeated or shared between
    ///   sides, or a condition names a feature the schema does not have
    pub fn new(
        antecedent: Vec<Condition>,
        consequent: Vec<Condition>,
        transactions: Transactions<'a>,
    ) -> Result<Self> {
        if antecedent.is_empty() {
            return Err(Error::EmptyConditions { side: "antecedent" });
        }
        if consequent.is_empty() {
            return Err(Error::EmptyConditions { side: "consequent" });
        }

        let antecedent_names = unique_names(&antecedent)?;
        let consequent_names = unique_names(&consequent)?;
        if let Some(name) = antecedent_names.intersection(&consequent_names).next() {
            return Err(Error::OverlappingFeature {
                name: name.to_string(),
            });
        }

        let antecedent_columns = resolve_columns(&antecedent, transactions)?;
        let consequent_columns = resolve_columns(&consequent, transactions)?;

        Ok(Self {
            antecedent,
            consequent,
            antecedent_columns,
            consequent_columns,
            transactions,
            counts: OnceLock::new(),
        })
    }

    pub fn antecedent(&self) -> &[Condition] {
        &self.antecedent
    }

    pub fn consequent(&self) -> &[Condition] {
        &self.consequent
    }

    pub fn transactions(&self) -> Transactions<'a> {
        self.transactions
    }

    /// Cached match counts, computed on first call
    pub fn counts(&self) -> SupportCounts {
        *self.counts.get_or_init(|| self.count_matches())
    }

    fn count_matches(&self) -> SupportCounts {
        let mut counts = SupportCounts {
            total: self.transactions.len(),
            ..SupportCounts::default()
        };
        for transaction in self.transactions.iter() {
            let x = all_match(&self.antecedent, &self.antecedent_columns, transaction);
            let y = all_match(&self.consequent, &self.consequent_columns, transaction);
            counts.antecedent += x as usize;
            counts.consequent += y as usize;
            counts.joint += (x && y) as usize;
        }
        counts
    }

    /// Fraction of transactions matching both sides
    pub fn support(&self) -> f64 {
        let c = self.counts();
        ratio(c.joint, c.total)
    }

    /// Joint count over antecedent count; 0 when the antecedent never matches
    pub fn confidence(&self) -> f64 {
        let c = self.counts();
        ratio(c.joint, c.antecedent)
    }

    /// Confidence over consequent support; 0 when the consequent never matches
    pub fn lift(&self) -> f64 {
        let rhs_support = self.rhs_support();
        if rhs_support == 0.0 {
            0.0
        } else {
            self.confidence() / rhs_support
        }
    }

    /// Antecedent support
    pub fn coverage(&self) -> f64 {
        let c = self.counts();
        ratio(c.antecedent, c.total)
    }

    /// Consequent support
    pub fn rhs_support(&self) -> f64 {
        let c = self.counts();
        ratio(c.consequent, c.total)
    }

    pub fn conviction(&self) -> f64 {
        (1.0 - self.rhs_support()) / (1.0 - self.confidence() + EPSILON)
    }

    pub fn leverage(&self) -> f64 {
        self.support() - self.coverage() * self.rhs_support()
    }

    pub fn interestingness(&self) -> f64 {
        let c = self.counts();
        ratio(c.joint, c.antecedent) * ratio(c.joint, c.consequent) * (1.0 - ratio(c.joint, c.total))
    }

    pub fn netconf(&self) -> f64 {
        let coverage = self.coverage();
        self.leverage() / (coverage * (1.0 - coverage) + EPSILON)
    }

    /// Yule's Q from the 2x2 contingency table
    pub fn yulesq(&self) -> f64 {
        let c = self.counts();
        let a = c.joint as f64;
        let b = (c.antecedent - c.joint) as f64;
        let cc = (c.consequent - c.joint) as f64;
        let d = c.neither() as f64;
        let (ad, bc) = (a * d, b * cc);
        (ad - bc) / (ad + bc + EPSILON)
    }

    pub fn zhang(&self) -> f64 {
        let support = self.support();
        let coverage = self.coverage();
        let rhs_support = self.rhs_support();
        let denominator =
            (support * (1.0 - rhs_support)).max(rhs_support * (coverage - support)) + EPSILON;
        (support - coverage * rhs_support) / denominator
    }

    /// Share of the schema's features used by the rule
    pub fn inclusion(&self) -> f64 {
        ratio(
            self.antecedent.len() + self.consequent.len(),
            self.transactions.features().len(),
        )
    }

    /// One minus the mean relative width of the numeric ranges; narrow rules score high
    pub fn amplitude(&self) -> f64 {
        let conditions = self.antecedent.iter().chain(&self.consequent);
        let widths: f64 = conditions.clone().filter_map(Condition::relative_width).sum();
        1.0 - widths / conditions.count() as f64
    }

    pub fn comprehensibility(&self) -> f64 {
        let consequent = self.consequent.len() as f64;
        let all = (self.antecedent.len() + self.consequent.len()) as f64;
        (1.0 + consequent).ln() / (1.0 + all).ln()
    }

    pub fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Support => self.support(),
            Metric::Confidence => self.confidence(),
            Metric::Lift => self.lift(),
            Metric::Coverage => self.coverage(),
            Metric::RhsSupport => self.rhs_support(),
            Metric::Conviction => self.conviction(),
            Metric::Leverage => self.leverage(),
            Metric::Interestingness => self.interestingness(),
            Metric::Netconf => self.netconf(),
            Metric::Yulesq => self.yulesq(),
            Metric::Zhang => self.zhang(),
            Metric::Inclusion => self.inclusion(),
            Metric::Amplitude => self.amplitude(),
            Metric::Comprehensibility => self.comprehensibility(),
        }
    }
}

impl fmt::Display for Rule<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IF {} THEN {}",
            join_conditions(&self.antecedent),
            join_conditions(&self.consequent)
        )
    }
}

/// Fill the metric caches of many rules in parallel
pub fn evaluate_all(rules: &[Rule<'_>]) {
    rules.par_iter().for_each(|rule| {
        rule.counts();
    });
}

/// Rule quality measures selectable by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Support,
    Confidence,
    Lift,
    Coverage,
    RhsSupport,
    Conviction,
    Leverage,
    Interestingness,
    Netconf,
    Yulesq,
    Zhang,
    Inclusion,
    Amplitude,
    Comprehensibility,
}

impl Metric {
    pub const ALL: [Metric; 14] = [
        Metric::Support,
        Metric::Confidence,
        Metric::Lift,
        Metric::Coverage,
        Metric::RhsSupport,
        Metric::Conviction,
        Metric::Leverage,
        Metric::Interestingness,
        Metric::Netconf,
        Metric::Yulesq,
        Metric::Zhang,
        Metric::Inclusion,
        Metric::Amplitude,
        Metric::Comprehensibility,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Metric::Support => "support",
            Metric::Confidence => "confidence",
            Metric::Lift => "lift",
            Metric::Coverage => "coverage",
            Metric::RhsSupport => "rhs_support",
            Metric::Conviction => "conviction",
            Metric::Leverage => "leverage",
            Metric::Interestingness => "interestingness",
            Metric::Netconf => "netconf",
            Metric::Yulesq => "yulesq",
            Metric::Zhang => "zhang",
            Metric::Inclusion => "inclusion",
            Metric::Amplitude => "amplitude",
            Metric::Comprehensibility => "comprehensibility",
        }
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Metric::ALL
            .into_iter()
            .find(|m| m.name() == wanted)
            .ok_or_else(|| Error::UnknownMetric(s.to_string()))
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn all_match(conditions: &[Condition], columns: &[usize], transaction: &Transaction) -> bool {
    conditions
        .iter()
        .zip(columns)
        .all(|(condition, &column)| {
            transaction
                .get(column)
                .is_some_and(|value| condition.matches(value))
        })
}

fn unique_names(conditions: &[Condition]) -> Result<HashSet<&str>> {
    let mut names = HashSet::with_capacity(conditions.len());
    for condition in conditions {
        if !names.insert(condition.name()) {
            return Err(Error::DuplicateCondition {
                name: condition.name().to_string(),
            });
        }
    }
    Ok(names)
}

fn resolve_columns(conditions: &[Condition], transactions: Transactions<'_>) -> Result<Vec<usize>> {
    conditions
        .iter()
        .map(|condition| {
            let index = transactions
                .index_of(condition.name())
                .ok_or_else(|| Error::UnknownFeature {
                    name: condition.name().to_string(),
                })?;
            let kind = transactions.features()[index].kind();
            if kind != condition.feature().kind() {
                return Err(Error::KindMismatch {
                    name: condition.name().to_string(),
                    reason: format!(
                        "condition is {} but the dataset column is {}",
                        condition.feature().kind(),
                        kind
                    ),
                });
            }
            Ok(index)
        })
        .collect()
}

fn join_conditions(conditions: &[Condition]) -> String {
    conditions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" AND ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Dataset, Transaction, Value};
    use crate::feature::Feature;

    fn features() -> Vec<Feature> {
        vec![
            Feature::integer("age", 20, 80).unwrap(),
            Feature::real("chol", 100.0, 400.0).unwrap(),
            Feature::categorical("thal", ["normal", "fixed"]).unwrap(),
            Feature::integer("target", 0, 1).unwrap(),
        ]
    }

    fn create_test_dataset() -> Dataset {
        let rows = [
            (30, 150.0, "normal", 0),
            (45, 220.0, "normal", 1),
            (50, 240.0, "fixed", 1),
            (62, 310.0, "fixed", 1),
            (70, 180.0, "normal", 0),
        ];
        let transactions = rows
            .iter()
            .map(|&(age, chol, thal, target)| {
                Transaction::new(vec![
                    Value::from(age as i64),
                    Value::from(chol),
                    Value::from(thal),
                    Value::from(target as i64),
                ])
            })
            .collect();
        Dataset::new(features(), transactions).unwrap()
    }

    fn feature(dataset: &Dataset, name: &str) -> Feature {
        dataset.feature(name).unwrap().clone()
    }

    #[test]
    fn test_whole_domain_rule_is_perfect() {
        let dataset = create_test_dataset();
        let rule = Rule::new(
            vec![feature(&dataset, "age").into(), feature(&dataset, "thal").into()],
            vec![feature(&dataset, "target").into()],
            dataset.transactions(),
        )
        .unwrap();

        assert_eq!(rule.support(), 1.0);
        assert_eq!(rule.confidence(), 1.0);
        assert_eq!(rule.lift(), 1.0);
        assert_eq!(rule.amplitude(), 1.0 - 2.0 / 3.0);
    }

    #[test]
    fn test_metrics_from_counts() {
        let dataset = create_test_dataset();
        let rule = Rule::new(
            vec![feature(&dataset, "chol").between(200.0, 350.0).unwrap()],
            vec![feature(&dataset, "target").between(1.0, 1.0).unwrap()],
            dataset.transactions(),
        )
        .unwrap();

        let counts = rule.counts();
        assert_eq!(
            counts,
            SupportCounts {
                total: 5,
                antecedent: 3,
                consequent: 3,
                joint: 3
            }
        );
        assert!((rule.support() - 0.6).abs() < 1e-12);
        assert_eq!(rule.confidence(), 1.0);
        assert!((rule.lift() - 1.0 / 0.6).abs() < 1e-12);
        assert!((rule.coverage() - 0.6).abs() < 1e-12);
        assert!((rule.leverage() - (0.6 - 0.36)).abs() < 1e-12);
        assert!(rule.yulesq() > 0.99);
        assert_eq!(rule.inclusion(), 0.5);
    }

    #[test]
    fn test_unmatched_antecedent_is_degenerate_not_error() {
        let dataset = create_test_dataset();
        let rule = Rule::new(
            vec![feature(&dataset, "age").between(75.0, 80.0).unwrap()],
            vec![feature(&dataset, "target").into()],
            dataset.transactions(),
        )
        .unwrap();

        assert_eq!(rule.support(), 0.0);
        assert_eq!(rule.confidence(), 0.0);
        assert_eq!(rule.lift(), 0.0);
        assert_eq!(rule.interestingness(), 0.0);
    }

    #[test]
    fn test_unmatched_consequent_gives_zero_lift() {
        let dataset = create_test_dataset();
        let rule = Rule::new(
            vec![feature(&dataset, "age").into()],
            vec![feature(&dataset, "chol").between(390.0, 400.0).unwrap()],
            dataset.transactions(),
        )
        .unwrap();

        assert_eq!(rule.rhs_support(), 0.0);
        assert_eq!(rule.lift(), 0.0);
    }

    #[test]
    fn test_empty_dataset_metrics_are_zero() {
        let dataset = Dataset::new(features(), vec![]).unwrap();
        let rule = Rule::new(
            vec![feature(&dataset, "age").into()],
            vec![feature(&dataset, "target").into()],
            dataset.transactions(),
        )
        .unwrap();

        assert_eq!(rule.support(), 0.0);
        assert_eq!(rule.confidence(), 0.0);
        assert_eq!(rule.lift(), 0.0);
    }

    #[test]
    fn test_construction_errors() {
        let dataset = create_test_dataset();
        let age: Condition = feature(&dataset, "age").into();
        let target: Condition = feature(&dataset, "target").into();

        let overlap = Rule::new(vec![age.clone()], vec![age.clone()], dataset.transactions());
        assert!(matches!(overlap, Err(Error::OverlappingFeature { .. })));

        let duplicate = Rule::new(
            vec![age.clone(), age.clone()],
            vec![target.clone()],
            dataset.transactions(),
        );
        assert!(matches!(duplicate, Err(Error::DuplicateCondition { .. })));

        let empty = Rule::new(vec![], vec![target.clone()], dataset.transactions());
        assert!(matches!(
            empty,
            Err(Error::EmptyConditions { side: "antecedent" })
        ));

        let unknown = Feature::integer("ca", 0, 4).unwrap();
        let missing = Rule::new(vec![unknown.into()], vec![target], dataset.transactions());
        assert!(matches!(missing, Err(Error::UnknownFeature { .. })));
    }

    #[test]
    fn test_kind_mismatch_with_schema() {
        let dataset = create_test_dataset();
        let wrong = Feature::real("age", 20.0, 80.0).unwrap();
        let result = Rule::new(
            vec![wrong.into()],
            vec![feature(&dataset, "target").into()],
            dataset.transactions(),
        );
        assert!(matches!(result, Err(Error::KindMismatch { .. })));
    }

    #[test]
    fn test_display() {
        let dataset = create_test_dataset();
        let rule = Rule::new(
            vec![
                feature(&dataset, "age").between(40.0, 60.0).unwrap(),
                feature(&dataset, "thal")
                    .equals(&Value::from("fixed"))
                    .unwrap(),
            ],
            vec![feature(&dataset, "target").equals(&Value::from(1i64)).unwrap()],
            dataset.transactions(),
        )
        .unwrap();

        assert_eq!(
            rule.to_string(),
            "IF age ∈ [40, 60] AND thal = fixed THEN target = 1"
        );
    }

    #[test]
    fn test_metric_by_name() {
        assert_eq!("support".parse::<Metric>().unwrap(), Metric::Support);
        assert_eq!("RHS_SUPPORT".parse::<Metric>().unwrap(), Metric::RhsSupport);
        assert!(matches!("gain".parse::<Metric>(), Err(Error::UnknownMetric(_))));

        let dataset = create_test_dataset();
        let rule = Rule::new(
            vec![feature(&dataset, "thal").equals(&Value::from("fixed")).unwrap()],
            vec![feature(&dataset, "target").equals(&Value::from(1i64)).unwrap()],
            dataset.transactions(),
        )
        .unwrap();
        for metric in Metric::ALL {
            assert!(rule.metric(metric).is_finite(), "{metric}");
        }
        assert_eq!(rule.metric(Metric::Confidence), rule.confidence());
    }

    #[test]
    fn test_evaluate_all_fills_caches() {
        let dataset = create_test_dataset();
        let rules: Vec<Rule> = ["normal", "fixed"]
            .iter()
            .map(|&thal| {
                Rule::new(
                    vec![feature(&dataset, "thal").equals(&Value::from(thal)).unwrap()],
                    vec![feature(&dataset, "target").into()],
                    dataset.transactions(),
                )
                .unwrap()
            })
            .collect();

        evaluate_all(&rules);
        assert_eq!(rules[0].counts().antecedent, 3);
        assert_eq!(rules[1].counts().antecedent, 2);
    }
}
