//! Feature domains and the conditions built from them
//!
//! A [`Feature`] describes one dataset column: its name and its base domain.
//! A [`Condition`] is a Feature instantiated with a [`Selection`] (a sub-interval
//! or a subset of categories) and is the building block of a rule.

use std::collections::BTreeSet;
use std::fmt;

use crate::data::Value;
use crate::error::{Error, Result};

/// Data kind of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    Categorical,
    Integer,
    Real,
}

impl FeatureKind {
    pub fn is_numeric(self) -> bool {
        !matches!(self, FeatureKind::Categorical)
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FeatureKind::Categorical => "cat",
            FeatureKind::Integer => "int",
            FeatureKind::Real => "float",
        };
        f.write_str(name)
    }
}

/// Base domain of a feature, with a payload specific to its kind
#[derive(Debug, Clone, PartialEq)]
pub enum Domain {
    Integer { min: i64, max: i64 },
    Real { min: f64, max: f64 },
    Categorical { categories: BTreeSet<String> },
}

/// Column descriptor: a unique name plus its base domain
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    name: String,
    domain: Domain,
}

impl Feature {
    pub fn integer(name: impl Into<String>, min: i64, max: i64) -> Result<Self> {
        let name = name.into();
        if min > max {
            return Err(Error::InvalidDomain {
                name,
                min: min as f64,
                max: max as f64,
            });
        }
        Ok(Self {
            name,
            domain: Domain::Integer { min, max },
        })
    }

    pub fn real(name: impl Into<String>, min: f64, max: f64) -> Result<Self> {
        let name = name.into();
        // NaN bounds fail the comparison as well
        if !(min.is_finite() && max.is_finite() && min <= max) {
            return Err(Error::InvalidDomain { name, min, max });
        }
        Ok(Self {
            name,
            domain: Domain::Real { min, max },
        })
    }

    pub fn categorical<I, S>(name: impl Into<String>, categories: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let categories: BTreeSet<String> = categories.into_iter().map(Into::into).collect();
        if categories.is_empty() {
            return Err(Error::EmptyCategories { name });
        }
        Ok(Self {
            name,
            domain: Domain::Categorical { categories },
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn kind(&self) -> FeatureKind {
        match self.domain {
            Domain::Integer { .. } => FeatureKind::Integer,
            Domain::Real { .. } => FeatureKind::Real,
            Domain::Categorical { .. } => FeatureKind::Categorical,
        }
    }

    /// Numeric bounds `(min, max)`, or `None` for categorical features
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match self.domain {
            Domain::Integer { min, max } => Some((min as f64, max as f64)),
            Domain::Real { min, max } => Some((min, max)),
            Domain::Categorical { .. } => None,
        }
    }

    pub fn categories(&self) -> Option<&BTreeSet<String>> {
        match &self.domain {
            Domain::Categorical { categories } => Some(categories),
            _ => None,
        }
    }

    /// Whether a cell value lies inside the base domain.
    ///
    /// Interval and set cells (produced by squashing) must be fully contained.
    pub fn contains(&self, value: &Value) -> bool {
        match (&self.domain, value) {
            (Domain::Categorical { categories }, Value::Category(c)) => categories.contains(c),
            (Domain::Categorical { categories }, Value::Categories(cs)) => {
                !cs.is_empty() && cs.is_subset(categories)
            }
            (Domain::Categorical { .. }, _) => false,
            (_, Value::Number(x)) => self.bounds().is_some_and(|(min, max)| min <= *x && *x <= max),
            (_, Value::Interval { lo, hi }) => self
                .bounds()
                .is_some_and(|(min, max)| min <= *lo && lo <= hi && *hi <= max),
            _ => false,
        }
    }

    /// Condition covering the whole base domain
    pub fn whole(&self) -> Condition {
        let selection = match &self.domain {
            Domain::Categorical { categories } => Selection::Categories(categories.clone()),
            _ => {
                let (lo, hi) = self.bounds().unwrap_or((f64::NEG_INFINITY, f64::INFINITY));
                Selection::Interval { lo, hi }
            }
        };
        Condition {
            feature: self.clone(),
            selection,
        }
    }

    /// Condition `lo <= value <= hi` on a numeric feature
    pub fn between(&self, lo: f64, hi: f64) -> Result<Condition> {
        let (min, max) = self.bounds().ok_or_else(|| Error::KindMismatch {
            name: self.name.clone(),
            reason: "a range needs a numeric feature".to_string(),
        })?;
        if !(min <= lo && lo <= hi && hi <= max) {
            return Err(Error::SelectionOutOfDomain {
                name: self.name.clone(),
                selection: format!("[{lo}, {hi}]"),
            });
        }
        Ok(Condition {
            feature: self.clone(),
            selection: Selection::Interval { lo, hi },
        })
    }

    /// Condition on a subset of the feature's categories
    pub fn one_of<I, S>(&self, values: I) -> Result<Condition>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let categories = self.categories().ok_or_else(|| Error::KindMismatch {
            name: self.name.clone(),
            reason: "a category subset needs a categorical feature".to_string(),
        })?;
        let subset: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        if subset.is_empty() {
            return Err(Error::EmptyCategories {
                name: self.name.clone(),
            });
        }
        if !subset.is_subset(categories) {
            return Err(Error::SelectionOutOfDomain {
                name: self.name.clone(),
                selection: format_set(&subset),
            });
        }
        Ok(Condition {
            feature: self.clone(),
            selection: Selection::Categories(subset),
        })
    }

    /// Condition matching exactly one scalar value
    pub fn equals(&self, value: &Value) -> Result<Condition> {
        match value {
            Value::Number(x) => self.between(*x, *x),
            Value::Category(c) => self.one_of([c.as_str()]),
            other => Err(Error::KindMismatch {
                name: self.name.clone(),
                reason: format!("`{other}` is not a scalar value"),
            }),
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.domain {
            Domain::Integer { min, max } => write!(f, "{}: int [{}, {}]", self.name, min, max),
            Domain::Real { min, max } => write!(f, "{}: float [{}, {}]", self.name, min, max),
            Domain::Categorical { categories } => {
                write!(f, "{}: cat {}", self.name, format_set(categories))
            }
        }
    }
}

/// The part of a base domain a condition accepts
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Inclusive numeric range; a scalar is the degenerate `lo == hi`
    Interval { lo: f64, hi: f64 },
    /// Non-empty category subset; a scalar is a singleton
    Categories(BTreeSet<String>),
}

/// An instantiated feature used inside a rule
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    feature: Feature,
    selection: Selection,
}

impl Condition {
    pub fn feature(&self) -> &Feature {
        &self.feature
    }

    pub fn name(&self) -> &str {
        self.feature.name()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Width of the selected range relative to the base domain, `None` for categories
    pub fn relative_width(&self) -> Option<f64> {
        let Selection::Interval { lo, hi } = self.selection else {
            return None;
        };
        let (min, max) = self.feature.bounds()?;
        let span = max - min;
        Some(if span > 0.0 { (hi - lo) / span } else { 0.0 })
    }

    /// Whether a transaction cell satisfies this condition.
    ///
    /// Values outside the base domain never match. Interval and set cells match
    /// when they are contained in the selection.
    pub fn matches(&self, value: &Value) -> bool {
        if !self.feature.contains(value) {
            return false;
        }
        match (&self.selection, value) {
            (Selection::Interval { lo, hi }, Value::Number(x)) => lo <= x && x <= hi,
            (Selection::Interval { lo, hi }, Value::Interval { lo: a, hi: b }) => lo <= a && b <= hi,
            (Selection::Categories(subset), Value::Category(c)) => subset.contains(c),
            (Selection::Categories(subset), Value::Categories(cs)) => cs.is_subset(subset),
            _ => false,
        }
    }
}

impl From<Feature> for Condition {
    fn from(feature: Feature) -> Self {
        feature.whole()
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.feature.name();
        match &self.selection {
            Selection::Interval { lo, hi } if lo == hi => write!(f, "{name} = {lo}"),
            Selection::Interval { lo, hi } => write!(f, "{name} ∈ [{lo}, {hi}]"),
            Selection::Categories(subset) if subset.len() == 1 => {
                let value = subset.iter().next().map(String::as_str).unwrap_or_default();
                write!(f, "{name} = {value}")
            }
            Selection::Categories(subset) => write!(f, "{name} ∈ {}", format_set(subset)),
        }
    }
}

pub(crate) fn format_set(set: &BTreeSet<String>) -> String {
    let items: Vec<&str> = set.iter().map(String::as_str).collect();
    format!("{{{}}}", items.join(", "))
}
