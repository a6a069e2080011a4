//! Transaction data, dataset schema, and CSV loading using Polars

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use polars::prelude::*;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::feature::{format_set, Feature};

/// One cell of a transaction.
///
/// Loaded data only holds `Number` and `Category`; squashing produces
/// `Interval` and `Categories` cells when cluster members disagree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Interval { lo: f64, hi: f64 },
    Category(String),
    Categories(BTreeSet<String>),
}

impl Value {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Number(_) | Value::Interval { .. })
    }

    /// Numeric extent `(lo, hi)` of the cell; a scalar is `(x, x)`
    pub fn extent(&self) -> Option<(f64, f64)> {
        match *self {
            Value::Number(x) => Some((x, x)),
            Value::Interval { lo, hi } => Some((lo, hi)),
            _ => None,
        }
    }

    pub fn midpoint(&self) -> Option<f64> {
        self.extent().map(|(lo, hi)| (lo + hi) / 2.0)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Number(x)
    }
}

impl From<i64> for Value {
    fn from(x: i64) -> Self {
        Value::Number(x as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Category(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Category(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(x) => write!(f, "{x}"),
            Value::Interval { lo, hi } => write!(f, "[{lo}, {hi}]"),
            Value::Category(c) => f.write_str(c),
            Value::Categories(cs) => f.write_str(&format_set(cs)),
        }
    }
}

/// One record: a value per schema feature, in schema order
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    values: Vec<Value>,
}

impl Transaction {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Vec<Value>> for Transaction {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

/// Read-only view of a dataset's transactions together with the schema
/// needed to resolve feature names to positions.
#[derive(Debug, Clone, Copy)]
pub struct Transactions<'a> {
    features: &'a [Feature],
    rows: &'a [Transaction],
}

impl<'a> Transactions<'a> {
    pub fn features(&self) -> &'a [Feature] {
        self.features
    }

    pub fn rows(&self) -> &'a [Transaction] {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f.name() == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'a, Transaction> {
        self.rows.iter()
    }
}

/// Schema plus the transactions it describes
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    features: Vec<Feature>,
    transactions: Vec<Transaction>,
}

impl Dataset {
    /// Build a dataset, checking that every transaction fits the schema.
    ///
    /// Values outside a feature's declared domain are accepted; they never
    /// match a rule condition.
    pub fn new(features: Vec<Feature>, transactions: Vec<Transaction>) -> Result<Self> {
        for (i, feature) in features.iter().enumerate() {
            if features[..i].iter().any(|f| f.name() == feature.name()) {
                return Err(Error::DuplicateFeature {
                    name: feature.name().to_string(),
                });
            }
        }

        let mut out_of_domain = 0usize;
        for (index, transaction) in transactions.iter().enumerate() {
            if transaction.len() != features.len() {
                return Err(Error::ArityMismatch {
                    index,
                    found: transaction.len(),
                    expected: features.len(),
                });
            }
            for (feature, value) in features.iter().zip(transaction.values()) {
                if feature.kind().is_numeric() != value.is_numeric() {
                    return Err(Error::CellKindMismatch {
                        index,
                        name: feature.name().to_string(),
                    });
                }
                if !feature.contains(value) {
                    out_of_domain += 1;
                }
            }
        }

        if out_of_domain > 0 {
            warn!(
                cells = out_of_domain,
                "dataset contains values outside their feature domain"
            );
        }

        Ok(Self::from_parts(features, transactions))
    }

    /// Assemble without validation; callers guarantee the invariants
    pub(crate) fn from_parts(features: Vec<Feature>, transactions: Vec<Transaction>) -> Self {
        Self {
            features,
            transactions,
        }
    }

    /// Load a headered CSV file and infer its schema
    ///
    /// # Arguments
    /// * `file_path` - Path to the CSV file
    ///
    /// # Returns
    /// * `Dataset` whose integer columns become `int` features, float columns
    ///   `float` features, and every other column a `cat` feature. Numeric bounds
    ///   are the observed min/max; category sets are the observed values.
    pub fn from_csv<P: AsRef<Path>>(file_path: P) -> Result<Self> {
        let df = LazyCsvReader::new(file_path.as_ref())
            .with_has_header(true)
            .finish()?
            .collect()?;

        Self::from_dataframe(&df)
    }

    /// Convert a Polars DataFrame, dropping rows that contain a null.
    ///
    /// Fails with [`Error::EmptyDataset`] when no complete row is left to
    /// infer feature domains from.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let columns = df
            .get_columns()
            .iter()
            .map(|column| RawColumn::from_series(column.as_materialized_series()))
            .collect::<Result<Vec<_>>>()?;

        let height = df.height();
        let complete: Vec<usize> = (0..height)
            .filter(|&row| columns.iter().all(|column| column.is_present(row)))
            .collect();

        if complete.len() < height {
            warn!(
                dropped = height - complete.len(),
                "dropped rows with missing values"
            );
        }
        if complete.is_empty() {
            return Err(Error::EmptyDataset);
        }

        let features = columns
            .iter()
            .map(|column| column.infer_feature(&complete))
            .collect::<Result<Vec<_>>>()?;

        let transactions = complete
            .iter()
            .map(|&row| {
                let values = columns.iter().filter_map(|column| column.value(row)).collect();
                Transaction::new(values)
            })
            .collect();

        debug!(
            features = features.len(),
            transactions = complete.len(),
            "inferred dataset schema"
        );

        Self::new(features, transactions)
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn feature(&self, name: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.name() == name)
    }

    pub fn transactions(&self) -> Transactions<'_> {
        Transactions {
            features: &self.features,
            rows: &self.transactions,
        }
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<Vec<String>> = self
            .transactions
            .iter()
            .map(|t| t.values().iter().map(ToString::to_string).collect())
            .collect();

        let widths: Vec<usize> = self
            .features
            .iter()
            .enumerate()
            .map(|(i, feature)| {
                cells
                    .iter()
                    .map(|row| row[i].chars().count())
                    .chain(std::iter::once(feature.name().chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let header: Vec<String> = self
            .features
            .iter()
            .zip(&widths)
            .map(|(feature, &w)| format!("{:<w$}", feature.name()))
            .collect();
        writeln!(f, "{}", header.join("  ").trim_end())?;

        for row in &cells {
            let line: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(cell, &w)| format!("{cell:<w$}"))
                .collect();
            writeln!(f, "{}", line.join("  ").trim_end())?;
        }

        write!(
            f,
            "[{} transactions x {} features]",
            self.transactions.len(),
            self.features.len()
        )
    }
}

/// Column values extracted from Polars before schema inference
enum RawColumn {
    Integer(String, Vec<Option<i64>>),
    Real(String, Vec<Option<f64>>),
    Categorical(String, Vec<Option<String>>),
}

impl RawColumn {
    fn from_series(series: &Series) -> Result<Self> {
        let name = series.name().to_string();
        let dtype = series.dtype();

        let column = if dtype.is_integer() {
            let casted = series.cast(&DataType::Int64)?;
            RawColumn::Integer(name, casted.i64()?.into_iter().collect())
        } else if dtype.is_float() {
            let casted = series.cast(&DataType::Float64)?;
            let values = casted
                .f64()?
                .into_iter()
                .map(|v| v.filter(|x| !x.is_nan()))
                .collect();
            RawColumn::Real(name, values)
        } else {
            let casted = series.cast(&DataType::String)?;
            let values = casted
                .str()?
                .into_iter()
                .map(|v| v.map(str::to_owned))
                .collect();
            RawColumn::Categorical(name, values)
        };

        Ok(column)
    }

    fn is_present(&self, row: usize) -> bool {
        match self {
            RawColumn::Integer(_, values) => values[row].is_some(),
            RawColumn::Real(_, values) => values[row].is_some(),
            RawColumn::Categorical(_, values) => values[row].is_some(),
        }
    }

    fn value(&self, row: usize) -> Option<Value> {
        match self {
            RawColumn::Integer(_, values) => values[row].map(Value::from),
            RawColumn::Real(_, values) => values[row].map(Value::Number),
            RawColumn::Categorical(_, values) => values[row].clone().map(Value::Category),
        }
    }

    fn infer_feature(&self, rows: &[usize]) -> Result<Feature> {
        match self {
            RawColumn::Integer(name, values) => {
                let observed = rows.iter().filter_map(|&r| values[r]);
                let (min, max) = observed
                    .fold(None, |acc: Option<(i64, i64)>, x| match acc {
                        None => Some((x, x)),
                        Some((lo, hi)) => Some((lo.min(x), hi.max(x))),
                    })
                    .ok_or(Error::EmptyDataset)?;
                Feature::integer(name.as_str(), min, max)
            }
            RawColumn::Real(name, values) => {
                let observed = rows.iter().filter_map(|&r| values[r]);
                let (min, max) = observed
                    .fold(None, |acc: Option<(f64, f64)>, x| match acc {
                        None => Some((x, x)),
                        Some((lo, hi)) => Some((lo.min(x), hi.max(x))),
                    })
                    .ok_or(Error::EmptyDataset)?;
                Feature::real(name.as_str(), min, max)
            }
            RawColumn::Categorical(name, values) => {
                let observed = rows.iter().filter_map(|&r| values[r].clone());
                Feature::categorical(name.as_str(), observed)
            }
        }
    }
}
