//! Dataset squashing: merge near-duplicate transactions into summary records
//!
//! Transactions are encoded as normalized [`Point`]s and linked whenever their
//! similarity reaches the threshold. Clusters are the connected groups of that
//! graph, grown from seeds taken in input order, so lowering the threshold can
//! only join clusters, never split them. Each cluster collapses into a single
//! transaction whose numeric cells are the `[min, max]` span of its members and
//! whose categorical cells are the set of member categories.

use std::collections::{BTreeSet, HashMap, VecDeque};

use ndarray::Array1;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::data::{Dataset, Transaction, Value};
use crate::error::{Error, Result};
use crate::similarity::{pairwise_similarities, Point, Similarity, SimilarityMeasure};

/// Squash a dataset using a registered similarity measure
///
/// # Arguments
/// * `dataset` - Dataset to reduce
/// * `threshold` - Minimum similarity in `(0, 1]` for two transactions to be linked
/// * `similarity` - Measure name: `euclidean`, `manhattan`, `chebyshev` or `cosine`
///
/// # Returns
/// * A dataset with the same schema and at most as many transactions
pub fn squash(dataset: &Dataset, threshold: f64, similarity: &str) -> Result<Dataset> {
    let measure: Similarity = similarity.parse()?;
    Ok(Squasher::new(threshold, measure)?.squash(dataset))
}

/// Configured squashing run
#[derive(Debug, Clone)]
pub struct Squasher<M = Similarity> {
    threshold: f64,
    measure: M,
}

impl<M: SimilarityMeasure> Squasher<M> {
    /// Validates the threshold before any distance is computed
    pub fn new(threshold: f64, measure: M) -> Result<Self> {
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(Error::InvalidThreshold(threshold));
        }
        Ok(Self { threshold, measure })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn measure(&self) -> &M {
        &self.measure
    }

    /// Lazily form clusters in input order.
    ///
    /// Each yielded cluster is final, so a caller may stop early and keep
    /// what it already has.
    pub fn clusters<'d>(&'d self, dataset: &'d Dataset) -> Clusters<'d, M> {
        let points = Encoder::fit(dataset).encode_all(dataset);
        Clusters {
            squasher: self,
            rows: dataset.transactions().rows(),
            points,
            assigned: vec![false; dataset.len()],
            cursor: 0,
        }
    }

    pub fn squash(&self, dataset: &Dataset) -> Dataset {
        let transactions: Vec<Transaction> = self
            .clusters(dataset)
            .map(|cluster| cluster.transaction)
            .collect();

        info!(
            input = dataset.len(),
            output = transactions.len(),
            threshold = self.threshold,
            "squashed dataset"
        );

        Dataset::from_parts(dataset.features().to_vec(), transactions)
    }

    /// Whether no two transactions reach the threshold, so squashing
    /// would leave the dataset unchanged
    pub fn is_reduced(&self, dataset: &Dataset) -> bool {
        let points = Encoder::fit(dataset).encode_all(dataset);
        let scores = pairwise_similarities(&points, &self.measure);
        scores
            .indexed_iter()
            .all(|((i, j), &score)| i == j || score < self.threshold)
    }
}

/// A finalized cluster: the merged input rows, ascending, and their summary
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub members: Vec<usize>,
    pub transaction: Transaction,
}

/// Iterator over clusters, see [`Squasher::clusters`]
pub struct Clusters<'d, M> {
    squasher: &'d Squasher<M>,
    rows: &'d [Transaction],
    points: Vec<Point>,
    assigned: Vec<bool>,
    cursor: usize,
}

impl<M: SimilarityMeasure> Clusters<'_, M> {
    /// Unassigned transactions linked to `member`, scored in parallel
    fn neighbours(&self, member: usize) -> Vec<usize> {
        let squasher = self.squasher;
        let points = &self.points;
        let assigned = &self.assigned;
        (0..points.len())
            .into_par_iter()
            .filter(|&candidate| {
                !assigned[candidate]
                    && squasher.measure.score(&points[member], &points[candidate])
                        >= squasher.threshold
            })
            .collect()
    }
}

impl<M: SimilarityMeasure> Iterator for Clusters<'_, M> {
    type Item = Cluster;

    fn next(&mut self) -> Option<Cluster> {
        let n = self.points.len();
        while self.cursor < n && self.assigned[self.cursor] {
            self.cursor += 1;
        }
        if self.cursor >= n {
            return None;
        }

        let seed = self.cursor;
        self.assigned[seed] = true;
        let mut aggregate = ClusterAggregate::new(seed, &self.rows[seed]);

        // Breadth-first over the threshold graph; assignment stays sequential
        let mut frontier = VecDeque::from([seed]);
        while let Some(member) = frontier.pop_front() {
            for candidate in self.neighbours(member) {
                self.assigned[candidate] = true;
                aggregate.absorb(candidate, &self.rows[candidate]);
                frontier.push_back(candidate);
            }
        }

        self.cursor = seed + 1;
        debug!(seed, size = aggregate.len(), "formed cluster");
        Some(aggregate.finish())
    }
}

/// Running summary of a cluster during the sequential merge phase
#[derive(Debug, Clone)]
pub(crate) struct ClusterAggregate {
    members: Vec<usize>,
    cells: Vec<CellAggregate>,
}

#[derive(Debug, Clone)]
enum CellAggregate {
    Numeric { lo: f64, hi: f64, scalar: bool },
    Categorical(BTreeSet<String>),
}

impl CellAggregate {
    fn new(value: &Value) -> Self {
        match value {
            Value::Number(x) => CellAggregate::Numeric {
                lo: *x,
                hi: *x,
                scalar: true,
            },
            Value::Interval { lo, hi } => CellAggregate::Numeric {
                lo: *lo,
                hi: *hi,
                scalar: false,
            },
            Value::Category(c) => CellAggregate::Categorical(BTreeSet::from([c.clone()])),
            Value::Categories(cs) => CellAggregate::Categorical(cs.clone()),
        }
    }

    fn add(&mut self, value: &Value) {
        match self {
            CellAggregate::Numeric { lo, hi, scalar } => {
                if let Some((a, b)) = value.extent() {
                    *lo = lo.min(a);
                    *hi = hi.max(b);
                    *scalar &= matches!(value, Value::Number(_));
                }
            }
            CellAggregate::Categorical(set) => match value {
                Value::Category(c) => {
                    set.insert(c.clone());
                }
                Value::Categories(cs) => set.extend(cs.iter().cloned()),
                _ => {}
            },
        }
    }

    fn finish(self) -> Value {
        match self {
            CellAggregate::Numeric { lo, hi, scalar } if scalar && lo == hi => Value::Number(lo),
            CellAggregate::Numeric { lo, hi, .. } => Value::Interval { lo, hi },
            CellAggregate::Categorical(set) if set.len() == 1 => {
                let value = set.into_iter().next().unwrap_or_default();
                Value::Category(value)
            }
            CellAggregate::Categorical(set) => Value::Categories(set),
        }
    }
}

impl ClusterAggregate {
    pub(crate) fn new(seed: usize, row: &Transaction) -> Self {
        Self {
            members: vec![seed],
            cells: row.values().iter().map(CellAggregate::new).collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.members.len()
    }

    /// Add a member, widening each cell to cover its value
    pub(crate) fn absorb(&mut self, index: usize, row: &Transaction) {
        self.members.push(index);
        for (cell, value) in self.cells.iter_mut().zip(row.values()) {
            cell.add(value);
        }
    }

    pub(crate) fn finish(mut self) -> Cluster {
        self.members.sort_unstable();
        Cluster {
            members: self.members,
            transaction: Transaction::new(self.cells.into_iter().map(CellAggregate::finish).collect()),
        }
    }
}

/// Global normalization fitted on a dataset: per numeric column min/max of
/// cell midpoints, per categorical column a code book in order of first
/// appearance.
struct Encoder {
    numeric: Vec<(usize, f64, f64)>,
    categorical: Vec<(usize, HashMap<BTreeSet<String>, usize>)>,
}

impl Encoder {
    fn fit(dataset: &Dataset) -> Self {
        let rows = dataset.transactions().rows();
        let mut numeric = Vec::new();
        let mut categorical = Vec::new();

        for (column, feature) in dataset.features().iter().enumerate() {
            if feature.kind().is_numeric() {
                let (min, max) = rows
                    .iter()
                    .filter_map(|row| row.get(column).and_then(Value::midpoint))
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
                        (lo.min(x), hi.max(x))
                    });
                numeric.push((column, min, max));
            } else {
                let mut codes = HashMap::new();
                for row in rows {
                    if let Some(value) = row.get(column) {
                        let next = codes.len();
                        codes.entry(category_key(value)).or_insert(next);
                    }
                }
                categorical.push((column, codes));
            }
        }

        Self {
            numeric,
            categorical,
        }
    }

    fn encode_all(&self, dataset: &Dataset) -> Vec<Point> {
        dataset
            .transactions()
            .rows()
            .par_iter()
            .map(|row| self.encode(row))
            .collect()
    }

    fn encode(&self, row: &Transaction) -> Point {
        let numeric: Array1<f64> = self
            .numeric
            .iter()
            .map(|&(column, min, max)| {
                let x = row.get(column).and_then(Value::midpoint).unwrap_or(min);
                let span = max - min;
                if span > 0.0 {
                    (x - min) / span
                } else {
                    0.0
                }
            })
            .collect();
        let categorical = self
            .categorical
            .iter()
            .map(|(column, codes)| {
                row.get(*column)
                    .and_then(|value| codes.get(&category_key(value)).copied())
                    .unwrap_or(0)
            })
            .collect();
        Point::new(numeric, categorical)
    }
}

fn category_key(value: &Value) -> BTreeSet<String> {
    match value {
        Value::Category(c) => BTreeSet::from([c.clone()]),
        Value::Categories(cs) => cs.clone(),
        _ => BTreeSet::new(),
    }
}
