//! Similarity measures between encoded transactions
//!
//! Transactions are compared as [`Point`]s: min-max normalized numeric
//! coordinates plus category codes. Every measure maps a pair of points to a
//! score in `[0, 1]` where higher means more similar and identical points
//! score exactly `1.0`.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use ndarray::{Array1, Array2, Zip};

use crate::error::Error;

/// An encoded transaction
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    /// Normalized numeric coordinates in `[0, 1]`
    pub numeric: Array1<f64>,
    /// One code per categorical feature
    pub categorical: Vec<usize>,
}

impl Point {
    pub fn new(numeric: Array1<f64>, categorical: Vec<usize>) -> Self {
        Self {
            numeric,
            categorical,
        }
    }

    /// Number of features the point was encoded from
    pub fn dimension(&self) -> usize {
        self.numeric.len() + self.categorical.len()
    }

    /// Per-feature absolute differences: numeric distance or 0/1 category mismatch
    fn differences(&self, other: &Point) -> Array1<f64> {
        let numeric = (&self.numeric - &other.numeric).mapv(f64::abs);
        let categorical = self
            .categorical
            .iter()
            .zip(&other.categorical)
            .map(|(a, b)| if a == b { 0.0 } else { 1.0 });
        numeric.into_iter().chain(categorical).collect()
    }
}

/// Largest score a pair of distinct points may receive
pub const DISTINCT_MAX: f64 = 1.0 - f64::EPSILON / 2.0;

/// A pluggable similarity score, higher is more similar, range `[0, 1]`
pub trait SimilarityMeasure: Sync {
    /// Raw score of the measure
    fn similarity(&self, a: &Point, b: &Point) -> f64;

    /// Score used for merging: exactly 1.0 for identical points only.
    ///
    /// Distinct points that round to 1.0 (collinear cosine pairs, differences
    /// lost next to 1.0) are capped at [`DISTINCT_MAX`].
    fn score(&self, a: &Point, b: &Point) -> f64 {
        if a == b {
            return 1.0;
        }
        let s = self.similarity(a, b);
        if s >= 1.0 {
            DISTINCT_MAX
        } else {
            s
        }
    }
}

/// Registered similarity measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Similarity {
    /// `1 - ||d||₂ / √k`
    #[default]
    Euclidean,
    /// `1 - ||d||₁ / k`
    Manhattan,
    /// `1 - ||d||∞`
    Chebyshev,
    /// Cosine of numeric coordinates plus one-hot categories
    Cosine,
}

impl Similarity {
    pub const ALL: [Similarity; 4] = [
        Similarity::Euclidean,
        Similarity::Manhattan,
        Similarity::Chebyshev,
        Similarity::Cosine,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Similarity::Euclidean => "euclidean",
            Similarity::Manhattan => "manhattan",
            Similarity::Chebyshev => "chebyshev",
            Similarity::Cosine => "cosine",
        }
    }
}

impl FromStr for Similarity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Similarity::ALL
            .into_iter()
            .find(|m| m.name() == wanted)
            .ok_or_else(|| Error::UnknownSimilarity(s.to_string()))
    }
}

impl fmt::Display for Similarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl SimilarityMeasure for Similarity {
    fn similarity(&self, a: &Point, b: &Point) -> f64 {
        let k = a.dimension();
        if k == 0 {
            return 1.0;
        }
        let (distance, max_distance) = match self {
            Similarity::Euclidean => {
                let d = a.differences(b);
                (d.dot(&d).sqrt(), (k as f64).sqrt())
            }
            Similarity::Manhattan => (a.differences(b).sum(), k as f64),
            Similarity::Chebyshev => (a.differences(b).fold(0.0, |m: f64, &x| m.max(x)), 1.0),
            Similarity::Cosine => return cosine_similarity(a, b),
        };
        (1.0 - distance / max_distance).clamp(0.0, 1.0)
    }
}

/// Cosine similarity treating each categorical feature as a one-hot block.
/// Two zero vectors are identical and score 1.0.
fn cosine_similarity(a: &Point, b: &Point) -> f64 {
    let matches = a
        .categorical
        .iter()
        .zip(&b.categorical)
        .filter(|(x, y)| x == y)
        .count() as f64;
    let categories = a.categorical.len() as f64;

    let dot = a.numeric.dot(&b.numeric) + matches;
    let mag_a = a.numeric.dot(&a.numeric) + categories;
    let mag_b = b.numeric.dot(&b.numeric) + categories;

    let denom = (mag_a * mag_b).sqrt();
    if denom < f64::EPSILON {
        return if mag_a < f64::EPSILON && mag_b < f64::EPSILON {
            1.0
        } else {
            0.0
        };
    }
    (dot / denom).clamp(0.0, 1.0)
}

/// Full similarity matrix, computed in parallel
pub fn pairwise_similarities<M: SimilarityMeasure + ?Sized>(
    points: &[Point],
    measure: &M,
) -> Array2<f64> {
    let n = points.len();
    let mut scores = Array2::zeros((n, n));
    Zip::indexed(&mut scores).par_for_each(|(i, j), score| {
        *score = measure.score(&points[i], &points[j]);
    });
    scores
}
