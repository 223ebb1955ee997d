//! Seed-deterministic isolation forest anomaly scoring.
//!
//! An isolation forest isolates points by recursive random axis-aligned
//! splits; anomalous points end up isolated after fewer splits than points
//! inside dense clusters. The anomaly score of a point is
//! `2^(-E[h(x)] / c(n))`, where `E[h(x)]` is its average path length over
//! all trees and `c(n)` the expected path length of an unsuccessful BST
//! search over `n` points. Scores lie in `(0, 1]`; higher means more
//! anomalous.
//!
//! Everything is driven by a single caller-supplied seed, so a fixed
//! dataset and a fixed seed always produce identical scores.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

/// Euler-Mascheroni constant, used in the expected path length.
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Tuning parameters for fitting a [`Forest`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Params {
    /// Number of trees in the ensemble.
    pub trees: usize,
    /// Points sampled (without replacement) to build each tree.
    pub sample_size: usize,
    /// Seed for all randomness during fitting.
    pub seed: u64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            trees: 100,
            sample_size: 256,
            seed: 0,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("cannot fit a forest to an empty dataset")]
    EmptyData,
    #[error("cannot fit a forest with zero trees or an empty sample")]
    BadParams,
    #[error("point has {got} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// A fitted ensemble of isolation trees.
#[derive(Debug, Clone)]
pub struct Forest {
    trees: Vec<Node>,
    dims: usize,
    /// `c(n)` for the per-tree sample size; normalizes path lengths.
    expected_path: f64,
}

#[derive(Debug, Clone)]
enum Node {
    /// An unsplit region containing `size` sample points.
    Leaf { size: usize },
    Split {
        dim: usize,
        value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Forest {
    /// Fit a forest to the given points.
    ///
    /// All points must share the same dimensionality. The per-tree sample
    /// size is clamped to the dataset size.
    pub fn fit(data: &[Vec<f64>], params: &Params) -> Result<Self, Error> {
        if data.is_empty() {
            return Err(Error::EmptyData);
        }
        if params.trees == 0 || params.sample_size == 0 {
            return Err(Error::BadParams);
        }
        let dims = data[0].len();
        for point in data {
            if point.len() != dims {
                return Err(Error::DimensionMismatch {
                    expected: dims,
                    got: point.len(),
                });
            }
        }

        let sample_size = params.sample_size.min(data.len());
        // Standard height limit: beyond ~log2(n) splits, path lengths no
        // longer discriminate and the tree is truncated.
        let height_limit = (sample_size as f64).log2().ceil().max(1.0) as usize;

        let mut rng = StdRng::seed_from_u64(params.seed);
        let trees = (0..params.trees)
            .map(|_| {
                let indices =
                    rand::seq::index::sample(&mut rng, data.len(), sample_size).into_vec();
                build_tree(data, &indices, 0, height_limit, &mut rng)
            })
            .collect();

        Ok(Self {
            trees,
            dims,
            expected_path: average_path_length(sample_size),
        })
    }

    /// Anomaly score of a single point in `(0, 1]`; higher is more anomalous.
    pub fn score(&self, point: &[f64]) -> Result<f64, Error> {
        if point.len() != self.dims {
            return Err(Error::DimensionMismatch {
                expected: self.dims,
                got: point.len(),
            });
        }
        let total: f64 = self.trees.iter().map(|tree| path_length(tree, point)).sum();
        let mean_path = total / self.trees.len() as f64;
        Ok(2f64.powf(-mean_path / self.expected_path))
    }

    /// Score every point of a dataset.
    pub fn scores(&self, data: &[Vec<f64>]) -> Result<Vec<f64>, Error> {
        data.iter().map(|point| self.score(point)).collect()
    }
}

/// Recursively partition the sampled points with random axis-aligned splits.
fn build_tree(
    data: &[Vec<f64>],
    indices: &[usize],
    depth: usize,
    height_limit: usize,
    rng: &mut StdRng,
) -> Node {
    if indices.len() <= 1 || depth >= height_limit {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    // Only dimensions with spread can separate anything.
    let dims = data[indices[0]].len();
    let splittable: Vec<usize> = (0..dims)
        .filter(|&d| {
            let (min, max) = min_max(data, indices, d);
            max > min
        })
        .collect();
    if splittable.is_empty() {
        // All remaining points are identical.
        return Node::Leaf {
            size: indices.len(),
        };
    }

    let dim = splittable[rng.gen_range(0..splittable.len())];
    let (min, max) = min_max(data, indices, dim);
    let value = rng.gen_range(min..max);

    let (left, right): (Vec<usize>, Vec<usize>) =
        indices.iter().partition(|&&i| data[i][dim] <= value);

    Node::Split {
        dim,
        value,
        left: Box::new(build_tree(data, &left, depth + 1, height_limit, rng)),
        right: Box::new(build_tree(data, &right, depth + 1, height_limit, rng)),
    }
}

fn min_max(data: &[Vec<f64>], indices: &[usize], dim: usize) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &i in indices {
        let v = data[i][dim];
        if v < min {
            min = v;
        }
        if v > max {
            max = v;
        }
    }
    (min, max)
}

/// Path length of a point through one tree. Truncated leaves contribute the
/// expected remaining depth for the points they contain.
fn path_length(node: &Node, point: &[f64]) -> f64 {
    let mut node = node;
    let mut depth = 0.0;
    loop {
        match node {
            Node::Leaf { size } => return depth + average_path_length(*size),
            Node::Split {
                dim, value, left, right,
            } => {
                depth += 1.0;
                node = if point[*dim] <= *value { left } else { right };
            }
        }
    }
}

/// Expected path length `c(n)` of an unsuccessful BST search over `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        n => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}
