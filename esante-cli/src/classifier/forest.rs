//! Random forest over [`DecisionTree`]s
//!
//! Trees are fitted in parallel on bootstrap samples. Every tree gets its
//! own RNG seeded from a sequence drawn up front from the forest seed, so the
//! fitted forest does not depend on thread scheduling.

use super::tree::{DecisionTree, TreeParams};
use super::{ClassifierError, ClassifierResult};
use crate::models::{NUM_CLASSES, NUM_FEATURES};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub tree: TreeParams,
    /// Draw a bootstrap sample per tree instead of using every row
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            tree: TreeParams::default(),
            bootstrap: true,
            seed: 42,
        }
    }
}

// ---------------------------------------------------------------------------
// Forest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    params: ForestParams,
}

impl RandomForest {
    pub fn fit(
        x: &[[f64; NUM_FEATURES]],
        y: &[usize],
        params: ForestParams,
    ) -> ClassifierResult<Self> {
        if x.is_empty() {
            return Err(ClassifierError::EmptyDataset(
                "forest needs at least one training row".into(),
            ));
        }
        if x.len() != y.len() {
            return Err(ClassifierError::InvalidInput(format!(
                "{} feature rows but {} labels",
                x.len(),
                y.len()
            )));
        }
        if let Some(&bad) = y.iter().find(|&&c| c >= NUM_CLASSES) {
            return Err(ClassifierError::InvalidInput(format!(
                "label {bad} is not a known class"
            )));
        }
        if params.n_trees == 0 {
            return Err(ClassifierError::InvalidConfig(
                "forest needs at least one tree".into(),
            ));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let seeds: Vec<u64> = (0..params.n_trees).map(|_| rng.random()).collect();

        let n = x.len();
        let trees: Vec<DecisionTree> = seeds
            .par_iter()
            .map(|&seed| {
                let mut tree_rng = ChaCha8Rng::seed_from_u64(seed);
                let indices: Vec<usize> = if params.bootstrap {
                    (0..n).map(|_| tree_rng.random_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                DecisionTree::fit(x, y, &indices, params.tree, &mut tree_rng)
            })
            .collect();

        debug!(
            "Fitted {} trees, mean {:.1} nodes",
            trees.len(),
            trees.iter().map(|t| t.node_count()).sum::<usize>() as f64 / trees.len() as f64
        );
        Ok(Self { trees, params })
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Fraction of trees voting for each class
    pub fn predict_proba(&self, row: &[f64; NUM_FEATURES]) -> [f64; NUM_CLASSES] {
        let mut votes = [0usize; NUM_CLASSES];
        for tree in &self.trees {
            votes[tree.predict(row)] += 1;
        }
        let total = self.trees.len().max(1) as f64;
        votes.map(|v| v as f64 / total)
    }

    /// Class with the most votes, ties going to the lowest label
    pub fn predict(&self, row: &[f64; NUM_FEATURES]) -> usize {
        argmax(&self.predict_proba(row))
    }

    pub fn predict_batch(&self, rows: &[[f64; NUM_FEATURES]]) -> Vec<usize> {
        rows.par_iter().map(|r| self.predict(r)).collect()
    }

    /// Mean of the per-tree normalized impurity decreases, summing to 1
    pub fn feature_importances(&self) -> [f64; NUM_FEATURES] {
        let mut sum = [0.0; NUM_FEATURES];
        for tree in &self.trees {
            for (s, v) in sum.iter_mut().zip(tree.feature_importances()) {
                *s += v;
            }
        }
        let total: f64 = sum.iter().sum();
        if total <= 0.0 {
            return [0.0; NUM_FEATURES];
        }
        sum.map(|v| v / total)
    }
}

pub(crate) fn argmax(values: &[f64; NUM_CLASSES]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}
