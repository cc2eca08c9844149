//! CART decision tree with Gini impurity
//!
//! Nodes live in a flat arena, root at index 0. Each split considers a random
//! subset of features and keeps drawing past that subset only while no valid
//! partition has been found. Impurity decrease per feature is accumulated for
//! importance reporting.

use crate::models::{NUM_CLASSES, NUM_FEATURES};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Number of features examined at each split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// `floor(sqrt(n_features))`, at least 1
    Sqrt,
    All,
    Count(usize),
}

impl MaxFeatures {
    pub fn resolve(self, n_features: usize) -> usize {
        let k = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Count(k) => k,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 2,
            max_features: MaxFeatures::Sqrt,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        class: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    /// Unnormalized impurity decrease per feature, weighted by node size
    importance: [f64; NUM_FEATURES],
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// Σ left_counts² / n_left + Σ right_counts² / n_right, higher is purer
    proxy: f64,
}

struct Builder<'a, R: Rng + ?Sized> {
    x: &'a [[f64; NUM_FEATURES]],
    y: &'a [usize],
    params: TreeParams,
    n_candidates: usize,
    rng: &'a mut R,
    nodes: Vec<Node>,
    importance: [f64; NUM_FEATURES],
}

impl DecisionTree {
    /// Grow a tree on the rows listed in `indices`.
    ///
    /// `indices` may repeat rows (bootstrap samples). Labels must be below
    /// [`NUM_CLASSES`].
    pub fn fit<R: Rng + ?Sized>(
        x: &[[f64; NUM_FEATURES]],
        y: &[usize],
        indices: &[usize],
        params: TreeParams,
        rng: &mut R,
    ) -> Self {
        let mut builder = Builder {
            x,
            y,
            params,
            n_candidates: params.max_features.resolve(NUM_FEATURES),
            rng,
            nodes: Vec::new(),
            importance: [0.0; NUM_FEATURES],
        };
        builder.build(indices.to_vec(), 0);

        Self {
            nodes: builder.nodes,
            importance: builder.importance,
        }
    }

    pub fn predict(&self, row: &[f64; NUM_FEATURES]) -> usize {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { class } => return *class,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Length of the longest root-to-leaf path (a lone leaf has depth 0)
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match &nodes[id] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    /// Impurity decrease per feature, summing to 1 (all zero for a stump)
    pub fn feature_importances(&self) -> [f64; NUM_FEATURES] {
        let total: f64 = self.importance.iter().sum();
        if total <= 0.0 {
            return [0.0; NUM_FEATURES];
        }
        self.importance.map(|v| v / total)
    }
}

fn class_counts(y: &[usize], indices: &[usize]) -> [usize; NUM_CLASSES] {
    let mut counts = [0; NUM_CLASSES];
    for &i in indices {
        counts[y[i]] += 1;
    }
    counts
}

fn gini(counts: &[usize; NUM_CLASSES], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>()
}

/// Majority class, ties going to the lowest label
fn majority(counts: &[usize; NUM_CLASSES]) -> usize {
    let mut best = 0;
    for (class, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = class;
        }
    }
    best
}

fn sum_squares_over_n(counts: &[usize; NUM_CLASSES], n: usize) -> f64 {
    counts.iter().map(|&c| (c * c) as f64).sum::<f64>() / n as f64
}

impl<R: Rng + ?Sized> Builder<'_, R> {
    fn build(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        let n = indices.len();
        let counts = class_counts(self.y, &indices);
        let is_pure = counts.iter().filter(|&&c| c > 0).count() <= 1;

        let stop = depth >= self.params.max_depth
            || n < self.params.min_samples_split
            || n < 2 * self.params.min_samples_leaf
            || is_pure;
        let split = if stop {
            None
        } else {
            self.best_split(&indices, &counts)
        };

        let Some(split) = split else {
            self.nodes.push(Node::Leaf {
                class: majority(&counts),
            });
            return self.nodes.len() - 1;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.x[i][split.feature] <= split.threshold);

        let left_counts = class_counts(self.y, &left_idx);
        let right_counts = class_counts(self.y, &right_idx);
        let decrease = n as f64 * gini(&counts, n)
            - left_idx.len() as f64 * gini(&left_counts, left_idx.len())
            - right_idx.len() as f64 * gini(&right_counts, right_idx.len());
        self.importance[split.feature] += decrease.max(0.0);

        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { class: 0 });
        let left = self.build(left_idx, depth + 1);
        let right = self.build(right_idx, depth + 1);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    fn best_split(
        &mut self,
        indices: &[usize],
        counts: &[usize; NUM_CLASSES],
    ) -> Option<SplitCandidate> {
        let mut features: [usize; NUM_FEATURES] = std::array::from_fn(|j| j);
        features.shuffle(&mut *self.rng);

        let mut best: Option<SplitCandidate> = None;
        for (visited, &feature) in features.iter().enumerate() {
            if visited >= self.n_candidates && best.is_some() {
                break;
            }
            if let Some(candidate) = self.best_threshold(indices, counts, feature) {
                if best.as_ref().map_or(true, |b| candidate.proxy > b.proxy) {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    /// Sweep the sorted values of one feature for the purest valid threshold
    fn best_threshold(
        &self,
        indices: &[usize],
        counts: &[usize; NUM_CLASSES],
        feature: usize,
    ) -> Option<SplitCandidate> {
        let n = indices.len();
        let min_leaf = self.params.min_samples_leaf.max(1);

        let mut sorted: Vec<(f64, usize)> = indices
            .iter()
            .map(|&i| (self.x[i][feature], self.y[i]))
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left = [0usize; NUM_CLASSES];
        let mut best: Option<SplitCandidate> = None;

        for pos in 1..n {
            left[sorted[pos - 1].1] += 1;
            let n_left = pos;
            let n_right = n - pos;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }
            let (lo, hi) = (sorted[pos - 1].0, sorted[pos].0);
            if lo == hi {
                continue;
            }

            let mut right = *counts;
            for (r, l) in right.iter_mut().zip(&left) {
                *r -= l;
            }
            let proxy = sum_squares_over_n(&left, n_left) + sum_squares_over_n(&right, n_right);
            if best.as_ref().map_or(true, |b| proxy > b.proxy) {
                let mut threshold = lo + (hi - lo) / 2.0;
                if threshold >= hi {
                    threshold = lo;
                }
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    proxy,
                });
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn row(v: f64, w: f64) -> [f64; NUM_FEATURES] {
        [v, w, 0.0, 0.0, 0.0]
    }

    fn all_features() -> TreeParams {
        TreeParams {
            max_features: MaxFeatures::All,
            ..Default::default()
        }
    }

    #[test]
    fn test_max_features_resolve() {
        assert_eq!(MaxFeatures::Sqrt.resolve(5), 2);
        assert_eq!(MaxFeatures::Sqrt.resolve(1), 1);
        assert_eq!(MaxFeatures::All.resolve(5), 5);
        assert_eq!(MaxFeatures::Count(9).resolve(5), 5);
        assert_eq!(MaxFeatures::Count(0).resolve(5), 1);
    }

    #[test]
    fn test_separable_data_is_learned() {
        let x: Vec<_> = (0..40).map(|i| row(i as f64, 0.0)).collect();
        let y: Vec<usize> = (0..40).map(|i| if i < 20 { 0 } else { 3 }).collect();
        let idx: Vec<usize> = (0..40).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let tree = DecisionTree::fit(&x, &y, &idx, all_features(), &mut rng);
        assert_eq!(tree.predict(&row(3.0, 0.0)), 0);
        assert_eq!(tree.predict(&row(35.0, 0.0)), 3);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.node_count(), 3);

        let importance = tree.feature_importances();
        assert!((importance[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_threshold_is_midpoint() {
        let x = vec![row(1.0, 0.0), row(1.0, 0.0), row(3.0, 0.0), row(3.0, 0.0)];
        let y = vec![0, 0, 1, 1];
        let params = TreeParams {
            min_samples_split: 2,
            min_samples_leaf: 1,
            ..all_features()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let tree = DecisionTree::fit(&x, &y, &[0, 1, 2, 3], params, &mut rng);
        assert_eq!(tree.predict(&row(1.99, 0.0)), 0);
        assert_eq!(tree.predict(&row(2.0, 0.0)), 0);
        assert_eq!(tree.predict(&row(2.01, 0.0)), 1);
    }

    #[test]
    fn test_min_samples_split_makes_leaf() {
        let x = vec![row(1.0, 0.0), row(2.0, 0.0), row(3.0, 0.0), row(4.0, 0.0)];
        let y = vec![0, 0, 1, 1];
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let tree = DecisionTree::fit(&x, &y, &[0, 1, 2, 3], all_features(), &mut rng);
        // 4 samples < min_samples_split of 5
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.feature_importances(), [0.0; NUM_FEATURES]);
    }

    #[test]
    fn test_majority_tie_goes_to_lowest_class() {
        assert_eq!(majority(&[2, 2, 0, 0]), 0);
        assert_eq!(majority(&[0, 1, 3, 3]), 2);
    }

    #[test]
    fn test_min_samples_leaf_respected() {
        // a single odd sample cannot be isolated with min_samples_leaf = 2
        let mut x: Vec<_> = (0..10).map(|i| row(i as f64, 0.0)).collect();
        x.push(row(100.0, 0.0));
        let mut y = vec![0; 10];
        y.push(1);
        let idx: Vec<usize> = (0..11).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let tree = DecisionTree::fit(&x, &y, &idx, all_features(), &mut rng);
        assert_eq!(tree.predict(&row(100.0, 0.0)), 0);
    }

    #[test]
    fn test_depth_limited() {
        let x: Vec<_> = (0..256)
            .map(|i| row(i as f64, ((i * 7919) % 256) as f64))
            .collect();
        let y: Vec<usize> = (0..256).map(|i| (i * 31 % 7) % NUM_CLASSES).collect();
        let idx: Vec<usize> = (0..256).collect();
        let params = TreeParams {
            max_depth: 3,
            ..all_features()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let tree = DecisionTree::fit(&x, &y, &idx, params, &mut rng);
        assert!(tree.depth() <= 3);
    }

    #[test]
    fn test_searches_past_constant_features() {
        // only feature 1 varies, and max_features = 1
        let x: Vec<_> = (0..20).map(|i| row(5.0, i as f64)).collect();
        let y: Vec<usize> = (0..20).map(|i| usize::from(i >= 10)).collect();
        let idx: Vec<usize> = (0..20).collect();
        let params = TreeParams {
            max_features: MaxFeatures::Count(1),
            ..Default::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let tree = DecisionTree::fit(&x, &y, &idx, params, &mut rng);
        assert_eq!(tree.predict(&row(5.0, 2.0)), 0);
        assert_eq!(tree.predict(&row(5.0, 17.0)), 1);
    }
}
