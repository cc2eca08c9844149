//! Per-feature standardization

use super::{ClassifierError, ClassifierResult};
use crate::models::NUM_FEATURES;
use serde::{Deserialize, Serialize};

/// Removes the mean and scales to unit variance, feature by feature.
///
/// Variance uses the population formula. A feature with zero variance keeps
/// a scale of 1 so it passes through centered but unscaled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: [f64; NUM_FEATURES],
    pub scale: [f64; NUM_FEATURES],
}

impl StandardScaler {
    pub fn fit(rows: &[[f64; NUM_FEATURES]]) -> ClassifierResult<Self> {
        if rows.is_empty() {
            return Err(ClassifierError::EmptyDataset(
                "scaler needs at least one row".into(),
            ));
        }
        let n = rows.len() as f64;

        let mut mean = [0.0; NUM_FEATURES];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut var = [0.0; NUM_FEATURES];
        for row in rows {
            for j in 0..NUM_FEATURES {
                var[j] += (row[j] - mean[j]).powi(2);
            }
        }

        let mut scale = [1.0; NUM_FEATURES];
        for j in 0..NUM_FEATURES {
            let std = (var[j] / n).sqrt();
            if std > f64::EPSILON * mean[j].abs().max(1.0) {
                scale[j] = std;
            }
        }

        Ok(Self { mean, scale })
    }

    pub fn transform_row(&self, row: &[f64; NUM_FEATURES]) -> [f64; NUM_FEATURES] {
        let mut out = [0.0; NUM_FEATURES];
        for j in 0..NUM_FEATURES {
            out[j] = (row[j] - self.mean[j]) / self.scale[j];
        }
        out
    }

    pub fn transform(&self, rows: &[[f64; NUM_FEATURES]]) -> Vec<[f64; NUM_FEATURES]> {
        rows.iter().map(|r| self.transform_row(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_centers_and_scales() {
        let rows = vec![
            [1.0, 10.0, 5.0, 0.0, 2.0],
            [3.0, 30.0, 5.0, 0.0, 4.0],
        ];
        let scaler = StandardScaler::fit(&rows).unwrap();
        assert_eq!(scaler.mean, [2.0, 20.0, 5.0, 0.0, 3.0]);
        assert_eq!(scaler.scale, [1.0, 10.0, 1.0, 1.0, 1.0]);

        let scaled = scaler.transform(&rows);
        assert_eq!(scaled[0], [-1.0, -1.0, 0.0, 0.0, -1.0]);
        assert_eq!(scaled[1], [1.0, 1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_transformed_columns_have_unit_variance() {
        let rows: Vec<[f64; NUM_FEATURES]> = (0..50)
            .map(|i| {
                let x = i as f64;
                [x, x * x, 100.0 - x, (x * 0.3).sin(), 36.0 + x / 10.0]
            })
            .collect();
        let scaler = StandardScaler::fit(&rows).unwrap();
        let scaled = scaler.transform(&rows);

        for j in 0..NUM_FEATURES {
            let mean: f64 = scaled.iter().map(|r| r[j]).sum::<f64>() / 50.0;
            let var: f64 = scaled.iter().map(|r| (r[j] - mean).powi(2)).sum::<f64>() / 50.0;
            assert!(mean.abs() < 1e-9, "feature {j} mean {mean}");
            assert!((var - 1.0).abs() < 1e-9, "feature {j} var {var}");
        }
    }

    #[test]
    fn test_fit_empty_fails() {
        assert!(matches!(
            StandardScaler::fit(&[]),
            Err(ClassifierError::EmptyDataset(_))
        ));
    }
}
