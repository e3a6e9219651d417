//! Training data preparation and the least-squares solver.

use anyhow::{anyhow, Result};
use nalgebra::{DMatrix, DVector};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::domain::FeatureColumn;
use crate::forecast::FeatureFrame;

/// Training Dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingDataset {
    pub feature_names: Vec<String>,
    /// One row per sample, columns in `feature_names` order
    pub features: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl TrainingDataset {
    pub fn new(feature_names: Vec<String>, features: Vec<Vec<f64>>, targets: Vec<f64>) -> Result<Self> {
        if features.len() != targets.len() {
            anyhow::bail!(
                "Feature and target count mismatch: {} features, {} targets",
                features.len(),
                targets.len()
            );
        }
        if let Some(row) = features.iter().find(|r| r.len() != feature_names.len()) {
            anyhow::bail!(
                "Feature row has {} values, expected {}",
                row.len(),
                feature_names.len()
            );
        }
        Ok(Self {
            feature_names,
            features,
            targets,
        })
    }

    /// Temperature as target, `columns` as regressors.
    pub fn from_frame(frame: &FeatureFrame, columns: &[FeatureColumn]) -> Result<Self> {
        let features = frame
            .rows()
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| row.feature(*c).ok_or_else(|| anyhow!("{c} is undefined")))
                    .collect::<Result<Vec<f64>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(
            columns.iter().map(|c| c.to_string()).collect(),
            features,
            frame.temperatures(),
        )
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    fn subset(&self, indices: &[usize]) -> TrainingDataset {
        TrainingDataset {
            feature_names: self.feature_names.clone(),
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            targets: indices.iter().map(|&i| self.targets[i]).collect(),
        }
    }

    /// Shuffled split into (train, test). `ceil(test_ratio * n)` rows go to
    /// test; the same seed always yields the same partition.
    pub fn split(&self, test_ratio: f64, seed: u64) -> Result<(TrainingDataset, TrainingDataset)> {
        if test_ratio <= 0.0 || test_ratio >= 1.0 {
            anyhow::bail!("Test ratio must be between 0 and 1");
        }

        let n = self.len();
        let n_test = (test_ratio * n as f64).ceil() as usize;
        if n_test == 0 || n_test >= n {
            anyhow::bail!("Cannot split {n} samples with test ratio {test_ratio}");
        }

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let (test, train) = indices.split_at(n_test);
        Ok((self.subset(train), self.subset(test)))
    }
}

/// Ordinary least squares with an intercept.
///
/// Solved on centred data through the SVD pseudo-inverse: collinear or
/// constant columns get the minimum-norm solution rather than an error.
/// Returns (coefficients, intercept).
pub fn fit_least_squares(x: &[Vec<f64>], y: &[f64]) -> Result<(Vec<f64>, f64)> {
    if x.is_empty() {
        anyhow::bail!("Cannot train on empty dataset");
    }
    if x.len() != y.len() {
        anyhow::bail!("Feature and target count mismatch: {} rows, {} targets", x.len(), y.len());
    }

    let n = x.len();
    let p = x[0].len();
    if x.iter().any(|row| row.len() != p) {
        anyhow::bail!("All feature vectors must have the same length");
    }
    if x.iter().flatten().chain(y).any(|v| !v.is_finite()) {
        anyhow::bail!("Training data contains non-finite values");
    }

    let y_mean = y.iter().sum::<f64>() / n as f64;
    if p == 0 {
        return Ok((Vec::new(), y_mean));
    }
    let x_mean: Vec<f64> = (0..p)
        .map(|j| x.iter().map(|row| row[j]).sum::<f64>() / n as f64)
        .collect();

    let xc = DMatrix::from_fn(n, p, |i, j| x[i][j] - x_mean[j]);
    let yc = DVector::from_fn(n, |i, _| y[i] - y_mean);

    let svd = xc.svd(true, true);
    let tolerance = svd.singular_values.max() * n.max(p) as f64 * f64::EPSILON;
    let coef = svd
        .solve(&yc, tolerance)
        .map_err(|e| anyhow!("least squares solve failed: {e}"))?;

    let coefficients: Vec<f64> = coef.iter().copied().collect();
    let intercept = y_mean
        - coefficients
            .iter()
            .zip(&x_mean)
            .map(|(c, m)| c * m)
            .sum::<f64>();

    Ok((coefficients, intercept))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{i}")).collect()
    }

    fn dataset(n: usize) -> TrainingDataset {
        let features = (0..n).map(|i| vec![i as f64]).collect();
        let targets = (0..n).map(|i| 2.0 * i as f64 + 1.0).collect();
        TrainingDataset::new(names(1), features, targets).unwrap()
    }

    #[test]
    fn test_dataset_rejects_mismatch() {
        assert!(TrainingDataset::new(names(1), vec![vec![1.0]], vec![]).is_err());
        assert!(TrainingDataset::new(names(2), vec![vec![1.0]], vec![1.0]).is_err());
    }

    #[test]
    fn test_split_sizes() {
        let (train, test) = dataset(28).split(0.3, 42).unwrap();
        assert_eq!(test.len(), 9);
        assert_eq!(train.len(), 19);

        let (train, test) = dataset(8).split(0.3, 42).unwrap();
        assert_eq!(test.len(), 3);
        assert_eq!(train.len(), 5);
    }

    #[test]
    fn test_split_is_reproducible_and_disjoint() {
        let data = dataset(20);
        let (train_a, test_a) = data.split(0.3, 42).unwrap();
        let (train_b, test_b) = data.split(0.3, 42).unwrap();
        assert_eq!(train_a, train_b);
        assert_eq!(test_a, test_b);

        let mut all: Vec<f64> = train_a.targets.iter().chain(&test_a.targets).copied().collect();
        all.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(all, data.targets);
    }

    #[test]
    fn test_split_rejects_degenerate() {
        assert!(dataset(1).split(0.3, 42).is_err());
        assert!(dataset(10).split(1.0, 42).is_err());
        assert!(dataset(10).split(0.0, 42).is_err());
    }

    #[test]
    fn test_fit_recovers_exact_plane() {
        // y = 2*x1 + 3*x2 + 1
        let x = vec![
            vec![1.0, 1.0],
            vec![2.0, 1.0],
            vec![1.0, 2.0],
            vec![2.0, 2.0],
            vec![3.0, 3.0],
            vec![4.0, 2.0],
        ];
        let y: Vec<f64> = x.iter().map(|r| 2.0 * r[0] + 3.0 * r[1] + 1.0).collect();

        let (coef, intercept) = fit_least_squares(&x, &y).unwrap();
        assert!((coef[0] - 2.0).abs() < 1e-9);
        assert!((coef[1] - 3.0).abs() < 1e-9);
        assert!((intercept - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_handles_collinear_and_constant_columns() {
        // Second column duplicates the first; third is constant.
        let x: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64, i as f64, 0.0]).collect();
        let y: Vec<f64> = (0..6).map(|i| 4.0 * i as f64 + 2.0).collect();

        let (coef, intercept) = fit_least_squares(&x, &y).unwrap();
        assert!(coef.iter().all(|c| c.is_finite()));
        // Minimum-norm split of the slope across the duplicated columns
        assert!((coef[0] - 2.0).abs() < 1e-9);
        assert!((coef[1] - 2.0).abs() < 1e-9);
        assert!(coef[2].abs() < 1e-12);
        assert!((intercept - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_with_fewer_rows_than_columns() {
        let x = vec![vec![1.0, 0.0, 2.0], vec![0.0, 1.0, 1.0]];
        let y = vec![3.0, 4.0];
        let (coef, intercept) = fit_least_squares(&x, &y).unwrap();
        let pred: Vec<f64> = x
            .iter()
            .map(|r| r.iter().zip(&coef).map(|(a, b)| a * b).sum::<f64>() + intercept)
            .collect();
        assert!((pred[0] - 3.0).abs() < 1e-9);
        assert!((pred[1] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        assert!(fit_least_squares(&[], &[]).is_err());
        assert!(fit_least_squares(&[vec![1.0]], &[1.0, 2.0]).is_err());
        assert!(fit_least_squares(&[vec![f64::NAN], vec![1.0]], &[1.0, 2.0]).is_err());
    }
}
