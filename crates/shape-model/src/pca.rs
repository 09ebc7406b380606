//! Mean-centred principal component analysis of the data matrix.
//!
//! The model is fitted with a thin SVD of the centred matrix, keeping all
//! K = min(D, N) components. Singular vectors are only defined up to sign,
//! so each basis column is flipped until its largest-magnitude component
//! (the first one on ties) is positive. This makes repeated fits of the
//! same data bit-identical.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, info};

use crate::align::DataMatrix;
use crate::error::{ShapeModelError, ShapeModelResult};

/// Iteration cap for the SVD; exceeding it is reported as a decomposition
/// failure.
const SVD_MAX_ITERATIONS: usize = 10_000;

/// A fitted statistical shape model.
///
/// Immutable once fitted. Use [`crate::ShapeModelEngine`] or an `Arc` to
/// share it.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeModel {
    mean: DVector<f64>,
    basis: DMatrix<f64>,
    singular_values: DVector<f64>,
    scores: DMatrix<f64>,
    mode_std_devs: DVector<f64>,
    sources: Vec<String>,
}

impl ShapeModel {
    /// Fit a model to the columns of `data`.
    pub fn fit(data: &DataMatrix) -> ShapeModelResult<Self> {
        let x = data.matrix();
        let (d, n) = x.shape();

        if n < 2 {
            return Err(ShapeModelError::InsufficientData {
                details: format!("need at least 2 shapes to fit a model, got {}", n),
            });
        }
        if let Some(pos) = x.iter().position(|v| !v.is_finite()) {
            return Err(ShapeModelError::Decomposition {
                details: format!(
                    "non-finite value at row {}, column {}",
                    pos % d,
                    pos / d
                ),
            });
        }

        info!("Fitting shape model: D={}, N={}", d, n);

        let mean = x.column_mean();
        let mut centered = x.clone();
        for mut column in centered.column_iter_mut() {
            column -= &mean;
        }

        let svd = centered
            .try_svd(true, true, f64::EPSILON, SVD_MAX_ITERATIONS)
            .ok_or_else(|| ShapeModelError::Decomposition {
                details: "SVD did not converge".to_string(),
            })?;
        let (u, v_t) = match (svd.u, svd.v_t) {
            (Some(u), Some(v_t)) => (u, v_t),
            _ => {
                return Err(ShapeModelError::Decomposition {
                    details: "SVD returned no singular vectors".to_string(),
                })
            }
        };
        let s = svd.singular_values;
        let k = s.len();

        // Descending order, stable for equal values.
        let mut order: Vec<usize> = (0..k).collect();
        order.sort_by(|&a, &b| s[b].total_cmp(&s[a]));

        let mut basis = DMatrix::zeros(d, k);
        let mut singular_values = DVector::zeros(k);
        let mut scores = DMatrix::zeros(k, n);

        for (dst, &src) in order.iter().enumerate() {
            let sign = sign_of_largest(u.column(src).iter());
            basis.set_column(dst, &(u.column(src) * sign));
            singular_values[dst] = s[src];
            for col in 0..n {
                scores[(dst, col)] = s[src] * v_t[(src, col)] * sign;
            }
        }

        let mode_std_devs = row_std_devs(&scores);

        debug!(
            "Singular values: {:?}",
            singular_values.iter().collect::<Vec<_>>()
        );
        info!("Shape model fitted with {} modes", k);

        Ok(Self {
            mean,
            basis,
            singular_values,
            scores,
            mode_std_devs,
            sources: data.sources().to_vec(),
        })
    }

    /// Rebuild a model from stored parts, checking that dimensions agree.
    pub fn from_parts(
        mean: DVector<f64>,
        basis: DMatrix<f64>,
        singular_values: DVector<f64>,
        scores: DMatrix<f64>,
        mode_std_devs: DVector<f64>,
        sources: Vec<String>,
    ) -> ShapeModelResult<Self> {
        let d = mean.len();
        let k = singular_values.len();
        let n = scores.ncols();

        let problem = if d == 0 || d % 3 != 0 {
            Some(format!("mean length {} is not a positive multiple of 3", d))
        } else if basis.shape() != (d, k) {
            Some(format!("basis is {:?}, expected ({}, {})", basis.shape(), d, k))
        } else if scores.nrows() != k {
            Some(format!("scores have {} rows, expected {}", scores.nrows(), k))
        } else if mode_std_devs.len() != k {
            Some(format!(
                "{} mode standard deviations, expected {}",
                mode_std_devs.len(),
                k
            ))
        } else if !sources.is_empty() && sources.len() != n {
            Some(format!("{} source names for {} shapes", sources.len(), n))
        } else {
            None
        };

        if let Some(details) = problem {
            return Err(ShapeModelError::InvalidInput { details });
        }

        Ok(Self {
            mean,
            basis,
            singular_values,
            scores,
            mode_std_devs,
            sources,
        })
    }

    /// Mean shape, flattened (length D).
    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    /// Modes of variation as columns (D×K).
    pub fn basis(&self) -> &DMatrix<f64> {
        &self.basis
    }

    /// Singular values, descending (length K).
    pub fn singular_values(&self) -> &DVector<f64> {
        &self.singular_values
    }

    /// Training scores, `scores[(k, n)]` (K×N).
    pub fn scores(&self) -> &DMatrix<f64> {
        &self.scores
    }

    /// Standard deviation of each score row, N divisor (length K).
    pub fn mode_std_devs(&self) -> &DVector<f64> {
        &self.mode_std_devs
    }

    /// Names of the training shapes, in column order.
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// K.
    pub fn mode_count(&self) -> usize {
        self.singular_values.len()
    }

    /// D = 3V.
    pub fn dimension(&self) -> usize {
        self.mean.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.mean.len() / 3
    }

    /// N.
    pub fn sample_count(&self) -> usize {
        self.scores.ncols()
    }

    /// Variance captured by each mode, S² / (N − 1).
    pub fn explained_variance(&self) -> DVector<f64> {
        let denom = self.sample_count().saturating_sub(1).max(1) as f64;
        self.singular_values.map(|s| s * s / denom)
    }

    /// Fraction of the total variance captured by each mode.
    pub fn explained_variance_ratio(&self) -> DVector<f64> {
        let variance = self.explained_variance();
        let total = variance.sum();
        if total > 0.0 {
            variance / total
        } else {
            DVector::zeros(variance.len())
        }
    }

    /// Smallest number of leading modes whose cumulative variance ratio
    /// reaches `fraction`.
    ///
    /// Returns K when the fraction cannot be reached (e.g. zero variance).
    pub fn modes_for_variance(&self, fraction: f64) -> usize {
        if fraction <= 0.0 {
            return 0;
        }
        let mut cumulative = 0.0;
        for (i, ratio) in self.explained_variance_ratio().iter().enumerate() {
            cumulative += ratio;
            if cumulative >= fraction - 1e-12 {
                return i + 1;
            }
        }
        self.mode_count()
    }

    /// Raw-scale coefficients of a flattened shape (length D).
    pub fn project(&self, shape: &DVector<f64>) -> ShapeModelResult<DVector<f64>> {
        if shape.len() != self.dimension() {
            return Err(ShapeModelError::InvalidInput {
                details: format!(
                    "shape has {} values, model dimension is {}",
                    shape.len(),
                    self.dimension()
                ),
            });
        }
        Ok(self.basis.tr_mul(&(shape - &self.mean)))
    }

    /// Training shape `index` rebuilt from its scores.
    pub fn reconstruct_training(&self, index: usize) -> ShapeModelResult<DVector<f64>> {
        if index >= self.sample_count() {
            return Err(ShapeModelError::InvalidInput {
                details: format!(
                    "training index {} out of range ({} shapes)",
                    index,
                    self.sample_count()
                ),
            });
        }
        Ok(&self.mean + &self.basis * self.scores.column(index))
    }
}

/// +1 or -1 so that the largest-magnitude entry (first on ties) becomes
/// non-negative.
fn sign_of_largest<'a>(values: impl Iterator<Item = &'a f64>) -> f64 {
    let mut largest = 0.0_f64;
    let mut magnitude = -1.0_f64;
    for &v in values {
        if v.abs() > magnitude {
            magnitude = v.abs();
            largest = v;
        }
    }
    if largest < 0.0 {
        -1.0
    } else {
        1.0
    }
}

/// Standard deviation of each row with the N divisor.
fn row_std_devs(m: &DMatrix<f64>) -> DVector<f64> {
    let n = m.ncols() as f64;
    DVector::from_iterator(
        m.nrows(),
        m.row_iter().map(|row| {
            let mean = row.sum() / n;
            let sum_sq: f64 = row.iter().map(|v| (v - mean) * (v - mean)).sum();
            (sum_sq / n).sqrt()
        }),
    )
}
