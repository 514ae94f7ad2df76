//! Gauss-Newton normal equations.

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use warptrack_core::{Result, TrackerError};

use crate::warp::{WarpParams, MAX_PARAMETERS};

/// Hessian and gradient accumulators for one iteration.
///
/// Only the upper triangle is accumulated; the lower one is mirrored when the
/// system is assembled.
#[derive(Debug, Clone)]
pub struct NormalEquations {
    n: usize,
    hessian: [[f64; MAX_PARAMETERS]; MAX_PARAMETERS],
    gradient: [f64; MAX_PARAMETERS],
}

impl NormalEquations {
    pub fn new(n: usize) -> Self {
        debug_assert!(n <= MAX_PARAMETERS);
        Self {
            n,
            hessian: [[0.0; MAX_PARAMETERS]; MAX_PARAMETERS],
            gradient: [0.0; MAX_PARAMETERS],
        }
    }

    /// Add one steepest-descent vector and its residual.
    #[inline]
    pub fn accumulate(&mut self, sd: &[f64], residual: f64) {
        for i in 0..self.n {
            let si = sd[i];
            self.gradient[i] += si * residual;
            for j in i..self.n {
                self.hessian[i][j] += si * sd[j];
            }
        }
    }

    /// The symmetric Hessian as a dense matrix.
    pub fn hessian(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.n, self.n, |i, j| {
            if i <= j {
                self.hessian[i][j]
            } else {
                self.hessian[j][i]
            }
        })
    }

    pub fn gradient(&self) -> DVector<f64> {
        DVector::from_column_slice(&self.gradient[..self.n])
    }

    /// The Hessian with parameter `k` divided by `scales[k]`.
    ///
    /// Scaling by the typical magnitude of each Jacobian column makes the
    /// condition number independent of pixel coordinate magnitudes.
    /// Non-positive scales are treated as one.
    fn scaled_hessian(&self, scales: &[f64]) -> DMatrix<f64> {
        let inv = self.inverse_scales(scales);
        let mut h = self.hessian();
        for i in 0..self.n {
            for j in 0..self.n {
                h[(i, j)] *= inv[i] * inv[j];
            }
        }
        h
    }

    fn inverse_scales(&self, scales: &[f64]) -> [f64; MAX_PARAMETERS] {
        let mut inv = [1.0; MAX_PARAMETERS];
        for (k, s) in scales.iter().take(self.n).enumerate() {
            if *s > 0.0 && s.is_finite() {
                inv[k] = 1.0 / s;
            }
        }
        inv
    }

    /// Ratio of the largest to the smallest eigenvalue of the scaled Hessian.
    ///
    /// Infinite when the Hessian is not positive definite.
    pub fn condition_number(&self, scales: &[f64]) -> f64 {
        condition_of(&self.scaled_hessian(scales).symmetric_eigen())
    }

    /// Solve `(H + damping * diag(H)) * dp = -g` in scaled parameters.
    ///
    /// Fails with `DegenerateRegion` when the system is singular or its
    /// scaled condition number exceeds `max_condition`.
    pub fn solve(&self, scales: &[f64], damping: f64, max_condition: f64) -> Result<WarpParams> {
        let inv = self.inverse_scales(scales);
        let mut h = self.scaled_hessian(scales);
        if damping > 0.0 {
            for i in 0..self.n {
                h[(i, i)] *= 1.0 + damping;
            }
        }
        let eig = h.symmetric_eigen();
        let condition = condition_of(&eig);
        if !condition.is_finite() || condition > max_condition {
            return Err(TrackerError::DegenerateRegion { condition });
        }

        let g = DVector::from_fn(self.n, |i, _| self.gradient[i] * inv[i]);
        let projected = eig.eigenvectors.transpose() * g;
        let scaled = projected.component_div(&eig.eigenvalues);
        let step = -(&eig.eigenvectors * scaled);
        Ok(step.iter().enumerate().map(|(i, v)| v * inv[i]).collect())
    }
}

fn condition_of(eig: &SymmetricEigen<f64, nalgebra::Dyn>) -> f64 {
    let (min, max) = eig
        .eigenvalues
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if min > 0.0 && max.is_finite() {
        max / min
    } else {
        f64::INFINITY
    }
}
