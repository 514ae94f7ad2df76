//! Parametric 2D motion models.
//!
//! Every family is a matrix group acting on homogeneous pixel coordinates,
//! parameterized so that the zero vector is the identity warp. Composition
//! follows `W(x; compose(p, dp)) = W(W(x; dp); p)`.

mod affine;
mod homography;
mod similarity;
mod translation;

use std::fmt;
use std::sync::Arc;

use glam::{DMat2, DMat3};
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};
use warptrack_core::Point;

pub use affine::AffineWarp;
pub use homography::HomographyWarp;
pub use similarity::SimilarityWarp;
pub use translation::TranslationWarp;

/// Largest parameter count of any supported family.
pub const MAX_PARAMETERS: usize = 8;

/// Parameter vector, stored inline for every supported family.
pub type WarpParams = SmallVec<[f64; MAX_PARAMETERS]>;

/// dW/dp as two rows (x, y). Entries past the parameter count are zero.
pub type Jacobian = [[f64; MAX_PARAMETERS]; 2];

/// Warp model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WarpFamily {
    #[default]
    Translation,
    /// Rotation, uniform scale and translation.
    Similarity,
    Affine,
    Homography,
}

impl WarpFamily {
    pub fn parameter_count(self) -> usize {
        match self {
            Self::Translation => 2,
            Self::Similarity => 4,
            Self::Affine => 6,
            Self::Homography => 8,
        }
    }

    /// Instantiate the shared, stateless warp for this family.
    pub fn build(self) -> Arc<dyn Warp> {
        match self {
            Self::Translation => Arc::new(TranslationWarp),
            Self::Similarity => Arc::new(SimilarityWarp),
            Self::Affine => Arc::new(AffineWarp),
            Self::Homography => Arc::new(HomographyWarp),
        }
    }
}

/// A parametric warp family.
///
/// Implementations carry no per-target state, so one instance can be shared
/// by any number of tracking sessions.
pub trait Warp: fmt::Debug + Send + Sync {
    fn family(&self) -> WarpFamily;

    fn parameter_count(&self) -> usize {
        self.family().parameter_count()
    }

    /// Parameters of the identity warp.
    fn identity(&self) -> WarpParams {
        smallvec![0.0; self.parameter_count()]
    }

    /// Map a reference coordinate into the current frame.
    fn warp_point(&self, point: Point, params: &[f64]) -> Point;

    /// dW/dp evaluated at `point` and `params`.
    fn jacobian(&self, point: Point, params: &[f64]) -> Jacobian;

    /// dW/dx evaluated at `point` and `params`.
    fn spatial_jacobian(&self, point: Point, params: &[f64]) -> DMat2;

    /// Homogeneous 3x3 matrix of the warp.
    fn to_matrix(&self, params: &[f64]) -> DMat3;

    /// Parameters of a matrix belonging to this family.
    fn from_matrix(&self, matrix: &DMat3) -> WarpParams;

    /// Compose an increment into the current parameters.
    fn compose(&self, params: &[f64], increment: &[f64]) -> WarpParams {
        self.from_matrix(&(self.to_matrix(params) * self.to_matrix(increment)))
    }

    /// Express parameters on a pyramid level `factor` times finer
    /// (2.0 moves one level finer, 0.5 one level coarser).
    ///
    /// A 2x2 box downsample centers coarse pixel `c` on fine coordinate
    /// `2c + 0.5`, so the change of frame is `x_fine = f * x + (f - 1) / 2`.
    fn rescale(&self, params: &[f64], factor: f64) -> WarpParams {
        let s = level_change(factor);
        let s_inv = level_change(1.0 / factor);
        self.from_matrix(&(s * self.to_matrix(params) * s_inv))
    }
}

/// Pixel frame change between pyramid levels a factor `f` apart.
///
/// These form a group: `level_change(a) * level_change(b) == level_change(a * b)`.
pub(crate) fn level_change(f: f64) -> DMat3 {
    let offset = 0.5 * (f - 1.0);
    mat3_from_rows([[f, 0.0, offset], [0.0, f, offset], [0.0, 0.0, 1.0]])
}

/// Build a matrix from row-major entries.
pub(crate) fn mat3_from_rows(rows: [[f64; 3]; 3]) -> DMat3 {
    DMat3::from_cols_array_2d(&rows).transpose()
}

/// Row-major entries of a matrix.
pub(crate) fn mat3_rows(m: &DMat3) -> [[f64; 3]; 3] {
    m.transpose().to_cols_array_2d()
}

/// Build a 2x2 matrix from row-major entries.
#[inline]
pub(crate) fn mat2_from_rows(a: f64, b: f64, c: f64, d: f64) -> DMat2 {
    DMat2::from_cols(glam::DVec2::new(a, c), glam::DVec2::new(b, d))
}
