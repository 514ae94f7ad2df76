use glam::{DMat2, DMat3};
use smallvec::smallvec;
use warptrack_core::Point;

use super::{
    mat2_from_rows, mat3_from_rows, mat3_rows, Jacobian, Warp, WarpFamily, WarpParams,
    MAX_PARAMETERS,
};

/// Rotation, uniform scale and translation.
///
/// Parameters `(a, b, tx, ty)` give the matrix `[[1+a, -b, tx], [b, 1+a, ty]]`,
/// so `(1 + a, b)` is `scale * (cos θ, sin θ)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarityWarp;

impl Warp for SimilarityWarp {
    fn family(&self) -> WarpFamily {
        WarpFamily::Similarity
    }

    #[inline]
    fn warp_point(&self, point: Point, params: &[f64]) -> Point {
        let (a, b) = (1.0 + params[0], params[1]);
        Point::new(
            a * point.x - b * point.y + params[2],
            b * point.x + a * point.y + params[3],
        )
    }

    #[inline]
    fn jacobian(&self, point: Point, _params: &[f64]) -> Jacobian {
        let mut jac = [[0.0; MAX_PARAMETERS]; 2];
        jac[0][..4].copy_from_slice(&[point.x, -point.y, 1.0, 0.0]);
        jac[1][..4].copy_from_slice(&[point.y, point.x, 0.0, 1.0]);
        jac
    }

    #[inline]
    fn spatial_jacobian(&self, _point: Point, params: &[f64]) -> DMat2 {
        let (a, b) = (1.0 + params[0], params[1]);
        mat2_from_rows(a, -b, b, a)
    }

    fn to_matrix(&self, params: &[f64]) -> DMat3 {
        let (a, b) = (1.0 + params[0], params[1]);
        mat3_from_rows([[a, -b, params[2]], [b, a, params[3]], [0.0, 0.0, 1.0]])
    }

    fn from_matrix(&self, matrix: &DMat3) -> WarpParams {
        let m = mat3_rows(matrix);
        let w = m[2][2];
        smallvec![m[0][0] / w - 1.0, m[1][0] / w, m[0][2] / w, m[1][2] / w]
    }
}
