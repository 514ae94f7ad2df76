use glam::{DMat2, DMat3};
use smallvec::smallvec;
use warptrack_core::Point;

use super::{mat3_from_rows, mat3_rows, Jacobian, Warp, WarpFamily, WarpParams, MAX_PARAMETERS};

/// Pure translation: `W(x; p) = x + (p0, p1)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TranslationWarp;

impl Warp for TranslationWarp {
    fn family(&self) -> WarpFamily {
        WarpFamily::Translation
    }

    #[inline]
    fn warp_point(&self, point: Point, params: &[f64]) -> Point {
        Point::new(point.x + params[0], point.y + params[1])
    }

    #[inline]
    fn jacobian(&self, _point: Point, _params: &[f64]) -> Jacobian {
        let mut jac = [[0.0; MAX_PARAMETERS]; 2];
        jac[0][0] = 1.0;
        jac[1][1] = 1.0;
        jac
    }

    #[inline]
    fn spatial_jacobian(&self, _point: Point, _params: &[f64]) -> DMat2 {
        DMat2::IDENTITY
    }

    fn to_matrix(&self, params: &[f64]) -> DMat3 {
        mat3_from_rows([[1.0, 0.0, params[0]], [0.0, 1.0, params[1]], [0.0, 0.0, 1.0]])
    }

    fn from_matrix(&self, matrix: &DMat3) -> WarpParams {
        let m = mat3_rows(matrix);
        smallvec![m[0][2] / m[2][2], m[1][2] / m[2][2]]
    }

    // The translation group is abelian and additive in its parameters.
    fn compose(&self, params: &[f64], increment: &[f64]) -> WarpParams {
        smallvec![params[0] + increment[0], params[1] + increment[1]]
    }

    fn rescale(&self, params: &[f64], factor: f64) -> WarpParams {
        smallvec![params[0] * factor, params[1] * factor]
    }
}
