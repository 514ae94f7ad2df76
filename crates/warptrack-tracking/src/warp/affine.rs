use glam::{DMat2, DMat3};
use smallvec::smallvec;
use warptrack_core::Point;

use super::{
    mat2_from_rows, mat3_from_rows, mat3_rows, Jacobian, Warp, WarpFamily, WarpParams,
    MAX_PARAMETERS,
};

/// General affine warp `[[1+p0, p2, p4], [p1, 1+p3, p5]]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AffineWarp;

impl Warp for AffineWarp {
    fn family(&self) -> WarpFamily {
        WarpFamily::Affine
    }

    #[inline]
    fn warp_point(&self, point: Point, p: &[f64]) -> Point {
        Point::new(
            (1.0 + p[0]) * point.x + p[2] * point.y + p[4],
            p[1] * point.x + (1.0 + p[3]) * point.y + p[5],
        )
    }

    #[inline]
    fn jacobian(&self, point: Point, _params: &[f64]) -> Jacobian {
        let (x, y) = (point.x, point.y);
        let mut jac = [[0.0; MAX_PARAMETERS]; 2];
        jac[0][..6].copy_from_slice(&[x, 0.0, y, 0.0, 1.0, 0.0]);
        jac[1][..6].copy_from_slice(&[0.0, x, 0.0, y, 0.0, 1.0]);
        jac
    }

    #[inline]
    fn spatial_jacobian(&self, _point: Point, p: &[f64]) -> DMat2 {
        mat2_from_rows(1.0 + p[0], p[2], p[1], 1.0 + p[3])
    }

    fn to_matrix(&self, p: &[f64]) -> DMat3 {
        mat3_from_rows([
            [1.0 + p[0], p[2], p[4]],
            [p[1], 1.0 + p[3], p[5]],
            [0.0, 0.0, 1.0],
        ])
    }

    fn from_matrix(&self, matrix: &DMat3) -> WarpParams {
        let m = mat3_rows(matrix);
        let w = m[2][2];
        smallvec![
            m[0][0] / w - 1.0,
            m[1][0] / w,
            m[0][1] / w,
            m[1][1] / w - 1.0,
            m[0][2] / w,
            m[1][2] / w,
        ]
    }
}
