use glam::{DMat2, DMat3};
use smallvec::smallvec;
use warptrack_core::Point;

use super::{
    mat2_from_rows, mat3_from_rows, mat3_rows, Jacobian, Warp, WarpFamily, WarpParams,
    MAX_PARAMETERS,
};

/// Projective warp with `h22` fixed to one:
/// `[[1+p0, p2, p4], [p1, 1+p3, p5], [p6, p7, 1]]`.
///
/// Points mapped onto the line at infinity come back non-finite; callers
/// treat them as out of bounds.
#[derive(Debug, Clone, Copy, Default)]
pub struct HomographyWarp;

impl HomographyWarp {
    /// Homogeneous numerators and denominator of the mapped point.
    #[inline]
    fn project(point: Point, p: &[f64]) -> (f64, f64, f64) {
        let u = (1.0 + p[0]) * point.x + p[2] * point.y + p[4];
        let v = p[1] * point.x + (1.0 + p[3]) * point.y + p[5];
        let w = p[6] * point.x + p[7] * point.y + 1.0;
        (u, v, w)
    }
}

impl Warp for HomographyWarp {
    fn family(&self) -> WarpFamily {
        WarpFamily::Homography
    }

    #[inline]
    fn warp_point(&self, point: Point, params: &[f64]) -> Point {
        let (u, v, w) = Self::project(point, params);
        Point::new(u / w, v / w)
    }

    fn jacobian(&self, point: Point, params: &[f64]) -> Jacobian {
        let (x, y) = (point.x, point.y);
        let (u, v, w) = Self::project(point, params);
        let inv_w = 1.0 / w;
        let (xp, yp) = (u * inv_w, v * inv_w);
        let mut jac = [[0.0; MAX_PARAMETERS]; 2];
        jac[0] = [
            x * inv_w,
            0.0,
            y * inv_w,
            0.0,
            inv_w,
            0.0,
            -x * xp * inv_w,
            -y * xp * inv_w,
        ];
        jac[1] = [
            0.0,
            x * inv_w,
            0.0,
            y * inv_w,
            0.0,
            inv_w,
            -x * yp * inv_w,
            -y * yp * inv_w,
        ];
        jac
    }

    fn spatial_jacobian(&self, point: Point, p: &[f64]) -> DMat2 {
        let (u, v, w) = Self::project(point, p);
        let inv_w = 1.0 / w;
        let (xp, yp) = (u * inv_w, v * inv_w);
        mat2_from_rows(
            (1.0 + p[0] - xp * p[6]) * inv_w,
            (p[2] - xp * p[7]) * inv_w,
            (p[1] - yp * p[6]) * inv_w,
            (1.0 + p[3] - yp * p[7]) * inv_w,
        )
    }

    fn to_matrix(&self, p: &[f64]) -> DMat3 {
        mat3_from_rows([
            [1.0 + p[0], p[2], p[4]],
            [p[1], 1.0 + p[3], p[5]],
            [p[6], p[7], 1.0],
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
            m[2][0] / w,
            m[2][1] / w,
        ]
    }
}
