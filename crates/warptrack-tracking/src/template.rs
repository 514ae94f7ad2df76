//! Template store: reference samples and cached per-point derivatives.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;
use warptrack_core::{Point, Rect, Result, TemplateRegion, TrackerError};

use crate::config::TemplateConfig;
use crate::pyramid::FrameLevel;
use crate::solver::NormalEquations;
use crate::warp::{Jacobian, Warp, MAX_PARAMETERS};

/// One reference-grid sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemplatePoint {
    /// Integer reference coordinate.
    pub position: Point,
    /// Reference intensity at `position`.
    pub intensity: f64,
    /// Reference spatial gradient (du, dv).
    pub gradient: Point,
    /// Whether the point takes part in alignment.
    pub valid: bool,
}

/// Immutable set of template points for one warp family.
///
/// Per-point caches live in flat arrays indexed in parallel with `points`:
/// the warp Jacobian at the identity and the reference steepest-descent
/// vector (gradient times that Jacobian).
#[derive(Debug, Clone)]
pub struct Template {
    parameter_count: usize,
    bounds: Rect,
    points: Vec<TemplatePoint>,
    jacobians: Vec<Jacobian>,
    steepest_descent: Vec<[f64; MAX_PARAMETERS]>,
    scales: [f64; MAX_PARAMETERS],
    valid_count: usize,
    condition: f64,
}

impl Template {
    /// Build the template from a reference level.
    ///
    /// Pixels are enumerated row-major inside `region`, restricted to the
    /// image interior where central differences exist, keeping every
    /// `sample_stride`-th column and row counted from the region origin.
    /// Points whose gradient norm is below `gradient_threshold` are masked.
    pub fn initialize(
        reference: &FrameLevel,
        region: &TemplateRegion,
        warp: &dyn Warp,
        config: &TemplateConfig,
    ) -> Result<Self> {
        let n = warp.parameter_count();
        let identity = warp.identity();
        let bounds = region.bounds().ok_or(TrackerError::EmptyRegion)?;
        let coords = enumerate_region(reference, region, config.sample_stride.max(1));

        let mut points = Vec::with_capacity(coords.len());
        let mut jacobians = Vec::with_capacity(coords.len());
        let mut steepest_descent = Vec::with_capacity(coords.len());
        let mut normal = NormalEquations::new(n);
        let mut squared = [0.0; MAX_PARAMETERS];
        let mut valid_count = 0;

        for [x, y] in coords {
            let position = Point::new(x as f64, y as f64);
            let gradient = Point::new(
                reference.grad_x.pixel(x, y) as f64,
                reference.grad_y.pixel(x, y) as f64,
            );
            let jac = warp.jacobian(position, &identity);
            let mut sd = [0.0; MAX_PARAMETERS];
            for k in 0..n {
                sd[k] = gradient.x * jac[0][k] + gradient.y * jac[1][k];
            }

            let valid = gradient.length() >= config.gradient_threshold;
            if valid {
                valid_count += 1;
                normal.accumulate(&sd[..n], 0.0);
                for k in 0..n {
                    squared[k] += jac[0][k] * jac[0][k] + jac[1][k] * jac[1][k];
                }
            }
            points.push(TemplatePoint {
                position,
                intensity: reference.image.pixel(x, y) as f64,
                gradient,
                valid,
            });
            jacobians.push(jac);
            steepest_descent.push(sd);
        }

        if valid_count == 0 {
            debug!(enumerated = points.len(), "Template region has no textured points");
            return Err(TrackerError::EmptyRegion);
        }

        let scales = squared.map(|s| (s / valid_count as f64).sqrt());
        let condition = normal.condition_number(&scales[..n]);
        debug!(
            enumerated = points.len(),
            retained = valid_count,
            condition,
            "Template initialized"
        );
        if !condition.is_finite() || condition > config.max_condition_number {
            return Err(TrackerError::DegenerateRegion { condition });
        }

        Ok(Self {
            parameter_count: n,
            bounds,
            points,
            jacobians,
            steepest_descent,
            scales,
            valid_count,
            condition,
        })
    }

    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    /// Bounding box of the region the template was built from.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Number of valid points; the reference size for support fractions.
    pub fn len(&self) -> usize {
        self.valid_count
    }

    pub fn is_empty(&self) -> bool {
        self.valid_count == 0
    }

    /// All enumerated points, masked ones included.
    pub fn points(&self) -> &[TemplatePoint] {
        &self.points
    }

    /// Identity warp Jacobian of point `index`.
    #[inline]
    pub fn jacobian(&self, index: usize) -> &Jacobian {
        &self.jacobians[index]
    }

    /// Reference steepest-descent vector of point `index`.
    #[inline]
    pub fn steepest_descent(&self, index: usize) -> &[f64] {
        &self.steepest_descent[index][..self.parameter_count]
    }

    /// RMS magnitude of each identity Jacobian column over the valid points.
    ///
    /// Used to normalize the Hessian before it is conditioned and solved.
    pub fn parameter_scales(&self) -> &[f64] {
        &self.scales[..self.parameter_count]
    }

    /// Scaled condition number of the reference Hessian at initialization.
    pub fn condition_number(&self) -> f64 {
        self.condition
    }

    /// Indices of the points that take part in alignment.
    pub fn valid_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.points
            .iter()
            .enumerate()
            .filter(|(_, p)| p.valid)
            .map(|(i, _)| i)
    }

    /// Mask or unmask one point.
    pub fn set_valid(&mut self, index: usize, valid: bool) -> Result<()> {
        let point = self.points.get_mut(index).ok_or_else(|| {
            TrackerError::InvalidParameter(format!("template point {} does not exist", index))
        })?;
        if point.valid != valid {
            point.valid = valid;
            if valid {
                self.valid_count += 1;
            } else {
                self.valid_count -= 1;
            }
        }
        Ok(())
    }
}

/// Integer coordinates of a region inside `[1, w-2] x [1, h-2]`.
///
/// Explicit point sets are deduplicated in first-seen order.
fn enumerate_region(reference: &FrameLevel, region: &TemplateRegion, stride: u32) -> Vec<[u32; 2]> {
    let (w, h) = (reference.image.width, reference.image.height);
    if w < 3 || h < 3 {
        return Vec::new();
    }
    let interior = |x: i64, y: i64| x >= 1 && y >= 1 && x <= w as i64 - 2 && y <= h as i64 - 2;
    let stride = stride as i64;

    match region {
        TemplateRegion::Rect(rect) => {
            let xs = clipped_span(rect.x, rect.x + rect.width, w as i64 - 2, stride);
            let ys = clipped_span(rect.y, rect.y + rect.height, h as i64 - 2, stride);
            let mut coords = Vec::new();
            for y in ys.step_by(stride as usize) {
                for x in xs.clone().step_by(stride as usize) {
                    coords.push([x as u32, y as u32]);
                }
            }
            coords
        }
        TemplateRegion::Points(points) => {
            let Some(bounds) = region.bounds() else {
                return Vec::new();
            };
            let (bx, by) = (bounds.x as i64, bounds.y as i64);
            let mut seen = HashSet::with_capacity(points.len());
            points
                .iter()
                .filter(|p| seen.insert(**p))
                .map(|p| (p[0] as i64, p[1] as i64))
                .filter(|&(x, y)| (x - bx) % stride == 0 && (y - by) % stride == 0)
                .filter(|&(x, y)| interior(x, y))
                .map(|(x, y)| [x as u32, y as u32])
                .collect()
        }
    }
}

/// Integer span of `[start, end)` clipped to `[1, last]`.
///
/// The clipped start keeps the stride phase of the unclipped one, so the
/// same pixels are sampled however far the region overhangs the image.
fn clipped_span(start: f64, end: f64, last: i64, stride: i64) -> std::ops::Range<i64> {
    // Far beyond any image; keeps the integer arithmetic below overflow-free.
    const LIMIT: f64 = 1e15;
    let first = start.clamp(-LIMIT, LIMIT).ceil() as i64;
    let end = (end.clamp(-LIMIT, LIMIT).ceil() as i64).min(last + 1);
    let first = if first < 1 {
        first + (1 - first + stride - 1) / stride * stride
    } else {
        first
    };
    first..end.max(first)
}
