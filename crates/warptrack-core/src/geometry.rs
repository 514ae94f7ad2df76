//! Geometric carriers for template footprints.

use glam::DVec2;
use serde::{Deserialize, Serialize};

/// 2D point in pixel coordinates.
pub type Point = DVec2;

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Create a new rectangle.
    #[inline]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a rectangle from two corners.
    pub fn from_corners(min: Point, max: Point) -> Self {
        Self {
            x: min.x,
            y: min.y,
            width: max.x - min.x,
            height: max.y - min.y,
        }
    }

    /// Create a rectangle from center and size.
    pub fn from_center_size(center: Point, size: Point) -> Self {
        Self {
            x: center.x - size.x * 0.5,
            y: center.y - size.y * 0.5,
            width: size.x,
            height: size.y,
        }
    }

    /// Minimum corner (top-left).
    #[inline]
    pub fn min(self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Maximum corner (bottom-right).
    #[inline]
    pub fn max(self) -> Point {
        Point::new(self.x + self.width, self.y + self.height)
    }

    #[inline]
    pub fn center(self) -> Point {
        Point::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    #[inline]
    pub fn area(self) -> f64 {
        self.width * self.height
    }

    /// Corners in clockwise order starting at the top-left.
    pub fn corners(self) -> [Point; 4] {
        let min = self.min();
        let max = self.max();
        [
            min,
            Point::new(max.x, min.y),
            max,
            Point::new(min.x, max.y),
        ]
    }

    /// Check if a point is inside the rectangle, edges included.
    #[inline]
    pub fn contains(self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }

    /// Compute intersection with another rectangle.
    pub fn intersection(self, other: Self) -> Option<Self> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        if x1 <= x2 && y1 <= y2 {
            Some(Self::new(x1, y1, x2 - x1, y2 - y1))
        } else {
            None
        }
    }

    /// Uniformly scale position and size, e.g. to move between pyramid levels.
    pub fn scaled(self, factor: f64) -> Self {
        Self::new(
            self.x * factor,
            self.y * factor,
            self.width * factor,
            self.height * factor,
        )
    }
}

/// Footprint of a template in the reference image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TemplateRegion {
    /// Every integer pixel inside the rectangle.
    Rect(Rect),
    /// An explicit set of integer pixel coordinates `[x, y]`.
    Points(Vec<[u32; 2]>),
}

impl TemplateRegion {
    /// Bounding box of the footprint, `None` for an empty point set.
    pub fn bounds(&self) -> Option<Rect> {
        match self {
            Self::Rect(rect) => Some(*rect),
            Self::Points(points) => {
                let first = points.first()?;
                let mut min = Point::new(first[0] as f64, first[1] as f64);
                let mut max = min;
                for p in points {
                    let p = Point::new(p[0] as f64, p[1] as f64);
                    min = min.min(p);
                    max = max.max(p);
                }
                Some(Rect::from_corners(min, max))
            }
        }
    }

    /// Express the footprint at a coarser pyramid level (`2^-level`).
    ///
    /// Point sets are decimated and deduplicated so that each coarse pixel
    /// appears once, in first-seen order.
    pub fn at_level(&self, level: u32) -> Self {
        if level == 0 {
            return self.clone();
        }
        let factor = 1.0 / (1u32 << level) as f64;
        match self {
            Self::Rect(rect) => Self::Rect(rect.scaled(factor)),
            Self::Points(points) => {
                let mut seen = std::collections::HashSet::new();
                let coarse = points
                    .iter()
                    .map(|p| [p[0] >> level, p[1] >> level])
                    .filter(|p| seen.insert(*p))
                    .collect();
                Self::Points(coarse)
            }
        }
    }
}

impl From<Rect> for TemplateRegion {
    fn from(rect: Rect) -> Self {
        Self::Rect(rect)
    }
}
