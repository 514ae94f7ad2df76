//! Shared fixtures: a smooth synthetic texture and frames rendered from it.

use glam::{DMat3, DVec3};
use warptrack_core::GrayImage;

/// Install a test subscriber once; `RUST_LOG` selects the verbosity.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Band-limited texture in [0.1, 0.9] with structure in both directions.
pub fn texture(x: f64, y: f64) -> f64 {
    0.5 + 0.15 * (x * 0.19).sin() + 0.15 * (y * 0.23).cos() + 0.1 * ((x + 0.7 * y) * 0.11).sin()
}

/// Coarser texture that survives a few 2x downsamplings.
pub fn coarse_texture(x: f64, y: f64) -> f64 {
    0.5 + 0.2 * (x * 0.06).sin() + 0.15 * (y * 0.05).cos() + 0.05 * ((x - y) * 0.04).sin()
}

/// The texture translated by `(dx, dy)`.
pub fn shifted(width: u32, height: u32, dx: f64, dy: f64) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        texture(x as f64 - dx, y as f64 - dy) as f32
    })
}

/// The texture pushed through the homogeneous map `matrix`.
///
/// A reference point `x` lands at `matrix * x` in the rendered frame.
pub fn warped(width: u32, height: u32, matrix: DMat3) -> GrayImage {
    let inverse = matrix.inverse();
    GrayImage::from_fn(width, height, |x, y| {
        let h = inverse * DVec3::new(x as f64, y as f64, 1.0);
        texture(h.x / h.z, h.y / h.z) as f32
    })
}

/// The coarse texture translated by `(dx, dy)`.
pub fn coarse_shifted(width: u32, height: u32, dx: f64, dy: f64) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        coarse_texture(x as f64 - dx, y as f64 - dy) as f32
    })
}
