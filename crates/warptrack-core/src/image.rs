//! Grayscale intensity fields and sub-pixel sampling.

use crate::error::{Result, TrackerError};

/// Read-only access to a 2D intensity field at real-valued coordinates.
///
/// A coordinate is inside the field iff `0 <= x <= width - 1` and
/// `0 <= y <= height - 1`. Samples outside are rejected with `None`.
pub trait ImageSampler {
    /// Width and height in pixels.
    fn dimensions(&self) -> (u32, u32);

    /// Bilinearly interpolated intensity, or `None` outside the field.
    fn intensity(&self, x: f64, y: f64) -> Option<f64>;

    /// Whether `(x, y)` can be sampled. Non-finite coordinates never can.
    #[inline]
    fn contains(&self, x: f64, y: f64) -> bool {
        let (w, h) = self.dimensions();
        x >= 0.0 && y >= 0.0 && x <= w as f64 - 1.0 && y <= h as f64 - 1.0
    }
}

/// A grayscale image stored as f32 values [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct GrayImage {
    pub data: Vec<f32>,
    pub width: u32,
    pub height: u32,
}

impl GrayImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![0.0; (width * height) as usize],
            width,
            height,
        }
    }

    /// Build an image by evaluating `f(x, y)` at every pixel.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> f32) -> Self {
        let mut data = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            data,
            width,
            height,
        }
    }

    /// Convert 8-bit grayscale rows to an image.
    pub fn from_gray8(pixels: &[u8], width: u32, height: u32) -> Result<Self> {
        let size = (width * height) as usize;
        if pixels.len() < size {
            return Err(TrackerError::InvalidParameter(format!(
                "gray8 buffer holds {} bytes, {}x{} needs {}",
                pixels.len(),
                width,
                height,
                size
            )));
        }
        let data = pixels[..size].iter().map(|&p| p as f32 / 255.0).collect();
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Convert RGBA u8 frame data to a grayscale image.
    pub fn from_rgba(rgba: &[u8], width: u32, height: u32) -> Result<Self> {
        let size = (width * height) as usize;
        if rgba.len() < size * 4 {
            return Err(TrackerError::InvalidParameter(format!(
                "rgba buffer holds {} bytes, {}x{} needs {}",
                rgba.len(),
                width,
                height,
                size * 4
            )));
        }
        let data = rgba
            .chunks_exact(4)
            .take(size)
            .map(|px| (0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32) / 255.0)
            .collect();
        Ok(Self {
            data,
            width,
            height,
        })
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Pixel value with coordinates clamped to the image border.
    #[inline]
    pub fn get(&self, x: i32, y: i32) -> f32 {
        let x = x.clamp(0, self.width as i32 - 1) as u32;
        let y = y.clamp(0, self.height as i32 - 1) as u32;
        self.data[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, val: f32) {
        if x < self.width && y < self.height {
            self.data[(y * self.width + x) as usize] = val;
        }
    }

    /// Pixel value at an in-bounds integer coordinate.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> f32 {
        self.data[(y * self.width + x) as usize]
    }

    /// Bilinear interpolation for a coordinate already known to be inside.
    ///
    /// Weights come from the fractional part of the coordinate. On the last
    /// row or column the missing neighbour has zero weight.
    #[inline]
    pub fn bilinear(&self, x: f64, y: f64) -> f64 {
        let x0 = (x.max(0.0) as u32).min(self.width - 1);
        let y0 = (y.max(0.0) as u32).min(self.height - 1);
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let fx = x - x0 as f64;
        let fy = y - y0 as f64;

        let p00 = self.pixel(x0, y0) as f64;
        let p10 = self.pixel(x1, y0) as f64;
        let p01 = self.pixel(x0, y1) as f64;
        let p11 = self.pixel(x1, y1) as f64;

        let top = p00 + (p10 - p00) * fx;
        let bottom = p01 + (p11 - p01) * fx;
        top + (bottom - top) * fy
    }

    /// Spatial gradients (Ix, Iy) using central differences.
    ///
    /// The one-pixel border has no central difference and is left at zero.
    pub fn gradients(&self) -> (GrayImage, GrayImage) {
        let mut ix = GrayImage::new(self.width, self.height);
        let mut iy = GrayImage::new(self.width, self.height);
        for y in 1..(self.height as i32 - 1) {
            for x in 1..(self.width as i32 - 1) {
                let idx = (y as u32 * self.width + x as u32) as usize;
                ix.data[idx] = (self.get(x + 1, y) - self.get(x - 1, y)) * 0.5;
                iy.data[idx] = (self.get(x, y + 1) - self.get(x, y - 1)) * 0.5;
            }
        }
        (ix, iy)
    }

    /// Halve the resolution with a 2x2 box filter.
    pub fn downsample(&self) -> GrayImage {
        let nw = self.width.div_ceil(2);
        let nh = self.height.div_ceil(2);
        let mut level = GrayImage::new(nw, nh);
        for y in 0..nh {
            for x in 0..nw {
                let sx = (x * 2) as i32;
                let sy = (y * 2) as i32;
                let avg = (self.get(sx, sy)
                    + self.get(sx + 1, sy)
                    + self.get(sx, sy + 1)
                    + self.get(sx + 1, sy + 1))
                    * 0.25;
                level.set(x, y, avg);
            }
        }
        level
    }

    /// Separable Gaussian smoothing with clamped borders.
    ///
    /// Sigmas below half a pixel return an unmodified copy.
    pub fn gaussian_blur(&self, sigma: f32) -> GrayImage {
        if sigma < 0.5 || self.is_empty() {
            return self.clone();
        }
        let kernel = gaussian_kernel(sigma);
        let radius = (kernel.len() / 2) as i32;

        let mut horizontal = GrayImage::new(self.width, self.height);
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let mut sum = 0.0f32;
                for (k, w) in kernel.iter().enumerate() {
                    sum += self.get(x + k as i32 - radius, y) * w;
                }
                horizontal.set(x as u32, y as u32, sum);
            }
        }

        let mut out = GrayImage::new(self.width, self.height);
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let mut sum = 0.0f32;
                for (k, w) in kernel.iter().enumerate() {
                    sum += horizontal.get(x, y + k as i32 - radius) * w;
                }
                out.set(x as u32, y as u32, sum);
            }
        }
        out
    }
}

impl ImageSampler for GrayImage {
    #[inline]
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    fn intensity(&self, x: f64, y: f64) -> Option<f64> {
        if self.contains(x, y) {
            Some(self.bilinear(x, y))
        } else {
            None
        }
    }
}

/// Normalized 1D Gaussian taps covering three sigmas on each side.
fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (sigma * 3.0).ceil() as i32;
    let sigma2 = 2.0 * sigma * sigma;
    let mut taps: Vec<f32> = (-radius..=radius)
        .map(|k| (-((k * k) as f32) / sigma2).exp())
        .collect();
    let total: f32 = taps.iter().sum();
    for t in &mut taps {
        *t /= total;
    }
    taps
}
