//! WarpTrack Core - Foundation types for template tracking
//!
//! This crate provides the collaborators the tracker consumes:
//! - Grayscale intensity fields and bilinear sampling
//! - Geometric carriers for template footprints
//! - The error taxonomy shared by every tracking crate

pub mod error;
pub mod geometry;
pub mod image;

pub use error::{Result, TrackerError};
pub use geometry::{Point, Rect, TemplateRegion};
pub use image::{GrayImage, ImageSampler};
