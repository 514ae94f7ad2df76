//! WarpTrack Tracking - SSD template tracking with parametric warps.
//!
//! A template is sampled once from a reference frame; each new frame is then
//! aligned with forward compositional Gauss-Newton, optionally coarse-to-fine
//! over an image pyramid.

pub mod config;
pub mod optimizer;
pub mod pyramid;
pub mod session;
pub mod solver;
pub mod template;
pub mod warp;

pub use config::{GradientSource, OptimizerConfig, TemplateConfig, TrackerConfig};
pub use optimizer::{Evaluation, ForwardCompositional, FrameOutcome, TrackingState};
pub use pyramid::{align_pyramid, FrameLevel, ImagePyramid, TemplatePyramid};
pub use session::{track_sessions, TrackingSession};
pub use solver::NormalEquations;
pub use template::{Template, TemplatePoint};
pub use warp::{
    AffineWarp, HomographyWarp, Jacobian, SimilarityWarp, TranslationWarp, Warp, WarpFamily,
    WarpParams, MAX_PARAMETERS,
};
