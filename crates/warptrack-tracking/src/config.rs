//! Tracker configuration.
//!
//! All thresholds assume intensities normalized to [0, 1].

use serde::{Deserialize, Serialize};
use warptrack_core::{Result, TrackerError};

/// Which image gradient feeds the steepest-descent vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GradientSource {
    /// Live-image gradient at the warped point, chained through dW/dx at the
    /// current parameters and the identity Jacobian of the template point.
    #[default]
    Live,
    /// Reference steepest-descent basis computed at initialization.
    Reference,
}

/// Template construction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Keep every `sample_stride`-th pixel in x and y (1 = dense grid).
    pub sample_stride: u32,
    /// Minimum reference gradient norm for a point to be kept.
    pub gradient_threshold: f64,
    /// Largest acceptable condition number of the Jacobian-scaled Hessian.
    pub max_condition_number: f64,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            sample_stride: 1,
            gradient_threshold: 1e-3,
            max_condition_number: 1e12,
        }
    }
}

/// Per-frame iteration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub max_iterations: u32,
    /// Convergence threshold on the increment norm.
    pub epsilon: f64,
    /// Minimum fraction of template points that must stay inside the image.
    pub min_support: f64,
    /// Scale applied to each increment before composition.
    pub gain: f64,
    /// Levenberg-Marquardt style diagonal damping (0 = plain Gauss-Newton).
    pub damping: f64,
    pub gradient_source: GradientSource,
    /// Optional wall-clock budget per frame, checked between iterations.
    pub time_budget_ms: Option<u64>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            epsilon: 1e-4,
            min_support: 0.5,
            gain: 1.0,
            damping: 0.0,
            gradient_source: GradientSource::Live,
            time_budget_ms: None,
        }
    }
}

/// Complete configuration of a tracking session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Number of pyramid levels (1 = full resolution only).
    pub pyramid_levels: u32,
    /// Gaussian pre-smoothing sigma in pixels (below 0.5 disables it).
    pub blur_sigma: f32,
    pub template: TemplateConfig,
    pub optimizer: OptimizerConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            pyramid_levels: 1,
            blur_sigma: 1.0,
            template: TemplateConfig::default(),
            optimizer: OptimizerConfig::default(),
        }
    }
}

impl TrackerConfig {
    /// Reject settings the tracker cannot run with.
    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(TrackerError::InvalidParameter(msg.to_string()));
        if self.pyramid_levels == 0 || self.pyramid_levels > 16 {
            return fail("pyramid_levels must be in 1..=16");
        }
        if !self.blur_sigma.is_finite() || self.blur_sigma < 0.0 {
            return fail("blur_sigma must be a non-negative number");
        }
        if self.template.sample_stride == 0 {
            return fail("sample_stride must be at least 1");
        }
        if !(self.template.gradient_threshold >= 0.0) {
            return fail("gradient_threshold must be non-negative");
        }
        if !(self.template.max_condition_number > 1.0) {
            return fail("max_condition_number must exceed 1");
        }
        let opt = &self.optimizer;
        if opt.max_iterations == 0 {
            return fail("max_iterations must be at least 1");
        }
        if !(opt.epsilon > 0.0) {
            return fail("epsilon must be positive");
        }
        if !(opt.min_support > 0.0 && opt.min_support <= 1.0) {
            return fail("min_support must be in (0, 1]");
        }
        if !(opt.gain > 0.0) {
            return fail("gain must be positive");
        }
        if !(opt.damping >= 0.0) {
            return fail("damping must be non-negative");
        }
        Ok(())
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| TrackerError::Serialization(format!("Failed to serialize config: {}", e)))
    }

    /// Parse and validate a JSON configuration. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| TrackerError::Serialization(format!("Invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}
