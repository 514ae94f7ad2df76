//! Tracking sessions: one warp, one template and one parameter vector.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, warn};
use warptrack_core::{GrayImage, Point, Result, TemplateRegion, TrackerError};

use crate::config::TrackerConfig;
use crate::optimizer::FrameOutcome;
use crate::pyramid::{align_pyramid, ImagePyramid, TemplatePyramid};
use crate::template::Template;
use crate::warp::{Warp, WarpParams};

/// State of one tracked target across frames.
///
/// Created when a region is selected, updated once per frame, dropped when
/// the target is abandoned. The warp may be shared with other sessions.
#[derive(Debug)]
pub struct TrackingSession {
    warp: Arc<dyn Warp>,
    templates: TemplatePyramid,
    config: TrackerConfig,
    parameters: WarpParams,
    last_outcome: Option<FrameOutcome>,
}

impl TrackingSession {
    /// Build the template from `reference` and start at the identity warp.
    pub fn new(
        reference: &GrayImage,
        region: impl Into<TemplateRegion>,
        warp: Arc<dyn Warp>,
        config: TrackerConfig,
    ) -> Result<Self> {
        config.validate()?;
        check_image(reference)?;
        let region = region.into();
        let pyramid = ImagePyramid::build(reference, config.pyramid_levels, config.blur_sigma);
        let templates = TemplatePyramid::build(&pyramid, &region, warp.as_ref(), &config.template)?;
        debug!(
            family = ?warp.family(),
            levels = templates.len(),
            points = templates.finest().len(),
            "Tracking session created"
        );
        let parameters = warp.identity();
        Ok(Self {
            warp,
            templates,
            config,
            parameters,
            last_outcome: None,
        })
    }

    /// Seed the session with externally supplied parameters.
    pub fn with_parameters(mut self, parameters: &[f64]) -> Result<Self> {
        self.set_parameters(parameters)?;
        Ok(self)
    }

    /// Align the template against a new frame.
    pub fn track(&mut self, image: &GrayImage) -> Result<FrameOutcome> {
        check_image(image)?;
        let live = ImagePyramid::build(image, self.config.pyramid_levels, self.config.blur_sigma);
        self.track_pyramid(&live)
    }

    /// Align against a prebuilt pyramid, e.g. one shared by several sessions.
    ///
    /// The pyramid should be built with this session's blur setting. On
    /// `Converged` or `MaxIterationsReached` the session adopts the new
    /// parameters; on failure they are left as they were.
    pub fn track_pyramid(&mut self, live: &ImagePyramid) -> Result<FrameOutcome> {
        let outcome = align_pyramid(
            self.warp.as_ref(),
            &self.templates,
            live,
            &self.parameters,
            &self.config.optimizer,
            self.config.template.max_condition_number,
        )?;
        if outcome.state.is_failure() {
            warn!(state = ?outcome.state, level = outcome.level, "Frame tracking failed");
        } else {
            self.parameters = outcome.parameters.clone();
        }
        self.last_outcome = Some(outcome.clone());
        Ok(outcome)
    }

    pub fn parameters(&self) -> &[f64] {
        &self.parameters
    }

    /// Replace the current parameters.
    pub fn set_parameters(&mut self, parameters: &[f64]) -> Result<()> {
        let expected = self.warp.parameter_count();
        if parameters.len() != expected {
            return Err(TrackerError::DimensionMismatch {
                expected,
                got: parameters.len(),
            });
        }
        if parameters.iter().any(|v| !v.is_finite()) {
            return Err(TrackerError::InvalidParameter(
                "warp parameters must be finite".to_string(),
            ));
        }
        self.parameters = parameters.iter().copied().collect();
        Ok(())
    }

    /// Return to the identity warp and forget the last outcome.
    pub fn reset(&mut self) {
        self.parameters = self.warp.identity();
        self.last_outcome = None;
    }

    pub fn warp(&self) -> &Arc<dyn Warp> {
        &self.warp
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Full-resolution template.
    pub fn template(&self) -> &Template {
        self.templates.finest()
    }

    /// Mask or unmask full-resolution template point `index`, e.g. to
    /// drop occluded pixels. Coarse levels follow.
    pub fn set_point_valid(&mut self, index: usize, valid: bool) -> Result<()> {
        self.templates.set_valid(index, valid)
    }

    pub fn templates(&self) -> &TemplatePyramid {
        &self.templates
    }

    pub fn last_outcome(&self) -> Option<&FrameOutcome> {
        self.last_outcome.as_ref()
    }

    /// Corners of the template's bounding box under the current warp.
    pub fn warped_corners(&self) -> [Point; 4] {
        self.template()
            .bounds()
            .corners()
            .map(|c| self.warp.warp_point(c, &self.parameters))
    }
}

/// Track every session against one shared, read-only pyramid in parallel.
///
/// Results come back in session order.
pub fn track_sessions(
    sessions: &mut [TrackingSession],
    live: &ImagePyramid,
) -> Vec<Result<FrameOutcome>> {
    sessions
        .par_iter_mut()
        .map(|session| session.track_pyramid(live))
        .collect()
}

fn check_image(image: &GrayImage) -> Result<()> {
    if image.width < 3 || image.height < 3 {
        return Err(TrackerError::InvalidParameter(format!(
            "image {}x{} is too small to track in",
            image.width, image.height
        )));
    }
    if image.data.len() != (image.width * image.height) as usize {
        return Err(TrackerError::InvalidParameter(format!(
            "image buffer holds {} pixels, {}x{} needs {}",
            image.data.len(),
            image.width,
            image.height,
            image.width * image.height
        )));
    }
    Ok(())
}
