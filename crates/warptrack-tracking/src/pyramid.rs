//! Image pyramids and coarse-to-fine alignment.

use std::collections::HashMap;

use tracing::debug;
use warptrack_core::{GrayImage, Result, TemplateRegion, TrackerError};

use crate::config::{OptimizerConfig, TemplateConfig};
use crate::optimizer::{FrameOutcome, ForwardCompositional};
use crate::template::Template;
use crate::warp::Warp;

/// One resolution level: intensities plus their spatial gradients.
#[derive(Debug, Clone)]
pub struct FrameLevel {
    pub image: GrayImage,
    pub grad_x: GrayImage,
    pub grad_y: GrayImage,
}

impl FrameLevel {
    /// Wrap an already smoothed image and compute its gradients.
    pub fn new(image: GrayImage) -> Self {
        let (grad_x, grad_y) = image.gradients();
        Self {
            image,
            grad_x,
            grad_y,
        }
    }
}

/// Multi-scale image pyramid. Level 0 is full resolution.
#[derive(Debug, Clone)]
pub struct ImagePyramid {
    pub levels: Vec<FrameLevel>,
}

impl ImagePyramid {
    /// Build up to `num_levels` levels by 2x box downsampling.
    ///
    /// Every level is smoothed with `blur_sigma` (in that level's pixels)
    /// before gradients are taken. Building stops early once a level would
    /// be smaller than 2x2.
    pub fn build(gray: &GrayImage, num_levels: u32, blur_sigma: f32) -> Self {
        let mut levels = Vec::with_capacity(num_levels as usize);
        let mut raw = gray.clone();
        for level in 0..num_levels.max(1) {
            if level > 0 {
                if raw.width < 4 || raw.height < 4 {
                    break;
                }
                raw = raw.downsample();
            }
            levels.push(FrameLevel::new(raw.gaussian_blur(blur_sigma)));
        }
        Self { levels }
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// Templates built on every level of a reference pyramid.
///
/// Masking is driven from the full-resolution template. A coarse point is
/// masked once every full-resolution point it covers is masked, and comes
/// back when one of them is unmasked.
#[derive(Debug, Clone)]
pub struct TemplatePyramid {
    levels: Vec<Template>,
    masked: Vec<bool>,
    coverage: Vec<Coverage>,
}

/// Mapping from full-resolution points onto one coarse level.
#[derive(Debug, Clone)]
struct Coverage {
    /// Coarse point index covering each full-resolution point.
    parent: Vec<Option<usize>>,
    /// Validity of each coarse point right after initialization.
    textured: Vec<bool>,
    /// Unmasked full-resolution points under each coarse point.
    unmasked: Vec<u32>,
}

impl Coverage {
    fn new(finest: &Template, coarse: &Template, level: u32) -> Self {
        let lookup: HashMap<[u32; 2], usize> = coarse
            .points()
            .iter()
            .enumerate()
            .map(|(i, p)| ([p.position.x as u32, p.position.y as u32], i))
            .collect();
        let parent: Vec<Option<usize>> = finest
            .points()
            .iter()
            .map(|p| {
                let key = [(p.position.x as u32) >> level, (p.position.y as u32) >> level];
                lookup.get(&key).copied()
            })
            .collect();
        let mut unmasked = vec![0; coarse.points().len()];
        for &i in parent.iter().flatten() {
            unmasked[i] += 1;
        }
        Self {
            parent,
            textured: coarse.points().iter().map(|p| p.valid).collect(),
            unmasked,
        }
    }
}

impl TemplatePyramid {
    /// Initialize the template on each reference level, finest first.
    ///
    /// Level 0 must succeed. A coarser level that cannot host a usable
    /// template truncates the pyramid at that depth.
    pub fn build(
        reference: &ImagePyramid,
        region: &TemplateRegion,
        warp: &dyn Warp,
        config: &TemplateConfig,
    ) -> Result<Self> {
        let mut levels: Vec<Template> = Vec::with_capacity(reference.len());
        for (index, frame) in reference.levels.iter().enumerate() {
            let scaled = region.at_level(index as u32);
            match Template::initialize(frame, &scaled, warp, config) {
                Ok(template) => levels.push(template),
                Err(e) if index == 0 => return Err(e),
                Err(e) => {
                    debug!(level = index, error = %e, "Truncating template pyramid");
                    break;
                }
            }
        }
        let Some(finest) = levels.first() else {
            return Err(TrackerError::InvalidParameter(
                "reference pyramid has no levels".to_string(),
            ));
        };
        let masked = vec![false; finest.points().len()];
        let coverage = levels
            .iter()
            .enumerate()
            .skip(1)
            .map(|(level, coarse)| Coverage::new(finest, coarse, level as u32))
            .collect();
        Ok(Self {
            levels,
            masked,
            coverage,
        })
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Template at `level`, if the pyramid reaches that deep.
    pub fn level(&self, level: usize) -> Option<&Template> {
        self.levels.get(level)
    }

    /// Full-resolution template.
    pub fn finest(&self) -> &Template {
        &self.levels[0]
    }

    /// Mask or unmask full-resolution point `index` and carry the change to
    /// the coarse levels.
    pub fn set_valid(&mut self, index: usize, valid: bool) -> Result<()> {
        let (finest, coarse) = self.levels.split_at_mut(1);
        finest[0].set_valid(index, valid)?;
        if self.masked[index] == !valid {
            return Ok(());
        }
        self.masked[index] = !valid;

        for (template, cover) in coarse.iter_mut().zip(&mut self.coverage) {
            let Some(parent) = cover.parent[index] else {
                continue;
            };
            if valid {
                cover.unmasked[parent] += 1;
                if cover.unmasked[parent] == 1 {
                    template.set_valid(parent, cover.textured[parent])?;
                }
            } else {
                cover.unmasked[parent] -= 1;
                if cover.unmasked[parent] == 0 {
                    template.set_valid(parent, false)?;
                }
            }
        }
        Ok(())
    }
}

/// Coarse-to-fine alignment.
///
/// `initial` is expressed in full-resolution coordinates. It is rescaled to
/// the coarsest level both pyramids share, refined there, and handed down one
/// level at a time. `Diverged` or `DegenerateRegion` on any level ends the
/// frame; `MaxIterationsReached` on a coarse level does not.
///
/// Fails only when either pyramid has no levels.
pub fn align_pyramid(
    warp: &dyn Warp,
    templates: &TemplatePyramid,
    live: &ImagePyramid,
    initial: &[f64],
    config: &OptimizerConfig,
    max_condition: f64,
) -> Result<FrameOutcome> {
    let depth = templates.len().min(live.len());
    if depth == 0 {
        return Err(TrackerError::InvalidParameter(format!(
            "cannot align {} template levels against {} live levels",
            templates.len(),
            live.len()
        )));
    }
    let top = depth - 1;
    let mut params = warp.rescale(initial, 1.0 / (1u32 << top) as f64);
    let mut iterations = 0;
    let mut level = top;

    loop {
        let fc = ForwardCompositional::new(warp, &templates.levels[level], config, max_condition);
        let mut outcome = fc.align(&live.levels[level], &params);
        iterations += outcome.iterations;
        debug!(level, state = ?outcome.state, iterations = outcome.iterations, "Pyramid level done");

        if outcome.state.is_failure() || level == 0 {
            if level > 0 {
                outcome.parameters = warp.rescale(&outcome.parameters, (1u32 << level) as f64);
            }
            outcome.iterations = iterations;
            outcome.level = level as u32;
            return Ok(outcome);
        }
        params = warp.rescale(&outcome.parameters, 2.0);
        level -= 1;
    }
}
