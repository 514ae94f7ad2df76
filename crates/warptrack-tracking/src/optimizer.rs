//! Forward compositional SSD alignment.
//!
//! Each iteration warps the template grid by the current parameters, samples
//! the live image, rebuilds the Gauss-Newton system from scratch, solves for
//! an increment and composes it into the parameters:
//! `W(x; p) <- W(W(x; dp); p)`.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use warptrack_core::ImageSampler;

use crate::config::{GradientSource, OptimizerConfig};
use crate::pyramid::FrameLevel;
use crate::solver::NormalEquations;
use crate::template::Template;
use crate::warp::{Warp, WarpParams, MAX_PARAMETERS};

/// Terminal state of one frame's alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingState {
    /// The increment norm fell below epsilon.
    Converged,
    /// Too few template points remained inside the image.
    Diverged,
    /// The iteration cap or time budget ran out first.
    MaxIterationsReached,
    /// The Hessian was singular or too ill-conditioned to solve.
    DegenerateRegion,
}

impl TrackingState {
    /// Whether the frame's tracking attempt failed outright.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Diverged | Self::DegenerateRegion)
    }
}

/// Result of aligning one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameOutcome {
    /// Final parameters, in full-resolution coordinates.
    pub parameters: WarpParams,
    pub state: TrackingState,
    /// Sum of squared residuals at `parameters`.
    pub cost: f64,
    /// Fraction of valid template points inside the image at `parameters`.
    pub support: f64,
    /// Iterations run, summed over pyramid levels.
    pub iterations: u32,
    /// Pyramid level the frame finished on (0 = full resolution).
    pub level: u32,
    /// Cost at the start of every iteration on the finishing level.
    pub cost_history: Vec<f64>,
}

/// SSD and support of a parameter vector against one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub cost: f64,
    pub retained: usize,
}

/// Forward compositional Gauss-Newton on the SSD criterion.
pub struct ForwardCompositional<'a> {
    warp: &'a dyn Warp,
    template: &'a Template,
    config: &'a OptimizerConfig,
    max_condition: f64,
}

impl<'a> ForwardCompositional<'a> {
    pub fn new(
        warp: &'a dyn Warp,
        template: &'a Template,
        config: &'a OptimizerConfig,
        max_condition: f64,
    ) -> Self {
        Self {
            warp,
            template,
            config,
            max_condition,
        }
    }

    /// Support fraction for a number of retained points.
    fn support(&self, retained: usize) -> f64 {
        if self.template.is_empty() {
            0.0
        } else {
            retained as f64 / self.template.len() as f64
        }
    }

    /// SSD of the template against `frame` under `params`, without derivatives.
    pub fn evaluate(&self, frame: &FrameLevel, params: &[f64]) -> Evaluation {
        let mut cost = 0.0;
        let mut retained = 0;
        for i in self.template.valid_indices() {
            let point = &self.template.points()[i];
            let q = self.warp.warp_point(point.position, params);
            if let Some(live) = frame.image.intensity(q.x, q.y) {
                let r = live - point.intensity;
                cost += r * r;
                retained += 1;
            }
        }
        Evaluation { cost, retained }
    }

    /// Build the normal equations at `params`.
    ///
    /// Points warped outside the image are skipped for this call only.
    fn linearize(&self, frame: &FrameLevel, params: &[f64]) -> (NormalEquations, Evaluation) {
        let n = self.warp.parameter_count();
        let mut normal = NormalEquations::new(n);
        let mut cost = 0.0;
        let mut retained = 0;
        let mut sd = [0.0; MAX_PARAMETERS];

        for i in self.template.valid_indices() {
            let point = &self.template.points()[i];
            let q = self.warp.warp_point(point.position, params);
            let Some(live) = frame.image.intensity(q.x, q.y) else {
                continue;
            };
            let r = live - point.intensity;
            cost += r * r;
            retained += 1;

            match self.config.gradient_source {
                GradientSource::Live => {
                    // Gradient of I(W(x; p)) with respect to x, chained
                    // through dW/dp at the identity.
                    let g = glam::DVec2::new(
                        frame.grad_x.bilinear(q.x, q.y),
                        frame.grad_y.bilinear(q.x, q.y),
                    );
                    let a = self.warp.spatial_jacobian(point.position, params);
                    let row = a.transpose() * g;
                    let jac = self.template.jacobian(i);
                    for k in 0..n {
                        sd[k] = row.x * jac[0][k] + row.y * jac[1][k];
                    }
                }
                GradientSource::Reference => {
                    sd[..n].copy_from_slice(self.template.steepest_descent(i));
                }
            }
            normal.accumulate(&sd[..n], r);
        }
        (normal, Evaluation { cost, retained })
    }

    /// Iterate from `initial` until a terminal state is reached.
    pub fn align(&self, frame: &FrameLevel, initial: &[f64]) -> FrameOutcome {
        let started = Instant::now();
        let budget = self.config.time_budget_ms.map(Duration::from_millis);
        let mut params: WarpParams = initial.iter().copied().collect();
        let mut history = Vec::new();
        let mut iterations = 0;

        while iterations < self.config.max_iterations {
            if iterations > 0 && budget.is_some_and(|b| started.elapsed() >= b) {
                debug!(iterations, "Time budget exhausted");
                break;
            }
            iterations += 1;

            let (normal, eval) = self.linearize(frame, &params);
            let support = self.support(eval.retained);
            history.push(eval.cost);

            if eval.retained == 0 || support < self.config.min_support {
                warn!(iterations, support, "Template support collapsed");
                return self.finish(params, TrackingState::Diverged, eval, iterations, history);
            }

            let solved = normal.solve(
                self.template.parameter_scales(),
                self.config.damping,
                self.max_condition,
            );
            let mut increment = match solved {
                Ok(dp) => dp,
                Err(e) => {
                    warn!(iterations, error = %e, "Normal equations are degenerate");
                    return self.finish(
                        params,
                        TrackingState::DegenerateRegion,
                        eval,
                        iterations,
                        history,
                    );
                }
            };
            for v in &mut increment {
                *v *= self.config.gain;
            }

            let next = self.warp.compose(&params, &increment);
            if next.iter().any(|v| !v.is_finite()) {
                warn!(iterations, "Composed parameters are not finite");
                return self.finish(
                    params,
                    TrackingState::DegenerateRegion,
                    eval,
                    iterations,
                    history,
                );
            }
            params = next;

            let norm = increment.iter().map(|v| v * v).sum::<f64>().sqrt();
            trace!(iterations, cost = eval.cost, support, norm, "Iteration");
            if norm < self.config.epsilon {
                let after = self.evaluate(frame, &params);
                let state = if self.support(after.retained) < self.config.min_support {
                    TrackingState::Diverged
                } else {
                    TrackingState::Converged
                };
                return self.finish(params, state, after, iterations, history);
            }
        }

        let after = self.evaluate(frame, &params);
        let state = if after.retained == 0 || self.support(after.retained) < self.config.min_support
        {
            TrackingState::Diverged
        } else {
            TrackingState::MaxIterationsReached
        };
        self.finish(params, state, after, iterations, history)
    }

    fn finish(
        &self,
        parameters: WarpParams,
        state: TrackingState,
        eval: Evaluation,
        iterations: u32,
        cost_history: Vec<f64>,
    ) -> FrameOutcome {
        let support = self.support(eval.retained);
        debug!(?state, iterations, cost = eval.cost, support, "Alignment finished");
        FrameOutcome {
            parameters,
            state,
            cost: eval.cost,
            support,
            iterations,
            level: 0,
            cost_history,
        }
    }
}
