//! Integration tests for frame-to-frame tracking of synthetic sequences.
//!
//! Exercises warptrack-core images and regions through a full
//! warptrack-tracking session: template capture, per-frame alignment,
//! parameter hand-over between frames.

use warptrack_core::{Point, Rect, TemplateRegion};
use warptrack_tracking::{TrackerConfig, TrackingSession, TrackingState, WarpFamily};

use crate::common::{init_tracing, shifted};

const SIZE: u32 = 128;

// ── Helpers ────────────────────────────────────────────────────

fn region() -> Rect {
    Rect::new(40.0, 40.0, 40.0, 40.0)
}

fn session(family: WarpFamily, config: TrackerConfig) -> TrackingSession {
    TrackingSession::new(&shifted(SIZE, SIZE, 0.0, 0.0), region(), family.build(), config)
        .unwrap()
}

/// Cumulative shifts of a slow drift, at most 1.5 px per frame.
fn drift() -> Vec<(f64, f64)> {
    vec![
        (1.0, 0.0),
        (2.0, 1.0),
        (3.0, 1.0),
        (4.0, 2.0),
        (4.0, 3.0),
        (3.0, 4.0),
    ]
}

// ── Identity & convergence ─────────────────────────────────────

#[test]
fn reference_frame_converges_in_one_iteration() {
    init_tracing();
    for family in [
        WarpFamily::Translation,
        WarpFamily::Similarity,
        WarpFamily::Affine,
        WarpFamily::Homography,
    ] {
        let mut s = session(family, TrackerConfig::default());
        let outcome = s.track(&shifted(SIZE, SIZE, 0.0, 0.0)).unwrap();
        assert_eq!(outcome.state, TrackingState::Converged, "{:?}", family);
        assert_eq!(outcome.iterations, 1, "{:?}", family);
        assert!(outcome.cost < 1e-20, "{:?}: cost {}", family, outcome.cost);
        assert_eq!(outcome.support, 1.0);
        assert!(s.parameters().iter().all(|v| v.abs() < 1e-12));
    }
}

#[test]
fn translation_sequence_is_followed() {
    init_tracing();
    let mut s = session(WarpFamily::Translation, TrackerConfig::default());
    for (dx, dy) in drift() {
        let outcome = s.track(&shifted(SIZE, SIZE, dx, dy)).unwrap();
        assert_eq!(outcome.state, TrackingState::Converged);
        assert!((s.parameters()[0] - dx).abs() < 1e-2, "{:?}", s.parameters());
        assert!((s.parameters()[1] - dy).abs() < 1e-2, "{:?}", s.parameters());
    }
}

#[test]
fn richer_families_follow_pure_translation() {
    init_tracing();
    for family in [WarpFamily::Similarity, WarpFamily::Affine, WarpFamily::Homography] {
        let mut s = session(family, TrackerConfig::default());
        for (dx, dy) in drift() {
            let outcome = s.track(&shifted(SIZE, SIZE, dx, dy)).unwrap();
            assert!(!outcome.state.is_failure(), "{:?}: {:?}", family, outcome.state);

            let offset = Point::new(dx, dy);
            for (got, corner) in s.warped_corners().iter().zip(region().corners()) {
                assert!(
                    (*got - (corner + offset)).length() < 2e-2,
                    "{:?}: corner {:?} tracked to {:?}",
                    family,
                    corner,
                    got
                );
            }
        }
    }
}

#[test]
fn cost_does_not_increase_while_converging() {
    init_tracing();
    let mut s = session(WarpFamily::Translation, TrackerConfig::default());
    let outcome = s.track(&shifted(SIZE, SIZE, 2.0, 1.0)).unwrap();
    assert_eq!(outcome.state, TrackingState::Converged);
    assert!(outcome.cost_history.len() >= 2);
    assert!(outcome.cost_history[0] > outcome.cost);
    for pair in outcome.cost_history.windows(2).skip(1) {
        assert!(
            pair[1] <= pair[0] * (1.0 + 1e-9) + 1e-15,
            "cost rose: {:?}",
            outcome.cost_history
        );
    }
}

// ── Regions & configuration ────────────────────────────────────

#[test]
fn sparse_point_region_with_masking() {
    init_tracing();
    let points: Vec<[u32; 2]> = (45..75)
        .step_by(2)
        .flat_map(|y| (45..75).step_by(2).map(move |x| [x, y]))
        .collect();
    let mut s = TrackingSession::new(
        &shifted(SIZE, SIZE, 0.0, 0.0),
        TemplateRegion::Points(points),
        WarpFamily::Translation.build(),
        TrackerConfig::default(),
    )
    .unwrap();
    assert_eq!(s.template().points().len(), 15 * 15);

    let before = s.template().len();
    s.set_point_valid(0, false).unwrap();
    assert_eq!(s.template().len(), before - 1);

    let outcome = s.track(&shifted(SIZE, SIZE, 1.0, -1.0)).unwrap();
    assert_eq!(outcome.state, TrackingState::Converged);
    assert!((s.parameters()[0] - 1.0).abs() < 1e-2);
    assert!((s.parameters()[1] + 1.0).abs() < 1e-2);
}

#[test]
fn strided_template_still_tracks() {
    init_tracing();
    let mut config = TrackerConfig::default();
    config.template.sample_stride = 3;
    let mut s = session(WarpFamily::Affine, config);
    assert_eq!(s.template().points().len(), 14 * 14);

    let outcome = s.track(&shifted(SIZE, SIZE, 1.0, 1.0)).unwrap();
    assert!(!outcome.state.is_failure());
    assert!((s.parameters()[4] - 1.0).abs() < 1e-2);
    assert!((s.parameters()[5] - 1.0).abs() < 1e-2);
}

#[test]
fn config_from_json_drives_a_session() {
    init_tracing();
    let config = TrackerConfig::from_json(
        r#"{ "blur_sigma": 0.0, "optimizer": { "max_iterations": 30, "gradient_source": "Reference" } }"#,
    )
    .unwrap();
    assert_eq!(config.optimizer.max_iterations, 30);
    assert_eq!(config.pyramid_levels, 1);

    let mut s = session(WarpFamily::Translation, config);
    let outcome = s.track(&shifted(SIZE, SIZE, 1.0, 0.0)).unwrap();
    assert_eq!(outcome.state, TrackingState::Converged);
    assert!((s.parameters()[0] - 1.0).abs() < 1e-2);

    let json = s.config().to_json().unwrap();
    let back: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(back["optimizer"]["gradient_source"], "Reference");
}

#[test]
fn exhausted_time_budget_reports_max_iterations() {
    init_tracing();
    let mut config = TrackerConfig::default();
    config.optimizer.time_budget_ms = Some(0);
    let mut s = session(WarpFamily::Translation, config);

    let outcome = s.track(&shifted(SIZE, SIZE, 3.0, 0.0)).unwrap();
    assert_eq!(outcome.state, TrackingState::MaxIterationsReached);
    assert_eq!(outcome.iterations, 1);
    // Best-effort parameters are adopted.
    assert!(s.parameters()[0] > 0.5);
}
