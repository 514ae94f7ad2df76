//! Integration tests for the failure taxonomy.
//!
//! Initialization failures come back as `TrackerError`; per-frame failures
//! come back as a `FrameOutcome` state and leave the session usable.

use warptrack_core::{GrayImage, Rect, TrackerError};
use warptrack_tracking::{TrackerConfig, TrackingSession, TrackingState, WarpFamily};

use crate::common::{init_tracing, shifted};

const SIZE: u32 = 128;

const ALL_FAMILIES: [WarpFamily; 4] = [
    WarpFamily::Translation,
    WarpFamily::Similarity,
    WarpFamily::Affine,
    WarpFamily::Homography,
];

// ── Helpers ────────────────────────────────────────────────────

fn unblurred() -> TrackerConfig {
    TrackerConfig {
        blur_sigma: 0.0,
        ..Default::default()
    }
}

fn translation_session() -> TrackingSession {
    TrackingSession::new(
        &shifted(SIZE, SIZE, 0.0, 0.0),
        Rect::new(40.0, 40.0, 40.0, 40.0),
        WarpFamily::Translation.build(),
        TrackerConfig::default(),
    )
    .unwrap()
}

// ── Initialization ─────────────────────────────────────────────

#[test]
fn uniform_patch_is_an_empty_region() {
    init_tracing();
    let flat = GrayImage::from_fn(64, 64, |_, _| 0.3);
    for family in ALL_FAMILIES {
        let err = TrackingSession::new(
            &flat,
            Rect::new(10.0, 10.0, 30.0, 30.0),
            family.build(),
            unblurred(),
        )
        .unwrap_err();
        assert_eq!(err, TrackerError::EmptyRegion, "{:?}", family);
    }
}

#[test]
fn vertical_stripes_are_degenerate() {
    init_tracing();
    let stripes = GrayImage::from_fn(64, 64, |x, _| 0.5 + 0.3 * (x as f32 * 0.4).sin());
    for family in ALL_FAMILIES {
        let err = TrackingSession::new(
            &stripes,
            Rect::new(10.0, 10.0, 30.0, 30.0),
            family.build(),
            unblurred(),
        )
        .unwrap_err();
        assert!(
            matches!(err, TrackerError::DegenerateRegion { .. }),
            "{:?}: {:?}",
            family,
            err
        );
    }
}

#[test]
fn region_outside_the_image_is_empty() {
    init_tracing();
    let err = TrackingSession::new(
        &shifted(SIZE, SIZE, 0.0, 0.0),
        Rect::new(500.0, 500.0, 20.0, 20.0),
        WarpFamily::Affine.build(),
        TrackerConfig::default(),
    )
    .unwrap_err();
    assert_eq!(err, TrackerError::EmptyRegion);
}

#[test]
fn invalid_configuration_is_rejected() {
    assert!(matches!(
        TrackerConfig::from_json(r#"{ "pyramid_levels": 0 }"#),
        Err(TrackerError::InvalidParameter(_))
    ));
    assert!(matches!(
        TrackerConfig::from_json("{ not json"),
        Err(TrackerError::Serialization(_))
    ));
}

// ── Per-frame failures ─────────────────────────────────────────

#[test]
fn template_warped_off_the_image_diverges() {
    init_tracing();
    let mut s = translation_session();
    s.set_parameters(&[200.0, 0.0]).unwrap();

    let outcome = s.track(&shifted(SIZE, SIZE, 0.0, 0.0)).unwrap();
    assert_eq!(outcome.state, TrackingState::Diverged);
    assert_eq!(outcome.support, 0.0);
    assert_eq!(s.parameters(), &[200.0, 0.0]);
}

#[test]
fn support_below_threshold_diverges() {
    init_tracing();
    // Columns 40..=79 land on 110..=149; fewer than half stay inside.
    let mut s = translation_session();
    s.set_parameters(&[70.0, 0.0]).unwrap();

    let outcome = s.track(&shifted(SIZE, SIZE, 0.0, 0.0)).unwrap();
    assert_eq!(outcome.state, TrackingState::Diverged);
    assert_eq!(outcome.iterations, 1);
    assert!(outcome.support > 0.3 && outcome.support < 0.5);
}

#[test]
fn featureless_frame_fails_then_session_recovers() {
    init_tracing();
    let mut s = translation_session();
    let blank = GrayImage::from_fn(SIZE, SIZE, |_, _| 0.5);

    let outcome = s.track(&blank).unwrap();
    assert_eq!(outcome.state, TrackingState::DegenerateRegion);
    assert_eq!(s.parameters(), &[0.0, 0.0]);
    assert_eq!(s.last_outcome().map(|o| o.state), Some(TrackingState::DegenerateRegion));

    let outcome = s.track(&shifted(SIZE, SIZE, 1.0, 0.0)).unwrap();
    assert_eq!(outcome.state, TrackingState::Converged);
    assert!((s.parameters()[0] - 1.0).abs() < 1e-2);
}

#[test]
fn bad_inputs_are_errors_not_outcomes() {
    init_tracing();
    let mut s = translation_session();
    assert_eq!(
        s.set_parameters(&[0.0; 6]),
        Err(TrackerError::DimensionMismatch {
            expected: 2,
            got: 6
        })
    );

    let truncated = GrayImage {
        data: vec![0.5; 10],
        width: 8,
        height: 8,
    };
    assert!(matches!(
        s.track(&truncated),
        Err(TrackerError::InvalidParameter(_))
    ));
    assert!(s.last_outcome().is_none());
}
