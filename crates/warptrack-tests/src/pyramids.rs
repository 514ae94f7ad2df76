//! Integration tests for coarse-to-fine tracking and for several sessions
//! sharing one live pyramid.

use std::sync::Arc;

use warptrack_core::{Point, Rect};
use warptrack_tracking::{
    track_sessions, ImagePyramid, TrackerConfig, TrackingSession, TrackingState, WarpFamily,
};

use crate::common::{coarse_shifted, init_tracing, shifted};

// ── Coarse-to-fine ─────────────────────────────────────────────

#[test]
fn pyramid_recovers_motion_beyond_single_level_reach() {
    init_tracing();
    let config = TrackerConfig {
        pyramid_levels: 3,
        ..Default::default()
    };
    let mut s = TrackingSession::new(
        &coarse_shifted(200, 200, 0.0, 0.0),
        Rect::new(60.0, 60.0, 80.0, 80.0),
        WarpFamily::Translation.build(),
        config,
    )
    .unwrap();
    assert_eq!(s.templates().len(), 3);

    let outcome = s.track(&coarse_shifted(200, 200, 10.0, -7.0)).unwrap();
    assert_eq!(outcome.state, TrackingState::Converged);
    assert_eq!(outcome.level, 0);
    assert!((s.parameters()[0] - 10.0).abs() < 1e-2, "{:?}", s.parameters());
    assert!((s.parameters()[1] + 7.0).abs() < 1e-2, "{:?}", s.parameters());
}

#[test]
fn small_regions_truncate_the_template_pyramid() {
    init_tracing();
    let config = TrackerConfig {
        pyramid_levels: 6,
        ..Default::default()
    };
    let s = TrackingSession::new(
        &coarse_shifted(200, 200, 0.0, 0.0),
        Rect::new(90.0, 90.0, 24.0, 24.0),
        WarpFamily::Translation.build(),
        config,
    )
    .unwrap();
    assert!(s.templates().len() < 6);
    assert!(s.templates().level(0).is_some());
    assert!(s.templates().level(5).is_none());
}

// ── Shared pyramid ─────────────────────────────────────────────

#[test]
fn sessions_track_in_parallel_against_one_pyramid() {
    init_tracing();
    let reference = shifted(160, 160, 0.0, 0.0);
    let targets = [
        (WarpFamily::Translation, Rect::new(20.0, 20.0, 40.0, 40.0)),
        (WarpFamily::Similarity, Rect::new(90.0, 30.0, 40.0, 40.0)),
        (WarpFamily::Affine, Rect::new(40.0, 90.0, 50.0, 40.0)),
        (WarpFamily::Homography, Rect::new(95.0, 95.0, 45.0, 45.0)),
    ];
    let mut sessions: Vec<TrackingSession> = targets
        .iter()
        .map(|&(family, rect)| {
            TrackingSession::new(&reference, rect, family.build(), TrackerConfig::default())
                .unwrap()
        })
        .collect();

    let live = ImagePyramid::build(&shifted(160, 160, 1.0, -1.0), 1, 1.0);
    let results = track_sessions(&mut sessions, &live);
    assert_eq!(results.len(), targets.len());

    let offset = Point::new(1.0, -1.0);
    for ((session, result), (family, rect)) in sessions.iter().zip(results).zip(targets) {
        let outcome = result.unwrap();
        assert!(!outcome.state.is_failure(), "{:?}: {:?}", family, outcome.state);
        for (got, corner) in session.warped_corners().iter().zip(rect.corners()) {
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

#[test]
fn one_warp_serves_many_sessions() {
    init_tracing();
    let warp = WarpFamily::Affine.build();
    let reference = shifted(160, 160, 0.0, 0.0);
    let mut sessions: Vec<TrackingSession> = (0..3)
        .map(|i| {
            TrackingSession::new(
                &reference,
                Rect::new(20.0 + 40.0 * i as f64, 50.0, 35.0, 35.0),
                Arc::clone(&warp),
                TrackerConfig::default(),
            )
            .unwrap()
        })
        .collect();
    assert_eq!(Arc::strong_count(&warp), 4);

    let live = ImagePyramid::build(&shifted(160, 160, -1.0, 0.0), 1, 1.0);
    for result in track_sessions(&mut sessions, &live) {
        assert!(!result.unwrap().state.is_failure());
    }
    for session in &sessions {
        assert!((session.parameters()[4] + 1.0).abs() < 1e-2);
        assert!(session.parameters()[5].abs() < 1e-2);
    }
}
