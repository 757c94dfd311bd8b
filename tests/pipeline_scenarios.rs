mod common;

use std::f64::consts::PI;

use common::fixtures::{blink_pattern, face_points, FaceParams, FrameClock};
use engagement_monitor::signals::geometry::NOSE_TIP;
use engagement_monitor::signals::{
    EngagementLevel, EngagementResult, LandmarkFrame, Pipeline, PipelineConfig,
};

fn running_pipeline() -> Pipeline {
    let mut pipeline = Pipeline::new(PipelineConfig::default()).expect("default config is valid");
    pipeline.start().expect("start pipeline");
    pipeline
}

fn process(pipeline: &mut Pipeline, frame: &LandmarkFrame) -> EngagementResult {
    pipeline.process_frame(frame).expect("frame accepted")
}

#[test]
fn steady_attentive_face_is_stable() {
    let mut pipeline = running_pipeline();
    let mut clock = FrameClock::new(30.0);

    for _ in 0..300 {
        let r = process(&mut pipeline, &clock.face(FaceParams::default()));
        assert_eq!(r.blink_count, 0);
        assert!(!r.is_blinking && !r.is_sleeping && !r.is_tilted);
        assert!(r.eye_contact);
        assert!(!r.head_nod && !r.head_shake);
        assert!(r.confusion_score < 1e-9);
        assert!((r.engagement_score - 85.0).abs() < 1e-9);
        assert_eq!(r.engagement_level, EngagementLevel::High);
    }
    assert_eq!(pipeline.frames_processed(), 300);
    assert_eq!(pipeline.dropped_frames(), 0);
}

#[test]
fn sleep_latches_exactly_at_duration() {
    let mut pipeline = running_pipeline();
    let mut clock = FrameClock::new(30.0);

    for _ in 0..200 {
        let frame = clock.face(FaceParams::closed());
        let r = process(&mut pipeline, &frame);
        assert_eq!(
            r.is_sleeping,
            frame.timestamp_ms >= 5000.0,
            "at {} ms",
            frame.timestamp_ms
        );
    }

    let r = process(&mut pipeline, &clock.face(FaceParams::default()));
    assert!(!r.is_sleeping);
    assert_eq!(r.blink_count, 1);
}

#[test]
fn short_tilt_then_recovery_never_tilts() {
    let mut pipeline = running_pipeline();
    let mut clock = FrameClock::new(30.0);

    for _ in 0..75 {
        let r = process(&mut pipeline, &clock.face(FaceParams::tilted(25.0)));
        assert!((r.tilt_angle_deg - 25.0).abs() < 1e-6);
        assert!(!r.is_tilted);
    }
    for _ in 0..60 {
        assert!(!process(&mut pipeline, &clock.face(FaceParams::default())).is_tilted);
    }
}

#[test]
fn sustained_tilt_latches_and_clears_on_recovery() {
    let mut pipeline = running_pipeline();
    let mut clock = FrameClock::new(30.0);

    for _ in 0..120 {
        let frame = clock.face(FaceParams::tilted(-20.0));
        let r = process(&mut pipeline, &frame);
        assert_eq!(r.is_tilted, frame.timestamp_ms >= 3000.0);
    }
    assert!(!process(&mut pipeline, &clock.face(FaceParams::default())).is_tilted);
}

#[test]
fn sub_deadzone_nose_jitter_never_gestures() {
    let mut pipeline = running_pipeline();
    let mut clock = FrameClock::new(60.0);

    for _ in 0..600 {
        let r = process(
            &mut pipeline,
            &clock.face_with(|ts| {
                let s = (2.0 * PI * 3.0 * ts / 1000.0).sin();
                FaceParams::nose(0.001 * s, 0.001 * s)
            }),
        );
        assert!(!r.head_nod && !r.head_shake);
        let sizes = pipeline.window_sizes();
        assert_eq!(sizes.nod_reversals, 0);
        assert_eq!(sizes.shake_reversals, 0);
    }
}

#[test]
fn sub_deadzone_nod_starting_at_a_peak_never_gestures() {
    let deadzone = PipelineConfig::default().gesture.deadzone;
    let mut pipeline = running_pipeline();
    let mut clock = FrameClock::new(30.0);

    // 0.6 is the face box height, so the normalised amplitude is 0.75 * deadzone
    let raw_amplitude = 0.75 * deadzone * 0.6;
    for _ in 0..180 {
        let r = process(
            &mut pipeline,
            &clock.face_with(|ts| {
                FaceParams::nose(0.0, raw_amplitude * (2.0 * PI * 2.0 * ts / 1000.0).cos())
            }),
        );
        assert!(!r.head_nod, "nod at {} ms", r.timestamp_ms);
        assert_eq!(pipeline.window_sizes().nod_reversals, 0);
    }
    assert_eq!(pipeline.accumulator().summary().nod_count, 0);
}

#[test]
fn nodding_triggers_without_retrigger_in_cooldown() {
    let config = PipelineConfig::default();
    let cooldown_ms = config.gesture.cooldown_sec * 1000.0;
    let mut pipeline = running_pipeline();
    let mut clock = FrameClock::new(30.0);

    let mut nods = Vec::new();
    for _ in 0..150 {
        let frame = clock.face_with(|ts| {
            FaceParams::nose(0.0, 0.03 * (2.0 * PI * 2.0 * ts / 1000.0).sin())
        });
        let r = process(&mut pipeline, &frame);
        assert!(!r.head_shake, "vertical motion read as shake");
        if r.head_nod {
            nods.push(r.timestamp_ms);
        }
    }

    assert!(!nods.is_empty(), "nod never detected");
    for pair in nods.windows(2) {
        assert!(pair[1] - pair[0] >= cooldown_ms, "retriggered: {pair:?}");
    }
    assert_eq!(pipeline.accumulator().summary().nod_count, nods.len() as u64);
}

#[test]
fn shaking_is_detected_on_horizontal_axis() {
    let mut pipeline = running_pipeline();
    let mut clock = FrameClock::new(30.0);

    let mut shakes = 0;
    for _ in 0..90 {
        let frame = clock.face_with(|ts| {
            FaceParams::nose(0.04 * (2.0 * PI * 2.0 * ts / 1000.0).sin(), 0.0)
        });
        let r = process(&mut pipeline, &frame);
        assert!(!r.head_nod);
        if r.head_shake {
            shakes += 1;
        }
    }
    assert!(shakes >= 1);
}

#[test]
fn blink_rate_is_frame_rate_independent() {
    let rate_at = |fps: f64, frames: usize| {
        let mut pipeline = running_pipeline();
        let mut clock = FrameClock::new(fps);
        let mut last = None;
        for _ in 0..frames {
            let frame = clock.face_with(|ts| blink_pattern(ts, 3000.0, 500.0, 200.0));
            last = Some(process(&mut pipeline, &frame));
        }
        last.expect("frames processed")
    };

    // both streams end at exactly 90 s of capture time
    let slow = rate_at(15.0, 1351);
    let fast = rate_at(60.0, 5401);
    assert_eq!(slow.timestamp_ms, 90_000.0);
    assert_eq!(fast.timestamp_ms, 90_000.0);

    assert_eq!(slow.blink_count, 30);
    assert_eq!(fast.blink_count, 30);
    assert!((slow.blinks_per_minute - 20.0).abs() < 1e-9);
    assert!((fast.blinks_per_minute - slow.blinks_per_minute).abs() < 1e-9);
}

#[test]
fn malformed_frames_change_nothing() {
    let mut clean = running_pipeline();
    let mut noisy = running_pipeline();
    let mut clock = FrameClock::new(30.0);

    for i in 0..240 {
        let frame = if i % 50 == 25 {
            clock.no_face()
        } else {
            clock.face_with(|ts| blink_pattern(ts, 2000.0, 300.0, 150.0))
        };
        let expected = process(&mut clean, &frame);

        match i % 4 {
            0 => {
                let short = LandmarkFrame::new(frame.frame_number, frame.timestamp_ms, {
                    let mut p = face_points(FaceParams::default());
                    p.truncate(468);
                    p
                });
                assert!(noisy.process_frame(&short).is_err());
            }
            1 => {
                let mut points = face_points(FaceParams::closed());
                points[NOSE_TIP].y = f64::INFINITY;
                let bad = LandmarkFrame::new(frame.frame_number, frame.timestamp_ms, points);
                assert!(noisy.process_frame(&bad).is_err());
            }
            2 => {
                let stale = LandmarkFrame::new(
                    frame.frame_number,
                    frame.timestamp_ms - 500.0,
                    face_points(FaceParams::tilted(40.0)),
                );
                assert!(noisy.process_frame(&stale).is_err());
            }
            _ => {}
        }

        let actual = process(&mut noisy, &frame);
        assert_eq!(actual, expected, "diverged at frame {i}");
        assert_eq!(noisy.window_sizes(), clean.window_sizes());
    }

    assert_eq!(clean.dropped_frames(), 0);
    assert!(noisy.dropped_frames() > 0);
    assert_eq!(noisy.frames_processed(), clean.frames_processed());
}

#[test]
fn face_loss_holds_state_and_resumes() {
    let mut pipeline = running_pipeline();
    let mut clock = FrameClock::new(30.0);

    let mut before = None;
    for _ in 0..60 {
        before = Some(process(&mut pipeline, &clock.face(FaceParams::default())));
    }
    let before = before.expect("frames processed");

    for _ in 0..90 {
        let r = process(&mut pipeline, &clock.no_face());
        assert!(!r.face_detected);
        assert_eq!(r.engagement_score, before.engagement_score);
        assert_eq!(r.confusion_score, before.confusion_score);
        assert_eq!(r.eye_contact, before.eye_contact);
        assert!(r.fps > 0.0);
    }

    let resumed = process(&mut pipeline, &clock.face(FaceParams::default()));
    assert!(resumed.face_detected);
    assert_eq!(resumed.blink_count, before.blink_count);
}

#[test]
fn looking_away_lowers_engagement_and_raises_confusion() {
    let mut pipeline = running_pipeline();
    let mut clock = FrameClock::new(30.0);

    let mut last = None;
    for _ in 0..90 {
        last = Some(process(&mut pipeline, &clock.face(FaceParams::nose(0.05, 0.0))));
    }
    let r = last.expect("frames processed");

    assert!(!r.eye_contact);
    assert_eq!(r.contact_ratio, 0.0);
    // only the gaze term contributes to confusion
    assert!((r.confusion_score - 25.0).abs() < 1e-9);
    // 0.30 + 0.25 - 0.15 * 0.25
    assert!((r.engagement_score - 51.25).abs() < 1e-9);
    assert_eq!(r.engagement_level, EngagementLevel::Moderate);
}

#[test]
fn session_summary_tracks_logged_samples() {
    let mut pipeline = running_pipeline();
    let mut clock = FrameClock::new(30.0);

    for _ in 0..=300 {
        process(&mut pipeline, &clock.face(FaceParams::default()));
    }
    let summary = pipeline.accumulator().summary();
    // one sample per second of capture time, 0 s through 10 s
    assert_eq!(summary.samples, 11);
    assert_eq!(summary.face_samples, 11);
    assert!((summary.avg_engagement - 85.0).abs() < 1e-9);
    assert_eq!(summary.engagement_level, EngagementLevel::High);
    assert!((summary.duration_sec - 10.0).abs() < 1e-9);
}
