use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use engagement_monitor::signals::geometry::{
    CHIN, FOREHEAD, LEFT_CHEEK, LEFT_EYE_EAR, NOSE_TIP, RIGHT_CHEEK, RIGHT_EYE_EAR,
};
use engagement_monitor::signals::{LandmarkFrame, Point};

pub const LANDMARK_COUNT: usize = 478;
/// EAR of an eye built with [`FaceParams::eye_half_height`] = h is `h / 0.05`.
pub const OPEN_HALF_HEIGHT: f64 = 0.015;
pub const CLOSED_HALF_HEIGHT: f64 = 0.005;

const FACE_LEFT: f64 = 0.3;
const FACE_RIGHT: f64 = 0.7;
const FACE_TOP: f64 = 0.2;
const FACE_BOTTOM: f64 = 0.8;
const EYE_LINE_Y: f64 = 0.4;

/// Synthetic face pose. The face box spans x 0.3..0.7 and y 0.2..0.8.
#[derive(Debug, Clone, Copy)]
pub struct FaceParams {
    pub eye_half_height: f64,
    /// Roll of the eye line in degrees.
    pub tilt_deg: f64,
    /// Nose offset from the face centre, raw image units.
    pub nose_dx: f64,
    pub nose_dy: f64,
}

impl Default for FaceParams {
    fn default() -> Self {
        Self {
            eye_half_height: OPEN_HALF_HEIGHT,
            tilt_deg: 0.0,
            nose_dx: 0.0,
            nose_dy: 0.0,
        }
    }
}

impl FaceParams {
    pub fn closed() -> Self {
        Self {
            eye_half_height: CLOSED_HALF_HEIGHT,
            ..Self::default()
        }
    }

    pub fn tilted(tilt_deg: f64) -> Self {
        Self {
            tilt_deg,
            ..Self::default()
        }
    }

    pub fn nose(nose_dx: f64, nose_dy: f64) -> Self {
        Self {
            nose_dx,
            nose_dy,
            ..Self::default()
        }
    }
}

pub fn face_points(params: FaceParams) -> Vec<Point> {
    let mut points = vec![Point::new(0.5, 0.5); LANDMARK_COUNT];
    points[LEFT_CHEEK] = Point::new(FACE_LEFT, 0.5);
    points[RIGHT_CHEEK] = Point::new(FACE_RIGHT, 0.5);
    points[FOREHEAD] = Point::new(0.5, FACE_TOP);
    points[CHIN] = Point::new(0.5, FACE_BOTTOM);
    points[NOSE_TIP] = Point::new(0.5 + params.nose_dx, 0.55 + params.nose_dy);

    let (sin, cos) = params.tilt_deg.to_radians().sin_cos();
    let rotate = |p: Point| {
        let (dx, dy) = (p.x - 0.5, p.y - EYE_LINE_Y);
        Point::new(0.5 + dx * cos - dy * sin, EYE_LINE_Y + dx * sin + dy * cos)
    };
    let h = params.eye_half_height;
    let eye = |cx: f64| {
        [
            Point::new(cx - 0.05, EYE_LINE_Y),
            Point::new(cx - 0.02, EYE_LINE_Y - h),
            Point::new(cx + 0.02, EYE_LINE_Y - h),
            Point::new(cx + 0.05, EYE_LINE_Y),
            Point::new(cx + 0.02, EYE_LINE_Y + h),
            Point::new(cx - 0.02, EYE_LINE_Y + h),
        ]
    };
    for (i, p) in LEFT_EYE_EAR.iter().zip(eye(0.4)) {
        points[*i] = rotate(p);
    }
    for (i, p) in RIGHT_EYE_EAR.iter().zip(eye(0.6)) {
        points[*i] = rotate(p);
    }
    points
}

/// Frame clock at a fixed nominal rate, optionally jittered.
pub struct FrameClock {
    fps: f64,
    index: u64,
    jitter_ms: f64,
    rng: StdRng,
}

impl FrameClock {
    pub fn new(fps: f64) -> Self {
        Self {
            fps,
            index: 0,
            jitter_ms: 0.0,
            rng: StdRng::seed_from_u64(7),
        }
    }

    /// Each timestamp moves by up to `jitter_ms` around its nominal slot.
    /// Keep `jitter_ms` below half the interval so order is preserved.
    pub fn jittered(fps: f64, jitter_ms: f64, seed: u64) -> Self {
        Self {
            jitter_ms,
            rng: StdRng::seed_from_u64(seed),
            ..Self::new(fps)
        }
    }

    /// `(frame_number, timestamp_ms)` of the next frame.
    pub fn tick(&mut self) -> (u64, f64) {
        let n = self.index;
        self.index += 1;
        let nominal = n as f64 * 1000.0 / self.fps;
        let ts = if self.jitter_ms > 0.0 {
            nominal + self.rng.gen_range(-self.jitter_ms..self.jitter_ms)
        } else {
            nominal
        };
        (n, ts.max(0.0))
    }

    pub fn face(&mut self, params: FaceParams) -> LandmarkFrame {
        let (n, ts) = self.tick();
        LandmarkFrame::new(n, ts, face_points(params))
    }

    /// Face whose pose depends on the frame's capture time.
    pub fn face_with(&mut self, pose: impl FnOnce(f64) -> FaceParams) -> LandmarkFrame {
        let (n, ts) = self.tick();
        LandmarkFrame::new(n, ts, face_points(pose(ts)))
    }

    pub fn no_face(&mut self) -> LandmarkFrame {
        let (n, ts) = self.tick();
        LandmarkFrame::no_face(n, ts)
    }
}

/// Eyes shut for `closed_ms` starting `offset_ms` into every `period_ms`.
pub fn blink_pattern(ts: f64, period_ms: f64, offset_ms: f64, closed_ms: f64) -> FaceParams {
    let phase = ts % period_ms;
    if phase >= offset_ms && phase < offset_ms + closed_ms {
        FaceParams::closed()
    } else {
        FaceParams::default()
    }
}
