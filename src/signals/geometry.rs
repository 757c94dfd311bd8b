//! 面部关键点几何映射
//!
//! 将 MediaPipe FaceLandmarker 的索引关键点映射为具名的解剖学角色
//! （眼角/眼睑、鼻尖、面部边界）。纯函数，无状态。

use crate::signals::error::MalformedFrameError;
use crate::signals::types::{LandmarkFrame, Point};

/// 六点眼部模型 [p1, p2, p3, p4, p5, p6]
/// - p1, p4: 眼角（水平方向）
/// - p2, p3: 上眼睑
/// - p5, p6: 下眼睑
pub const LEFT_EYE_EAR: [usize; 6] = [33, 160, 158, 133, 153, 144];
pub const RIGHT_EYE_EAR: [usize; 6] = [362, 385, 387, 263, 373, 380];

pub const NOSE_TIP: usize = 4;
pub const FOREHEAD: usize = 10;
pub const CHIN: usize = 152;
pub const LEFT_CHEEK: usize = 234;
pub const RIGHT_CHEEK: usize = 454;

pub const MAX_REQUIRED_INDEX: usize = 454;

const REQUIRED_POINTS: [usize; 17] = [
    33, 160, 158, 133, 153, 144, 362, 385, 387, 263, 373, 380, NOSE_TIP, FOREHEAD, CHIN,
    LEFT_CHEEK, RIGHT_CHEEK,
];

const MIN_EXTENT: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeLandmarks {
    pub points: [Point; 6],
}

impl EyeLandmarks {
    fn collect(points: &[Point], indices: &[usize; 6]) -> Self {
        Self {
            points: indices.map(|i| points[i]),
        }
    }

    pub fn outer_corner(&self) -> Point {
        self.points[0]
    }

    pub fn inner_corner(&self) -> Point {
        self.points[3]
    }

    /// 两眼角连线中点
    pub fn center(&self) -> Point {
        self.points[0].midpoint(&self.points[3])
    }

    /// EAR = (|p2-p6| + |p3-p5|) / (2 * |p1-p4|)
    ///
    /// 水平距离过小时无定义，返回 None
    pub fn aspect_ratio(&self) -> Option<f64> {
        let [p1, p2, p3, p4, p5, p6] = self.points;
        let horizontal = p1.distance(&p4);
        if horizontal < MIN_EXTENT {
            return None;
        }
        Some((p2.distance(&p6) + p3.distance(&p5)) / (2.0 * horizontal))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBounds {
    pub left_x: f64,
    pub right_x: f64,
    pub top_y: f64,
    pub bottom_y: f64,
}

impl FaceBounds {
    pub fn width(&self) -> f64 {
        self.right_x - self.left_x
    }

    pub fn height(&self) -> f64 {
        self.bottom_y - self.top_y
    }

    pub fn center_x(&self) -> f64 {
        (self.left_x + self.right_x) / 2.0
    }
}

/// Named geometric primitives of one validated frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceGeometry {
    pub left_eye: EyeLandmarks,
    pub right_eye: EyeLandmarks,
    pub nose_tip: Point,
    pub bounds: FaceBounds,
}

impl FaceGeometry {
    pub fn from_frame(
        frame: &LandmarkFrame,
        expected_count: usize,
    ) -> Result<Self, MalformedFrameError> {
        Self::from_points(&frame.points, expected_count)
    }

    pub fn from_points(
        points: &[Point],
        expected_count: usize,
    ) -> Result<Self, MalformedFrameError> {
        if points.len() != expected_count {
            return Err(MalformedFrameError::WrongCardinality {
                expected: expected_count,
                actual: points.len(),
            });
        }
        for &index in REQUIRED_POINTS.iter() {
            match points.get(index) {
                Some(p) if p.is_finite() => {}
                Some(_) => return Err(MalformedFrameError::NonFiniteCoordinate { index }),
                None => {
                    return Err(MalformedFrameError::WrongCardinality {
                        expected: expected_count,
                        actual: points.len(),
                    })
                }
            }
        }

        // 左右颊在图像坐标中的先后取决于镜像，统一为 left < right
        let (a, b) = (points[LEFT_CHEEK].x, points[RIGHT_CHEEK].x);
        let bounds = FaceBounds {
            left_x: a.min(b),
            right_x: a.max(b),
            top_y: points[FOREHEAD].y.min(points[CHIN].y),
            bottom_y: points[FOREHEAD].y.max(points[CHIN].y),
        };
        if bounds.width() < MIN_EXTENT || bounds.height() < MIN_EXTENT {
            return Err(MalformedFrameError::DegenerateFace {
                width: bounds.width(),
                height: bounds.height(),
            });
        }

        Ok(Self {
            left_eye: EyeLandmarks::collect(points, &LEFT_EYE_EAR),
            right_eye: EyeLandmarks::collect(points, &RIGHT_EYE_EAR),
            nose_tip: points[NOSE_TIP],
            bounds,
        })
    }

    /// 眼线端点：左右眼中心
    pub fn eye_line(&self) -> (Point, Point) {
        (self.left_eye.center(), self.right_eye.center())
    }

    pub fn face_center_x(&self) -> f64 {
        self.bounds.center_x()
    }

    /// 鼻尖相对面部框的归一化位置 (nx, ny)，头部平移不影响该信号
    pub fn nose_position_normalised(&self) -> (f64, f64) {
        (
            (self.nose_tip.x - self.bounds.left_x) / self.bounds.width(),
            (self.nose_tip.y - self.bounds.top_y) / self.bounds.height(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_points() -> Vec<Point> {
        let mut points = vec![Point::new(0.5, 0.5); 478];
        points[LEFT_CHEEK] = Point::new(0.3, 0.5);
        points[RIGHT_CHEEK] = Point::new(0.7, 0.5);
        points[FOREHEAD] = Point::new(0.5, 0.2);
        points[CHIN] = Point::new(0.5, 0.8);
        points[NOSE_TIP] = Point::new(0.5, 0.55);
        let eye = |cx: f64| {
            [
                Point::new(cx - 0.05, 0.4),
                Point::new(cx - 0.02, 0.385),
                Point::new(cx + 0.02, 0.385),
                Point::new(cx + 0.05, 0.4),
                Point::new(cx + 0.02, 0.415),
                Point::new(cx - 0.02, 0.415),
            ]
        };
        for (i, p) in LEFT_EYE_EAR.iter().zip(eye(0.4)) {
            points[*i] = p;
        }
        for (i, p) in RIGHT_EYE_EAR.iter().zip(eye(0.6)) {
            points[*i] = p;
        }
        points
    }

    #[test]
    fn maps_named_roles() {
        let geo = FaceGeometry::from_points(&base_points(), 478).expect("valid geometry");
        assert!((geo.face_center_x() - 0.5).abs() < 1e-12);
        let (nx, ny) = geo.nose_position_normalised();
        assert!((nx - 0.5).abs() < 1e-12);
        assert!((ny - 0.5833333333).abs() < 1e-6);
        let (l, r) = geo.eye_line();
        assert!((l.x - 0.4).abs() < 1e-12 && (r.x - 0.6).abs() < 1e-12);
    }

    #[test]
    fn ear_of_open_eye() {
        let geo = FaceGeometry::from_points(&base_points(), 478).expect("valid geometry");
        let ear = geo.left_eye.aspect_ratio().expect("defined ear");
        // (0.03 + 0.03) / (2 * 0.1)
        assert!((ear - 0.3).abs() < 1e-9);
    }

    #[test]
    fn collapsed_eye_has_no_ear() {
        let mut points = base_points();
        for i in LEFT_EYE_EAR {
            points[i] = Point::new(0.4, 0.4);
        }
        let geo = FaceGeometry::from_points(&points, 478).expect("valid geometry");
        assert!(geo.left_eye.aspect_ratio().is_none());
        assert!(geo.right_eye.aspect_ratio().is_some());
    }

    #[test]
    fn rejects_wrong_cardinality() {
        let err = FaceGeometry::from_points(&base_points()[..468], 478).expect_err("short frame");
        assert_eq!(
            err,
            MalformedFrameError::WrongCardinality {
                expected: 478,
                actual: 468
            }
        );
    }

    #[test]
    fn rejects_nan_and_degenerate_face() {
        let mut points = base_points();
        points[NOSE_TIP].x = f64::NAN;
        assert_eq!(
            FaceGeometry::from_points(&points, 478),
            Err(MalformedFrameError::NonFiniteCoordinate { index: NOSE_TIP })
        );

        let mut points = base_points();
        points[RIGHT_CHEEK] = points[LEFT_CHEEK];
        assert!(matches!(
            FaceGeometry::from_points(&points, 478),
            Err(MalformedFrameError::DegenerateFace { .. })
        ));
    }
}
