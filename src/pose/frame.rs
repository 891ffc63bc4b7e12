use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn midpoint(self, other: Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// One frame of 2D landmarks from the pose estimator. Any landmark may be
/// missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoseFrame {
    /// Capture time in milliseconds on a monotonic clock.
    pub timestamp_ms: u64,
    pub image_height: f64,
    pub nose: Option<Point>,
    pub left_shoulder: Option<Point>,
    pub right_shoulder: Option<Point>,
    pub left_elbow: Option<Point>,
    pub right_elbow: Option<Point>,
    pub left_wrist: Option<Point>,
    pub right_wrist: Option<Point>,
    pub left_hip: Option<Point>,
    pub right_hip: Option<Point>,
}

/// What the frame producer hands to the worker.
#[derive(Debug, Clone)]
pub enum FrameInput {
    Pose(PoseFrame),
    /// The estimator failed on this frame; it is dropped.
    Failed(String),
}

impl From<PoseFrame> for FrameInput {
    fn from(frame: PoseFrame) -> Self {
        FrameInput::Pose(frame)
    }
}

/// Angle at `b` formed by `a-b-c`, in degrees.
pub fn joint_angle(a: Point, b: Point, c: Point) -> f64 {
    let (ax, ay) = (a.x - b.x, a.y - b.y);
    let (cx, cy) = (c.x - b.x, c.y - b.y);
    let mag_a = ax.hypot(ay).max(1e-6);
    let mag_c = cx.hypot(cy).max(1e-6);
    let cos = ((ax * cx + ay * cy) / (mag_a * mag_c)).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

impl PoseFrame {
    /// Elbow angle, taking the larger side when both are visible.
    pub fn elbow_angle(&self) -> Option<f64> {
        let left = match (self.left_shoulder, self.left_elbow, self.left_wrist) {
            (Some(s), Some(e), Some(w)) => Some(joint_angle(s, e, w)),
            _ => None,
        };
        let right = match (self.right_shoulder, self.right_elbow, self.right_wrist) {
            (Some(s), Some(e), Some(w)) => Some(joint_angle(s, e, w)),
            _ => None,
        };

        match (left, right) {
            (Some(l), Some(r)) => Some(l.max(r)),
            (l, r) => l.or(r),
        }
    }

    /// Deviation of the shoulder-to-hip line from vertical, in degrees.
    pub fn torso_angle(&self) -> Option<f64> {
        let shoulder = either_or_mid(self.left_shoulder, self.right_shoulder)?;
        let hip = either_or_mid(self.left_hip, self.right_hip)?;
        let (dx, dy) = (hip.x - shoulder.x, hip.y - shoulder.y);
        if dx.hypot(dy) < 1e-6 {
            return None;
        }
        Some(dx.abs().atan2(dy.abs()).to_degrees())
    }

    /// Body scale in pixels: shoulder width, else mean shoulder-to-hip length.
    pub fn body_scale(&self) -> Option<f64> {
        if let (Some(l), Some(r)) = (self.left_shoulder, self.right_shoulder) {
            let width = l.distance(r);
            if width > 1e-6 {
                return Some(width);
            }
        }

        let sides: Vec<f64> = [
            (self.left_shoulder, self.left_hip),
            (self.right_shoulder, self.right_hip),
        ]
        .into_iter()
        .filter_map(|(s, h)| Some(s?.distance(h?)))
        .filter(|d| *d > 1e-6)
        .collect();

        if sides.is_empty() {
            None
        } else {
            Some(sides.iter().sum::<f64>() / sides.len() as f64)
        }
    }
}

fn either_or_mid(a: Option<Point>, b: Option<Point>) -> Option<Point> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.midpoint(b)),
        (a, b) => a.or(b),
    }
}
