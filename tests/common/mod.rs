#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use pushlock_lib::{
    FrameSink, OverlayMode, OverlaySurface, Point, PoseFrame, RepDetector, RepEvent,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::sync::mpsc::UnboundedReceiver;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Show(String, OverlayMode),
    Status(String, String),
    Hide(String),
    Advise,
}

/// Overlay surface that records every call for later assertions.
pub struct RecordingSurface {
    allowed: AtomicBool,
    calls: Mutex<Vec<Call>>,
}

impl RecordingSurface {
    pub fn new(allowed: bool) -> Arc<Self> {
        Arc::new(Self {
            allowed: AtomicBool::new(allowed),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn shows(&self, package: &str, mode: OverlayMode) -> usize {
        self.calls()
            .iter()
            .filter(|call| **call == Call::Show(package.into(), mode))
            .count()
    }
}

impl OverlaySurface for RecordingSurface {
    fn can_draw_overlays(&self) -> bool {
        self.allowed.load(Ordering::SeqCst)
    }

    fn show(&self, package: &str, mode: OverlayMode, _status: &str) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(Call::Show(package.into(), mode));
        Ok(())
    }

    fn update_status(&self, package: &str, status: &str) {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Status(package.into(), status.into()));
    }

    fn hide(&self, package: &str) {
        self.calls.lock().unwrap().push(Call::Hide(package.into()));
    }

    fn advise_permission_missing(&self) {
        self.calls.lock().unwrap().push(Call::Advise);
    }
}

/// Synthetic front-facing push-up camera feed.
///
/// Geometry is expressed in shoulder widths `W`: shoulders sit 0.35W below the
/// nose, each arm segment is 0.75W, and the wrists stay planted just short of
/// full arm extension below the top shoulder position. Depths passed to the
/// motion helpers are nose offsets in units of `W`.
pub struct PushupRig {
    width: f64,
    center_x: f64,
    top_y: f64,
    image_height: f64,
    timestamp_ms: u64,
    rng: StdRng,
    frames: Vec<PoseFrame>,
}

impl PushupRig {
    pub const IMAGE_HEIGHT: f64 = 1280.0;

    pub fn new(width: f64, seed: u64) -> Self {
        Self {
            width,
            center_x: 360.0,
            top_y: 300.0,
            image_height: Self::IMAGE_HEIGHT,
            timestamp_ms: 0,
            rng: StdRng::seed_from_u64(seed),
            frames: Vec::new(),
        }
    }

    fn arm(&self) -> f64 {
        0.75 * self.width
    }

    fn frame_at(&self, depth: f64) -> PoseFrame {
        let w = self.width;
        let arm = self.arm();
        let nose_y = self.top_y + depth * w;
        let shoulder_y = nose_y + 0.35 * w;
        let wrist_y = self.top_y + 0.35 * w + 2.0 * arm * 0.998;
        let reach = (wrist_y - shoulder_y).max(0.0);
        let flare = (arm * arm - (reach / 2.0).powi(2)).max(0.0).sqrt();
        let elbow_y = shoulder_y + reach / 2.0;

        let left_x = self.center_x - w / 2.0;
        let right_x = self.center_x + w / 2.0;

        PoseFrame {
            timestamp_ms: self.timestamp_ms,
            image_height: self.image_height,
            nose: Some(Point::new(self.center_x, nose_y)),
            left_shoulder: Some(Point::new(left_x, shoulder_y)),
            right_shoulder: Some(Point::new(right_x, shoulder_y)),
            left_elbow: Some(Point::new(left_x - flare, elbow_y)),
            right_elbow: Some(Point::new(right_x + flare, elbow_y)),
            left_wrist: Some(Point::new(left_x, wrist_y)),
            right_wrist: Some(Point::new(right_x, wrist_y)),
            left_hip: None,
            right_hip: None,
        }
    }

    fn push(&mut self, depth: f64) {
        let frame = self.frame_at(depth);
        self.frames.push(frame);
        self.timestamp_ms += self.rng.gen_range(28..=40);
    }

    /// Stays at `depth` for `ms`, wobbling by up to `wobble` widths.
    pub fn hold(&mut self, depth: f64, ms: u64, wobble: f64) -> &mut Self {
        let end = self.timestamp_ms + ms;
        let mut i = 0.0_f64;
        while self.timestamp_ms < end {
            self.push(depth + wobble * (i * 1.7).sin());
            i += 1.0;
        }
        self
    }

    /// Eases from `from` to `to` over `ms` on a cosine profile.
    pub fn glide(&mut self, from: f64, to: f64, ms: u64) -> &mut Self {
        let start = self.timestamp_ms;
        while self.timestamp_ms < start + ms {
            let t = (self.timestamp_ms - start) as f64 / ms as f64;
            let eased = (1.0 - (t * std::f64::consts::PI).cos()) / 2.0;
            self.push(from + (to - from) * eased);
        }
        self
    }

    /// Still at the top long enough to calibrate and be marked ready.
    pub fn settle(&mut self) -> &mut Self {
        self.hold(0.0, 1400, 0.01)
    }

    /// One full push-up: 0.8W deep, with small wobbles at both ends.
    pub fn rep(&mut self) -> &mut Self {
        self.glide(0.0, 0.8, 500)
            .hold(0.8, 300, 0.03)
            .glide(0.8, 0.0, 400)
            .hold(0.0, 400, 0.02)
    }

    pub fn frames(&self) -> &[PoseFrame] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<PoseFrame> {
        self.frames
    }
}

pub fn count_reps(events: &[RepEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, RepEvent::RepCompleted { .. }))
        .count()
}

/// Runs frames straight through a detector.
pub fn detect(detector: &mut RepDetector, frames: &[PoseFrame]) -> Vec<RepEvent> {
    frames.iter().flat_map(|frame| detector.process(frame)).collect()
}

/// Submits one frame to a running attempt and waits until the worker has
/// processed it. Frames without a nose are not supported here.
pub async fn feed(
    frames: &FrameSink,
    events: &mut UnboundedReceiver<RepEvent>,
    frame: PoseFrame,
) -> Vec<RepEvent> {
    assert!(frame.nose.is_some());
    assert!(frames.submit(frame), "attempt ended early");

    let mut seen = Vec::new();
    while let Some(event) = events.recv().await {
        let done = matches!(event, RepEvent::StatusUpdate { .. });
        seen.push(event);
        if done {
            break;
        }
    }
    seen
}
