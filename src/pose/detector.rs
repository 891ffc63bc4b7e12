//! Pose-driven repetition counter.
//!
//! Converts a noisy, variable-rate stream of landmark frames into debounced
//! repetition events. All timing comes from frame timestamps, so the detector
//! is deterministic for a given frame sequence.
//!
//! Vertical displacement is measured as smoothed nose Y minus the calibrated
//! top reference (image Y grows downward, so positive means "lower"). Down and
//! up thresholds are derived from body scale and low-pass filtered; the gap
//! between them is the hysteresis band that keeps oscillation near either
//! boundary from producing extra reps.

use serde::Serialize;

use crate::pose::{
    config::RepConfig,
    frame::PoseFrame,
    scoring::{
        bend_amount, down_amount, near_top_amount, push_probability, readiness,
        straight_arms_amount, straight_torso_amount, velocity_amount,
    },
};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RepPhase {
    Calibrating,
    WaitReady,
    Up,
    Descent,
    BottomHold,
    Ascent,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RepEvent {
    Calibrating { progress: f64 },
    Ready,
    #[serde(rename_all = "camelCase")]
    StatusUpdate { readiness: f64, push_probability: f64 },
    RepCompleted { count: u32 },
    /// The subject left the frame after having been tracked.
    PoseLost,
}

#[derive(Debug, Clone, Copy)]
struct Ema {
    alpha: f64,
    value: Option<f64>,
}

impl Ema {
    fn new(alpha: f64) -> Self {
        Self { alpha, value: None }
    }

    fn update(&mut self, sample: f64) -> f64 {
        let next = match self.value {
            Some(prev) => lerp(prev, sample, self.alpha),
            None => sample,
        };
        self.value = Some(next);
        next
    }
}

/// Per-attempt detector state. Discarded when the attempt ends.
#[derive(Debug, Clone)]
struct RepSession {
    started_at_ms: Option<u64>,
    last_frame_ms: Option<u64>,
    top_y: Option<f64>,
    nose_y: Ema,
    elbow_deg: Ema,
    torso_deg: Ema,
    prev_nose_y: Option<f64>,
    down_px: Option<f64>,
    up_px: Option<f64>,
    /// Scale multiplier for the down threshold; adapts toward learned depth.
    k_down: f64,
    /// Learned bottom depth in body-scale units.
    learned_bottom: Option<f64>,
    scale: f64,
    phase: RepPhase,
    descent_started_ms: u64,
    bottom_started_ms: u64,
    reps: u32,
    subject_seen: bool,
    lost_reported: bool,
}

impl RepSession {
    fn new(config: &RepConfig) -> Self {
        Self {
            started_at_ms: None,
            last_frame_ms: None,
            top_y: None,
            nose_y: Ema::new(config.alpha),
            elbow_deg: Ema::new(config.alpha),
            torso_deg: Ema::new(config.alpha),
            prev_nose_y: None,
            down_px: None,
            up_px: None,
            k_down: config.k_down,
            learned_bottom: None,
            scale: 0.0,
            phase: RepPhase::Calibrating,
            descent_started_ms: 0,
            bottom_started_ms: 0,
            reps: 0,
            subject_seen: false,
            lost_reported: false,
        }
    }
}

/// Snapshot of the detector's internals, for status displays and tests.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorSnapshot {
    pub phase: RepPhase,
    pub reps: u32,
    pub displacement_px: f64,
    pub down_threshold_px: f64,
    pub up_threshold_px: f64,
    pub elbow_deg: f64,
}

pub struct RepDetector {
    config: RepConfig,
    session: RepSession,
}

impl RepDetector {
    pub fn new(config: RepConfig) -> Self {
        let session = RepSession::new(&config);
        Self { config, session }
    }

    pub fn phase(&self) -> RepPhase {
        self.session.phase
    }

    pub fn snapshot(&self) -> DetectorSnapshot {
        let s = &self.session;
        DetectorSnapshot {
            phase: s.phase,
            reps: s.reps,
            displacement_px: match (s.nose_y.value, s.top_y) {
                (Some(y), Some(top)) => y - top,
                _ => 0.0,
            },
            down_threshold_px: s.down_px.unwrap_or(0.0),
            up_threshold_px: s.up_px.unwrap_or(0.0),
            elbow_deg: s.elbow_deg.value.unwrap_or(self.config.neutral_elbow_deg),
        }
    }

    /// Feeds one frame and returns the events it produced, in order.
    pub fn process(&mut self, frame: &PoseFrame) -> Vec<RepEvent> {
        let config = &self.config;
        let s = &mut self.session;
        let mut events = Vec::new();

        let now = frame.timestamp_ms;
        let started_at = *s.started_at_ms.get_or_insert(now);

        let Some(nose) = frame.nose else {
            if s.subject_seen && !s.lost_reported {
                s.lost_reported = true;
                events.push(RepEvent::PoseLost);
            }
            return events;
        };
        s.subject_seen = true;
        s.lost_reported = false;

        let dt_ms = s
            .last_frame_ms
            .map(|last| now.saturating_sub(last))
            .unwrap_or(0)
            .max(config.min_frame_dt_ms);
        s.last_frame_ms = Some(now);

        // Thresholds follow body scale so the same motion reads the same at any distance.
        if let Some(scale) = frame
            .body_scale()
            .or_else(|| fallback_scale(frame.image_height, config))
        {
            s.scale = scale;
        }
        let max_px = |frac: f64| {
            if frame.image_height > 0.0 {
                frac * frame.image_height
            } else {
                f64::INFINITY
            }
        };
        let down_target = clamp_range(
            s.k_down * s.scale,
            config.min_down_px,
            max_px(config.max_down_frac),
        );
        let up_target = clamp_range(
            config.k_up * s.scale,
            config.min_up_px,
            max_px(config.max_up_frac),
        );
        let down_px = low_pass(&mut s.down_px, down_target, config.threshold_blend);
        let up_px = low_pass(&mut s.up_px, up_target, config.threshold_blend);

        let nose_y = s.nose_y.update(nose.y);
        let elbow = s
            .elbow_deg
            .update(frame.elbow_angle().unwrap_or(config.neutral_elbow_deg));
        let torso = s.torso_deg.update(frame.torso_angle().unwrap_or(0.0));

        let velocity = match s.prev_nose_y {
            Some(prev) => (nose_y - prev) / (dt_ms as f64 / 1000.0) / down_px,
            None => 0.0,
        };
        s.prev_nose_y = Some(nose_y);

        if s.phase == RepPhase::Calibrating {
            let top = match s.top_y {
                Some(top) => lerp(top, nose_y, config.top_calibration_blend),
                None => nose_y,
            };
            s.top_y = Some(top);
        }
        let top = s.top_y.unwrap_or(nose_y);
        let displacement = nose_y - top;

        let push = push_probability(
            down_amount(displacement, down_px),
            bend_amount(elbow, config),
            velocity_amount(velocity, config),
        );
        let ready = readiness(
            near_top_amount(displacement, up_px, config),
            straight_arms_amount(elbow, config),
            straight_torso_amount(torso, config),
        );

        match s.phase {
            RepPhase::Calibrating => {
                let elapsed = now.saturating_sub(started_at);
                let progress = if config.calibration_ms == 0 {
                    1.0
                } else {
                    (elapsed as f64 / config.calibration_ms as f64).min(1.0)
                };
                events.push(RepEvent::Calibrating { progress });
                if elapsed >= config.calibration_ms {
                    s.phase = RepPhase::WaitReady;
                }
            }
            RepPhase::WaitReady => {
                let fallback_ready =
                    elbow >= config.straight_elbow_deg && displacement.abs() < up_px;
                if ready >= config.ready_threshold || fallback_ready {
                    s.phase = RepPhase::Up;
                    events.push(RepEvent::Ready);
                }
            }
            RepPhase::Up => {
                let moved_down = displacement > down_px && push >= config.push_threshold;
                if moved_down || displacement > config.descent_override * down_px {
                    s.phase = RepPhase::Descent;
                    s.descent_started_ms = now;
                }
            }
            RepPhase::Descent => {
                if velocity.abs() <= config.still_velocity
                    || displacement > config.descent_extend * down_px
                {
                    s.phase = RepPhase::BottomHold;
                    s.bottom_started_ms = now;
                    if s.scale > 0.0 {
                        let depth = displacement / s.scale;
                        s.learned_bottom = Some(match s.learned_bottom {
                            Some(learned) => lerp(learned, depth, config.bottom_depth_blend),
                            None => depth,
                        });
                    }
                }
            }
            RepPhase::BottomHold => {
                if now.saturating_sub(s.bottom_started_ms) >= config.hold_ms {
                    s.phase = RepPhase::Ascent;
                }
            }
            RepPhase::Ascent => {
                if displacement < up_px {
                    s.reps += 1;
                    events.push(RepEvent::RepCompleted { count: s.reps });

                    if let Some(learned) = s.learned_bottom {
                        let target = clamp_range(
                            config.depth_to_threshold * learned,
                            config.k_down_min,
                            config.k_down_max,
                        );
                        s.k_down = lerp(s.k_down, target, config.down_adapt_blend);
                    }
                    s.top_y = Some(lerp(top, nose_y, config.top_reanchor_blend));
                    s.phase = RepPhase::Up;
                }
            }
        }

        events.push(RepEvent::StatusUpdate {
            readiness: ready,
            push_probability: push,
        });
        events
    }
}

fn fallback_scale(image_height: f64, config: &RepConfig) -> Option<f64> {
    (image_height > 0.0 && config.k_down > 0.0)
        .then(|| image_height * config.fallback_down_frac / config.k_down)
}

fn low_pass(slot: &mut Option<f64>, target: f64, blend: f64) -> f64 {
    let next = match *slot {
        Some(prev) => lerp(prev, target, blend),
        None => target,
    };
    *slot = Some(next);
    next
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Like `f64::clamp` but tolerates `hi < lo` (the lower bound wins).
fn clamp_range(value: f64, lo: f64, hi: f64) -> f64 {
    value.min(hi).max(lo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::frame::Point;

    fn nose_only(ts: u64, y: f64) -> PoseFrame {
        PoseFrame {
            timestamp_ms: ts,
            image_height: 720.0,
            nose: Some(Point::new(320.0, y)),
            ..PoseFrame::default()
        }
    }

    fn count_reps(events: &[RepEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, RepEvent::RepCompleted { .. }))
            .count()
    }

    #[test]
    fn calibration_reports_progress_then_waits() {
        let mut detector = RepDetector::new(RepConfig::default());
        let first = detector.process(&nose_only(0, 200.0));
        assert_eq!(first[0], RepEvent::Calibrating { progress: 0.0 });
        assert!(matches!(first.last(), Some(RepEvent::StatusUpdate { .. })));

        let mid = detector.process(&nose_only(450, 200.0));
        assert_eq!(mid[0], RepEvent::Calibrating { progress: 0.5 });
        assert_eq!(detector.phase(), RepPhase::Calibrating);

        detector.process(&nose_only(900, 200.0));
        assert_eq!(detector.phase(), RepPhase::WaitReady);
    }

    #[test]
    fn neutral_defaults_reach_ready_without_arms() {
        let mut detector = RepDetector::new(RepConfig::default());
        let mut events = Vec::new();
        for ts in (0..=1200).step_by(33) {
            events.extend(detector.process(&nose_only(ts, 200.0)));
        }
        assert!(events.contains(&RepEvent::Ready));
        assert_eq!(detector.phase(), RepPhase::Up);
    }

    #[test]
    fn frames_without_nose_are_skipped_and_reported_once() {
        let mut detector = RepDetector::new(RepConfig::default());
        assert!(detector.process(&PoseFrame::default()).is_empty());

        detector.process(&nose_only(10, 200.0));
        let lost = detector.process(&PoseFrame {
            timestamp_ms: 40,
            ..PoseFrame::default()
        });
        assert_eq!(lost, vec![RepEvent::PoseLost]);
        let again = detector.process(&PoseFrame {
            timestamp_ms: 70,
            ..PoseFrame::default()
        });
        assert!(again.is_empty());
    }

    #[test]
    fn nose_only_dip_counts_one_rep() {
        // No arms visible: elbow stays neutral, so only displacement and
        // velocity drive the push score.
        let mut detector = RepDetector::new(RepConfig::default());
        let mut events = Vec::new();
        let mut ts = 0;
        let mut feed = |y: f64, frames: usize, events: &mut Vec<RepEvent>| {
            for _ in 0..frames {
                events.extend(detector.process(&nose_only(ts, y)));
                ts += 33;
            }
        };

        feed(200.0, 40, &mut events);
        for step in 1..=10 {
            feed(200.0 + step as f64 * 18.0, 1, &mut events);
        }
        feed(380.0, 15, &mut events);
        for step in (0..10).rev() {
            feed(200.0 + step as f64 * 18.0, 1, &mut events);
        }
        feed(200.0, 20, &mut events);

        assert_eq!(count_reps(&events), 1);
    }

    #[test]
    fn shallow_dip_inside_band_is_ignored() {
        let mut detector = RepDetector::new(RepConfig::default());
        let mut events = Vec::new();
        let mut ts = 0;
        for i in 0..200 {
            let wobble = if i > 40 { ((i as f64) * 0.7).sin() * 25.0 } else { 0.0 };
            events.extend(detector.process(&nose_only(ts, 200.0 + wobble)));
            ts += 33;
        }
        assert_eq!(count_reps(&events), 0);
    }

    #[test]
    fn thresholds_track_scale_and_respect_clamps() {
        let mut detector = RepDetector::new(RepConfig::default());
        let frame = PoseFrame {
            left_shoulder: Some(Point::new(100.0, 250.0)),
            right_shoulder: Some(Point::new(300.0, 250.0)),
            ..nose_only(0, 200.0)
        };
        detector.process(&frame);
        let snap = detector.snapshot();
        assert!((snap.down_threshold_px - 90.0).abs() < 1e-9);
        assert!((snap.up_threshold_px - 36.0).abs() < 1e-9);

        let tiny = PoseFrame {
            timestamp_ms: 33,
            left_shoulder: Some(Point::new(100.0, 250.0)),
            right_shoulder: Some(Point::new(110.0, 250.0)),
            ..nose_only(33, 200.0)
        };
        for i in 0..60 {
            detector.process(&PoseFrame {
                timestamp_ms: 33 * (i + 1),
                ..tiny.clone()
            });
        }
        let snap = detector.snapshot();
        assert!((snap.down_threshold_px - 24.0).abs() < 1e-3);
        assert!((snap.up_threshold_px - 8.0).abs() < 1e-3);
    }

    #[test]
    fn threshold_jitter_is_low_passed() {
        let mut detector = RepDetector::new(RepConfig::default());
        let at = |ts: u64, width: f64| PoseFrame {
            left_shoulder: Some(Point::new(100.0, 250.0)),
            right_shoulder: Some(Point::new(100.0 + width, 250.0)),
            ..nose_only(ts, 200.0)
        };
        detector.process(&at(0, 200.0));
        detector.process(&at(33, 300.0));
        // 0.8 * 90 + 0.2 * 135
        assert!((detector.snapshot().down_threshold_px - 99.0).abs() < 1e-9);
    }
}
