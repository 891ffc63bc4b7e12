use serde::{Deserialize, Serialize};

/// Tunable constants for the repetition detector.
///
/// Distances are in image pixels unless suffixed `_frac` (fraction of image
/// height). Velocities are expressed in down-thresholds per second so they stay
/// independent of how large the body appears in frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RepConfig {
    /// EMA weight given to each new sample (higher = snappier).
    pub alpha: f64,
    pub calibration_ms: u64,
    /// Minimum time spent at the bottom before an ascent counts.
    pub hold_ms: u64,
    pub ready_threshold: f64,
    pub push_threshold: f64,

    /// Scale multipliers: thresholds are `k * shoulder_width`.
    pub k_down: f64,
    pub k_up: f64,
    pub min_down_px: f64,
    pub min_up_px: f64,
    pub max_down_frac: f64,
    pub max_up_frac: f64,
    /// Down threshold as a fraction of image height when no body scale is visible.
    pub fallback_down_frac: f64,
    /// Weight of the new target when low-pass filtering the active thresholds.
    pub threshold_blend: f64,

    pub top_calibration_blend: f64,
    pub top_reanchor_blend: f64,
    pub bottom_depth_blend: f64,
    /// Per-rep blend of `k_down` toward the learned bottom depth.
    pub down_adapt_blend: f64,
    /// Fraction of the learned bottom depth that the down threshold aims for.
    pub depth_to_threshold: f64,
    pub k_down_min: f64,
    pub k_down_max: f64,

    /// Displacement (in down thresholds) that ends a descent regardless of velocity.
    pub descent_extend: f64,
    /// Displacement (in down thresholds) that starts a descent regardless of score.
    pub descent_override: f64,
    pub still_velocity: f64,
    pub full_velocity: f64,

    pub neutral_elbow_deg: f64,
    /// Elbow angle above which arms count as straight for the fallback ready path.
    pub straight_elbow_deg: f64,
    pub bend_span_deg: f64,
    pub straight_from_deg: f64,
    pub straight_span_deg: f64,
    pub torso_tolerance_deg: f64,
    /// Width of the near-top band, in up thresholds.
    pub near_top_span: f64,
    pub min_frame_dt_ms: u64,
}

impl Default for RepConfig {
    fn default() -> Self {
        Self {
            alpha: 0.28,
            calibration_ms: 900,
            hold_ms: 180,
            ready_threshold: 0.92,
            push_threshold: 0.65,

            k_down: 0.45,
            k_up: 0.18,
            min_down_px: 24.0,
            min_up_px: 8.0,
            max_down_frac: 0.35,
            max_up_frac: 0.12,
            fallback_down_frac: 0.13,
            threshold_blend: 0.20,

            top_calibration_blend: 0.10,
            top_reanchor_blend: 0.15,
            bottom_depth_blend: 0.10,
            down_adapt_blend: 0.15,
            depth_to_threshold: 0.6,
            k_down_min: 0.30,
            k_down_max: 0.60,

            descent_extend: 1.6,
            descent_override: 1.5,
            still_velocity: 0.3,
            full_velocity: 2.0,

            neutral_elbow_deg: 170.0,
            straight_elbow_deg: 160.0,
            bend_span_deg: 50.0,
            straight_from_deg: 145.0,
            straight_span_deg: 20.0,
            torso_tolerance_deg: 45.0,
            near_top_span: 5.0,
            min_frame_dt_ms: 16,
        }
    }
}
