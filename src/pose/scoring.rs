use crate::pose::config::RepConfig;

/// Weighted blend of how far, how bent, and how fast the body is moving down.
/// Each term is clamped to [0, 1] before weighting.
pub fn push_probability(down_amt: f64, bend_amt: f64, vel_amt: f64) -> f64 {
    0.5 * unit(down_amt) + 0.3 * unit(bend_amt) + 0.2 * unit(vel_amt)
}

/// Weighted blend of top-posture cues. Each term is clamped to [0, 1].
pub fn readiness(near_top: f64, straight_arms: f64, straight_torso: f64) -> f64 {
    0.6 * unit(near_top) + 0.3 * unit(straight_arms) + 0.1 * unit(straight_torso)
}

/// Downward displacement measured in down thresholds.
pub fn down_amount(displacement: f64, down_threshold: f64) -> f64 {
    unit(displacement / down_threshold.max(1.0))
}

/// 0 with straight arms, 1 once the elbow has closed by `bend_span_deg`.
pub fn bend_amount(elbow_deg: f64, config: &RepConfig) -> f64 {
    unit((config.neutral_elbow_deg - elbow_deg) / config.bend_span_deg)
}

/// Downward velocity (down thresholds per second) relative to a brisk descent.
pub fn velocity_amount(velocity: f64, config: &RepConfig) -> f64 {
    unit(velocity / config.full_velocity)
}

pub fn near_top_amount(displacement: f64, up_threshold: f64, config: &RepConfig) -> f64 {
    unit(1.0 - displacement.abs() / (up_threshold.max(1.0) * config.near_top_span))
}

pub fn straight_arms_amount(elbow_deg: f64, config: &RepConfig) -> f64 {
    unit((elbow_deg - config.straight_from_deg) / config.straight_span_deg)
}

pub fn straight_torso_amount(torso_deg: f64, config: &RepConfig) -> f64 {
    unit(1.0 - torso_deg.abs() / config.torso_tolerance_deg)
}

fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
