pub mod config;
pub mod controller;
pub mod detector;
pub mod frame;
pub mod scoring;
pub mod worker;

pub use config::RepConfig;
pub use controller::{AttemptHandle, ExerciseController};
pub use detector::{DetectorSnapshot, RepDetector, RepEvent, RepPhase};
pub use frame::{FrameInput, Point, PoseFrame};
pub use worker::{AttemptSummary, FrameSink};
