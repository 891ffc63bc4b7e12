pub mod controller;
pub mod state;
pub mod surface;

pub use controller::OverlayController;
pub use state::{format_status, OverlayCommand, OverlayMode, OverlayPhase, OverlayState};
pub use surface::{LogSurface, OverlaySurface};
