use anyhow::Result;
use log::{info, warn};

use super::OverlayMode;

/// The external rendering surface that draws over other apps.
///
/// Implementations must not block; the controller calls them while holding
/// its state lock.
pub trait OverlaySurface: Send + Sync {
    /// Out-of-band "draw over other apps" permission, queried before each render.
    fn can_draw_overlays(&self) -> bool;

    fn show(&self, package: &str, mode: OverlayMode, status: &str) -> Result<()>;

    fn update_status(&self, package: &str, status: &str);

    fn hide(&self, package: &str);

    /// Tells the user the permission is missing. Called at most once per denial streak.
    fn advise_permission_missing(&self);
}

/// Surface that only logs the commands it receives, for headless runs.
pub struct LogSurface {
    can_draw: bool,
}

impl LogSurface {
    pub fn new(can_draw: bool) -> Self {
        Self { can_draw }
    }
}

impl OverlaySurface for LogSurface {
    fn can_draw_overlays(&self) -> bool {
        self.can_draw
    }

    fn show(&self, package: &str, mode: OverlayMode, status: &str) -> Result<()> {
        info!("show-overlay {package} {mode:?} [{status}]");
        Ok(())
    }

    fn update_status(&self, package: &str, status: &str) {
        info!("overlay-status {package} [{status}]");
    }

    fn hide(&self, package: &str) {
        info!("remove-overlay {package}");
    }

    fn advise_permission_missing(&self) {
        warn!("Overlay permission missing: enable 'Display over other apps' to block locked apps");
    }
}
