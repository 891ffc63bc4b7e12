pub mod foreground;

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use foreground::{ForegroundEvent, ForegroundMonitor};

use crate::{
    overlay::{OverlayCommand, OverlayController},
    store::LockStore,
};

// Foreground churn is constant; keep dispatch logging on but at debug level.
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Runs the synchronous filter/lookup step, then forwards any resulting
/// command to the lock gate.
pub async fn dispatch(
    monitor: &Mutex<ForegroundMonitor>,
    store: &LockStore,
    overlay: &OverlayController,
    event: &ForegroundEvent,
) -> Option<OverlayCommand> {
    let command = {
        let mut guard = monitor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.handle(event, store)
    }?;

    log_debug!("foreground {} -> {:?}", command.package(), command);
    overlay.apply(command.clone()).await;
    Some(command)
}

/// Consumes the platform's foreground-change subscription until it closes or
/// the token is cancelled.
pub async fn foreground_loop(
    mut events: mpsc::Receiver<ForegroundEvent>,
    monitor: Arc<Mutex<ForegroundMonitor>>,
    store: LockStore,
    overlay: OverlayController,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("foreground monitor shutting down");
                break;
            }
            event = events.recv() => {
                let Some(event) = event else {
                    log_info!("foreground subscription closed");
                    break;
                };
                dispatch(&monitor, &store, &overlay, &event).await;
            }
        }
    }
}
