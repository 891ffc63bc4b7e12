use std::sync::{Arc, Mutex as StdMutex};

use anyhow::{bail, Result};
use log::{info, warn};
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    grant::GrantBridge,
    monitor::{self, ForegroundEvent, ForegroundMonitor},
    overlay::{OverlayCommand, OverlayController, OverlayState, OverlaySurface},
    pose::{AttemptHandle, AttemptSummary, ExerciseController},
    settings::EngineSettings,
    store::{LockStore, LockedAppRecord},
};

/// The exercise-gated unlock engine: store, monitor, lock gate, rep worker
/// and grant bridge, wired together. Must be created inside a tokio runtime.
#[derive(Clone)]
pub struct LockEngine {
    settings: Arc<EngineSettings>,
    store: LockStore,
    monitor: Arc<StdMutex<ForegroundMonitor>>,
    overlay: OverlayController,
    exercise: Arc<Mutex<ExerciseController>>,
    bridge: Arc<Mutex<Option<JoinHandle<()>>>>,
    cancel_token: CancellationToken,
}

impl LockEngine {
    pub fn new(
        settings: EngineSettings,
        store: LockStore,
        surface: Arc<dyn OverlaySurface>,
    ) -> Self {
        let cancel_token = CancellationToken::new();
        let overlay = OverlayController::new(store.clone(), surface, settings.tick_interval());
        let (grants, bridge) =
            GrantBridge::spawn(store.clone(), overlay.clone(), cancel_token.child_token());
        let exercise = ExerciseController::new(settings.rep.clone(), store.clone(), grants);

        Self {
            monitor: Arc::new(StdMutex::new(ForegroundMonitor::from_settings(&settings))),
            settings: Arc::new(settings),
            store,
            overlay,
            exercise: Arc::new(Mutex::new(exercise)),
            bridge: Arc::new(Mutex::new(Some(bridge))),
            cancel_token,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn store(&self) -> &LockStore {
        &self.store
    }

    pub async fn overlay_state(&self) -> OverlayState {
        self.overlay.get_state().await
    }

    pub fn set_lock(&self, package: &str, minutes_per_rep: u32) -> Result<LockedAppRecord> {
        let record = self.store.set_lock(package, minutes_per_rep)?;
        info!("Locked {package} at {minutes_per_rep} min/rep");
        Ok(record)
    }

    /// Removes the lock and tears down any attempt or overlay tied to it.
    pub async fn remove_lock(&self, package: &str) -> Result<()> {
        self.store.remove_lock(package)?;
        {
            let mut exercise = self.exercise.lock().await;
            if exercise.active_package() == Some(package) {
                exercise.finish().await?;
            }
        }
        self.overlay.remove(package).await;
        info!("Unlocked {package}");
        Ok(())
    }

    /// Inbound signal A. Returns the command that was dispatched, if any.
    pub async fn on_foreground_changed(&self, event: ForegroundEvent) -> Option<OverlayCommand> {
        monitor::dispatch(&self.monitor, &self.store, &self.overlay, &event).await
    }

    /// Consumes a foreground subscription in the background.
    pub fn attach_foreground(&self, events: mpsc::Receiver<ForegroundEvent>) -> JoinHandle<()> {
        tokio::spawn(monitor::foreground_loop(
            events,
            self.monitor.clone(),
            self.store.clone(),
            self.overlay.clone(),
            self.cancel_token.child_token(),
        ))
    }

    /// Starts an exercise attempt for a locked package, replacing any running one.
    pub async fn start_exercise(&self, package: &str) -> Result<AttemptHandle> {
        if self.store.get(package).is_none() {
            bail!("{package} is not locked");
        }

        let mut exercise = self.exercise.lock().await;
        let (handle, previous) = exercise.start_attempt(package).await?;
        if let Some(previous) = previous {
            self.overlay.cancel_exercise(&previous.package).await;
        }
        if !self.overlay.begin_exercise(package).await {
            info!("No hard block for {package}; exercising without overlay");
        }
        Ok(handle)
    }

    /// Ends the running attempt. If it earned nothing, the hard block returns.
    pub async fn finish_exercise(&self) -> Result<Option<AttemptSummary>> {
        let summary = self.exercise.lock().await.finish().await?;
        if let Some(summary) = &summary {
            self.overlay.cancel_exercise(&summary.package).await;
        }
        Ok(summary)
    }

    pub async fn cancel_exercise(&self) -> Result<()> {
        if let Some(summary) = self.finish_exercise().await? {
            warn!(
                "Exercise for {} cancelled after {} rep(s)",
                summary.package, summary.reps
            );
        }
        Ok(())
    }

    /// Stops every background task and clears the overlay. Grants already
    /// queued by the finished attempt land in the store before this returns.
    pub async fn shutdown(&self) -> Result<()> {
        self.finish_exercise().await?;
        self.cancel_token.cancel();
        if let Some(bridge) = self.bridge.lock().await.take() {
            if let Err(err) = bridge.await {
                warn!("Grant bridge ended abnormally: {err}");
            }
        }
        self.overlay.clear().await;
        Ok(())
    }
}
