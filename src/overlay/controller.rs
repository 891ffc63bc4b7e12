use std::{sync::Arc, time::Duration};

use log::{debug, error, info, warn};
use tokio::{sync::Mutex, task::JoinHandle, time};

use crate::store::LockStore;

use super::{
    format_status, OverlayCommand, OverlayMode, OverlayPhase, OverlayState, OverlaySurface,
};

/// The lock gate: one target at a time, hard block or countdown.
///
/// Lock order is always `state` then `ticker`. The ticker task itself only
/// takes `state`, so it never blocks a command that is cancelling it.
#[derive(Clone)]
pub struct OverlayController {
    state: Arc<Mutex<OverlayState>>,
    store: LockStore,
    surface: Arc<dyn OverlaySurface>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    tick_interval: Duration,
}

impl OverlayController {
    pub fn new(store: LockStore, surface: Arc<dyn OverlaySurface>, tick_interval: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(OverlayState::new())),
            store,
            surface,
            ticker: Arc::new(Mutex::new(None)),
            tick_interval,
        }
    }

    pub async fn get_state(&self) -> OverlayState {
        self.state.lock().await.clone()
    }

    pub async fn apply(&self, command: OverlayCommand) {
        match command {
            OverlayCommand::Show { package, mode } => self.show(&package, mode).await,
            OverlayCommand::Remove { package } => self.dismiss_for(&package).await,
        }
    }

    pub async fn show(&self, package: &str, mode: OverlayMode) {
        let mut state = self.state.lock().await;

        if state.target.is_some() && !state.is_target(package) {
            self.teardown(&mut state, true).await;
        }

        let Some(record) = self.store.get(package) else {
            if state.is_target(package) {
                self.teardown(&mut state, true).await;
            }
            return;
        };

        // The store is the source of truth; a grant may have landed after the
        // command was computed.
        let countdown = record.remaining_seconds > 0;
        if countdown != (mode == OverlayMode::CountdownVisible) {
            debug!(
                "Overlay mode {mode:?} for {package} is stale ({}s left)",
                record.remaining_seconds
            );
        }

        if countdown {
            if state.is_target(package) && state.phase == OverlayPhase::Countdown {
                if !state.rendered {
                    self.render(&mut state, OverlayMode::CountdownVisible);
                }
                return;
            }
            self.enter_countdown(&mut state, package, record.remaining_seconds)
                .await;
        } else {
            if state.is_target(package) && state.phase == OverlayPhase::HardBlock {
                if !state.rendered && !state.exercising {
                    self.render(&mut state, OverlayMode::HardBlock);
                }
                return;
            }
            self.enter_hard_block(&mut state, package, true).await;
        }
    }

    /// Returns to idle if `package` is the current target; otherwise a no-op.
    /// Used when a lock is deleted.
    pub async fn remove(&self, package: &str) {
        let mut state = self.state.lock().await;
        if state.is_target(package) {
            self.teardown(&mut state, true).await;
        }
    }

    /// The foreground moved to `package`, which is not locked. Whatever is
    /// active belongs to an app that is no longer in front, so it goes too.
    pub async fn dismiss_for(&self, package: &str) {
        let mut state = self.state.lock().await;
        let Some(target) = state.target.clone() else {
            return;
        };
        if target != package {
            debug!("Foreground moved to {package}; dismissing overlay for {target}");
        }
        self.teardown(&mut state, true).await;
    }

    /// Withdraws the rendered block so the exercise flow is unobstructed. The
    /// logical target stays until a grant or a cancel.
    pub async fn begin_exercise(&self, package: &str) -> bool {
        let mut state = self.state.lock().await;
        if !state.is_target(package) || state.phase != OverlayPhase::HardBlock {
            return false;
        }
        if state.rendered {
            self.surface.hide(package);
            state.rendered = false;
        }
        state.exercising = true;
        info!("Hard block for {package} withdrawn for exercise");
        true
    }

    /// Restores the block if the attempt ended without earning time.
    pub async fn cancel_exercise(&self, package: &str) {
        let mut state = self.state.lock().await;
        if !state.is_target(package) || !state.exercising {
            return;
        }
        state.exercising = false;
        if state.phase == OverlayPhase::HardBlock {
            self.render(&mut state, OverlayMode::HardBlock);
        }
    }

    /// Reacts to granted time: a hard-blocked target switches straight to countdown.
    pub async fn on_grant(&self, package: &str) {
        let mut state = self.state.lock().await;
        if !state.is_target(package) || state.phase != OverlayPhase::HardBlock {
            return;
        }
        let remaining = self
            .store
            .get(package)
            .map(|record| record.remaining_seconds)
            .unwrap_or(0);
        if remaining > 0 {
            self.enter_countdown(&mut state, package, remaining).await;
        }
    }

    /// Tears down whatever is active.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        if state.target.is_some() {
            self.teardown(&mut state, true).await;
        }
    }

    /// One countdown second. Returns whether the ticker should keep running.
    pub(crate) async fn tick_once(&self, package: &str, generation: u64) -> bool {
        let mut state = self.state.lock().await;
        if state.generation != generation
            || state.phase != OverlayPhase::Countdown
            || !state.is_target(package)
        {
            return false;
        }

        let remaining = match self.store.grant_seconds(package, -1) {
            Ok(remaining) => remaining,
            Err(err) => {
                error!("Failed to persist countdown for {package}: {err:#}");
                self.store.get(package).map(|record| record.remaining_seconds)
            }
        };

        match remaining {
            None => {
                info!("Lock for {package} disappeared mid-countdown");
                self.teardown(&mut state, false).await;
                false
            }
            Some(0) => {
                info!("Time for {package} is up; re-locking");
                self.enter_hard_block(&mut state, package, false).await;
                false
            }
            Some(seconds) => {
                state.status = format_status(OverlayPhase::Countdown, seconds);
                if state.rendered {
                    self.surface.update_status(package, &state.status);
                }
                true
            }
        }
    }

    async fn enter_hard_block(&self, state: &mut OverlayState, package: &str, abort_ticker: bool) {
        self.stop_ticker(abort_ticker).await;
        self.hide_if_switching(state, package);
        state.begin(package, OverlayPhase::HardBlock);
        state.status = format_status(OverlayPhase::HardBlock, 0);
        info!("Overlay -> HARD_BLOCK({package})");
        self.render(state, OverlayMode::HardBlock);
    }

    async fn enter_countdown(&self, state: &mut OverlayState, package: &str, remaining: u32) {
        self.stop_ticker(true).await;
        self.hide_if_switching(state, package);
        let generation = state.begin(package, OverlayPhase::Countdown);
        state.status = format_status(OverlayPhase::Countdown, remaining);
        info!("Overlay -> COUNTDOWN({package}, {remaining}s)");
        self.render(state, OverlayMode::CountdownVisible);
        self.spawn_ticker(package.to_string(), generation).await;
        state.ticking = true;
    }

    /// `begin` forgets render state, so anything drawn for another target goes first.
    fn hide_if_switching(&self, state: &OverlayState, package: &str) {
        if let Some(previous) = state.target.as_deref() {
            if state.rendered && previous != package {
                self.surface.hide(previous);
            }
        }
    }

    async fn teardown(&self, state: &mut OverlayState, abort_ticker: bool) {
        self.stop_ticker(abort_ticker).await;
        if let (true, Some(target)) = (state.rendered, state.target.as_deref()) {
            self.surface.hide(target);
        }
        if let Some(target) = state.target.as_deref() {
            info!("Overlay -> IDLE (was {target})");
        }
        state.reset();
    }

    fn render(&self, state: &mut OverlayState, mode: OverlayMode) {
        let Some(target) = state.target.clone() else {
            return;
        };

        if !self.surface.can_draw_overlays() {
            state.rendered = false;
            if !state.advisory_shown {
                warn!("Cannot draw overlay for {target}: permission not granted");
                self.surface.advise_permission_missing();
                state.advisory_shown = true;
            }
            return;
        }

        match self.surface.show(&target, mode, &state.status) {
            Ok(()) => {
                state.rendered = true;
                state.advisory_shown = false;
            }
            Err(err) => {
                warn!("Overlay render for {target} failed: {err:#}");
                state.rendered = false;
            }
        }
    }

    async fn spawn_ticker(&self, package: String, generation: u64) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let controller = self.clone();
        let period = self.tick_interval;
        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(time::Instant::now() + period, period);
            loop {
                interval.tick().await;
                if !controller.tick_once(&package, generation).await {
                    break;
                }
            }
        });

        *ticker_guard = Some(handle);
    }

    /// Called from the ticker itself with `abort = false`: the task ends on
    /// its own once `tick_once` returns false.
    async fn stop_ticker(&self, abort: bool) {
        if let Some(handle) = self.ticker.lock().await.take() {
            if abort {
                handle.abort();
            }
        }
    }
}
