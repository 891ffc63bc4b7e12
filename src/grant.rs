//! Decoupled path from completed reps to the lock store and the lock gate.
//!
//! Delivery is fire-and-forget: senders never wait for the grant to land, and
//! a grant for a package with no active overlay still updates the store.

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{overlay::OverlayController, store::LockStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grant {
    pub package: String,
    pub seconds: u32,
}

#[derive(Clone)]
pub struct GrantSender {
    tx: mpsc::UnboundedSender<Grant>,
}

impl GrantSender {
    pub fn send(&self, grant: Grant) {
        if let Err(err) = self.tx.send(grant) {
            warn!("Grant bridge closed; dropping grant for {}", err.0.package);
        }
    }
}

pub struct GrantBridge;

impl GrantBridge {
    pub fn spawn(
        store: LockStore,
        overlay: OverlayController,
        cancel_token: CancellationToken,
    ) -> (GrantSender, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(grant_loop(rx, store, overlay, cancel_token));
        (GrantSender { tx }, handle)
    }
}

async fn grant_loop(
    mut rx: mpsc::UnboundedReceiver<Grant>,
    store: LockStore,
    overlay: OverlayController,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                // Earned time is never dropped: apply what is already queued.
                rx.close();
                while let Ok(grant) = rx.try_recv() {
                    apply_grant(&store, &overlay, grant).await;
                }
                debug!("grant bridge shutting down");
                break;
            }
            grant = rx.recv() => {
                let Some(grant) = grant else { break };
                apply_grant(&store, &overlay, grant).await;
            }
        }
    }
}

pub async fn apply_grant(store: &LockStore, overlay: &OverlayController, grant: Grant) {
    match store.grant_seconds(&grant.package, i64::from(grant.seconds)) {
        Ok(Some(remaining)) => {
            info!(
                "Granted {}s to {} ({}s remaining)",
                grant.seconds, grant.package, remaining
            );
        }
        Ok(None) => {
            debug!("Ignoring grant for unlocked package {}", grant.package);
            return;
        }
        Err(err) => {
            // The in-memory value is already updated; only the write failed.
            error!("Failed to persist grant for {}: {err:#}", grant.package);
        }
    }

    overlay.on_grant(&grant.package).await;
}
