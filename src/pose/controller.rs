use anyhow::{Context, Result};
use log::info;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{grant::GrantSender, store::LockStore};

use super::{
    config::RepConfig,
    detector::RepEvent,
    worker::{rep_loop, AttemptContext, AttemptSummary, FrameSink},
};

/// What the caller gets for a running attempt: where to push frames and
/// where to read events from.
pub struct AttemptHandle {
    pub session_id: String,
    pub package: String,
    pub frames: FrameSink,
    pub events: mpsc::UnboundedReceiver<RepEvent>,
}

struct ActiveAttempt {
    package: String,
    session_id: String,
    cancel_token: CancellationToken,
    handle: JoinHandle<AttemptSummary>,
}

/// Owns at most one exercise attempt and its worker.
pub struct ExerciseController {
    config: RepConfig,
    store: LockStore,
    grants: GrantSender,
    active: Option<ActiveAttempt>,
}

impl ExerciseController {
    pub fn new(config: RepConfig, store: LockStore, grants: GrantSender) -> Self {
        Self {
            config,
            store,
            grants,
            active: None,
        }
    }

    pub fn active_package(&self) -> Option<&str> {
        self.active.as_ref().map(|attempt| attempt.package.as_str())
    }

    /// Starts a fresh attempt for `package`. Any running attempt is torn down
    /// first; its summary is returned alongside the new handle.
    pub async fn start_attempt(
        &mut self,
        package: &str,
    ) -> Result<(AttemptHandle, Option<AttemptSummary>)> {
        let previous = self.finish().await?;

        let session_id = Uuid::new_v4().to_string();
        let cancel_token = CancellationToken::new();
        let (frames, frames_rx) = FrameSink::channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let ctx = AttemptContext {
            package: package.to_string(),
            session_id: session_id.clone(),
            config: self.config.clone(),
            store: self.store.clone(),
            grants: self.grants.clone(),
        };
        let handle = tokio::spawn(rep_loop(ctx, frames_rx, events_tx, cancel_token.clone()));

        info!("Exercise attempt {session_id} started for {package}");
        self.active = Some(ActiveAttempt {
            package: package.to_string(),
            session_id: session_id.clone(),
            cancel_token,
            handle,
        });

        Ok((
            AttemptHandle {
                session_id,
                package: package.to_string(),
                frames,
                events: events_rx,
            },
            previous,
        ))
    }

    /// Stops the running attempt, if any, and waits for its worker.
    pub async fn finish(&mut self) -> Result<Option<AttemptSummary>> {
        let Some(attempt) = self.active.take() else {
            return Ok(None);
        };

        attempt.cancel_token.cancel();
        let summary = attempt
            .handle
            .await
            .with_context(|| format!("rep worker for {} failed to join", attempt.session_id))?;
        info!(
            "Exercise attempt {} for {} ended: {} rep(s), {}s earned",
            summary.session_id, summary.package, summary.reps, summary.seconds_granted
        );
        Ok(Some(summary))
    }
}
