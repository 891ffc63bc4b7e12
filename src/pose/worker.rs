use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::{
    grant::{Grant, GrantSender},
    store::LockStore,
};

use super::{
    config::RepConfig,
    detector::{RepDetector, RepEvent},
    frame::FrameInput,
};

// Per-frame logging is noisy; flip on when tuning the detector.
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Producer side of the keep-only-latest frame slot. Submitting never blocks:
/// a frame that arrives while the worker is busy replaces the pending one.
#[derive(Clone)]
pub struct FrameSink {
    tx: watch::Sender<Option<FrameInput>>,
}

impl FrameSink {
    pub(crate) fn channel() -> (Self, watch::Receiver<Option<FrameInput>>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, rx)
    }

    /// Returns false once the attempt has ended and nobody is listening.
    pub fn submit(&self, input: impl Into<FrameInput>) -> bool {
        self.tx.send_replace(Some(input.into()));
        !self.tx.is_closed()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSummary {
    pub package: String,
    pub session_id: String,
    pub reps: u32,
    pub seconds_granted: u64,
}

pub(crate) struct AttemptContext {
    pub package: String,
    pub session_id: String,
    pub config: RepConfig,
    pub store: LockStore,
    pub grants: GrantSender,
}

pub(crate) async fn rep_loop(
    ctx: AttemptContext,
    mut frames: watch::Receiver<Option<FrameInput>>,
    events_tx: mpsc::UnboundedSender<RepEvent>,
    cancel_token: CancellationToken,
) -> AttemptSummary {
    let mut detector = RepDetector::new(ctx.config.clone());
    let mut summary = AttemptSummary {
        package: ctx.package.clone(),
        session_id: ctx.session_id.clone(),
        reps: 0,
        seconds_granted: 0,
    };

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("rep worker for {} shutting down", ctx.session_id);
                break;
            }
            changed = frames.changed() => {
                if changed.is_err() {
                    log_info!("frame source for {} closed", ctx.session_id);
                    break;
                }

                let input = (*frames.borrow_and_update()).clone();
                let frame = match input {
                    Some(FrameInput::Pose(frame)) => frame,
                    Some(FrameInput::Failed(reason)) => {
                        log_debug!("dropping failed pose frame: {reason}");
                        continue;
                    }
                    None => continue,
                };

                for event in detector.process(&frame) {
                    if let RepEvent::RepCompleted { count } = event {
                        summary.reps = count;
                        summary.seconds_granted += request_grant(&ctx);
                    }
                    // A dropped listener does not end the attempt; grants still flow.
                    let _ = events_tx.send(event);
                }
            }
        }
    }

    summary
}

/// Looks up the current rate and hands the grant to the bridge.
fn request_grant(ctx: &AttemptContext) -> u64 {
    let Some(record) = ctx.store.get(&ctx.package) else {
        log_warn!("{} is no longer locked; rep earns nothing", ctx.package);
        return 0;
    };

    let seconds = record.grant_per_rep();
    log_info!("rep completed for {}: granting {}s", ctx.package, seconds);
    ctx.grants.send(Grant {
        package: ctx.package.clone(),
        seconds,
    });
    u64::from(seconds)
}
