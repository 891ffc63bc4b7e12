mod engine;
mod grant;
mod monitor;
mod overlay;
mod pose;
mod settings;
mod store;
mod utils;

use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

pub use engine::LockEngine;
pub use grant::{Grant, GrantSender};
pub use monitor::{ForegroundEvent, ForegroundMonitor};
pub use overlay::{
    LogSurface, OverlayCommand, OverlayMode, OverlayPhase, OverlayState, OverlaySurface,
};
pub use pose::{
    AttemptHandle, AttemptSummary, DetectorSnapshot, FrameInput, FrameSink, Point, PoseFrame,
    RepConfig, RepDetector, RepEvent, RepPhase,
};
pub use settings::EngineSettings;
pub use store::{LockStore, LockedAppRecord};

/// One line of driver input.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCommand {
    Lock { package: String, minutes: Option<u32> },
    Unlock { package: String },
    Open { package: String },
    Exercise { package: String },
    Frame(PoseFrame),
    Finish,
    Cancel,
    Status,
    List,
    Quit,
}

pub fn parse_command(line: &str) -> Result<DriverCommand> {
    let line = line.trim();
    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let package = || -> Result<String> {
        rest.split_whitespace()
            .next()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("`{verb}` needs a package name"))
    };

    Ok(match verb {
        "lock" => {
            let minutes = rest
                .split_whitespace()
                .nth(1)
                .map(|value| value.parse::<u32>())
                .transpose()
                .context("minutes per rep must be a whole number")?;
            DriverCommand::Lock {
                package: package()?,
                minutes,
            }
        }
        "unlock" => DriverCommand::Unlock { package: package()? },
        "open" => DriverCommand::Open { package: package()? },
        "exercise" => DriverCommand::Exercise { package: package()? },
        "frame" => DriverCommand::Frame(
            serde_json::from_str(rest).context("frame must be a JSON pose frame")?,
        ),
        "finish" => DriverCommand::Finish,
        "cancel" => DriverCommand::Cancel,
        "status" => DriverCommand::Status,
        "list" => DriverCommand::List,
        "quit" | "exit" => DriverCommand::Quit,
        "" => bail!("empty command"),
        other => bail!("unknown command `{other}`"),
    })
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Headless driver: stdin commands in, overlay commands logged out.
pub fn run() -> Result<()> {
    let level = if env_flag("PUSHLOCK_DEBUG") {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    info!("PushLock starting up...");

    let data_dir = std::env::var_os("PUSHLOCK_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".pushlock"));
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let settings = EngineSettings::load_or_seed(&data_dir.join("settings.json"))?;
    let store = LockStore::open(data_dir.join("locks.json"))?;
    let surface = Arc::new(LogSurface::new(!env_flag("PUSHLOCK_NO_OVERLAY")));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(async move {
        let engine = LockEngine::new(settings, store, surface);
        drive(&engine).await?;
        engine.shutdown().await
    })
}

async fn drive(engine: &LockEngine) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut frames: Option<FrameSink> = None;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(err) => {
                warn!("{err:#}");
                continue;
            }
        };

        let outcome = match command {
            DriverCommand::Quit => break,
            DriverCommand::Lock { package, minutes } => {
                let minutes = minutes.unwrap_or(engine.settings().default_minutes_per_rep);
                engine.set_lock(&package, minutes).map(|_| ())
            }
            DriverCommand::Unlock { package } => engine.remove_lock(&package).await,
            DriverCommand::Open { package } => {
                engine.on_foreground_changed(ForegroundEvent::now(package)).await;
                Ok(())
            }
            DriverCommand::Exercise { package } => {
                engine.start_exercise(&package).await.map(|attempt| {
                    frames = Some(attempt.frames);
                    tokio::spawn(log_rep_events(attempt.events));
                })
            }
            DriverCommand::Frame(frame) => match &frames {
                Some(sink) if sink.submit(frame) => Ok(()),
                _ => Err(anyhow!("no exercise attempt is running")),
            },
            DriverCommand::Cancel => {
                frames = None;
                engine.cancel_exercise().await
            }
            DriverCommand::Finish => {
                frames = None;
                engine.finish_exercise().await.map(|summary| {
                    if let Some(summary) = summary {
                        info!(
                            "attempt {}: {} rep(s), {}s earned for {}",
                            summary.session_id,
                            summary.reps,
                            summary.seconds_granted,
                            summary.package
                        );
                    }
                })
            }
            DriverCommand::Status => {
                let state = engine.overlay_state().await;
                info!(
                    "overlay: {:?} target={} status=[{}]",
                    state.phase,
                    state.target.as_deref().unwrap_or("-"),
                    state.status
                );
                Ok(())
            }
            DriverCommand::List => {
                for record in engine.store().list() {
                    info!(
                        "{}: {} min/rep, {}s left",
                        record.package, record.minutes_per_rep, record.remaining_seconds
                    );
                }
                Ok(())
            }
        };

        if let Err(err) = outcome {
            warn!("{err:#}");
        }
    }

    Ok(())
}

async fn log_rep_events(mut events: tokio::sync::mpsc::UnboundedReceiver<RepEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            RepEvent::StatusUpdate {
                readiness,
                push_probability,
            } => log::debug!("readiness={readiness:.2} push={push_probability:.2}"),
            RepEvent::Calibrating { progress } => log::debug!("calibrating {:.0}%", progress * 100.0),
            other => info!("{other:?}"),
        }
    }
}
