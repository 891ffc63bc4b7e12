use std::{
    collections::{HashMap, HashSet},
    time::{Duration, Instant},
};

use crate::{
    overlay::{OverlayCommand, OverlayMode},
    settings::EngineSettings,
    store::LockStore,
};

/// Entries older than the debounce window are pruned once the map grows past this.
const PRUNE_AFTER: usize = 256;

/// One OS "foreground app changed" notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForegroundEvent {
    pub package: String,
    pub at: Instant,
}

impl ForegroundEvent {
    pub fn now(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            at: Instant::now(),
        }
    }
}

/// Turns raw foreground notifications into overlay commands.
///
/// Runs synchronously on the callback path: a set lookup, a map lookup, and
/// one store read.
pub struct ForegroundMonitor {
    ignored: HashSet<String>,
    debounce: Duration,
    last_accepted: HashMap<String, Instant>,
}

impl ForegroundMonitor {
    pub fn new(ignored: impl IntoIterator<Item = String>, debounce: Duration) -> Self {
        Self {
            ignored: ignored.into_iter().collect(),
            debounce,
            last_accepted: HashMap::new(),
        }
    }

    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self::new(settings.ignore_list(), settings.debounce())
    }

    /// Ignore-list filter plus per-package debounce. Suppressed events do not
    /// extend the window.
    pub fn accept(&mut self, package: &str, at: Instant) -> bool {
        if package.is_empty() || self.ignored.contains(package) {
            return false;
        }

        if let Some(last) = self.last_accepted.get(package) {
            if at.saturating_duration_since(*last) < self.debounce {
                return false;
            }
        }

        if self.last_accepted.len() >= PRUNE_AFTER {
            let debounce = self.debounce;
            self.last_accepted
                .retain(|_, seen| at.saturating_duration_since(*seen) < debounce);
        }
        self.last_accepted.insert(package.to_string(), at);
        true
    }

    pub fn handle(&mut self, event: &ForegroundEvent, store: &LockStore) -> Option<OverlayCommand> {
        if !self.accept(&event.package, event.at) {
            return None;
        }

        let package = event.package.clone();
        Some(match store.get(&event.package) {
            None => OverlayCommand::Remove { package },
            Some(record) if record.is_blocked() => OverlayCommand::Show {
                package,
                mode: OverlayMode::HardBlock,
            },
            Some(_) => OverlayCommand::Show {
                package,
                mode: OverlayMode::CountdownVisible,
            },
        })
    }
}
