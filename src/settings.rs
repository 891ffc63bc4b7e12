use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::pose::RepConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    /// Our own package; never locked.
    pub host_package: String,
    /// Launchers and system UI that must never trigger lock actions.
    pub ignored_packages: Vec<String>,
    pub debounce_ms: u64,
    pub tick_interval_ms: u64,
    pub default_minutes_per_rep: u32,
    pub rep: RepConfig,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            host_package: "com.example.pushuplock".into(),
            ignored_packages: vec![
                "com.android.systemui".into(),
                "com.google.android.apps.nexuslauncher".into(),
                "com.android.launcher3".into(),
            ],
            debounce_ms: 300,
            tick_interval_ms: 1000,
            default_minutes_per_rep: 10,
            rep: RepConfig::default(),
        }
    }
}

impl EngineSettings {
    /// Loads settings from `path`. A missing file yields defaults, as does an
    /// unparsable one (with a warning).
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        Ok(serde_json::from_str(&contents).unwrap_or_else(|err| {
            warn!("Ignoring malformed settings at {}: {err}", path.display());
            Self::default()
        }))
    }

    /// Like `load`, but a missing file is created with every default spelled
    /// out so there is something to edit. Failing to write it is not fatal.
    pub fn load_or_seed(path: &Path) -> Result<Self> {
        let settings = Self::load(path)?;
        if !path.exists() {
            if let Err(err) = settings.save(path) {
                warn!("Could not write default settings to {}: {err:#}", path.display());
            }
        }
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// Every package that is filtered before lookup, host included.
    pub fn ignore_list(&self) -> Vec<String> {
        let mut packages = self.ignored_packages.clone();
        if !packages.contains(&self.host_package) {
            packages.push(self.host_package.clone());
        }
        packages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "debounceMs": 500, "rep": { "holdMs": 250 } }"#).unwrap();

        let settings = EngineSettings::load(&path).unwrap();
        assert_eq!(settings.debounce_ms, 500);
        assert_eq!(settings.rep.hold_ms, 250);
        assert_eq!(settings.rep.calibration_ms, RepConfig::default().calibration_ms);
        assert_eq!(settings.tick_interval_ms, 1000);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "debounce = 3").unwrap();

        let settings = EngineSettings::load(&path).unwrap();
        assert_eq!(settings.debounce_ms, 300);
    }

    #[test]
    fn missing_file_is_seeded_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let settings = EngineSettings::load_or_seed(&path).unwrap();
        assert_eq!(settings.debounce_ms, 300);
        assert!(path.exists());

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"tickIntervalMs\": 1000"));
        assert!(contents.contains("\"holdMs\": 180"));
    }

    #[test]
    fn existing_file_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "debounceMs": 450 }"#).unwrap();

        let settings = EngineSettings::load_or_seed(&path).unwrap();
        assert_eq!(settings.debounce_ms, 450);
        assert_eq!(fs::read_to_string(&path).unwrap(), r#"{ "debounceMs": 450 }"#);
    }

    #[test]
    fn ignore_list_includes_host() {
        let settings = EngineSettings::default();
        let ignored = settings.ignore_list();
        assert!(ignored.contains(&"com.example.pushuplock".to_string()));
        assert!(ignored.contains(&"com.android.systemui".to_string()));
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut settings = EngineSettings::default();
        settings.default_minutes_per_rep = 3;
        settings.save(&path).unwrap();

        assert_eq!(EngineSettings::load(&path).unwrap().default_minutes_per_rep, 3);
    }
}
