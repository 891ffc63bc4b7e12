use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum OverlayPhase {
    #[default]
    Idle,
    HardBlock,
    Countdown,
}

/// How the rendering surface should present a locked package.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum OverlayMode {
    HardBlock,
    CountdownVisible,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OverlayCommand {
    Show { package: String, mode: OverlayMode },
    Remove { package: String },
}

impl OverlayCommand {
    pub fn package(&self) -> &str {
        match self {
            OverlayCommand::Show { package, .. } | OverlayCommand::Remove { package } => package,
        }
    }
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct OverlayState {
    pub phase: OverlayPhase,
    pub target: Option<String>,
    pub ticking: bool,
    /// Whether the surface currently shows something for `target`.
    pub rendered: bool,
    /// Hard block withdrawn while an exercise attempt runs for `target`.
    pub exercising: bool,
    pub status: String,
    /// Bumped on every transition; a ticker only acts on its own generation.
    #[serde(skip)]
    pub(crate) generation: u64,
    #[serde(skip)]
    pub(crate) advisory_shown: bool,
}

impl OverlayState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_target(&self, package: &str) -> bool {
        self.target.as_deref() == Some(package)
    }

    /// Enters `phase` for `package` and returns the new generation.
    pub(crate) fn begin(&mut self, package: &str, phase: OverlayPhase) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.phase = phase;
        self.target = Some(package.to_string());
        self.ticking = false;
        self.rendered = false;
        self.exercising = false;
        self.generation
    }

    /// Back to idle. The advisory flag survives so it stays one-time.
    pub(crate) fn reset(&mut self) {
        let generation = self.generation.wrapping_add(1);
        let advisory_shown = self.advisory_shown;
        *self = Self {
            generation,
            advisory_shown,
            ..Self::default()
        };
    }
}

pub fn format_status(phase: OverlayPhase, remaining_seconds: u32) -> String {
    match phase {
        OverlayPhase::Idle => String::new(),
        OverlayPhase::HardBlock => "locked".to_string(),
        OverlayPhase::Countdown => format!(
            "time left: {:02}:{:02}",
            remaining_seconds / 60,
            remaining_seconds % 60
        ),
    }
}
