//! GUI application state management.
//!
//! Tracks text input for the settings, the latest detection results and the
//! run status for display.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::automation::settings::{AutomationSettings, SettingField};
use crate::automation::snapshot::DetectionSnapshot;

/// How long the operator has to move the cursor onto a target.
pub const PICK_COUNTDOWN: Duration = Duration::from_secs(3);

/// Run status for display in GUI.
#[derive(Clone, Debug, Default)]
pub enum AutomationStatus {
    /// Not running
    #[default]
    Suspended,
    /// Poller and sequencer are active
    Running,
    /// Last run ended on an error
    Error(String),
}

impl AutomationStatus {
    pub fn status_text(&self) -> String {
        match self {
            Self::Running => "Status: Running".to_string(),
            Self::Suspended | Self::Error(_) => "Status: Suspended".to_string(),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// What a cursor pick will set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PickTarget {
    /// First corner of the capture region
    RegionStart,
    /// Opposite corner, with the first corner already taken
    RegionEnd((i32, i32)),
    FirstPoint,
    SecondPoint,
}

impl PickTarget {
    pub fn prompt(&self) -> &'static str {
        match self {
            PickTarget::RegionStart => "Hover the top-left corner of the pip area",
            PickTarget::RegionEnd(_) => "Hover the bottom-right corner of the pip area",
            PickTarget::FirstPoint => "Hover the reroll button",
            PickTarget::SecondPoint => "Hover the confirm button",
        }
    }
}

/// A cursor pick waiting for its countdown to run out.
#[derive(Clone, Copy, Debug)]
pub struct PendingPick {
    pub target: PickTarget,
    pub deadline: Instant,
}

impl PendingPick {
    pub fn new(target: PickTarget) -> Self {
        Self {
            target,
            deadline: Instant::now() + PICK_COUNTDOWN,
        }
    }

    pub fn remaining_secs(&self) -> u64 {
        self.deadline
            .saturating_duration_since(Instant::now())
            .as_secs()
            + 1
    }

    pub fn is_due(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// GUI application state.
pub struct GuiState {
    pub status: AutomationStatus,
    /// Operator message line
    pub message: String,
    /// Text currently in each numeric field
    pub inputs: Vec<(SettingField, String)>,
    pub window_title: String,
    pub latest: Arc<DetectionSnapshot>,
    pub pick: Option<PendingPick>,
}

impl GuiState {
    pub fn new(settings: &AutomationSettings, latest: Arc<DetectionSnapshot>) -> Self {
        Self {
            status: AutomationStatus::Suspended,
            message: String::new(),
            inputs: SettingField::ALL
                .iter()
                .map(|f| (*f, settings.field_text(*f)))
                .collect(),
            window_title: settings.window_title.clone(),
            latest,
            pick: None,
        }
    }

    /// Resets a field's text to the stored value after rejected input.
    pub fn reset_input(&mut self, field: SettingField, settings: &AutomationSettings) {
        if let Some((_, text)) = self.inputs.iter_mut().find(|(f, _)| *f == field) {
            *text = settings.field_text(field);
        }
    }
}
