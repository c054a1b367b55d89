//! Operator-controlled automation settings.
//!
//! Settings are written by the GUI and read by the poller and sequencer once
//! per cycle. Readers take a cloned snapshot, so no lock is held while
//! capturing, classifying or clicking.

use serde::{Deserialize, Serialize};
#[cfg(any(windows, test))]
use std::sync::{Arc, RwLock};
use thiserror::Error;

use crate::automation::input::ScreenPoint;
use crate::capture::CaptureRegion;
use crate::detection::RankTable;

/// Complete set of operator settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationSettings {
    /// Maximum per-channel color difference for a pixel to match a rank
    pub color_tolerance: u8,
    /// Maximum edge distance (px) for two fragments to be merged into one pip
    pub merge_tolerance: u32,
    /// Delay after each click (ms)
    pub click_delay_ms: u64,
    /// Pause after a full reroll before the next one (ms)
    pub post_reroll_delay_ms: u64,
    /// Delay between detection cycles (ms)
    pub poll_delay_ms: u64,
    /// Lowest rank that counts toward `min_objects`
    pub min_rank: String,
    /// Number of pips at `min_rank` or better that stops rerolling
    pub min_objects: u32,
    /// Number of top-rank pips that stops rerolling; 0 disables
    pub stop_at_top: u32,
    /// Screen region to scan for pips
    pub region: Option<CaptureRegion>,
    /// First click target (the reroll button)
    pub first_point: Option<ScreenPoint>,
    /// Second click target (the confirm/buy button)
    pub second_point: Option<ScreenPoint>,
    /// Title (or part of it) of the game window
    pub window_title: String,
}

impl Default for AutomationSettings {
    fn default() -> Self {
        Self {
            color_tolerance: 10,
            merge_tolerance: 10,
            click_delay_ms: 50,
            post_reroll_delay_ms: 500,
            poll_delay_ms: 10,
            min_rank: "F".to_string(),
            min_objects: 1,
            stop_at_top: 0,
            region: None,
            first_point: None,
            second_point: None,
            window_title: "Roblox".to_string(),
        }
    }
}

/// Numeric settings that are edited as free text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingField {
    ColorTolerance,
    MergeTolerance,
    ClickDelay,
    PostRerollDelay,
    PollDelay,
    MinObjects,
    StopAtTop,
}

impl SettingField {
    pub const ALL: [SettingField; 7] = [
        SettingField::ClickDelay,
        SettingField::PostRerollDelay,
        SettingField::PollDelay,
        SettingField::ColorTolerance,
        SettingField::MergeTolerance,
        SettingField::StopAtTop,
        SettingField::MinObjects,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SettingField::ColorTolerance => "Color Tolerance:",
            SettingField::MergeTolerance => "Object Tolerance (px):",
            SettingField::ClickDelay => "Click Delay (ms):",
            SettingField::PostRerollDelay => "Post Reroll Delay (ms):",
            SettingField::PollDelay => "Image Poll Delay (ms):",
            SettingField::MinObjects => "Minimum Objects:",
            SettingField::StopAtTop => "Minimum Top Rank:",
        }
    }

    #[cfg(any(windows, test))]
    pub fn hint(&self) -> &'static str {
        match self {
            SettingField::ColorTolerance => {
                "How close a color must be to count as a match.\nIncrease if detection is unreliable."
            }
            SettingField::MergeTolerance => {
                "How close detected objects must be (in pixels) to be merged as one pip.\nIncrease if pips are split into multiple boxes."
            }
            SettingField::ClickDelay => {
                "Delay in milliseconds between simulated clicks.\nIncrease if the game lags or misses clicks."
            }
            SettingField::PostRerollDelay => {
                "Delay in milliseconds between rerolls.\nSetting this value too low might reroll or delete\nthe item underneath the one you're rerolling."
            }
            SettingField::PollDelay => {
                "How often to check for pips (in milliseconds).\nLower values update faster but use more CPU."
            }
            SettingField::MinObjects => {
                "Minimum number of pips (of the selected quality or higher) required to stop rerolling."
            }
            SettingField::StopAtTop => {
                "Minimum number of top-rank pips required to stop rerolling. 0 disables."
            }
        }
    }

    /// Inclusive accepted range.
    fn range(&self) -> (u64, u64) {
        match self {
            SettingField::ColorTolerance => (0, 255),
            SettingField::MinObjects => (1, u32::MAX as u64),
            SettingField::MergeTolerance | SettingField::StopAtTop => (0, u32::MAX as u64),
            SettingField::ClickDelay | SettingField::PostRerollDelay | SettingField::PollDelay => {
                (0, u64::MAX)
            }
        }
    }
}

impl std::fmt::Display for SettingField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label().trim_end_matches(':'))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[cfg(any(windows, test))]
    #[error("{0}: not a number")]
    NotANumber(SettingField),
    #[error("{field}: must be between {min} and {max}")]
    OutOfRange { field: SettingField, min: u64, max: u64 },
    #[error("unknown rank '{0}'")]
    UnknownRank(String),
}

impl AutomationSettings {
    fn field_value(&self, field: SettingField) -> u64 {
        match field {
            SettingField::ColorTolerance => self.color_tolerance as u64,
            SettingField::MergeTolerance => self.merge_tolerance as u64,
            SettingField::ClickDelay => self.click_delay_ms,
            SettingField::PostRerollDelay => self.post_reroll_delay_ms,
            SettingField::PollDelay => self.poll_delay_ms,
            SettingField::MinObjects => self.min_objects as u64,
            SettingField::StopAtTop => self.stop_at_top as u64,
        }
    }

    /// Stores a value already checked against the field's range.
    fn set_field_value(&mut self, field: SettingField, value: u64) {
        match field {
            SettingField::ColorTolerance => self.color_tolerance = value as u8,
            SettingField::MergeTolerance => self.merge_tolerance = value as u32,
            SettingField::ClickDelay => self.click_delay_ms = value,
            SettingField::PostRerollDelay => self.post_reroll_delay_ms = value,
            SettingField::PollDelay => self.poll_delay_ms = value,
            SettingField::MinObjects => self.min_objects = value as u32,
            SettingField::StopAtTop => self.stop_at_top = value as u32,
        }
    }

    /// Current value of a numeric field, as text.
    #[cfg(any(windows, test))]
    pub fn field_text(&self, field: SettingField) -> String {
        self.field_value(field).to_string()
    }

    #[cfg(any(windows, test))]
    /// Parses and applies operator text input for a numeric field.
    ///
    /// On error the setting keeps its previous value.
    pub fn apply_input(&mut self, field: SettingField, input: &str) -> Result<(), SettingsError> {
        let value: u64 = input
            .trim()
            .parse()
            .map_err(|_| SettingsError::NotANumber(field))?;
        let (min, max) = field.range();
        if value < min || value > max {
            return Err(SettingsError::OutOfRange { field, min, max });
        }

        self.set_field_value(field, value);
        Ok(())
    }

    /// Resets every value operator input would have rejected: numeric fields
    /// out of range and a minimum rank missing from `ranks`.
    ///
    /// Returns one error per reset field. An unknown minimum rank becomes the
    /// default rank if the table has it, otherwise the lowest rank.
    pub fn sanitize(&mut self, ranks: &RankTable) -> Vec<SettingsError> {
        let defaults = AutomationSettings::default();
        let mut rejected = Vec::new();

        for field in SettingField::ALL {
            let (min, max) = field.range();
            let value = self.field_value(field);
            if value < min || value > max {
                rejected.push(SettingsError::OutOfRange { field, min, max });
                self.set_field_value(field, defaults.field_value(field));
            }
        }

        if ranks.get(&self.min_rank).is_none() {
            rejected.push(SettingsError::UnknownRank(self.min_rank.clone()));
            self.min_rank = if ranks.get(&defaults.min_rank).is_some() {
                defaults.min_rank
            } else {
                ranks.lowest().name.clone()
            };
        }

        rejected
    }

    #[cfg(any(windows, test))]
    pub fn set_min_rank(&mut self, name: &str, ranks: &RankTable) -> Result<(), SettingsError> {
        if ranks.get(name).is_none() {
            return Err(SettingsError::UnknownRank(name.to_string()));
        }
        self.min_rank = name.to_string();
        Ok(())
    }

    #[cfg(any(windows, test))]
    /// `key=value` pairs describing every setting, for the event log.
    pub fn describe(&self) -> Vec<(&'static str, String)> {
        fn opt<T: std::fmt::Display>(value: &Option<T>) -> String {
            value
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "None".to_string())
        }

        vec![
            ("min_rank", self.min_rank.clone()),
            ("min_objects", self.min_objects.to_string()),
            ("stop_at_top", self.stop_at_top.to_string()),
            ("tolerance", self.color_tolerance.to_string()),
            ("object_tolerance", self.merge_tolerance.to_string()),
            ("click_delay_ms", self.click_delay_ms.to_string()),
            ("post_reroll_delay_ms", self.post_reroll_delay_ms.to_string()),
            ("poll_delay_ms", self.poll_delay_ms.to_string()),
            ("region", opt(&self.region)),
            ("first_point", opt(&self.first_point)),
            ("second_point", opt(&self.second_point)),
        ]
    }
}

/// Settings shared between the GUI (writer) and the automation threads.
#[cfg(any(windows, test))]
#[derive(Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<AutomationSettings>>,
}

#[cfg(any(windows, test))]
impl SharedSettings {
    pub fn new(settings: AutomationSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Cloned copy of the current settings.
    pub fn snapshot(&self) -> AutomationSettings {
        self.inner
            .read()
            .map(|s| s.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    /// Applies a change under the write lock.
    pub fn update<R>(&self, f: impl FnOnce(&mut AutomationSettings) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}
