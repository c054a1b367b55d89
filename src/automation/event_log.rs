//! Structured per-cycle event log.
//!
//! The sequencer records one line per reroll while objects are on screen.
//! Lines are buffered in memory and written to a timestamped text file when
//! the operator asks for a dump.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::automation::settings::AutomationSettings;
use crate::automation::snapshot::RankCounts;
use crate::detection::DetectedObject;

/// Decision label recorded for every reroll cycle.
pub const DECISION_ROLLING: &str = "Rolling";

/// Receives one record per reroll cycle.
pub trait EventSink: Send + Sync {
    fn record(
        &self,
        objects: &[DetectedObject],
        counts: &RankCounts,
        settings: &AutomationSettings,
        decision: &str,
    );

    /// Number of buffered records waiting to be dumped.
    fn pending(&self) -> usize {
        0
    }
}

/// Discards every record. Used when event logging is disabled.
pub struct NoopEventLog;

impl EventSink for NoopEventLog {
    fn record(&self, _: &[DetectedObject], _: &RankCounts, _: &AutomationSettings, _: &str) {}
}

/// In-memory buffer of formatted event lines.
#[derive(Default)]
pub struct EventLog {
    buffer: Mutex<Vec<String>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes all buffered lines to `dir/pip_reroller_log_<timestamp>.txt`
    /// and clears the buffer.
    ///
    /// Returns `Ok(None)` without touching the filesystem when nothing is
    /// buffered. On a write error the buffer is kept.
    pub fn dump(&self, dir: &Path) -> Result<Option<PathBuf>> {
        let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        if buffer.is_empty() {
            return Ok(None);
        }

        let path = dir.join(dump_file_name(Local::now()));
        let file = File::create(&path)
            .with_context(|| format!("Failed to create event log {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        for line in buffer.iter() {
            writeln!(writer, "{}", line).context("Failed to write event log line")?;
        }
        writer.flush().context("Failed to flush event log")?;

        buffer.clear();
        Ok(Some(path))
    }
}

impl EventSink for EventLog {
    fn record(
        &self,
        objects: &[DetectedObject],
        counts: &RankCounts,
        settings: &AutomationSettings,
        decision: &str,
    ) {
        if objects.is_empty() {
            return;
        }
        let line = format_event(Utc::now(), objects, counts, settings, decision);
        self.buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(line);
    }

    fn pending(&self) -> usize {
        self.buffer.lock().map(|b| b.len()).unwrap_or(0)
    }
}

fn dump_file_name(now: DateTime<Local>) -> String {
    format!("pip_reroller_log_{}.txt", now.format("%Y%m%d_%H%M%S"))
}

/// Formats one event line:
/// `<ts> | Objects Detected: N | Object Locations: ... | Counts: ... | Settings: ... | Decision: ...`
pub fn format_event(
    at: DateTime<Utc>,
    objects: &[DetectedObject],
    counts: &RankCounts,
    settings: &AutomationSettings,
    decision: &str,
) -> String {
    let locations = objects
        .iter()
        .map(|o| format!("{}@{}", o.rank, o.rect))
        .collect::<Vec<_>>()
        .join("; ");
    let counts = counts
        .iter()
        .map(|(rank, n)| format!("{}:{}", rank, n))
        .collect::<Vec<_>>()
        .join(", ");
    let settings = settings
        .describe()
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "{} | Objects Detected: {} | Object Locations: {} | Counts: {} | Settings: {} | Decision: {}",
        at.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
        objects.len(),
        locations,
        counts,
        settings,
        decision
    )
}
