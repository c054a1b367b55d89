//! Live status reporting for an external presence service.
//!
//! Only the status shape and a log-backed reporter live here; a real
//! presence integration plugs in behind `PresenceReporter`.

/// Status pushed to the presence reporter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresenceStatus {
    pub min_rank: String,
    pub min_objects: u32,
    /// Objects of the highest rank in the latest snapshot
    pub top_count: u32,
    pub stop_at_top: u32,
    pub rolling: bool,
    /// Set only when a run has ended
    pub stopped_from_condition: Option<bool>,
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.rolling {
            write!(
                f,
                "Rolling for {}x {}+ (top: {}",
                self.min_objects, self.min_rank, self.top_count
            )?;
            if self.stop_at_top > 0 {
                write!(f, "/{}", self.stop_at_top)?;
            }
            write!(f, ")")
        } else {
            match self.stopped_from_condition {
                Some(true) => write!(f, "Target reached ({}x {}+)", self.min_objects, self.min_rank),
                _ => write!(f, "Idle"),
            }
        }
    }
}

pub trait PresenceReporter: Send + Sync {
    fn update(&self, status: &PresenceStatus);
}

/// Reporter used when presence is disabled.
pub struct NoopPresence;

impl PresenceReporter for NoopPresence {
    fn update(&self, _status: &PresenceStatus) {}
}

/// Writes each update to the diagnostic log.
pub struct LogPresence;

impl PresenceReporter for LogPresence {
    fn update(&self, status: &PresenceStatus) {
        log::info!("Presence: {}", status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(rolling: bool, stopped: Option<bool>) -> PresenceStatus {
        PresenceStatus {
            min_rank: "A".to_string(),
            min_objects: 2,
            top_count: 1,
            stop_at_top: 3,
            rolling,
            stopped_from_condition: stopped,
        }
    }

    #[test]
    fn test_status_text() {
        assert_eq!(status(true, None).to_string(), "Rolling for 2x A+ (top: 1/3)");
        assert_eq!(status(false, Some(true)).to_string(), "Target reached (2x A+)");
        assert_eq!(status(false, Some(false)).to_string(), "Idle");
    }

    #[test]
    fn test_top_target_hidden_when_disabled() {
        let mut s = status(true, None);
        s.stop_at_top = 0;
        assert_eq!(s.to_string(), "Rolling for 2x A+ (top: 1)");
    }
}
