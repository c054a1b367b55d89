//! Automation sequencer state machine.
//!
//! The sequencer repeats: Idle → ClickingFirst → ClickingSecond → Settling →
//! Idle while the cancellation signal is clear. Cancellation is checked
//! before each cycle and after each click delay, and every wait is
//! interruptible, so a stop takes effect within tens of milliseconds.

use std::sync::Arc;
use std::time::Duration;

use crate::automation::event_log::{EventSink, DECISION_ROLLING};
use crate::automation::input::{click_at, InputInjector, ScreenPoint};
use crate::automation::notify::{Notifier, UiEvent};
use crate::automation::presence::{PresenceReporter, PresenceStatus};
use crate::automation::settings::{AutomationSettings, SharedSettings};
use crate::automation::signal::CancellationSignal;
use crate::automation::snapshot::{DetectionCell, RankCounts, StopCondition};
use crate::detection::RankTable;

/// Pause at the top of every cycle. Throttles the loop and gives the poller
/// a chance to observe the previous reroll.
const CYCLE_PACING: Duration = Duration::from_millis(10);

/// Sequencer states.
#[derive(Debug, Clone, PartialEq)]
pub enum SequencerState {
    /// Between cycles
    Idle,
    /// Clicking the first point (reroll)
    ClickingFirst,
    /// Clicking the second point (confirm)
    ClickingSecond,
    /// Waiting for the game to settle after a reroll
    Settling,
    /// Cancellation observed
    Stopped,
    /// Injection failed or the game window disappeared
    Failed(String),
}

impl std::fmt::Display for SequencerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SequencerState::Idle => write!(f, "Idle"),
            SequencerState::ClickingFirst => write!(f, "Clicking first point"),
            SequencerState::ClickingSecond => write!(f, "Clicking second point"),
            SequencerState::Settling => write!(f, "Settling"),
            SequencerState::Stopped => write!(f, "Stopped"),
            SequencerState::Failed(msg) => write!(f, "Failed: {}", msg),
        }
    }
}

/// Collaborators the sequencer reports to.
pub struct SequencerSinks {
    pub notifier: Arc<dyn Notifier>,
    pub events: Arc<dyn EventSink>,
    pub presence: Arc<dyn PresenceReporter>,
}

pub struct AutomationSequencer {
    pub state: SequencerState,
    ranks: Arc<RankTable>,
    settings: SharedSettings,
    cell: Arc<DetectionCell>,
    input: Arc<dyn InputInjector>,
    sinks: SequencerSinks,
    cancel: CancellationSignal,
    /// Stop request for the poller, raised when this run fails
    poller_stop: CancellationSignal,
    /// Settings read at the start of the current cycle
    cycle_settings: AutomationSettings,
    /// Completed reroll cycles
    pub cycles: u64,
}

impl AutomationSequencer {
    pub fn new(
        ranks: Arc<RankTable>,
        settings: SharedSettings,
        cell: Arc<DetectionCell>,
        input: Arc<dyn InputInjector>,
        sinks: SequencerSinks,
        cancel: CancellationSignal,
        poller_stop: CancellationSignal,
    ) -> Self {
        let cycle_settings = settings.snapshot();
        Self {
            state: SequencerState::Idle,
            ranks,
            settings,
            cell,
            input,
            sinks,
            cancel,
            poller_stop,
            cycle_settings,
            cycles: 0,
        }
    }

    /// Runs until cancelled or failed, then reports the outcome.
    pub fn run(mut self) -> SequencerState {
        while self.step() {}
        self.finish();
        self.state
    }

    /// Advances the state machine by one step.
    ///
    /// Returns `true` while the sequencer should keep running.
    pub fn step(&mut self) -> bool {
        match &self.state {
            SequencerState::Idle => {
                // Checkpoint: before each cycle
                if self.cancel.wait_timeout(CYCLE_PACING) {
                    self.state = SequencerState::Stopped;
                    return true;
                }

                self.cycle_settings = self.settings.snapshot();
                if !self.input.window_exists(&self.cycle_settings.window_title) {
                    log::warn!("Game window no longer exists, stopping");
                    self.state = SequencerState::Failed(format!(
                        "Game window '{}' closed",
                        self.cycle_settings.window_title
                    ));
                    return true;
                }

                let latest = self.cell.latest();
                if !latest.objects.is_empty() {
                    self.sinks.events.record(
                        &latest.objects,
                        &latest.counts,
                        &self.cycle_settings,
                        DECISION_ROLLING,
                    );
                }

                self.state = SequencerState::ClickingFirst;
                true
            }

            SequencerState::ClickingFirst => {
                let point = self.cycle_settings.first_point;
                self.click_then_wait(point, "first", SequencerState::ClickingSecond);
                true
            }

            SequencerState::ClickingSecond => {
                let point = self.cycle_settings.second_point;
                self.click_then_wait(point, "second", SequencerState::Settling);
                true
            }

            SequencerState::Settling => {
                let delay = Duration::from_millis(self.cycle_settings.post_reroll_delay_ms);
                if self.cancel.wait_timeout(delay) {
                    self.state = SequencerState::Stopped;
                    return true;
                }

                self.cycles += 1;
                self.report_progress();
                self.state = SequencerState::Idle;
                true
            }

            SequencerState::Stopped | SequencerState::Failed(_) => false,
        }
    }

    /// Clicks `point`, waits the click delay, and moves to `next` unless
    /// cancelled during the wait.
    fn click_then_wait(&mut self, point: Option<ScreenPoint>, which: &str, next: SequencerState) {
        let Some(point) = point else {
            self.state = SequencerState::Failed(format!("The {} click point is not set", which));
            return;
        };

        if let Err(e) = click_at(self.input.as_ref(), point) {
            self.state =
                SequencerState::Failed(format!("Failed to click {} point: {}", which, e));
            return;
        }

        // Checkpoint: after each click delay
        let delay = Duration::from_millis(self.cycle_settings.click_delay_ms);
        self.state = if self.cancel.wait_timeout(delay) {
            SequencerState::Stopped
        } else {
            next
        };
    }

    fn report_progress(&self) {
        let counts = self.cell.latest().counts.clone();
        let message = progress_message(&counts, &self.cycle_settings, &self.ranks);
        self.sinks.notifier.post(UiEvent::Message(message));
        self.sinks
            .presence
            .update(&self.presence_status(&counts, true, None));
    }

    fn presence_status(
        &self,
        counts: &RankCounts,
        rolling: bool,
        stopped_from_condition: Option<bool>,
    ) -> PresenceStatus {
        PresenceStatus {
            min_rank: self.cycle_settings.min_rank.clone(),
            min_objects: self.cycle_settings.min_objects,
            top_count: counts.top(),
            stop_at_top: self.cycle_settings.stop_at_top,
            rolling,
            stopped_from_condition,
        }
    }

    /// Reports how the run ended.
    fn finish(&mut self) {
        let settings = self.settings.snapshot();
        self.cycle_settings = settings.clone();
        let counts = self.cell.latest().counts.clone();

        match &self.state {
            SequencerState::Failed(msg) => {
                log::error!("Automation failed after {} cycles: {}", self.cycles, msg);
                self.cancel.set();
                self.poller_stop.set();
                self.sinks
                    .presence
                    .update(&self.presence_status(&counts, false, Some(false)));
                self.sinks
                    .notifier
                    .post(UiEvent::RunFailed(format!("Error: {}", msg)));
            }
            _ => {
                // The poller never outlives its sequencer
                self.poller_stop.set();
                let stopped_from_condition =
                    StopCondition::from_settings(&settings, &self.ranks).is_met(&counts);
                log::info!(
                    "Automation stopped after {} cycles (condition met: {})",
                    self.cycles,
                    stopped_from_condition
                );
                self.sinks.presence.update(&self.presence_status(
                    &counts,
                    false,
                    Some(stopped_from_condition),
                ));
                self.sinks.notifier.post(UiEvent::RunFinished {
                    stopped_from_condition,
                });
            }
        }
    }
}

/// `Detected: <eligible> ≥<minRank>[, <top> <topRank>]. Rolling...`
pub fn progress_message(
    counts: &RankCounts,
    settings: &AutomationSettings,
    ranks: &RankTable,
) -> String {
    let condition = StopCondition::from_settings(settings, ranks);
    let mut message = format!(
        "Detected: {} ≥{}",
        condition.eligible(counts),
        settings.min_rank
    );
    if settings.stop_at_top > 0 {
        message.push_str(&format!(", {} {}", counts.top(), ranks.top().name));
    }
    message.push_str(". Rolling...");
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::event_log::EventLog;
    use crate::automation::input::PointerMotion;
    use crate::automation::snapshot::DetectionSnapshot;
    use crate::detection::merge::Rect;
    use crate::detection::DetectedObject;
    use crate::testing::{InputCall, RecordingInjector, RecordingNotifier, RecordingPresence};
    use std::thread;
    use std::time::Instant;

    struct Harness {
        sequencer: AutomationSequencer,
        cell: Arc<DetectionCell>,
        input: Arc<RecordingInjector>,
        notifier: Arc<RecordingNotifier>,
        presence: Arc<RecordingPresence>,
        events: Arc<EventLog>,
        cancel: CancellationSignal,
        poller_stop: CancellationSignal,
    }

    fn ready_settings() -> AutomationSettings {
        AutomationSettings {
            first_point: Some(ScreenPoint::new(100, 200)),
            second_point: Some(ScreenPoint::new(300, 400)),
            click_delay_ms: 1,
            post_reroll_delay_ms: 1,
            ..AutomationSettings::default()
        }
    }

    fn harness(settings: AutomationSettings) -> Harness {
        let ranks = Arc::new(RankTable::default());
        let cell = Arc::new(DetectionCell::new(&ranks));
        let input = Arc::new(RecordingInjector::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let presence = Arc::new(RecordingPresence::default());
        let events = Arc::new(EventLog::new());
        let cancel = CancellationSignal::new();
        let poller_stop = CancellationSignal::new();

        let sequencer = AutomationSequencer::new(
            ranks,
            SharedSettings::new(settings),
            Arc::clone(&cell),
            input.clone(),
            SequencerSinks {
                notifier: notifier.clone(),
                events: events.clone(),
                presence: presence.clone(),
            },
            cancel.clone(),
            poller_stop.clone(),
        );

        Harness {
            sequencer,
            cell,
            input,
            notifier,
            presence,
            events,
            cancel,
            poller_stop,
        }
    }

    fn publish(cell: &DetectionCell, names: &[&str]) {
        let ranks = RankTable::default();
        let objects = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let rank = ranks.get(name).unwrap();
                DetectedObject {
                    rank: rank.name.clone(),
                    ordinal: rank.ordinal,
                    rect: Rect::new(i as i32 * 10, 0, 5, 5),
                    color: rank.color,
                }
            })
            .collect();
        cell.publish(Arc::new(DetectionSnapshot::new(&ranks, objects)));
    }

    #[test]
    fn test_one_cycle_clicks_both_points() {
        let mut h = harness(ready_settings());

        while h.sequencer.cycles == 0 {
            assert!(h.sequencer.step());
        }
        assert_eq!(h.sequencer.state, SequencerState::Idle);
        assert_eq!(
            h.input.calls(),
            vec![
                InputCall::Move(100, 200, PointerMotion::Absolute),
                InputCall::Move(0, -1, PointerMotion::Relative),
                InputCall::Click,
                InputCall::Move(300, 400, PointerMotion::Absolute),
                InputCall::Move(0, -1, PointerMotion::Relative),
                InputCall::Click,
            ]
        );
        assert_eq!(h.notifier.messages(), vec!["Detected: 0 ≥F. Rolling..."]);
        assert_eq!(h.presence.updates().len(), 1);
        assert!(h.presence.updates()[0].rolling);
    }

    #[test]
    fn test_cancelled_before_cycle_does_nothing() {
        let h = harness(ready_settings());
        h.cancel.set();

        let state = h.sequencer.run();

        assert_eq!(state, SequencerState::Stopped);
        assert_eq!(h.input.clicks(), 0);
        assert!(h.notifier.finished().is_some());
        assert!(h.poller_stop.is_set());
    }

    #[test]
    fn test_cancel_after_first_click() {
        let mut settings = ready_settings();
        settings.click_delay_ms = 10_000;
        let h = harness(settings);

        let cancel = h.cancel.clone();
        let sequencer = h.sequencer;
        let handle = thread::spawn(move || sequencer.run());

        // Wait for the first click to land
        let deadline = Instant::now() + Duration::from_secs(5);
        while h.input.clicks() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        let cancelled_at = Instant::now();
        cancel.set();
        let state = handle.join().unwrap();

        assert_eq!(state, SequencerState::Stopped);
        assert!(cancelled_at.elapsed() < Duration::from_secs(1));
        assert_eq!(h.input.clicks(), 1);
    }

    #[test]
    fn test_window_vanished_fails_run() {
        let h = harness(ready_settings());
        h.input.set_window_present(false);

        let state = h.sequencer.run();

        assert!(matches!(state, SequencerState::Failed(_)));
        assert_eq!(h.input.clicks(), 0);
        assert!(h.cancel.is_set());
        assert!(h.poller_stop.is_set());
        let failure = h.notifier.failure().expect("failure reported");
        assert!(failure.starts_with("Error: Game window 'Roblox'"));
    }

    #[test]
    fn test_click_failure_fails_run() {
        let h = harness(ready_settings());
        h.input.fail_clicks();

        let state = h.sequencer.run();

        match state {
            SequencerState::Failed(msg) => assert!(msg.contains("first point")),
            other => panic!("unexpected state {}", other),
        }
        assert!(h.poller_stop.is_set());
    }

    #[test]
    fn test_event_logged_only_with_objects() {
        let mut h = harness(ready_settings());

        while h.sequencer.cycles == 0 {
            h.sequencer.step();
        }
        assert_eq!(h.events.pending(), 0);

        publish(&h.cell, &["A", "B"]);
        while h.sequencer.cycles == 1 {
            h.sequencer.step();
        }
        assert_eq!(h.events.pending(), 1);
    }

    #[test]
    fn test_finish_reports_condition() {
        let mut settings = ready_settings();
        settings.min_objects = 2;
        let h = harness(settings);
        publish(&h.cell, &["A", "B"]);
        h.cancel.set();

        h.sequencer.run();

        assert_eq!(h.notifier.finished(), Some(true));
        let last = h.presence.updates().pop().unwrap();
        assert!(!last.rolling);
        assert_eq!(last.stopped_from_condition, Some(true));
    }

    #[test]
    fn test_progress_message() {
        let ranks = RankTable::default();
        let objects: Vec<DetectedObject> = ["SS", "A", "D"]
            .iter()
            .map(|name| {
                let rank = ranks.get(name).unwrap();
                DetectedObject {
                    rank: rank.name.clone(),
                    ordinal: rank.ordinal,
                    rect: Rect::new(0, 0, 3, 3),
                    color: rank.color,
                }
            })
            .collect();
        let counts = RankCounts::from_objects(&ranks, &objects);

        let mut settings = AutomationSettings {
            min_rank: "B".to_string(),
            ..AutomationSettings::default()
        };
        assert_eq!(
            progress_message(&counts, &settings, &ranks),
            "Detected: 2 ≥B. Rolling..."
        );

        settings.stop_at_top = 2;
        assert_eq!(
            progress_message(&counts, &settings, &ranks),
            "Detected: 2 ≥B, 1 SS. Rolling..."
        );
    }
}
