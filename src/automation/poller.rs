//! Detection poller.
//!
//! Background loop that captures the configured region, classifies it,
//! publishes the result and evaluates the stop condition. When the condition
//! holds it sets the run's cancellation signal so the sequencer stops
//! rerolling. In preview mode the stop condition is never evaluated.
//!
//! States: Idle → Polling → Stopping → Idle

use std::sync::Arc;
use std::time::Duration;

use crate::automation::notify::{Notifier, UiEvent};
use crate::automation::settings::SharedSettings;
use crate::automation::signal::CancellationSignal;
use crate::automation::snapshot::{DetectionCell, DetectionSnapshot, StopCondition};
use crate::capture::FrameSource;
use crate::detection::{classify, RankTable};

/// Wait before retrying after a capture miss.
const CAPTURE_RETRY_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Polling,
    Stopping,
}

impl std::fmt::Display for PollerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollerState::Idle => write!(f, "Idle"),
            PollerState::Polling => write!(f, "Polling"),
            PollerState::Stopping => write!(f, "Stopping"),
        }
    }
}

/// What the poller does with each snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    /// Evaluate the stop condition and cancel the sequencer when it holds
    Reroll,
    /// Publish only; runs until stopped
    Preview,
}

/// Why the poller left its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerExit {
    /// The stop condition held; the cancellation signal was set
    StopConditionMet,
    /// Stopped from outside (operator, window close, sequencer failure)
    StopRequested,
}

/// Poller state and the shared handles it reads and writes.
pub struct DetectionPoller {
    pub state: PollerState,
    mode: PollMode,
    ranks: Arc<RankTable>,
    settings: SharedSettings,
    cell: Arc<DetectionCell>,
    notifier: Arc<dyn Notifier>,
    source: Box<dyn FrameSource>,
    /// Sequencer cancellation, set when the stop condition holds
    cancel: CancellationSignal,
    /// This poller's own stop request
    stop: CancellationSignal,
    exit: PollerExit,
    /// Completed detection cycles
    pub cycles: u64,
}

impl DetectionPoller {
    pub fn new(
        ranks: Arc<RankTable>,
        settings: SharedSettings,
        cell: Arc<DetectionCell>,
        notifier: Arc<dyn Notifier>,
        source: Box<dyn FrameSource>,
        cancel: CancellationSignal,
        stop: CancellationSignal,
    ) -> Self {
        Self {
            state: PollerState::Idle,
            mode: PollMode::Reroll,
            ranks,
            settings,
            cell,
            notifier,
            source,
            cancel,
            stop,
            exit: PollerExit::StopRequested,
            cycles: 0,
        }
    }

    /// Switches to preview mode: detections are published but the stop
    /// condition is never evaluated.
    pub fn preview(mut self) -> Self {
        self.mode = PollMode::Preview;
        self
    }

    /// Runs until stopped or the stop condition holds.
    pub fn run(mut self) -> PollerExit {
        while self.step() {}
        log::info!(
            "Detection poller finished after {} cycles: {:?}",
            self.cycles,
            self.exit
        );
        self.exit
    }

    /// Advances the state machine by one step.
    ///
    /// Returns `true` while the poller should keep running.
    pub fn step(&mut self) -> bool {
        match self.state {
            PollerState::Idle => {
                log::debug!("Detection poller starting");
                self.state = PollerState::Polling;
                true
            }

            PollerState::Polling => {
                if self.stop.is_set() {
                    self.exit = PollerExit::StopRequested;
                    self.state = PollerState::Stopping;
                    return true;
                }
                self.poll_once();
                true
            }

            PollerState::Stopping => {
                self.source.close();
                self.state = PollerState::Idle;
                false
            }
        }
    }

    /// One capture → classify → publish → evaluate cycle.
    fn poll_once(&mut self) {
        let settings = self.settings.snapshot();

        let frame = settings
            .region
            .as_ref()
            .and_then(|region| self.source.capture(region));
        let Some(frame) = frame else {
            // Transient miss; retry after a short interruptible wait
            self.stop.wait_timeout(CAPTURE_RETRY_DELAY);
            return;
        };

        let objects = classify(
            &frame,
            &self.ranks,
            settings.color_tolerance,
            settings.merge_tolerance,
        );

        // A stop requested during a slow capture discards the frame
        if self.stop.is_set() {
            self.exit = PollerExit::StopRequested;
            self.state = PollerState::Stopping;
            return;
        }

        let snapshot = Arc::new(DetectionSnapshot::new(&self.ranks, objects));
        self.cell.publish(Arc::clone(&snapshot));
        self.cycles += 1;

        let met = self.mode == PollMode::Reroll
            && StopCondition::from_settings(&settings, &self.ranks).is_met(&snapshot.counts);

        self.notifier.post(UiEvent::Detections(snapshot));

        if met {
            log::info!("Stop condition met, cancelling rerolls");
            self.cancel.set();
            self.exit = PollerExit::StopConditionMet;
            self.state = PollerState::Stopping;
            return;
        }

        if self
            .stop
            .wait_timeout(Duration::from_millis(settings.poll_delay_ms))
        {
            self.exit = PollerExit::StopRequested;
            self.state = PollerState::Stopping;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::settings::AutomationSettings;
    use crate::capture::CaptureRegion;
    use crate::testing::{frame_with_ranks, RecordingNotifier, ScriptedSource};
    use std::thread;
    use std::time::Instant;

    fn settings(min_objects: u32) -> SharedSettings {
        SharedSettings::new(AutomationSettings {
            region: Some(CaptureRegion {
                x: 0,
                y: 0,
                width: 64,
                height: 32,
            }),
            min_objects,
            poll_delay_ms: 1,
            ..AutomationSettings::default()
        })
    }

    struct Harness {
        poller: DetectionPoller,
        cell: Arc<DetectionCell>,
        notifier: Arc<RecordingNotifier>,
        cancel: CancellationSignal,
        stop: CancellationSignal,
        closed: Arc<std::sync::atomic::AtomicBool>,
    }

    fn harness(source: ScriptedSource, settings: SharedSettings) -> Harness {
        let ranks = Arc::new(RankTable::default());
        let cell = Arc::new(DetectionCell::new(&ranks));
        let notifier = Arc::new(RecordingNotifier::default());
        let cancel = CancellationSignal::new();
        let stop = CancellationSignal::new();
        let closed = source.closed_flag();
        let poller = DetectionPoller::new(
            ranks,
            settings,
            Arc::clone(&cell),
            notifier.clone(),
            Box::new(source),
            cancel.clone(),
            stop.clone(),
        );
        Harness {
            poller,
            cell,
            notifier,
            cancel,
            stop,
            closed,
        }
    }

    #[test]
    fn test_stop_condition_sets_cancel() {
        let ranks = RankTable::default();
        // One eligible object, then two
        let source = ScriptedSource::new(vec![
            Some(frame_with_ranks(&ranks, &["B"])),
            Some(frame_with_ranks(&ranks, &["B", "A"])),
        ]);
        let h = harness(source, settings(2));

        let exit = h.poller.run();

        assert_eq!(exit, PollerExit::StopConditionMet);
        assert!(h.cancel.is_set());
        assert_eq!(h.cell.latest().counts.total(), 2);
        assert_eq!(h.notifier.detection_count(), 2);
        assert!(h.closed.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn test_capture_miss_is_retried() {
        let ranks = RankTable::default();
        let source = ScriptedSource::new(vec![
            None,
            None,
            Some(frame_with_ranks(&ranks, &["SS"])),
        ]);
        let h = harness(source, settings(1));

        assert_eq!(h.poller.run(), PollerExit::StopConditionMet);
        assert_eq!(h.notifier.detection_count(), 1);
    }

    #[test]
    fn test_external_stop_is_honored() {
        let ranks = RankTable::default();
        // Never satisfies min_objects = 5; the last frame repeats forever
        let source = ScriptedSource::new(vec![Some(frame_with_ranks(&ranks, &["F"]))]);
        let shared = settings(5);
        shared.update(|s| s.poll_delay_ms = 200);
        let h = harness(source, shared);

        let stop = h.stop.clone();
        let poller = h.poller;
        let handle = thread::spawn(move || poller.run());

        thread::sleep(Duration::from_millis(50));
        let requested = Instant::now();
        stop.set();
        let exit = handle.join().unwrap();

        assert_eq!(exit, PollerExit::StopRequested);
        // Honored well within one poll delay
        assert!(requested.elapsed() < Duration::from_millis(180));
        assert!(!h.cancel.is_set());
        assert!(h.closed.load(std::sync::atomic::Ordering::SeqCst));
    }

    /// Returns an SS frame, but only after the stop signal has been raised
    /// mid-capture.
    struct StoppedMidCapture {
        frame: crate::capture::Frame,
        stop: CancellationSignal,
    }

    impl FrameSource for StoppedMidCapture {
        fn capture(&mut self, _region: &CaptureRegion) -> Option<crate::capture::Frame> {
            self.stop.set();
            Some(self.frame.clone())
        }

        fn close(&mut self) {}
    }

    #[test]
    fn test_stop_during_capture_discards_frame() {
        let ranks = Arc::new(RankTable::default());
        let cell = Arc::new(DetectionCell::new(&ranks));
        let notifier = Arc::new(RecordingNotifier::default());
        let cancel = CancellationSignal::new();
        let stop = CancellationSignal::new();
        let source = StoppedMidCapture {
            frame: frame_with_ranks(&ranks, &["SS"]),
            stop: stop.clone(),
        };
        let poller = DetectionPoller::new(
            Arc::clone(&ranks),
            settings(1),
            Arc::clone(&cell),
            notifier.clone(),
            Box::new(source),
            cancel.clone(),
            stop,
        );

        assert_eq!(poller.run(), PollerExit::StopRequested);
        assert!(!cancel.is_set());
        assert_eq!(cell.latest().counts.total(), 0);
        assert_eq!(notifier.detection_count(), 0);
    }

    #[test]
    fn test_preview_never_cancels() {
        let ranks = RankTable::default();
        let source = ScriptedSource::new(vec![Some(frame_with_ranks(&ranks, &["SS", "SS"]))]);
        let h = harness(source, settings(1));

        let stop = h.stop.clone();
        let poller = h.poller.preview();
        let handle = thread::spawn(move || poller.run());

        let deadline = Instant::now() + Duration::from_secs(5);
        while h.notifier.detection_count() < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        stop.set();

        assert_eq!(handle.join().unwrap(), PollerExit::StopRequested);
        assert!(h.notifier.detection_count() >= 3);
        assert!(!h.cancel.is_set());
        assert_eq!(h.cell.latest().counts.get("SS"), 2);
    }

    #[test]
    fn test_state_transitions() {
        let ranks = RankTable::default();
        let source = ScriptedSource::new(vec![Some(frame_with_ranks(&ranks, &["A"]))]);
        let mut h = harness(source, settings(1));

        assert_eq!(h.poller.state, PollerState::Idle);
        assert!(h.poller.step());
        assert_eq!(h.poller.state, PollerState::Polling);
        assert!(h.poller.step());
        assert_eq!(h.poller.state, PollerState::Stopping);
        assert!(!h.poller.step());
        assert_eq!(h.poller.state, PollerState::Idle);
        assert_eq!(h.poller.cycles, 1);
    }
}
