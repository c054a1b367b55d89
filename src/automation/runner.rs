//! Reroll runner - starts and stops the automation threads.
//!
//! A run is one Detection Poller thread plus one Automation Sequencer thread,
//! owned by a `RunHandle`. At most one run exists at a time. Stopping a run
//! signals both threads and waits a bounded time for them to exit.
//!
//! Every run and preview gets its own cancellation signals and detection
//! cell, so a thread detached after a timed-out stop cannot touch the next
//! run.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::automation::config::AppConfig;
use crate::automation::event_log::EventSink;
use crate::automation::input::InputInjector;
use crate::automation::notify::{Notifier, UiEvent};
use crate::automation::poller::{DetectionPoller, PollerExit};
use crate::automation::presence::PresenceReporter;
use crate::automation::sequencer::{AutomationSequencer, SequencerSinks, SequencerState};
use crate::automation::settings::{AutomationSettings, SharedSettings};
use crate::automation::signal::CancellationSignal;
use crate::automation::snapshot::{DetectionCell, DetectionSnapshot};
use crate::capture::CaptureBackend;
use crate::detection::RankTable;

/// Poll interval while waiting for threads to exit.
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Why a run could not be started. The message is shown to the operator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StartError {
    #[error("Please select area first.")]
    MissingRegion,
    #[error("Please select area first to start preview.")]
    MissingPreviewRegion,
    #[error("Please set the first click point first.")]
    MissingFirstPoint,
    #[error("Please set the second click point first.")]
    MissingSecondPoint,
    #[error("Please enter a Game Window Title.")]
    MissingWindowTitle,
    #[error("Error: Game window '{0}' not found. Please ensure it's open.")]
    WindowNotFound(String),
    #[error("Reroll is already running.")]
    AlreadyRunning,
    #[error("Error: Failed to activate game window: {0}")]
    Activation(String),
    #[error("Error: Failed to start screen capture: {0}")]
    Capture(String),
}

/// Checks everything a run needs before any thread is spawned.
pub fn check_preconditions(
    settings: &AutomationSettings,
    input: &dyn InputInjector,
) -> Result<(), StartError> {
    match settings.region {
        Some(region) if !region.is_empty() => {}
        _ => return Err(StartError::MissingRegion),
    }
    if settings.first_point.is_none() {
        return Err(StartError::MissingFirstPoint);
    }
    if settings.second_point.is_none() {
        return Err(StartError::MissingSecondPoint);
    }

    let title = settings.window_title.trim();
    if title.is_empty() {
        return Err(StartError::MissingWindowTitle);
    }
    if !input.window_exists(title) {
        return Err(StartError::WindowNotFound(title.to_string()));
    }
    Ok(())
}

/// Platform and optional collaborators, chosen once at startup.
pub struct Collaborators {
    pub capture: Arc<dyn CaptureBackend>,
    pub input: Arc<dyn InputInjector>,
    pub notifier: Arc<dyn Notifier>,
    pub events: Arc<dyn EventSink>,
    pub presence: Arc<dyn PresenceReporter>,
}

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Bounded wait for threads when stopping
    pub shutdown_timeout: Duration,
    /// Pause after activating the game window
    pub activation_settle: Duration,
}

impl From<&AppConfig> for RunOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            shutdown_timeout: Duration::from_millis(config.shutdown_timeout_ms),
            activation_settle: Duration::from_millis(config.activation_settle_ms),
        }
    }
}

/// Owns the threads of one run. A preview has no sequencer thread.
pub struct RunHandle {
    cancel: CancellationSignal,
    poller_stop: CancellationSignal,
    poller: Option<JoinHandle<PollerExit>>,
    sequencer: Option<JoinHandle<SequencerState>>,
    shutdown_timeout: Duration,
}

impl RunHandle {
    /// Both threads have exited.
    pub fn is_finished(&self) -> bool {
        fn done<T>(handle: &Option<JoinHandle<T>>) -> bool {
            handle.as_ref().is_none_or(|h| h.is_finished())
        }
        done(&self.poller) && done(&self.sequencer)
    }

    /// Stops the run: cancel the sequencer, stop the poller, then wait a
    /// bounded time for both. Threads that do not exit in time are detached.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.cancel.set();
        self.poller_stop.set();

        let deadline = Instant::now() + self.shutdown_timeout;
        if let Some(handle) = self.poller.take() {
            match join_until(handle, deadline) {
                Some(exit) => log::debug!("Detection poller joined: {:?}", exit),
                None => log::warn!("Detection poller did not stop in time, detaching"),
            }
        }
        if let Some(handle) = self.sequencer.take() {
            match join_until(handle, deadline) {
                Some(state) => log::debug!("Sequencer joined in state: {}", state),
                None => log::warn!("Sequencer did not stop in time, detaching"),
            }
        }
    }
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Joins `handle` if it finishes before `deadline`.
fn join_until<T>(handle: JoinHandle<T>, deadline: Instant) -> Option<T> {
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return None;
        }
        thread::sleep(JOIN_POLL_INTERVAL);
    }
    match handle.join() {
        Ok(value) => Some(value),
        Err(e) => {
            log::error!("Automation thread panicked: {:?}", e);
            None
        }
    }
}

/// Reroll controller used by the GUI and hotkey.
pub struct Reroller {
    ranks: Arc<RankTable>,
    settings: SharedSettings,
    /// Cell of the current (or last) run or preview
    cell: Arc<DetectionCell>,
    collaborators: Collaborators,
    options: RunOptions,
    run: Option<RunHandle>,
    preview: Option<RunHandle>,
}

impl Reroller {
    pub fn new(
        ranks: RankTable,
        settings: SharedSettings,
        collaborators: Collaborators,
        options: RunOptions,
    ) -> Self {
        let cell = Arc::new(DetectionCell::new(&ranks));
        Self {
            ranks: Arc::new(ranks),
            settings,
            cell,
            collaborators,
            options,
            run: None,
            preview: None,
        }
    }

    pub fn ranks(&self) -> &RankTable {
        &self.ranks
    }

    pub fn settings(&self) -> &SharedSettings {
        &self.settings
    }

    pub fn latest(&self) -> Arc<DetectionSnapshot> {
        self.cell.latest()
    }

    pub fn is_running(&self) -> bool {
        self.run.as_ref().is_some_and(|run| !run.is_finished())
    }

    pub fn is_previewing(&self) -> bool {
        self.preview.as_ref().is_some_and(|preview| !preview.is_finished())
    }

    /// Starts a run. A running preview is stopped first.
    ///
    /// On a precondition failure no thread is spawned and the preview, if
    /// any, keeps running.
    pub fn start(&mut self) -> Result<(), StartError> {
        if self.is_running() {
            return Err(StartError::AlreadyRunning);
        }
        // A finished run is joined before a new one begins
        if let Some(finished) = self.run.take() {
            finished.stop();
        }

        let settings = self.settings.snapshot();
        check_preconditions(&settings, self.collaborators.input.as_ref())?;
        self.stop_preview();

        let title = settings.window_title.trim();
        self.collaborators
            .input
            .activate_window(title)
            .map_err(|e| StartError::Activation(e.to_string()))?;
        self.collaborators.notifier.post(UiEvent::Message(
            "Game window activated. Starting reroll.".to_string(),
        ));
        if !self.options.activation_settle.is_zero() {
            thread::sleep(self.options.activation_settle);
        }

        let source = self
            .collaborators
            .capture
            .open()
            .map_err(|e| StartError::Capture(format!("{:#}", e)))?;

        let cancel = CancellationSignal::new();
        let poller_stop = CancellationSignal::new();
        self.cell = Arc::new(DetectionCell::new(&self.ranks));

        let poller = DetectionPoller::new(
            Arc::clone(&self.ranks),
            self.settings.clone(),
            Arc::clone(&self.cell),
            Arc::clone(&self.collaborators.notifier),
            source,
            cancel.clone(),
            poller_stop.clone(),
        );
        let sequencer = AutomationSequencer::new(
            Arc::clone(&self.ranks),
            self.settings.clone(),
            Arc::clone(&self.cell),
            Arc::clone(&self.collaborators.input),
            SequencerSinks {
                notifier: Arc::clone(&self.collaborators.notifier),
                events: Arc::clone(&self.collaborators.events),
                presence: Arc::clone(&self.collaborators.presence),
            },
            cancel.clone(),
            poller_stop.clone(),
        );

        log::info!(
            "Starting reroll: region {}, min rank {}, min objects {}, stop at top {}",
            settings
                .region
                .map(|r| r.to_string())
                .unwrap_or_default(),
            settings.min_rank,
            settings.min_objects,
            settings.stop_at_top
        );

        let poller = thread::spawn(move || poller.run());
        let sequencer = thread::spawn(move || sequencer.run());

        self.run = Some(RunHandle {
            cancel,
            poller_stop,
            poller: Some(poller),
            sequencer: Some(sequencer),
            shutdown_timeout: self.options.shutdown_timeout,
        });
        Ok(())
    }

    /// Stops the current run, if any. Blocks at most the shutdown timeout.
    pub fn stop(&mut self) {
        if let Some(run) = self.run.take() {
            log::info!("Stopping reroll");
            run.stop();
        }
    }

    /// Starts when idle, stops when running. Returns whether a run is active
    /// afterwards.
    pub fn toggle(&mut self) -> Result<bool, StartError> {
        if self.is_running() {
            self.stop();
            Ok(false)
        } else {
            self.start().map(|_| true)
        }
    }

    /// Starts capturing and classifying the region without clicking.
    ///
    /// Detections are published and posted like in a run, but the stop
    /// condition is never evaluated. Refused while a run is active.
    pub fn start_preview(&mut self) -> Result<(), StartError> {
        if self.is_running() {
            return Err(StartError::AlreadyRunning);
        }
        if self.is_previewing() {
            return Ok(());
        }
        if let Some(finished) = self.run.take() {
            finished.stop();
        }

        let settings = self.settings.snapshot();
        match settings.region {
            Some(region) if !region.is_empty() => {}
            _ => return Err(StartError::MissingPreviewRegion),
        }

        let source = self
            .collaborators
            .capture
            .open()
            .map_err(|e| StartError::Capture(format!("{:#}", e)))?;

        let cancel = CancellationSignal::new();
        let stop = CancellationSignal::new();
        self.cell = Arc::new(DetectionCell::new(&self.ranks));

        let poller = DetectionPoller::new(
            Arc::clone(&self.ranks),
            self.settings.clone(),
            Arc::clone(&self.cell),
            Arc::clone(&self.collaborators.notifier),
            source,
            cancel.clone(),
            stop.clone(),
        )
        .preview();

        log::info!("Starting detection preview");
        let poller = thread::spawn(move || poller.run());
        self.preview = Some(RunHandle {
            cancel,
            poller_stop: stop,
            poller: Some(poller),
            sequencer: None,
            shutdown_timeout: self.options.shutdown_timeout,
        });
        Ok(())
    }

    pub fn stop_preview(&mut self) {
        if let Some(preview) = self.preview.take() {
            log::info!("Stopping detection preview");
            preview.stop();
        }
    }

    /// Returns whether the preview is active afterwards.
    pub fn toggle_preview(&mut self) -> Result<bool, StartError> {
        if self.is_previewing() {
            self.stop_preview();
            Ok(false)
        } else {
            self.start_preview().map(|_| true)
        }
    }

    /// Cancellation signal of the current (or last) run.
    #[cfg(test)]
    pub fn cancel_signal(&self) -> Option<CancellationSignal> {
        self.run.as_ref().map(|run| run.cancel.clone())
    }
}

impl Drop for Reroller {
    fn drop(&mut self) {
        self.stop();
        self.stop_preview();
    }
}
