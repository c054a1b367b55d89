//! Event queue from the automation threads to the GUI.
//!
//! Uses std::sync::mpsc: the poller and sequencer send, the GUI drains the
//! receiver once per frame. An optional wake callback asks the GUI to repaint
//! so updates show up without waiting for the next input event.

use std::sync::Arc;
use std::sync::mpsc::{channel, Receiver, Sender};

use crate::automation::snapshot::DetectionSnapshot;

/// An update for the presentation layer.
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// A new detection snapshot was published
    Detections(Arc<DetectionSnapshot>),
    /// Status or progress text for the operator
    Message(String),
    /// The run ended normally
    RunFinished { stopped_from_condition: bool },
    /// The run ended on an error; the operator must restart it
    RunFailed(String),
}

/// Sink for presentation updates. Must never block.
pub trait Notifier: Send + Sync {
    fn post(&self, event: UiEvent);
}

type WakeFn = Box<dyn Fn() + Send + Sync>;

/// Channel-backed notifier.
pub struct ChannelNotifier {
    sender: Sender<UiEvent>,
    wake: Option<WakeFn>,
}

impl ChannelNotifier {
    pub fn new(sender: Sender<UiEvent>) -> Self {
        Self { sender, wake: None }
    }

    /// Runs `wake` after every posted event.
    pub fn with_wake(mut self, wake: impl Fn() + Send + Sync + 'static) -> Self {
        self.wake = Some(Box::new(wake));
        self
    }
}

impl Notifier for ChannelNotifier {
    fn post(&self, event: UiEvent) {
        // The receiver is gone only while the process is shutting down
        if self.sender.send(event).is_err() {
            log::debug!("UI event dropped, receiver closed");
            return;
        }
        if let Some(wake) = &self.wake {
            wake();
        }
    }
}

/// Creates a new event queue.
///
/// The channel is unbounded; the GUI drains it every frame.
pub fn create_event_queue() -> (ChannelNotifier, Receiver<UiEvent>) {
    let (sender, receiver) = channel();
    (ChannelNotifier::new(sender), receiver)
}
