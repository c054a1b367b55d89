//! Deterministic fakes for the automation seams. Test builds only.

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::automation::input::{InputInjector, PointerMotion};
use crate::automation::notify::{Notifier, UiEvent};
use crate::automation::presence::{PresenceReporter, PresenceStatus};
use crate::capture::{CaptureBackend, CaptureRegion, Frame, FrameSource};
use crate::detection::RankTable;

/// Draws one 5x5 square per rank name, spaced far enough apart that
/// neither closing nor merging joins them.
pub fn frame_with_ranks(ranks: &RankTable, names: &[&str]) -> Frame {
    let width = 20 * names.len().max(1) as u32 + 8;
    let mut frame = RgbImage::from_pixel(width, 32, Rgb([20, 20, 30]));
    for (i, name) in names.iter().enumerate() {
        let color = ranks.get(name).map(|r| r.color).unwrap_or(Rgb([0, 0, 0]));
        let x0 = 4 + 20 * i as u32;
        for y in 10..15 {
            for x in x0..x0 + 5 {
                frame.put_pixel(x, y, color);
            }
        }
    }
    frame
}

/// Plays back scripted capture results, then repeats the last one.
pub struct ScriptedSource {
    frames: VecDeque<Option<Frame>>,
    last: Option<Frame>,
    /// Blocking time of every capture
    delay: Duration,
    closed: Arc<AtomicBool>,
}

impl ScriptedSource {
    pub fn new(frames: Vec<Option<Frame>>) -> Self {
        Self {
            frames: frames.into(),
            last: None,
            delay: Duration::ZERO,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_capture_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

impl FrameSource for ScriptedSource {
    fn capture(&mut self, _region: &CaptureRegion) -> Option<Frame> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        match self.frames.pop_front() {
            Some(next) => {
                self.last = next.clone();
                next
            }
            None => self.last.clone(),
        }
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

type Script = (Vec<Option<Frame>>, Duration);

/// Hands out one scripted source per `open` and counts the calls.
pub struct ScriptedBackend {
    scripts: Mutex<VecDeque<Script>>,
    opened: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(frames: Vec<Option<Frame>>) -> Self {
        Self::with_runs(vec![(frames, Duration::ZERO)])
    }

    /// One script (frames, capture delay) per `open`. The last script is
    /// reused once the others are used up.
    pub fn with_runs(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            opened: AtomicUsize::new(0),
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl CaptureBackend for ScriptedBackend {
    fn open(&self) -> Result<Box<dyn FrameSource>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let mut scripts = self.scripts.lock().unwrap();
        let (frames, delay) = if scripts.len() > 1 {
            scripts.pop_front().unwrap()
        } else {
            scripts.front().cloned().unwrap_or_default()
        };
        Ok(Box::new(
            ScriptedSource::new(frames).with_capture_delay(delay),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCall {
    Activate(String),
    Move(i32, i32, PointerMotion),
    Click,
}

/// Records every pointer call. The window is present unless told otherwise.
pub struct RecordingInjector {
    calls: Mutex<Vec<InputCall>>,
    window_present: AtomicBool,
    fail_clicks: AtomicBool,
}

impl RecordingInjector {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            window_present: AtomicBool::new(true),
            fail_clicks: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> Vec<InputCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of completed clicks.
    pub fn clicks(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == InputCall::Click)
            .count()
    }

    pub fn set_window_present(&self, present: bool) {
        self.window_present.store(present, Ordering::SeqCst);
    }

    pub fn fail_clicks(&self) {
        self.fail_clicks.store(true, Ordering::SeqCst);
    }
}

impl InputInjector for RecordingInjector {
    fn window_exists(&self, _title: &str) -> bool {
        self.window_present.load(Ordering::SeqCst)
    }

    fn activate_window(&self, title: &str) -> Result<()> {
        if !self.window_exists(title) {
            return Err(anyhow!("no window"));
        }
        self.calls
            .lock()
            .unwrap()
            .push(InputCall::Activate(title.to_string()));
        Ok(())
    }

    fn move_pointer(&self, x: i32, y: i32, motion: PointerMotion) -> Result<()> {
        self.calls.lock().unwrap().push(InputCall::Move(x, y, motion));
        Ok(())
    }

    fn click(&self) -> Result<()> {
        if self.fail_clicks.load(Ordering::SeqCst) {
            return Err(anyhow!("injection rejected"));
        }
        self.calls.lock().unwrap().push(InputCall::Click);
        Ok(())
    }
}

/// Keeps every posted UI event.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<UiEvent>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn detection_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, UiEvent::Detections(_)))
            .count()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::Message(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    /// `stopped_from_condition` of the `RunFinished` event, if any.
    pub fn finished(&self) -> Option<bool> {
        self.events().into_iter().find_map(|e| match e {
            UiEvent::RunFinished {
                stopped_from_condition,
            } => Some(stopped_from_condition),
            _ => None,
        })
    }

    pub fn failure(&self) -> Option<String> {
        self.events().into_iter().find_map(|e| match e {
            UiEvent::RunFailed(msg) => Some(msg),
            _ => None,
        })
    }
}

impl Notifier for RecordingNotifier {
    fn post(&self, event: UiEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[derive(Default)]
pub struct RecordingPresence {
    updates: Mutex<Vec<PresenceStatus>>,
}

impl RecordingPresence {
    pub fn updates(&self) -> Vec<PresenceStatus> {
        self.updates.lock().unwrap().clone()
    }
}

impl PresenceReporter for RecordingPresence {
    fn update(&self, status: &PresenceStatus) {
        self.updates.lock().unwrap().push(status.clone());
    }
}
