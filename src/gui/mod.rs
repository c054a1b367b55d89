//! GUI module for the application.
//!
//! Provides the operator surface using egui/eframe. The app owns the reroll
//! controller; automation threads reach it only through the event channel.

pub mod hotkey;
pub mod render;
pub mod state;

use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;

use eframe::egui::{self, Vec2};
use windows::Win32::Foundation::POINT;
use windows::Win32::UI::WindowsAndMessaging::GetCursorPos;

use crate::automation::config::get_config;
use crate::automation::event_log::{EventLog, EventSink, NoopEventLog};
use crate::automation::input::{ScreenPoint, SendInputInjector};
use crate::automation::notify::{create_event_queue, UiEvent};
use crate::automation::presence::{LogPresence, NoopPresence, PresenceReporter};
use crate::automation::{Collaborators, Reroller, RunOptions};
use crate::automation::settings::{SettingField, SharedSettings};
use crate::capture::screen::GdiCapture;
use crate::capture::CaptureRegion;

use state::{AutomationStatus, GuiState, PendingPick, PickTarget};

/// Main GUI application struct.
pub struct GuiApp {
    state: GuiState,
    reroller: Reroller,
    events: Receiver<UiEvent>,
    hotkey: Receiver<()>,
    /// Present only when event logging is enabled
    event_log: Option<Arc<EventLog>>,
}

impl GuiApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let config = get_config();

        let ctx = cc.egui_ctx.clone();
        let (notifier, events) = create_event_queue();
        let notifier = notifier.with_wake(move || ctx.request_repaint());

        let event_log = config.enable_event_log.then(|| Arc::new(EventLog::new()));
        let event_sink: Arc<dyn EventSink> = match &event_log {
            Some(log) => log.clone(),
            None => Arc::new(NoopEventLog),
        };
        let presence: Arc<dyn PresenceReporter> = if config.enable_presence {
            Arc::new(LogPresence)
        } else {
            Arc::new(NoopPresence)
        };

        let settings = SharedSettings::new(config.defaults.clone());
        let reroller = Reroller::new(
            config.rank_table(),
            settings,
            Collaborators {
                capture: Arc::new(GdiCapture),
                input: Arc::new(SendInputInjector),
                notifier: Arc::new(notifier),
                events: event_sink,
                presence,
            },
            RunOptions::from(config),
        );

        let state = GuiState::new(&reroller.settings().snapshot(), reroller.latest());
        let hotkey = hotkey::spawn_toggle_hotkey(cc.egui_ctx.clone());

        Self {
            state,
            reroller,
            events,
            hotkey,
            event_log,
        }
    }

    /// Applies everything the automation threads posted since the last frame.
    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                UiEvent::Detections(snapshot) => self.state.latest = snapshot,
                UiEvent::Message(text) => self.state.message = text,
                UiEvent::RunFinished {
                    stopped_from_condition,
                } => {
                    self.state.status = AutomationStatus::Suspended;
                    if stopped_from_condition {
                        self.state.message = "Target reached. Reroll stopped.".to_string();
                    }
                }
                UiEvent::RunFailed(msg) => {
                    self.state.message = msg.clone();
                    self.state.status = AutomationStatus::Error(msg);
                }
            }
        }

        if self.state.status.is_running() && !self.reroller.is_running() {
            self.state.status = AutomationStatus::Suspended;
        }
    }

    fn handle_start(&mut self) {
        self.commit_title();
        match self.reroller.start() {
            Ok(()) => {
                self.state.status = AutomationStatus::Running;
                log::info!("GUI: Started reroll");
            }
            Err(e) => {
                log::info!("GUI: Start refused: {}", e);
                self.state.message = e.to_string();
            }
        }
    }

    fn handle_stop(&mut self) {
        self.reroller.stop();
        self.state.status = AutomationStatus::Suspended;
        log::info!("GUI: Stopped reroll");
    }

    fn handle_preview(&mut self) {
        match self.reroller.toggle_preview() {
            Ok(true) => {
                self.state.message = "Preview started.".to_string();
                log::info!("GUI: Started preview");
            }
            Ok(false) => {
                self.state.message = "Preview stopped.".to_string();
                log::info!("GUI: Stopped preview");
            }
            Err(e) => self.state.message = e.to_string(),
        }
    }

    fn handle_toggle(&mut self) {
        if self.reroller.is_running() {
            self.handle_stop();
        } else {
            self.handle_start();
        }
    }

    fn handle_dump(&mut self) {
        let Some(event_log) = &self.event_log else {
            return;
        };
        self.state.message = match event_log.dump(&crate::paths::get_event_log_dir()) {
            Ok(Some(path)) => format!("Logs written to {}", path.display()),
            Ok(None) => "No logs to write.".to_string(),
            Err(e) => {
                log::error!("Event log dump failed: {:#}", e);
                format!("Error: Failed to write logs: {}", e)
            }
        };
    }

    fn commit_field(&mut self, field: SettingField) {
        let Some(text) = self
            .state
            .inputs
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, t)| t.clone())
        else {
            return;
        };

        let result = self
            .reroller
            .settings()
            .update(|s| s.apply_input(field, &text));
        if let Err(e) = result {
            log::debug!("Rejected input for {}: {}", field, e);
            self.state.message = e.to_string();
            let settings = self.reroller.settings().snapshot();
            self.state.reset_input(field, &settings);
        }
    }

    fn commit_title(&mut self) {
        let title = self.state.window_title.trim().to_string();
        self.reroller
            .settings()
            .update(|s| s.window_title = title);
    }

    fn select_min_rank(&mut self, name: &str) {
        let ranks = self.reroller.ranks().clone();
        if let Err(e) = self
            .reroller
            .settings()
            .update(|s| s.set_min_rank(name, &ranks))
        {
            self.state.message = e.to_string();
        }
    }

    /// Completes a cursor pick once its countdown has run out.
    fn poll_pick(&mut self) {
        let Some(pick) = self.state.pick else {
            return;
        };
        if !pick.is_due() {
            return;
        }
        self.state.pick = None;

        let mut cursor = POINT::default();
        if let Err(e) = unsafe { GetCursorPos(&mut cursor) } {
            self.state.message = format!("Error: Failed to read cursor position: {}", e);
            return;
        }
        let here = (cursor.x, cursor.y);

        let settings = self.reroller.settings();
        match pick.target {
            PickTarget::RegionStart => {
                self.state.pick = Some(PendingPick::new(PickTarget::RegionEnd(here)));
            }
            PickTarget::RegionEnd(start) => {
                let region = CaptureRegion::from_corners(start, here);
                if region.is_empty() {
                    self.state.message = "Selected area is empty.".to_string();
                } else {
                    settings.update(|s| s.region = Some(region));
                    self.state.message = format!("Area set to {}", region);
                }
            }
            PickTarget::FirstPoint => {
                let point = ScreenPoint::new(here.0, here.1);
                settings.update(|s| s.first_point = Some(point));
                self.state.message = format!("First click point set to {}", point);
            }
            PickTarget::SecondPoint => {
                let point = ScreenPoint::new(here.0, here.1);
                settings.update(|s| s.second_point = Some(point));
                self.state.message = format!("Second click point set to {}", point);
            }
        }
    }
}

impl eframe::App for GuiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if ctx.input(|i| i.viewport().close_requested()) {
            self.reroller.stop();
            self.reroller.stop_preview();
        }

        self.drain_events();
        while self.hotkey.try_recv().is_ok() {
            self.handle_toggle();
        }
        self.poll_pick();

        let previewing = self.reroller.is_previewing();

        // Repaint while running, previewing or counting down
        if self.state.status.is_running() || previewing || self.state.pick.is_some() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }

        let settings = self.reroller.settings().snapshot();
        let pending_logs = self.event_log.as_ref().map(|log| log.pending());

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Pip Reroller");
            ui.add_space(8.0);

            egui::ScrollArea::vertical().show(ui, |ui| {
                let (committed, title_committed) = render::render_settings(ui, &mut self.state);
                for field in committed {
                    self.commit_field(field);
                }
                if title_committed {
                    self.commit_title();
                }

                ui.add_space(8.0);
                if let Some(rank) =
                    render::render_rank_selector(ui, self.reroller.ranks(), &settings.min_rank)
                {
                    self.select_min_rank(&rank);
                }

                ui.add_space(8.0);
                ui.separator();
                if let Some(target) = render::render_targets(ui, &self.state, &settings) {
                    self.state.pick = Some(PendingPick::new(target));
                }

                ui.add_space(8.0);
                ui.separator();
                let actions =
                    render::render_controls(ui, &self.state, previewing, pending_logs);
                if actions.start {
                    self.handle_start();
                }
                if actions.stop {
                    self.handle_stop();
                }
                if actions.toggle_preview {
                    self.handle_preview();
                }
                if actions.dump {
                    self.handle_dump();
                }

                ui.add_space(8.0);
                render::render_status(ui, &self.state);

                ui.add_space(8.0);
                ui.separator();
                render::render_counts(ui, &self.state, self.reroller.ranks());
                render::render_preview(ui, &self.state, settings.region);
            });
        });
    }
}

/// Run the GUI application.
/// This function blocks until the window is closed.
pub fn run_gui() -> eframe::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(Vec2::new(460.0, 720.0))
            .with_min_inner_size(Vec2::new(380.0, 480.0))
            .with_title("Pip Reroller")
            .with_always_on_top(),
        ..Default::default()
    };

    eframe::run_native(
        "Pip Reroller",
        options,
        Box::new(|cc| {
            log::info!("GUI: Creating GuiApp instance...");
            Ok(Box::new(GuiApp::new(cc)))
        }),
    )
}
