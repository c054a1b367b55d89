//! GUI rendering functions.
//!
//! Contains UI layout and component rendering logic. Functions return what
//! the operator clicked; the app applies the changes.

use eframe::egui::{self, Color32, RichText, Stroke, Vec2};

use super::state::{AutomationStatus, GuiState, PickTarget};
use crate::automation::settings::{AutomationSettings, SettingField};
use crate::capture::CaptureRegion;
use crate::detection::RankTable;

fn rank_color(color: image::Rgb<u8>) -> Color32 {
    Color32::from_rgb(color[0], color[1], color[2])
}

/// Render the numeric settings and the window title input.
/// Returns (committed_fields, title_committed).
pub fn render_settings(ui: &mut egui::Ui, state: &mut GuiState) -> (Vec<SettingField>, bool) {
    let mut committed = Vec::new();
    let mut title_committed = false;

    egui::Grid::new("settings_grid")
        .num_columns(2)
        .spacing([12.0, 6.0])
        .show(ui, |ui| {
            for (field, text) in state.inputs.iter_mut() {
                ui.label(field.label()).on_hover_text(field.hint());
                let response = ui.add(egui::TextEdit::singleline(text).desired_width(80.0));
                if response.lost_focus() {
                    committed.push(*field);
                }
                ui.end_row();
            }

            ui.label("Game Window Title:");
            let response =
                ui.add(egui::TextEdit::singleline(&mut state.window_title).desired_width(160.0));
            if response.lost_focus() {
                title_committed = true;
            }
            ui.end_row();
        });

    (committed, title_committed)
}

/// Render the region / click point pickers.
/// Returns the picker the operator started, if any.
pub fn render_targets(
    ui: &mut egui::Ui,
    state: &GuiState,
    settings: &AutomationSettings,
) -> Option<PickTarget> {
    let mut picked = None;
    let picking = state.pick.is_some();

    ui.add_enabled_ui(!picking && !state.status.is_running(), |ui| {
        ui.horizontal(|ui| {
            if ui.button("Select Area").clicked() {
                picked = Some(PickTarget::RegionStart);
            }
            ui.label(describe(&settings.region));
        });
        ui.horizontal(|ui| {
            if ui.button("Set First Click").clicked() {
                picked = Some(PickTarget::FirstPoint);
            }
            ui.label(describe(&settings.first_point));
        });
        ui.horizontal(|ui| {
            if ui.button("Set Second Click").clicked() {
                picked = Some(PickTarget::SecondPoint);
            }
            ui.label(describe(&settings.second_point));
        });
    });

    if let Some(pick) = &state.pick {
        ui.label(
            RichText::new(format!("{} ({})", pick.target.prompt(), pick.remaining_secs()))
                .color(Color32::from_rgb(255, 204, 0)),
        );
    }

    picked
}

fn describe<T: std::fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "not set".to_string())
}

/// Render one button per rank for the minimum quality.
/// Returns the rank the operator selected, if any.
pub fn render_rank_selector(
    ui: &mut egui::Ui,
    ranks: &RankTable,
    min_rank: &str,
) -> Option<String> {
    let mut selected = None;

    ui.horizontal(|ui| {
        ui.label("Minimum Quality:");
        for rank in ranks.iter() {
            let text = RichText::new(&rank.name).color(rank_color(rank.color)).strong();
            if ui
                .selectable_label(rank.name == min_rank, text)
                .clicked()
            {
                selected = Some(rank.name.clone());
            }
        }
    });

    selected
}

/// Render the per-rank counts of the latest snapshot.
pub fn render_counts(ui: &mut egui::Ui, state: &GuiState, ranks: &RankTable) {
    ui.horizontal_wrapped(|ui| {
        for (rank, (name, count)) in ranks.iter().zip(state.latest.counts.iter()) {
            ui.label(
                RichText::new(format!("{}: {}", name, count))
                    .color(rank_color(rank.color))
                    .monospace(),
            );
            ui.add_space(8.0);
        }
    });
}

/// Render the latest detected rectangles scaled into a preview box.
pub fn render_preview(ui: &mut egui::Ui, state: &GuiState, region: Option<CaptureRegion>) {
    let Some(region) = region.filter(|r| !r.is_empty()) else {
        return;
    };

    let max_width = ui.available_width().min(360.0);
    let scale = (max_width / region.width as f32).min(160.0 / region.height as f32);
    let size = Vec2::new(region.width as f32 * scale, region.height as f32 * scale);
    let (frame_rect, _response) = ui.allocate_exact_size(size, egui::Sense::hover());

    let painter = ui.painter_at(frame_rect);
    painter.rect_filled(frame_rect, 2.0, Color32::from_gray(24));

    for object in &state.latest.objects {
        let min = frame_rect.min
            + Vec2::new(object.rect.x as f32 * scale, object.rect.y as f32 * scale);
        let rect = egui::Rect::from_min_size(
            min,
            Vec2::new(object.rect.width as f32 * scale, object.rect.height as f32 * scale),
        );
        let color = rank_color(object.color);
        painter.rect_stroke(rect, 0.0, Stroke::new(1.5, color));
        painter.text(
            rect.left_top(),
            egui::Align2::LEFT_BOTTOM,
            &object.rank,
            egui::FontId::monospace(10.0),
            color,
        );
    }
}

/// Buttons clicked in the control row this frame.
#[derive(Default)]
pub struct ControlActions {
    pub start: bool,
    pub stop: bool,
    pub dump: bool,
    pub toggle_preview: bool,
}

/// Render the start/stop and preview controls and the log dump button.
pub fn render_controls(
    ui: &mut egui::Ui,
    state: &GuiState,
    previewing: bool,
    pending_logs: Option<usize>,
) -> ControlActions {
    let mut actions = ControlActions::default();

    ui.horizontal(|ui| {
        let is_running = state.status.is_running();

        ui.add_enabled_ui(!is_running && state.pick.is_none(), |ui| {
            if ui.button(RichText::new("▶ Start (F5)").size(16.0)).clicked() {
                actions.start = true;
            }
        });

        ui.add_space(20.0);

        ui.add_enabled_ui(is_running, |ui| {
            if ui.button(RichText::new("◼ Stop (F5)").size(16.0)).clicked() {
                actions.stop = true;
            }
        });
    });

    ui.horizontal(|ui| {
        let label = if previewing { "Stop Preview" } else { "Start Preview" };
        ui.add_enabled_ui(!state.status.is_running() && state.pick.is_none(), |ui| {
            if ui.button(label).on_hover_text("Detect pips without clicking").clicked() {
                actions.toggle_preview = true;
            }
        });

        if let Some(pending) = pending_logs {
            ui.add_space(20.0);
            if ui.button("Dump Logs").clicked() {
                actions.dump = true;
            }
            ui.label(
                RichText::new(format!("Logs ready to dump: {}", pending))
                    .color(Color32::from_rgb(255, 204, 0)),
            );
        }
    });

    actions
}

/// Render the status line and operator message.
pub fn render_status(ui: &mut egui::Ui, state: &GuiState) {
    let status_color = match &state.status {
        AutomationStatus::Running => Color32::from_rgb(0, 150, 0),
        AutomationStatus::Suspended => Color32::GRAY,
        AutomationStatus::Error(_) => Color32::from_rgb(200, 0, 0),
    };
    ui.label(RichText::new(state.status.status_text()).color(status_color));

    if !state.message.is_empty() {
        ui.label(&state.message);
    }
}
