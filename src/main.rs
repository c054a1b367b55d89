//! Pip Reroller
//!
//! Watches a screen region for colored quality pips and keeps clicking the
//! reroll buttons until the pips meet the operator's target.
//!
//! `pip-reroller --classify <image>` runs the classifier on an image file
//! and prints the detections, on any platform.

// Hide console window on Windows for GUI mode
#![cfg_attr(all(windows, not(debug_assertions)), windows_subsystem = "windows")]

mod automation;
mod capture;
mod detection;
#[cfg(windows)]
mod gui;
mod logging;
mod paths;
#[cfg(test)]
mod testing;

use anyhow::{anyhow, Context, Result};
use std::path::Path;

use automation::{get_config, init_config, DetectionSnapshot, StopCondition};
use detection::classify;

fn main() -> Result<()> {
    logging::install_panic_hook();

    paths::ensure_directories().context("Failed to create output directories")?;
    if let Err(e) = logging::init(&paths::get_logs_dir()) {
        eprintln!("Failed to install logger: {}", e);
    }

    init_config();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [flag, image] if flag == "--classify" => run_classify(Path::new(image)),
        [] => run_interactive(),
        _ => Err(anyhow!("Usage: pip-reroller [--classify <image>]")),
    }
}

#[cfg(windows)]
fn run_interactive() -> Result<()> {
    log::info!("Starting GUI application...");
    match gui::run_gui() {
        Ok(()) => {
            log::info!("GUI application exited normally");
            Ok(())
        }
        Err(e) => {
            log::error!("GUI error: {}", e);
            Err(anyhow!("GUI error: {}", e))
        }
    }
}

#[cfg(not(windows))]
fn run_interactive() -> Result<()> {
    Err(anyhow!(
        "The interactive reroller needs Windows. Use --classify <image> to test detection."
    ))
}

/// Classifies an image file with the configured ranks and default settings.
fn run_classify(path: &Path) -> Result<()> {
    let config = get_config();
    let ranks = config.rank_table();
    let frame = image::open(path)
        .with_context(|| format!("Failed to open image {}", path.display()))?
        .to_rgb8();

    let objects = classify(
        &frame,
        &ranks,
        config.defaults.color_tolerance,
        config.defaults.merge_tolerance,
    );
    let snapshot = DetectionSnapshot::new(&ranks, objects);

    log::info!(
        "Classified {} ({}x{}) against {} ranks: {} objects",
        path.display(),
        frame.width(),
        frame.height(),
        ranks.len(),
        snapshot.counts.total()
    );
    for object in &snapshot.objects {
        let [r, g, b] = object.color.0;
        println!("{}@{} #{:02x}{:02x}{:02x}", object.rank, object.rect, r, g, b);
    }
    let counts: Vec<String> = snapshot
        .counts
        .iter()
        .map(|(rank, n)| format!("{}:{}", rank, n))
        .collect();
    println!("Counts: {}", counts.join(", "));

    let condition = StopCondition::from_settings(&config.defaults, &ranks);
    println!(
        "Stop condition ({}x ≥{}): {}",
        config.defaults.min_objects,
        config.defaults.min_rank,
        if condition.is_met(&snapshot.counts) { "met" } else { "not met" }
    );
    Ok(())
}
