//! Reroll automation.
//!
//! This module provides:
//! - Operator settings and the application config
//! - The detection poller and automation sequencer threads
//! - The run controller that owns them
//! - Input injection, UI notification, event logging and presence seams
//!
//! Only settings, config and the snapshot types are needed by the headless
//! classify mode; the threaded parts are built on Windows (and for tests).

pub mod config;
#[cfg(any(windows, test))]
pub mod event_log;
pub mod input;
#[cfg(any(windows, test))]
pub mod notify;
#[cfg(any(windows, test))]
pub mod poller;
#[cfg(any(windows, test))]
pub mod presence;
#[cfg(any(windows, test))]
pub mod runner;
#[cfg(any(windows, test))]
pub mod sequencer;
pub mod settings;
#[cfg(any(windows, test))]
pub mod signal;
pub mod snapshot;

pub use config::{get_config, init_config};
pub use snapshot::{DetectionSnapshot, StopCondition};

#[cfg(windows)]
pub use runner::{Collaborators, Reroller, RunOptions};
