//! Pip detection.
//!
//! This module provides:
//! - The rank table (quality tiers and their reference colors)
//! - Rectangle merging for fragmented detections
//! - The frame classifier that turns captured pixels into ranked objects

pub mod classifier;
pub mod merge;
pub mod rank;

pub use classifier::{classify, DetectedObject};
pub use rank::{default_rank_configs, RankConfig, RankTable};
