//! Frame classifier.
//!
//! For every rank the frame is thresholded against the rank's reference
//! color, cleaned up with a morphological closing, and split into connected
//! regions whose bounding boxes are merged by proximity.

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::contours::find_contours;
use imageproc::distance_transform::Norm;
use imageproc::morphology::close;
use imageproc::point::Point;

use crate::detection::merge::{merge_rectangles, Rect};
use crate::detection::rank::{Rank, RankTable};

/// A captured frame. Pixels are RGB, in the same space as rank colors.
pub type Frame = RgbImage;

/// Closing radius under the L-infinity norm.
///
/// Two passes of a 3x3 square element are equivalent to one pass of a 5x5
/// square, i.e. radius 2.
const CLOSE_RADIUS: u8 = 2;

/// Contours enclosing this area or less are noise.
const MIN_CONTOUR_AREA: f64 = 1.0;

const MASK_ON: Luma<u8> = Luma([255]);
const MASK_OFF: Luma<u8> = Luma([0]);

/// A single classified pip within one frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetectedObject {
    /// Rank name
    pub rank: String,
    /// Rank ordinal, carried for ordering and stop-condition checks
    pub ordinal: u8,
    /// Bounding box in frame coordinates
    pub rect: Rect,
    /// Rank reference color (display only)
    pub color: Rgb<u8>,
}

impl DetectedObject {
    fn new(rank: &Rank, rect: Rect) -> Self {
        Self {
            rank: rank.name.clone(),
            ordinal: rank.ordinal,
            rect,
            color: rank.color,
        }
    }
}

/// Builds a binary mask of pixels within `tolerance` of `color`.
///
/// A pixel matches only if every channel individually is within tolerance.
/// Matching pixels are 255, all others 0.
pub fn rank_mask(frame: &Frame, color: Rgb<u8>, tolerance: u8) -> GrayImage {
    GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
        let pixel = frame.get_pixel(x, y);
        let matches = pixel
            .0
            .iter()
            .zip(color.0.iter())
            .all(|(p, c)| p.abs_diff(*c) <= tolerance);
        if matches { MASK_ON } else { MASK_OFF }
    })
}

/// Detects and classifies pips in a frame.
///
/// Returns objects sorted by descending rank; objects of the same rank keep
/// detection order. Merging never crosses ranks.
pub fn classify(
    frame: &Frame,
    ranks: &RankTable,
    color_tolerance: u8,
    merge_tolerance: u32,
) -> Vec<DetectedObject> {
    if frame.width() == 0 || frame.height() == 0 {
        return Vec::new();
    }

    let mut detected = Vec::new();
    for rank in ranks.iter() {
        let mask = rank_mask(frame, rank.color, color_tolerance);
        let mask = close(&mask, Norm::LInf, CLOSE_RADIUS);
        let rects = external_regions(&mask);
        for rect in merge_rectangles(&rects, merge_tolerance) {
            detected.push(DetectedObject::new(rank, rect));
        }
    }

    // Stable: same-rank objects stay in detection order
    detected.sort_by_key(|o| std::cmp::Reverse(o.ordinal));
    detected
}

/// Bounding boxes of the outermost regions of a mask, noise removed.
///
/// Top-level contours are those without a parent. Their border type is not
/// checked: a region touching the left edge of the mask is reported as a
/// parentless `Hole`.
fn external_regions(mask: &GrayImage) -> Vec<Rect> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.parent.is_none())
        .filter(|c| contour_area(&c.points) > MIN_CONTOUR_AREA)
        .filter_map(|c| bounding_rect(&c.points))
        .collect()
}

/// Polygon area enclosed by a contour (shoelace formula over pixel centers).
fn contour_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice_area: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(p, q)| p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64)
        .sum();
    (twice_area as f64 / 2.0).abs()
}

/// Inclusive pixel bounds of a point set.
fn bounding_rect(points: &[Point<i32>]) -> Option<Rect> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some(Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
}
