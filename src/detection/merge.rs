//! Proximity-based rectangle merging.
//!
//! Markers are often split into several mask fragments (anti-aliasing, the
//! number drawn on top of the pip, partial occlusion). Fragments that lie
//! within a pixel tolerance of each other are folded into one bounding box.

use serde::Serialize;

/// Axis-aligned rectangle in frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{},{},{})", self.x, self.y, self.width, self.height)
    }
}

/// Shortest distance between the edges of two rectangles.
///
/// Zero when they overlap or touch. Otherwise the gap is measured on each
/// axis separately and the hypotenuse of the two gaps is returned.
pub fn rect_distance(a: &Rect, b: &Rect) -> f64 {
    let dx = if a.right() < b.x {
        b.x - a.right()
    } else if b.right() < a.x {
        a.x - b.right()
    } else {
        0
    };

    let dy = if a.bottom() < b.y {
        b.y - a.bottom()
    } else if b.bottom() < a.y {
        a.y - b.bottom()
    } else {
        0
    };

    (dx as f64).hypot(dy as f64)
}

/// Merges rectangles that are within `max_distance` pixels of each other.
///
/// Single greedy pass in input order: each unconsumed rectangle seeds a
/// group, and every later unconsumed rectangle close to the seed is folded
/// into the group envelope. Members folded in are not used as new seeds, so
/// the result depends on input order for chains of rectangles.
pub fn merge_rectangles(rects: &[Rect], max_distance: u32) -> Vec<Rect> {
    let max_distance = max_distance as f64;
    let mut used = vec![false; rects.len()];
    let mut merged = Vec::new();

    for (i, seed) in rects.iter().enumerate() {
        if used[i] {
            continue;
        }
        used[i] = true;

        let (mut min_x, mut min_y) = (seed.x, seed.y);
        let (mut max_x, mut max_y) = (seed.right(), seed.bottom());

        for j in (i + 1)..rects.len() {
            if used[j] {
                continue;
            }
            let candidate = &rects[j];
            if rect_distance(seed, candidate) <= max_distance {
                min_x = min_x.min(candidate.x);
                min_y = min_y.min(candidate.y);
                max_x = max_x.max(candidate.right());
                max_y = max_y.max(candidate.bottom());
                used[j] = true;
            }
        }

        merged.push(Rect::new(min_x, min_y, max_x - min_x, max_y - min_y));
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_overlapping_is_zero() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 5, 10, 10);
        assert_eq!(rect_distance(&a, &b), 0.0);
    }

    #[test]
    fn test_distance_touching_is_zero() {
        let a = Rect::new(0, 0, 4, 4);
        let b = Rect::new(4, 0, 4, 4);
        assert_eq!(rect_distance(&a, &b), 0.0);
    }

    #[test]
    fn test_distance_diagonal() {
        let a = Rect::new(0, 0, 2, 2);
        let b = Rect::new(5, 6, 2, 2);
        // gaps of 3 and 4
        assert_eq!(rect_distance(&a, &b), 5.0);
        assert_eq!(rect_distance(&b, &a), 5.0);
    }

    #[test]
    fn test_merge_one_pixel_gap() {
        let rects = [Rect::new(0, 0, 4, 4), Rect::new(5, 0, 4, 4)];

        assert_eq!(merge_rectangles(&rects, 1), vec![Rect::new(0, 0, 9, 4)]);
        assert_eq!(merge_rectangles(&rects, 0), rects.to_vec());
    }

    #[test]
    fn test_merge_boundary_is_inclusive() {
        let rects = [Rect::new(0, 0, 2, 2), Rect::new(5, 6, 2, 2)];

        assert_eq!(merge_rectangles(&rects, 5).len(), 1);
        assert_eq!(merge_rectangles(&rects, 4).len(), 2);
    }

    #[test]
    fn test_merge_chain_uses_seed_only() {
        // b is close to a, c is close to b but not to a
        let a = Rect::new(0, 0, 2, 2);
        let b = Rect::new(4, 0, 2, 2);
        let c = Rect::new(8, 0, 2, 2);

        let merged = merge_rectangles(&[a, b, c], 2);
        assert_eq!(merged, vec![Rect::new(0, 0, 6, 2), c]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let rects = [
            Rect::new(0, 0, 4, 4),
            Rect::new(5, 0, 4, 4),
            Rect::new(40, 40, 3, 3),
            Rect::new(44, 41, 2, 2),
            Rect::new(100, 5, 6, 6),
        ];

        let once = merge_rectangles(&rects, 1);
        let twice = merge_rectangles(&once, 1);
        assert_eq!(once, twice);
        assert_eq!(once.len(), 3);
    }

    #[test]
    fn test_merge_empty() {
        assert!(merge_rectangles(&[], 10).is_empty());
    }
}
