//! Greedy shelf/guillotine rectangle packer
//!
//! Rectangles are placed tallest first into a list of free spaces. The
//! space list is scanned newest to oldest, so boxes land next to the ones
//! placed just before them.

use crate::consts::PACK_TARGET_FILL;

/// One rectangle to pack. `x`/`y` are written by [`pack`].
/// `id` lets callers find their rectangle again after sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackRect {
    pub id: usize,
    pub w: u32,
    pub h: u32,
    pub x: u32,
    pub y: u32,
}

impl PackRect {
    pub fn new(id: usize, w: u32, h: u32) -> Self {
        Self { id, w, h, x: 0, y: 0 }
    }

    pub fn overlaps(&self, other: &PackRect) -> bool {
        self.x < other.x + other.w
            && other.x < self.x + self.w
            && self.y < other.y + other.h
            && other.y < self.y + self.h
    }
}

/// Bounding container of a packing
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PackResult {
    pub w: u32,
    pub h: u32,
    /// Covered area / container area, 0 for an empty packing
    pub fill: f32,
}

#[derive(Debug, Clone, Copy)]
struct Space {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

/// Pack `rects` in place. The slice is reordered (stable, tallest first).
pub fn pack(rects: &mut [PackRect]) -> PackResult {
    let mut area: u64 = 0;
    let mut max_width = 0;
    for r in rects.iter() {
        area += r.w as u64 * r.h as u64;
        max_width = max_width.max(r.w);
    }

    rects.sort_by(|a, b| b.h.cmp(&a.h));

    let start_width = ((area as f64 / PACK_TARGET_FILL).sqrt().ceil() as u32).max(max_width);
    let mut spaces = vec![Space {
        x: 0,
        y: 0,
        w: start_width,
        h: u32::MAX,
    }];

    let mut width = 0;
    let mut height = 0;

    for rect in rects.iter_mut() {
        for i in (0..spaces.len()).rev() {
            let space = spaces[i];
            if rect.w > space.w || rect.h > space.h {
                continue;
            }

            rect.x = space.x;
            rect.y = space.y;
            width = width.max(rect.x + rect.w);
            height = height.max(rect.y + rect.h);

            if rect.w == space.w && rect.h == space.h {
                spaces.swap_remove(i);
            } else if rect.h == space.h {
                spaces[i].x += rect.w;
                spaces[i].w -= rect.w;
            } else if rect.w == space.w {
                spaces[i].y += rect.h;
                spaces[i].h -= rect.h;
            } else {
                spaces.push(Space {
                    x: space.x + rect.w,
                    y: space.y,
                    w: space.w - rect.w,
                    h: rect.h,
                });
                spaces[i].y += rect.h;
                spaces[i].h -= rect.h;
            }
            break;
        }
    }

    let container = width as u64 * height as u64;
    let fill = if container == 0 {
        0.0
    } else {
        (area as f64 / container as f64) as f32
    };

    PackResult {
        w: width,
        h: height,
        fill,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty() {
        let result = pack(&mut []);
        assert_eq!(result, PackResult { w: 0, h: 0, fill: 0.0 });
    }

    #[test]
    fn test_single() {
        let mut rects = [PackRect::new(0, 10, 4)];
        let result = pack(&mut rects);
        assert_eq!((result.w, result.h), (10, 4));
        assert_eq!(result.fill, 1.0);
        assert_eq!((rects[0].x, rects[0].y), (0, 0));
    }

    #[test]
    fn test_three_squares() {
        let mut rects = [
            PackRect::new(0, 4, 4),
            PackRect::new(1, 16, 16),
            PackRect::new(2, 8, 8),
        ];
        let result = pack(&mut rects);
        // tallest first
        assert_eq!(rects.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 0]);
        assert_eq!((rects[0].x, rects[0].y), (0, 0));
        assert_eq!((rects[1].x, rects[1].y), (0, 16));
        assert_eq!((rects[2].x, rects[2].y), (8, 16));
        assert_eq!((result.w, result.h), (16, 24));
        assert!((result.fill - 336.0 / 384.0).abs() < 1e-6);
    }

    #[test]
    fn test_sort_is_stable() {
        let mut rects = [
            PackRect::new(0, 3, 5),
            PackRect::new(1, 2, 5),
            PackRect::new(2, 7, 5),
        ];
        pack(&mut rects);
        assert_eq!(rects.iter().map(|r| r.id).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_equal_squares_do_not_overlap() {
        let mut rects: Vec<_> = (0..4).map(|i| PackRect::new(i, 5, 5)).collect();
        let result = pack(&mut rects);
        assert!(result.fill > 0.0 && result.fill <= 1.0);
        for (i, a) in rects.iter().enumerate() {
            for b in rects.iter().skip(i + 1) {
                assert!(!a.overlaps(b));
            }
        }
    }

    proptest! {
        #[test]
        fn prop_no_overlap_and_contained(
            sizes in prop::collection::vec((1u32..64, 1u32..64), 1..40)
        ) {
            let mut rects: Vec<_> = sizes
                .iter()
                .enumerate()
                .map(|(i, &(w, h))| PackRect::new(i, w, h))
                .collect();
            let result = pack(&mut rects);

            prop_assert!(result.fill > 0.0 && result.fill <= 1.0);
            for (i, a) in rects.iter().enumerate() {
                prop_assert!(a.x + a.w <= result.w);
                prop_assert!(a.y + a.h <= result.h);
                prop_assert!(result.w >= a.w && result.h >= a.h);
                for b in rects.iter().skip(i + 1) {
                    prop_assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
                }
            }
        }
    }
}
