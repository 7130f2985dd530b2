use crate::{BBox, INSCRIBED_RATIO, OVERLAP_THRESHOLD};

/// Fraction of `a`'s area covered by `a ∩ b`. Zero when `a` has no area or
/// the boxes are disjoint.
pub fn overlap_ratio(a: &BBox, b: &BBox) -> f64 {
    let area_a = a.area();
    if area_a <= 0.0 {
        return 0.0;
    }

    let ix1 = a.x1.max(b.x1);
    let iy1 = a.y1.max(b.y1);
    let ix2 = a.x2.min(b.x2);
    let iy2 = a.y2.min(b.y2);

    if ix1 >= ix2 || iy1 >= iy2 {
        return 0.0;
    }
    (ix2 - ix1) * (iy2 - iy1) / area_a
}

/// Clamps each coordinate independently into `[0, width] x [0, height]`.
/// A box fully outside the bounds collapses to zero area on the edge.
pub fn clip_to_bounds(bbox: &BBox, width: u32, height: u32) -> BBox {
    let w = f64::from(width);
    let h = f64::from(height);
    BBox {
        x1: bbox.x1.clamp(0.0, w),
        y1: bbox.y1.clamp(0.0, h),
        x2: bbox.x2.clamp(0.0, w),
        y2: bbox.y2.clamp(0.0, h),
    }
}

/// Axis-aligned rectangle centered on the bubble with half-extents scaled
/// by `ratio` of the bubble's.
pub fn inscribed_rect(bubble: &BBox, ratio: f64) -> BBox {
    let (cx, cy) = bubble.center();
    let hw = bubble.width() / 2.0;
    let hh = bubble.height() / 2.0;
    BBox::new(
        cx - hw * ratio,
        cy - hh * ratio,
        cx + hw * ratio,
        cy + hh * ratio,
    )
}

/// `a ∩ b`, collapsed to a zero-area box on `a`'s nearest edge when the two
/// are disjoint. Never produces `x1 > x2`.
pub fn intersect(a: &BBox, b: &BBox) -> BBox {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2).max(x1);
    let y2 = a.y2.min(b.y2).max(y1);
    BBox { x1, y1, x2, y2 }
}

/// Picks the bubble covering the largest share of `text_bbox`, provided the
/// share strictly exceeds [`OVERLAP_THRESHOLD`].
pub fn find_bubble(text_bbox: &BBox, bubbles: &[BBox]) -> Option<BBox> {
    let mut best: Option<BBox> = None;
    let mut best_overlap = 0.0;

    for bubble in bubbles {
        let overlap = overlap_ratio(text_bbox, bubble);
        if overlap > best_overlap {
            best = Some(*bubble);
            best_overlap = overlap;
        }
    }

    if best_overlap > OVERLAP_THRESHOLD {
        best
    } else {
        None
    }
}

/// Safe area for drawing translated text: the bubble's inscribed rectangle
/// when one exists, otherwise the erased area itself.
pub fn calc_render_bbox(bubble: Option<&BBox>, inpaint_bbox: &BBox) -> BBox {
    match bubble {
        Some(bubble) => inscribed_rect(bubble, INSCRIBED_RATIO),
        None => *inpaint_bbox,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_ratio_is_bounded() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let cases = [
            BBox::new(0.0, 0.0, 10.0, 10.0),
            BBox::new(5.0, 5.0, 15.0, 15.0),
            BBox::new(20.0, 20.0, 30.0, 30.0),
            BBox::new(0.0, 0.0, 1000.0, 1000.0),
        ];
        for b in cases {
            let r = overlap_ratio(&a, &b);
            assert!((0.0..=1.0).contains(&r), "ratio {r} out of range");
        }
    }

    #[test]
    fn overlap_ratio_of_contained_box_is_one() {
        let a = BBox::new(2.0, 2.0, 8.0, 8.0);
        let b = BBox::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(overlap_ratio(&a, &b), 1.0);
    }

    #[test]
    fn overlap_ratio_of_empty_box_is_zero() {
        let empty = BBox::new(5.0, 5.0, 5.0, 5.0);
        let b = BBox::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(overlap_ratio(&empty, &b), 0.0);
    }

    #[test]
    fn clip_keeps_coordinates_ordered_and_in_bounds() {
        let cases = [
            BBox::new(-10.0, -10.0, 5.0, 5.0),
            BBox::new(90.0, 90.0, 200.0, 200.0),
            BBox::new(150.0, 150.0, 300.0, 300.0), // fully outside
        ];
        for b in cases {
            let c = clip_to_bounds(&b, 100, 100);
            assert!(c.x1 >= 0.0 && c.x1 <= c.x2 && c.x2 <= 100.0, "{c:?}");
            assert!(c.y1 >= 0.0 && c.y1 <= c.y2 && c.y2 <= 100.0, "{c:?}");
        }
    }

    #[test]
    fn fully_outside_box_collapses_to_zero_area() {
        let b = BBox::new(150.0, 150.0, 300.0, 300.0);
        let c = clip_to_bounds(&b, 100, 100);
        assert_eq!(c.area(), 0.0);
    }

    #[test]
    fn inscribed_rect_is_contained_in_bubble() {
        let bubble = BBox::new(10.0, 20.0, 110.0, 80.0);
        let inner = inscribed_rect(&bubble, INSCRIBED_RATIO);
        assert!(inner.x1 >= bubble.x1 && inner.x2 <= bubble.x2);
        assert!(inner.y1 >= bubble.y1 && inner.y2 <= bubble.y2);
        assert!(inner.is_valid());
    }

    #[test]
    fn intersect_of_overlapping_boxes() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(5.0, 5.0, 15.0, 15.0);
        let i = intersect(&a, &b);
        assert_eq!(i.to_list(), [5.0, 5.0, 10.0, 10.0]);
    }

    #[test]
    fn intersect_of_disjoint_boxes_has_zero_area() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(20.0, 20.0, 30.0, 30.0);
        let i = intersect(&a, &b);
        assert_eq!(i.area(), 0.0);
        assert!(i.x1 <= i.x2 && i.y1 <= i.y2);
    }

    #[test]
    fn find_bubble_picks_covering_bubble() {
        let text = BBox::new(10.0, 10.0, 90.0, 90.0);
        let bubbles = [
            BBox::new(0.0, 0.0, 100.0, 100.0),
            BBox::new(500.0, 500.0, 600.0, 600.0),
        ];
        let found = find_bubble(&text, &bubbles).unwrap();
        assert_eq!(found, bubbles[0]);
    }

    #[test]
    fn find_bubble_rejects_distant_bubbles() {
        let text = BBox::new(10.0, 10.0, 90.0, 90.0);
        let bubbles = [BBox::new(500.0, 500.0, 600.0, 600.0)];
        assert!(find_bubble(&text, &bubbles).is_none());
    }

    #[test]
    fn find_bubble_requires_strictly_more_than_half() {
        // Bubble covers exactly half of the text box.
        let text = BBox::new(0.0, 0.0, 10.0, 10.0);
        let bubbles = [BBox::new(0.0, 0.0, 5.0, 10.0)];
        assert!(find_bubble(&text, &bubbles).is_none());
    }

    #[test]
    fn render_bbox_prefers_bubble_inscription() {
        let bubble = BBox::new(0.0, 0.0, 100.0, 100.0);
        let inpaint = BBox::new(40.0, 40.0, 60.0, 60.0);
        assert_eq!(
            calc_render_bbox(Some(&bubble), &inpaint),
            inscribed_rect(&bubble, INSCRIBED_RATIO)
        );
        assert_eq!(calc_render_bbox(None, &inpaint), inpaint);
    }
}
