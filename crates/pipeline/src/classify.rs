//! Splits detected text regions into bubble dialog and free text.

use geometry::{find_bubble, BBox};
use models::TextRegion;

/// Routes each region to the bubble covering most of it, or marks it free
/// text when no bubble covers more than half. Returns
/// `(bubble_regions, free_regions)`; relative order within each bucket
/// follows the input, and the inputs themselves are left untouched.
pub fn classify_regions(
    regions: &[TextRegion],
    bubbles: &[BBox],
) -> (Vec<TextRegion>, Vec<TextRegion>) {
    let mut bubble_regions = Vec::new();
    let mut free_regions = Vec::new();

    for region in regions {
        match find_bubble(&region.text_bbox, bubbles) {
            Some(bubble) => bubble_regions.push(TextRegion {
                bubble_bbox: Some(bubble),
                ..region.clone()
            }),
            None => free_regions.push(TextRegion {
                bubble_bbox: None,
                ..region.clone()
            }),
        }
    }

    (bubble_regions, free_regions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(index: usize, bbox: BBox) -> TextRegion {
        TextRegion::new(index, bbox)
    }

    #[test]
    fn region_joins_its_covering_bubble() {
        let regions = [region(0, BBox::new(10.0, 10.0, 90.0, 90.0))];
        let bubbles = [
            BBox::new(0.0, 0.0, 100.0, 100.0),
            BBox::new(500.0, 500.0, 600.0, 600.0),
        ];

        let (bubble_regions, free_regions) = classify_regions(&regions, &bubbles);
        assert_eq!(bubble_regions.len(), 1);
        assert!(free_regions.is_empty());
        assert_eq!(bubble_regions[0].bubble_bbox, Some(bubbles[0]));
        assert_eq!(bubble_regions[0].index, 0);
    }

    #[test]
    fn distant_bubble_leaves_the_region_free() {
        let regions = [region(0, BBox::new(10.0, 10.0, 90.0, 90.0))];
        let bubbles = [BBox::new(500.0, 500.0, 600.0, 600.0)];

        let (bubble_regions, free_regions) = classify_regions(&regions, &bubbles);
        assert!(bubble_regions.is_empty());
        assert_eq!(free_regions.len(), 1);
        assert_eq!(free_regions[0].bubble_bbox, None);
    }

    #[test]
    fn bucket_order_follows_input_order() {
        let bubbles = [BBox::new(0.0, 0.0, 50.0, 50.0)];
        let regions = [
            region(0, BBox::new(5.0, 5.0, 20.0, 20.0)),   // bubble
            region(1, BBox::new(200.0, 200.0, 220.0, 220.0)), // free
            region(2, BBox::new(25.0, 25.0, 45.0, 45.0)), // bubble
            region(3, BBox::new(300.0, 300.0, 320.0, 320.0)), // free
        ];

        let (bubble_regions, free_regions) = classify_regions(&regions, &bubbles);
        let bubble_order: Vec<_> = bubble_regions.iter().map(|r| r.index).collect();
        let free_order: Vec<_> = free_regions.iter().map(|r| r.index).collect();
        assert_eq!(bubble_order, vec![0, 2]);
        assert_eq!(free_order, vec![1, 3]);
    }
}
