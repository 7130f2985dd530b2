//! Bubble-interior text removal by solid fill. Purely local pixel work:
//! the cleaner never talks to the network.

use geometry::{clip_to_bounds, inscribed_rect, intersect, BBox, INSCRIBED_RATIO};
use image::RgbImage;
use models::TextRegion;

use crate::raster::{fill_rect, sample_edge_color};

/// Erases bubble text regions from an image, producing refined regions with
/// their erase and render areas attached.
pub trait BubbleCleaner: Send + Sync {
    fn clean(&self, image: RgbImage, regions: &[TextRegion]) -> (RgbImage, Vec<TextRegion>);
}

/// Fills each bubble's text area with a color sampled from its surround.
pub struct SolidBubbleCleaner {
    padding_ratio: f64,
}

impl SolidBubbleCleaner {
    pub fn new(padding_ratio: f64) -> Self {
        Self { padding_ratio }
    }

    /// Text bbox padded by the ratio of its own extent, kept inside the
    /// bubble's inscribed rectangle so the fill can never touch the bubble
    /// outline, then clipped to the image.
    fn inpaint_bbox_for(&self, text: &BBox, bubble: &BBox, width: u32, height: u32) -> BBox {
        let inscribed = inscribed_rect(bubble, INSCRIBED_RATIO);
        let pad_x = text.width() * self.padding_ratio;
        let pad_y = text.height() * self.padding_ratio;
        let padded = BBox::new(
            text.x1 - pad_x,
            text.y1 - pad_y,
            text.x2 + pad_x,
            text.y2 + pad_y,
        );
        clip_to_bounds(&intersect(&padded, &inscribed), width, height)
    }
}

impl Default for SolidBubbleCleaner {
    fn default() -> Self {
        Self::new(0.2)
    }
}

impl BubbleCleaner for SolidBubbleCleaner {
    fn clean(&self, mut image: RgbImage, regions: &[TextRegion]) -> (RgbImage, Vec<TextRegion>) {
        let (width, height) = image.dimensions();
        // Colors are sampled from the untouched page so earlier fills never
        // bleed into later samples.
        let source = image.clone();
        let mut updated = Vec::with_capacity(regions.len());

        for region in regions {
            let Some(bubble) = region.bubble_bbox else {
                continue;
            };

            let inpaint_bbox = self.inpaint_bbox_for(&region.text_bbox, &bubble, width, height);
            let render_bbox = inscribed_rect(&bubble, INSCRIBED_RATIO);

            let color = sample_edge_color(&source, &inpaint_bbox);
            fill_rect(&mut image, &inpaint_bbox, color);

            updated.push(TextRegion {
                index: region.index,
                text_bbox: region.text_bbox,
                bubble_bbox: Some(bubble),
                inpaint_bbox: Some(inpaint_bbox),
                render_bbox: Some(render_bbox),
            });
        }

        (image, updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn bubble_page() -> (RgbImage, TextRegion, BBox) {
        // White page, bubble spanning most of it, black text in the middle.
        let mut image = RgbImage::from_pixel(200, 200, Rgb([250, 250, 250]));
        let text = BBox::new(80.0, 80.0, 120.0, 120.0);
        for y in 80..120 {
            for x in 80..120 {
                image.put_pixel(x, y, Rgb([10, 10, 10]));
            }
        }
        let bubble = BBox::new(20.0, 20.0, 180.0, 180.0);
        let mut region = TextRegion::new(0, text);
        region.bubble_bbox = Some(bubble);
        (image, region, bubble)
    }

    #[test]
    fn text_pixels_are_replaced_with_paper_color() {
        let (image, region, _) = bubble_page();
        let cleaner = SolidBubbleCleaner::default();
        let (cleaned, updated) = cleaner.clean(image, &[region]);

        assert_eq!(updated.len(), 1);
        assert_eq!(*cleaned.get_pixel(100, 100), Rgb([250, 250, 250]));
    }

    #[test]
    fn inpaint_bbox_stays_inside_inscribed_rect_and_image() {
        let (image, region, bubble) = bubble_page();
        let (width, height) = image.dimensions();
        let cleaner = SolidBubbleCleaner::default();
        let (_, updated) = cleaner.clean(image, &[region]);

        let inpaint = updated[0].inpaint_bbox.unwrap();
        let inscribed = inscribed_rect(&bubble, INSCRIBED_RATIO);
        assert!(inpaint.x1 >= inscribed.x1 && inpaint.x2 <= inscribed.x2);
        assert!(inpaint.y1 >= inscribed.y1 && inpaint.y2 <= inscribed.y2);
        assert!(inpaint.x2 <= f64::from(width) && inpaint.y2 <= f64::from(height));
    }

    #[test]
    fn render_bbox_is_the_inscribed_rect() {
        let (image, region, bubble) = bubble_page();
        let cleaner = SolidBubbleCleaner::default();
        let (_, updated) = cleaner.clean(image, &[region]);
        assert_eq!(
            updated[0].render_bbox,
            Some(inscribed_rect(&bubble, INSCRIBED_RATIO))
        );
    }

    #[test]
    fn text_outside_the_inscribed_rect_cannot_drag_the_fill_out() {
        // Text box hugging the bubble's corner, partly outside the
        // inscribed rectangle.
        let image = RgbImage::from_pixel(200, 200, Rgb([250, 250, 250]));
        let bubble = BBox::new(100.0, 100.0, 180.0, 180.0);
        let mut region = TextRegion::new(0, BBox::new(95.0, 95.0, 115.0, 115.0));
        region.bubble_bbox = Some(bubble);

        let cleaner = SolidBubbleCleaner::default();
        let (_, updated) = cleaner.clean(image, &[region]);

        let inpaint = updated[0].inpaint_bbox.unwrap();
        let inscribed = inscribed_rect(&bubble, INSCRIBED_RATIO);
        assert!(inpaint.x1 >= inscribed.x1);
        assert!(inpaint.y1 >= inscribed.y1);
        assert!(inpaint.x1 <= inpaint.x2 && inpaint.y1 <= inpaint.y2);
    }
}
