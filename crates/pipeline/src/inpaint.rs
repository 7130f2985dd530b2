//! Split-brain inpainting: bubble text is cheap to erase locally, free
//! text needs the neural restorer. This router classifies and dispatches.

use std::sync::Arc;

use geometry::BBox;
use image::{GrayImage, RgbImage};
use models::TextRegion;

use crate::classify::classify_regions;
use crate::clean::BubbleCleaner;
use crate::restore::{BackgroundRestorer, InpaintError};

pub struct RoutedInpainter {
    cleaner: Arc<dyn BubbleCleaner>,
    restorer: Arc<dyn BackgroundRestorer>,
}

impl RoutedInpainter {
    pub fn new(cleaner: Arc<dyn BubbleCleaner>, restorer: Arc<dyn BackgroundRestorer>) -> Self {
        Self { cleaner, restorer }
    }

    /// Erases every text region. The cleaner runs first and the restorer
    /// operates on the partially cleaned image with only the free regions.
    /// The merged result is ordered by original detection index.
    pub async fn inpaint(
        &self,
        image: RgbImage,
        regions: &[TextRegion],
        bubbles: &[BBox],
    ) -> Result<(RgbImage, Vec<TextRegion>), InpaintError> {
        let (bubble_regions, free_regions) = classify_regions(regions, bubbles);

        let (image, mut updated) = self.cleaner.clean(image, &bubble_regions);
        let (image, free_updated) = self.restorer.restore(image, &free_regions).await?;

        updated.extend(free_updated);
        updated.sort_by_key(|r| r.index);
        Ok((image, updated))
    }

    /// Caller-supplied mask erase; goes straight to the restorer.
    pub async fn inpaint_mask(
        &self,
        image: &RgbImage,
        mask: &GrayImage,
    ) -> Result<RgbImage, InpaintError> {
        self.restorer.restore_mask(image, mask).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clean::SolidBubbleCleaner;
    use crate::restore::SolidRestorer;
    use image::Rgb;

    #[tokio::test]
    async fn merged_regions_come_back_in_detection_order() {
        let image = RgbImage::from_pixel(400, 400, Rgb([245, 245, 245]));
        let bubbles = vec![BBox::new(0.0, 0.0, 120.0, 120.0)];
        let regions = vec![
            TextRegion::new(0, BBox::new(200.0, 200.0, 260.0, 230.0)), // free
            TextRegion::new(1, BBox::new(20.0, 20.0, 100.0, 100.0)),   // bubble
            TextRegion::new(2, BBox::new(300.0, 300.0, 360.0, 330.0)), // free
        ];

        let inpainter = RoutedInpainter::new(
            Arc::new(SolidBubbleCleaner::default()),
            Arc::new(SolidRestorer),
        );
        let (_, updated) = inpainter
            .inpaint(image, &regions, &bubbles)
            .await
            .unwrap();

        let order: Vec<_> = updated.iter().map(|r| r.index).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert!(updated[1].bubble_bbox.is_some());
        assert!(updated[0].bubble_bbox.is_none());
        assert!(updated.iter().all(|r| r.inpaint_bbox.is_some()));
        assert!(updated.iter().all(|r| r.render_bbox.is_some()));
    }
}
