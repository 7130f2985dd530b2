//! Free-text removal. The production restorer calls a neural inpainting
//! service; the solid restorer is an offline fallback that samples and
//! fills, the same trick the bubble cleaner uses.

use std::time::Duration;

use geometry::{calc_render_bbox, clip_to_bounds, BBox};
use image::{GrayImage, RgbImage};
use models::TextRegion;

use crate::raster::{
    self, fill_rect, gray_to_base64_png, mask_bounds, mask_for_regions, rgb_to_base64_png,
    sample_edge_color,
};

#[derive(Debug, thiserror::Error)]
pub enum InpaintError {
    #[error("inpainting service timed out")]
    Timeout,
    #[error("inpainting request failed")]
    Request(#[source] reqwest::Error),
    #[error("inpainting service returned HTTP {0}")]
    Status(u16),
    #[error("inpainting result could not be decoded")]
    Decode(#[from] image::ImageError),
    #[error("inpainting payload could not be encoded")]
    Encode(#[source] image::ImageError),
}

impl From<reqwest::Error> for InpaintError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Request(err)
        }
    }
}

/// Erases free-floating text regions, and arbitrary caller-supplied masks
/// for the erase path.
#[async_trait::async_trait]
pub trait BackgroundRestorer: Send + Sync {
    async fn restore(
        &self,
        image: RgbImage,
        regions: &[TextRegion],
    ) -> Result<(RgbImage, Vec<TextRegion>), InpaintError>;

    async fn restore_mask(
        &self,
        image: &RgbImage,
        mask: &GrayImage,
    ) -> Result<RgbImage, InpaintError>;
}

/// Clips each free region to the image and attaches its erase/render areas.
/// Regions that vanish entirely outside the image are dropped.
fn refine_free_regions(regions: &[TextRegion], width: u32, height: u32) -> Vec<TextRegion> {
    let mut refined = Vec::with_capacity(regions.len());
    for region in regions {
        let inpaint_bbox = clip_to_bounds(&region.text_bbox, width, height);
        if !inpaint_bbox.is_valid() {
            continue;
        }
        let render_bbox = calc_render_bbox(region.bubble_bbox.as_ref(), &inpaint_bbox);
        refined.push(TextRegion {
            index: region.index,
            text_bbox: region.text_bbox,
            bubble_bbox: region.bubble_bbox,
            inpaint_bbox: Some(inpaint_bbox),
            render_bbox: Some(render_bbox),
        });
    }
    refined
}

/// Remote neural inpainting over base64-PNG `{image, mask}` pairs.
pub struct HttpRestorer {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpRestorer {
    pub fn new(http: reqwest::Client, base_url: &str, timeout: Duration) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    async fn call(&self, image: &RgbImage, mask: &GrayImage) -> Result<RgbImage, InpaintError> {
        let body = serde_json::json!({
            "image": rgb_to_base64_png(image).map_err(InpaintError::Encode)?,
            "mask": gray_to_base64_png(mask).map_err(InpaintError::Encode)?,
        });

        let response = self
            .http
            .post(format!("{}/api/v1/inpaint", self.base_url))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(InpaintError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        Ok(image::load_from_memory(&bytes)?.to_rgb8())
    }
}

#[async_trait::async_trait]
impl BackgroundRestorer for HttpRestorer {
    async fn restore(
        &self,
        image: RgbImage,
        regions: &[TextRegion],
    ) -> Result<(RgbImage, Vec<TextRegion>), InpaintError> {
        if regions.is_empty() {
            return Ok((image, Vec::new()));
        }

        let (width, height) = image.dimensions();
        let refined = refine_free_regions(regions, width, height);
        if refined.is_empty() {
            return Ok((image, Vec::new()));
        }

        let mask = mask_for_regions(width, height, &refined);
        let clean = self.call(&image, &mask).await?;
        Ok((clean, refined))
    }

    async fn restore_mask(
        &self,
        image: &RgbImage,
        mask: &GrayImage,
    ) -> Result<RgbImage, InpaintError> {
        self.call(image, mask).await
    }
}

/// Offline restorer: per-region solid fill with generous horizontal
/// padding, tuned for narration strips on flat backgrounds.
#[derive(Default)]
pub struct SolidRestorer;

impl SolidRestorer {
    const PAD_X_RATIO: f64 = 1.0;
    const PAD_Y_RATIO: f64 = 0.3;

    fn padded_bbox(text: &BBox, width: u32, height: u32) -> BBox {
        let pad_x = text.width() * Self::PAD_X_RATIO;
        let pad_y = text.height() * Self::PAD_Y_RATIO;
        clip_to_bounds(
            &BBox::new(
                text.x1 - pad_x,
                text.y1 - pad_y,
                text.x2 + pad_x,
                text.y2 + pad_y,
            ),
            width,
            height,
        )
    }
}

#[async_trait::async_trait]
impl BackgroundRestorer for SolidRestorer {
    async fn restore(
        &self,
        mut image: RgbImage,
        regions: &[TextRegion],
    ) -> Result<(RgbImage, Vec<TextRegion>), InpaintError> {
        let (width, height) = image.dimensions();
        let source = image.clone();
        let mut refined = Vec::with_capacity(regions.len());

        for region in regions {
            let inpaint_bbox = Self::padded_bbox(&region.text_bbox, width, height);
            if !inpaint_bbox.is_valid() {
                continue;
            }
            let render_bbox = calc_render_bbox(region.bubble_bbox.as_ref(), &inpaint_bbox);

            let color = sample_edge_color(&source, &inpaint_bbox);
            fill_rect(&mut image, &inpaint_bbox, color);

            refined.push(TextRegion {
                index: region.index,
                text_bbox: region.text_bbox,
                bubble_bbox: region.bubble_bbox,
                inpaint_bbox: Some(inpaint_bbox),
                render_bbox: Some(render_bbox),
            });
        }

        Ok((image, refined))
    }

    async fn restore_mask(
        &self,
        image: &RgbImage,
        mask: &GrayImage,
    ) -> Result<RgbImage, InpaintError> {
        let mut result = image.clone();
        let mask = if mask.dimensions() != image.dimensions() {
            raster::resize_mask_nearest(mask, image.width(), image.height())
        } else {
            mask.clone()
        };

        if let Some(bounds) = mask_bounds(&mask) {
            // Sample just outside the masked area so the strip reads the
            // surrounding background, not the content being erased.
            let sample_area = clip_to_bounds(
                &BBox::new(
                    bounds.x1 - 5.0,
                    bounds.y1 - 5.0,
                    bounds.x2 + 5.0,
                    bounds.y2 + 5.0,
                ),
                image.width(),
                image.height(),
            );
            let color = sample_edge_color(image, &sample_area);
            fill_rect(&mut result, &bounds, color);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    #[tokio::test]
    async fn empty_region_list_returns_input_unchanged() {
        let image = RgbImage::from_pixel(30, 30, Rgb([5, 5, 5]));
        let restorer = SolidRestorer;
        let (out, refined) = restorer.restore(image.clone(), &[]).await.unwrap();
        assert_eq!(out, image);
        assert!(refined.is_empty());
    }

    #[test]
    fn fully_offscreen_regions_are_dropped() {
        let regions = [TextRegion::new(0, BBox::new(500.0, 500.0, 600.0, 600.0))];
        let refined = refine_free_regions(&regions, 100, 100);
        assert!(refined.is_empty());
    }

    #[test]
    fn refined_regions_carry_inpaint_and_render_areas() {
        let regions = [TextRegion::new(3, BBox::new(-10.0, 20.0, 50.0, 60.0))];
        let refined = refine_free_regions(&regions, 100, 100);
        assert_eq!(refined.len(), 1);
        let inpaint = refined[0].inpaint_bbox.unwrap();
        assert_eq!(inpaint.to_list(), [0.0, 20.0, 50.0, 60.0]);
        // Free text renders into the erased area itself.
        assert_eq!(refined[0].render_bbox, Some(inpaint));
        assert_eq!(refined[0].index, 3);
    }

    #[tokio::test]
    async fn solid_restorer_fills_free_text() {
        let mut image = RgbImage::from_pixel(100, 100, Rgb([240, 240, 240]));
        for y in 40..50 {
            for x in 30..70 {
                image.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
        let regions = [TextRegion::new(0, BBox::new(30.0, 40.0, 70.0, 50.0))];

        let restorer = SolidRestorer;
        let (out, refined) = restorer.restore(image, &regions).await.unwrap();
        assert_eq!(refined.len(), 1);
        assert_eq!(*out.get_pixel(50, 45), Rgb([240, 240, 240]));
    }

    #[tokio::test]
    async fn solid_restore_mask_fills_the_masked_area() {
        let mut image = RgbImage::from_pixel(60, 60, Rgb([230, 230, 230]));
        for y in 20..30 {
            for x in 20..30 {
                image.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
        let mut mask = GrayImage::from_pixel(60, 60, Luma([0]));
        for y in 20..30 {
            for x in 20..30 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }

        let restorer = SolidRestorer;
        let out = restorer.restore_mask(&image, &mask).await.unwrap();
        assert_eq!(*out.get_pixel(25, 25), Rgb([230, 230, 230]));
        // Pixels outside the mask are untouched.
        assert_eq!(*out.get_pixel(5, 5), Rgb([230, 230, 230]));
    }
}
