//! The image-translation pipeline: detection, bubble/free routing,
//! inpainting, translation, and rendering, chained under one orchestrator.
//!
//! Every stage backend is a trait object so deployments (and tests) can
//! swap providers without touching the orchestration.

pub mod classify;
pub mod clean;
pub mod detect;
pub mod inpaint;
pub mod raster;
pub mod registry;
pub mod render;
pub mod restore;
pub mod translate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use geometry::{BBox, BBoxError};
use image::RgbImage;
use models::{DetectionOutput, TextRegion};

pub use detect::{DetectError, Detector, HttpDetector};
pub use inpaint::RoutedInpainter;
pub use render::{RenderError, TextRenderer};
pub use restore::{BackgroundRestorer, HttpRestorer, InpaintError, SolidRestorer};
pub use translate::{GeminiTranslator, TranslateError, Translator};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Detect(#[from] DetectError),
    #[error(transparent)]
    Translate(#[from] TranslateError),
    #[error(transparent)]
    Inpaint(#[from] InpaintError),
    #[error("detection produced an invalid bbox")]
    Geometry(#[from] BBoxError),
    #[error("이미지를 읽을 수 없음: {path:?}")]
    UnreadableImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Lifts raw detection output into indexed text regions plus the bubble
/// boxes. Indices are assigned in detection order and stay stable through
/// every later stage.
pub fn build_text_regions(
    detection: &DetectionOutput,
) -> Result<(Vec<TextRegion>, Vec<BBox>), BBoxError> {
    let regions = detection
        .texts
        .iter()
        .enumerate()
        .map(|(index, coords)| Ok(TextRegion::new(index, BBox::from_list(coords)?)))
        .collect::<Result<Vec<_>, BBoxError>>()?;
    let bubbles = detection
        .bubbles
        .iter()
        .map(|coords| BBox::from_list(coords))
        .collect::<Result<Vec<_>, BBoxError>>()?;
    Ok((regions, bubbles))
}

/// End-to-end translation of one page image.
pub struct Pipeline {
    detector: Arc<dyn Detector>,
    translator: Arc<dyn Translator>,
    inpainter: Arc<RoutedInpainter>,
    renderer: Arc<TextRenderer>,
}

impl Pipeline {
    pub fn new(
        detector: Arc<dyn Detector>,
        translator: Arc<dyn Translator>,
        inpainter: Arc<RoutedInpainter>,
        renderer: Arc<TextRenderer>,
    ) -> Self {
        Self {
            detector,
            translator,
            inpainter,
            renderer,
        }
    }

    pub fn inpainter(&self) -> Arc<RoutedInpainter> {
        self.inpainter.clone()
    }

    fn load_rgb(path: &Path) -> Result<RgbImage, PipelineError> {
        image::open(path)
            .map(|img| img.to_rgb8())
            .map_err(|source| PipelineError::UnreadableImage {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Runs detection, inpainting, translation, and rendering in order.
    ///
    /// Translation reads the ORIGINAL file so the model sees the source
    /// text; rendering draws on the cleaned image. A page with no detected
    /// text short-circuits to the decoded original.
    ///
    /// Backend errors propagate untouched; the worker turns them into the
    /// job's failure message.
    pub async fn translate_image(&self, path: &Path) -> Result<RgbImage, PipelineError> {
        let detection = self.detector.detect(path).await?;
        let (regions, bubbles) = build_text_regions(&detection)?;
        tracing::info!(
            texts = regions.len(),
            bubbles = bubbles.len(),
            "detection complete"
        );

        if regions.is_empty() {
            return Self::load_rgb(path);
        }

        let image = Self::load_rgb(path)?;
        let (clean_image, updated_regions) =
            self.inpainter.inpaint(image, &regions, &bubbles).await?;
        tracing::info!(regions = updated_regions.len(), "inpainting complete");

        let text_bboxes: Vec<BBox> = regions.iter().map(|r| r.text_bbox).collect();
        let translations = self.translator.translate(path, &text_bboxes).await?;
        tracing::info!(
            translated = translations.len(),
            total = regions.len(),
            "translation complete"
        );

        Ok(self
            .renderer
            .render(clean_image, &updated_regions, &translations))
    }
}
