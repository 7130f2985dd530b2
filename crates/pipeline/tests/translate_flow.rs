//! Full pipeline runs over fake detection/translation backends with the
//! offline inpainter: bubble text erased by the cleaner, free text by the
//! restorer, translations rendered into the cleaned page.

use std::path::Path;
use std::sync::Arc;

use geometry::BBox;
use image::{Rgb, RgbImage};
use models::{DetectionOutput, ImageSize, TranslationResult};
use pipeline::clean::SolidBubbleCleaner;
use pipeline::{
    DetectError, Detector, Pipeline, RoutedInpainter, SolidRestorer, TextRenderer, TranslateError,
    Translator,
};

struct FixedDetector(DetectionOutput);

#[async_trait::async_trait]
impl Detector for FixedDetector {
    async fn detect(&self, _image_path: &Path) -> Result<DetectionOutput, DetectError> {
        Ok(self.0.clone())
    }
}

struct FixedTranslator(Vec<TranslationResult>);

#[async_trait::async_trait]
impl Translator for FixedTranslator {
    async fn translate(
        &self,
        _image_path: &Path,
        _bboxes: &[BBox],
    ) -> Result<Vec<TranslationResult>, TranslateError> {
        Ok(self.0.clone())
    }
}

/// White page with a bubble containing black dialog text plus black free
/// text lower down.
fn draw_page() -> RgbImage {
    let mut page = RgbImage::from_pixel(400, 400, Rgb([250, 250, 250]));
    for y in 170..230 {
        for x in 170..230 {
            page.put_pixel(x, y, Rgb([0, 0, 0])); // bubble dialog
        }
    }
    for y in 330..350 {
        for x in 120..280 {
            page.put_pixel(x, y, Rgb([0, 0, 0])); // free text
        }
    }
    page
}

fn detection() -> DetectionOutput {
    DetectionOutput {
        image_size: ImageSize {
            width: 400,
            height: 400,
        },
        bubbles: vec![vec![100.0, 100.0, 300.0, 300.0]],
        bubble_confs: vec![0.98],
        texts: vec![
            vec![170.0, 170.0, 230.0, 230.0],
            vec![120.0, 330.0, 280.0, 350.0],
        ],
        text_confs: vec![0.95, 0.9],
    }
}

fn renderer() -> Option<Arc<TextRenderer>> {
    match TextRenderer::new(None) {
        Ok(renderer) => Some(Arc::new(renderer)),
        Err(_) => {
            eprintln!("no system font available; skipping pipeline flow test");
            None
        }
    }
}

fn pipeline(translations: Vec<TranslationResult>, renderer: Arc<TextRenderer>) -> Pipeline {
    Pipeline::new(
        Arc::new(FixedDetector(detection())),
        Arc::new(FixedTranslator(translations)),
        Arc::new(RoutedInpainter::new(
            Arc::new(SolidBubbleCleaner::default()),
            Arc::new(SolidRestorer),
        )),
        renderer,
    )
}

#[tokio::test]
async fn source_text_is_erased_when_nothing_renders() {
    let Some(renderer) = renderer() else {
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("page.png");
    draw_page().save(&path).unwrap();

    // No translations at all: the output is the cleaned page.
    let out = pipeline(Vec::new(), renderer)
        .translate_image(&path)
        .await
        .unwrap();

    assert_eq!(out.dimensions(), (400, 400));
    assert_eq!(*out.get_pixel(200, 200), Rgb([250, 250, 250]));
    assert_eq!(*out.get_pixel(200, 340), Rgb([250, 250, 250]));
}

#[tokio::test]
async fn translations_are_drawn_into_the_cleaned_page() {
    let Some(renderer) = renderer() else {
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("page.png");
    draw_page().save(&path).unwrap();

    let translations = vec![
        TranslationResult {
            index: 0,
            translated: "Hello there".into(),
        },
        TranslationResult {
            index: 1,
            translated: "BOOM".into(),
        },
    ];
    let out = pipeline(translations, renderer)
        .translate_image(&path)
        .await
        .unwrap();

    // Ink must have landed inside the bubble's safe area and inside the
    // free-text erase area.
    let bubble_ink = (135..265)
        .flat_map(|y| (135..265).map(move |x| (x, y)))
        .any(|(x, y)| out.get_pixel(x, y)[0] < 128);
    assert!(bubble_ink, "no rendered text inside the bubble");

    let free_ink = (325..355)
        .flat_map(|y| (100..300).map(move |x| (x, y)))
        .any(|(x, y)| out.get_pixel(x, y)[0] < 128);
    assert!(free_ink, "no rendered text over the free-text area");
}
