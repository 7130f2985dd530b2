use geometry::BBox;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// Raw detection response: absolute-pixel boxes of the original image, with
/// parallel confidence arrays. Box arity is validated when the boxes are
/// lifted into [`BBox`]es.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionOutput {
    pub image_size: ImageSize,
    pub bubbles: Vec<Vec<f64>>,
    pub bubble_confs: Vec<f32>,
    pub texts: Vec<Vec<f64>>,
    pub text_confs: Vec<f32>,
}

impl DetectionOutput {
    /// Parallel arrays must agree in length; a mismatch is a schema error
    /// and never retried upstream.
    pub fn arrays_consistent(&self) -> bool {
        self.bubbles.len() == self.bubble_confs.len() && self.texts.len() == self.text_confs.len()
    }
}

/// One detected text area, refined stage by stage. `index` is the position
/// in the original detection output and keys translation results back to
/// their region; it survives classification and inpainting untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRegion {
    pub index: usize,
    pub text_bbox: BBox,
    /// Containing bubble, set by classification. `None` marks free text.
    pub bubble_bbox: Option<BBox>,
    /// Area erased by inpainting.
    pub inpaint_bbox: Option<BBox>,
    /// Safe area for drawing the translation.
    pub render_bbox: Option<BBox>,
}

impl TextRegion {
    pub fn new(index: usize, text_bbox: BBox) -> Self {
        Self {
            index,
            text_bbox,
            bubble_bbox: None,
            inpaint_bbox: None,
            render_bbox: None,
        }
    }
}

/// A translated string keyed by the originating region's detection index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub index: usize,
    pub translated: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_array_consistency() {
        let out = DetectionOutput {
            image_size: ImageSize {
                width: 800,
                height: 1200,
            },
            bubbles: vec![vec![0.0, 0.0, 10.0, 10.0]],
            bubble_confs: vec![0.9],
            texts: vec![],
            text_confs: vec![0.5],
        };
        assert!(!out.arrays_consistent());
    }
}
