//! Draws translated text into the cleaned page: per-region font sizing,
//! greedy wrapping, and centered layout inside the safe render area.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use models::{TextRegion, TranslationResult};

/// Probed in order when no explicit font path is configured.
const FONT_PATHS: [&str; 5] = [
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "C:/Windows/Fonts/arial.ttf",
];

/// Fixed sample for estimating the average character width at a size.
const WIDTH_SAMPLE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

const MAX_FONT_SIZE: i64 = 40;
const MIN_FONT_SIZE: i64 = 8;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("no usable font found (searched {searched:?})")]
    FontUnavailable { searched: Vec<PathBuf> },
}

/// One line must keep at least one character regardless of how narrow the
/// box is.
pub fn calc_chars_per_line(box_width: f64, avg_char_width: f64) -> usize {
    ((box_width * 0.8) / avg_char_width).max(1.0) as usize
}

pub fn fits_in_box(text_width: f64, text_height: f64, box_width: f64, box_height: f64) -> bool {
    text_height <= box_height * 0.95 && text_width <= box_width * 0.95
}

/// Greedy word wrap by character count. Words longer than a line are
/// hard-split rather than overflowing.
pub fn wrap_by_count(text: &str, chars_per_line: usize) -> Vec<String> {
    let limit = chars_per_line.max(1);
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > limit {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let chars: Vec<char> = word.chars().collect();
            for chunk in chars.chunks(limit) {
                lines.push(chunk.iter().collect());
            }
            // A hard-split tail may still take more words; reopen it.
            if let Some(tail) = lines.pop() {
                current = tail;
            }
            continue;
        }

        let current_len = current.chars().count();
        if current.is_empty() {
            current = word.to_string();
        } else if current_len + 1 + word_len <= limit {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Text renderer over a single font face loaded once at startup. Per-size
/// handles are scale views over the shared face, so no per-size reloads
/// happen on the hot path.
pub struct TextRenderer {
    font: FontArc,
}

impl TextRenderer {
    pub fn new(override_path: Option<&Path>) -> Result<Self, RenderError> {
        let mut searched = Vec::new();
        let candidates = override_path
            .map(Path::to_path_buf)
            .into_iter()
            .chain(FONT_PATHS.iter().map(PathBuf::from));

        for path in candidates {
            searched.push(path.clone());
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };
            match FontArc::try_from_vec(bytes) {
                Ok(font) => {
                    tracing::debug!(?path, "loaded render font");
                    return Ok(Self { font });
                }
                Err(err) => {
                    tracing::warn!(?path, %err, "font file is unusable");
                }
            }
        }
        Err(RenderError::FontUnavailable { searched })
    }

    pub fn from_font(font: FontArc) -> Self {
        Self { font }
    }

    /// Renders every translated region onto the cleaned image.
    pub fn render(
        &self,
        mut image: RgbImage,
        regions: &[TextRegion],
        translations: &[TranslationResult],
    ) -> RgbImage {
        let by_index: HashMap<usize, &str> = translations
            .iter()
            .map(|t| (t.index, t.translated.as_str()))
            .collect();

        let mut drawn = 0;
        for region in regions {
            let Some(render_bbox) = region.render_bbox else {
                continue;
            };
            let Some(text) = by_index.get(&region.index).filter(|t| !t.is_empty()) else {
                continue;
            };

            let (x1, y1, x2, y2) = render_bbox.to_tuple();
            self.draw_block(&mut image, text, x1, y1, x2, y2);
            drawn += 1;
        }

        tracing::info!(drawn, regions = regions.len(), "rendering complete");
        image
    }

    fn line_width(&self, text: &str, size: i64) -> f64 {
        if text.is_empty() {
            return 0.0;
        }
        let (w, _) = text_size(PxScale::from(size as f32), &self.font, text);
        w as f64
    }

    fn avg_char_width(&self, size: i64) -> f64 {
        self.line_width(WIDTH_SAMPLE, size) / WIDTH_SAMPLE.len() as f64
    }

    fn wrap(&self, text: &str, box_width: f64, size: i64) -> Vec<String> {
        let avg = self.avg_char_width(size).max(1.0);
        wrap_by_count(text, calc_chars_per_line(box_width, avg))
    }

    /// Walks sizes from the box-derived maximum down to the minimum,
    /// accepting the first size whose wrapped block fits. Falls through to
    /// character-level wrapping at the minimum size.
    fn fit_text(&self, text: &str, box_width: f64, box_height: f64) -> (i64, Vec<String>) {
        let max_size = ((box_height as i64) / 2).min(MAX_FONT_SIZE);

        let mut size = max_size;
        while size >= MIN_FONT_SIZE {
            let lines = self.wrap(text, box_width, size);
            let block_width = lines
                .iter()
                .map(|l| self.line_width(l, size))
                .fold(0.0, f64::max);
            let block_height = lines.len() as f64 * size as f64 * 1.3;
            if fits_in_box(block_width, block_height, box_width, box_height) {
                return (size, lines);
            }
            size -= 1;
        }

        (
            MIN_FONT_SIZE,
            self.force_wrap(text, box_width, MIN_FONT_SIZE),
        )
    }

    /// Character-level wrap at 90% of the box width.
    fn force_wrap(&self, text: &str, box_width: f64, size: i64) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current = String::new();

        for ch in text.chars() {
            let mut candidate = current.clone();
            candidate.push(ch);
            if self.line_width(&candidate, size) > box_width * 0.9 {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                current.push(ch);
            } else {
                current = candidate;
            }
        }

        if !current.is_empty() {
            lines.push(current);
        }
        lines
    }

    fn draw_block(&self, image: &mut RgbImage, text: &str, x1: i64, y1: i64, x2: i64, y2: i64) {
        let box_width = (x2 - x1) as f64;
        let box_height = (y2 - y1) as f64;
        if box_width < 10.0 || box_height < 10.0 {
            return;
        }

        let (size, lines) = self.fit_text(text, box_width, box_height);
        let scale = PxScale::from(size as f32);
        let line_height = size as f64 * 1.4;
        let total_height = lines.len() as f64 * line_height;
        let start_y = y1 as f64 + (box_height - total_height) / 2.0;

        for (i, line) in lines.iter().enumerate() {
            let line_width = self.line_width(line, size);
            let x = x1 as f64 + (box_width - line_width) / 2.0;
            let y = start_y + i as f64 * line_height;
            draw_text_mut(
                image,
                Rgb([0u8, 0, 0]),
                x as i32,
                y as i32,
                scale,
                &self.font,
                line,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geometry::BBox;

    #[test]
    fn chars_per_line_never_drops_below_one() {
        assert_eq!(calc_chars_per_line(100.0, 10.0), 8);
        assert_eq!(calc_chars_per_line(5.0, 10.0), 1);
        assert_eq!(calc_chars_per_line(0.0, 10.0), 1);
    }

    #[test]
    fn fits_requires_both_dimensions_under_95_percent() {
        assert!(fits_in_box(90.0, 90.0, 100.0, 100.0));
        assert!(!fits_in_box(96.0, 50.0, 100.0, 100.0));
        assert!(!fits_in_box(50.0, 96.0, 100.0, 100.0));
        assert!(fits_in_box(95.0, 95.0, 100.0, 100.0));
    }

    #[test]
    fn wrap_splits_on_words() {
        assert_eq!(
            wrap_by_count("hello brave new world", 11),
            vec!["hello brave", "new world"]
        );
        assert_eq!(wrap_by_count("one", 10), vec!["one"]);
    }

    #[test]
    fn wrap_hard_splits_oversized_words() {
        assert_eq!(
            wrap_by_count("abcdefghij", 4),
            vec!["abcd", "efgh", "ij"]
        );
        assert_eq!(
            wrap_by_count("hi abcdefgh yo", 4),
            vec!["hi", "abcd", "efgh", "yo"]
        );
    }

    #[test]
    fn empty_text_wraps_to_a_single_empty_line() {
        assert_eq!(wrap_by_count("", 10), vec![String::new()]);
    }

    fn system_renderer() -> Option<TextRenderer> {
        match TextRenderer::new(None) {
            Ok(renderer) => Some(renderer),
            Err(_) => {
                eprintln!("no system font available; skipping renderer test");
                None
            }
        }
    }

    #[test]
    fn rendering_puts_ink_inside_the_render_bbox() {
        let Some(renderer) = system_renderer() else {
            return;
        };

        let image = RgbImage::from_pixel(200, 200, Rgb([255, 255, 255]));
        let mut region = models::TextRegion::new(0, BBox::new(40.0, 40.0, 160.0, 160.0));
        region.render_bbox = Some(BBox::new(40.0, 40.0, 160.0, 160.0));
        let translations = vec![TranslationResult {
            index: 0,
            translated: "Hello".into(),
        }];

        let out = renderer.render(image, &[region], &translations);
        assert!(out.pixels().any(|p| p[0] < 128));
    }

    #[test]
    fn regions_without_translation_or_render_bbox_are_left_alone() {
        let Some(renderer) = system_renderer() else {
            return;
        };

        let image = RgbImage::from_pixel(100, 100, Rgb([255, 255, 255]));
        // Region 0 has no render bbox; region 1 has no translation text.
        let region_a = models::TextRegion::new(0, BBox::new(10.0, 10.0, 90.0, 90.0));
        let mut region_b = models::TextRegion::new(1, BBox::new(10.0, 10.0, 90.0, 90.0));
        region_b.render_bbox = Some(region_b.text_bbox);
        let translations = vec![
            TranslationResult {
                index: 0,
                translated: "ignored".into(),
            },
            TranslationResult {
                index: 1,
                translated: String::new(),
            },
        ];

        let out = renderer.render(image, &[region_a, region_b], &translations);
        assert!(out.pixels().all(|p| *p == Rgb([255, 255, 255])));
    }

    #[test]
    fn tiny_boxes_are_skipped() {
        let Some(renderer) = system_renderer() else {
            return;
        };

        let image = RgbImage::from_pixel(50, 50, Rgb([255, 255, 255]));
        let mut region = models::TextRegion::new(0, BBox::new(10.0, 10.0, 18.0, 40.0));
        region.render_bbox = Some(BBox::new(10.0, 10.0, 18.0, 40.0)); // 8px wide
        let translations = vec![TranslationResult {
            index: 0,
            translated: "text".into(),
        }];

        let out = renderer.render(image, &[region], &translations);
        assert!(out.pixels().all(|p| *p == Rgb([255, 255, 255])));
    }
}
