//! Translation backend: crops text regions out of the original page and
//! asks a multimodal model for translations in one call.

use std::path::{Path, PathBuf};
use std::time::Duration;

use geometry::{clip_to_bounds, BBox};
use models::TranslationResult;

use crate::raster::rgb_png_bytes;

const TRANSLATE_PROMPT: &str = "\
Each image is a text region cropped from a webtoon page.
Translate the Korean text in each image into English.

Rules:
- Assign indexes in the order the images are given, starting at 0
- Translate onomatopoeia into natural English sound effects
- If an image holds no legible text, use an empty string for it

Respond with a JSON array only:
[{\"index\": 0, \"translated\": \"Hello\"}, {\"index\": 1, \"translated\": \"BOOM\"}]";

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("translation API key is not configured")]
    MissingApiKey,
    #[error("failed to open image {path:?}")]
    ReadImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to encode region crop")]
    EncodeCrop(#[source] image::ImageError),
    #[error("translation request failed")]
    Request(#[from] reqwest::Error),
    #[error("translation service returned HTTP {0}")]
    Status(u16),
    #[error("translation service returned an empty response")]
    EmptyResponse,
    #[error("translation payload is not a JSON array: {0}")]
    BadPayload(String),
}

/// Translates the text inside each bbox of the image at `image_path`.
/// Results are keyed by the position of the bbox in the input slice.
#[async_trait::async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        image_path: &Path,
        bboxes: &[BBox],
    ) -> Result<Vec<TranslationResult>, TranslateError>;
}

/// Gemini-backed translator speaking the `generateContent` REST surface.
pub struct GeminiTranslator {
    http: reqwest::Client,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl GeminiTranslator {
    const API_ROOT: &'static str = "https://generativelanguage.googleapis.com/v1beta";

    pub fn new(http: reqwest::Client, api_key: &str, model: &str, timeout: Duration) -> Self {
        Self {
            http,
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout,
        }
    }

    /// Crops every valid bbox to PNG bytes, remembering which input index
    /// each submitted part came from.
    fn crop_parts(
        image_path: &Path,
        bboxes: &[BBox],
    ) -> Result<(Vec<Vec<u8>>, Vec<usize>), TranslateError> {
        let image = image::open(image_path)
            .map_err(|source| TranslateError::ReadImage {
                path: image_path.to_path_buf(),
                source,
            })?
            .to_rgb8();
        let (width, height) = image.dimensions();

        let mut parts = Vec::new();
        let mut original_indices = Vec::new();

        for (idx, bbox) in bboxes.iter().enumerate() {
            let clipped = clip_to_bounds(bbox, width, height);
            if !clipped.is_valid() {
                continue;
            }
            let (x1, y1, x2, y2) = clipped.to_tuple();
            let crop = image::imageops::crop_imm(
                &image,
                x1 as u32,
                y1 as u32,
                (x2 - x1) as u32,
                (y2 - y1) as u32,
            )
            .to_image();
            parts.push(rgb_png_bytes(&crop).map_err(TranslateError::EncodeCrop)?);
            original_indices.push(idx);
        }

        Ok((parts, original_indices))
    }

    async fn call(&self, parts: Vec<Vec<u8>>) -> Result<Vec<serde_json::Value>, TranslateError> {
        let mut content_parts = vec![serde_json::json!({ "text": TRANSLATE_PROMPT })];
        for png in parts {
            content_parts.push(serde_json::json!({
                "inline_data": { "mime_type": "image/png", "data": base64::encode(png) }
            }));
        }

        let body = serde_json::json!({
            "contents": [{ "parts": content_parts }],
            "generationConfig": { "response_mime_type": "application/json" }
        });

        let response = self
            .http
            .post(format!(
                "{}/models/{}:generateContent",
                Self::API_ROOT,
                self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranslateError::Status(status.as_u16()));
        }

        let envelope: serde_json::Value = response.json().await?;
        let text = envelope["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .filter(|t| !t.is_empty())
            .ok_or(TranslateError::EmptyResponse)?;

        let payload: serde_json::Value = serde_json::from_str(text)
            .map_err(|err| TranslateError::BadPayload(err.to_string()))?;
        match payload {
            serde_json::Value::Array(items) => Ok(items),
            other => Err(TranslateError::BadPayload(format!(
                "expected array, got {other}"
            ))),
        }
    }
}

/// Re-keys raw `{index, translated}` items from submitted-part order back
/// to original bbox indices. Malformed or out-of-range items are dropped
/// with a warning; the survivors come back sorted by original index.
pub fn map_results(
    items: &[serde_json::Value],
    original_indices: &[usize],
) -> Vec<TranslationResult> {
    let mut results = Vec::new();

    for item in items {
        let parsed = item["index"].as_u64().and_then(|parts_idx| {
            let translated = item["translated"].as_str()?;
            let original = original_indices.get(parts_idx as usize)?;
            Some(TranslationResult {
                index: *original,
                translated: translated.to_string(),
            })
        });
        match parsed {
            Some(result) => results.push(result),
            None => tracing::warn!(?item, "dropping malformed translation item"),
        }
    }

    results.sort_by_key(|r| r.index);
    results
}

#[async_trait::async_trait]
impl Translator for GeminiTranslator {
    async fn translate(
        &self,
        image_path: &Path,
        bboxes: &[BBox],
    ) -> Result<Vec<TranslationResult>, TranslateError> {
        if bboxes.is_empty() {
            return Ok(Vec::new());
        }
        if self.api_key.is_empty() {
            return Err(TranslateError::MissingApiKey);
        }

        let (parts, original_indices) = Self::crop_parts(image_path, bboxes)?;
        if parts.is_empty() {
            return Ok(Vec::new());
        }

        let items = self.call(parts).await?;
        Ok(map_results(&items, &original_indices))
    }
}
