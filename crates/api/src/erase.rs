//! Brush-mask erase on an already-translated result (or a caller-supplied
//! image). Reuses the background restorer through the routed inpainter.

use axum::http::StatusCode;
use image::RgbImage;
use models::TranslateStatus;

use crate::context::AppContext;
use crate::error::ApiError;

#[derive(Debug, thiserror::Error)]
#[error("[{code}] {message}")]
pub struct EraseError {
    pub code: &'static str,
    pub message: String,
}

impl EraseError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.code {
            "INVALID_TRANSLATE_ID" | "TRANSLATE_NOT_COMPLETED" => StatusCode::BAD_REQUEST,
            "TRANSLATE_NOT_FOUND" | "RESULT_IMAGE_NOT_FOUND" => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<EraseError> for ApiError {
    fn from(err: EraseError) -> Self {
        ApiError::new(err.status(), err.code, err.message)
    }
}

pub struct EraseInput {
    pub translate_id: String,
    pub mask_image: String,
    pub source_image: Option<String>,
}

fn decode_rgb(payload: &str, what: &str) -> Result<RgbImage, EraseError> {
    pipeline::raster::decode_base64_image(payload)
        .map(|img| img.to_rgb8())
        .map_err(|err| {
            EraseError::new("INPAINTING_FAILED", format!("{what} 디코딩 실패: {err}"))
        })
}

/// Resolves the working image for an erase request. A caller-supplied
/// source image skips every record and file check: possession of the image
/// is the proof the translation completed.
async fn working_image(ctx: &AppContext, input: &EraseInput) -> Result<RgbImage, EraseError> {
    if let Some(source) = &input.source_image {
        return decode_rgb(source, "원본 이미지");
    }

    let record = ctx
        .jobs
        .get_translate(&input.translate_id)
        .await
        .map_err(|err| {
            tracing::error!(?err, "translate record read failed");
            EraseError::new("INPAINTING_FAILED", "번역 메타데이터 파싱 실패")
        })?
        .ok_or_else(|| {
            EraseError::new(
                "TRANSLATE_NOT_FOUND",
                format!("번역을 찾을 수 없습니다: {}", input.translate_id),
            )
        })?;

    if record.status != TranslateStatus::Completed {
        return Err(EraseError::new(
            "TRANSLATE_NOT_COMPLETED",
            format!("번역이 완료되지 않았습니다 (현재: {})", record.status),
        ));
    }

    let relative = format!("result/{}_result.png", input.translate_id);
    if !ctx.blobs.exists(&relative).await {
        return Err(EraseError::new(
            "RESULT_IMAGE_NOT_FOUND",
            "번역 결과 이미지 파일이 없습니다",
        ));
    }

    let absolute = ctx.blobs.absolute_path(&relative);
    image::open(&absolute)
        .map(|img| img.to_rgb8())
        .map_err(|err| {
            EraseError::new("INPAINTING_FAILED", format!("이미지 로드 실패: {err}"))
        })
}

/// Runs the erase: id format check first (path-traversal defense, before
/// any store access), then mask normalization and the inpainting call.
/// Returns the result as base64 PNG.
pub async fn erase_region(ctx: &AppContext, input: EraseInput) -> Result<String, EraseError> {
    if !models::is_valid_translate_id(&input.translate_id) {
        return Err(EraseError::new(
            "INVALID_TRANSLATE_ID",
            format!("올바르지 않은 번역 ID 형식: {}", input.translate_id),
        ));
    }

    let image = working_image(ctx, &input).await?;

    let mask = pipeline::raster::decode_base64_image(&input.mask_image)
        .map_err(|err| {
            EraseError::new("INPAINTING_FAILED", format!("마스크 이미지 디코딩 실패: {err}"))
        })?;
    let mut mask = pipeline::raster::normalize_mask(&mask).map_err(|err| {
        EraseError::new("INPAINTING_FAILED", format!("지원하지 않는 마스크 형식: {err}"))
    })?;

    if mask.dimensions() != image.dimensions() {
        mask = pipeline::raster::resize_mask_nearest(&mask, image.width(), image.height());
    }

    let result = ctx
        .inpainter
        .inpaint_mask(&image, &mask)
        .await
        .map_err(|err| {
            tracing::error!(%err, "mask inpainting failed");
            EraseError::new("INPAINTING_FAILED", format!("Inpainting 실패: {err}"))
        })?;

    let encoded = pipeline::raster::rgb_to_base64_png(&result).map_err(|err| {
        EraseError::new("INPAINTING_FAILED", format!("결과 이미지 인코딩 실패: {err}"))
    })?;

    tracing::info!(translate_id = %input.translate_id, "erase complete");
    Ok(encoded)
}
