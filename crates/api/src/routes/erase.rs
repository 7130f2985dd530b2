use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::context::AppContext;
use crate::erase::{erase_region, EraseInput};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EraseRequest {
    pub translate_id: String,
    /// base64 PNG; non-zero pixels mark the area to erase.
    pub mask_image: String,
    /// Optional base64 PNG to erase from instead of the stored result.
    #[serde(default)]
    pub source_image: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EraseResponse {
    pub result_image: String,
}

pub async fn erase(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<EraseRequest>,
) -> Result<Json<EraseResponse>, ApiError> {
    let result_image = erase_region(
        &ctx,
        EraseInput {
            translate_id: request.translate_id,
            mask_image: request.mask_image,
            source_image: request.source_image,
        },
    )
    .await?;

    Ok(Json(EraseResponse { result_image }))
}
