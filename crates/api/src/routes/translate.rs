//! Single-translate orchestration: validate, reserve quota, persist,
//! enqueue, and compensate on the way out when a later step fails.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::Json;
use models::{TranslateRecord, TranslateStatus};
use serde::{Deserialize, Serialize};
use store::StatusUpdate;
use worker::TaskEnvelope;

use crate::context::AppContext;
use crate::error::ApiError;

/// Stored on the record and surfaced when enqueueing fails.
pub const QUEUE_FAILED_SINGLE: &str = "작업 큐잉에 실패했습니다. 잠시 후 다시 시도해주세요.";

fn default_source_language() -> String {
    "ko".to_string()
}

fn default_target_language() -> String {
    "en".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    pub upload_id: String,
    #[serde(default = "default_source_language")]
    pub source_language: String,
    #[serde(default = "default_target_language")]
    pub target_language: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateResponse {
    pub translate_id: String,
    pub status: TranslateStatus,
    pub upload_id: String,
    pub source_language: String,
    pub target_language: String,
    pub original_url: Option<String>,
    pub result_url: Option<String>,
    pub created_at: String,
    pub completed_at: Option<String>,
    pub error_message: Option<String>,
}

impl From<TranslateRecord> for TranslateResponse {
    fn from(record: TranslateRecord) -> Self {
        Self {
            translate_id: record.translate_id,
            status: record.status,
            upload_id: record.upload_id,
            source_language: record.source_language,
            target_language: record.target_language,
            original_url: record.original_url,
            result_url: record.result_url,
            created_at: record.created_at,
            completed_at: record.completed_at,
            error_message: record.error_message,
        }
    }
}

/// Resolves an upload id to its public image URL, or the 400 the client
/// sees for a stale or mistyped id.
pub async fn resolve_upload_url(ctx: &AppContext, upload_id: &str) -> Result<String, ApiError> {
    match ctx.jobs.get_upload(upload_id).await? {
        Some(record) => Ok(ctx.static_url(&record.path)),
        None => Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "INVALID_UPLOAD_ID",
            format!("유효하지 않은 업로드 ID: {upload_id}"),
        )),
    }
}

/// Best-effort compensation; a failed refund is logged, never surfaced
/// over the request's own error.
pub async fn refund_quietly(ctx: &AppContext, hashed_ip: &str, count: i64) {
    if let Err(err) = ctx.quota.refund(hashed_ip, count).await {
        tracing::error!(?err, count, "quota refund failed");
    }
}

pub fn new_pending_record(request: &TranslateRequest, original_url: String) -> TranslateRecord {
    TranslateRecord {
        translate_id: models::new_translate_id(),
        status: TranslateStatus::Pending,
        upload_id: request.upload_id.clone(),
        source_language: request.source_language.clone(),
        target_language: request.target_language.clone(),
        created_at: models::utc_now_z(),
        completed_at: None,
        original_url: Some(original_url),
        result_url: None,
        error_message: None,
    }
}

pub async fn create_translate(
    State(ctx): State<Arc<AppContext>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(request): Json<TranslateRequest>,
) -> Result<(StatusCode, Json<TranslateResponse>), ApiError> {
    let hashed_ip = ctx.hashed_ip(&addr.ip().to_string());

    let original_url = resolve_upload_url(&ctx, &request.upload_id).await?;

    ctx.quota.check_and_consume(&hashed_ip, 1).await?;

    let record = new_pending_record(&request, original_url);
    if let Err(err) = ctx.jobs.put_translate(&record).await {
        refund_quietly(&ctx, &hashed_ip, 1).await;
        return Err(err.into());
    }

    if let Err(err) = ctx
        .queue
        .enqueue(&TaskEnvelope::translate(&record.translate_id))
        .await
    {
        tracing::error!(?err, translate_id = %record.translate_id, "task enqueue failed");
        refund_quietly(&ctx, &hashed_ip, 1).await;
        if let Err(err) = ctx
            .jobs
            .advance_translate(
                &record.translate_id,
                TranslateStatus::Failed,
                StatusUpdate {
                    result_url: None,
                    error_message: Some(QUEUE_FAILED_SINGLE.to_string()),
                },
            )
            .await
        {
            tracing::error!(?err, translate_id = %record.translate_id, "failed to mark record failed");
        }
        return Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "QUEUE_UNAVAILABLE",
            QUEUE_FAILED_SINGLE,
        ));
    }

    tracing::info!(translate_id = %record.translate_id, "translate job accepted");
    Ok((StatusCode::CREATED, Json(record.into())))
}

pub async fn get_translate(
    State(ctx): State<Arc<AppContext>>,
    axum::extract::Path(translate_id): axum::extract::Path<String>,
) -> Result<Json<TranslateResponse>, ApiError> {
    let Some(record) = ctx.jobs.get_translate(&translate_id).await? else {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "TRANSLATE_NOT_FOUND",
            format!("번역 작업을 찾을 수 없습니다: {translate_id}"),
        ));
    };
    Ok(Json(record.into()))
}
