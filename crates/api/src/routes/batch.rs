//! Batch translation: fan-out to N single jobs plus the derived-status
//! aggregation on reads.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::Json;
use models::{BatchEntry, BatchRecord, BatchStatus, TranslateStatus};
use serde::{Deserialize, Serialize};
use store::StatusUpdate;
use worker::TaskEnvelope;

use crate::context::AppContext;
use crate::error::ApiError;
use crate::routes::translate::{
    new_pending_record, refund_quietly, resolve_upload_url, TranslateRequest,
};

fn default_source_language() -> String {
    "ko".to_string()
}

fn default_target_language() -> String {
    "en".to_string()
}

/// Stored on a child whose enqueue failed.
pub const QUEUE_FAILED_CHILD: &str = "작업 큐잉에 실패했습니다";
/// Synthesized when a child record vanished under its batch.
const CHILD_MISSING: &str = "번역 메타데이터를 찾을 수 없습니다";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub upload_ids: Vec<String>,
    #[serde(default = "default_source_language")]
    pub source_language: String,
    #[serde(default = "default_target_language")]
    pub target_language: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchImageStatus {
    pub order_index: u32,
    pub upload_id: String,
    pub translate_id: String,
    pub status: TranslateStatus,
    pub original_url: Option<String>,
    pub result_url: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub batch_id: String,
    pub status: BatchStatus,
    pub images: Vec<BatchImageStatus>,
    pub source_language: String,
    pub target_language: String,
    pub created_at: String,
}

/// Derived batch status; never persisted.
pub fn compute_batch_status(images: &[BatchImageStatus]) -> BatchStatus {
    let any_live = images.iter().any(|img| {
        matches!(
            img.status,
            TranslateStatus::Pending | TranslateStatus::Processing
        )
    });
    if any_live {
        return BatchStatus::Processing;
    }
    if images
        .iter()
        .all(|img| img.status == TranslateStatus::Completed)
    {
        return BatchStatus::Completed;
    }
    if images
        .iter()
        .all(|img| img.status == TranslateStatus::Failed)
    {
        return BatchStatus::Failed;
    }
    BatchStatus::PartialFailure
}

pub async fn create_batch(
    State(ctx): State<Arc<AppContext>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(request): Json<BatchRequest>,
) -> Result<(StatusCode, Json<BatchResponse>), ApiError> {
    let hashed_ip = ctx.hashed_ip(&addr.ip().to_string());
    let image_count = request.upload_ids.len();

    if image_count == 0 {
        return Err(ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "INVALID_BATCH_SIZE",
            "최소 1개의 upload_id가 필요합니다",
        ));
    }
    if image_count > ctx.max_batch_size {
        return Err(ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "INVALID_BATCH_SIZE",
            format!("최대 {}개까지 가능합니다", ctx.max_batch_size),
        ));
    }

    let mut original_urls = Vec::with_capacity(image_count);
    for upload_id in &request.upload_ids {
        original_urls.push(resolve_upload_url(&ctx, upload_id).await?);
    }

    ctx.quota
        .check_and_consume(&hashed_ip, image_count as i64)
        .await?;

    // Persist the N pending children and the batch wrapper. Any write
    // failure undoes the whole reservation.
    let mut images = Vec::with_capacity(image_count);
    let mut entries = Vec::with_capacity(image_count);
    for (order_index, (upload_id, original_url)) in request
        .upload_ids
        .iter()
        .zip(original_urls.into_iter())
        .enumerate()
    {
        let child_request = TranslateRequest {
            upload_id: upload_id.clone(),
            source_language: request.source_language.clone(),
            target_language: request.target_language.clone(),
        };
        let record = new_pending_record(&child_request, original_url.clone());
        if let Err(err) = ctx.jobs.put_translate(&record).await {
            refund_quietly(&ctx, &hashed_ip, image_count as i64).await;
            return Err(err.into());
        }

        entries.push(BatchEntry {
            order_index: order_index as u32,
            upload_id: upload_id.clone(),
            translate_id: record.translate_id.clone(),
        });
        images.push(BatchImageStatus {
            order_index: order_index as u32,
            upload_id: upload_id.clone(),
            translate_id: record.translate_id,
            status: TranslateStatus::Pending,
            original_url: Some(original_url),
            result_url: None,
            error_message: None,
        });
    }

    let batch = BatchRecord {
        batch_id: models::new_batch_id(),
        source_language: request.source_language.clone(),
        target_language: request.target_language.clone(),
        images: entries,
        created_at: models::utc_now_z(),
    };
    if let Err(err) = ctx.jobs.put_batch(&batch).await {
        refund_quietly(&ctx, &hashed_ip, image_count as i64).await;
        return Err(err.into());
    }

    // Enqueue each child; failed enqueues fail that child only, and the
    // failed share of the reservation is returned.
    let mut failed_count: i64 = 0;
    for image in &mut images {
        if let Err(err) = ctx
            .queue
            .enqueue(&TaskEnvelope::translate(&image.translate_id))
            .await
        {
            tracing::error!(?err, translate_id = %image.translate_id, "batch enqueue failed");
            failed_count += 1;
            image.status = TranslateStatus::Failed;
            image.error_message = Some(QUEUE_FAILED_CHILD.to_string());
            if let Err(err) = ctx
                .jobs
                .advance_translate(
                    &image.translate_id,
                    TranslateStatus::Failed,
                    StatusUpdate {
                        result_url: None,
                        error_message: Some(QUEUE_FAILED_CHILD.to_string()),
                    },
                )
                .await
            {
                tracing::error!(?err, translate_id = %image.translate_id, "failed to mark child failed");
            }
        }
    }

    if failed_count == image_count as i64 {
        refund_quietly(&ctx, &hashed_ip, image_count as i64).await;
        return Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "QUEUE_UNAVAILABLE",
            "작업 큐가 일시적으로 사용할 수 없습니다",
        ));
    }
    if failed_count > 0 {
        refund_quietly(&ctx, &hashed_ip, failed_count).await;
    }

    tracing::info!(batch_id = %batch.batch_id, images = image_count, failed = failed_count, "batch accepted");
    Ok((
        StatusCode::CREATED,
        Json(BatchResponse {
            batch_id: batch.batch_id,
            status: BatchStatus::Processing,
            images,
            source_language: batch.source_language,
            target_language: batch.target_language,
            created_at: batch.created_at,
        }),
    ))
}

pub async fn get_batch(
    State(ctx): State<Arc<AppContext>>,
    axum::extract::Path(batch_id): axum::extract::Path<String>,
) -> Result<Json<BatchResponse>, ApiError> {
    let Some(batch) = ctx.jobs.get_batch(&batch_id).await? else {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "BATCH_NOT_FOUND",
            format!("배치 작업을 찾을 수 없습니다: {batch_id}"),
        ));
    };

    let mut images = Vec::with_capacity(batch.images.len());
    for entry in &batch.images {
        match ctx.jobs.get_translate(&entry.translate_id).await? {
            Some(record) => images.push(BatchImageStatus {
                order_index: entry.order_index,
                upload_id: entry.upload_id.clone(),
                translate_id: entry.translate_id.clone(),
                status: record.status,
                original_url: record.original_url,
                result_url: record.result_url,
                error_message: record.error_message,
            }),
            None => images.push(BatchImageStatus {
                order_index: entry.order_index,
                upload_id: entry.upload_id.clone(),
                translate_id: entry.translate_id.clone(),
                status: TranslateStatus::Failed,
                original_url: None,
                result_url: None,
                error_message: Some(CHILD_MISSING.to_string()),
            }),
        }
    }

    Ok(Json(BatchResponse {
        batch_id: batch.batch_id,
        status: compute_batch_status(&images),
        images,
        source_language: batch.source_language,
        target_language: batch.target_language,
        created_at: batch.created_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(status: TranslateStatus) -> BatchImageStatus {
        BatchImageStatus {
            order_index: 0,
            upload_id: "upload_00000000".into(),
            translate_id: "tr_00000000".into(),
            status,
            original_url: None,
            result_url: None,
            error_message: None,
        }
    }

    #[test]
    fn any_live_child_keeps_the_batch_processing() {
        let images = vec![
            image(TranslateStatus::Completed),
            image(TranslateStatus::Pending),
            image(TranslateStatus::Failed),
        ];
        assert_eq!(compute_batch_status(&images), BatchStatus::Processing);

        let images = vec![image(TranslateStatus::Processing)];
        assert_eq!(compute_batch_status(&images), BatchStatus::Processing);
    }

    #[test]
    fn uniform_terminal_children_collapse_to_their_state() {
        let images = vec![
            image(TranslateStatus::Completed),
            image(TranslateStatus::Completed),
        ];
        assert_eq!(compute_batch_status(&images), BatchStatus::Completed);

        let images = vec![image(TranslateStatus::Failed), image(TranslateStatus::Failed)];
        assert_eq!(compute_batch_status(&images), BatchStatus::Failed);
    }

    #[test]
    fn mixed_terminal_children_are_a_partial_failure() {
        let images = vec![
            image(TranslateStatus::Completed),
            image(TranslateStatus::Failed),
        ];
        assert_eq!(compute_batch_status(&images), BatchStatus::PartialFailure);
    }
}
