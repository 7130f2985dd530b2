//! Image ingest and upload metadata reads.

use std::path::Path;
use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use models::UploadRecord;
use serde::Serialize;

use crate::context::AppContext;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub upload_id: String,
    pub image_url: String,
    pub filename: String,
    pub content_type: String,
    pub size: u64,
    pub created_at: String,
}

fn response_for(ctx: &AppContext, record: &UploadRecord) -> UploadResponse {
    UploadResponse {
        upload_id: record.upload_id.clone(),
        image_url: ctx.static_url(&record.path),
        filename: record.filename.clone(),
        content_type: record.content_type.clone(),
        size: record.size,
        created_at: record.created_at.clone(),
    }
}

fn validation_error(err: blobs::BlobError) -> ApiError {
    ApiError::new(
        StatusCode::BAD_REQUEST,
        "INVALID_FILE",
        format!("업로드할 수 없는 파일입니다: {err}"),
    )
}

pub async fn create_upload(
    State(ctx): State<Arc<AppContext>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let mut file: Option<(String, String, Vec<u8>)> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(|err| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            "INVALID_FILE",
            format!("잘못된 multipart 요청입니다: {err}"),
        )
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("unknown").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        // Enforce the size cutoff while buffering the stream, not after.
        let mut bytes = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(|err| {
            ApiError::new(
                StatusCode::BAD_REQUEST,
                "INVALID_FILE",
                format!("업로드 스트림 오류: {err}"),
            )
        })? {
            if bytes.len() + chunk.len() > blobs::MAX_UPLOAD_BYTES {
                return Err(validation_error(blobs::BlobError::TooLarge));
            }
            bytes.extend_from_slice(&chunk);
        }

        file = Some((filename, content_type, bytes));
        break;
    }

    let Some((filename, content_type, bytes)) = file else {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "INVALID_FILE",
            "file 필드가 없습니다",
        ));
    };

    let validated = blobs::validate_upload(&bytes, &content_type).map_err(validation_error)?;

    let upload_id = models::new_upload_id();
    let ext = Path::new(&filename)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_else(|| validated.kind.extension().to_string());

    let path = ctx
        .blobs
        .save("original", &upload_id, &ext, &bytes)
        .await
        .map_err(|err| {
            tracing::error!(?err, "failed to persist upload blob");
            ApiError::internal("업로드 저장에 실패했습니다")
        })?;

    let record = UploadRecord {
        upload_id: upload_id.clone(),
        filename,
        content_type,
        size: bytes.len() as u64,
        path,
        created_at: models::utc_now_z(),
    };
    ctx.jobs.put_upload(&record).await?;

    tracing::info!(%upload_id, size = record.size, "upload ingested");
    Ok((StatusCode::CREATED, Json(response_for(&ctx, &record))))
}

pub async fn get_upload(
    State(ctx): State<Arc<AppContext>>,
    axum::extract::Path(upload_id): axum::extract::Path<String>,
) -> Result<Json<UploadResponse>, ApiError> {
    let Some(record) = ctx.jobs.get_upload(&upload_id).await? else {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "UPLOAD_NOT_FOUND",
            "존재하지 않는 업로드입니다",
        ));
    };
    Ok(Json(response_for(&ctx, &record)))
}
