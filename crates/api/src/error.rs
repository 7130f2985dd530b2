//! `ApiError` is the one error type handlers return: an HTTP status plus a
//! machine-readable code, rendered as `{"detail": {"code", "message"}}` the
//! way the web client expects.

use axum::http::StatusCode;
use axum::response::IntoResponse;

#[derive(Debug, thiserror::Error)]
#[error("status: {status}, code: {code}, error: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl From<store::StoreError> for ApiError {
    fn from(error: store::StoreError) -> Self {
        tracing::error!(?error, "API responding with store error");
        ApiError::internal("내부 오류가 발생했습니다")
    }
}

impl From<store::QuotaError> for ApiError {
    fn from(error: store::QuotaError) -> Self {
        match error {
            store::QuotaError::Exceeded => ApiError::new(
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMIT_EXCEEDED",
                "주간 사용량 한도를 초과했습니다",
            ),
            other => {
                tracing::error!(error = ?other, "API responding with quota error");
                ApiError::internal("내부 오류가 발생했습니다")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({
            "detail": { "code": self.code, "message": self.message }
        });
        (self.status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_exhaustion_maps_to_429() {
        let err: ApiError = store::QuotaError::Exceeded.into();
        assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.code, "RATE_LIMIT_EXCEEDED");
    }
}
