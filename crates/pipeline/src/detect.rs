//! Text/bubble detection backend.

use std::path::{Path, PathBuf};
use std::time::Duration;

use models::DetectionOutput;

#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error("failed to read image {path:?}")]
    ReadImage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("detection request failed")]
    Request(#[from] reqwest::Error),
    #[error("detection service returned HTTP {0}")]
    Status(u16),
    #[error("detection response does not match the expected schema: {0}")]
    Schema(String),
    #[error("detection failed after {attempts} attempts")]
    Exhausted {
        attempts: u32,
        #[source]
        source: Box<DetectError>,
    },
}

impl DetectError {
    /// Transport-level failures are worth retrying; a response that arrived
    /// but doesn't match the schema is not.
    fn is_retryable(&self) -> bool {
        !matches!(self, Self::Schema(_) | Self::ReadImage { .. })
    }
}

/// Finds bubble and text boxes in a page image, in absolute pixels of the
/// original image.
#[async_trait::async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, image_path: &Path) -> Result<DetectionOutput, DetectError>;
}

/// Remote detection service. The hosted model may be cold on the first
/// call, hence the backoff-and-retry around each request.
pub struct HttpDetector {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    max_retries: u32,
}

impl HttpDetector {
    pub fn new(http: reqwest::Client, endpoint: &str, timeout: Duration, max_retries: u32) -> Self {
        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            timeout,
            max_retries,
        }
    }

    async fn call(&self, image_b64: &str) -> Result<DetectionOutput, DetectError> {
        let response = self
            .http
            .post(format!("{}/detect", self.endpoint))
            .timeout(self.timeout)
            .json(&serde_json::json!({ "image": image_b64 }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DetectError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let output: DetectionOutput =
            serde_json::from_slice(&body).map_err(|err| DetectError::Schema(err.to_string()))?;
        if !output.arrays_consistent() {
            return Err(DetectError::Schema(
                "confidence arrays disagree with bbox arrays".to_string(),
            ));
        }
        Ok(output)
    }
}

#[async_trait::async_trait]
impl Detector for HttpDetector {
    async fn detect(&self, image_path: &Path) -> Result<DetectionOutput, DetectError> {
        let bytes = tokio::fs::read(image_path)
            .await
            .map_err(|source| DetectError::ReadImage {
                path: image_path.to_path_buf(),
                source,
            })?;
        let image_b64 = base64::encode(bytes);

        retry_with_backoff(self.max_retries, || self.call(&image_b64)).await
    }
}

/// Runs `attempt_fn` up to `max_attempts` times, sleeping `2^n` seconds
/// after the n-th failure (1 s, 2 s, 4 s, ...). Non-retryable errors
/// surface immediately; exhaustion wraps the final cause.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_attempts: u32,
    mut attempt_fn: F,
) -> Result<T, DetectError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, DetectError>>,
{
    let attempts = max_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        match attempt_fn().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) => {
                attempt += 1;
                if attempt == attempts {
                    return Err(DetectError::Exhausted {
                        attempts,
                        source: Box::new(err),
                    });
                }
                let wait = Duration::from_secs(1 << (attempt - 1));
                tracing::warn!(attempt, ?wait, error = %err, "detection attempt failed, backing off");
                tokio::time::sleep(wait).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::ImageSize;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn output() -> DetectionOutput {
        DetectionOutput {
            image_size: ImageSize {
                width: 800,
                height: 1200,
            },
            bubbles: vec![vec![0.0, 0.0, 100.0, 100.0]],
            bubble_confs: vec![0.97],
            texts: vec![vec![10.0, 10.0, 90.0, 90.0]],
            text_confs: vec![0.92],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn third_attempt_succeeds_after_one_and_two_second_waits() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = retry_with_backoff(3, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(DetectError::Status(503))
                } else {
                    Ok(output())
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, output());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1 s after the first failure, 2 s after the second.
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_carries_the_last_cause() {
        let err = retry_with_backoff(3, || async { Err::<(), _>(DetectError::Status(500)) })
            .await
            .unwrap_err();
        match err {
            DetectError::Exhausted { attempts, source } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*source, DetectError::Status(500)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn schema_mismatch_fails_without_retry() {
        let calls = AtomicU32::new(0);
        let err = retry_with_backoff(3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(DetectError::Schema("missing field".into())) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, DetectError::Schema(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
