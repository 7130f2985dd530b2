use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use blobs::BlobStore;
use image::RgbImage;
use pipeline::{Pipeline, PipelineError};
use store::{Advance, JobStore, StatusUpdate, StoreError};

use crate::queue::{TaskQueue, TaskResult};

/// How long a runner blocks on the queue before re-checking shutdown.
const DEQUEUE_TIMEOUT: Duration = Duration::from_secs(5);

/// Message stored when the soft time limit interrupts a job.
const TIMEOUT_MESSAGE: &str = "처리 시간 초과";
/// Message stored when the source image cannot be resolved.
const IMAGE_MISSING_MESSAGE: &str = "이미지를 찾을 수 없음";

/// Seam between the worker and the pipeline, so the runtime's lifecycle
/// handling is testable without real backends.
#[async_trait::async_trait]
pub trait PageTranslator: Send + Sync {
    async fn translate_image(&self, path: &Path) -> Result<RgbImage, PipelineError>;
}

#[async_trait::async_trait]
impl PageTranslator for Pipeline {
    async fn translate_image(&self, path: &Path) -> Result<RgbImage, PipelineError> {
        Pipeline::translate_image(self, path).await
    }
}

/// Consumes translation tasks and drives each through the pipeline.
///
/// Each runner handles one task at a time: a task holds a decoded page in
/// memory and every upstream it calls is rate limited, so prefetching more
/// would only hurt.
pub struct Worker {
    jobs: JobStore,
    blobs: Arc<dyn BlobStore>,
    queue: Arc<dyn TaskQueue>,
    translator: Arc<dyn PageTranslator>,
    base_url: String,
    soft_limit: Duration,
    hard_limit: Duration,
    result_ttl: Duration,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        jobs: JobStore,
        blobs: Arc<dyn BlobStore>,
        queue: Arc<dyn TaskQueue>,
        translator: Arc<dyn PageTranslator>,
        base_url: &str,
        soft_limit: Duration,
        hard_limit: Duration,
        result_ttl: Duration,
    ) -> Self {
        Self {
            jobs,
            blobs,
            queue,
            translator,
            base_url: base_url.trim_end_matches('/').to_string(),
            soft_limit,
            hard_limit,
            result_ttl,
        }
    }

    /// Runs `concurrency` sequential task loops until `shutdown` resolves,
    /// then drains the in-flight tasks.
    pub async fn serve(
        self: Arc<Self>,
        concurrency: usize,
        shutdown: impl std::future::Future<Output = ()>,
    ) {
        let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);

        let mut runners = Vec::new();
        for runner_id in 0..concurrency.max(1) {
            let worker = self.clone();
            let mut stop = stop_rx.clone();
            runners.push(tokio::spawn(async move {
                loop {
                    if *stop.borrow() {
                        break;
                    }
                    tokio::select! {
                        _ = stop.changed() => break,
                        dequeued = worker.queue.dequeue(DEQUEUE_TIMEOUT) => match dequeued {
                            Ok(Some(task)) => worker.process_task(&task.translate_id).await,
                            Ok(None) => continue,
                            Err(err) => {
                                tracing::error!(runner_id, ?err, "queue dequeue failed (will retry)");
                                tokio::time::sleep(Duration::from_secs(1)).await;
                            }
                        },
                    }
                }
            }));
        }

        shutdown.await;
        tracing::info!("worker signaled to stop, draining runners");
        let _ = stop_tx.send(true);
        for runner in runners {
            let _ = runner.await;
        }
    }

    /// Executes one translation task under the soft/hard time limits.
    /// Every failure is absorbed into the translate record; nothing
    /// escapes to the task loop.
    pub async fn process_task(&self, translate_id: &str) {
        tracing::info!(%translate_id, "translation task started");

        match self
            .jobs
            .advance_translate(
                translate_id,
                models::TranslateStatus::Processing,
                StatusUpdate::default(),
            )
            .await
        {
            Ok(Advance::Applied) => {}
            Ok(Advance::AlreadyTerminal(status)) => {
                tracing::warn!(%translate_id, %status, "task redelivered after terminal state, skipping");
                return;
            }
            Ok(Advance::NotFound) => {
                tracing::warn!(%translate_id, "translate record expired before processing");
                return;
            }
            Err(err) => {
                tracing::error!(%translate_id, ?err, "failed to mark task processing");
                return;
            }
        }

        let image_path = match self.resolve_image_path(translate_id).await {
            Ok(Some(path)) => path,
            Ok(None) => {
                self.fail(translate_id, IMAGE_MISSING_MESSAGE).await;
                return;
            }
            Err(err) => {
                tracing::error!(%translate_id, ?err, "image path lookup failed");
                self.fail(translate_id, IMAGE_MISSING_MESSAGE).await;
                return;
            }
        };

        let translator = self.translator.clone();
        let soft_limit = self.soft_limit;
        let task_path = image_path.clone();
        let mut job = tokio::spawn(async move {
            tokio::time::timeout(soft_limit, translator.translate_image(&task_path)).await
        });

        match tokio::time::timeout(self.hard_limit, &mut job).await {
            Err(_) => {
                // Past the hard limit the task is killed outright; the
                // record stays `processing` until its TTL reaps it.
                job.abort();
                tracing::error!(%translate_id, "hard time limit exceeded, task aborted");
            }
            Ok(Err(join_err)) => {
                tracing::error!(%translate_id, ?join_err, "translation task crashed");
                self.fail(translate_id, "worker task crashed").await;
            }
            Ok(Ok(Err(_elapsed))) => {
                tracing::error!(%translate_id, "soft time limit exceeded");
                self.fail(translate_id, TIMEOUT_MESSAGE).await;
            }
            Ok(Ok(Ok(Err(pipeline_err)))) => {
                tracing::error!(%translate_id, error = %pipeline_err, "pipeline failed");
                self.fail(translate_id, &pipeline_err.to_string()).await;
            }
            Ok(Ok(Ok(Ok(result_image)))) => {
                self.complete(translate_id, result_image).await;
            }
        }
    }

    /// `translate_id` -> upload record -> blob path chain.
    async fn resolve_image_path(&self, translate_id: &str) -> Result<Option<PathBuf>, StoreError> {
        let Some(record) = self.jobs.get_translate(translate_id).await? else {
            return Ok(None);
        };
        let Some(upload) = self.jobs.get_upload(&record.upload_id).await? else {
            return Ok(None);
        };
        if !self.blobs.exists(&upload.path).await {
            return Ok(None);
        }
        Ok(Some(self.blobs.absolute_path(&upload.path)))
    }

    async fn complete(&self, translate_id: &str, result_image: RgbImage) {
        let bytes = match pipeline::raster::rgb_png_bytes(&result_image) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::error!(%translate_id, ?err, "failed to encode result image");
                self.fail(translate_id, "결과 이미지 인코딩 실패").await;
                return;
            }
        };

        let stem = format!("{translate_id}_result");
        let relative = match self.blobs.save("result", &stem, ".png", &bytes).await {
            Ok(relative) => relative,
            Err(err) => {
                tracing::error!(%translate_id, ?err, "failed to write result image");
                self.fail(translate_id, "결과 이미지 저장 실패").await;
                return;
            }
        };

        let result_url = format!("{}/static/{relative}", self.base_url);
        match self
            .jobs
            .advance_translate(
                translate_id,
                models::TranslateStatus::Completed,
                StatusUpdate {
                    result_url: Some(result_url.clone()),
                    error_message: None,
                },
            )
            .await
        {
            Ok(Advance::Applied) => {}
            Ok(outcome) => {
                tracing::warn!(%translate_id, ?outcome, "completion not recorded");
                return;
            }
            Err(err) => {
                tracing::error!(%translate_id, ?err, "failed to record completion");
                return;
            }
        }

        let summary = TaskResult {
            status: "completed".to_string(),
            result_url: Some(result_url),
            error: None,
        };
        if let Err(err) = self
            .queue
            .store_result(translate_id, &summary, self.result_ttl)
            .await
        {
            tracing::warn!(%translate_id, ?err, "failed to store task result");
        }

        tracing::info!(%translate_id, %relative, "translation completed");
    }

    async fn fail(&self, translate_id: &str, message: &str) {
        match self
            .jobs
            .advance_translate(
                translate_id,
                models::TranslateStatus::Failed,
                StatusUpdate {
                    result_url: None,
                    error_message: Some(message.to_string()),
                },
            )
            .await
        {
            Ok(Advance::Applied) => {}
            Ok(outcome) => {
                tracing::warn!(%translate_id, ?outcome, "failure not recorded");
            }
            Err(err) => {
                tracing::error!(%translate_id, ?err, "failed to record failure");
            }
        }

        let summary = TaskResult {
            status: "failed".to_string(),
            result_url: None,
            error: Some(message.to_string()),
        };
        if let Err(err) = self
            .queue
            .store_result(translate_id, &summary, self.result_ttl)
            .await
        {
            tracing::warn!(%translate_id, ?err, "failed to store task result");
        }
    }
}
