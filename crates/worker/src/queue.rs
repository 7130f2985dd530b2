use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};

/// List key the broker pushes translation tasks onto.
pub const TRANSLATE_QUEUE_KEY: &str = "queue:translate";

const RESULT_KEY_PREFIX: &str = "task:result:";

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue backend error")]
    Backend(#[from] redis::RedisError),
    #[error("task payload could not be encoded")]
    Codec(#[from] serde_json::Error),
    #[error("queue unavailable: {0}")]
    Unavailable(String),
}

/// One unit of work for a worker. JSON is the only serialization on the
/// wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub task: String,
    pub translate_id: String,
    pub enqueued_at: String,
}

impl TaskEnvelope {
    pub fn translate(translate_id: &str) -> Self {
        Self {
            task: "translate".to_string(),
            translate_id: translate_id.to_string(),
            enqueued_at: models::utc_now_z(),
        }
    }
}

/// Terminal summary mirrored to the result backend for each finished task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[async_trait::async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, task: &TaskEnvelope) -> Result<(), QueueError>;

    /// Blocks up to `timeout` for the next task. `None` on timeout; an
    /// undecodable payload is dropped with a warning rather than wedging
    /// the queue.
    async fn dequeue(&self, timeout: Duration) -> Result<Option<TaskEnvelope>, QueueError>;

    async fn store_result(
        &self,
        translate_id: &str,
        result: &TaskResult,
        ttl: Duration,
    ) -> Result<(), QueueError>;
}

/// Redis-list broker: LPUSH to submit, BRPOP to consume, result summaries
/// under `task:result:{translate_id}`.
#[derive(Clone)]
pub struct RedisQueue {
    manager: ConnectionManager,
    queue_key: String,
}

impl RedisQueue {
    pub async fn connect(url: &str, queue_key: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self {
            manager,
            queue_key: queue_key.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl TaskQueue for RedisQueue {
    async fn enqueue(&self, task: &TaskEnvelope) -> Result<(), QueueError> {
        let mut conn = self.manager.clone();
        let payload = serde_json::to_string(task)?;
        redis::cmd("LPUSH")
            .arg(&self.queue_key)
            .arg(payload)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<TaskEnvelope>, QueueError> {
        let mut conn = self.manager.clone();
        let reply: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(&self.queue_key)
            .arg(timeout.as_secs().max(1))
            .query_async(&mut conn)
            .await?;

        let Some((_, payload)) = reply else {
            return Ok(None);
        };
        match serde_json::from_str(&payload) {
            Ok(task) => Ok(Some(task)),
            Err(err) => {
                tracing::warn!(%err, payload, "dropping undecodable task payload");
                Ok(None)
            }
        }
    }

    async fn store_result(
        &self,
        translate_id: &str,
        result: &TaskResult,
        ttl: Duration,
    ) -> Result<(), QueueError> {
        let mut conn = self.manager.clone();
        let payload = serde_json::to_string(result)?;
        redis::cmd("SET")
            .arg(format!("{RESULT_KEY_PREFIX}{translate_id}"))
            .arg(payload)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }
}

/// In-process queue for tests and single-process deployments. Enqueue
/// failures can be scripted per call to exercise the compensation paths.
#[derive(Default)]
pub struct MemoryQueue {
    tasks: Mutex<VecDeque<TaskEnvelope>>,
    results: Mutex<HashMap<String, TaskResult>>,
    fail_plan: Mutex<VecDeque<bool>>,
    notify: tokio::sync::Notify,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the outcome of upcoming `enqueue` calls: `true` fails that
    /// call. Calls beyond the plan succeed.
    pub fn plan_enqueue_failures(&self, plan: impl IntoIterator<Item = bool>) {
        self.fail_plan.lock().unwrap().extend(plan);
    }

    pub fn result_of(&self, translate_id: &str) -> Option<TaskResult> {
        self.results.lock().unwrap().get(translate_id).cloned()
    }

    pub fn pending(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl TaskQueue for MemoryQueue {
    async fn enqueue(&self, task: &TaskEnvelope) -> Result<(), QueueError> {
        if self.fail_plan.lock().unwrap().pop_front() == Some(true) {
            return Err(QueueError::Unavailable("scripted enqueue failure".into()));
        }
        self.tasks.lock().unwrap().push_back(task.clone());
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<TaskEnvelope>, QueueError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(task) = self.tasks.lock().unwrap().pop_front() {
                return Ok(Some(task));
            }
            let notified = self.notify.notified();
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn store_result(
        &self,
        translate_id: &str,
        result: &TaskResult,
        _ttl: Duration,
    ) -> Result<(), QueueError> {
        self.results
            .lock()
            .unwrap()
            .insert(translate_id.to_string(), result.clone());
        Ok(())
    }
}
