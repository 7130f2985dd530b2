//! Background execution of translation jobs: a broker-backed task queue
//! and the worker runtime that drains it one task at a time per runner.

mod queue;
mod runner;

pub use queue::{
    MemoryQueue, QueueError, RedisQueue, TaskEnvelope, TaskQueue, TaskResult, TRANSLATE_QUEUE_KEY,
};
pub use runner::{PageTranslator, Worker};
