use std::sync::Arc;

use blobs::BlobStore;
use pipeline::RoutedInpainter;
use store::{JobStore, Quota};
use worker::TaskQueue;

/// Everything the request layer needs, built once at startup and threaded
/// through axum state. Tests assemble one over in-memory fakes; production
/// wires Redis, the local blob root, and the configured backends.
pub struct AppContext {
    pub jobs: JobStore,
    pub blobs: Arc<dyn BlobStore>,
    pub quota: Quota,
    pub queue: Arc<dyn TaskQueue>,
    pub inpainter: Arc<RoutedInpainter>,
    pub base_url: String,
    pub ip_hash_secret: String,
    pub max_batch_size: usize,
}

impl AppContext {
    /// Public URL of a blob, served under `/static`.
    pub fn static_url(&self, relative: &str) -> String {
        format!("{}/static/{relative}", self.base_url.trim_end_matches('/'))
    }

    pub fn hashed_ip(&self, ip: &str) -> String {
        store::hash_ip(&self.ip_hash_secret, ip)
    }
}
