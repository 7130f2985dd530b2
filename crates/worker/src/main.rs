use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use futures::FutureExt;
use pipeline::registry;
use store::JobStore;
use worker::{RedisQueue, Worker};

/// Worker is a daemon which consumes queued translation jobs and runs the
/// image pipeline over them.
#[derive(Debug, Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// URL of the Redis store and broker.
    #[clap(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379/0")]
    redis_url: String,
    /// Directory holding uploaded and rendered images.
    #[clap(long, env = "BLOB_DIR", default_value = "./data")]
    blob_dir: String,
    /// Public base URL stamped into result links.
    #[clap(long, env = "BASE_URL", default_value = "http://localhost:8000")]
    base_url: String,
    /// Number of concurrent task runners; each handles one task at a time.
    #[clap(long, env = "WORKER_CONCURRENCY", default_value = "2")]
    concurrency: usize,
    /// Seconds before a running job is failed as timed out.
    #[clap(long, env = "SOFT_TIME_LIMIT_SECS", default_value = "300")]
    soft_time_limit_secs: u64,
    /// Seconds before a running job is aborted outright.
    #[clap(long, env = "HARD_TIME_LIMIT_SECS", default_value = "360")]
    hard_time_limit_secs: u64,
    /// Record lifetime in the keyed store.
    #[clap(long, env = "DATA_TTL_SECS", default_value = "7200")]
    data_ttl_secs: u64,

    /// Detection service endpoint.
    #[clap(long, env = "DETECTION_ENDPOINT")]
    detection_endpoint: String,
    #[clap(long, env = "DETECTION_TIMEOUT_SECS", default_value = "120")]
    detection_timeout_secs: u64,
    #[clap(long, env = "DETECTION_MAX_RETRIES", default_value = "3")]
    detection_max_retries: u32,

    /// Gemini API key for translation.
    #[clap(long, env = "GEMINI_API_KEY", default_value = "")]
    gemini_api_key: String,
    #[clap(long, env = "GEMINI_MODEL", default_value = "gemini-2.0-flash")]
    gemini_model: String,
    #[clap(long, env = "TRANSLATION_TIMEOUT_SECS", default_value = "120")]
    translation_timeout_secs: u64,

    /// Inpainting provider: "http" or "solid".
    #[clap(long, env = "INPAINTING_PROVIDER", default_value = "http")]
    inpainting_provider: String,
    #[clap(long, env = "INPAINTING_ENDPOINT", default_value = "")]
    inpainting_endpoint: String,
    #[clap(long, env = "INPAINTING_TIMEOUT_SECS", default_value = "120")]
    inpainting_timeout_secs: u64,

    /// Explicit font file for rendering; system fonts are probed otherwise.
    #[clap(long, env = "RENDER_FONT_PATH")]
    font_path: Option<std::path::PathBuf>,
}

impl Args {
    fn backend_config(&self) -> Result<registry::BackendConfig, anyhow::Error> {
        Ok(registry::BackendConfig {
            detection: registry::DetectionConfig {
                endpoint: self.detection_endpoint.clone(),
                timeout_secs: self.detection_timeout_secs,
                max_retries: self.detection_max_retries,
            },
            translation: registry::TranslationConfig {
                api_key: self.gemini_api_key.clone(),
                model: self.gemini_model.clone(),
                timeout_secs: self.translation_timeout_secs,
            },
            inpainting: registry::InpaintingConfig {
                provider: self.inpainting_provider.parse()?,
                endpoint: self.inpainting_endpoint.clone(),
                timeout_secs: self.inpainting_timeout_secs,
            },
            font_path: self.font_path.clone(),
        })
    }
}

fn main() -> Result<(), anyhow::Error> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting tracing default failed");

    let args = Args::parse();
    tracing::info!(
        concurrency = args.concurrency,
        inpainting = %args.inpainting_provider,
        "worker started"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(async_main(args));
    runtime.shutdown_timeout(Duration::from_secs(5));
    result
}

async fn async_main(args: Args) -> Result<(), anyhow::Error> {
    let backend_config = args.backend_config()?;
    let pipeline = Arc::new(
        registry::build_pipeline(&backend_config).context("building pipeline backends")?,
    );

    let kv = Arc::new(
        store::RedisStore::connect(&args.redis_url)
            .await
            .context("connecting to redis")?,
    );
    let jobs = JobStore::new(kv, Duration::from_secs(args.data_ttl_secs));
    let blobs = Arc::new(blobs::LocalBlobs::new(&args.blob_dir));
    let queue = Arc::new(
        RedisQueue::connect(&args.redis_url, worker::TRANSLATE_QUEUE_KEY)
            .await
            .context("connecting to broker")?,
    );

    let worker = Arc::new(Worker::new(
        jobs,
        blobs,
        queue,
        pipeline,
        &args.base_url,
        Duration::from_secs(args.soft_time_limit_secs),
        Duration::from_secs(args.hard_time_limit_secs),
        Duration::from_secs(args.data_ttl_secs),
    ));

    let shutdown = tokio::signal::ctrl_c().map(|_| ());
    worker.serve(args.concurrency, shutdown).await;

    Ok(())
}
