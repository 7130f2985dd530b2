use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use api::context::AppContext;
use clap::Parser;
use futures::FutureExt;
use pipeline::registry;
use store::{JobStore, Quota};
use worker::{RedisQueue, Worker};

/// Api is the front-end daemon of the translation service: it ingests
/// uploads, accepts translation jobs, and serves job status and results.
#[derive(Debug, Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// The port to listen on for API requests.
    #[clap(long, env = "API_PORT", default_value = "8000")]
    api_port: u16,
    /// URL of the Redis store and broker.
    #[clap(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379/0")]
    redis_url: String,
    /// Directory holding uploaded and rendered images.
    #[clap(long, env = "BLOB_DIR", default_value = "./data")]
    blob_dir: String,
    /// Public base URL stamped into image links.
    #[clap(long, env = "BASE_URL", default_value = "http://localhost:8000")]
    base_url: String,
    /// Origin to allow in CORS contexts. May be specified multiple times.
    #[clap(long = "allow-origin", env = "ALLOW_ORIGIN", value_delimiter = ',')]
    allow_origin: Vec<String>,
    /// Secret mixed into client-IP hashes for quota keys.
    #[clap(long, env = "IP_HASH_SECRET", default_value = "change-me-in-production")]
    ip_hash_secret: String,
    /// Weekly image quota per client.
    #[clap(long, env = "WEEKLY_IMAGE_LIMIT", default_value = "20")]
    weekly_image_limit: i64,
    /// Largest accepted batch.
    #[clap(long, env = "MAX_BATCH_SIZE", default_value = "10")]
    max_batch_size: usize,
    /// Record lifetime in the keyed store.
    #[clap(long, env = "DATA_TTL_SECS", default_value = "7200")]
    data_ttl_secs: u64,

    /// Whether to also run translation workers inside this process.
    #[clap(long = "serve-worker", env = "SERVE_WORKER")]
    serve_worker: bool,
    #[clap(long, env = "WORKER_CONCURRENCY", default_value = "2")]
    worker_concurrency: usize,
    #[clap(long, env = "SOFT_TIME_LIMIT_SECS", default_value = "300")]
    soft_time_limit_secs: u64,
    #[clap(long, env = "HARD_TIME_LIMIT_SECS", default_value = "360")]
    hard_time_limit_secs: u64,

    /// Detection service endpoint.
    #[clap(long, env = "DETECTION_ENDPOINT", default_value = "")]
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
    fn inpainting_config(&self) -> Result<registry::InpaintingConfig, anyhow::Error> {
        Ok(registry::InpaintingConfig {
            provider: self.inpainting_provider.parse()?,
            endpoint: self.inpainting_endpoint.clone(),
            timeout_secs: self.inpainting_timeout_secs,
        })
    }

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
            inpainting: self.inpainting_config()?,
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
        port = args.api_port,
        serve_worker = args.serve_worker,
        inpainting = %args.inpainting_provider,
        "api started"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(async_main(args));
    runtime.shutdown_timeout(Duration::from_secs(5));
    result
}

async fn async_main(args: Args) -> Result<(), anyhow::Error> {
    // Bind early so requests dispatched during startup are not refused.
    let listener = tokio::net::TcpListener::bind(format!("[::]:{}", args.api_port))
        .await
        .context("failed to bind server port")?;

    let kv: Arc<store::RedisStore> = Arc::new(
        store::RedisStore::connect(&args.redis_url)
            .await
            .context("connecting to redis")?,
    );
    let jobs = JobStore::new(kv.clone(), Duration::from_secs(args.data_ttl_secs));
    let quota = Quota::new(kv, args.weekly_image_limit);
    let blobs = Arc::new(blobs::LocalBlobs::new(&args.blob_dir));
    let queue = Arc::new(
        RedisQueue::connect(&args.redis_url, worker::TRANSLATE_QUEUE_KEY)
            .await
            .context("connecting to broker")?,
    );
    let inpainter =
        registry::build_inpainter(&args.inpainting_config()?).context("building inpainter")?;

    let ctx = Arc::new(AppContext {
        jobs: jobs.clone(),
        blobs: blobs.clone(),
        quota,
        queue: queue.clone(),
        inpainter,
        base_url: args.base_url.clone(),
        ip_hash_secret: args.ip_hash_secret.clone(),
        max_batch_size: args.max_batch_size,
    });

    // Share-able future which completes when the process should exit.
    let shutdown = tokio::signal::ctrl_c().map(|_| ()).shared();

    let router = api::build_router(
        ctx,
        Some(blobs.base_dir().clone()),
        &args.allow_origin,
    )?;
    let server = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown.clone());
    let server = async move { anyhow::Result::Ok(server.await?) };

    let worker_fut: futures::future::BoxFuture<'static, anyhow::Result<()>> = if args.serve_worker
    {
        let pipeline = Arc::new(
            registry::build_pipeline(&args.backend_config()?)
                .context("building pipeline backends")?,
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
        worker
            .serve(args.worker_concurrency, shutdown)
            .map(anyhow::Result::Ok)
            .boxed()
    } else {
        futures::future::ready(anyhow::Result::Ok(())).boxed()
    };

    let ((), ()) = tokio::try_join!(server, worker_fut)?;
    Ok(())
}
