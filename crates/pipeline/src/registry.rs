//! Builds the configured backend set once at startup. Binaries parse their
//! flags into a [`BackendConfig`] and thread the resulting pipeline (and
//! inpainter, for the erase path) everywhere explicitly; there are no
//! process-level backend globals.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::clean::SolidBubbleCleaner;
use crate::restore::BackgroundRestorer;
use crate::{
    GeminiTranslator, HttpDetector, HttpRestorer, Pipeline, RenderError, RoutedInpainter,
    SolidRestorer, TextRenderer,
};

#[derive(Debug, Clone)]
pub struct DetectionConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone)]
pub struct TranslationConfig {
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InpaintingProvider {
    /// Remote neural inpainting service.
    Http,
    /// Offline solid fill; no network dependency.
    Solid,
}

impl std::str::FromStr for InpaintingProvider {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Self::Http),
            "solid" => Ok(Self::Solid),
            other => Err(RegistryError::UnknownProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InpaintingConfig {
    pub provider: InpaintingProvider,
    pub endpoint: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub detection: DetectionConfig,
    pub translation: TranslationConfig,
    pub inpainting: InpaintingConfig,
    pub font_path: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown inpainting provider: {0:?}")]
    UnknownProvider(String),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("failed to build HTTP client")]
    Http(#[from] reqwest::Error),
}

/// The inpainter alone: the erase path needs it without the rest of the
/// pipeline.
pub fn build_inpainter(config: &InpaintingConfig) -> Result<Arc<RoutedInpainter>, RegistryError> {
    let restorer: Arc<dyn BackgroundRestorer> = match config.provider {
        InpaintingProvider::Http => Arc::new(HttpRestorer::new(
            reqwest::Client::builder().build()?,
            &config.endpoint,
            Duration::from_secs(config.timeout_secs),
        )),
        InpaintingProvider::Solid => Arc::new(SolidRestorer),
    };
    Ok(Arc::new(RoutedInpainter::new(
        Arc::new(SolidBubbleCleaner::default()),
        restorer,
    )))
}

pub fn build_pipeline(config: &BackendConfig) -> Result<Pipeline, RegistryError> {
    let http = reqwest::Client::builder().build()?;

    let detector = Arc::new(HttpDetector::new(
        http.clone(),
        &config.detection.endpoint,
        Duration::from_secs(config.detection.timeout_secs),
        config.detection.max_retries,
    ));
    let translator = Arc::new(GeminiTranslator::new(
        http,
        &config.translation.api_key,
        &config.translation.model,
        Duration::from_secs(config.translation.timeout_secs),
    ));
    let inpainter = build_inpainter(&config.inpainting)?;
    let renderer = Arc::new(TextRenderer::new(config.font_path.as_deref())?);

    Ok(Pipeline::new(detector, translator, inpainter, renderer))
}
