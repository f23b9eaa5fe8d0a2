//! The dispatcher: picks a route for each (source, target) pair and runs it.
//!
//! Office → PDF goes to the [`OfficeRenderer`]; everything else goes to the
//! [`DocumentEngine`] on tokio's blocking pool. Results are named through the
//! [`resolver`](crate::resolver).

use crate::config::{
    BatchResult, ConversionRequest, ConversionResult, ConverterConfig, FailedConversion,
};
use crate::error::{ConversionError, Result};
use crate::office::{LibreOfficeClient, OfficeHealth, OfficeRenderer};
use crate::pdf_engine::{DocumentEngine, PdfEngine};
use crate::resolver;
use crate::routes::{route_for, ImageFormat, OfficeFormat, Route};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, error, info, warn};

/// Main entry point for document conversion.
pub struct Converter {
    office: Arc<dyn OfficeRenderer>,
    engine: Arc<dyn DocumentEngine>,
    config: ConverterConfig,
    total_converted: AtomicUsize,
    total_failed: AtomicUsize,
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Converter {
    /// Create a converter with LibreOffice and pdfium backends.
    pub fn new(config: ConverterConfig) -> Result<Self> {
        ConverterBuilder::new().config(config).build()
    }

    /// Start building a converter.
    pub fn builder() -> ConverterBuilder {
        ConverterBuilder::new()
    }

    /// Convert one request.
    pub async fn convert(&self, request: ConversionRequest) -> Result<ConversionResult> {
        let start = Instant::now();
        let file_name = request.file_name().to_string();
        let source = request.source_format().to_string();
        let target = request.target_format().to_string();

        let route = match route_for(&source, &target) {
            Ok(route) => route,
            Err(e) => {
                warn!("Rejected {:?}: {}", file_name, e);
                self.total_failed.fetch_add(1, Ordering::SeqCst);
                return Err(e);
            }
        };

        info!(
            "Converting {:?} ({} -> {}) via {}",
            file_name, source, target, route
        );
        let stem = request.output_stem();

        let bytes = match self.dispatch(route, &source, request.into_input()).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let e = e.with_route(route.name());
                error!("Converting {:?} via {} failed: {}", file_name, route, e);
                self.total_failed.fetch_add(1, Ordering::SeqCst);
                return Err(e);
            }
        };

        let (extension, mime_type) = resolver::resolve(&target, &bytes);
        self.total_converted.fetch_add(1, Ordering::SeqCst);
        info!(
            "Converted {:?} to {} ({} bytes) in {:?}",
            file_name,
            extension,
            bytes.len(),
            start.elapsed()
        );

        Ok(ConversionResult {
            file_name: format!("{}{}", stem, extension),
            bytes,
            extension,
            mime_type,
        })
    }

    async fn dispatch(&self, route: Route, source: &str, input: Vec<u8>) -> Result<Vec<u8>> {
        debug!("Dispatching {} bytes to {}", input.len(), route);
        match route {
            Route::OfficeToPdf => self.office.render_to_pdf(&input, source).await,
            Route::PdfToOffice(format) => {
                self.run_blocking(move |engine| engine.pdf_to_office(&input, format))
                    .await
            }
            Route::PdfToImage(format) => {
                self.run_blocking(move |engine| engine.rasterize_pdf(&input, format))
                    .await
            }
            Route::ImageToPdf => {
                self.run_blocking(move |engine| engine.image_to_pdf(&input))
                    .await
            }
        }
    }

    async fn run_blocking<F>(&self, job: F) -> Result<Vec<u8>>
    where
        F: FnOnce(&dyn DocumentEngine) -> Result<Vec<u8>> + Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || job(engine.as_ref())).await?
    }

    /// Convert raw bytes.
    pub async fn convert_bytes(
        &self,
        input: Vec<u8>,
        file_name: &str,
        source_format: &str,
        target_format: &str,
    ) -> Result<ConversionResult> {
        self.convert(ConversionRequest::new(
            input,
            file_name,
            source_format,
            target_format,
        ))
        .await
    }

    /// Drain `reader` and convert what it produced.
    pub async fn convert_reader<R>(
        &self,
        mut reader: R,
        file_name: &str,
        source_format: &str,
        target_format: &str,
    ) -> Result<ConversionResult>
    where
        R: AsyncRead + Unpin,
    {
        let mut input = Vec::new();
        reader
            .read_to_end(&mut input)
            .await
            .map_err(|e| ConversionError::io("reading conversion input", e))?;
        self.convert_bytes(input, file_name, source_format, target_format)
            .await
    }

    /// Convert a file on disk; the source format comes from its extension.
    pub async fn convert_file(&self, path: &Path, target_format: &str) -> Result<ConversionResult> {
        let input = tokio::fs::read(path)
            .await
            .map_err(|e| ConversionError::io(format!("reading {}", path.display()), e))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        self.convert(ConversionRequest::from_file_name(
            input,
            file_name,
            target_format,
        ))
        .await
    }

    /// Convert several requests, at most `concurrency` at a time.
    ///
    /// Office renders are additionally limited by the admission gate.
    pub async fn convert_batch(
        &self,
        requests: Vec<ConversionRequest>,
        concurrency: usize,
    ) -> BatchResult {
        let start = Instant::now();
        let total_files = requests.len();

        let results: Vec<(String, Result<ConversionResult>)> = stream::iter(requests)
            .map(|request| async move {
                let file_name = request.file_name().to_string();
                (file_name, self.convert(request).await)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut successful = Vec::new();
        let mut failed = Vec::new();
        for (file_name, result) in results {
            match result {
                Ok(converted) => successful.push(converted),
                Err(e) => failed.push(FailedConversion {
                    file_name,
                    error: e.to_string(),
                }),
            }
        }

        info!(
            "Batch of {} finished: {} ok, {} failed in {:?}",
            total_files,
            successful.len(),
            failed.len(),
            start.elapsed()
        );

        BatchResult {
            successful,
            failed,
            total_duration: start.elapsed(),
        }
    }

    /// Office renderer health, if the renderer reports any.
    pub fn health(&self) -> Option<OfficeHealth> {
        self.office.health()
    }

    /// Get the current configuration.
    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Get statistics about processing.
    pub fn stats(&self) -> ConverterStats {
        ConverterStats {
            total_converted: self.total_converted.load(Ordering::SeqCst),
            total_failed: self.total_failed.load(Ordering::SeqCst),
            max_concurrent: self.config.office.max_concurrent,
            dpi: self.config.raster.dpi,
        }
    }
}

/// Statistics about the converter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterStats {
    /// Conversions that returned bytes.
    pub total_converted: usize,
    /// Conversions that returned an error, including unsupported pairs.
    pub total_failed: usize,
    /// Admission gate size.
    pub max_concurrent: usize,
    /// Configured DPI.
    pub dpi: u32,
}

/// Stands in for a backend whose dependency is missing on this host.
///
/// The converter still starts; only the routes that need the missing piece fail.
#[derive(Debug, Clone)]
enum Unavailable {
    OfficeTool,
    Pdfium(String),
}

impl Unavailable {
    fn error(&self) -> ConversionError {
        match self {
            Unavailable::OfficeTool => ConversionError::OfficeToolNotFound,
            Unavailable::Pdfium(reason) => ConversionError::PdfiumUnavailable(reason.clone()),
        }
    }
}

#[async_trait]
impl OfficeRenderer for Unavailable {
    async fn render_to_pdf(&self, _input: &[u8], _source_ext: &str) -> Result<Vec<u8>> {
        Err(self.error())
    }
}

impl DocumentEngine for Unavailable {
    fn pdf_to_office(&self, _pdf: &[u8], _format: OfficeFormat) -> Result<Vec<u8>> {
        Err(self.error())
    }

    fn rasterize_pdf(&self, _pdf: &[u8], _format: ImageFormat) -> Result<Vec<u8>> {
        Err(self.error())
    }

    fn image_to_pdf(&self, _image: &[u8]) -> Result<Vec<u8>> {
        Err(self.error())
    }
}

/// Builder for creating a Converter with custom settings.
pub struct ConverterBuilder {
    config: ConverterConfig,
    office: Option<Arc<dyn OfficeRenderer>>,
    engine: Option<Arc<dyn DocumentEngine>>,
}

impl ConverterBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ConverterConfig::default(),
            office: None,
            engine: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ConverterConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the admission gate size.
    pub fn max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.config.office.max_concurrent = max_concurrent;
        self
    }

    /// Set the DPI for rendering.
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.raster.dpi = dpi;
        self
    }

    /// Set the JPEG quality.
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.raster.jpeg_quality = quality;
        self
    }

    /// Set the conversion timeout.
    pub fn conversion_timeout(mut self, timeout: Duration) -> Self {
        self.config.office.conversion_timeout = timeout;
        self
    }

    /// Set the path to soffice binary.
    pub fn soffice_path(mut self, path: PathBuf) -> Self {
        self.config.office.soffice_path = Some(path);
        self
    }

    /// Set the temporary directory.
    pub fn temp_dir(mut self, dir: PathBuf) -> Self {
        self.config.office.temp_dir = Some(dir);
        self
    }

    /// Zero-pad multi-page archive entry names.
    pub fn zero_pad_entry_names(mut self, enabled: bool) -> Self {
        self.config.raster.zero_pad_entry_names = enabled;
        self
    }

    /// Use this renderer for office → PDF instead of LibreOffice.
    pub fn office_renderer(mut self, renderer: Arc<dyn OfficeRenderer>) -> Self {
        self.office = Some(renderer);
        self
    }

    /// Use this engine for the PDF and image routes instead of pdfium.
    pub fn document_engine(mut self, engine: Arc<dyn DocumentEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Build the converter.
    pub fn build(self) -> Result<Converter> {
        let config = self.config;
        config.validate()?;

        info!(
            "Initializing converter with max_concurrent={}, dpi={}",
            config.office.max_concurrent, config.raster.dpi
        );

        let office: Arc<dyn OfficeRenderer> = match self.office {
            Some(office) => office,
            None => match LibreOfficeClient::new(config.office.clone()) {
                Ok(client) => Arc::new(client),
                Err(ConversionError::OfficeToolNotFound) => {
                    warn!("LibreOffice not found; office -> pdf conversions will fail");
                    Arc::new(Unavailable::OfficeTool)
                }
                Err(e) => return Err(e),
            },
        };

        let engine: Arc<dyn DocumentEngine> = match self.engine {
            Some(engine) => engine,
            None => match PdfEngine::new(config.raster.clone()) {
                Ok(engine) => Arc::new(engine),
                Err(ConversionError::PdfiumUnavailable(reason)) => {
                    warn!("{}; pdf and image conversions will fail", reason);
                    Arc::new(Unavailable::Pdfium(reason))
                }
                Err(e) => return Err(e),
            },
        };

        Ok(Converter {
            office,
            engine,
            config,
            total_converted: AtomicUsize::new(0),
            total_failed: AtomicUsize::new(0),
        })
    }
}

impl Default for ConverterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
