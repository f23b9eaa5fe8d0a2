//! # doc-convert-core
//!
//! Document conversion between office formats, PDF and images.
//!
//! Every (source, target) pair maps to one route:
//!
//! - **office → PDF**: a headless LibreOffice process behind an admission gate
//! - **PDF → docx/xlsx/pptx**: pdfium text extraction and page rendering
//! - **PDF → png/jpg**: pdfium rasterization; multi-page documents become a zip
//! - **png/jpg → PDF**: a single page at the image's native size
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use doc_convert_core::{Converter, ConverterConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Two LibreOffice processes at most, 150 DPI rasterization
//!     let converter = Converter::new(ConverterConfig::new(2, 150))?;
//!
//!     let input = std::fs::read("report.docx")?;
//!     let result = converter
//!         .convert_bytes(input, "report.docx", "docx", "pdf")
//!         .await?;
//!
//!     std::fs::write(&result.file_name, &result.bytes)?;
//!     println!("Wrote {} ({})", result.file_name, result.mime_type);
//!     Ok(())
//! }
//! ```
//!
//! ## Batch Processing
//!
//! ```rust,no_run
//! use doc_convert_core::{ConversionRequest, Converter};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let converter = Converter::builder().dpi(200).build()?;
//!
//!     let requests = vec![
//!         ConversionRequest::from_file_name(std::fs::read("a.pdf")?, "a.pdf", "png"),
//!         ConversionRequest::from_file_name(std::fs::read("b.xlsx")?, "b.xlsx", "pdf"),
//!     ];
//!
//!     let result = converter.convert_batch(requests, 4).await;
//!     println!(
//!         "{} converted, {} failed in {:?}",
//!         result.successful.len(),
//!         result.failed.len(),
//!         result.total_duration
//!     );
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod converter;
pub mod error;
pub mod office;
pub mod ooxml;
pub mod pdf_engine;
pub mod raster;
pub mod resolver;
pub mod routes;

// Re-export main types for convenience
pub use config::{
    BatchResult, ConversionRequest, ConversionResult, ConverterConfig, FailedConversion,
    OfficeConfig, RasterConfig, RasterPage,
};
pub use converter::{Converter, ConverterBuilder, ConverterStats};
pub use error::{ConversionError, ErrorKind, Result};
pub use office::{LibreOfficeClient, OfficeHealth, OfficeRenderer, ProcessRunner};
pub use pdf_engine::{DocumentEngine, PdfEngine};
pub use routes::{DocumentFormat, Route};

/// Formats accepted as a conversion source.
pub const SUPPORTED_SOURCE_FORMATS: &[&str] = &[
    "doc", "docx", "xls", "xlsx", "ppt", "pptx", "pdf", "png", "jpg", "jpeg",
];

/// Check whether a (source, target) pair can be converted.
///
/// Tokens are normalized first, so `".DOCX"` and `"docx"` are equivalent.
pub fn is_supported_conversion(source: &str, target: &str) -> bool {
    routes::route_for(
        &routes::normalize_format(source),
        &routes::normalize_format(target),
    )
    .is_ok()
}

/// Initialize the library's logging.
/// Call this once at application startup if you want to see logs.
pub fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();
}
