//! In-process PDF routes backed by pdfium.
//!
//! Covers PDF → image, PDF → office container and image → PDF. All of these
//! are blocking, CPU-bound calls; the converter moves them onto tokio's
//! blocking pool.

use crate::config::RasterConfig;
use crate::error::{ConversionError, Result};
use crate::ooxml::{self, PptxWriter};
use crate::raster::{self, PageSource};
use crate::routes::{ImageFormat, OfficeFormat};
use image::DynamicImage;
use once_cell::sync::OnceCell;
use pdfium_render::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// The library-backed conversions.
pub trait DocumentEngine: Send + Sync {
    /// Convert a PDF into a docx, xlsx or pptx container.
    fn pdf_to_office(&self, pdf: &[u8], format: OfficeFormat) -> Result<Vec<u8>>;

    /// Rasterize a PDF: raw image for one page, zip archive for more.
    fn rasterize_pdf(&self, pdf: &[u8], format: ImageFormat) -> Result<Vec<u8>>;

    /// Wrap a PNG or JPEG image in a single-page PDF.
    fn image_to_pdf(&self, image: &[u8]) -> Result<Vec<u8>>;
}

static PDFIUM: OnceCell<Arc<Pdfium>> = OnceCell::new();

/// Bind the pdfium library once per process.
///
/// Looks in the working directory, `/usr/lib` and `/usr/local/lib` before
/// falling back to the system loader.
pub fn pdfium() -> Result<Arc<Pdfium>> {
    PDFIUM
        .get_or_try_init(|| {
            let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| {
                    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                        "/usr/lib",
                    ))
                })
                .or_else(|_| {
                    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                        "/usr/local/lib",
                    ))
                })
                .or_else(|_| Pdfium::bind_to_system_library())
                .map_err(|e| {
                    ConversionError::PdfiumUnavailable(format!(
                        "Failed to load pdfium library: {}",
                        e
                    ))
                })?;
            Ok(Arc::new(Pdfium::new(bindings)))
        })
        .cloned()
}

/// Pixel length of `points` at `dpi` (PDF points are 1/72 inch).
pub fn scaled_pixels(points: f32, dpi: u32) -> i32 {
    ((points * dpi as f32 / 72.0) as i32).max(1)
}

fn render_failure(what: &str, err: impl std::fmt::Display) -> ConversionError {
    ConversionError::RenderFailure(format!("{}: {}", what, err))
}

/// A loaded PDF exposed as a [`PageSource`].
pub struct PdfiumPageSource<'a> {
    document: PdfDocument<'a>,
    dpi: u32,
}

impl<'a> PdfiumPageSource<'a> {
    pub fn load(pdfium: &'a Pdfium, bytes: &'a [u8], dpi: u32) -> Result<Self> {
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| render_failure("Failed to load PDF", e))?;
        Ok(Self { document, dpi })
    }

    fn page(&self, index: usize) -> Result<PdfPage<'a>> {
        self.document
            .pages()
            .get(index as u16)
            .map_err(|e| render_failure(&format!("Failed to get page {}", index + 1), e))
    }

    /// Page size in points.
    pub fn page_size(&self, index: usize) -> Result<(f32, f32)> {
        let page = self.page(index)?;
        Ok((page.width().value, page.height().value))
    }

    /// All text on a page, in reading order.
    pub fn page_text(&self, index: usize) -> Result<String> {
        let page = self.page(index)?;
        let text = page
            .text()
            .map_err(|e| render_failure(&format!("Failed to read text on page {}", index + 1), e))?;
        Ok(text.all())
    }
}

impl PageSource for PdfiumPageSource<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn render_page(&self, index: usize) -> Result<DynamicImage> {
        let page = self.page(index)?;

        let width = scaled_pixels(page.width().value, self.dpi);
        let height = scaled_pixels(page.height().value, self.dpi);

        let render_config = PdfRenderConfig::new()
            .set_target_width(width)
            .set_target_height(height)
            .rotate_if_landscape(PdfPageRenderRotation::None, false);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| render_failure(&format!("Failed to render page {}", index + 1), e))?;

        Ok(bitmap.as_image())
    }
}

/// pdfium-backed [`DocumentEngine`].
pub struct PdfEngine {
    config: RasterConfig,
    pdfium: Arc<Pdfium>,
}

impl std::fmt::Debug for PdfEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfEngine")
            .field("config", &self.config)
            .finish()
    }
}

impl PdfEngine {
    /// Create an engine, binding pdfium if this is the first one.
    pub fn new(config: RasterConfig) -> Result<Self> {
        config.validate()?;
        let pdfium = pdfium()?;
        info!("PDF engine initialized at {} DPI", config.dpi);
        Ok(Self { config, pdfium })
    }

    /// Get the configured DPI.
    pub fn dpi(&self) -> u32 {
        self.config.dpi
    }

    fn load<'a>(&'a self, pdf: &'a [u8]) -> Result<PdfiumPageSource<'a>> {
        let source = PdfiumPageSource::load(&self.pdfium, pdf, self.config.dpi)?;
        if source.page_count() == 0 {
            return Err(ConversionError::RenderFailure(
                "PDF has no pages".to_string(),
            ));
        }
        Ok(source)
    }

    fn page_texts(source: &PdfiumPageSource<'_>) -> Result<Vec<String>> {
        (0..source.page_count())
            .map(|index| source.page_text(index))
            .collect()
    }

    fn write_pptx(&self, source: &PdfiumPageSource<'_>) -> Result<Vec<u8>> {
        let mut writer = PptxWriter::new();
        for index in 0..source.page_count() {
            let (width_pt, height_pt) = source.page_size(index)?;
            let page = raster::render_encoded(source, index, ImageFormat::Png, &self.config)?;
            writer.add_slide(&page.data, width_pt, height_pt)?;
        }
        writer.finish()
    }
}

impl DocumentEngine for PdfEngine {
    fn pdf_to_office(&self, pdf: &[u8], format: OfficeFormat) -> Result<Vec<u8>> {
        let start = Instant::now();
        let source = self.load(pdf)?;
        let page_count = source.page_count();

        let bytes = match format {
            OfficeFormat::Docx => ooxml::write_docx(&Self::page_texts(&source)?)?,
            OfficeFormat::Xlsx => ooxml::write_xlsx(&Self::page_texts(&source)?)?,
            OfficeFormat::Pptx => self.write_pptx(&source)?,
        };

        debug!(
            "Converted {} PDF pages to {:?} in {:?}",
            page_count,
            format,
            start.elapsed()
        );
        Ok(bytes)
    }

    fn rasterize_pdf(&self, pdf: &[u8], format: ImageFormat) -> Result<Vec<u8>> {
        let start = Instant::now();
        let source = PdfiumPageSource::load(&self.pdfium, pdf, self.config.dpi)?;
        let bytes = raster::rasterize(&source, format, &self.config)?;
        debug!(
            "Rasterized {} pages to {:?} in {:?}",
            source.page_count(),
            format,
            start.elapsed()
        );
        Ok(bytes)
    }

    fn image_to_pdf(&self, image: &[u8]) -> Result<Vec<u8>> {
        let decoded =
            image::load_from_memory(image).map_err(|e| render_failure("Failed to decode image", e))?;
        let width = PdfPoints::new(decoded.width() as f32);
        let height = PdfPoints::new(decoded.height() as f32);

        let mut document = self
            .pdfium
            .create_new_pdf()
            .map_err(|e| render_failure("Failed to create PDF", e))?;
        let mut page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::from_points(width, height))
            .map_err(|e| render_failure("Failed to add page", e))?;
        page.objects_mut()
            .create_image_object(
                PdfPoints::new(0.0),
                PdfPoints::new(0.0),
                &decoded,
                Some(width),
                Some(height),
            )
            .map_err(|e| render_failure("Failed to place image", e))?;

        document
            .save_to_bytes()
            .map_err(|e| render_failure("Failed to write PDF", e))
    }
}
