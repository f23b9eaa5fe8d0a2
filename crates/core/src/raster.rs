//! PDF page rasterization and multi-page packaging.
//!
//! A single-page document yields the raw encoded image. Anything longer is
//! packed into a zip archive, one entry per page, written in ascending page
//! order. Pages are rendered, encoded and written one at a time so only one
//! decoded page is alive at any moment.

use crate::config::{RasterConfig, RasterPage};
use crate::error::{ConversionError, Result};
use crate::routes::ImageFormat;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbaImage};
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Anything that can hand out rendered pages by index.
///
/// The pdfium-backed implementation lives in [`crate::pdf_engine`]; tests use
/// in-memory sources.
pub trait PageSource {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Render one page (0-based) to pixels.
    fn render_page(&self, index: usize) -> Result<DynamicImage>;
}

/// Rasterize every page of `source`.
///
/// Returns raw image bytes for a one-page document and a zip archive for
/// anything longer. Any page failure aborts the whole operation.
pub fn rasterize<S: PageSource + ?Sized>(
    source: &S,
    format: ImageFormat,
    config: &RasterConfig,
) -> Result<Vec<u8>> {
    let page_count = source.page_count();
    debug!("Rasterizing {} pages as {:?}", page_count, format);

    match page_count {
        0 => Err(ConversionError::RenderFailure(
            "PDF has no pages".to_string(),
        )),
        1 => Ok(render_encoded(source, 0, format, config)?.data),
        _ => {
            let mut archive = PageArchive::new(format, page_count, config.zero_pad_entry_names);
            for index in 0..page_count {
                let page = render_encoded(source, index, format, config)?;
                archive.add(&page)?;
            }
            archive.finish()
        }
    }
}

/// Render and encode a single page.
pub fn render_encoded<S: PageSource + ?Sized>(
    source: &S,
    index: usize,
    format: ImageFormat,
    config: &RasterConfig,
) -> Result<RasterPage> {
    let image = source.render_page(index)?;
    let data = encode_page(image, format, config).map_err(|e| match e {
        ConversionError::RenderFailure(msg) => {
            ConversionError::RenderFailure(format!("page {}: {}", index + 1, msg))
        }
        other => other,
    })?;
    Ok(RasterPage { index, data })
}

/// Flatten a page onto the configured background and encode it.
pub fn encode_page(image: DynamicImage, format: ImageFormat, config: &RasterConfig) -> Result<Vec<u8>> {
    let flattened = apply_background(image.into_rgba8(), config.background_color);
    match format {
        ImageFormat::Png => encode_png(&flattened),
        ImageFormat::Jpeg => encode_jpeg(flattened, config.jpeg_quality),
    }
}

/// Blend transparent areas onto an opaque background colour.
fn apply_background(mut image: RgbaImage, (r, g, b): (u8, u8, u8)) -> RgbaImage {
    for pixel in image.pixels_mut() {
        let alpha = pixel[3] as f32 / 255.0;
        if alpha < 1.0 {
            let inv_alpha = 1.0 - alpha;
            pixel[0] = ((pixel[0] as f32 * alpha) + (r as f32 * inv_alpha)) as u8;
            pixel[1] = ((pixel[1] as f32 * alpha) + (g as f32 * inv_alpha)) as u8;
            pixel[2] = ((pixel[2] as f32 * alpha) + (b as f32 * inv_alpha)) as u8;
            pixel[3] = 255;
        }
    }

    image
}

/// Encode RGBA pixels as PNG.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());

    let mut encoder = png::Encoder::new(&mut buffer, image.width(), image.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::Fast);

    let mut writer = encoder.write_header().map_err(|e| {
        ConversionError::RenderFailure(format!("Failed to write PNG header: {}", e))
    })?;

    writer.write_image_data(image.as_raw()).map_err(|e| {
        ConversionError::RenderFailure(format!("Failed to write PNG data: {}", e))
    })?;

    drop(writer);

    Ok(buffer.into_inner())
}

fn encode_jpeg(image: RgbaImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = DynamicImage::ImageRgba8(image).into_rgb8();
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .encode_image(&rgb)
        .map_err(|e| ConversionError::RenderFailure(format!("Failed to encode JPEG: {}", e)))?;
    Ok(buffer)
}

/// Archive entry name for a page.
///
/// `page_<n>.<ext>` with a 1-based page number. With `zero_pad` the number is
/// padded to the width of `page_count` so names sort in page order.
pub fn entry_name(page_number: usize, page_count: usize, extension: &str, zero_pad: bool) -> String {
    if zero_pad {
        let width = page_count.to_string().len();
        format!("page_{:0width$}.{}", page_number, extension, width = width)
    } else {
        format!("page_{}.{}", page_number, extension)
    }
}

/// Zip container that receives encoded pages in order.
struct PageArchive {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    format: ImageFormat,
    page_count: usize,
    zero_pad: bool,
}

impl PageArchive {
    fn new(format: ImageFormat, page_count: usize, zero_pad: bool) -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            format,
            page_count,
            zero_pad,
        }
    }

    fn add(&mut self, page: &RasterPage) -> Result<()> {
        let name = entry_name(
            page.page_number(),
            self.page_count,
            self.format.extension(),
            self.zero_pad,
        );
        // PNG and JPEG are already compressed.
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        self.writer.start_file(name.as_str(), options).map_err(|e| {
            ConversionError::RenderFailure(format!("Failed to start archive entry {}: {}", name, e))
        })?;
        self.writer.write_all(&page.data).map_err(|e| {
            ConversionError::RenderFailure(format!("Failed to write archive entry {}: {}", name, e))
        })?;
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>> {
        let cursor = self.writer.finish().map_err(|e| {
            ConversionError::RenderFailure(format!("Failed to finish archive: {}", e))
        })?;
        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::cell::RefCell;
    use std::io::Read;

    const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];

    /// In-memory page source: `None` entries fail to render.
    struct FakeSource {
        pages: Vec<Option<Rgba<u8>>>,
        rendered: RefCell<Vec<usize>>,
    }

    impl FakeSource {
        fn solid(count: usize) -> Self {
            Self::with_pages((0..count).map(|i| Some(Rgba([i as u8 * 20, 0, 0, 255]))).collect())
        }

        fn with_pages(pages: Vec<Option<Rgba<u8>>>) -> Self {
            Self {
                pages,
                rendered: RefCell::new(Vec::new()),
            }
        }
    }

    impl PageSource for FakeSource {
        fn page_count(&self) -> usize {
            self.pages.len()
        }

        fn render_page(&self, index: usize) -> Result<DynamicImage> {
            self.rendered.borrow_mut().push(index);
            match self.pages[index] {
                Some(color) => Ok(DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 6, color))),
                None => Err(ConversionError::RenderFailure(format!(
                    "Failed to render page {}",
                    index + 1
                ))),
            }
        }
    }

    fn archive_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut file = archive.by_index(i).unwrap();
                let mut data = Vec::new();
                file.read_to_end(&mut data).unwrap();
                (file.name().to_string(), data)
            })
            .collect()
    }

    // ========== rasterize tests ==========

    #[test]
    fn test_single_page_png_is_raw_image() {
        let source = FakeSource::solid(1);
        let bytes = rasterize(&source, ImageFormat::Png, &RasterConfig::default()).unwrap();
        assert_eq!(&bytes[0..8], &PNG_MAGIC);
        assert!(!crate::resolver::is_zip(&bytes));
    }

    #[test]
    fn test_single_page_jpeg_is_raw_image() {
        let source = FakeSource::solid(1);
        let bytes = rasterize(&source, ImageFormat::Jpeg, &RasterConfig::default()).unwrap();
        assert_eq!(&bytes[0..3], &JPEG_MAGIC);
    }

    #[test]
    fn test_multi_page_png_archive() {
        let source = FakeSource::solid(3);
        let bytes = rasterize(&source, ImageFormat::Png, &RasterConfig::default()).unwrap();
        assert!(crate::resolver::is_zip(&bytes));

        let entries = archive_entries(&bytes);
        let names: Vec<_> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["page_1.png", "page_2.png", "page_3.png"]);
        for (_, data) in &entries {
            assert_eq!(&data[0..8], &PNG_MAGIC);
        }
        assert_eq!(*source.rendered.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_multi_page_jpeg_archive() {
        let source = FakeSource::solid(2);
        let bytes = rasterize(&source, ImageFormat::Jpeg, &RasterConfig::default()).unwrap();

        let entries = archive_entries(&bytes);
        let names: Vec<_> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["page_1.jpg", "page_2.jpg"]);
        for (_, data) in &entries {
            assert_eq!(&data[0..3], &JPEG_MAGIC);
        }
    }

    #[test]
    fn test_eleven_pages_keep_unpadded_names_in_page_order() {
        let source = FakeSource::solid(11);
        let bytes = rasterize(&source, ImageFormat::Png, &RasterConfig::default()).unwrap();

        let names: Vec<_> = archive_entries(&bytes).into_iter().map(|(n, _)| n).collect();
        let expected: Vec<_> = (1..=11).map(|n| format!("page_{}.png", n)).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_zero_padded_names_sort_lexicographically() {
        let source = FakeSource::solid(12);
        let config = RasterConfig::default().zero_pad_entry_names(true);
        let bytes = rasterize(&source, ImageFormat::Png, &config).unwrap();

        let names: Vec<_> = archive_entries(&bytes).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names.first().map(String::as_str), Some("page_01.png"));
        assert_eq!(names.last().map(String::as_str), Some("page_12.png"));
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(sorted, names);
    }

    #[test]
    fn test_zero_pages_is_render_failure() {
        let source = FakeSource::solid(0);
        let result = rasterize(&source, ImageFormat::Png, &RasterConfig::default());
        assert!(matches!(result, Err(ConversionError::RenderFailure(_))));
    }

    #[test]
    fn test_page_failure_aborts_without_partial_archive() {
        let source = FakeSource::with_pages(vec![
            Some(Rgba([0, 0, 0, 255])),
            None,
            Some(Rgba([0, 0, 0, 255])),
        ]);
        let result = rasterize(&source, ImageFormat::Png, &RasterConfig::default());
        match result {
            Err(ConversionError::RenderFailure(msg)) => assert!(msg.contains("page 2")),
            other => panic!("Expected RenderFailure, got {:?}", other.map(|b| b.len())),
        }
        // Page 3 is never touched once page 2 fails.
        assert_eq!(*source.rendered.borrow(), vec![0, 1]);
    }

    // ========== entry_name tests ==========

    #[test]
    fn test_entry_name_schemes() {
        assert_eq!(entry_name(1, 3, "png", false), "page_1.png");
        assert_eq!(entry_name(10, 12, "jpg", false), "page_10.jpg");
        assert_eq!(entry_name(3, 120, "png", true), "page_003.png");
        assert_eq!(entry_name(9, 9, "png", true), "page_9.png");
    }

    // ========== encoding tests ==========

    #[test]
    fn test_encode_png_small_image() {
        let image = RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255]));
        let png_data = encode_png(&image).unwrap();
        assert!(png_data.len() > 8);
        assert_eq!(&png_data[0..8], &PNG_MAGIC);
    }

    #[test]
    fn test_apply_background_flattens_transparency() {
        let image = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0]));
        let flattened = apply_background(image, (255, 255, 255));
        assert!(flattened.pixels().all(|p| *p == Rgba([255, 255, 255, 255])));
    }

    #[test]
    fn test_apply_background_keeps_opaque_pixels() {
        let image = RgbaImage::from_pixel(1, 1, Rgba([10, 20, 30, 255]));
        let flattened = apply_background(image, (255, 255, 255));
        assert_eq!(*flattened.get_pixel(0, 0), Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn test_encode_page_jpeg_decodes_back() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(16, 9, Rgba([0, 128, 0, 128])));
        let jpeg = encode_page(image, ImageFormat::Jpeg, &RasterConfig::default()).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 9));
    }
}
