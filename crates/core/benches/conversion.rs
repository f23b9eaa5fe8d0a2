//! Benchmarks for the pure-Rust conversion paths.
//!
//! Run with: cargo bench --package doc-convert-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use doc_convert_core::config::RasterConfig;
use doc_convert_core::error::Result;
use doc_convert_core::ooxml::{write_xlsx, PptxWriter};
use doc_convert_core::raster::{encode_page, encode_png, rasterize, PageSource};
use doc_convert_core::routes::ImageFormat;
use image::{DynamicImage, Rgba, RgbaImage};
use std::time::Duration;

/// Letter-size page at 150 DPI.
const PAGE_WIDTH: u32 = 1275;
const PAGE_HEIGHT: u32 = 1650;

fn synthetic_page(seed: u32) -> RgbaImage {
    RgbaImage::from_fn(PAGE_WIDTH, PAGE_HEIGHT, |x, y| {
        if (x / 40 + y / 18 + seed) % 7 == 0 {
            Rgba([20, 20, 20, 255])
        } else {
            Rgba([255, 255, 255, 0])
        }
    })
}

/// Pre-rendered pages served from memory.
struct MemorySource {
    pages: Vec<RgbaImage>,
}

impl PageSource for MemorySource {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn render_page(&self, index: usize) -> Result<DynamicImage> {
        Ok(DynamicImage::ImageRgba8(self.pages[index].clone()))
    }
}

fn benchmark_encode_page(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_page");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(5));

    let page = DynamicImage::ImageRgba8(synthetic_page(0));
    let config = RasterConfig::default();

    for format in [ImageFormat::Png, ImageFormat::Jpeg] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{:?}", format)),
            &format,
            |b, &format| {
                b.iter(|| encode_page(black_box(page.clone()), format, &config).unwrap());
            },
        );
    }

    group.finish();
}

fn benchmark_rasterize_archive(c: &mut Criterion) {
    let mut group = c.benchmark_group("rasterize_archive");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));

    let config = RasterConfig::default();
    for page_count in [1usize, 4, 12] {
        let source = MemorySource {
            pages: (0..page_count as u32).map(synthetic_page).collect(),
        };
        group.bench_with_input(
            BenchmarkId::from_parameter(page_count),
            &source,
            |b, source| {
                b.iter(|| rasterize(source, ImageFormat::Png, &config).unwrap());
            },
        );
    }

    group.finish();
}

fn benchmark_office_writers(c: &mut Criterion) {
    let mut group = c.benchmark_group("office_writers");
    group.sample_size(10);

    let pages: Vec<String> = (0..20)
        .map(|p| {
            (0..40)
                .map(|row| format!("Row {}   page {}   value {}", row, p, row * p))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect();
    group.bench_function("xlsx_20_pages", |b| {
        b.iter(|| write_xlsx(black_box(&pages)).unwrap());
    });

    let png = encode_png(&synthetic_page(3)).unwrap();
    group.bench_function("pptx_10_slides", |b| {
        b.iter(|| {
            let mut writer = PptxWriter::new();
            for _ in 0..10 {
                writer.add_slide(black_box(&png), 612.0, 792.0).unwrap();
            }
            writer.finish().unwrap()
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_encode_page,
    benchmark_rasterize_archive,
    benchmark_office_writers
);
criterion_main!(benches);
