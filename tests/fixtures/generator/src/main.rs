//! Test fixture generator for doc-convert.
//!
//! Writes the office documents and images the integration tests convert.
//!
//! Run with: cargo run --package fixture-generator [output-dir]

use anyhow::{Context, Result};
use doc_convert_core::ooxml::PptxWriter;
use doc_convert_core::raster::encode_png;
use docx_rs::{AlignmentType, BreakType, Docx, Paragraph, Run};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgba, RgbaImage};
use rust_xlsxwriter::{Format, Workbook};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("tests/fixtures/output"));
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    println!("Generating test fixtures in {}\n", output_dir.display());

    // Office → PDF inputs
    generate_simple_docx(&output_dir)?;
    generate_multipage_docx(&output_dir)?;
    generate_simple_xlsx(&output_dir)?;
    generate_multisheet_xlsx(&output_dir)?;
    generate_slides_pptx(&output_dir)?;

    // Image → PDF inputs
    generate_photo_png(&output_dir)?;
    generate_photo_jpg(&output_dir)?;

    // Error cases
    generate_corrupt_docx(&output_dir)?;

    println!("\nAll fixtures generated successfully!");
    Ok(())
}

fn announce(output_dir: &Path, name: &str) -> PathBuf {
    let path = output_dir.join(name);
    println!("  Creating: {}", path.display());
    path
}

/// A two-paragraph, single-page document.
fn generate_simple_docx(output_dir: &Path) -> Result<()> {
    let path = announce(output_dir, "simple.docx");

    let docx = Docx::new()
        .add_paragraph(
            Paragraph::new().add_run(Run::new().add_text("Conversion fixture: plain document.")),
        )
        .add_paragraph(
            Paragraph::new().add_run(Run::new().add_text("It fits on a single page.")),
        );

    docx.build().pack(File::create(&path)?)?;
    Ok(())
}

/// Three pages separated by explicit page breaks.
fn generate_multipage_docx(output_dir: &Path) -> Result<()> {
    let path = announce(output_dir, "multipage.docx");

    let mut docx = Docx::new();
    for page in 1..=3 {
        if page > 1 {
            docx = docx
                .add_paragraph(Paragraph::new().add_run(Run::new().add_break(BreakType::Page)));
        }
        docx = docx.add_paragraph(
            Paragraph::new()
                .add_run(Run::new().add_text(format!("Page {}", page)).bold().size(40))
                .align(AlignmentType::Center),
        );
        for line in 1..=5 {
            docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(format!(
                "Line {} of page {}. The rasterizer should emit one image per page.",
                line, page
            ))));
        }
    }

    docx.build().pack(File::create(&path)?)?;
    Ok(())
}

/// One sheet of tabular data.
fn generate_simple_xlsx(output_dir: &Path) -> Result<()> {
    let path = announce(output_dir, "simple.xlsx");

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let bold = Format::new().set_bold();

    for (col, header) in ["Item", "Quantity", "Unit price"].iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, &bold)?;
    }
    let rows = [("Paper", 10.0, 4.5), ("Toner", 2.0, 61.0), ("Staples", 5.0, 1.25)];
    for (i, (item, qty, price)) in rows.iter().enumerate() {
        let row = (i + 1) as u32;
        sheet.write_string(row, 0, *item)?;
        sheet.write_number(row, 1, *qty)?;
        sheet.write_number(row, 2, *price)?;
    }

    workbook.save(&path)?;
    Ok(())
}

/// Several sheets; LibreOffice prints each on its own page.
fn generate_multisheet_xlsx(output_dir: &Path) -> Result<()> {
    let path = announce(output_dir, "multisheet.xlsx");

    let mut workbook = Workbook::new();
    for (name, base) in [("North", 100.0), ("South", 250.0), ("Totals", 350.0)] {
        let sheet = workbook.add_worksheet().set_name(name)?;
        sheet.write_string(0, 0, "Quarter")?;
        sheet.write_string(0, 1, "Units")?;
        for quarter in 0..4u32 {
            sheet.write_string(quarter + 1, 0, format!("Q{}", quarter + 1))?;
            sheet.write_number(quarter + 1, 1, base + quarter as f64 * 10.0)?;
        }
    }

    workbook.save(&path)?;
    Ok(())
}

/// Two image slides.
fn generate_slides_pptx(output_dir: &Path) -> Result<()> {
    let path = announce(output_dir, "slides.pptx");

    let mut writer = PptxWriter::new();
    for color in [Rgba([200, 40, 40, 255]), Rgba([40, 40, 200, 255])] {
        let png = encode_png(&RgbaImage::from_pixel(160, 90, color))?;
        writer.add_slide(&png, 720.0, 405.0)?;
    }

    fs::write(&path, writer.finish()?)?;
    Ok(())
}

/// A gradient, so encoders have something to do.
fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
            255,
        ])
    })
}

fn generate_photo_png(output_dir: &Path) -> Result<()> {
    let path = announce(output_dir, "photo.png");
    fs::write(&path, encode_png(&gradient(240, 160))?)?;
    Ok(())
}

fn generate_photo_jpg(output_dir: &Path) -> Result<()> {
    let path = announce(output_dir, "photo.jpg");
    let rgb = image::DynamicImage::ImageRgba8(gradient(320, 200)).into_rgb8();
    JpegEncoder::new_with_quality(File::create(&path)?, 85).encode_image(&rgb)?;
    Ok(())
}

/// Not a zip at all; the office route should report a tool failure.
fn generate_corrupt_docx(output_dir: &Path) -> Result<()> {
    let path = announce(output_dir, "corrupt.docx");
    fs::write(&path, b"This is not a valid DOCX file.")?;
    Ok(())
}
