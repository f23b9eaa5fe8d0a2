//! Writers for the office containers produced from a PDF.
//!
//! - docx: extracted text, one paragraph per line, page break between pages.
//! - xlsx: one worksheet per page, one row per line.
//! - pptx: one slide per page carrying the rendered page image.

use crate::error::{ConversionError, Result};
use docx_rs::{BreakType, Docx, Paragraph, Run};
use rust_xlsxwriter::Workbook;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// English Metric Units per PDF point.
const EMU_PER_POINT: i64 = 12_700;

/// PowerPoint's accepted slide dimension range, in EMU.
const MIN_SLIDE_EMU: i64 = 914_400;
const MAX_SLIDE_EMU: i64 = 51_206_400;

/// Worksheet width limit in Excel.
const MAX_XLSX_COLUMNS: usize = 16_384;

fn render_failure(what: &str, err: impl std::fmt::Display) -> ConversionError {
    ConversionError::RenderFailure(format!("Failed to write {}: {}", what, err))
}

/// Drop characters XML 1.0 cannot carry. Tabs survive.
fn xml_text(line: &str) -> String {
    line.chars()
        .filter(|&c| c == '\t' || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}'))
        .collect()
}

/// Build a Word document from per-page text.
pub fn write_docx(pages: &[String]) -> Result<Vec<u8>> {
    let mut docx = Docx::new();

    for (index, text) in pages.iter().enumerate() {
        for line in text.lines() {
            docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(xml_text(line))));
        }
        if index + 1 < pages.len() {
            docx = docx.add_paragraph(
                Paragraph::new().add_run(Run::new().add_break(BreakType::Page)),
            );
        }
    }

    let mut buffer = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buffer)
        .map_err(|e| render_failure("docx", e))?;
    Ok(buffer.into_inner())
}

/// Split a text line into cells on runs of two or more spaces or on tabs.
pub fn split_columns(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut spaces = 0;

    for ch in line.chars() {
        match ch {
            '\t' => {
                cells.push(std::mem::take(&mut current));
                spaces = 0;
            }
            ' ' => spaces += 1,
            _ => {
                if spaces >= 2 && !current.is_empty() {
                    cells.push(std::mem::take(&mut current));
                } else if spaces == 1 && !current.is_empty() {
                    current.push(' ');
                }
                spaces = 0;
                current.push(ch);
            }
        }
    }
    if !current.is_empty() {
        cells.push(current);
    }
    cells
}

/// Fold cells past `max` into the last column so a line never overflows the sheet.
fn fit_columns(mut cells: Vec<String>, max: usize) -> Vec<String> {
    if max == 0 || cells.len() <= max {
        return cells;
    }
    let overflow = cells.split_off(max - 1).join("  ");
    cells.push(overflow);
    cells
}

/// Build a workbook with one worksheet per page.
pub fn write_xlsx(pages: &[String]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();

    for (index, text) in pages.iter().enumerate() {
        let sheet = workbook.add_worksheet();
        sheet
            .set_name(format!("Page {}", index + 1))
            .map_err(|e| render_failure("xlsx", e))?;

        for (row, line) in text.lines().enumerate() {
            let cells = fit_columns(split_columns(line), MAX_XLSX_COLUMNS);
            for (col, cell) in cells.into_iter().enumerate() {
                if cell.is_empty() {
                    continue;
                }
                sheet
                    .write_string(row as u32, col as u16, cell)
                    .map_err(|e| render_failure("xlsx", e))?;
            }
        }
    }

    workbook
        .save_to_buffer()
        .map_err(|e| render_failure("xlsx", e))
}

fn points_to_emu(points: f32) -> i64 {
    (points as f64 * EMU_PER_POINT as f64).round() as i64
}

/// Streams rendered pages into a PresentationML package.
///
/// The slide size is fixed by the first page; later pages are scaled to fit
/// and centred.
pub struct PptxWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    slide_size: Option<(i64, i64)>,
    slides: usize,
}

impl Default for PptxWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PptxWriter {
    pub fn new() -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            slide_size: None,
            slides: 0,
        }
    }

    fn write_part(&mut self, name: &str, data: &[u8], method: CompressionMethod) -> Result<()> {
        let options = SimpleFileOptions::default().compression_method(method);
        self.zip
            .start_file(name, options)
            .map_err(|e| render_failure(name, e))?;
        self.zip
            .write_all(data)
            .map_err(|e| render_failure(name, e))
    }

    fn write_xml(&mut self, name: &str, xml: &str) -> Result<()> {
        self.write_part(name, xml.as_bytes(), CompressionMethod::Deflated)
    }

    /// Add one slide showing `png` for a page of `width_pt` × `height_pt`.
    pub fn add_slide(&mut self, png: &[u8], width_pt: f32, height_pt: f32) -> Result<()> {
        let page_cx = points_to_emu(width_pt).max(1);
        let page_cy = points_to_emu(height_pt).max(1);
        let (slide_cx, slide_cy) = *self.slide_size.get_or_insert((
            page_cx.clamp(MIN_SLIDE_EMU, MAX_SLIDE_EMU),
            page_cy.clamp(MIN_SLIDE_EMU, MAX_SLIDE_EMU),
        ));

        let scale = f64::min(
            slide_cx as f64 / page_cx as f64,
            slide_cy as f64 / page_cy as f64,
        );
        let cx = (page_cx as f64 * scale).round() as i64;
        let cy = (page_cy as f64 * scale).round() as i64;
        let x = (slide_cx - cx) / 2;
        let y = (slide_cy - cy) / 2;

        self.slides += 1;
        let n = self.slides;
        self.write_part(&format!("ppt/media/image{}.png", n), png, CompressionMethod::Stored)?;
        self.write_xml(&format!("ppt/slides/slide{}.xml", n), &slide_xml(n, x, y, cx, cy))?;
        self.write_xml(
            &format!("ppt/slides/_rels/slide{}.xml.rels", n),
            &slide_rels_xml(n),
        )?;
        Ok(())
    }

    /// Write the package-level parts and return the finished bytes.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        if self.slides == 0 {
            return Err(ConversionError::RenderFailure(
                "presentation has no slides".to_string(),
            ));
        }
        let (cx, cy) = self.slide_size.unwrap_or((MIN_SLIDE_EMU, MIN_SLIDE_EMU));
        let slides = self.slides;

        self.write_xml("[Content_Types].xml", &content_types_xml(slides))?;
        self.write_xml("_rels/.rels", ROOT_RELS)?;
        self.write_xml("ppt/presentation.xml", &presentation_xml(slides, cx, cy))?;
        self.write_xml(
            "ppt/_rels/presentation.xml.rels",
            &presentation_rels_xml(slides),
        )?;
        self.write_xml("ppt/slideMasters/slideMaster1.xml", SLIDE_MASTER)?;
        self.write_xml(
            "ppt/slideMasters/_rels/slideMaster1.xml.rels",
            SLIDE_MASTER_RELS,
        )?;
        self.write_xml("ppt/slideLayouts/slideLayout1.xml", SLIDE_LAYOUT)?;
        self.write_xml(
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
            SLIDE_LAYOUT_RELS,
        )?;
        self.write_xml("ppt/theme/theme1.xml", THEME)?;

        let cursor = self
            .zip
            .finish()
            .map_err(|e| render_failure("pptx", e))?;
        Ok(cursor.into_inner())
    }
}

const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

fn content_types_xml(slides: usize) -> String {
    let overrides: String = (1..=slides)
        .map(|n| {
            format!(
                r#"<Override PartName="/ppt/slides/slide{}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#,
                n
            )
        })
        .collect();
    format!(
        r#"{XML_HEADER}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/><Override PartName="/ppt/slideMasters/slideMaster1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml"/><Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/><Override PartName="/ppt/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/>{overrides}</Types>"#
    )
}

const ROOT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="ppt/presentation.xml"/>"#,
    r#"</Relationships>"#
);

// rId1 = master, rId2 = theme, slides start at rId3.
fn presentation_xml(slides: usize, cx: i64, cy: i64) -> String {
    let ids: String = (1..=slides)
        .map(|n| format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 255 + n, n + 2))
        .collect();
    format!(
        r#"{XML_HEADER}<p:presentation xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst>{ids}</p:sldIdLst><p:sldSz cx="{cx}" cy="{cy}"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#
    )
}

fn presentation_rels_xml(slides: usize) -> String {
    let slide_rels: String = (1..=slides)
        .map(|n| {
            format!(
                r#"<Relationship Id="rId{}" Type="{REL_BASE}/slide" Target="slides/slide{}.xml"/>"#,
                n + 2,
                n
            )
        })
        .collect();
    format!(
        r#"{XML_HEADER}<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{REL_BASE}/slideMaster" Target="slideMasters/slideMaster1.xml"/><Relationship Id="rId2" Type="{REL_BASE}/theme" Target="theme/theme1.xml"/>{slide_rels}</Relationships>"#
    )
}

fn slide_xml(n: usize, x: i64, y: i64, cx: i64, cy: i64) -> String {
    format!(
        r#"{XML_HEADER}<p:sld xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/><p:pic><p:nvPicPr><p:cNvPr id="2" name="Page {n}"/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rId2"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic></p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#
    )
}

fn slide_rels_xml(n: usize) -> String {
    format!(
        r#"{XML_HEADER}<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{REL_BASE}/slideLayout" Target="../slideLayouts/slideLayout1.xml"/><Relationship Id="rId2" Type="{REL_BASE}/image" Target="../media/image{n}.png"/></Relationships>"#
    )
}

const SLIDE_MASTER: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<p:sldMaster xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">"#,
    r#"<p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree></p:cSld>"#,
    r#"<p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/>"#,
    r#"<p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst>"#,
    r#"</p:sldMaster>"#
);

const SLIDE_MASTER_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout1.xml"/>"#,
    r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme" Target="../theme/theme1.xml"/>"#,
    r#"</Relationships>"#
);

const SLIDE_LAYOUT: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<p:sldLayout xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" type="blank" preserve="1">"#,
    r#"<p:cSld name="Blank"><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree></p:cSld>"#,
    r#"<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr>"#,
    r#"</p:sldLayout>"#
);

const SLIDE_LAYOUT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="../slideMasters/slideMaster1.xml"/>"#,
    r#"</Relationships>"#
);

const THEME: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Office Theme"><a:themeElements>"#,
    r#"<a:clrScheme name="Office">"#,
    r#"<a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1><a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1>"#,
    r#"<a:dk2><a:srgbClr val="44546A"/></a:dk2><a:lt2><a:srgbClr val="E7E6E6"/></a:lt2>"#,
    r#"<a:accent1><a:srgbClr val="4472C4"/></a:accent1><a:accent2><a:srgbClr val="ED7D31"/></a:accent2>"#,
    r#"<a:accent3><a:srgbClr val="A5A5A5"/></a:accent3><a:accent4><a:srgbClr val="FFC000"/></a:accent4>"#,
    r#"<a:accent5><a:srgbClr val="5B9BD5"/></a:accent5><a:accent6><a:srgbClr val="70AD47"/></a:accent6>"#,
    r#"<a:hlink><a:srgbClr val="0563C1"/></a:hlink><a:folHlink><a:srgbClr val="954F72"/></a:folHlink>"#,
    r#"</a:clrScheme>"#,
    r#"<a:fontScheme name="Office"><a:majorFont><a:latin typeface="Calibri Light"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont>"#,
    r#"<a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont></a:fontScheme>"#,
    r#"<a:fmtScheme name="Office">"#,
    r#"<a:fillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:fillStyleLst>"#,
    r#"<a:lnStyleLst><a:ln w="6350"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="12700"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="19050"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln></a:lnStyleLst>"#,
    r#"<a:effectStyleLst><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle></a:effectStyleLst>"#,
    r#"<a:bgFillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:bgFillStyleLst>"#,
    r#"</a:fmtScheme></a:themeElements></a:theme>"#
);
