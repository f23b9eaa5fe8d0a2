//! `doc-convert`: convert a single document from the command line.
//!
//! A thin shim over [`doc_convert_core::Converter`]: parse flags, build the
//! converter, convert, write the result next to the input.

use anyhow::{bail, Context, Result};
use clap::Parser;
use doc_convert_core::routes::supported_pairs;
use doc_convert_core::{Converter, ConverterConfig};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Office document to PDF (needs LibreOffice)
  doc-convert report.docx --to pdf

  # Every page of a PDF as PNG; several pages produce a zip
  doc-convert slides.pdf --to png --dpi 200

  # Bytes without a useful extension
  doc-convert upload.bin --from pdf --to docx -o upload.docx

  # Settings from a JSON file, flags win over the file
  doc-convert big.xlsx --to pdf --config convert.json --timeout 300

ENVIRONMENT VARIABLES:
  RUST_LOG                Log filter (e.g. doc_convert_core=debug)
  DOC_CONVERT_CONFIG      JSON configuration file
  DOC_CONVERT_SOFFICE     Path to the soffice binary
"#;

/// Convert documents between office, PDF and image formats.
#[derive(Parser, Debug)]
#[command(
    name = "doc-convert",
    version,
    about = "Convert documents between office, PDF and image formats",
    arg_required_else_help = true,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input file.
    #[arg(required_unless_present = "list_formats")]
    input: Option<PathBuf>,

    /// Target format (pdf, docx, xlsx, pptx, png, jpg).
    #[arg(short, long, required_unless_present = "list_formats")]
    to: Option<String>,

    /// Source format; defaults to the input's extension.
    #[arg(long)]
    from: Option<String>,

    /// Output path; defaults to `<stem>.<ext>` next to the input.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON configuration file.
    #[arg(long, env = "DOC_CONVERT_CONFIG")]
    config: Option<PathBuf>,

    /// Rasterization DPI.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=1200))]
    dpi: Option<u32>,

    /// LibreOffice timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Maximum concurrent LibreOffice processes.
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// Path to the soffice binary.
    #[arg(long, env = "DOC_CONVERT_SOFFICE")]
    soffice: Option<PathBuf>,

    /// Print the supported (source, target) pairs and exit.
    #[arg(long)]
    list_formats: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn converter_config(&self) -> Result<ConverterConfig> {
        let mut config = match &self.config {
            Some(path) => ConverterConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ConverterConfig::default(),
        };

        if let Some(dpi) = self.dpi {
            config.raster.dpi = dpi;
        }
        if let Some(secs) = self.timeout {
            config.office.conversion_timeout = Duration::from_secs(secs);
        }
        if let Some(max) = self.max_concurrent {
            config.office.max_concurrent = max;
        }
        if let Some(soffice) = &self.soffice {
            config.office.soffice_path = Some(soffice.clone());
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

/// Where the result goes when `-o` is not given.
fn default_output_path(input: &Path, file_name: &str) -> PathBuf {
    input.with_file_name(file_name)
}

fn format_table() -> String {
    let mut out = String::from("SOURCE  TARGET\n");
    for (source, target) in supported_pairs() {
        out.push_str(&format!("{:<7} {}\n", source, target));
    }
    out
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if cli.list_formats {
        print!("{}", format_table());
        return Ok(());
    }

    let (Some(input), Some(target)) = (cli.input.as_deref(), cli.to.as_deref()) else {
        bail!("an input file and --to are required");
    };

    let converter = Converter::builder()
        .config(cli.converter_config()?)
        .build()
        .context("Failed to initialize converter")?;

    let start = Instant::now();
    let result = match cli.from.as_deref() {
        Some(source) => {
            let bytes = tokio::fs::read(input)
                .await
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let file_name = input
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            converter
                .convert_bytes(bytes, file_name, source, target)
                .await
        }
        None => converter.convert_file(input, target).await,
    }
    .with_context(|| format!("Failed to convert {}", input.display()))?;

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(input, &result.file_name));
    tokio::fs::write(&output, &result.bytes)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    debug!("Converter stats: {:?}", converter.stats());
    eprintln!(
        "{} -> {} ({}, {} bytes) in {:.2?}",
        input.display(),
        output.display(),
        result.mime_type,
        result.bytes.len(),
        start.elapsed()
    );
    Ok(())
}
