//! Configuration and request/result types for document conversion.

use crate::error::{ConversionError, Result};
use crate::routes::normalize_format;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the LibreOffice rendering client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OfficeConfig {
    /// Maximum number of LibreOffice processes running at once.
    /// Default: number of CPU cores, capped at 4.
    pub max_concurrent: usize,

    /// Timeout for individual document conversions.
    /// Default: 120 seconds.
    pub conversion_timeout: Duration,

    /// Path to soffice binary. If None, searches well-known locations and PATH.
    pub soffice_path: Option<PathBuf>,

    /// Directory for temporary files.
    /// Default: system temp directory.
    pub temp_dir: Option<PathBuf>,
}

impl Default for OfficeConfig {
    fn default() -> Self {
        Self {
            max_concurrent: num_cpus::get().clamp(1, 4),
            conversion_timeout: Duration::from_secs(120),
            soffice_path: None,
            temp_dir: None,
        }
    }
}

impl OfficeConfig {
    /// Create a new office config with the given admission gate size.
    pub fn with_max_concurrent(max_concurrent: usize) -> Self {
        Self {
            max_concurrent,
            ..Default::default()
        }
    }

    /// Set the conversion timeout.
    pub fn conversion_timeout(mut self, timeout: Duration) -> Self {
        self.conversion_timeout = timeout;
        self
    }

    /// Set the temporary directory.
    pub fn temp_dir(mut self, dir: PathBuf) -> Self {
        self.temp_dir = Some(dir);
        self
    }

    /// Set the soffice binary path.
    pub fn soffice_path(mut self, path: PathBuf) -> Self {
        self.soffice_path = Some(path);
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(ConversionError::InvalidConfig(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.conversion_timeout.is_zero() {
            return Err(ConversionError::InvalidConfig(
                "conversion_timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for PDF page rasterization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterConfig {
    /// Output DPI (dots per inch).
    /// Default: 150.
    pub dpi: u32,

    /// JPEG quality (1-100).
    /// Default: 90.
    pub jpeg_quality: u8,

    /// Colour transparent areas are blended onto.
    /// Default: white (255, 255, 255).
    pub background_color: (u8, u8, u8),

    /// Name multi-page archive entries `page_01`, `page_02`, ... instead of
    /// `page_1`, `page_2`, ... so they sort lexicographically.
    /// Default: false.
    pub zero_pad_entry_names: bool,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            dpi: 150,
            jpeg_quality: 90,
            background_color: (255, 255, 255),
            zero_pad_entry_names: false,
        }
    }
}

impl RasterConfig {
    /// Create a raster config with specified DPI.
    pub fn with_dpi(dpi: u32) -> Self {
        Self {
            dpi,
            ..Default::default()
        }
    }

    /// Set JPEG quality, clamped to 1-100.
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Set the background colour.
    pub fn background_color(mut self, rgb: (u8, u8, u8)) -> Self {
        self.background_color = rgb;
        self
    }

    /// Enable zero-padded archive entry names.
    pub fn zero_pad_entry_names(mut self, enabled: bool) -> Self {
        self.zero_pad_entry_names = enabled;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.dpi == 0 || self.dpi > 1200 {
            return Err(ConversionError::InvalidConfig(
                "dpi must be between 1 and 1200".to_string(),
            ));
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(ConversionError::InvalidConfig(
                "jpeg_quality must be between 1 and 100".to_string(),
            ));
        }
        Ok(())
    }
}

/// Combined configuration for the converter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Office rendering configuration.
    pub office: OfficeConfig,

    /// Rasterization configuration.
    pub raster: RasterConfig,
}

impl ConverterConfig {
    /// Create a new converter config with specified gate size and DPI.
    pub fn new(max_concurrent: usize, dpi: u32) -> Self {
        Self {
            office: OfficeConfig::with_max_concurrent(max_concurrent),
            raster: RasterConfig::with_dpi(dpi),
        }
    }

    /// Parse a JSON config. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ConversionError::InvalidConfig(format!("bad config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConversionError::io(format!("reading config {}", path.display()), e))?;
        Self::from_json_str(&json)
    }

    /// Validate the entire configuration.
    pub fn validate(&self) -> Result<()> {
        self.office.validate()?;
        self.raster.validate()?;
        Ok(())
    }
}

/// A single conversion request.
///
/// Formats are normalized once, here; the fields are private so a request can
/// never reach the dispatcher un-normalized.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    input: Vec<u8>,
    file_name: String,
    source_format: String,
    target_format: String,
}

impl ConversionRequest {
    /// Create a new conversion request.
    pub fn new(
        input: Vec<u8>,
        file_name: impl Into<String>,
        source_format: &str,
        target_format: &str,
    ) -> Self {
        Self {
            input,
            file_name: file_name.into(),
            source_format: normalize_format(source_format),
            target_format: normalize_format(target_format),
        }
    }

    /// Create a request whose source format is taken from the file name's extension.
    pub fn from_file_name(
        input: Vec<u8>,
        file_name: impl Into<String>,
        target_format: &str,
    ) -> Self {
        let file_name = file_name.into();
        let source = Path::new(&file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string();
        Self::new(input, file_name, &source, target_format)
    }

    /// The uploaded bytes.
    pub fn input(&self) -> &[u8] {
        &self.input
    }

    /// Take ownership of the uploaded bytes.
    pub fn into_input(self) -> Vec<u8> {
        self.input
    }

    /// Original file name as uploaded.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Normalized source format token.
    pub fn source_format(&self) -> &str {
        &self.source_format
    }

    /// Normalized target format token.
    pub fn target_format(&self) -> &str {
        &self.target_format
    }

    /// File stem used to name the converted result.
    pub fn output_stem(&self) -> String {
        Path::new(&self.file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("output")
            .to_string()
    }
}

/// The converted bytes plus how to name and serve them.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    /// Converted document bytes.
    pub bytes: Vec<u8>,

    /// Resolved extension including the leading dot (e.g. `.zip` for multi-page images).
    pub extension: String,

    /// MIME type for the resolved extension.
    pub mime_type: &'static str,

    /// Suggested download name: original stem plus resolved extension.
    pub file_name: String,
}

/// One encoded page of a rasterized document.
#[derive(Debug, Clone)]
pub struct RasterPage {
    /// Page index (0-based).
    pub index: usize,

    /// Encoded image data.
    pub data: Vec<u8>,
}

impl RasterPage {
    /// Page number (1-based).
    pub fn page_number(&self) -> usize {
        self.index + 1
    }
}

/// Result of a batch conversion operation.
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// Successfully converted files.
    pub successful: Vec<ConversionResult>,

    /// Failed conversions.
    pub failed: Vec<FailedConversion>,

    /// Total processing time.
    pub total_duration: Duration,
}

/// Information about a failed conversion.
#[derive(Debug, Clone)]
pub struct FailedConversion {
    /// Original file name.
    pub file_name: String,

    /// Error message.
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    // OfficeConfig tests
    #[test]
    fn test_office_config_defaults() {
        let config = OfficeConfig::default();
        assert!(config.max_concurrent >= 1 && config.max_concurrent <= 4);
        assert_eq!(config.conversion_timeout.as_secs(), 120);
        assert!(config.temp_dir.is_none());
        assert!(config.soffice_path.is_none());
    }

    #[test]
    fn test_office_config_builder_pattern() {
        let config = OfficeConfig::with_max_concurrent(2)
            .conversion_timeout(Duration::from_secs(30))
            .soffice_path(PathBuf::from("/opt/lo/soffice"));

        assert_eq!(config.max_concurrent, 2);
        assert_eq!(config.conversion_timeout.as_secs(), 30);
        assert_eq!(config.soffice_path, Some(PathBuf::from("/opt/lo/soffice")));
    }

    #[test]
    fn test_office_config_validation() {
        assert!(OfficeConfig::with_max_concurrent(1).validate().is_ok());
        assert!(OfficeConfig::with_max_concurrent(0).validate().is_err());

        let config = OfficeConfig::default().conversion_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    // RasterConfig tests
    #[test]
    fn test_raster_config_defaults() {
        let config = RasterConfig::default();
        assert_eq!(config.dpi, 150);
        assert_eq!(config.jpeg_quality, 90);
        assert_eq!(config.background_color, (255, 255, 255));
        assert!(!config.zero_pad_entry_names);
    }

    #[test]
    fn test_raster_config_jpeg_quality_clamped() {
        assert_eq!(RasterConfig::default().jpeg_quality(0).jpeg_quality, 1);
        assert_eq!(RasterConfig::default().jpeg_quality(250).jpeg_quality, 100);
    }

    #[test]
    fn test_raster_config_validation() {
        assert!(RasterConfig::with_dpi(300).validate().is_ok());
        assert!(RasterConfig::with_dpi(0).validate().is_err());
        assert!(RasterConfig::with_dpi(1201).validate().is_err());

        let mut config = RasterConfig::default();
        config.jpeg_quality = 0;
        assert!(config.validate().is_err());
    }

    // ConverterConfig tests
    #[test]
    fn test_converter_config_new() {
        let config = ConverterConfig::new(3, 96);
        assert_eq!(config.office.max_concurrent, 3);
        assert_eq!(config.raster.dpi, 96);
    }

    #[test]
    fn test_converter_config_from_partial_json() {
        let config = ConverterConfig::from_json_str(
            r#"{ "office": { "max_concurrent": 2 }, "raster": { "dpi": 72, "zero_pad_entry_names": true } }"#,
        )
        .unwrap();
        assert_eq!(config.office.max_concurrent, 2);
        assert_eq!(config.office.conversion_timeout.as_secs(), 120);
        assert_eq!(config.raster.dpi, 72);
        assert!(config.raster.zero_pad_entry_names);
        assert_eq!(config.raster.jpeg_quality, 90);
    }

    #[test]
    fn test_converter_config_json_is_validated() {
        let result = ConverterConfig::from_json_str(r#"{ "raster": { "dpi": 0 } }"#);
        assert!(matches!(result, Err(ConversionError::InvalidConfig(_))));

        let result = ConverterConfig::from_json_str("not json");
        assert!(matches!(result, Err(ConversionError::InvalidConfig(_))));
    }

    #[test]
    fn test_converter_config_from_missing_file() {
        let result = ConverterConfig::from_json_file(Path::new("/nonexistent/doc-convert.json"));
        assert!(matches!(result, Err(ConversionError::Io { .. })));
    }

    // ConversionRequest tests
    #[test]
    fn test_conversion_request_normalizes_formats() {
        let request = ConversionRequest::new(vec![1, 2, 3], "Report.DOCX", ".DOCX", "PDF");
        assert_eq!(request.source_format(), "docx");
        assert_eq!(request.target_format(), "pdf");
        assert_eq!(request.file_name(), "Report.DOCX");
        assert_eq!(request.input(), &[1, 2, 3]);
    }

    #[test]
    fn test_conversion_request_from_file_name() {
        let request = ConversionRequest::from_file_name(vec![], "scan.JPEG", ".pdf");
        assert_eq!(request.source_format(), "jpeg");
        assert_eq!(request.target_format(), "pdf");

        let request = ConversionRequest::from_file_name(vec![], "no_extension", "pdf");
        assert_eq!(request.source_format(), "");
    }

    #[test]
    fn test_conversion_request_output_stem() {
        let request = ConversionRequest::new(vec![], "path/to/quarterly.xlsx", "xlsx", "pdf");
        assert_eq!(request.output_stem(), "quarterly");

        let request = ConversionRequest::new(vec![], "", "xlsx", "pdf");
        assert_eq!(request.output_stem(), "output");
    }

    #[test]
    fn test_raster_page_number_is_one_based() {
        let page = RasterPage {
            index: 0,
            data: vec![0x89, 0x50, 0x4E, 0x47],
        };
        assert_eq!(page.page_number(), 1);
    }
}
