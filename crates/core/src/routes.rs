//! Format tokens and the static (source, target) → route table.

use crate::error::{ConversionError, Result};
use std::fmt;

/// Lower-case a format token and strip its leading dot.
///
/// Idempotent: `normalize_format(normalize_format(x)) == normalize_format(x)`.
pub fn normalize_format(format: &str) -> String {
    format.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Every format the dispatcher knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    Doc,
    Docx,
    Xls,
    Xlsx,
    Ppt,
    Pptx,
    Pdf,
    Png,
    Jpg,
    Jpeg,
}

impl DocumentFormat {
    /// Parse a normalized format token.
    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "doc" => Self::Doc,
            "docx" => Self::Docx,
            "xls" => Self::Xls,
            "xlsx" => Self::Xlsx,
            "ppt" => Self::Ppt,
            "pptx" => Self::Pptx,
            "pdf" => Self::Pdf,
            "png" => Self::Png,
            "jpg" => Self::Jpg,
            "jpeg" => Self::Jpeg,
            _ => return None,
        })
    }

    /// The normalized token for this format.
    pub fn token(&self) -> &'static str {
        match self {
            Self::Doc => "doc",
            Self::Docx => "docx",
            Self::Xls => "xls",
            Self::Xlsx => "xlsx",
            Self::Ppt => "ppt",
            Self::Pptx => "pptx",
            Self::Pdf => "pdf",
            Self::Png => "png",
            Self::Jpg => "jpg",
            Self::Jpeg => "jpeg",
        }
    }
}

/// Office formats the PDF engine can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OfficeFormat {
    Docx,
    Xlsx,
    Pptx,
}

/// Image encodings the rasterizer can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    /// Extension used for archive entries (no leading dot).
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }
}

/// Which conversion path handles a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// External headless renderer.
    OfficeToPdf,
    /// Direct PDF-library conversion to an office container.
    PdfToOffice(OfficeFormat),
    /// Page rasterization.
    PdfToImage(ImageFormat),
    /// Single-page PDF assembly around an image.
    ImageToPdf,
}

impl Route {
    /// Stable name used in logs and error annotations.
    pub fn name(&self) -> &'static str {
        match self {
            Route::OfficeToPdf => "office-to-pdf",
            Route::PdfToOffice(_) => "pdf-to-office",
            Route::PdfToImage(_) => "pdf-to-image",
            Route::ImageToPdf => "image-to-pdf",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversionPair {
    pub source: DocumentFormat,
    pub target: DocumentFormat,
}

impl ConversionPair {
    /// Build a pair from two normalized tokens; unknown tokens are unsupported.
    pub fn from_tokens(source: &str, target: &str) -> Result<Self> {
        match (
            DocumentFormat::from_token(source),
            DocumentFormat::from_token(target),
        ) {
            (Some(source), Some(target)) => Ok(Self { source, target }),
            _ => Err(ConversionError::unsupported(source, target)),
        }
    }

    /// Look up the route for this pair.
    pub fn route(&self) -> Result<Route> {
        ROUTES
            .iter()
            .find(|((source, target), _)| *source == self.source && *target == self.target)
            .map(|(_, route)| *route)
            .ok_or_else(|| ConversionError::unsupported(self.source.token(), self.target.token()))
    }
}

use DocumentFormat as F;

/// Every supported conversion. Anything not listed is unsupported.
pub const ROUTES: &[((DocumentFormat, DocumentFormat), Route)] = &[
    ((F::Docx, F::Pdf), Route::OfficeToPdf),
    ((F::Doc, F::Pdf), Route::OfficeToPdf),
    ((F::Xlsx, F::Pdf), Route::OfficeToPdf),
    ((F::Xls, F::Pdf), Route::OfficeToPdf),
    ((F::Pptx, F::Pdf), Route::OfficeToPdf),
    ((F::Ppt, F::Pdf), Route::OfficeToPdf),
    ((F::Pdf, F::Docx), Route::PdfToOffice(OfficeFormat::Docx)),
    ((F::Pdf, F::Xlsx), Route::PdfToOffice(OfficeFormat::Xlsx)),
    ((F::Pdf, F::Pptx), Route::PdfToOffice(OfficeFormat::Pptx)),
    ((F::Pdf, F::Png), Route::PdfToImage(ImageFormat::Png)),
    ((F::Pdf, F::Jpg), Route::PdfToImage(ImageFormat::Jpeg)),
    ((F::Pdf, F::Jpeg), Route::PdfToImage(ImageFormat::Jpeg)),
    ((F::Jpg, F::Pdf), Route::ImageToPdf),
    ((F::Jpeg, F::Pdf), Route::ImageToPdf),
    ((F::Png, F::Pdf), Route::ImageToPdf),
];

/// Resolve the route for two normalized format tokens.
pub fn route_for(source: &str, target: &str) -> Result<Route> {
    ConversionPair::from_tokens(source, target)?.route()
}

/// All supported pairs as `(source, target)` tokens.
pub fn supported_pairs() -> impl Iterator<Item = (&'static str, &'static str)> {
    ROUTES
        .iter()
        .map(|((source, target), _)| (source.token(), target.token()))
}
