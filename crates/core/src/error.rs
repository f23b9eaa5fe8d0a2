//! Error types for document conversion.

use thiserror::Error;
use uuid::Uuid;

/// Broad classification of a [`ConversionError`].
///
/// The HTTP layer maps `UnsupportedConversion` to a client error and everything
/// else to a generic conversion failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The requested format pair is not supported.
    UnsupportedConversion,
    /// The external rendering tool failed, produced nothing, or timed out.
    ExternalToolFailure,
    /// The input could not be parsed, rendered or encoded.
    RenderFailure,
    /// Temp file creation, read or write failed.
    IoFailure,
    /// The host environment is missing something (tool, library, config).
    Environment,
}

/// Main error type for the doc-convert library.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// The (source, target) pair is not in the known route table.
    #[error("Unsupported conversion: {from} -> {to}")]
    UnsupportedConversion { from: String, to: String },

    /// The external rendering process exited non-zero, produced no output, or timed out.
    #[error(
        "External tool failure [{route}] (job {correlation_id}, exit code {exit_code:?}): {diagnostic}"
    )]
    ExternalToolFailure {
        route: String,
        correlation_id: Uuid,
        exit_code: Option<i32>,
        diagnostic: String,
    },

    /// Malformed PDF, zero pages, or a per-page encode error.
    #[error("Render failure: {0}")]
    RenderFailure(String),

    /// Temp file or process I/O failed.
    #[error("I/O failure while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// LibreOffice is not installed or not found in PATH.
    #[error("LibreOffice not found. Please install LibreOffice and ensure 'soffice' is in PATH")]
    OfficeToolNotFound,

    /// The pdfium shared library could not be loaded.
    #[error("Pdfium unavailable: {0}")]
    PdfiumUnavailable(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The admission gate has been closed.
    #[error("Office renderer admission gate is closed")]
    GateClosed,

    /// A blocking conversion task panicked or was cancelled.
    #[error("Conversion task failed: {0}")]
    TaskFailed(String),
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, ConversionError>;

impl ConversionError {
    /// Wrap an I/O error with a short description of what was being attempted.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ConversionError::Io {
            context: context.into(),
            source,
        }
    }

    /// Build an `UnsupportedConversion` from two format tokens.
    pub fn unsupported(from: impl Into<String>, to: impl Into<String>) -> Self {
        ConversionError::UnsupportedConversion {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConversionError::UnsupportedConversion { .. } => ErrorKind::UnsupportedConversion,
            ConversionError::ExternalToolFailure { .. } => ErrorKind::ExternalToolFailure,
            ConversionError::RenderFailure(_) => ErrorKind::RenderFailure,
            ConversionError::Io { .. } => ErrorKind::IoFailure,
            ConversionError::OfficeToolNotFound
            | ConversionError::PdfiumUnavailable(_)
            | ConversionError::InvalidConfig(_)
            | ConversionError::GateClosed
            | ConversionError::TaskFailed(_) => ErrorKind::Environment,
        }
    }

    /// Whether the caller sent something we will never be able to convert.
    pub fn is_client_error(&self) -> bool {
        self.kind() == ErrorKind::UnsupportedConversion
    }

    /// Whether retrying the same request later might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ExternalToolFailure | ErrorKind::IoFailure
        )
    }

    /// Message that is safe to show to an untrusted caller.
    ///
    /// Diagnostics from the rendering tool and file paths stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            ConversionError::UnsupportedConversion { .. } => self.to_string(),
            _ => "Document conversion failed".to_string(),
        }
    }

    /// Attach the dispatch route name to an external tool failure.
    pub fn with_route(self, route_name: &str) -> Self {
        match self {
            ConversionError::ExternalToolFailure {
                correlation_id,
                exit_code,
                diagnostic,
                ..
            } => ConversionError::ExternalToolFailure {
                route: route_name.to_string(),
                correlation_id,
                exit_code,
                diagnostic,
            },
            other => other,
        }
    }
}

impl From<async_channel::RecvError> for ConversionError {
    fn from(_: async_channel::RecvError) -> Self {
        ConversionError::GateClosed
    }
}

impl From<tokio::task::JoinError> for ConversionError {
    fn from(err: tokio::task::JoinError) -> Self {
        ConversionError::TaskFailed(err.to_string())
    }
}
