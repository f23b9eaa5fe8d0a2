//! Extension and content-type inference for converted bytes.
//!
//! Multi-page rasterization silently turns an image request into a zip
//! archive, so the nominal target alone is not enough: the result's magic
//! bytes are checked first.

/// Local-file-header signature that starts every zip archive.
pub const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// Extension used when an image request produced an archive.
pub const ARCHIVE_EXTENSION: &str = ".zip";

/// MIME type used for anything we do not recognise.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Whether `bytes` starts with a zip local-file header.
pub fn is_zip(bytes: &[u8]) -> bool {
    bytes.len() >= ZIP_MAGIC.len() && bytes[..ZIP_MAGIC.len()] == ZIP_MAGIC
}

fn is_image_target(target: &str) -> bool {
    matches!(target, "png" | "jpg" | "jpeg")
}

/// Extension (with leading dot) for a converted result.
pub fn resolve_extension(target: &str, bytes: &[u8]) -> String {
    if is_image_target(target) && is_zip(bytes) {
        return ARCHIVE_EXTENSION.to_string();
    }

    match target {
        "pdf" => ".pdf",
        "docx" => ".docx",
        "xlsx" => ".xlsx",
        "pptx" => ".pptx",
        "png" => ".png",
        "jpg" | "jpeg" => ".jpg",
        other => return format!(".{}", other),
    }
    .to_string()
}

/// MIME type for an extension (with leading dot).
pub fn mime_type_for_extension(extension: &str) -> &'static str {
    match extension {
        ".pdf" => "application/pdf",
        ".docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ".xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ".pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        ".png" => "image/png",
        ".jpg" | ".jpeg" => "image/jpeg",
        ".zip" => "application/zip",
        _ => DEFAULT_MIME_TYPE,
    }
}

/// Resolve both the extension and the MIME type.
pub fn resolve(target: &str, bytes: &[u8]) -> (String, &'static str) {
    let extension = resolve_extension(target, bytes);
    let mime_type = mime_type_for_extension(&extension);
    (extension, mime_type)
}
