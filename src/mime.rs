//! Content types for upload parts.
//!
//! The device serves uploaded website folders as static files, so the part
//! type matters for anything under a site directory.

/// Pick the multipart content type for an upload.
///
/// Magic bytes win; otherwise the extension decides, and unknown extensions
/// that look like text are sent as `text/plain`.
pub fn content_type_for(buffer: &[u8], upload_name: &str) -> &'static str {
    if let Some(kind) = infer::get(buffer) {
        return kind.mime_type();
    }
    let guessed = guess_from_extension(upload_name);
    if guessed == OCTET_STREAM && is_probably_text(buffer) {
        return "text/plain";
    }
    guessed
}

const OCTET_STREAM: &str = "application/octet-stream";

fn guess_from_extension(upload_name: &str) -> &'static str {
    let ext = std::path::Path::new(upload_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "py" => "text/x-python",
        "mpy" => OCTET_STREAM,
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "application/javascript",
        "json" => "application/json",
        "txt" | "cfg" | "ini" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        _ => OCTET_STREAM,
    }
}

/// NUL bytes or a high share of control characters mean binary.
pub fn is_probably_text(buffer: &[u8]) -> bool {
    if buffer.is_empty() {
        return true;
    }
    if buffer.contains(&0) || std::str::from_utf8(buffer).is_err() {
        return false;
    }

    let control_count = buffer
        .iter()
        .filter(|&&b| b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r'))
        .count();

    control_count * 10 <= buffer.len()
}
