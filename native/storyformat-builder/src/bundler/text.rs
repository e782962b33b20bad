//! Text helpers shared by the loaders and the HTML packer.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::Path;

const BOM: char = '\u{feff}';

pub fn strip_bom(source: &str) -> &str {
    source.strip_prefix(BOM).unwrap_or(source)
}

/// Media type guessed from the file extension.
pub fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "avif" => "image/avif",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "css" => "text/css",
        "js" | "mjs" | "cjs" => "text/javascript",
        "json" => "application/json",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

pub fn data_url(path: &Path, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type(path), STANDARD.encode(bytes))
}

/// Renders `text` as a double-quoted JS string literal.
pub fn js_string(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}

/// Module body for the text and data-URL loaders.
pub fn string_module(text: &str) -> String {
    format!("module.exports = {};\n", js_string(text))
}
