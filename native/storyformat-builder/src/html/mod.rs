//! HTML Asset Packer
//!
//! Turns an HTML page with local asset references into one self-contained,
//! minified document: images and icons become `data:` URIs, scripts and
//! stylesheets are inlined. A reference that cannot be resolved is left as
//! written and reported as an [`AssetWarning`].

mod inline;
mod serialize;

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::RcDom;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{fs, BuildError, BuildResult};
use inline::AssetInliner;

#[derive(Debug, Clone)]
pub struct PackOptions {
    /// Collapse whitespace, drop comments and minify CSS.
    pub minify: bool,
}

impl Default for PackOptions {
    fn default() -> Self {
        PackOptions { minify: true }
    }
}

/// An asset reference the packer could not inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetWarning {
    pub element: String,
    pub attribute: String,
    pub reference: String,
    pub reason: String,
}

impl fmt::Display for AssetWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{} {}=\"{}\">: {}",
            self.element, self.attribute, self.reference, self.reason
        )
    }
}

#[derive(Debug, Clone)]
pub struct PackedDocument {
    pub html: String,
    pub warnings: Vec<AssetWarning>,
}

/// Packs the HTML file at `path`. References resolve relative to its directory.
pub fn pack_html(path: &Path, options: &PackOptions) -> BuildResult<PackedDocument> {
    let source = fs::read(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let packed = pack_source(&source, base_dir, options).map_err(|e| BuildError::io(path, e))?;
    info!(
        page = %path.display(),
        bytes = packed.html.len(),
        warnings = packed.warnings.len(),
        "packed html"
    );
    Ok(packed)
}

/// Packs an in-memory document.
pub fn pack_source(
    source: &[u8],
    base_dir: &Path,
    options: &PackOptions,
) -> std::io::Result<PackedDocument> {
    let dom = parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut &source[..])?;

    let mut inliner = AssetInliner::new(base_dir);
    let html = serialize::serialize(&dom.document, &mut inliner, options.minify);
    for warning in &inliner.warnings {
        warn!(%warning, "asset not inlined");
    }
    Ok(PackedDocument {
        html,
        warnings: inliner.warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn pack(dir: &Path, html: &str) -> PackedDocument {
        pack_source(html.as_bytes(), dir, &PackOptions::default()).unwrap()
    }

    #[test]
    fn test_structural_minification() {
        let dir = TempDir::new().unwrap();
        let doc = pack(
            dir.path(),
            "<!DOCTYPE html>\n<html>\n  <head>\n    <title> Story </title>\n    <!-- note -->\n  </head>\n  <body>\n    <p>Hello   <b>big</b> <i>world</i></p>\n    <pre>  keep\n   this </pre>\n    {{STORY_DATA}}\n  </body>\n</html>\n",
        );
        assert_eq!(
            doc.html,
            "<!DOCTYPE html><html><head><title>Story</title></head><body><p>Hello <b>big</b> <i>world</i></p><pre>  keep\n   this </pre>{{STORY_DATA}}</body></html>"
        );
        assert!(doc.warnings.is_empty());
    }

    #[test]
    fn test_inlines_local_assets() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("logo.svg"), "<svg/>").unwrap();
        std::fs::write(dir.path().join("app.js"), "window.go();").unwrap();
        std::fs::write(dir.path().join("site.css"), "body {\n  margin: 0;\n}\n").unwrap();

        let doc = pack(
            dir.path(),
            "<html><head><link rel=\"stylesheet\" href=\"site.css\"><link rel=\"icon\" href=\"./logo.svg\"></head><body><img src=\"logo.svg\" alt=\"logo\"><script src=\"app.js\"></script></body></html>",
        );
        assert!(doc.html.contains("<style>body{margin:0}</style>"));
        assert!(doc
            .html
            .contains("<link rel=\"icon\" href=\"data:image/svg+xml;base64,PHN2Zy8+\">"));
        assert!(doc
            .html
            .contains("<img src=\"data:image/svg+xml;base64,PHN2Zy8+\" alt=\"logo\">"));
        assert!(doc.html.contains("<script>window.go();</script>"));
        assert!(doc.warnings.is_empty());
    }

    #[test]
    fn test_only_unresolvable_image_is_kept_with_warning() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("found.png"), [0x89, b'P', b'N', b'G']).unwrap();
        let doc = pack(
            dir.path(),
            "<body><img src=\"found.png\"><img src=\"missing.png\"></body>",
        );
        assert_eq!(doc.html.matches("src=\"data:image/png;base64,").count(), 1);
        assert!(!doc.html.contains("found.png"));
        assert!(doc.html.contains("<img src=\"missing.png\">"));
        assert_eq!(doc.warnings.len(), 1);
        assert_eq!(doc.warnings[0].reference, "missing.png");
        assert!(doc.warnings[0].to_string().contains("missing.png"));
    }

    #[test]
    fn test_remote_reference_untouched_without_warning() {
        let dir = TempDir::new().unwrap();
        let doc = pack(
            dir.path(),
            "<body><script src=\"https://cdn.test/x.js\"></script></body>",
        );
        assert!(doc.html.contains("<script src=\"https://cdn.test/x.js\"></script>"));
        assert!(doc.warnings.is_empty());
    }

    #[test]
    fn test_style_and_script_contents() {
        let dir = TempDir::new().unwrap();
        let doc = pack(
            dir.path(),
            "<head><style>\n a { color : red ; }\n</style><script>if (a  <  b) {  run(); }</script></head><body><div style=\" color : red ; \">x</div></body>",
        );
        assert!(doc.html.contains("<style>a{color:red}</style>"));
        assert!(doc.html.contains("<script>if (a  <  b) {  run(); }</script>"));
        assert!(doc.html.contains("<div style=\"color:red;\">x</div>"));
    }

    #[test]
    fn test_pack_html_reads_file() {
        let dir = TempDir::new().unwrap();
        let page = dir.path().join("index.html");
        std::fs::write(&page, "<p>x</p>").unwrap();
        let doc = pack_html(&page, &PackOptions::default()).unwrap();
        assert!(doc.html.ends_with("<body><p>x</p></body></html>"));

        let err = pack_html(&dir.path().join("nope.html"), &PackOptions::default()).unwrap_err();
        assert!(matches!(err, BuildError::Io { .. }));
    }
}
