//! Asset lookup for the HTML packer.

use std::path::PathBuf;

use super::AssetWarning;
use crate::bundler::text::data_url;
use crate::bundler::Resolver;

/// True for references the packer never touches: remote URLs and data URIs.
pub(crate) fn is_remote(reference: &str) -> bool {
    let lower = reference.trim_start().to_ascii_lowercase();
    lower.starts_with("http:")
        || lower.starts_with("https:")
        || lower.starts_with("//")
        || lower.starts_with("data:")
}

pub(crate) struct AssetInliner {
    base_dir: PathBuf,
    resolver: Resolver,
    pub warnings: Vec<AssetWarning>,
}

impl AssetInliner {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        AssetInliner {
            base_dir: base_dir.into(),
            resolver: Resolver::new(),
            warnings: Vec::new(),
        }
    }

    /// Reads `reference` and returns it as a `data:` URI.
    pub fn data_uri(&mut self, element: &str, attribute: &str, reference: &str) -> Option<String> {
        let path = self.locate(element, attribute, reference)?;
        match std::fs::read(&path) {
            Ok(bytes) => Some(data_url(&path, &bytes)),
            Err(e) => {
                self.warn(element, attribute, reference, e.to_string());
                None
            }
        }
    }

    /// Reads `reference` as UTF-8 text.
    pub fn text(&mut self, element: &str, attribute: &str, reference: &str) -> Option<String> {
        let path = self.locate(element, attribute, reference)?;
        match std::fs::read_to_string(&path) {
            Ok(text) => Some(crate::bundler::text::strip_bom(&text).to_string()),
            Err(e) => {
                self.warn(element, attribute, reference, e.to_string());
                None
            }
        }
    }

    fn locate(&mut self, element: &str, attribute: &str, reference: &str) -> Option<PathBuf> {
        if is_remote(reference) {
            return None;
        }
        let clean = reference
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim();
        if clean.is_empty() {
            return None;
        }

        let local = self.base_dir.join(clean.trim_start_matches('/'));
        if local.is_file() {
            return Some(local);
        }
        let is_path_like = clean.starts_with('.') || clean.starts_with('/');
        if !is_path_like {
            if let Some(found) = self.resolver.resolve(clean, &self.base_dir) {
                return Some(found);
            }
        }
        self.warn(element, attribute, reference, "file not found".to_string());
        None
    }

    fn warn(&mut self, element: &str, attribute: &str, reference: &str, reason: String) {
        self.warnings.push(AssetWarning {
            element: element.to_string(),
            attribute: attribute.to_string(),
            reference: reference.to_string(),
            reason,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_remote_references_are_skipped_silently() {
        let mut inliner = AssetInliner::new("/nowhere");
        for reference in [
            "http://x.test/a.png",
            "HTTPS://x.test/a.png",
            "//cdn.test/a.js",
            "data:image/png;base64,AAAA",
        ] {
            assert!(inliner.data_uri("img", "src", reference).is_none());
        }
        assert!(inliner.warnings.is_empty());
    }

    #[test]
    fn test_missing_file_warns() {
        let dir = TempDir::new().unwrap();
        let mut inliner = AssetInliner::new(dir.path());
        assert!(inliner.text("script", "src", "./missing.js").is_none());
        assert_eq!(inliner.warnings.len(), 1);
        assert_eq!(inliner.warnings[0].reference, "./missing.js");
        assert_eq!(inliner.warnings[0].element, "script");
    }

    #[test]
    fn test_query_and_fragment_are_ignored() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.svg"), "<svg/>").unwrap();
        let mut inliner = AssetInliner::new(dir.path());
        let uri = inliner.data_uri("img", "src", "a.svg?v=2#top").unwrap();
        assert!(uri.starts_with("data:image/svg+xml;base64,"));
    }

    #[test]
    fn test_bare_reference_resolves_through_node_modules() {
        let dir = TempDir::new().unwrap();
        let css = dir.path().join("node_modules/pkg/dist/pkg.css");
        std::fs::create_dir_all(css.parent().unwrap()).unwrap();
        std::fs::write(&css, "a{}").unwrap();
        let page_dir = dir.path().join("src/player");
        std::fs::create_dir_all(&page_dir).unwrap();

        let mut inliner = AssetInliner::new(&page_dir);
        assert_eq!(
            inliner.text("link", "href", "pkg/dist/pkg.css").as_deref(),
            Some("a{}")
        );
    }
}
