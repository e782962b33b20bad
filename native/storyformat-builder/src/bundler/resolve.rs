//! Module resolution.
//!
//! Node-style resolution through `oxc_resolver`, configured for a browser
//! bundle: `package.json` `exports` and `imports` with browser conditions,
//! the `browser` alias field, then `browser`, `module` and `main` entries.

use oxc_resolver::{ResolveError, ResolveOptions};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::trace;

const EXTENSIONS: &[&str] = &[".ts", ".tsx", ".js", ".mjs", ".cjs", ".jsx", ".json"];

/// Conditions matched in `exports` and `imports` maps, in the map's own key order.
const CONDITIONS: &[&str] = &["browser", "import", "module", "default", "require"];

const MAIN_FIELDS: &[&str] = &["browser", "module", "main"];

/// Where a specifier led.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    File(PathBuf),
    /// Mapped to `false` by a `browser` field; bundles as an empty module.
    Ignored,
}

pub struct Resolver {
    inner: oxc_resolver::Resolver,
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Resolver {
    pub fn new() -> Self {
        let options = ResolveOptions {
            extensions: strings(EXTENSIONS),
            // TypeScript sources import siblings by their emitted `.js` name
            extension_alias: vec![(".js".to_string(), strings(&[".ts", ".tsx", ".js"]))],
            condition_names: strings(CONDITIONS),
            main_fields: strings(MAIN_FIELDS),
            alias_fields: vec![vec!["browser".to_string()]],
            ..ResolveOptions::default()
        };
        Resolver {
            inner: oxc_resolver::Resolver::new(options),
        }
    }

    /// Resolves `specifier` from `from_dir` to a file on disk.
    pub fn resolve(&self, specifier: &str, from_dir: &Path) -> Option<PathBuf> {
        match self.resolve_module(specifier, from_dir)? {
            Resolved::File(path) => Some(path),
            Resolved::Ignored => None,
        }
    }

    pub fn resolve_module(&self, specifier: &str, from_dir: &Path) -> Option<Resolved> {
        let from_dir = std::path::absolute(from_dir).unwrap_or_else(|_| from_dir.to_path_buf());
        match self.inner.resolve(&from_dir, specifier) {
            Ok(resolution) => Some(Resolved::File(resolution.into_path_buf())),
            Err(ResolveError::Ignored(_)) => Some(Resolved::Ignored),
            Err(error) => {
                trace!(specifier, from = %from_dir.display(), %error, "unresolved");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str, contents: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        fs::canonicalize(&path).unwrap()
    }

    #[test]
    fn test_relative_with_extension_probing() {
        let dir = TempDir::new().unwrap();
        let target = touch(dir.path(), "src/util.ts", "");
        let index = touch(dir.path(), "src/parts/index.ts", "");

        let resolver = Resolver::new();
        let src = dir.path().join("src");
        assert_eq!(resolver.resolve("./util", &src), Some(target.clone()));
        assert_eq!(resolver.resolve("./util.ts", &src), Some(target.clone()));
        assert_eq!(resolver.resolve("./util.js", &src), Some(target));
        assert_eq!(resolver.resolve("./parts", &src), Some(index));
        assert_eq!(resolver.resolve("./missing", &src), None);
    }

    #[test]
    fn test_node_modules_walk_up_and_main() {
        let dir = TempDir::new().unwrap();
        touch(
            dir.path(),
            "node_modules/codemirror/package.json",
            r#"{"main": "lib/codemirror.js"}"#,
        );
        let main = touch(dir.path(), "node_modules/codemirror/lib/codemirror.js", "");
        let mode = touch(dir.path(), "node_modules/codemirror/mode/xml/xml.js", "");
        let deep = dir.path().join("src/editor/modes");
        fs::create_dir_all(&deep).unwrap();

        let resolver = Resolver::new();
        assert_eq!(resolver.resolve("codemirror", &deep), Some(main));
        assert_eq!(resolver.resolve("codemirror/mode/xml/xml", &deep), Some(mode));
    }

    #[test]
    fn test_exports_conditions_and_patterns() {
        let dir = TempDir::new().unwrap();
        touch(
            dir.path(),
            "node_modules/@scope/lib/package.json",
            r#"{
                "name": "@scope/lib",
                "main": "cjs/index.js",
                "exports": {
                    ".": {"types": "./index.d.ts", "browser": "./browser/index.js", "require": "./cjs/index.js"},
                    "./features/*": "./esm/features/*.js"
                }
            }"#,
        );
        let browser = touch(dir.path(), "node_modules/@scope/lib/browser/index.js", "");
        touch(dir.path(), "node_modules/@scope/lib/cjs/index.js", "");
        let feature = touch(dir.path(), "node_modules/@scope/lib/esm/features/links.js", "");

        let resolver = Resolver::new();
        assert_eq!(resolver.resolve("@scope/lib", dir.path()), Some(browser));
        assert_eq!(
            resolver.resolve("@scope/lib/features/links", dir.path()),
            Some(feature)
        );
        assert_eq!(resolver.resolve("@scope/lib/private", dir.path()), None);
    }

    #[test]
    fn test_browser_field_preferred_over_main() {
        let dir = TempDir::new().unwrap();
        touch(
            dir.path(),
            "node_modules/pkg/package.json",
            r#"{"name": "pkg", "main": "node.js", "browser": "browser.js"}"#,
        );
        touch(dir.path(), "node_modules/pkg/node.js", "");
        let browser = touch(dir.path(), "node_modules/pkg/browser.js", "");
        assert_eq!(Resolver::new().resolve("pkg", dir.path()), Some(browser));
    }

    #[test]
    fn test_browser_field_object_remaps_and_ignores() {
        let dir = TempDir::new().unwrap();
        touch(
            dir.path(),
            "node_modules/pkg/package.json",
            r#"{"name": "pkg", "main": "index.js", "browser": {"./server.js": "./client.js", "fs": false}}"#,
        );
        touch(dir.path(), "node_modules/pkg/index.js", "");
        touch(dir.path(), "node_modules/pkg/server.js", "");
        let client = touch(dir.path(), "node_modules/pkg/client.js", "");

        let resolver = Resolver::new();
        let package_dir = dir.path().join("node_modules/pkg");
        assert_eq!(resolver.resolve("./server.js", &package_dir), Some(client));
        assert_eq!(
            resolver.resolve_module("fs", &package_dir),
            Some(Resolved::Ignored)
        );
        assert_eq!(resolver.resolve("fs", &package_dir), None);
    }

    #[test]
    fn test_package_imports_field() {
        let dir = TempDir::new().unwrap();
        touch(
            dir.path(),
            "package.json",
            r##"{"name": "format", "imports": {"#util": "./src/util.ts"}}"##,
        );
        let util = touch(dir.path(), "src/util.ts", "");
        let from = dir.path().join("src/editor");
        fs::create_dir_all(&from).unwrap();
        assert_eq!(Resolver::new().resolve("#util", &from), Some(util));
    }
}
