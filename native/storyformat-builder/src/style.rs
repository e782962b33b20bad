//! Style Minification Plugin
//!
//! The default load path for every bundled file: reads it from disk and, for
//! stylesheets, hands the bundler minified CSS instead of the raw text.

use std::path::Path;

use crate::bundler::{LoadArgs, LoadResult, Plugin};
use crate::css;
use crate::error::{fs, BuildResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct StyleMinifyPlugin;

fn is_stylesheet(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "css")
}

impl Plugin for StyleMinifyPlugin {
    fn name(&self) -> &str {
        "style-minify"
    }

    fn on_load(&self, args: &LoadArgs<'_>) -> BuildResult<Option<LoadResult>> {
        let contents = fs::read(args.path)?;
        if !is_stylesheet(args.path) {
            return Ok(Some(LoadResult {
                contents,
                loader: None,
            }));
        }
        let text = String::from_utf8_lossy(&contents);
        Ok(Some(LoadResult {
            contents: css::minify(&text).into_bytes(),
            loader: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_css_is_minified_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("theme.css");
        std::fs::write(&path, "/* theme */\n.passage {\n  color: black;\n}\n").unwrap();

        let result = StyleMinifyPlugin
            .on_load(&LoadArgs { path: &path })
            .unwrap()
            .unwrap();
        assert_eq!(result.contents, b".passage{color:black}");
        assert!(result.loader.is_none());
    }

    #[test]
    fn test_other_files_pass_through() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.ts");
        let source = "export const a = 1;  // keep   spacing\n";
        std::fs::write(&path, source).unwrap();

        let result = StyleMinifyPlugin
            .on_load(&LoadArgs { path: &path })
            .unwrap()
            .unwrap();
        assert_eq!(result.contents, source.as_bytes());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = StyleMinifyPlugin
            .on_load(&LoadArgs {
                path: Path::new("/nonexistent/theme.css"),
            })
            .unwrap_err();
        assert!(matches!(err, crate::error::BuildError::Io { .. }));
    }
}
