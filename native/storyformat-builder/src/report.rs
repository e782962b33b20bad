//! Summary of a finished build: what landed in the output directory.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{fs, BuildError, BuildResult};
use crate::html::AssetWarning;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    /// Path relative to the output directory, `/`-separated.
    pub path: String,
    pub size: u64,
    pub sha256: String,
}

/// The two strings the final build embeds into `format.js`.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedSources {
    pub hydrate: String,
    pub source: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub out_dir: PathBuf,
    pub artifacts: Vec<Artifact>,
    pub warnings: Vec<AssetWarning>,
    #[serde(skip)]
    pub embedded: EmbeddedSources,
}

impl BuildReport {
    /// Hashes every file under `out_dir`.
    pub fn collect(
        out_dir: &Path,
        warnings: Vec<AssetWarning>,
        embedded: EmbeddedSources,
    ) -> BuildResult<Self> {
        let mut artifacts = Vec::new();
        for entry in WalkDir::new(out_dir).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(out_dir).to_path_buf();
                BuildError::io(path, e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let bytes = fs::read(entry.path())?;
            let relative = entry.path().strip_prefix(out_dir).unwrap_or(entry.path());
            artifacts.push(Artifact {
                path: relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/"),
                size: bytes.len() as u64,
                sha256: format!("{:x}", Sha256::digest(&bytes)),
            });
        }
        Ok(BuildReport {
            out_dir: out_dir.to_path_buf(),
            artifacts,
            warnings,
            embedded,
        })
    }

    pub fn artifact(&self, path: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.path == path)
    }

    pub fn to_json(&self) -> BuildResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.out_dir.display())?;
        let width = self.artifacts.iter().map(|a| a.path.len()).max().unwrap_or(0);
        for artifact in &self.artifacts {
            writeln!(
                f,
                "  {:<width$}  {:>10}  {}",
                artifact.path,
                artifact.size,
                artifact.sha256,
                width = width
            )?;
        }
        for warning in &self.warnings {
            writeln!(f, "  warning: {warning}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_lists_files_sorted_with_hashes() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("format.js"), "abc").unwrap();
        std::fs::write(dir.path().join("icon.svg"), "").unwrap();

        let report =
            BuildReport::collect(dir.path(), Vec::new(), EmbeddedSources::default()).unwrap();
        let paths: Vec<&str> = report.artifacts.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(paths, vec!["format.js", "icon.svg"]);

        let js = report.artifact("format.js").unwrap();
        assert_eq!(js.size, 3);
        assert_eq!(
            js.sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            report.artifact("icon.svg").unwrap().sha256,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_json_omits_embedded_sources() {
        let dir = TempDir::new().unwrap();
        let report = BuildReport::collect(
            dir.path(),
            Vec::new(),
            EmbeddedSources {
                hydrate: "secret-hydrate".into(),
                source: "secret-source".into(),
            },
        )
        .unwrap();
        let json = report.to_json().unwrap();
        assert!(json.contains("\"artifacts\""));
        assert!(!json.contains("secret-hydrate"));
    }

    #[test]
    fn test_display_includes_warnings() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("format.js"), "x").unwrap();
        let warning = AssetWarning {
            element: "img".into(),
            attribute: "src".into(),
            reference: "gone.png".into(),
            reason: "file not found".into(),
        };
        let report =
            BuildReport::collect(dir.path(), vec![warning], EmbeddedSources::default()).unwrap();
        let text = report.to_string();
        assert!(text.contains("format.js"));
        assert!(text.contains("warning: <img src=\"gone.png\">: file not found"));
    }
}
