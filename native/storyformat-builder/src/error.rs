//! Error taxonomy for the story format build.
//!
//! Every variant here is fatal: the pipeline is a single-shot batch process and
//! aborts on the first error. Recoverable conditions (an HTML asset that cannot be
//! resolved) are not errors; see [`crate::html::AssetWarning`].

use std::path::{Path, PathBuf};

pub type BuildResult<T> = std::result::Result<T, BuildError>;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The bundler finished without producing a `.js` output file.
    #[error("no JS output produced for entry point {}", entry.display())]
    NoJsOutput { entry: PathBuf },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("could not resolve \"{specifier}\" from {}", importer.display())]
    Resolve { specifier: String, importer: PathBuf },

    #[error("failed to transform {}: {message}", path.display())]
    Transform { path: PathBuf, message: String },

    #[error("invalid global name \"{0}\": expected a dotted identifier path")]
    GlobalName(String),

    #[error("invalid project manifest {}: {message}", path.display())]
    Manifest { path: PathBuf, message: String },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl BuildError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn parse(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        BuildError::Parse {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    pub fn transform(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        BuildError::Transform {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }
}

/// Filesystem helpers that attach the offending path to the error.
pub(crate) mod fs {
    use super::{BuildError, BuildResult};
    use std::path::Path;

    pub fn read(path: &Path) -> BuildResult<Vec<u8>> {
        std::fs::read(path).map_err(|e| BuildError::io(path, e))
    }

    pub fn read_to_string(path: &Path) -> BuildResult<String> {
        std::fs::read_to_string(path).map_err(|e| BuildError::io(path, e))
    }

    pub fn write(path: &Path, contents: impl AsRef<[u8]>) -> BuildResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent)?;
            }
        }
        std::fs::write(path, contents).map_err(|e| BuildError::io(path, e))
    }

    pub fn create_dir_all(path: &Path) -> BuildResult<()> {
        std::fs::create_dir_all(path).map_err(|e| BuildError::io(path, e))
    }

    pub fn copy(from: &Path, to: &Path) -> BuildResult<u64> {
        std::fs::copy(from, to).map_err(|e| BuildError::io(from, e))
    }

    pub fn remove_file(path: &Path) -> BuildResult<()> {
        std::fs::remove_file(path).map_err(|e| BuildError::io(path, e))
    }
}
