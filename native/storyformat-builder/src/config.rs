//! Project configuration: the story format's `package.json` and the options
//! that drive one pipeline run.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::constants::ExclusionSet;
use crate::error::{fs, BuildError, BuildResult};

/// Namespace the editor extension bundle publishes its exports under.
pub const DEFAULT_EDITOR_NAMESPACE: &str = "this.editorExtensions";

/// The fields of `package.json` the pipeline reads or rewrites. Everything
/// else is carried through untouched in `extra` so it can be flattened into
/// build constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectManifest {
    pub name: String,
    pub version: String,
    /// Path to the format's icon, resolved relative to the project root.
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Person>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<Repository>,
    /// Target runtime identifiers, e.g. `{"twine": "^2.4.0-alpha1"}`.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub runtimes: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Repository {
    Url(String),
    Detailed {
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
        url: String,
    },
}

impl Repository {
    pub fn url(&self) -> &str {
        match self {
            Repository::Url(url) => url,
            Repository::Detailed { url, .. } => url,
        }
    }
}

/// A `package.json` person field: `"Name <email> (url)"` or an object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Person {
    Name(String),
    Detailed {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        email: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
}

impl Person {
    pub fn name(&self) -> &str {
        match self {
            Person::Name(name) => name,
            Person::Detailed { name, .. } => name,
        }
    }
}

impl ProjectManifest {
    pub fn load(path: &Path) -> BuildResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text, path)
    }

    pub fn parse(text: &str, path: &Path) -> BuildResult<Self> {
        let manifest: ProjectManifest =
            serde_json::from_str(text).map_err(|e| BuildError::Manifest {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        if manifest.icon.trim().is_empty() {
            return Err(BuildError::Manifest {
                path: path.to_path_buf(),
                message: "\"icon\" must be a non-empty path".to_string(),
            });
        }
        Ok(manifest)
    }

    /// Extension of the icon file including the dot, or an empty string.
    pub fn icon_extension(&self) -> String {
        Path::new(&self.icon)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default()
    }

    pub fn to_value(&self) -> BuildResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Inputs to one pipeline run. All relative paths are resolved against `root`.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub root: PathBuf,
    pub manifest: PathBuf,
    pub out_dir: PathBuf,
    pub editor_entry: PathBuf,
    pub player_entry: PathBuf,
    pub player_html: PathBuf,
    pub format_entry: PathBuf,
    pub exclusions: ExclusionSet,
    pub editor_namespace: String,
    /// Absolute URL prefix for source-map references. `None` disables rewriting.
    pub source_map_prefix: Option<String>,
}

impl PipelineOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        PipelineOptions {
            root: root.into(),
            manifest: PathBuf::from("package.json"),
            out_dir: PathBuf::from("build"),
            editor_entry: PathBuf::from("src/editor/hydrate.ts"),
            player_entry: PathBuf::from("src/player/index.ts"),
            player_html: PathBuf::from("src/player/index.html"),
            format_entry: PathBuf::from("src/format.ts"),
            exclusions: ExclusionSet::default(),
            editor_namespace: DEFAULT_EDITOR_NAMESPACE.to_string(),
            source_map_prefix: None,
        }
    }

    pub fn with_source_map_prefix(mut self, prefix: Option<String>) -> Self {
        self.source_map_prefix = prefix.filter(|p| !p.is_empty());
        self
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn out_path(&self, file_name: &str) -> PathBuf {
        self.resolve(&self.out_dir).join(file_name)
    }
}
