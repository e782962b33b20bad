use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use oxc_transformer::TransformOptions;

use super::plugin::Plugin;
use crate::constants::ConstantMap;
use crate::error::{BuildError, BuildResult};

/// Browsers every bundle must run on unmodified: the Twine 2.4 support matrix
/// plus Chrome 66, which ships with the Twine 2.3 desktop app.
pub const DEFAULT_TARGETS: &[&str] = &["chrome66", "edge101", "firefox100", "ios12.2", "safari13.1"];

/// Specifiers that are never resolved. They are only imported from UMD guards
/// that become unreachable once the legacy CodeMirror rewrite has run.
pub const DEFAULT_EXTERNALS: &[&str] = &["../../lib/codemirror", "../meta", "../xml/xml"];

pub const STRICT_BANNER: &str = "\"use strict\";";

/// How a file is turned into a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loader {
    /// JavaScript or TypeScript source.
    Script,
    /// The file's text, exported as a string.
    Text,
    /// A base64 `data:` URI, exported as a string.
    DataUrl,
    /// A JSON document, exported as its value.
    Json,
    /// An empty module.
    Empty,
}

/// Read-only policy shared by every bundling phase of a run.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub targets: Vec<String>,
    pub externals: BTreeSet<String>,
    /// Extension (with leading dot) → loader. Unlisted extensions load as scripts.
    pub loaders: BTreeMap<String, Loader>,
    pub minify: bool,
    pub banner: String,
    pub plugins: Vec<Arc<dyn Plugin>>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        let loaders = [
            (".css", Loader::Text),
            (".svg", Loader::DataUrl),
            (".png", Loader::DataUrl),
            (".json", Loader::Json),
        ]
        .into_iter()
        .map(|(ext, loader)| (ext.to_string(), loader))
        .collect();

        BuildConfig {
            targets: DEFAULT_TARGETS.iter().map(|t| t.to_string()).collect(),
            externals: DEFAULT_EXTERNALS.iter().map(|e| e.to_string()).collect(),
            loaders,
            minify: true,
            banner: STRICT_BANNER.to_string(),
            plugins: Vec::new(),
        }
    }
}

impl BuildConfig {
    pub fn with_plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    pub fn is_external(&self, specifier: &str) -> bool {
        self.externals.contains(specifier)
    }

    pub fn loader_for(&self, path: &Path) -> Loader {
        path.extension()
            .and_then(|ext| self.loaders.get(&format!(".{}", ext.to_string_lossy())))
            .copied()
            .unwrap_or(Loader::Script)
    }

    pub(crate) fn transform_options(&self) -> Result<TransformOptions, String> {
        TransformOptions::from_target(&self.targets.join(","))
    }
}

/// A dotted assignment target such as `this.editorExtensions`.
///
/// At least two segments are required: the root (`this` or a global
/// identifier) and the property that receives the entry module's exports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalName(Vec<String>);

impl GlobalName {
    pub fn parse(path: &str) -> BuildResult<Self> {
        let segments: Vec<String> = path.split('.').map(|s| s.to_string()).collect();
        let valid = segments.len() >= 2 && segments.iter().all(|s| is_identifier(s));
        if !valid {
            return Err(BuildError::GlobalName(path.to_string()));
        }
        Ok(GlobalName(segments))
    }

    pub fn root(&self) -> &str {
        &self.0[0]
    }

    pub fn properties(&self) -> &[String] {
        &self.0[1..]
    }
}

impl fmt::Display for GlobalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c == '$' || c.is_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c == '$' || c.is_alphanumeric())
}

/// Per-invocation specialisation of a [`BuildConfig`].
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub entry: PathBuf,
    pub outfile: PathBuf,
    pub defines: ConstantMap,
    pub global_name: Option<GlobalName>,
    pub source_map: bool,
}

impl BuildOptions {
    pub fn new(entry: impl Into<PathBuf>, outfile: impl Into<PathBuf>) -> Self {
        BuildOptions {
            entry: entry.into(),
            outfile: outfile.into(),
            defines: ConstantMap::new(),
            global_name: None,
            source_map: true,
        }
    }

    pub fn defines(mut self, defines: ConstantMap) -> Self {
        self.defines = defines;
        self
    }

    pub fn global_name(mut self, name: GlobalName) -> Self {
        self.global_name = Some(name);
        self
    }

    pub fn source_map(mut self, enabled: bool) -> Self {
        self.source_map = enabled;
        self
    }

    pub fn map_file(&self) -> PathBuf {
        let mut name = self.outfile.as_os_str().to_os_string();
        name.push(".map");
        PathBuf::from(name)
    }
}
