//! Bundler plugin hooks.
//!
//! Hooks run in chain order. `on_load` is first-wins: the first plugin that
//! returns contents supplies the module source, otherwise the file is read from
//! disk. `transform` and `on_end` run for every plugin in order.

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

use super::options::Loader;
use crate::error::BuildResult;

#[derive(Debug, Clone, Copy)]
pub struct LoadArgs<'a> {
    pub path: &'a Path,
}

#[derive(Debug, Clone)]
pub struct LoadResult {
    pub contents: Vec<u8>,
    /// Overrides the extension-based loader when set.
    pub loader: Option<Loader>,
}

/// A file produced by a bundling phase, before it is written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub path: PathBuf,
    pub contents: Vec<u8>,
}

impl OutputFile {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        OutputFile {
            path: path.into(),
            contents: contents.into(),
        }
    }

    pub fn is_js(&self) -> bool {
        self.path.extension().is_some_and(|ext| ext == "js")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.contents).into_owned()
    }
}

pub trait Plugin: Debug + Send + Sync {
    fn name(&self) -> &str;

    fn on_load(&self, _args: &LoadArgs<'_>) -> BuildResult<Option<LoadResult>> {
        Ok(None)
    }

    /// Rewrites the text of a loaded script before it is parsed.
    fn transform(&self, _path: &Path, source: String) -> BuildResult<String> {
        Ok(source)
    }

    fn on_end(&self, _outputs: &mut Vec<OutputFile>) -> BuildResult<()> {
        Ok(())
    }
}

/// Literal search-and-replace over scripts whose path matches `include`.
#[derive(Debug, Clone)]
pub struct ReplacePlugin {
    name: String,
    include: Regex,
    replacements: Vec<(String, String)>,
}

impl ReplacePlugin {
    pub fn new(name: impl Into<String>, include: Regex) -> Self {
        ReplacePlugin {
            name: name.into(),
            include,
            replacements: Vec::new(),
        }
    }

    pub fn replace(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.replacements.push((from.into(), to.into()));
        self
    }
}

impl Plugin for ReplacePlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&self, path: &Path, source: String) -> BuildResult<String> {
        if !self.include.is_match(&path.to_string_lossy()) {
            return Ok(source);
        }
        let mut out = source;
        for (from, to) in &self.replacements {
            if out.contains(from.as_str()) {
                out = out.replace(from.as_str(), to);
            }
        }
        Ok(out)
    }
}

/// Forces CodeMirror modes onto the "plain browser" branch of their UMD
/// wrapper so they register against the host's global `CodeMirror` instead of
/// importing a fresh copy.
pub fn legacy_codemirror_plugin() -> ReplacePlugin {
    lazy_static! {
        static ref CODEMIRROR_SOURCES: Regex = Regex::new(r"codemirror.*\.js$").unwrap();
    }
    ReplacePlugin::new("legacy-codemirror", CODEMIRROR_SOURCES.clone())
        .replace(r#"typeof exports == "object""#, "false")
        .replace(r#"typeof define == "function""#, "false")
        .replace(r#"typeof module == "object""#, "false")
        .replace("define.amd", "false")
}

/// Replaces matching files with an empty module, for dependencies that are
/// known to be unused at runtime.
#[derive(Debug, Clone)]
pub struct EmptyModulePlugin {
    filter: Regex,
}

impl EmptyModulePlugin {
    pub fn new(filter: Regex) -> Self {
        EmptyModulePlugin { filter }
    }
}

impl Plugin for EmptyModulePlugin {
    fn name(&self) -> &str {
        "empty-module"
    }

    fn on_load(&self, args: &LoadArgs<'_>) -> BuildResult<Option<LoadResult>> {
        if self.filter.is_match(&args.path.to_string_lossy()) {
            return Ok(Some(LoadResult {
                contents: Vec::new(),
                loader: Some(Loader::Empty),
            }));
        }
        Ok(None)
    }
}
