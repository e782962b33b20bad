//! Module Bundler
//!
//! Resolves an entry point's import graph, compiles every module to the
//! configured browser targets and emits a single self-executing script with
//! an optional source map. Policy lives in a shared [`BuildConfig`]; each call
//! supplies its own [`BuildOptions`].

mod emit;
mod graph;
mod helpers;
mod link;
mod mapping;
mod options;
mod passes;
mod plugin;
mod resolve;
pub mod text;

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

pub use graph::{ModuleGraph, ModuleRecord};
pub use link::ModuleRef;
pub use options::{
    BuildConfig, BuildOptions, GlobalName, Loader, DEFAULT_EXTERNALS, DEFAULT_TARGETS,
    STRICT_BANNER,
};
pub use plugin::{
    legacy_codemirror_plugin, EmptyModulePlugin, LoadArgs, LoadResult, OutputFile, Plugin,
    ReplacePlugin,
};
pub use resolve::{Resolved, Resolver};

use crate::error::{fs, BuildError, BuildResult};

/// Files produced by one bundling call, after every `on_end` hook has run.
#[derive(Debug, Clone)]
pub struct BundleResult {
    pub output_files: Vec<OutputFile>,
    pub module_count: usize,
}

impl BundleResult {
    /// Text of the first `.js` output.
    pub fn js_text(&self) -> Option<String> {
        self.output_files.iter().find(|f| f.is_js()).map(OutputFile::text)
    }

    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.output_files.iter().map(|f| &f.path)
    }
}

#[derive(Debug, Clone)]
pub struct Bundler {
    config: Arc<BuildConfig>,
}

impl Bundler {
    pub fn new(config: Arc<BuildConfig>) -> Self {
        Bundler { config }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Bundles in memory without touching the output directory.
    pub fn bundle(&self, options: &BuildOptions) -> BuildResult<BundleResult> {
        let graph = graph::build_graph(
            &self.config,
            &options.entry,
            &options.defines,
            options.source_map,
        )?;
        let module_count = graph.modules.len();
        let emitted = emit::emit(&self.config, options, &graph)?;

        let mut output_files = vec![OutputFile::new(&options.outfile, emitted.code)];
        if let Some(map) = emitted.map {
            output_files.push(OutputFile::new(options.map_file(), map));
        }
        for plugin in &self.config.plugins {
            plugin.on_end(&mut output_files)?;
            debug!(plugin = plugin.name(), "on_end complete");
        }
        Ok(BundleResult {
            output_files,
            module_count,
        })
    }

    /// Bundles, writes every output file and returns the JS text.
    pub fn build_js(&self, options: &BuildOptions) -> BuildResult<String> {
        let result = self.bundle(options)?;
        for file in &result.output_files {
            fs::write(&file.path, &file.contents)?;
        }
        info!(
            entry = %options.entry.display(),
            outfile = %options.outfile.display(),
            modules = result.module_count,
            bytes = result.output_files.iter().map(|f| f.contents.len()).sum::<usize>(),
            "bundled"
        );
        result.js_text().ok_or_else(|| BuildError::NoJsOutput {
            entry: options.entry.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ConstantMap;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &str) -> PathBuf {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[derive(Debug)]
    struct DropJs;

    impl Plugin for DropJs {
        fn name(&self) -> &str {
            "drop-js"
        }

        fn on_end(&self, outputs: &mut Vec<OutputFile>) -> BuildResult<()> {
            outputs.retain(|f| !f.is_js());
            Ok(())
        }
    }

    #[test]
    fn test_build_js_writes_outputs() {
        let dir = TempDir::new().unwrap();
        let entry = write(
            dir.path(),
            "src/index.ts",
            "import { greet } from \"./greet\";\nif (PACKAGE.debug) { console.log(\"debug\"); }\ngreet(PACKAGE.name);\n",
        );
        write(
            dir.path(),
            "src/greet.ts",
            "export function greet(name: string): void { console.log(`hi ${name}`); }\n",
        );
        let outfile = dir.path().join("build/player.js");

        let mut defines = ConstantMap::new();
        defines.insert("PACKAGE.name", "\"fmt\"");
        defines.insert("PACKAGE.debug", "false");

        let bundler = Bundler::new(Arc::new(BuildConfig::default()));
        let options = BuildOptions::new(&entry, &outfile).defines(defines);
        let js = bundler.build_js(&options).unwrap();

        assert_eq!(std::fs::read_to_string(&outfile).unwrap(), js);
        assert!(dir.path().join("build/player.js.map").exists());
        assert!(js.contains("\"fmt\""));
        assert!(!js.contains("PACKAGE"));
        assert!(!js.contains("\"debug\""));
        assert!(js.contains("sourceMappingURL=player.js.map"));
    }

    #[test]
    fn test_lowered_class_fields_use_built_in_helpers() {
        let dir = TempDir::new().unwrap();
        let entry = write(
            dir.path(),
            "src/index.ts",
            "export class Counter { count = 1; static label = \"n\"; }\nexport const make = (o: object) => ({ ...o, made: true });\n",
        );
        let bundler = Bundler::new(Arc::new(BuildConfig::default()));
        let options = BuildOptions::new(&entry, dir.path().join("out.js")).source_map(false);
        let result = bundler.bundle(&options).unwrap();
        let js = result.js_text().unwrap();

        assert!(!js.contains("@oxc-project"));
        assert!(js.contains("function defineProperty("));
        assert!(js.contains("function toPropertyKey("));
        assert!(result.module_count > 1);
    }

    #[test]
    fn test_browser_false_module_is_empty() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "node_modules/pkg/package.json",
            r#"{"name": "pkg", "main": "index.js", "browser": {"fs": false}}"#,
        );
        write(
            dir.path(),
            "node_modules/pkg/index.js",
            "var fs = require(\"fs\");\nmodule.exports = function () { return typeof fs; };\n",
        );
        let entry = write(dir.path(), "index.js", "import check from \"pkg\";\ncheck();\n");
        let bundler = Bundler::new(Arc::new(BuildConfig::default()));
        let options = BuildOptions::new(&entry, dir.path().join("out.js")).source_map(false);
        let result = bundler.bundle(&options).unwrap();
        assert_eq!(result.module_count, 3);
        assert!(!result.js_text().unwrap().contains("\"fs\""));
    }

    #[test]
    fn test_source_map_points_at_original_sources() {
        let dir = TempDir::new().unwrap();
        let entry = write(
            dir.path(),
            "src/index.ts",
            "import { greeting } from \"./lib/greeting\";\nconsole.log(greeting());\n",
        );
        let greeting_source = "// greeting\n\nexport const greeting = (): string => \"marker-g\";\n";
        write(dir.path(), "src/lib/greeting.ts", greeting_source);
        std::fs::create_dir_all(dir.path().join("out")).unwrap();

        let bundler = Bundler::new(Arc::new(BuildConfig::default()));
        let options = BuildOptions::new(&entry, dir.path().join("out/bundle.js"));
        let result = bundler.bundle(&options).unwrap();
        let js = result.js_text().unwrap();
        let map_text = result
            .output_files
            .iter()
            .find(|f| !f.is_js())
            .map(OutputFile::text)
            .unwrap();

        let map: serde_json::Value = serde_json::from_str(&map_text).unwrap();
        let sources: Vec<&str> = map["sources"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s.as_str().unwrap())
            .collect();
        assert!(sources.contains(&"../src/index.ts"));
        assert!(sources.contains(&"../src/lib/greeting.ts"));
        assert!(!sources.iter().any(|s| s.contains("bundle.js")));
        let greeting_id = sources.iter().position(|s| *s == "../src/lib/greeting.ts").unwrap();
        assert_eq!(map["sourcesContent"][greeting_id], greeting_source);

        let at = js.find("\"marker-g\"").unwrap();
        let line = js[..at].matches('\n').count() as u32;
        let column = (at - js[..at].rfind('\n').map_or(0, |i| i + 1)) as u32;
        let parsed = oxc_sourcemap::SourceMap::from_json_string(&map_text).unwrap();
        let token = parsed
            .get_tokens()
            .filter(|t| t.get_dst_line() == line && t.get_dst_col() <= column)
            .max_by_key(|t| t.get_dst_col())
            .unwrap();
        assert_eq!(token.get_source_id(), Some(greeting_id as u32));
        assert_eq!(token.get_src_line(), 2);
    }

    #[test]
    fn test_no_js_output_is_an_error() {
        let dir = TempDir::new().unwrap();
        let entry = write(dir.path(), "index.js", "console.log(1);\n");
        let config = BuildConfig::default().with_plugin(DropJs);
        let bundler = Bundler::new(Arc::new(config));
        let options = BuildOptions::new(&entry, dir.path().join("out.js")).source_map(false);
        let err = bundler.build_js(&options).unwrap_err();
        assert!(matches!(err, BuildError::NoJsOutput { .. }));
    }
}
