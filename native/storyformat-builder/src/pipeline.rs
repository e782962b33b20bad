//! Pipeline Orchestrator
//!
//! Runs one full build of the story format:
//!
//! ```text
//! Init -> EditorBuild || PlayerBuild -> PlayerPack -> FinalBuild -> Cleanup -> Done
//! ```
//!
//! The editor and player branches share one immutable [`BuildConfig`] and
//! constant table and write disjoint files, so they run under `rayon::join`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::bundler::{
    legacy_codemirror_plugin, BuildConfig, BuildOptions, Bundler, GlobalName, Resolver,
};
use crate::config::{PipelineOptions, ProjectManifest};
use crate::constants::{flatten_constants, ConstantMap};
use crate::error::{fs, BuildError, BuildResult};
use crate::html::{pack_html, PackOptions, PackedDocument};
use crate::report::{BuildReport, EmbeddedSources};
use crate::sourcemap::SourceMapUrlPlugin;
use crate::style::StyleMinifyPlugin;

/// Prefix every flattened manifest key is published under.
pub const CONSTANT_PREFIX: &str = "PACKAGE.";

pub const EDITOR_OUTFILE: &str = "hydrate.js";
pub const PLAYER_OUTFILE: &str = "player.js";
pub const FORMAT_OUTFILE: &str = "format.js";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    EditorBuild,
    PlayerBuild,
    PlayerPack,
    FinalBuild,
    Cleanup,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Init => "init",
            Phase::EditorBuild => "editor-build",
            Phase::PlayerBuild => "player-build",
            Phase::PlayerPack => "player-pack",
            Phase::FinalBuild => "final-build",
            Phase::Cleanup => "cleanup",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

/// The plugin stack every build in a run shares: stylesheet minification on
/// load, the legacy CodeMirror rewrite, then source-map URL prefixing when a
/// prefix is configured.
pub fn default_config(options: &PipelineOptions) -> BuildConfig {
    let mut config = BuildConfig::default()
        .with_plugin(StyleMinifyPlugin)
        .with_plugin(legacy_codemirror_plugin());
    if let Some(prefix) = &options.source_map_prefix {
        config = config.with_plugin(SourceMapUrlPlugin::new(prefix.clone()));
    }
    config
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    options: PipelineOptions,
    bundler: Bundler,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        let config = default_config(&options);
        Self::with_config(options, config)
    }

    pub fn with_config(options: PipelineOptions, config: BuildConfig) -> Self {
        Pipeline {
            options,
            bundler: Bundler::new(Arc::new(config)),
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn run(&self) -> BuildResult<BuildReport> {
        let opts = &self.options;
        let out_dir = opts.resolve(&opts.out_dir);
        info!(phase = %Phase::Init, root = %opts.root.display(), out_dir = %out_dir.display(), "starting build");
        fs::create_dir_all(&out_dir)?;

        let manifest_path = opts.resolve(&opts.manifest);
        let mut manifest = ProjectManifest::load(&manifest_path)?;
        self.copy_icon(&mut manifest, &manifest_path, &out_dir)?;

        let constants = flatten_constants(&manifest.to_value()?, CONSTANT_PREFIX, &opts.exclusions);
        debug!(count = constants.len(), "flattened manifest constants");

        let (editor, player) = rayon::join(
            || self.build_editor(&constants),
            || self.build_player(&constants),
        );
        let hydrate = editor?;
        let packed = player?;

        info!(phase = %Phase::FinalBuild, "building format");
        let mut defines = constants;
        defines.insert_string("HYDRATE", &hydrate);
        defines.insert_string("SOURCE", &packed.html);
        let format = BuildOptions::new(
            opts.resolve(&opts.format_entry),
            opts.out_path(FORMAT_OUTFILE),
        )
        .defines(defines)
        .source_map(false);
        self.bundler.build_js(&format)?;

        info!(phase = %Phase::Cleanup, "removing intermediate bundles");
        self.cleanup()?;

        let report = BuildReport::collect(
            &out_dir,
            packed.warnings,
            EmbeddedSources {
                hydrate,
                source: packed.html,
            },
        )?;
        info!(phase = %Phase::Done, artifacts = report.artifacts.len(), "build finished");
        Ok(report)
    }

    /// Copies the manifest's icon to `icon.<ext>` in the output directory and
    /// points the manifest at the copy.
    fn copy_icon(
        &self,
        manifest: &mut ProjectManifest,
        manifest_path: &Path,
        out_dir: &Path,
    ) -> BuildResult<()> {
        let source = self.locate_icon(&manifest.icon).ok_or_else(|| BuildError::Manifest {
            path: manifest_path.to_path_buf(),
            message: format!("icon \"{}\" not found", manifest.icon),
        })?;
        let file_name = format!("icon{}", manifest.icon_extension());
        fs::copy(&source, &out_dir.join(&file_name))?;
        debug!(from = %source.display(), to = %file_name, "copied icon");
        manifest.icon = file_name;
        Ok(())
    }

    fn locate_icon(&self, icon: &str) -> Option<PathBuf> {
        let local = self.options.resolve(Path::new(icon));
        if local.is_file() {
            return Some(local);
        }
        Resolver::new().resolve(icon, &self.options.root)
    }

    fn build_editor(&self, constants: &ConstantMap) -> BuildResult<String> {
        info!(phase = %Phase::EditorBuild, "building editor extensions");
        let opts = &self.options;
        let build = BuildOptions::new(
            opts.resolve(&opts.editor_entry),
            opts.out_path(EDITOR_OUTFILE),
        )
        .defines(constants.clone())
        .global_name(GlobalName::parse(&opts.editor_namespace)?);
        self.bundler.build_js(&build)
    }

    fn build_player(&self, constants: &ConstantMap) -> BuildResult<PackedDocument> {
        info!(phase = %Phase::PlayerBuild, "building player");
        let opts = &self.options;
        let build = BuildOptions::new(
            opts.resolve(&opts.player_entry),
            opts.out_path(PLAYER_OUTFILE),
        )
        .defines(constants.clone());
        self.bundler.build_js(&build)?;

        info!(phase = %Phase::PlayerPack, "packing player html");
        pack_html(&opts.resolve(&opts.player_html), &PackOptions::default())
    }

    fn cleanup(&self) -> BuildResult<()> {
        let keep_maps = self.options.source_map_prefix.is_some();
        for name in [PLAYER_OUTFILE, EDITOR_OUTFILE] {
            let path = self.options.out_path(name);
            if path.exists() {
                fs::remove_file(&path)?;
            }
            let map = self.options.out_path(&format!("{name}.map"));
            if !keep_maps && map.exists() {
                fs::remove_file(&map)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn scaffold(root: &Path) {
        write(
            root,
            "package.json",
            r#"{"name":"mini","version":"0.1.0","icon":"assets/logo.svg","dependencies":{"x":"1"}}"#,
        );
        write(root, "assets/logo.svg", "<svg/>");
        write(
            root,
            "src/editor/hydrate.ts",
            "export const references = [PACKAGE.name];\n",
        );
        write(root, "src/player/index.ts", "console.log(PACKAGE.version);\n");
        write(
            root,
            "src/player/index.html",
            "<html><body><script src=\"../../build/player.js\"></script></body></html>",
        );
        write(
            root,
            "src/format.ts",
            "declare const HYDRATE: string;\ndeclare const SOURCE: string;\n(window as any).storyFormat({ name: PACKAGE.name, icon: PACKAGE.icon, hydrate: HYDRATE, source: SOURCE });\n",
        );
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(Phase::EditorBuild.to_string(), "editor-build");
        assert_eq!(Phase::Done.to_string(), "done");
    }

    #[test]
    fn test_default_config_plugin_order() {
        let opts = PipelineOptions::new("/proj");
        let names: Vec<String> = default_config(&opts)
            .plugins
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["style-minify", "legacy-codemirror"]);

        let opts = opts.with_source_map_prefix(Some("https://cdn.test/".into()));
        assert_eq!(default_config(&opts).plugins.len(), 3);
    }

    #[test]
    fn test_run_leaves_only_format_and_icon() {
        let dir = TempDir::new().unwrap();
        scaffold(dir.path());

        let report = Pipeline::new(PipelineOptions::new(dir.path())).run().unwrap();
        let paths: Vec<&str> = report.artifacts.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(paths, vec!["format.js", "icon.svg"]);
        assert!(report.warnings.is_empty());

        let format = std::fs::read_to_string(dir.path().join("build/format.js")).unwrap();
        assert!(format.contains("\"mini\""));
        assert!(format.contains("\"icon.svg\""));
        assert!(!format.contains("PACKAGE"));

        assert!(report.embedded.hydrate.contains("editorExtensions"));
        assert!(report
            .embedded
            .hydrate
            .ends_with("//# sourceMappingURL=hydrate.js.map\n"));
        assert!(report.embedded.source.contains("console.log(\"0.1.0\")"));
    }

    #[test]
    fn test_prefix_keeps_maps() {
        let dir = TempDir::new().unwrap();
        scaffold(dir.path());
        let opts = PipelineOptions::new(dir.path())
            .with_source_map_prefix(Some("https://maps.test/".into()));

        let report = Pipeline::new(opts).run().unwrap();
        let paths: Vec<&str> = report.artifacts.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["format.js", "hydrate.js.map", "icon.svg", "player.js.map"]
        );
        assert!(report
            .embedded
            .hydrate
            .contains("//# sourceMappingURL=https://maps.test/hydrate.js.map"));
    }

    #[test]
    fn test_missing_icon_fails() {
        let dir = TempDir::new().unwrap();
        scaffold(dir.path());
        std::fs::remove_file(dir.path().join("assets/logo.svg")).unwrap();

        let err = Pipeline::new(PipelineOptions::new(dir.path())).run().unwrap_err();
        assert!(matches!(err, BuildError::Manifest { .. }));
        assert!(err.to_string().contains("assets/logo.svg"));
    }

    #[test]
    fn test_missing_editor_entry_fails() {
        let dir = TempDir::new().unwrap();
        scaffold(dir.path());
        std::fs::remove_file(dir.path().join("src/editor/hydrate.ts")).unwrap();

        assert!(Pipeline::new(PipelineOptions::new(dir.path())).run().is_err());
    }
}
