//! # Story Format Builder
//!
//! Packages a Twine story format into a single distributable `format.js`.
//!
//! A format is two programs: the editor extensions Twine loads while a story is
//! being written, and the player that runs the published story. Both are
//! bundled from TypeScript, the player is packed into one self-contained HTML
//! document, and both results are embedded as string constants in the final
//! `format.js` next to the project's `package.json` metadata.
//!
//! ## Pipeline
//!
//! 1. **Constants**: `package.json` is flattened into `PACKAGE.*` build
//!    constants, substituted into every bundle at compile time.
//! 2. **Editor / Player**: built concurrently. The editor bundle publishes its
//!    exports at `this.editorExtensions`; the player bundle is inlined into
//!    its HTML shell along with every local stylesheet, image and icon.
//! 3. **Final**: `src/format.ts` is bundled with `HYDRATE` (editor source) and
//!    `SOURCE` (packed player HTML) defined.
//! 4. **Cleanup**: intermediate bundles are removed, leaving `format.js` and
//!    the copied icon.
//!
//! The library never installs a tracing subscriber; that is left to the
//! `storyformat-build` binary or the embedding host.

#[cfg(feature = "napi")]
use napi_derive::napi;

pub mod bundler;
pub mod config;
pub mod constants;
pub mod css;
pub mod error;
pub mod html;
pub mod pipeline;
pub mod report;
pub mod sourcemap;
pub mod style;

pub use bundler::{BuildConfig, BuildOptions, BundleResult, Bundler, GlobalName, Plugin};
pub use config::{PipelineOptions, ProjectManifest};
pub use constants::{flatten_constants, ConstantMap, ExclusionSet};
pub use error::{BuildError, BuildResult};
pub use html::{pack_html, AssetWarning, PackOptions, PackedDocument};
pub use pipeline::{Phase, Pipeline};
pub use report::{Artifact, BuildReport};
pub use sourcemap::{rewrite_source_map_urls, SourceMapUrlPlugin};
pub use style::StyleMinifyPlugin;

/// Runs the full pipeline for the project at `root` and returns the build
/// report as JSON.
#[cfg(feature = "napi")]
#[napi]
pub fn build_format_native(root: String, source_map_prefix: Option<String>) -> napi::Result<String> {
    let options = PipelineOptions::new(root).with_source_map_prefix(source_map_prefix);
    let report = Pipeline::new(options)
        .run()
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    report
        .to_json()
        .map_err(|e| napi::Error::from_reason(format!("Invalid report: {}", e)))
}
