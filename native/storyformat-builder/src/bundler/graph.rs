//! Module graph construction.
//!
//! Breadth-first from the entry point. Each file is loaded (built-in modules,
//! then plugins, then disk), dispatched on its loader, compiled and linked;
//! every specifier the linker reports is resolved, assigned the next free id
//! and queued. The entry point is always module 0.

use oxc_allocator::Allocator;
use oxc_ast_visit::VisitMut;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use oxc_transformer::Transformer;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::helpers;
use super::link::{link_module, ModuleRef};
use super::mapping::ModuleOrigin;
use super::options::{BuildConfig, Loader};
use super::passes::{ConstantFolder, DefineReplacer, StrictDirectiveStripper};
use super::plugin::LoadArgs;
use super::resolve::{Resolved, Resolver};
use super::text::{data_url, strip_bom, string_module};
use crate::constants::ConstantMap;
use crate::error::{fs, BuildError, BuildResult};

#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub id: usize,
    pub path: PathBuf,
    /// Linked body, ready to be wrapped in the registry function.
    pub code: String,
    /// Set for script modules when source maps are requested.
    pub(crate) origin: Option<ModuleOrigin>,
}

#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    pub modules: Vec<ModuleRecord>,
}

pub(crate) fn build_graph(
    config: &BuildConfig,
    entry: &Path,
    defines: &ConstantMap,
    source_maps: bool,
) -> BuildResult<ModuleGraph> {
    let resolver = Resolver::new();
    let entry = canonical(entry)?;

    let mut ids: HashMap<PathBuf, usize> = HashMap::new();
    let mut paths: Vec<PathBuf> = vec![entry.clone()];
    ids.insert(entry, 0);

    let mut graph = ModuleGraph::default();
    let mut next = 0;
    while next < paths.len() {
        let path = paths[next].clone();
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        let (code, origin) = compile_module(config, &path, defines, source_maps, |specifier| {
            if config.is_external(specifier) {
                return Ok(ModuleRef::External(specifier.to_string()));
            }
            let resolved = match helpers::helper_path(specifier) {
                Some(helper) => helper,
                None => match resolver.resolve_module(specifier, &dir) {
                    Some(Resolved::File(file)) => canonical(&file)?,
                    Some(Resolved::Ignored) => helpers::ignored_path(),
                    None => {
                        return Err(BuildError::Resolve {
                            specifier: specifier.to_string(),
                            importer: path.clone(),
                        })
                    }
                },
            };
            let id = *ids.entry(resolved.clone()).or_insert_with(|| {
                paths.push(resolved);
                paths.len() - 1
            });
            Ok(ModuleRef::Id(id))
        })?;

        debug!(id = next, module = %path.display(), bytes = code.len(), "linked module");
        graph.modules.push(ModuleRecord {
            id: next,
            path,
            code,
            origin,
        });
        next += 1;
    }
    Ok(graph)
}

fn canonical(path: &Path) -> BuildResult<PathBuf> {
    std::fs::canonicalize(path).map_err(|e| BuildError::io(path, e))
}

fn load(config: &BuildConfig, path: &Path) -> BuildResult<(Vec<u8>, Loader)> {
    if let Some(source) = helpers::virtual_source(path) {
        let loader = if source.is_empty() {
            Loader::Empty
        } else {
            Loader::Script
        };
        return Ok((source.as_bytes().to_vec(), loader));
    }
    let args = LoadArgs { path };
    for plugin in &config.plugins {
        if let Some(result) = plugin.on_load(&args)? {
            debug!(plugin = plugin.name(), module = %path.display(), "loaded by plugin");
            let loader = result.loader.unwrap_or_else(|| config.loader_for(path));
            return Ok((result.contents, loader));
        }
    }
    Ok((fs::read(path)?, config.loader_for(path)))
}

fn decode(path: &Path, contents: Vec<u8>) -> BuildResult<String> {
    let text =
        String::from_utf8(contents).map_err(|_| BuildError::parse(path, "file is not valid UTF-8"))?;
    Ok(strip_bom(&text).to_string())
}

fn compile_module<F>(
    config: &BuildConfig,
    path: &Path,
    defines: &ConstantMap,
    source_maps: bool,
    resolve: F,
) -> BuildResult<(String, Option<ModuleOrigin>)>
where
    F: FnMut(&str) -> BuildResult<ModuleRef>,
{
    let (contents, loader) = load(config, path)?;
    let code = match loader {
        Loader::Script => {
            let mut source = decode(path, contents)?;
            if !helpers::is_virtual(path) {
                for plugin in &config.plugins {
                    source = plugin.transform(path, source)?;
                }
            }
            let want_map = source_maps && !helpers::is_virtual(path);
            let compiled = compile_script(config, path, &source, defines, want_map)?;
            let linked = link_module(path, &compiled.code, resolve)?;
            let origin = match compiled.map {
                Some(map) => Some(
                    ModuleOrigin::new(source, compiled.code, &map, linked.segments)
                        .map_err(|message| BuildError::transform(path, message))?,
                ),
                None => None,
            };
            return Ok((linked.code, origin));
        }
        Loader::Text => string_module(&decode(path, contents)?),
        Loader::DataUrl => string_module(&data_url(path, &contents)),
        Loader::Json => {
            let text = decode(path, contents)?;
            let value: serde_json::Value =
                serde_json::from_str(&text).map_err(|e| BuildError::parse(path, e.to_string()))?;
            format!("module.exports = {value};\n")
        }
        Loader::Empty => String::new(),
    };
    Ok((code, None))
}

/// A compiled script and, when requested, its map back to the source.
#[derive(Debug, Clone)]
pub(crate) struct Compiled {
    pub code: String,
    pub map: Option<String>,
}

/// Parses, rewrites and lowers one script to the configured targets.
pub(crate) fn compile_script(
    config: &BuildConfig,
    path: &Path,
    source: &str,
    defines: &ConstantMap,
    source_map: bool,
) -> BuildResult<Compiled> {
    let allocator = Allocator::default();
    let source_type = SourceType::from_path(path).unwrap_or_else(|_| SourceType::mjs());

    let mut ret = Parser::new(&allocator, source, source_type).parse();
    if !ret.errors.is_empty() && !source_type.is_typescript() {
        // sloppy-mode CommonJS
        let retry = Parser::new(&allocator, source, SourceType::cjs()).parse();
        if retry.errors.is_empty() {
            ret = retry;
        }
    }
    if let Some(error) = ret.errors.first() {
        return Err(BuildError::parse(path, error.to_string()));
    }
    let mut program = ret.program;

    StrictDirectiveStripper.visit_program(&mut program);
    let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();
    let mut replacer = DefineReplacer::new(&allocator, defines, &scoping);
    replacer.visit_program(&mut program);
    let mut folder = ConstantFolder::new(&allocator);
    folder.visit_program(&mut program);
    if replacer.replaced > 0 || folder.folded > 0 {
        debug!(
            module = %path.display(),
            replaced = replacer.replaced,
            folded = folder.folded,
            "constant rewrite"
        );
    }

    let options = config
        .transform_options()
        .map_err(|message| BuildError::transform(path, message))?;
    let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();
    let ret = Transformer::new(&allocator, path, &options).build_with_scoping(scoping, &mut program);
    if let Some(error) = ret.errors.first() {
        return Err(BuildError::transform(path, error.to_string()));
    }

    let codegen_options = CodegenOptions {
        source_map_path: source_map.then(|| path.to_path_buf()),
        ..CodegenOptions::default()
    };
    let ret = Codegen::new().with_options(codegen_options).build(&program);
    Ok(Compiled {
        code: ret.code,
        map: ret.map.map(|map| map.to_json_string()),
    })
}
