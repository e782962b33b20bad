//! Bundle emission: wraps linked modules in a self-executing registry, then
//! re-parses the whole bundle once for folding, global-name assignment and
//! minified printing. The printer's map is composed with each module's own
//! map so the emitted source map points at the original files.

use oxc_allocator::{Allocator, CloneIn};
use oxc_ast::ast::*;
use oxc_ast::AstBuilder;
use oxc_ast_visit::VisitMut;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_parser::Parser;
use oxc_span::{SourceType, SPAN};
use std::fmt::Write as _;

use super::graph::ModuleGraph;
use super::mapping::{compose, ModuleSpan};
use super::options::{BuildConfig, BuildOptions, GlobalName};
use super::passes::ConstantFolder;
use crate::error::{BuildError, BuildResult};

const RUNTIME: &str = r#"var __cache = {};
function __require(id) {
  if (typeof id !== "number") throw new Error("Could not resolve \"" + id + "\"");
  var cached = __cache[id];
  if (cached) return cached.exports;
  var module = __cache[id] = { exports: {} };
  __modules[id].call(module.exports, module, module.exports, __require);
  return module.exports;
}
function __markModule(target) {
  Object.defineProperty(target, "__esModule", { value: true });
}
function __export(target, name, get) {
  Object.defineProperty(target, name, { get: get, enumerable: true, configurable: true });
}
function __exportStar(target, source) {
  Object.keys(source).forEach(function (key) {
    if (key !== "default" && !Object.prototype.hasOwnProperty.call(target, key)) {
      __export(target, key, function () { return source[key]; });
    }
  });
}
function __toESM(mod) {
  return mod && mod.__esModule ? mod : { default: mod, __proto__: mod };
}
"#;

#[derive(Debug, Clone)]
pub(crate) struct Emitted {
    pub code: String,
    pub map: Option<String>,
}

/// Unminified bundle text and the byte range of each module body in it.
pub(crate) struct Assembled {
    pub text: String,
    pub spans: Vec<ModuleSpan>,
}

/// One registry entry per module, entry is id 0.
pub(crate) fn assemble(banner: &str, graph: &ModuleGraph) -> Assembled {
    let body_len: usize = graph.modules.iter().map(|m| m.code.len() + 64).sum();
    let mut out = String::with_capacity(body_len + RUNTIME.len() + 128);
    let mut spans = Vec::with_capacity(graph.modules.len());
    if !banner.is_empty() {
        out.push_str(banner);
        out.push('\n');
    }
    out.push_str("(() => {\nvar __modules = {\n");
    for module in &graph.modules {
        let _ = writeln!(out, "{}: function (module, exports, require) {{", module.id);
        let start = out.len();
        out.push_str(&module.code);
        spans.push(ModuleSpan {
            start,
            end: out.len(),
        });
        out.push_str("\n},\n");
    }
    out.push_str("};\n");
    out.push_str(RUNTIME);
    out.push_str("return __require(0);\n})();\n");
    Assembled { text: out, spans }
}

pub(crate) fn emit(
    config: &BuildConfig,
    options: &BuildOptions,
    graph: &ModuleGraph,
) -> BuildResult<Emitted> {
    let assembled = assemble(&config.banner, graph);

    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, &assembled.text, SourceType::cjs()).parse();
    if let Some(error) = ret.errors.first() {
        return Err(BuildError::transform(&options.outfile, error.to_string()));
    }
    let mut program = ret.program;

    ConstantFolder::new(&allocator).visit_program(&mut program);
    if let Some(name) = &options.global_name {
        assign_global(&allocator, &mut program, name)
            .ok_or_else(|| BuildError::GlobalName(name.to_string()))?;
    }

    let source_map_path = options.source_map.then(|| options.outfile.clone());
    let codegen_options = if config.minify {
        CodegenOptions {
            source_map_path,
            ..CodegenOptions::minify()
        }
    } else {
        CodegenOptions {
            source_map_path,
            ..CodegenOptions::default()
        }
    };
    let ret = Codegen::new().with_options(codegen_options).build(&program);

    let mut code = ret.code;
    if !code.ends_with('\n') {
        code.push('\n');
    }
    let map = match ret.map {
        Some(map) => Some(
            compose(
                &map.to_json_string(),
                &assembled.text,
                &assembled.spans,
                graph,
                &options.outfile,
            )
            .map_err(|message| BuildError::transform(&options.outfile, message))?,
        ),
        None => None,
    };
    if map.is_some() {
        let map_file = options.map_file();
        let name = map_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let _ = writeln!(code, "//# sourceMappingURL={name}");
    }
    Ok(Emitted { code, map })
}

/// Rewrites the trailing `(() => { ... })();` into `root.a.b = (() => { ... })();`.
fn assign_global<'a>(
    allocator: &'a Allocator,
    program: &mut Program<'a>,
    name: &GlobalName,
) -> Option<()> {
    let ast = AstBuilder::new(allocator);
    let Some(Statement::ExpressionStatement(stmt)) = program.body.last_mut() else {
        return None;
    };

    let mut object = if name.root() == "this" {
        ast.expression_this(SPAN)
    } else {
        ast.expression_identifier(SPAN, allocator.alloc_str(name.root()))
    };
    let (last, parents) = name.properties().split_last()?;
    for prop in parents {
        let prop: &'a str = allocator.alloc_str(prop);
        object = Expression::from(ast.member_expression_static(
            SPAN,
            object,
            ast.identifier_name(SPAN, prop),
            false,
        ));
    }
    let last: &'a str = allocator.alloc_str(last);
    let target = ast.member_expression_static(SPAN, object, ast.identifier_name(SPAN, last), false);

    let value = stmt.expression.clone_in(allocator);
    stmt.expression = ast.expression_assignment(
        SPAN,
        AssignmentOperator::Assign,
        AssignmentTarget::from(SimpleAssignmentTarget::from(target)),
        value,
    );
    Some(())
}
