//! Module linking.
//!
//! Rewrites one compiled module so it can run inside the bundle registry as
//! `function (module, exports, require) { ... }`:
//!
//! - `import` declarations are removed; each imported module is required
//!   once into a hoisted variable and every reference to an imported binding
//!   reads through it, so bindings stay live and cycles see no TDZ
//! - `export` declarations keep their bodies; exported names become lazy
//!   getters on `exports`, defined before the body runs
//! - `require("x")` and `import("x")` specifiers are replaced with module ids
//!
//! Edits are collected as spans and spliced into the compiled text, so the
//! module body is never re-printed.

use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_ast_visit::{walk, Visit};
use oxc_parser::Parser;
use oxc_semantic::{Scoping, SemanticBuilder};
use oxc_span::{GetSpan, SourceType, Span};
use oxc_syntax::symbol::SymbolId;
use std::collections::HashMap;
use std::path::Path;

use super::mapping::Segment;
use super::text::js_string;
use crate::error::{BuildError, BuildResult};

/// What a specifier resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleRef {
    Id(usize),
    /// Left as a string; requiring it throws at runtime.
    External(String),
}

impl ModuleRef {
    fn render(&self) -> String {
        match self {
            ModuleRef::Id(id) => id.to_string(),
            ModuleRef::External(specifier) => js_string(specifier),
        }
    }
}

struct Edit {
    start: u32,
    end: u32,
    text: String,
}

impl Edit {
    fn replace(span: Span, text: impl Into<String>) -> Self {
        Edit {
            start: span.start,
            end: span.end,
            text: text.into(),
        }
    }

    fn remove(span: Span) -> Self {
        Self::replace(span, "")
    }
}

/// A linked module body and how its text lines up with the compiled input.
#[derive(Debug, Clone)]
pub struct Linked {
    pub code: String,
    pub(crate) segments: Vec<Segment>,
}

#[derive(Default)]
struct ModuleShape {
    is_esm: bool,
    getters: Vec<(String, String)>,
    hoisted: Vec<String>,
    edits: Vec<Edit>,
    /// Imported binding to the expression that reads it.
    imports: HashMap<SymbolId, String>,
    /// Same, by local name, for `export { local }` lists.
    import_names: HashMap<String, String>,
    counter: usize,
}

impl ModuleShape {
    fn fresh(&mut self, prefix: &str) -> String {
        let name = format!("{prefix}{}", self.counter);
        self.counter += 1;
        name
    }
}

/// Links `code`, calling `resolve` once per specifier occurrence.
pub fn link_module<F>(path: &Path, code: &str, mut resolve: F) -> BuildResult<Linked>
where
    F: FnMut(&str) -> BuildResult<ModuleRef>,
{
    let allocator = Allocator::default();
    let mut ret = Parser::new(&allocator, code, SourceType::mjs()).parse();
    if !ret.errors.is_empty() {
        ret = Parser::new(&allocator, code, SourceType::cjs()).parse();
    }
    if let Some(error) = ret.errors.first() {
        return Err(BuildError::parse(path, error.to_string()));
    }
    let program = ret.program;
    let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();

    let mut shape = ModuleShape::default();
    for stmt in &program.body {
        link_statement(stmt, &mut shape, &mut resolve)?;
    }

    if !shape.imports.is_empty() {
        let mut rewriter = ImportRewriter {
            scoping: &scoping,
            imports: &shape.imports,
            edits: Vec::new(),
        };
        rewriter.visit_program(&program);
        shape.edits.extend(rewriter.edits);
    }

    let mut calls = RequireCollector::default();
    calls.visit_program(&program);
    for call in calls.found {
        match call {
            Request::Require { span, specifier } => {
                let target = resolve(&specifier)?.render();
                shape.edits.push(Edit::replace(span, target));
            }
            Request::Dynamic { span, specifier } => {
                let target = resolve(&specifier)?.render();
                shape.edits.push(Edit::replace(
                    span,
                    format!("Promise.resolve().then(() => require({target}))"),
                ));
            }
            Request::Meta { span } => {
                let file = path.file_name().map(|f| f.to_string_lossy().into_owned());
                let url = js_string(&file.unwrap_or_default());
                shape.edits.push(Edit::replace(span, format!("({{ url: {url} }})")));
            }
        }
    }

    let (body, segments) = splice(path, code, shape.edits)?;

    let mut out = String::with_capacity(body.len() + 256);
    if shape.is_esm {
        out.push_str("__markModule(exports);\n");
    }
    for (name, value) in &shape.getters {
        out.push_str(&format!(
            "__export(exports, {}, () => {});\n",
            js_string(name),
            value
        ));
    }
    for line in &shape.hoisted {
        out.push_str(line);
        out.push('\n');
    }
    let preamble = out.len();
    out.push_str(&body);
    Ok(Linked {
        code: out,
        segments: segments.into_iter().map(|s| s.shifted(preamble)).collect(),
    })
}

fn link_statement<F>(stmt: &Statement, shape: &mut ModuleShape, resolve: &mut F) -> BuildResult<()>
where
    F: FnMut(&str) -> BuildResult<ModuleRef>,
{
    match stmt {
        Statement::ImportDeclaration(decl) => {
            shape.is_esm = true;
            shape.edits.push(Edit::remove(decl.span));
            if decl.import_kind.is_type() {
                return Ok(());
            }
            let target = resolve(decl.source.value.as_str())?.render();
            let specifiers = match &decl.specifiers {
                Some(specifiers) if !specifiers.is_empty() => specifiers,
                _ => {
                    shape.hoisted.push(format!("require({target});"));
                    return Ok(());
                }
            };
            let module_var = shape.fresh("__imp");
            shape
                .hoisted
                .push(format!("var {module_var} = __toESM(require({target}));"));
            for specifier in specifiers {
                let (local, value) = match specifier {
                    ImportDeclarationSpecifier::ImportSpecifier(s) => {
                        if s.import_kind.is_type() {
                            continue;
                        }
                        (&s.local, property(&module_var, &export_name(&s.imported)))
                    }
                    ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                        (&s.local, format!("{module_var}.default"))
                    }
                    ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                        (&s.local, module_var.clone())
                    }
                };
                if let Some(symbol) = local.symbol_id.get() {
                    shape.imports.insert(symbol, value.clone());
                }
                shape.import_names.insert(local.name.to_string(), value);
            }
        }
        Statement::ExportNamedDeclaration(decl) => {
            shape.is_esm = true;
            if decl.export_kind.is_type() {
                shape.edits.push(Edit::remove(decl.span));
                return Ok(());
            }
            if let Some(declaration) = &decl.declaration {
                shape.edits.push(Edit::remove(Span::new(
                    decl.span.start,
                    declaration.span().start,
                )));
                let mut names = Vec::new();
                declared_names(declaration, &mut names);
                for name in names {
                    shape.getters.push((name.clone(), name));
                }
            } else if let Some(source) = &decl.source {
                shape.edits.push(Edit::remove(decl.span));
                let target = resolve(source.value.as_str())?.render();
                let module_var = shape.fresh("__reexp");
                shape
                    .hoisted
                    .push(format!("var {module_var} = __toESM(require({target}));"));
                for spec in &decl.specifiers {
                    if spec.export_kind.is_type() {
                        continue;
                    }
                    let value = property(&module_var, &export_name(&spec.local));
                    shape.getters.push((export_name(&spec.exported), value));
                }
            } else {
                shape.edits.push(Edit::remove(decl.span));
                for spec in &decl.specifiers {
                    if spec.export_kind.is_type() {
                        continue;
                    }
                    let local = export_name(&spec.local);
                    let value = shape.import_names.get(&local).cloned().unwrap_or(local);
                    shape.getters.push((export_name(&spec.exported), value));
                }
            }
        }
        Statement::ExportDefaultDeclaration(decl) => {
            shape.is_esm = true;
            let named = match &decl.declaration {
                ExportDefaultDeclarationKind::FunctionDeclaration(func) => {
                    func.id.as_ref().map(|id| id.name.to_string())
                }
                ExportDefaultDeclarationKind::ClassDeclaration(class) => {
                    class.id.as_ref().map(|id| id.name.to_string())
                }
                ExportDefaultDeclarationKind::TSInterfaceDeclaration(_) => {
                    shape.edits.push(Edit::remove(decl.span));
                    return Ok(());
                }
                _ => None,
            };
            let prefix = Span::new(decl.span.start, decl.declaration.span().start);
            match named {
                Some(name) => {
                    shape.edits.push(Edit::remove(prefix));
                    shape.getters.push(("default".to_string(), name));
                }
                None => {
                    shape
                        .edits
                        .push(Edit::replace(prefix, "var __default_export = "));
                    shape
                        .edits
                        .push(Edit::replace(Span::new(decl.span.end, decl.span.end), ";"));
                    shape
                        .getters
                        .push(("default".to_string(), "__default_export".to_string()));
                }
            }
        }
        Statement::ExportAllDeclaration(decl) => {
            shape.is_esm = true;
            shape.edits.push(Edit::remove(decl.span));
            if decl.export_kind.is_type() {
                return Ok(());
            }
            let target = resolve(decl.source.value.as_str())?.render();
            match &decl.exported {
                Some(name) => {
                    let module_var = shape.fresh("__reexp");
                    shape
                        .hoisted
                        .push(format!("var {module_var} = __toESM(require({target}));"));
                    shape.getters.push((export_name(name), module_var));
                }
                None => shape
                    .hoisted
                    .push(format!("__exportStar(exports, require({target}));")),
            }
        }
        _ => {}
    }
    Ok(())
}

fn export_name(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::IdentifierName(id) => id.name.to_string(),
        ModuleExportName::IdentifierReference(id) => id.name.to_string(),
        ModuleExportName::StringLiteral(s) => s.value.to_string(),
    }
}

fn property(object: &str, name: &str) -> String {
    let is_ident = name
        .chars()
        .next()
        .is_some_and(|c| c == '_' || c == '$' || c.is_alphabetic())
        && name.chars().all(|c| c == '_' || c == '$' || c.is_alphanumeric());
    if is_ident {
        format!("{object}.{name}")
    } else {
        format!("{object}[{}]", js_string(name))
    }
}

fn declared_names(declaration: &Declaration, names: &mut Vec<String>) {
    match declaration {
        Declaration::VariableDeclaration(var) => {
            for declarator in &var.declarations {
                binding_names(&declarator.id, names);
            }
        }
        Declaration::FunctionDeclaration(func) => {
            if let Some(id) = &func.id {
                names.push(id.name.to_string());
            }
        }
        Declaration::ClassDeclaration(class) => {
            if let Some(id) = &class.id {
                names.push(id.name.to_string());
            }
        }
        _ => {}
    }
}

fn binding_names(pattern: &BindingPattern, names: &mut Vec<String>) {
    match pattern {
        BindingPattern::BindingIdentifier(id) => names.push(id.name.to_string()),
        BindingPattern::ObjectPattern(obj) => {
            for prop in &obj.properties {
                binding_names(&prop.value, names);
            }
            if let Some(rest) = &obj.rest {
                binding_names(&rest.argument, names);
            }
        }
        BindingPattern::ArrayPattern(arr) => {
            for element in arr.elements.iter().flatten() {
                binding_names(element, names);
            }
            if let Some(rest) = &arr.rest {
                binding_names(&rest.argument, names);
            }
        }
        BindingPattern::AssignmentPattern(assign) => binding_names(&assign.left, names),
    }
}

fn splice(path: &Path, code: &str, mut edits: Vec<Edit>) -> BuildResult<(String, Vec<Segment>)> {
    edits.sort_by_key(|e| (e.start, e.end));
    let mut out = String::with_capacity(code.len());
    let mut segments = Vec::with_capacity(edits.len() * 2 + 1);
    let mut cursor = 0usize;
    for edit in edits {
        let (start, end) = (edit.start as usize, edit.end as usize);
        if start < cursor || end > code.len() {
            return Err(BuildError::transform(
                path,
                format!("overlapping module rewrite at offset {start}"),
            ));
        }
        if start > cursor {
            segments.push(Segment::copied(out.len(), cursor, start - cursor));
            out.push_str(&code[cursor..start]);
        }
        if !edit.text.is_empty() {
            segments.push(Segment::replaced(out.len(), start, edit.text.len()));
            out.push_str(&edit.text);
        }
        cursor = end;
    }
    if cursor < code.len() {
        segments.push(Segment::copied(out.len(), cursor, code.len() - cursor));
        out.push_str(&code[cursor..]);
    }
    Ok((out, segments))
}

// ═══════════════════════════════════════════════════════════════════════════════
// IMPORT REWRITER
// Points every reference to an imported binding at the module object
// ═══════════════════════════════════════════════════════════════════════════════

struct ImportRewriter<'s> {
    scoping: &'s Scoping,
    imports: &'s HashMap<SymbolId, String>,
    edits: Vec<Edit>,
}

impl ImportRewriter<'_> {
    fn target(&self, ident: &IdentifierReference) -> Option<&str> {
        let reference = ident.reference_id.get()?;
        let symbol = self.scoping.get_reference(reference).symbol_id()?;
        self.imports.get(&symbol).map(String::as_str)
    }

    /// `f()` through a module object must not pass the module as `this`.
    fn rewrite_callee(&mut self, callee: &Expression) -> bool {
        let Expression::Identifier(ident) = callee else {
            return false;
        };
        let Some(target) = self.target(ident) else {
            return false;
        };
        let text = format!("(0, {target})");
        self.edits.push(Edit::replace(ident.span, text));
        true
    }
}

impl<'a> Visit<'a> for ImportRewriter<'_> {
    fn visit_import_declaration(&mut self, _decl: &ImportDeclaration<'a>) {}

    fn visit_export_all_declaration(&mut self, _decl: &ExportAllDeclaration<'a>) {}

    fn visit_export_named_declaration(&mut self, decl: &ExportNamedDeclaration<'a>) {
        // specifier lists are removed whole and become getters
        if let Some(declaration) = &decl.declaration {
            self.visit_declaration(declaration);
        }
    }

    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if self.rewrite_callee(&call.callee) {
            for argument in &call.arguments {
                self.visit_argument(argument);
            }
            return;
        }
        walk::walk_call_expression(self, call);
    }

    fn visit_tagged_template_expression(&mut self, expr: &TaggedTemplateExpression<'a>) {
        if self.rewrite_callee(&expr.tag) {
            self.visit_template_literal(&expr.quasi);
            return;
        }
        walk::walk_tagged_template_expression(self, expr);
    }

    fn visit_object_property(&mut self, prop: &ObjectProperty<'a>) {
        if prop.shorthand {
            if let Expression::Identifier(ident) = &prop.value {
                if let Some(target) = self.target(ident) {
                    let text = format!("{}: {target}", ident.name);
                    self.edits.push(Edit::replace(ident.span, text));
                    return;
                }
            }
        }
        walk::walk_object_property(self, prop);
    }

    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        if let Some(target) = self.target(ident) {
            let text = target.to_string();
            self.edits.push(Edit::replace(ident.span, text));
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REQUIRE COLLECTOR
// ═══════════════════════════════════════════════════════════════════════════════

enum Request {
    /// Span of the string argument of `require("x")`.
    Require { span: Span, specifier: String },
    /// Span of the whole `import("x")` expression.
    Dynamic { span: Span, specifier: String },
    Meta { span: Span },
}

#[derive(Default)]
struct RequireCollector {
    found: Vec<Request>,
}

impl<'a> Visit<'a> for RequireCollector {
    fn visit_call_expression(&mut self, expr: &CallExpression<'a>) {
        if let Expression::Identifier(callee) = &expr.callee {
            if callee.name == "require" && expr.arguments.len() == 1 {
                if let Argument::StringLiteral(lit) = &expr.arguments[0] {
                    self.found.push(Request::Require {
                        span: lit.span,
                        specifier: lit.value.to_string(),
                    });
                }
            }
        }
        walk::walk_call_expression(self, expr);
    }

    fn visit_import_expression(&mut self, expr: &ImportExpression<'a>) {
        if let Expression::StringLiteral(lit) = &expr.source {
            self.found.push(Request::Dynamic {
                span: expr.span,
                specifier: lit.value.to_string(),
            });
            return;
        }
        walk::walk_import_expression(self, expr);
    }

    fn visit_meta_property(&mut self, meta: &MetaProperty<'a>) {
        if meta.meta.name == "import" {
            self.found.push(Request::Meta { span: meta.span });
        }
    }
}
