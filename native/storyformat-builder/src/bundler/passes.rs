//! AST passes run on every script module before lowering.

use oxc_allocator::{Allocator, CloneIn};
use oxc_ast::ast::*;
use oxc_ast::AstBuilder;
use oxc_ast_visit::walk_mut::{
    walk_expression, walk_function_body, walk_object_property, walk_program, walk_statement,
};
use oxc_ast_visit::{Visit, VisitMut};
use oxc_parser::Parser;
use oxc_semantic::Scoping;
use oxc_span::{SourceType, SPAN};
use std::collections::HashSet;
use oxc_syntax::operator::{BinaryOperator, LogicalOperator, UnaryOperator};
use oxc_syntax::scope::ScopeFlags;
use oxc_syntax::symbol::SymbolId;

use crate::constants::ConstantMap;

// ═══════════════════════════════════════════════════════════════════════════════
// DEFINE REPLACER
// Substitutes dotted identifier paths with pre-serialized literals. Only
// paths rooted at a global (unresolved, or a top-level `declare`) qualify.
// ═══════════════════════════════════════════════════════════════════════════════

pub struct DefineReplacer<'a, 'd> {
    allocator: &'a Allocator,
    defines: &'d ConstantMap,
    scoping: &'d Scoping,
    ambient: HashSet<SymbolId>,
    pub replaced: usize,
}

impl<'a, 'd> DefineReplacer<'a, 'd> {
    /// `scoping` must be built from the program this replacer visits.
    pub fn new(allocator: &'a Allocator, defines: &'d ConstantMap, scoping: &'d Scoping) -> Self {
        Self {
            allocator,
            defines,
            scoping,
            ambient: HashSet::new(),
            replaced: 0,
        }
    }

    fn defined_key(&self, expr: &Expression) -> Option<String> {
        let key = dotted_path(expr)?;
        (self.defines.contains_key(&key) && self.is_global_root(expr)).then_some(key)
    }

    fn is_global_root(&self, expr: &Expression) -> bool {
        let Some(root) = root_identifier(expr) else {
            return false;
        };
        let Some(reference) = root.reference_id.get() else {
            return true;
        };
        match self.scoping.get_reference(reference).symbol_id() {
            None => true,
            Some(symbol) => self.ambient.contains(&symbol),
        }
    }

    fn literal_for(&self, expr: &Expression<'a>) -> Option<Expression<'a>> {
        let key = self.defined_key(expr)?;
        let literal = self.defines.get(&key)?;
        let text: &'a str = self.allocator.alloc_str(literal);
        Parser::new(self.allocator, text, SourceType::mjs())
            .parse_expression()
            .ok()
    }
}

/// `a`, `a.b`, `a.b.c` … as a string; `None` for anything else.
fn dotted_path(expr: &Expression) -> Option<String> {
    match expr {
        Expression::Identifier(id) => Some(id.name.to_string()),
        Expression::StaticMemberExpression(member) => {
            let object = dotted_path(&member.object)?;
            Some(format!("{}.{}", object, member.property.name))
        }
        _ => None,
    }
}

fn root_identifier<'e, 'a>(expr: &'e Expression<'a>) -> Option<&'e IdentifierReference<'a>> {
    match expr {
        Expression::Identifier(id) => Some(id),
        Expression::StaticMemberExpression(member) => root_identifier(&member.object),
        _ => None,
    }
}

/// Symbols bound by top-level `declare var/let/const` statements.
fn ambient_symbols(program: &Program) -> HashSet<SymbolId> {
    let mut symbols = DeclaredSymbols::default();
    for stmt in &program.body {
        if let Statement::VariableDeclaration(decl) = stmt {
            if decl.declare {
                for declarator in &decl.declarations {
                    symbols.visit_binding_pattern(&declarator.id);
                }
            }
        }
    }
    symbols.0
}

#[derive(Default)]
struct DeclaredSymbols(HashSet<SymbolId>);

impl<'a> Visit<'a> for DeclaredSymbols {
    fn visit_binding_identifier(&mut self, ident: &BindingIdentifier<'a>) {
        if let Some(symbol) = ident.symbol_id.get() {
            self.0.insert(symbol);
        }
    }
}

impl<'a> VisitMut<'a> for DefineReplacer<'a, '_> {
    fn visit_program(&mut self, program: &mut Program<'a>) {
        self.ambient = ambient_symbols(program);
        walk_program(self, program);
    }

    fn visit_expression(&mut self, expr: &mut Expression<'a>) {
        if self.defines.is_empty() {
            return;
        }
        if let Some(literal) = self.literal_for(expr) {
            *expr = literal;
            self.replaced += 1;
            return;
        }
        walk_expression(self, expr);
    }

    fn visit_object_property(&mut self, prop: &mut ObjectProperty<'a>) {
        // `{ DEBUG }` must print as `{ DEBUG: false }` once the value is replaced
        if prop.shorthand && self.defined_key(&prop.value).is_some() {
            prop.shorthand = false;
        }
        walk_object_property(self, prop);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STRICT DIRECTIVE STRIPPER
// The output banner carries a single "use strict" for the whole bundle
// ═══════════════════════════════════════════════════════════════════════════════

pub struct StrictDirectiveStripper;

fn is_strict(directive: &Directive) -> bool {
    directive.directive.as_str() == "use strict"
}

impl<'a> VisitMut<'a> for StrictDirectiveStripper {
    fn visit_program(&mut self, program: &mut Program<'a>) {
        program.directives.retain(|d| !is_strict(d));
        walk_program(self, program);
    }

    fn visit_function_body(&mut self, body: &mut FunctionBody<'a>) {
        body.directives.retain(|d| !is_strict(d));
        walk_function_body(self, body);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTANT FOLDER
// Folds branches whose condition is a literal after define substitution
// ═══════════════════════════════════════════════════════════════════════════════

pub struct ConstantFolder<'a> {
    allocator: &'a Allocator,
    ast: AstBuilder<'a>,
    pub folded: usize,
}

impl<'a> ConstantFolder<'a> {
    pub fn new(allocator: &'a Allocator) -> Self {
        Self {
            allocator,
            ast: AstBuilder::new(allocator),
            folded: 0,
        }
    }

    fn fold_statement(&self, stmt: &Statement<'a>) -> Option<Statement<'a>> {
        let Statement::IfStatement(if_stmt) = stmt else {
            return None;
        };
        let (kept, dropped) = if truthiness(&if_stmt.test)? {
            (Some(&if_stmt.consequent), if_stmt.alternate.as_ref())
        } else {
            (if_stmt.alternate.as_ref(), Some(&if_stmt.consequent))
        };
        let kept = kept.map(|s| s.clone_in(self.allocator));

        // `var`s in the dropped branch are still hoisted into the enclosing scope
        let mut hoisted = HoistedVars::default();
        if let Some(dropped) = dropped {
            hoisted.visit_statement(dropped);
        }
        if hoisted.names.is_empty() {
            return Some(kept.unwrap_or_else(|| self.ast.statement_empty(SPAN)));
        }
        let declaration = format!("var {};", hoisted.names.join(", "));
        let Some(kept) = kept else {
            return self.parse_statement(&declaration);
        };
        let mut block = self.parse_statement(&format!("{{{declaration}}}"))?;
        if let Statement::BlockStatement(body) = &mut block {
            body.body.push(kept);
        }
        Some(block)
    }

    fn parse_statement(&self, text: &str) -> Option<Statement<'a>> {
        let text: &'a str = self.allocator.alloc_str(text);
        let ret = Parser::new(self.allocator, text, SourceType::mjs()).parse();
        if !ret.errors.is_empty() {
            return None;
        }
        ret.program
            .body
            .first()
            .map(|stmt| stmt.clone_in(self.allocator))
    }

    fn fold_expression(&self, expr: &Expression<'a>) -> Option<Expression<'a>> {
        match expr {
            Expression::ConditionalExpression(cond) => {
                let branch = if truthiness(&cond.test)? {
                    &cond.consequent
                } else {
                    &cond.alternate
                };
                Some(branch.clone_in(self.allocator))
            }
            Expression::LogicalExpression(logical) => {
                let keep_left = match logical.operator {
                    LogicalOperator::And => !truthiness(&logical.left)?,
                    LogicalOperator::Or => truthiness(&logical.left)?,
                    LogicalOperator::Coalesce => !is_nullish(&logical.left)?,
                };
                let side = if keep_left {
                    &logical.left
                } else {
                    &logical.right
                };
                Some(side.clone_in(self.allocator))
            }
            Expression::UnaryExpression(unary) if unary.operator == UnaryOperator::LogicalNot => {
                let value = truthiness(&unary.argument)?;
                Some(self.ast.expression_boolean_literal(SPAN, !value))
            }
            Expression::BinaryExpression(_) => {
                let value = truthiness(expr)?;
                Some(self.ast.expression_boolean_literal(SPAN, value))
            }
            _ => None,
        }
    }
}

impl<'a> VisitMut<'a> for ConstantFolder<'a> {
    fn visit_statement(&mut self, stmt: &mut Statement<'a>) {
        walk_statement(self, stmt);
        if let Some(folded) = self.fold_statement(stmt) {
            *stmt = folded;
            self.folded += 1;
        }
    }

    fn visit_expression(&mut self, expr: &mut Expression<'a>) {
        walk_expression(self, expr);
        if let Some(folded) = self.fold_expression(expr) {
            *expr = folded;
            self.folded += 1;
        }
    }
}

/// Names declared with `var` in a statement, excluding nested functions.
#[derive(Default)]
struct HoistedVars {
    names: Vec<String>,
    in_pattern: bool,
}

impl<'a> Visit<'a> for HoistedVars {
    fn visit_variable_declaration(&mut self, decl: &VariableDeclaration<'a>) {
        if decl.kind != VariableDeclarationKind::Var {
            return;
        }
        for declarator in &decl.declarations {
            self.in_pattern = true;
            self.visit_binding_pattern(&declarator.id);
            self.in_pattern = false;
        }
    }

    fn visit_binding_identifier(&mut self, ident: &BindingIdentifier<'a>) {
        if self.in_pattern && !self.names.iter().any(|n| n == ident.name.as_str()) {
            self.names.push(ident.name.to_string());
        }
    }

    fn visit_function(&mut self, _func: &Function<'a>, _flags: ScopeFlags) {}

    fn visit_arrow_function_expression(&mut self, _arrow: &ArrowFunctionExpression<'a>) {}

    fn visit_static_block(&mut self, _block: &StaticBlock<'a>) {}
}

#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
    Undefined,
}

fn literal(expr: &Expression) -> Option<Literal> {
    match expr {
        Expression::StringLiteral(s) => Some(Literal::Str(s.value.to_string())),
        Expression::NumericLiteral(n) => Some(Literal::Num(n.value)),
        Expression::BooleanLiteral(b) => Some(Literal::Bool(b.value)),
        Expression::NullLiteral(_) => Some(Literal::Null),
        Expression::Identifier(id) if id.name == "undefined" => Some(Literal::Undefined),
        Expression::UnaryExpression(unary) if unary.operator == UnaryOperator::Void => {
            literal(&unary.argument).map(|_| Literal::Undefined)
        }
        Expression::ParenthesizedExpression(paren) => literal(&paren.expression),
        _ => None,
    }
}

fn is_nullish(expr: &Expression) -> Option<bool> {
    literal(expr).map(|lit| matches!(lit, Literal::Null | Literal::Undefined))
}

/// Static truthiness of `expr`, if it is known without evaluating side effects.
fn truthiness(expr: &Expression) -> Option<bool> {
    match expr {
        Expression::ParenthesizedExpression(paren) => truthiness(&paren.expression),
        Expression::UnaryExpression(unary) if unary.operator == UnaryOperator::LogicalNot => {
            truthiness(&unary.argument).map(|v| !v)
        }
        Expression::BinaryExpression(binary) => {
            let left = literal(&binary.left)?;
            let right = literal(&binary.right)?;
            match binary.operator {
                BinaryOperator::StrictEquality => Some(strict_equals(&left, &right)),
                BinaryOperator::StrictInequality => Some(!strict_equals(&left, &right)),
                BinaryOperator::Equality => loose_equals(&left, &right),
                BinaryOperator::Inequality => loose_equals(&left, &right).map(|v| !v),
                _ => None,
            }
        }
        Expression::LogicalExpression(logical) => {
            let left = truthiness(&logical.left)?;
            match logical.operator {
                LogicalOperator::And if !left => Some(false),
                LogicalOperator::Or if left => Some(true),
                LogicalOperator::And | LogicalOperator::Or => truthiness(&logical.right),
                LogicalOperator::Coalesce => None,
            }
        }
        _ => match literal(expr)? {
            Literal::Str(s) => Some(!s.is_empty()),
            Literal::Num(n) => Some(n != 0.0 && !n.is_nan()),
            Literal::Bool(b) => Some(b),
            Literal::Null | Literal::Undefined => Some(false),
        },
    }
}

fn strict_equals(left: &Literal, right: &Literal) -> bool {
    match (left, right) {
        (Literal::Num(a), Literal::Num(b)) => a == b,
        _ => left == right,
    }
}

/// `==` only where both sides share a type or both are nullish.
fn loose_equals(left: &Literal, right: &Literal) -> Option<bool> {
    let nullish = |l: &Literal| matches!(l, Literal::Null | Literal::Undefined);
    match (left, right) {
        (l, r) if nullish(l) && nullish(r) => Some(true),
        (l, r) if nullish(l) || nullish(r) => Some(false),
        (Literal::Str(_), Literal::Str(_))
        | (Literal::Num(_), Literal::Num(_))
        | (Literal::Bool(_), Literal::Bool(_)) => Some(strict_equals(left, right)),
        _ => None,
    }
}
