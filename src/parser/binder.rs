//! Fills the lexical scope tree by walking a parsed document.
//!
//! Markup is walked directly. Scripts and expressions are parsed with oxc and
//! walked with a [`Visit`] implementation. The declaration context is saved
//! before entering a declaration and restored on the way out.

use super::js;
use super::token::Span;
use crate::ast::{Attribute, Expr, Fragment, ScriptNode, ValuePart};
use crate::error::{ErrorKind, ParseError, ScopeError};
use crate::scope::{Flags, Import, ScopeId, Scopes};
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    ArrowFunctionExpression, BindingIdentifier, BlockStatement, CatchClause, ExportNamedDeclaration, ForInStatement,
    ForOfStatement, ForStatement, Function, FunctionType, IdentifierReference, ImportDeclaration,
    ImportDeclarationSpecifier, VariableDeclaration, VariableDeclarationKind,
};
use oxc_ast_visit::{Visit, walk};
use oxc_syntax::scope::ScopeFlags;

/// Build the scope tree for a document's fragments
pub fn bind(fragments: &[Fragment]) -> Result<Scopes, ParseError> {
    let scopes = Scopes::new();
    let root = scopes.root();
    let mut binder = Binder {
        scopes,
        scope: root,
        function_scope: root,
        base: 0,
        ctx: Flags::default(),
        error: None,
    };
    binder.fragments(root, fragments)?;
    Ok(binder.scopes)
}

struct Binder {
    scopes: Scopes,
    /// Scope that declarations bind in
    scope: ScopeId,
    /// Nearest function (or the document), where `var` binds
    function_scope: ScopeId,
    /// Template offset of the source being walked
    base: usize,
    /// Declaration context of the binding being walked
    ctx: Flags,
    error: Option<ScopeError>,
}

/// Walk state restored when a scope is left
struct Saved {
    scope: ScopeId,
    function_scope: ScopeId,
    ctx: Flags,
}

impl Binder {
    fn fragments(&mut self, scope: ScopeId, fragments: &[Fragment]) -> Result<(), ParseError> {
        for fragment in fragments {
            self.fragment(scope, fragment)?;
        }
        Ok(())
    }

    fn fragment(&mut self, scope: ScopeId, fragment: &Fragment) -> Result<(), ParseError> {
        match fragment {
            Fragment::Element(element) => {
                self.attributes(scope, &element.attributes)?;
                self.fragments(scope, &element.children)
            }
            Fragment::Component(component) => {
                self.reference(scope, &component.name);
                self.attributes(scope, &component.attributes)?;
                self.fragments(scope, &component.children)
            }
            Fragment::Script(script) => self.script(scope, script),
            Fragment::Mustache(expr) => self.expression(scope, expr),
            Fragment::If(node) => {
                self.expression(scope, &node.cond)?;
                self.fragments(scope, &node.then)?;
                self.fragments(scope, &node.else_)
            }
            Fragment::Each(node) => {
                self.expression(scope, &node.list)?;
                let body = self.scopes.new_child_at(scope, node.scope_anchor());
                let declared = Flags::default().declared();
                self.scopes.use_symbol(body, &node.value, declared);
                if let Some(index) = &node.index {
                    self.scopes.use_symbol(body, index, declared);
                }
                self.fragments(body, &node.body)?;
                self.fragments(scope, &node.else_)
            }
            Fragment::Slot(slot) => self.fragments(scope, &slot.fallback),
            Fragment::Style(_) | Fragment::Text(_) | Fragment::Comment(_) | Fragment::Doctype(_) => Ok(()),
        }
    }

    fn attributes(&mut self, scope: ScopeId, attributes: &[Attribute]) -> Result<(), ParseError> {
        for attribute in attributes {
            match attribute {
                Attribute::Field { values, .. } => {
                    for value in values {
                        if let ValuePart::Mustache(expr) = value {
                            self.expression(scope, expr)?;
                        }
                    }
                }
                Attribute::Shorthand { key, .. } => self.reference(scope, key),
                Attribute::Binding { expr, .. } => self.expression(scope, expr)?,
                Attribute::NamedSlot { .. } => {}
            }
        }
        Ok(())
    }

    fn script(&mut self, scope: ScopeId, script: &ScriptNode) -> Result<(), ParseError> {
        let allocator = Allocator::default();
        let program = js::parse_program(&allocator, &script.source, script.span)?;
        self.start(scope, script.span.start.byte);
        self.visit_program(&program);
        self.finish(script.span)
    }

    fn expression(&mut self, scope: ScopeId, expr: &Expr) -> Result<(), ParseError> {
        let allocator = Allocator::default();
        let parsed = expr.parse(&allocator)?;
        self.start(scope, expr.span.start.byte);
        self.visit_expression(&parsed);
        self.finish(expr.span)
    }

    fn start(&mut self, scope: ScopeId, base: usize) {
        self.scope = scope;
        self.function_scope = scope;
        self.base = base;
        self.ctx = Flags::default();
    }

    fn finish(&mut self, span: Span) -> Result<(), ParseError> {
        match self.error.take() {
            Some(err) => Err(ParseError::new(ErrorKind::Scope, err.to_string(), span)),
            None => Ok(()),
        }
    }

    fn fail(&mut self, err: ScopeError) {
        self.error.get_or_insert(err);
    }

    /// A use of `name` that is not a declaration. Names nothing declares yet
    /// belong to the document, so a later declaration there finds them.
    fn reference(&mut self, scope: ScopeId, name: &str) {
        let owner = match self.scopes.lookup_by_name(scope, name) {
            Some(_) => scope,
            None => self.scopes.root(),
        };
        self.scopes.use_symbol(owner, name, Flags::default());
    }

    /// Open the scope of the construct starting at `start` in the current source
    fn enter(&mut self, start: u32, function: bool) -> Saved {
        let saved = Saved { scope: self.scope, function_scope: self.function_scope, ctx: self.ctx };
        self.scope = self.scopes.new_child_at(self.scope, self.base + start as usize);
        if function {
            self.function_scope = self.scope;
        }
        self.ctx = Flags::default();
        saved
    }

    fn leave(&mut self, saved: Saved) {
        self.scope = saved.scope;
        self.function_scope = saved.function_scope;
        self.ctx = saved.ctx;
    }
}

impl<'a> Visit<'a> for Binder {
    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        self.reference(self.scope, ident.name.as_str());
    }

    fn visit_binding_identifier(&mut self, ident: &BindingIdentifier<'a>) {
        self.scopes.use_symbol(self.scope, ident.name.as_str(), self.ctx.declared());
    }

    fn visit_import_declaration(&mut self, decl: &ImportDeclaration<'a>) {
        let source = decl.source.value.to_string();
        let Some(specifiers) = &decl.specifiers else {
            return;
        };
        for specifier in specifiers.iter() {
            match specifier {
                ImportDeclarationSpecifier::ImportDefaultSpecifier(default) => {
                    let name = default.local.name.as_str();
                    self.scopes.use_symbol(self.scope, name, self.ctx.declared());
                    self.scopes.set_import(self.scope, name, Import { path: source.clone(), default: true });
                }
                _ => {
                    self.fail(ScopeError::NamedImports(source.clone()));
                    return;
                }
            }
        }
    }

    fn visit_export_named_declaration(&mut self, decl: &ExportNamedDeclaration<'a>) {
        let ctx = self.ctx;
        self.ctx = ctx.exported();
        walk::walk_export_named_declaration(self, decl);
        self.ctx = ctx;
    }

    fn visit_variable_declaration(&mut self, decl: &VariableDeclaration<'a>) {
        let mut flags = self.ctx;
        if matches!(decl.kind, VariableDeclarationKind::Var | VariableDeclarationKind::Let) {
            flags = flags.mutable();
        }
        let target = match decl.kind {
            VariableDeclarationKind::Var => self.function_scope,
            _ => self.scope,
        };
        let (scope, ctx) = (self.scope, self.ctx);
        for declarator in &decl.declarations {
            self.scope = target;
            self.ctx = flags;
            self.visit_binding_pattern(&declarator.id);
            // Initializers only read names
            self.scope = scope;
            self.ctx = Flags::default();
            if let Some(init) = &declarator.init {
                self.visit_expression(init);
            }
        }
        self.ctx = ctx;
    }

    fn visit_function(&mut self, func: &Function<'a>, _flags: ScopeFlags) {
        let declaration = matches!(func.r#type, FunctionType::FunctionDeclaration);
        // A declaration names the function in the enclosing scope, an
        // expression only inside itself
        if let (true, Some(id)) = (declaration, &func.id) {
            self.visit_binding_identifier(id);
        }
        let saved = self.enter(func.span.start, true);
        if let (false, Some(id)) = (declaration, &func.id) {
            self.visit_binding_identifier(id);
        }
        self.visit_formal_parameters(&func.params);
        if let Some(body) = &func.body {
            self.visit_function_body(body);
        }
        self.leave(saved);
    }

    fn visit_arrow_function_expression(&mut self, arrow: &ArrowFunctionExpression<'a>) {
        let saved = self.enter(arrow.span.start, true);
        self.visit_formal_parameters(&arrow.params);
        self.visit_function_body(&arrow.body);
        self.leave(saved);
    }

    fn visit_block_statement(&mut self, block: &BlockStatement<'a>) {
        let saved = self.enter(block.span.start, false);
        walk::walk_block_statement(self, block);
        self.leave(saved);
    }

    fn visit_catch_clause(&mut self, clause: &CatchClause<'a>) {
        let saved = self.enter(clause.span.start, false);
        walk::walk_catch_clause(self, clause);
        self.leave(saved);
    }

    fn visit_for_statement(&mut self, stmt: &ForStatement<'a>) {
        let saved = self.enter(stmt.span.start, false);
        walk::walk_for_statement(self, stmt);
        self.leave(saved);
    }

    fn visit_for_in_statement(&mut self, stmt: &ForInStatement<'a>) {
        let saved = self.enter(stmt.span.start, false);
        walk::walk_for_in_statement(self, stmt);
        self.leave(saved);
    }

    fn visit_for_of_statement(&mut self, stmt: &ForOfStatement<'a>) {
        let saved = self.enter(stmt.span.start, false);
        walk::walk_for_of_statement(self, stmt);
        self.leave(saved);
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::parse;

    #[test]
    fn test_block_declarations_shadow() {
        let source = "<script>let count = 0; function f(x) { if (x) { let count = 1; count++ } }</script>";
        let document = parse("test.duo", source).unwrap();
        let scopes = &document.scopes;
        let root = scopes.root();
        let function = scopes.children(root)[0];
        let block = scopes.children(function)[0];

        assert!(scopes.lookup_by_name(root, "count").unwrap().mutable);
        assert_eq!(scopes.resolve(block, "count").map(|(owner, _)| owner), Some(block));
        assert_eq!(scopes.resolve(function, "count").map(|(owner, _)| owner), Some(root));
        assert_eq!(scopes.resolve(block, "x").map(|(owner, _)| owner), Some(function));
    }

    #[test]
    fn test_free_names_belong_to_the_document() {
        // `later` is used inside the function before it is declared
        let source = "<script>function f() { later += 1 } let later = 0;</script>";
        let document = parse("test.duo", source).unwrap();
        let scopes = &document.scopes;
        let root = scopes.root();
        let function = scopes.children(root)[0];
        assert_eq!(scopes.resolve(function, "later").map(|(owner, _)| owner), Some(root));
        assert!(scopes.lookup_by_name(root, "later").unwrap().mutable);
    }

    #[test]
    fn test_var_binds_in_the_function() {
        let source = "<script>function f() { { var hoisted = 1 } }</script>";
        let document = parse("test.duo", source).unwrap();
        let scopes = &document.scopes;
        let function = scopes.children(scopes.root())[0];
        let symbols: Vec<&str> = scopes.symbols(function).iter().map(|symbol| symbol.name.as_str()).collect();
        assert_eq!(symbols, vec!["hoisted"]);
    }

    #[test]
    fn test_errors_inside_arrow_bodies() {
        let err = parse("test.duo", "<button onClick={() => { let = 1 }}>+</button>").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::InvalidSyntax);

        let err = parse("test.duo", "<script>setTimeout(() => { import x from './x.js' }, 1)</script>").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::InvalidSyntax);

        // Binding failures in a later script still surface
        let source = "<script>const f = () => { return 1 };</script><script>import { a } from './a.js';</script>";
        let err = parse("test.duo", source).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Scope);
    }
}
