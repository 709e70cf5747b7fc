//! Lowers a parsed document into a DOM construction module.
//!
//! The lowering is a pure function of the document and its scopes. Names
//! that resolve to the document scope are redirected to the reactive proxy
//! (in scripts) or to the props parameter (in markup) based on their symbol
//! flags. Names bound anywhere deeper are locals and stay as written.

use super::GenerateOptions;
use crate::ast::{Attribute, Document, ElementNode, Expr, Fragment, ScriptNode, ValuePart};
use crate::error::{Error, GenerateError, ScopeError};
use crate::parser::js;
use crate::scope::{ScopeId, Scopes};
use lazy_static::lazy_static;
use oxc_allocator::{Allocator, Box as ArenaBox, Vec as ArenaVec};
use oxc_ast::AstBuilder;
use oxc_ast::ast::{
    ArrowFunctionExpression, AssignmentTarget, BindingPattern, BlockStatement, CatchClause, Declaration, Expression,
    ForInStatement, ForOfStatement, ForStatement, Function, MemberExpression, ObjectProperty, SimpleAssignmentTarget,
    Statement, VariableDeclaration, VariableDeclarationKind,
};
use oxc_ast_visit::{VisitMut, walk_mut};
use oxc_span::SPAN;
use oxc_syntax::operator::{AssignmentOperator, LogicalOperator};
use oxc_syntax::scope::ScopeFlags;
use std::collections::HashSet;

lazy_static! {
    /// Browser and language globals that are never rewritten
    static ref GLOBALS: HashSet<&'static str> = [
        "window", "document", "console", "localStorage", "sessionStorage", "navigator",
        "location", "XMLHttpRequest", "setTimeout", "clearTimeout", "setInterval",
        "clearInterval", "requestAnimationFrame", "cancelAnimationFrame", "fetch", "atob",
        "btoa", "FormData", "URL", "URLSearchParams", "Headers", "AbortController", "Event",
        "CustomEvent", "MouseEvent", "KeyboardEvent", "FocusEvent", "TouchEvent",
        "IntersectionObserver", "IntersectionObserverEntry", "MutationObserver",
        "MutationRecord", "ResizeObserver", "ResizeObserverEntry", "Promise", "Symbol", "Map",
        "Set", "WeakMap", "WeakSet", "Intl", "Object", "Array", "Function", "Boolean", "Error",
        "EvalError", "RangeError", "ReferenceError", "SyntaxError", "TypeError", "URIError",
        "Number", "BigInt", "Math", "Date", "RegExp", "String", "JSON", "parseFloat",
        "parseInt", "isNaN", "isFinite", "decodeURI", "decodeURIComponent", "encodeURI",
        "encodeURIComponent", "eval", "NaN", "Infinity", "undefined",
    ]
    .into_iter()
    .collect();
}

pub fn is_global(name: &str) -> bool {
    GLOBALS.contains(name)
}

/// A lowered document, ready for printing
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    /// Import statements, printed as written
    pub imports: String,
    pub factory: String,
    pub proxy: String,
    pub props: String,
    /// Rewritten script statements
    pub body: String,
    /// The render expression returned for `props`
    pub root: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Script,
    Markup,
}

pub fn lower(document: &Document, options: &GenerateOptions) -> Result<Module, Error> {
    let mut scopes = document.scopes.clone();
    let root = scopes.root();
    for (id, name) in [("factory", &options.factory), ("proxy", &options.proxy), ("props", &options.props)] {
        let free = scopes.find_free(root, name);
        scopes.declare(root, id, &free)?;
    }
    let binding = |id: &str| {
        scopes
            .lookup_by_id(root, id)
            .map(|symbol| symbol.name.clone())
            .ok_or_else(|| ScopeError::UnresolvedBinding(id.to_string()))
    };
    let factory = binding("factory")?;
    let proxy = binding("proxy")?;
    let props = binding("props")?;

    let lowering = Lowering {
        targets: Targets { scopes: &scopes, proxy: &proxy, props: &props },
        factory: &factory,
    };

    let mut imports = String::new();
    let mut body = String::new();
    let mut nodes = Vec::new();
    for fragment in &document.fragments {
        match fragment {
            Fragment::Script(script) => {
                let (script_imports, script_body) = lowering.script(script)?;
                imports.push_str(&script_imports);
                body.push_str(&script_body);
            }
            Fragment::Text(text) if text.trim().is_empty() => {}
            fragment => {
                if let Some(node) = lowering.fragment(root, fragment)? {
                    nodes.push(node);
                }
            }
        }
    }

    let root = match nodes.len() {
        0 => "null".to_string(),
        1 => nodes.remove(0),
        _ => format!("[{}]", nodes.join(", ")),
    };
    Ok(Module { imports, factory, proxy, props, body, root })
}

/// Decides which object a name is read from
#[derive(Clone, Copy)]
struct Targets<'s> {
    scopes: &'s Scopes,
    proxy: &'s str,
    props: &'s str,
}

impl<'s> Targets<'s> {
    /// The object `name` is a property of, as seen from `scope`, or `None`
    /// when it stays a plain identifier
    fn object(&self, scope: ScopeId, context: Context, name: &str) -> Option<&'s str> {
        if is_global(name) {
            return None;
        }
        let symbol = match self.scopes.resolve(scope, name) {
            // Bound by a function, block or loop
            Some((owner, _)) if owner != self.scopes.root() => return None,
            Some((_, symbol)) => Some(symbol),
            None => None,
        };
        match (context, symbol) {
            (Context::Script, Some(symbol)) if symbol.mutable => Some(self.proxy),
            (Context::Script, _) => None,
            (Context::Markup, Some(symbol)) if symbol.declared && !symbol.mutable => None,
            (Context::Markup, _) => Some(self.props),
        }
    }
}

/// Rewrites identifiers in place, following the scopes the binder anchored
/// in the same source
struct Renamer<'s, 'a> {
    ast: AstBuilder<'a>,
    targets: Targets<'s>,
    scope: ScopeId,
    /// Template offset of the source being rewritten
    base: usize,
    context: Context,
}

impl<'s, 'a> Renamer<'s, 'a> {
    fn new(allocator: &'a Allocator, targets: Targets<'s>, scope: ScopeId, base: usize, context: Context) -> Self {
        Self { ast: AstBuilder::new(allocator), targets, scope, base, context }
    }

    fn member(&self, object: &str, property: &str) -> MemberExpression<'a> {
        let allocator = self.ast.allocator;
        self.ast.member_expression_static(
            SPAN,
            self.ast.expression_identifier(SPAN, allocator.alloc_str(object)),
            self.ast.identifier_name(SPAN, allocator.alloc_str(property)),
            false,
        )
    }

    fn renamed(&self, name: &str) -> Option<MemberExpression<'a>> {
        let object = self.targets.object(self.scope, self.context, name)?;
        Some(self.member(object, name))
    }

    /// Move into the scope opened at `start`, returning the one to restore
    fn enter(&mut self, start: u32) -> ScopeId {
        let outer = self.scope;
        if let Some(scope) = self.targets.scopes.scope_at(self.base + start as usize) {
            self.scope = scope;
        }
        outer
    }

    /// `let`/`var` at the top of a script become assignments to the proxy.
    /// Exported ones keep a value the host passed in.
    fn state(
        &mut self,
        mut decl: ArenaBox<'a, VariableDeclaration<'a>>,
        exported: bool,
        body: &mut ArenaVec<'a, Statement<'a>>,
    ) -> Result<(), GenerateError> {
        if !matches!(decl.kind, VariableDeclarationKind::Var | VariableDeclarationKind::Let) {
            let mut stmt = Statement::VariableDeclaration(decl);
            self.visit_statement(&mut stmt);
            body.push(stmt);
            return Ok(());
        }
        for declarator in decl.declarations.iter_mut() {
            let BindingPattern::BindingIdentifier(id) = &declarator.id else {
                return Err(GenerateError::Unsupported("destructuring declaration".to_string()));
            };
            let name = id.name.to_string();
            // Uninitialized state comes in through the proxy as is
            let Some(mut init) = declarator.init.take() else {
                continue;
            };
            self.visit_expression(&mut init);
            let value = if exported {
                let current = Expression::from(self.member(self.targets.proxy, &name));
                self.ast.expression_logical(SPAN, current, LogicalOperator::Or, init)
            } else {
                init
            };
            let target = SimpleAssignmentTarget::from(self.member(self.targets.proxy, &name));
            let assign =
                self.ast.expression_assignment(SPAN, AssignmentOperator::Assign, AssignmentTarget::from(target), value);
            body.push(self.ast.statement_expression(SPAN, assign));
        }
        Ok(())
    }
}

impl<'a> VisitMut<'a> for Renamer<'_, 'a> {
    fn visit_expression(&mut self, expr: &mut Expression<'a>) {
        if let Expression::Identifier(ident) = expr {
            let name = ident.name.to_string();
            if let Some(member) = self.renamed(&name) {
                *expr = Expression::from(member);
            }
            return;
        }
        walk_mut::walk_expression(self, expr);
    }

    fn visit_simple_assignment_target(&mut self, target: &mut SimpleAssignmentTarget<'a>) {
        if let SimpleAssignmentTarget::AssignmentTargetIdentifier(ident) = target {
            let name = ident.name.to_string();
            if let Some(member) = self.renamed(&name) {
                *target = SimpleAssignmentTarget::from(member);
            }
            return;
        }
        walk_mut::walk_simple_assignment_target(self, target);
    }

    fn visit_object_property(&mut self, prop: &mut ObjectProperty<'a>) {
        walk_mut::walk_object_property(self, prop);
        // `{ count }` whose value was rewritten needs its key written out
        if prop.shorthand && !matches!(prop.value, Expression::Identifier(_)) {
            prop.shorthand = false;
        }
    }

    fn visit_function(&mut self, func: &mut Function<'a>, flags: ScopeFlags) {
        let outer = self.enter(func.span.start);
        walk_mut::walk_function(self, func, flags);
        self.scope = outer;
    }

    fn visit_arrow_function_expression(&mut self, arrow: &mut ArrowFunctionExpression<'a>) {
        let outer = self.enter(arrow.span.start);
        walk_mut::walk_arrow_function_expression(self, arrow);
        self.scope = outer;
    }

    fn visit_block_statement(&mut self, block: &mut BlockStatement<'a>) {
        let outer = self.enter(block.span.start);
        walk_mut::walk_block_statement(self, block);
        self.scope = outer;
    }

    fn visit_catch_clause(&mut self, clause: &mut CatchClause<'a>) {
        let outer = self.enter(clause.span.start);
        walk_mut::walk_catch_clause(self, clause);
        self.scope = outer;
    }

    fn visit_for_statement(&mut self, stmt: &mut ForStatement<'a>) {
        let outer = self.enter(stmt.span.start);
        walk_mut::walk_for_statement(self, stmt);
        self.scope = outer;
    }

    fn visit_for_in_statement(&mut self, stmt: &mut ForInStatement<'a>) {
        let outer = self.enter(stmt.span.start);
        walk_mut::walk_for_in_statement(self, stmt);
        self.scope = outer;
    }

    fn visit_for_of_statement(&mut self, stmt: &mut ForOfStatement<'a>) {
        let outer = self.enter(stmt.span.start);
        walk_mut::walk_for_of_statement(self, stmt);
        self.scope = outer;
    }
}

struct Lowering<'d> {
    targets: Targets<'d>,
    factory: &'d str,
}

impl Lowering<'_> {
    // === Scripts ===

    /// Printed imports and rewritten statements of one script
    fn script(&self, script: &ScriptNode) -> Result<(String, String), Error> {
        let allocator = Allocator::default();
        let ast = AstBuilder::new(&allocator);
        let mut program = js::parse_program(&allocator, &script.source, script.span)?;
        let root = self.targets.scopes.root();
        let mut renamer = Renamer::new(&allocator, self.targets, root, script.span.start.byte, Context::Script);

        let mut imports = ast.vec();
        let mut body = ast.vec();
        let statements = std::mem::replace(&mut program.body, ast.vec());
        for stmt in statements {
            match stmt {
                Statement::ImportDeclaration(_) => imports.push(stmt),
                Statement::ExportNamedDeclaration(mut export) => match export.declaration.take() {
                    Some(Declaration::VariableDeclaration(decl)) => renamer.state(decl, true, &mut body)?,
                    Some(declaration) => {
                        let mut stmt = Statement::from(declaration);
                        renamer.visit_statement(&mut stmt);
                        body.push(stmt);
                    }
                    None => return Err(GenerateError::Unsupported("export list".to_string()).into()),
                },
                Statement::ExportDefaultDeclaration(_) | Statement::ExportAllDeclaration(_) => {
                    return Err(GenerateError::Unsupported("default export".to_string()).into());
                }
                Statement::VariableDeclaration(decl) => renamer.state(decl, false, &mut body)?,
                mut stmt => {
                    renamer.visit_statement(&mut stmt);
                    body.push(stmt);
                }
            }
        }

        let imports = if imports.is_empty() { String::new() } else { js::print_statements(&allocator, imports) };
        let body = if body.is_empty() { String::new() } else { js::print_statements(&allocator, body) };
        Ok((imports, body))
    }

    // === Markup ===

    /// A template expression, rewritten and printed so it can stand as an
    /// operand anywhere
    fn expression(&self, scope: ScopeId, expr: &Expr) -> Result<String, Error> {
        let allocator = Allocator::default();
        let mut parsed = expr.parse(&allocator)?;
        let mut renamer = Renamer::new(&allocator, self.targets, scope, expr.span.start.byte, Context::Markup);
        renamer.visit_expression(&mut parsed);
        let primary = js::is_primary(&parsed);
        let printed = js::print_expression(&allocator, parsed);
        Ok(if primary { printed } else { format!("({})", printed) })
    }

    /// A bare name from markup, such as a `{key}` shorthand
    fn name(&self, scope: ScopeId, name: &str) -> String {
        match self.targets.object(scope, Context::Markup, name) {
            Some(object) => format!("{}.{}", object, name),
            None => name.to_string(),
        }
    }

    fn fragments(&self, scope: ScopeId, fragments: &[Fragment]) -> Result<Vec<String>, Error> {
        let mut nodes = Vec::new();
        for fragment in fragments {
            if let Some(node) = self.fragment(scope, fragment)? {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    fn fragment(&self, scope: ScopeId, fragment: &Fragment) -> Result<Option<String>, Error> {
        let node = match fragment {
            Fragment::Element(element) => self.element(scope, &quote(&element.name), element)?,
            Fragment::Component(component) => self.element(scope, &component.name, component)?,
            Fragment::Text(text) => quote(text),
            Fragment::Mustache(expr) => self.expression(scope, expr)?,
            Fragment::If(node) => {
                let test = self.expression(scope, &node.cond)?;
                let then = self.fragments(scope, &node.then)?;
                let otherwise = if node.else_.is_empty() {
                    "null".to_string()
                } else {
                    format!("[{}]", self.fragments(scope, &node.else_)?.join(", "))
                };
                format!("{} ? [{}] : {}", test, then.join(", "), otherwise)
            }
            Fragment::Each(node) => {
                let list = self.expression(scope, &node.list)?;
                let mut params = vec![node.value.clone()];
                params.extend(node.index.iter().cloned());

                let body_scope = self.targets.scopes.scope_at(node.scope_anchor()).unwrap_or(scope);
                let body = self.fragments(body_scope, &node.body)?;
                let map = format!("({} || []).map(({}) => [{}])", list, params.join(", "), body.join(", "));
                if node.else_.is_empty() {
                    map
                } else {
                    let otherwise = self.fragments(scope, &node.else_)?;
                    format!("{0} && {0}.length ? {1} : [{2}]", list, map, otherwise.join(", "))
                }
            }
            Fragment::Slot(slot) => {
                if slot.name.is_some() {
                    return Err(GenerateError::NamedSlots.into());
                }
                format!("{}.children", self.targets.props)
            }
            Fragment::Script(_) => {
                return Err(GenerateError::Unsupported("<script> inside markup".to_string()).into());
            }
            Fragment::Style(_) | Fragment::Comment(_) | Fragment::Doctype(_) => return Ok(None),
        };
        Ok(Some(node))
    }

    /// `h(tag, { props }, [children])`
    fn element(&self, scope: ScopeId, tag: &str, node: &ElementNode) -> Result<String, Error> {
        let mut props = Vec::new();
        for attribute in &node.attributes {
            let value = match attribute {
                Attribute::Field { values, .. } => self.attribute_value(scope, values)?,
                Attribute::Shorthand { key, .. } => self.name(scope, key),
                Attribute::Binding { expr, .. } => self.expression(scope, expr)?,
                Attribute::NamedSlot { name } => quote(name),
            };
            props.push(format!("{}: {}", property_key(attribute.key()), value));
        }
        let props = if props.is_empty() { "{}".to_string() } else { format!("{{ {} }}", props.join(", ")) };
        let children = self.fragments(scope, &node.children)?;
        Ok(format!("{}({}, {}, [{}])", self.factory, tag, props, children.join(", ")))
    }

    fn attribute_value(&self, scope: ScopeId, values: &[ValuePart]) -> Result<String, Error> {
        let mut parts = Vec::with_capacity(values.len());
        for part in values {
            parts.push(match part {
                ValuePart::Text(text) => quote(text),
                ValuePart::Mustache(expr) => self.expression(scope, expr)?,
            });
        }
        Ok(if parts.is_empty() { "true".to_string() } else { parts.join(" + ") })
    }
}

/// JavaScript string literal for `text`
fn quote(text: &str) -> String {
    serde_json::Value::from(text).to_string()
}

/// Object keys are bare when they are identifiers
fn property_key(key: &str) -> String {
    let mut chars = key.chars();
    let identifier = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if identifier { key.to_string() } else { quote(key) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::js::compact;
    use crate::parser::parse;

    fn lowered(source: &str) -> Module {
        let document = parse("test.duo", source).unwrap();
        lower(&document, &GenerateOptions::default()).unwrap()
    }

    #[test]
    fn test_markup_rewrites_props() {
        let module = lowered("<h1 class=\"a-{b}\" data-id={id}>{greeting} {Math.max(n, 1)}</h1>");
        assert_eq!(
            module.root,
            r#"h("h1", { class: "a-" + props.b, "data-id": props.id }, [props.greeting, " ", Math.max(props.n, 1)])"#
        );
    }

    #[test]
    fn test_script_rewrites_proxy() {
        let module = lowered(
            "<script>export let count = 0; let step = 1; const max = 10; function add(n) { count += n + step; }</script>",
        );
        assert_eq!(
            compact(&module.body),
            compact(
                "proxy.count = proxy.count || 0;
                proxy.step = 1;
                const max = 10;
                function add(n) { proxy.count += n + proxy.step; }"
            )
        );
        assert_eq!(module.root, "null");
    }

    #[test]
    fn test_shadowed_locals_stay() {
        let module = lowered("<script>let count = 0; function f(x) { if (x) { let count = 1; count++ } }</script>");
        assert_eq!(
            compact(&module.body),
            compact("proxy.count = 0; function f(x) { if (x) { let count = 1; count++; } }")
        );

        let module = lowered("<script>let n = 0; const inc = (n) => n + 1; function g() { for (let n of []) n; n++ }</script>");
        assert_eq!(
            compact(&module.body),
            compact("proxy.n = 0; const inc = (n) => n + 1; function g() { for (let n of []) n; proxy.n++; }")
        );
    }

    #[test]
    fn test_shorthand_properties() {
        let module = lowered("<script>let count = 0; const snapshot = () => ({ count });</script>");
        assert_eq!(
            compact(&module.body),
            compact("proxy.count = 0; const snapshot = () => ({ count: proxy.count });")
        );
    }

    #[test]
    fn test_declared_names_stay() {
        let module = lowered("<script>import Box from './Box.duo'; const title = 'x';</script><Box {title}>{title}</Box>");
        assert_eq!(compact(&module.imports), compact(r#"import Box from "./Box.duo";"#));
        assert_eq!(module.root, "h(Box, { title: title }, [title])");
    }

    #[test]
    fn test_blocks() {
        let module = lowered("{#if ok}<b>yes</b>{/if}");
        assert_eq!(module.root, r#"props.ok ? [h("b", {}, ["yes"])] : null"#);

        let module = lowered("<ul>{#each items as item, i}<li>{i}{item}{rest}</li>{/each}</ul>");
        assert_eq!(
            module.root,
            r#"h("ul", {}, [(props.items || []).map((item, i) => [h("li", {}, [i, item, props.rest])])])"#
        );

        // Arrows in markup see the loop bindings and their own parameters
        let module = lowered("{#each items as item}<b onClick={(e) => pick(item, e)} />{/each}");
        assert_eq!(
            compact(&module.root),
            compact(r#"(props.items || []).map((item) => [h("b", { onClick: ((e) => props.pick(item, e)) }, [])])"#)
        );
    }

    #[test]
    fn test_fresh_names() {
        let module = lowered("<script>const h = 1;</script><p>{h}</p>");
        assert_eq!(module.factory, "h0");
        assert_eq!(module.root, r#"h0("p", {}, [h])"#);
    }

    #[test]
    fn test_unsupported_scripts() {
        let document = parse("test.duo", "<script>let { a } = b;</script>").unwrap();
        let err = lower(&document, &GenerateOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "generate: unsupported destructuring declaration");

        let document = parse("test.duo", "<script>export default 1;</script>").unwrap();
        let err = lower(&document, &GenerateOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "generate: unsupported default export");
    }

    #[test]
    fn test_named_slots_fail() {
        let document = parse("test.duo", r#"<div><slot name="x" /></div>"#).unwrap();
        let err = lower(&document, &GenerateOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "generate: named slots not implemented yet");
    }
}
