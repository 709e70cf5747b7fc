//! Embedded JavaScript, parsed and printed with oxc.
//!
//! Templates keep their scripts and `{expressions}` as source text. Each
//! pass that needs the syntax tree parses it again into an arena it owns.

use super::token::Span;
use crate::error::{ErrorKind, ParseError};
use oxc_allocator::{Allocator, Vec as ArenaVec};
use oxc_ast::AstBuilder;
use oxc_ast::ast::{Expression, Program, Statement};
use oxc_codegen::Codegen;
use oxc_parser::{ParseOptions, Parser};
use oxc_span::{SPAN, SourceType};
use std::cell::Cell;

/// Scripts are ES modules
pub fn source_type() -> SourceType {
    SourceType::default().with_module(true)
}

/// Parse a single expression, as written between `{` and `}`
pub fn parse_expression<'a>(allocator: &'a Allocator, source: &'a str, span: Span) -> Result<Expression<'a>, ParseError> {
    Parser::new(allocator, source, source_type())
        .parse_expression()
        .map_err(|errors| syntax_error(errors.first().map(ToString::to_string), span))
}

/// Parse the body of a `<script>` block
pub fn parse_program<'a>(allocator: &'a Allocator, source: &'a str, span: Span) -> Result<Program<'a>, ParseError> {
    let ret = Parser::new(allocator, source, source_type()).parse();
    if !ret.errors.is_empty() {
        return Err(syntax_error(ret.errors.first().map(ToString::to_string), span));
    }
    Ok(ret.program)
}

fn syntax_error(message: Option<String>, span: Span) -> ParseError {
    let message = message.unwrap_or_else(|| "invalid script".to_string());
    ParseError::new(ErrorKind::InvalidSyntax, message, span)
}

pub fn print_program(program: &Program<'_>) -> String {
    Codegen::new().build(program).code
}

/// Print an expression on its own, without the statement's `;`
pub fn print_expression<'a>(allocator: &'a Allocator, expr: Expression<'a>) -> String {
    let ast = AstBuilder::new(allocator);
    let mut body = ast.vec();
    body.push(ast.statement_expression(SPAN, expr));
    let code = print_statements(allocator, body);
    code.trim().trim_end_matches(';').to_string()
}

/// Print statements as a module body of their own
pub fn print_statements<'a>(allocator: &'a Allocator, body: ArenaVec<'a, Statement<'a>>) -> String {
    let ast = AstBuilder::new(allocator);
    let program = Program {
        span: SPAN,
        source_type: source_type(),
        hashbang: None,
        directives: ast.vec(),
        body,
        source_text: "",
        comments: ast.vec(),
        scope_id: Cell::new(None),
    };
    print_program(&program)
}

/// Reprint a generated module. Parentheses are dropped on parsing, so the
/// printer only emits the ones precedence requires.
pub fn format_module(source: &str) -> Result<String, ParseError> {
    let allocator = Allocator::default();
    let options = ParseOptions { preserve_parens: false, ..ParseOptions::default() };
    let ret = Parser::new(&allocator, source, source_type()).with_options(options).parse();
    if !ret.errors.is_empty() {
        return Err(syntax_error(ret.errors.first().map(ToString::to_string), Span::default()));
    }
    Ok(print_program(&ret.program))
}

/// Canonical form of an expression, or the trimmed text if it does not parse
pub fn canonical_expression(source: &str) -> String {
    let allocator = Allocator::default();
    match parse_expression(&allocator, source, Span::default()) {
        Ok(expr) => print_expression(&allocator, expr),
        Err(_) => source.trim().to_string(),
    }
}

/// Canonical form of a script body
pub fn canonical_program(source: &str) -> String {
    let allocator = Allocator::default();
    match parse_program(&allocator, source, Span::default()) {
        Ok(program) => print_program(&program).trim_end().to_string(),
        Err(_) => source.trim().to_string(),
    }
}

/// Whether `expr` binds tighter than any operator, so it can be the operand
/// of one without parentheses
pub fn is_primary(expr: &Expression<'_>) -> bool {
    matches!(
        expr,
        Expression::Identifier(_)
            | Expression::StringLiteral(_)
            | Expression::NumericLiteral(_)
            | Expression::BooleanLiteral(_)
            | Expression::NullLiteral(_)
            | Expression::TemplateLiteral(_)
            | Expression::ArrayExpression(_)
            | Expression::ObjectExpression(_)
            | Expression::ParenthesizedExpression(_)
            | Expression::StaticMemberExpression(_)
            | Expression::ComputedMemberExpression(_)
            | Expression::CallExpression(_)
    )
}

/// Remove whitespace, for comparing printed code regardless of layout
#[cfg(test)]
pub fn compact(code: &str) -> String {
    code.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_expression() {
        assert_eq!(canonical_expression(" greeting "), "greeting");
        assert_eq!(canonical_expression("count === 1 ? 'time' : 'times'"), r#"count === 1 ? "time" : "times""#);
        assert_eq!(canonical_expression("a||b"), "a || b");
        assert_eq!(compact(&canonical_expression("()=>{count++}")), "()=>{count++;}");
    }

    #[test]
    fn test_canonical_program() {
        let printed = canonical_program(r#"export let greeting = "hello"; setInterval(() => { greeting += "o"; }, 500); "#);
        assert_eq!(
            compact(&printed),
            compact(r#"export let greeting = "hello"; setInterval(() => { greeting += "o"; }, 500);"#)
        );
    }

    #[test]
    fn test_syntax_errors() {
        let allocator = Allocator::default();
        let err = parse_expression(&allocator, "a +", Span::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidSyntax);
        let err = parse_program(&allocator, "let = ;", Span::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidSyntax);
        // A script is a module, so imports must be at the top level
        assert!(parse_program(&allocator, "function f() { import x from 'y'; }", Span::default()).is_err());
    }

    #[test]
    fn test_format_module() {
        let printed = format_module("export default function(h) { return (p) => [(p.a), ((p.b || []))]; }").unwrap();
        assert_eq!(compact(&printed), "exportdefaultfunction(h){return(p)=>[p.a,p.b||[]];}");
        assert!(format_module("export default function(").is_err());
    }

    #[test]
    fn test_is_primary() {
        let allocator = Allocator::default();
        let primary = |src: &'static str| is_primary(&parse_expression(&allocator, src, Span::default()).unwrap());
        assert!(primary("a.b"));
        assert!(primary("f(x)"));
        assert!(!primary("a || b"));
        assert!(!primary("a ? b : c"));
    }
}
