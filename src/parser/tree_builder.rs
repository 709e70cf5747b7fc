use super::js;
use super::token::{Span, Token, TokenKind};
use crate::ast::*;
use crate::error::{ErrorKind, ParseError};
use crate::html;
use oxc_allocator::Allocator;
use oxc_ast::ast::Expression;
use std::collections::HashMap;

/// Builds fragments from a token stream
pub struct TreeBuilder<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

/// Tag header: everything between `<name` and `>` or `/>`
struct TagHead {
    name: String,
    span: Span,
    attributes: Vec<Attribute>,
    self_closing: bool,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(source: &'a str, tokens: Vec<Token>) -> Self {
        Self { source, tokens, pos: 0 }
    }

    pub fn build(&mut self) -> Result<Vec<Fragment>, ParseError> {
        let fragments = self.parse_fragments()?;

        let token = self.peek().clone();
        match token.kind {
            TokenKind::EndOfInput => Ok(fragments),
            TokenKind::LessThanSlash => {
                let (name, span) = self.parse_close_tag()?;
                if html::is_void_element(&name) {
                    return Err(void_close_error(&name, span));
                }
                Err(ParseError::new(
                    ErrorKind::UnexpectedToken,
                    format!("unexpected closing tag </{}>", name),
                    span,
                ))
            }
            TokenKind::BlockContinue | TokenKind::BlockClose => {
                let block = self.describe_block_token()?;
                Err(ParseError::new(
                    ErrorKind::UnexpectedToken,
                    format!("unexpected {} outside of a block", block),
                    token.span,
                ))
            }
            _ => Err(self.unexpected(&token)),
        }
    }

    /// Parse fragments until end of input, a close tag, or a block continuation
    fn parse_fragments(&mut self) -> Result<Vec<Fragment>, ParseError> {
        let mut fragments: Vec<Fragment> = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::EndOfInput
                | TokenKind::LessThanSlash
                | TokenKind::BlockContinue
                | TokenKind::BlockClose => break,
                _ => {}
            }
            let fragment = self.parse_fragment()?;
            // Adjacent text and whitespace collapse into one text fragment
            if let (Fragment::Text(next), Some(Fragment::Text(previous))) = (&fragment, fragments.last_mut()) {
                previous.push_str(next);
                continue;
            }
            fragments.push(fragment);
        }
        Ok(fragments)
    }

    fn parse_fragment(&mut self) -> Result<Fragment, ParseError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Text | TokenKind::Space => Ok(Fragment::Text(token.text)),
            TokenKind::Comment => Ok(Fragment::Comment(token.text)),
            TokenKind::Doctype => self.parse_doctype(&token),
            TokenKind::LessThan => self.parse_tag(&token),
            TokenKind::OpenCurly => {
                let expr = self.parse_braced_expr(&token)?;
                Ok(Fragment::Mustache(expr))
            }
            TokenKind::BlockOpen => self.parse_block(&token),
            _ => Err(self.unexpected(&token)),
        }
    }

    fn parse_doctype(&mut self, open: &Token) -> Result<Fragment, ParseError> {
        loop {
            let token = self.advance();
            match token.kind {
                TokenKind::GreaterThan => {
                    let raw = &self.source[open.span.start.byte..token.span.end.byte];
                    return Ok(Fragment::Doctype(raw.to_string()));
                }
                TokenKind::Space | TokenKind::Identifier => {}
                _ => return Err(self.unexpected(&token)),
            }
        }
    }

    // === Elements ===

    fn parse_tag(&mut self, open: &Token) -> Result<Fragment, ParseError> {
        let name_token = self.advance();
        if !name_token.kind.is_name() {
            return Err(self.unexpected(&name_token));
        }
        let span = Span::new(open.span.start, name_token.span.end);
        let (attributes, self_closing) = self.parse_attributes()?;
        let head = TagHead { name: name_token.text, span, attributes, self_closing };

        if head.name.eq_ignore_ascii_case("script") {
            return self.parse_script(head);
        }
        if head.name.eq_ignore_ascii_case("style") {
            return self.parse_style(head);
        }
        if head.name == "slot" {
            return self.parse_slot(head);
        }
        if html::is_component_name(&head.name) {
            let element = self.parse_element_body(head)?;
            return Ok(Fragment::Component(element));
        }

        let element = self.parse_element_body(head)?;
        Ok(Fragment::Element(element))
    }

    fn parse_element_body(&mut self, head: TagHead) -> Result<ElementNode, ParseError> {
        // Void elements never have children, `<br>` is the same as `<br />`
        if head.self_closing || html::is_void_element(&head.name) {
            return Ok(ElementNode {
                name: head.name,
                attributes: head.attributes,
                children: Vec::new(),
                self_closing: true,
            });
        }
        let children = self.parse_until_close(&head.name, &head.span)?;
        Ok(ElementNode { name: head.name, attributes: head.attributes, children, self_closing: false })
    }

    fn parse_until_close(&mut self, tag: &str, open_span: &Span) -> Result<Vec<Fragment>, ParseError> {
        let children = self.parse_fragments()?;

        let token = self.peek().clone();
        match token.kind {
            TokenKind::LessThanSlash => {
                let (close, span) = self.parse_close_tag()?;
                if close == tag {
                    return Ok(children);
                }
                if html::is_void_element(&close) {
                    return Err(void_close_error(&close, span));
                }
                Err(ParseError::new(
                    ErrorKind::MismatchedCloseTag,
                    format!("expected closing tag </{}>, got </{}>", tag, close),
                    span,
                )
                .with_related(*open_span))
            }
            TokenKind::BlockContinue | TokenKind::BlockClose => {
                let block = self.describe_block_token()?;
                Err(ParseError::new(
                    ErrorKind::MismatchedCloseTag,
                    format!("expected closing tag </{}>, got {}", tag, block),
                    token.span,
                )
                .with_related(*open_span))
            }
            _ => Err(ParseError::new(
                ErrorKind::UnclosedElement,
                format!("<{}> is never closed", tag),
                token.span,
            )
            .with_related(*open_span)
            .with_help(format!("Close with </{}> or <{} />", tag, tag))),
        }
    }

    /// Consume `</name>` and return the name with the span of the whole tag
    fn parse_close_tag(&mut self) -> Result<(String, Span), ParseError> {
        let open = self.advance();
        self.skip_space();
        let name = self.advance();
        if !name.kind.is_name() {
            return Err(self.unexpected(&name));
        }
        self.skip_space();
        let close = self.advance();
        if close.kind != TokenKind::GreaterThan {
            return Err(self.unexpected(&close));
        }
        Ok((name.text, Span::new(open.span.start, close.span.end)))
    }

    fn parse_script(&mut self, head: TagHead) -> Result<Fragment, ParseError> {
        let mut source = String::new();
        let mut span = Span::point(head.span.end);
        if !head.self_closing {
            if self.peek().kind == TokenKind::Script {
                let body = self.advance();
                let allocator = Allocator::default();
                js::parse_program(&allocator, &body.text, body.span)?;
                source = body.text;
                span = body.span;
            }
            self.expect_raw_close(&head)?;
        }
        Ok(Fragment::Script(ScriptNode { attributes: head.attributes, source, span }))
    }

    fn parse_style(&mut self, head: TagHead) -> Result<Fragment, ParseError> {
        let mut css = String::new();
        if !head.self_closing {
            if self.peek().kind == TokenKind::Style {
                css = self.advance().text;
            }
            self.expect_raw_close(&head)?;
        }
        Ok(Fragment::Style(StyleNode { attributes: head.attributes, css }))
    }

    fn expect_raw_close(&mut self, head: &TagHead) -> Result<(), ParseError> {
        let token = self.peek().clone();
        if token.kind != TokenKind::LessThanSlash {
            return Err(self.unexpected(&token));
        }
        let (close, span) = self.parse_close_tag()?;
        if close != head.name {
            return Err(ParseError::new(
                ErrorKind::MismatchedCloseTag,
                format!("expected closing tag </{}>, got </{}>", head.name, close),
                span,
            )
            .with_related(head.span));
        }
        Ok(())
    }

    fn parse_slot(&mut self, head: TagHead) -> Result<Fragment, ParseError> {
        let mut name = None;
        for attribute in &head.attributes {
            match attribute {
                Attribute::Field { key, values, .. } if key == "name" => match values.as_slice() {
                    [ValuePart::Text(text)] => name = Some(text.clone()),
                    _ => {
                        return Err(ParseError::new(
                            ErrorKind::InvalidSyntax,
                            "slot names must be plain text",
                            head.span,
                        ));
                    }
                },
                other => {
                    return Err(ParseError::new(
                        ErrorKind::InvalidSyntax,
                        format!("<slot> does not accept the attribute {}", other.key()),
                        head.span,
                    )
                    .with_help("Only name=\"...\" is allowed on <slot>"));
                }
            }
        }
        if head.self_closing {
            return Ok(Fragment::Slot(SlotNode { name, fallback: Vec::new(), self_closing: true }));
        }
        let fallback = self.parse_until_close("slot", &head.span)?;
        Ok(Fragment::Slot(SlotNode { name, fallback, self_closing: false }))
    }

    // === Attributes ===

    /// Parse attributes up to `>` or `/>`; returns whether the tag self-closed
    fn parse_attributes(&mut self) -> Result<(Vec<Attribute>, bool), ParseError> {
        let mut attributes = Vec::new();
        let mut seen: HashMap<String, Span> = HashMap::new();

        loop {
            let token = self.advance();
            let attribute = match token.kind {
                TokenKind::Space => continue,
                TokenKind::GreaterThan => return Ok((attributes, false)),
                TokenKind::SlashGreaterThan => return Ok((attributes, true)),
                TokenKind::OpenCurly => self.parse_shorthand(&token)?,
                kind if kind.is_name() => self.parse_field(&token)?,
                _ => return Err(self.unexpected(&token)),
            };

            let key = attribute.key().to_string();
            if let Some(first) = seen.get(&key) {
                return Err(ParseError::new(
                    ErrorKind::DuplicateAttribute,
                    format!("\"{}\" is set twice on this element", key),
                    token.span,
                )
                .with_related(*first)
                .with_related_label("first use"));
            }
            seen.insert(key, token.span);
            attributes.push(attribute);
        }
    }

    fn parse_shorthand(&mut self, open: &Token) -> Result<Attribute, ParseError> {
        let expr = self.parse_braced_expr(open)?;
        let allocator = Allocator::default();
        let Expression::Identifier(ident) = expr.parse(&allocator)? else {
            return Err(ParseError::new(
                ErrorKind::InvalidSyntax,
                format!("attribute shorthand must be a name, got {{{}}}", expr),
                open.span,
            )
            .with_help("Write key={expression} for computed attributes"));
        };
        let key = ident.name.to_string();
        let event_handler = html::is_event_handler(&key);
        Ok(Attribute::Shorthand { key, event_handler })
    }

    fn parse_field(&mut self, name: &Token) -> Result<Attribute, ParseError> {
        let values = if self.peek_past_space().kind == TokenKind::Equal {
            self.skip_space();
            self.advance();
            self.skip_space();
            self.parse_attribute_value()?
        } else {
            Vec::new()
        };

        if let Some((directive, key)) = name.text.split_once(':') {
            if directive != "bind" {
                return Err(ParseError::new(
                    ErrorKind::InvalidSyntax,
                    format!("unknown directive '{}:'", directive),
                    name.span,
                )
                .with_help("Only bind: directives are supported"));
            }
            let mut values = values;
            let expr = match (values.pop(), values.is_empty()) {
                (Some(ValuePart::Mustache(expr)), true) => expr,
                _ => {
                    return Err(ParseError::new(
                        ErrorKind::InvalidSyntax,
                        format!("{} must be bound to an expression", name.text),
                        name.span,
                    )
                    .with_help(format!("Write {}={{value}}", name.text)));
                }
            };
            return Ok(Attribute::Binding { key: key.to_string(), expr });
        }

        if name.text == "slot" {
            if let [ValuePart::Text(slot)] = values.as_slice() {
                return Ok(Attribute::NamedSlot { name: slot.clone() });
            }
        }

        let event_handler = html::is_event_handler(&name.text);
        Ok(Attribute::Field { key: name.text.clone(), values, event_handler })
    }

    fn parse_attribute_value(&mut self) -> Result<Vec<ValuePart>, ParseError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Text => Ok(vec![ValuePart::Text(token.text)]),
            TokenKind::OpenCurly => Ok(vec![ValuePart::Mustache(self.parse_braced_expr(&token)?)]),
            TokenKind::Quote => {
                let mut parts = Vec::new();
                loop {
                    let part = self.advance();
                    match part.kind {
                        TokenKind::Quote => break,
                        TokenKind::Text => parts.push(ValuePart::Text(part.text)),
                        TokenKind::OpenCurly => parts.push(ValuePart::Mustache(self.parse_braced_expr(&part)?)),
                        _ => return Err(self.unexpected(&part)),
                    }
                }
                if parts.is_empty() {
                    parts.push(ValuePart::Text(String::new()));
                }
                Ok(parts)
            }
            _ => Err(self.unexpected(&token)),
        }
    }

    // === Expressions and blocks ===

    /// After `{`: an expression and the closing `}`
    fn parse_braced_expr(&mut self, open: &Token) -> Result<Expr, ParseError> {
        let token = self.advance();
        let expr = match token.kind {
            TokenKind::Expr => expression(&token)?,
            TokenKind::CloseCurly => {
                return Err(ParseError::new(
                    ErrorKind::InvalidSyntax,
                    "empty expression",
                    Span::new(open.span.start, token.span.end),
                ));
            }
            _ => return Err(self.unexpected(&token)),
        };
        self.expect(TokenKind::CloseCurly)?;
        Ok(expr)
    }

    fn parse_block(&mut self, open: &Token) -> Result<Fragment, ParseError> {
        self.skip_space();
        let keyword = self.expect(TokenKind::Keyword)?;
        let open_span = Span::new(open.span.start, keyword.span.end);
        match keyword.text.as_str() {
            "if" => {
                self.skip_space();
                let cond = self.parse_block_expr(&keyword)?;
                Ok(Fragment::If(self.parse_if_rest(cond, &open_span)?))
            }
            "each" => self.parse_each(&open_span),
            other => Err(ParseError::new(
                ErrorKind::InvalidSyntax,
                format!("{{#{}}} blocks are not supported", other),
                open_span,
            )),
        }
    }

    /// A block's expression and the closing `}`
    fn parse_block_expr(&mut self, keyword: &Token) -> Result<Expr, ParseError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Expr => {
                let expr = expression(&token)?;
                self.expect(TokenKind::CloseCurly)?;
                Ok(expr)
            }
            TokenKind::CloseCurly => Err(ParseError::new(
                ErrorKind::InvalidSyntax,
                format!("{} requires an expression", keyword.text),
                keyword.span,
            )),
            _ => Err(self.unexpected(&token)),
        }
    }

    /// Everything after `{#if cond}` (or `{:else if cond}`) up to and including `{/if}`
    fn parse_if_rest(&mut self, cond: Expr, open_span: &Span) -> Result<IfNode, ParseError> {
        let then = self.parse_fragments()?;
        let token = self.peek().clone();
        match token.kind {
            TokenKind::BlockContinue => {
                self.advance();
                self.skip_space();
                let keyword = self.expect(TokenKind::Keyword)?;
                if keyword.text != "else" {
                    return Err(ParseError::new(
                        ErrorKind::InvalidSyntax,
                        format!("{{:{}}} is not valid inside {{#if}}", keyword.text),
                        keyword.span,
                    ));
                }
                self.skip_space();
                if self.peek().is_keyword("if") {
                    let nested_keyword = self.advance();
                    self.skip_space();
                    let nested_cond = self.parse_block_expr(&nested_keyword)?;
                    let nested = self.parse_if_rest(nested_cond, open_span)?;
                    return Ok(IfNode { cond, then, else_: vec![Fragment::If(nested)] });
                }
                self.expect(TokenKind::CloseCurly)?;
                let else_ = self.parse_fragments()?;
                self.expect_block_close("if", open_span)?;
                Ok(IfNode { cond, then, else_ })
            }
            _ => {
                self.expect_block_close("if", open_span)?;
                Ok(IfNode { cond, then, else_: Vec::new() })
            }
        }
    }

    fn parse_each(&mut self, open_span: &Span) -> Result<Fragment, ParseError> {
        self.skip_space();
        let list_token = self.advance();
        if list_token.kind != TokenKind::Expr {
            return Err(ParseError::new(ErrorKind::InvalidSyntax, "each requires a list expression", *open_span));
        }
        let list = expression(&list_token)?;
        self.skip_space();
        if !self.peek().is_keyword("as") {
            return Err(ParseError::new(ErrorKind::InvalidSyntax, "each block requires a binding", *open_span)
                .with_help("Write {#each items as item} or {#each items as item, index}"));
        }
        self.advance();
        self.skip_space();
        let value = self.expect(TokenKind::Identifier)?.text;
        self.skip_space();
        let mut index = None;
        if self.peek().kind == TokenKind::Comma {
            self.advance();
            self.skip_space();
            index = Some(self.expect(TokenKind::Identifier)?.text);
            self.skip_space();
        }
        self.expect(TokenKind::CloseCurly)?;

        let body = self.parse_fragments()?;
        let mut else_ = Vec::new();
        if self.peek().kind == TokenKind::BlockContinue {
            self.advance();
            self.skip_space();
            let keyword = self.expect(TokenKind::Keyword)?;
            if keyword.text != "else" {
                return Err(ParseError::new(
                    ErrorKind::InvalidSyntax,
                    format!("{{:{}}} is not valid inside {{#each}}", keyword.text),
                    keyword.span,
                ));
            }
            self.skip_space();
            self.expect(TokenKind::CloseCurly)?;
            else_ = self.parse_fragments()?;
        }
        self.expect_block_close("each", open_span)?;
        Ok(Fragment::Each(EachNode { list, value, index, body, else_ }))
    }

    fn expect_block_close(&mut self, keyword: &str, open_span: &Span) -> Result<(), ParseError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::BlockClose => {
                self.advance();
                self.skip_space();
                let close = self.expect(TokenKind::Keyword)?;
                if close.text != keyword {
                    return Err(ParseError::new(
                        ErrorKind::MismatchedCloseTag,
                        format!("expected {{/{}}}, got {{/{}}}", keyword, close.text),
                        Span::new(token.span.start, close.span.end),
                    )
                    .with_related(*open_span));
                }
                self.skip_space();
                self.expect(TokenKind::CloseCurly)?;
                Ok(())
            }
            TokenKind::LessThanSlash => {
                let (name, span) = self.parse_close_tag()?;
                Err(ParseError::new(
                    ErrorKind::MismatchedCloseTag,
                    format!("expected {{/{}}}, got </{}>", keyword, name),
                    span,
                )
                .with_related(*open_span))
            }
            TokenKind::Unexpected => Err(self.unexpected(&token)),
            _ => Err(ParseError::new(
                ErrorKind::UnclosedBlock,
                format!("{{#{}}} is never closed", keyword),
                token.span,
            )
            .with_related(*open_span)
            .with_help(format!("Close with {{/{}}}", keyword))),
        }
    }

    /// Describe the block token at the cursor, e.g. `{/if}` or `{:else}`
    fn describe_block_token(&mut self) -> Result<String, ParseError> {
        let token = self.advance();
        let prefix = token.text;
        self.skip_space();
        let keyword = self.expect(TokenKind::Keyword)?;
        Ok(format!("{}{}}}", prefix, keyword.text))
    }

    // === Token cursor ===

    fn peek(&self) -> &Token {
        // The stream always ends with a terminal token
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn peek_past_space(&self) -> &Token {
        let mut pos = self.pos;
        while pos < self.tokens.len() - 1 && self.tokens[pos].kind == TokenKind::Space {
            pos += 1;
        }
        &self.tokens[pos]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn skip_space(&mut self) {
        while self.peek().kind == TokenKind::Space {
            self.advance();
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        let token = self.advance();
        if token.kind == kind {
            return Ok(token);
        }
        Err(self.unexpected(&token))
    }

    fn unexpected(&self, token: &Token) -> ParseError {
        match token.kind {
            TokenKind::Unexpected => ParseError::new(ErrorKind::Lex, token.text.clone(), token.span),
            TokenKind::EndOfInput => ParseError::new(ErrorKind::UnexpectedToken, "unexpected end of input", token.span),
            _ => ParseError::new(
                ErrorKind::UnexpectedToken,
                format!("unexpected token '{}'", token.text),
                token.span,
            ),
        }
    }
}

/// An expression token, checked for syntax errors
fn expression(token: &Token) -> Result<Expr, ParseError> {
    let expr = Expr::new(token.text.clone(), token.span);
    let allocator = Allocator::default();
    expr.parse(&allocator)?;
    Ok(expr)
}

fn void_close_error(name: &str, span: Span) -> ParseError {
    ParseError::new(
        ErrorKind::VoidElementWithContent,
        format!("<{}> is a void element and cannot have a closing tag", name),
        span,
    )
    .with_help(format!("Write <{} /> and remove </{}>", name, name))
}
