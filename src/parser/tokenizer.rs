//! Mode-stack lexer for `.duo` templates.
//!
//! The same glyph means different things depending on context (`{` opens an
//! expression in markup but is plain text inside a script), so the lexer keeps
//! an explicit stack of modes. The active mode is always the top of the stack.

use super::token::{Position, Span, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawText {
    None,
    Script,
    Style,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Open,
    Continue,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Markup,
    /// Inside `<tag ...>`; `named` flips once the tag name is read
    Tag { named: bool, raw: RawText },
    CloseTag,
    /// Right after `=` in a tag
    AttributeValue,
    /// Inside a quoted attribute value
    Quoted(char),
    Expr,
    Script,
    Style,
    /// Right after `{#`, `{:` or `{/`
    BlockKeyword(BlockKind),
    /// Whitespace then an expression up to the closing `}`
    BlockExpr,
    /// After `{:else`, either `}` or `if <expr>}`
    ElseTail,
    /// The list expression of `{#each list as ...}`
    EachList,
    EachAs,
    EachBindings,
    /// Whitespace then `}`
    BlockEnd,
}

/// Pulls tokens out of template source one at a time
pub struct Tokenizer<'a> {
    source: &'a str,
    position: Position,
    modes: Vec<Mode>,
    terminal: Option<Token>,
    finished: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            position: Position::new(),
            modes: vec![Mode::Markup],
            terminal: None,
            finished: false,
        }
    }

    /// Produce the next token. Once `EndOfInput` or `Unexpected` has been
    /// returned, every later call returns that same token.
    pub fn next_token(&mut self) -> Token {
        if let Some(token) = &self.terminal {
            return token.clone();
        }
        let token = self.lex();
        if token.is_terminal() {
            self.terminal = Some(token.clone());
        }
        token
    }

    /// Lex the whole source, up to and including the terminal token
    pub fn tokenize(&mut self) -> Vec<Token> {
        self.by_ref().collect()
    }

    fn lex(&mut self) -> Token {
        let Some(mode) = self.modes.last().copied() else {
            return self.error("lexer mode stack is empty");
        };
        match mode {
            Mode::Markup => self.lex_markup(),
            Mode::Tag { named, raw } => self.lex_tag(named, raw),
            Mode::CloseTag => self.lex_close_tag(),
            Mode::AttributeValue => self.lex_attribute_value(),
            Mode::Quoted(quote) => self.lex_quoted(quote),
            Mode::Expr => self.lex_expr(),
            Mode::Script => self.lex_raw_text("</script", true, TokenKind::Script),
            Mode::Style => self.lex_raw_text("</style", false, TokenKind::Style),
            Mode::BlockKeyword(kind) => self.lex_block_keyword(kind),
            Mode::BlockExpr => self.lex_block_expr(),
            Mode::ElseTail => self.lex_else_tail(),
            Mode::EachList => self.lex_each_list(),
            Mode::EachAs => self.lex_each_as(),
            Mode::EachBindings => self.lex_each_bindings(),
            Mode::BlockEnd => self.lex_block_end(),
        }
    }

    // === Modes ===

    fn lex_markup(&mut self) -> Token {
        let start = self.position;
        let rest = self.rest();

        if rest.is_empty() {
            return Token::new(TokenKind::EndOfInput, "", Span::point(start));
        }

        if rest.starts_with("<!--") {
            return match rest.find("-->") {
                Some(end) => {
                    self.advance_to(start.byte + end + 3);
                    self.token(TokenKind::Comment, start)
                }
                None => {
                    self.advance_to(self.source.len());
                    self.eof_error()
                }
            };
        }

        if starts_with_ignore_case(rest, "<!doctype") {
            self.advance_to(start.byte + "<!doctype".len());
            self.push(Mode::Tag { named: false, raw: RawText::None });
            return self.token(TokenKind::Doctype, start);
        }

        if rest.starts_with("</") {
            self.advance_to(start.byte + 2);
            self.push(Mode::CloseTag);
            return self.token(TokenKind::LessThanSlash, start);
        }

        if rest.starts_with('<') && self.peek_next_char().is_some_and(|c| c.is_ascii_alphabetic()) {
            self.advance();
            self.push(Mode::Tag { named: false, raw: RawText::None });
            return self.token(TokenKind::LessThan, start);
        }

        if rest.starts_with('{') {
            let (kind, mode) = match self.peek_next_char() {
                Some('#') => (TokenKind::BlockOpen, Mode::BlockKeyword(BlockKind::Open)),
                Some(':') => (TokenKind::BlockContinue, Mode::BlockKeyword(BlockKind::Continue)),
                Some('/') => (TokenKind::BlockClose, Mode::BlockKeyword(BlockKind::Close)),
                _ => (TokenKind::OpenCurly, Mode::Expr),
            };
            let width = if kind == TokenKind::OpenCurly { 1 } else { 2 };
            self.advance_to(start.byte + width);
            self.push(mode);
            return self.token(kind, start);
        }

        // Raw text up to the next tag, comment or expression
        self.advance();
        while !self.at_eof() && !self.at_markup_boundary() {
            self.advance();
        }
        let text = &self.source[start.byte..self.position.byte];
        let kind = if text.chars().all(char::is_whitespace) {
            TokenKind::Space
        } else {
            TokenKind::Text
        };
        self.token(kind, start)
    }

    fn lex_tag(&mut self, named: bool, raw: RawText) -> Token {
        let start = self.position;
        let Some(ch) = self.peek_char() else {
            return self.eof_error();
        };

        if ch.is_whitespace() {
            return self.lex_space();
        }

        if !named {
            if !is_name_start(ch) {
                return self.unexpected_char();
            }
            let token = self.lex_name();
            let raw = if token.text.eq_ignore_ascii_case("script") {
                RawText::Script
            } else if token.text.eq_ignore_ascii_case("style") {
                RawText::Style
            } else {
                RawText::None
            };
            self.replace(Mode::Tag { named: true, raw });
            return token;
        }

        match ch {
            '>' => {
                self.advance();
                if !self.pop() {
                    return self.underflow();
                }
                match raw {
                    RawText::Script => self.push(Mode::Script),
                    RawText::Style => self.push(Mode::Style),
                    RawText::None => {}
                }
                self.token(TokenKind::GreaterThan, start)
            }
            '/' if self.peek_next_char() == Some('>') => {
                self.advance_to(start.byte + 2);
                if !self.pop() {
                    return self.underflow();
                }
                self.token(TokenKind::SlashGreaterThan, start)
            }
            '=' => {
                self.advance();
                self.push(Mode::AttributeValue);
                self.token(TokenKind::Equal, start)
            }
            '{' => {
                self.advance();
                self.push(Mode::Expr);
                self.token(TokenKind::OpenCurly, start)
            }
            c if is_name_start(c) => self.lex_name(),
            _ => self.unexpected_char(),
        }
    }

    fn lex_close_tag(&mut self) -> Token {
        let start = self.position;
        let Some(ch) = self.peek_char() else {
            return self.eof_error();
        };
        match ch {
            c if c.is_whitespace() => self.lex_space(),
            c if is_name_start(c) => self.lex_name(),
            '>' => {
                self.advance();
                if !self.pop() {
                    return self.underflow();
                }
                self.token(TokenKind::GreaterThan, start)
            }
            _ => self.unexpected_char(),
        }
    }

    fn lex_attribute_value(&mut self) -> Token {
        let start = self.position;
        let Some(ch) = self.peek_char() else {
            return self.eof_error();
        };
        match ch {
            c if c.is_whitespace() => self.lex_space(),
            '"' | '\'' => {
                self.advance();
                self.replace(Mode::Quoted(ch));
                self.token(TokenKind::Quote, start)
            }
            '{' => {
                self.advance();
                self.replace(Mode::Expr);
                self.token(TokenKind::OpenCurly, start)
            }
            '>' => self.unexpected_char(),
            '/' if self.peek_next_char() == Some('>') => self.unexpected_char(),
            _ => {
                while let Some(c) = self.peek_char() {
                    if c.is_whitespace() || c == '>' || (c == '/' && self.peek_next_char() == Some('>')) {
                        break;
                    }
                    self.advance();
                }
                if !self.pop() {
                    return self.underflow();
                }
                self.token(TokenKind::Text, start)
            }
        }
    }

    fn lex_quoted(&mut self, quote: char) -> Token {
        let start = self.position;
        let Some(ch) = self.peek_char() else {
            return self.eof_error();
        };
        if ch == quote {
            self.advance();
            if !self.pop() {
                return self.underflow();
            }
            return self.token(TokenKind::Quote, start);
        }
        if ch == '{' {
            self.advance();
            self.push(Mode::Expr);
            return self.token(TokenKind::OpenCurly, start);
        }
        while let Some(c) = self.peek_char() {
            if c == quote || c == '{' {
                break;
            }
            self.advance();
            if c == '\\' {
                self.advance();
            }
        }
        self.token(TokenKind::Text, start)
    }

    fn lex_expr(&mut self) -> Token {
        let start = self.position;
        match self.peek_char() {
            None => self.eof_error(),
            Some('}') => {
                self.advance();
                if !self.pop() {
                    return self.underflow();
                }
                self.token(TokenKind::CloseCurly, start)
            }
            Some(_) => match self.scan_expression(false) {
                Some(end) => {
                    self.advance_to(end);
                    self.token(TokenKind::Expr, start)
                }
                None => {
                    self.advance_to(self.source.len());
                    self.eof_error()
                }
            },
        }
    }

    /// Raw text until the closing tag. Script bodies track string literals and
    /// comments so a closing tag inside them does not end the element.
    fn lex_raw_text(&mut self, close: &str, track_quotes: bool, kind: TokenKind) -> Token {
        let start = self.position;
        let bytes = self.source.as_bytes();
        let mut i = start.byte;
        let mut quote: Option<u8> = None;

        let end = loop {
            if i >= bytes.len() {
                break None;
            }
            let b = bytes[i];
            if let Some(q) = quote {
                if b == b'\\' {
                    i += 2;
                    continue;
                }
                if b == q {
                    quote = None;
                }
                i += 1;
                continue;
            }
            if track_quotes {
                match b {
                    b'"' | b'\'' | b'`' => {
                        quote = Some(b);
                        i += 1;
                        continue;
                    }
                    b'/' if bytes.get(i + 1) == Some(&b'/') => {
                        while i < bytes.len() && bytes[i] != b'\n' {
                            i += 1;
                        }
                        continue;
                    }
                    b'/' if bytes.get(i + 1) == Some(&b'*') => {
                        match self.source[i + 2..].find("*/") {
                            Some(offset) => i += offset + 4,
                            None => i = bytes.len(),
                        }
                        continue;
                    }
                    _ => {}
                }
            }
            if b == b'<' && starts_with_ignore_case(&self.source[i..], close) {
                break Some(i);
            }
            i += 1;
        };

        let Some(end) = end else {
            self.advance_to(self.source.len());
            return self.eof_error();
        };

        if !self.pop() {
            return self.underflow();
        }
        if end == start.byte {
            return self.lex();
        }
        self.advance_to(end);
        self.token(kind, start)
    }

    fn lex_block_keyword(&mut self, kind: BlockKind) -> Token {
        let start = self.position;
        let Some(ch) = self.peek_char() else {
            return self.eof_error();
        };
        if ch.is_whitespace() {
            return self.lex_space();
        }
        if !ch.is_ascii_alphabetic() {
            return self.unexpected_char();
        }
        let word = self.consume_while(|c| c.is_ascii_alphanumeric() || c == '_');
        let next = match (kind, word) {
            (BlockKind::Open, "if" | "await") => Mode::BlockExpr,
            (BlockKind::Open, "each") => Mode::EachList,
            (BlockKind::Continue, "else") => Mode::ElseTail,
            (BlockKind::Continue, "then" | "catch") => Mode::BlockExpr,
            (BlockKind::Close, "if" | "each" | "await") => Mode::BlockEnd,
            (_, word) => {
                let message = format!("unknown block '{}'", word);
                return Token::new(TokenKind::Unexpected, message, Span::new(start, self.position));
            }
        };
        self.replace(next);
        self.token(TokenKind::Keyword, start)
    }

    fn lex_block_expr(&mut self) -> Token {
        match self.peek_char() {
            None => self.eof_error(),
            Some(c) if c.is_whitespace() => self.lex_space(),
            Some(_) => {
                self.replace(Mode::Expr);
                self.lex_expr()
            }
        }
    }

    fn lex_else_tail(&mut self) -> Token {
        let start = self.position;
        match self.peek_char() {
            None => self.eof_error(),
            Some(c) if c.is_whitespace() => self.lex_space(),
            Some('}') => {
                self.advance();
                if !self.pop() {
                    return self.underflow();
                }
                self.token(TokenKind::CloseCurly, start)
            }
            Some(_) if self.at_word("if") => {
                self.advance_to(start.byte + 2);
                self.replace(Mode::BlockExpr);
                self.token(TokenKind::Keyword, start)
            }
            Some(_) => self.unexpected_char(),
        }
    }

    fn lex_each_list(&mut self) -> Token {
        let start = self.position;
        match self.peek_char() {
            None => self.eof_error(),
            Some(c) if c.is_whitespace() => self.lex_space(),
            Some('}') => self.unexpected_char(),
            Some(_) => match self.scan_expression(true) {
                Some(end) => {
                    self.advance_to(end);
                    self.replace(Mode::EachAs);
                    self.token(TokenKind::Expr, start)
                }
                None => {
                    self.advance_to(self.source.len());
                    self.eof_error()
                }
            },
        }
    }

    fn lex_each_as(&mut self) -> Token {
        let start = self.position;
        match self.peek_char() {
            None => self.eof_error(),
            Some(c) if c.is_whitespace() => self.lex_space(),
            Some('}') => {
                self.advance();
                if !self.pop() {
                    return self.underflow();
                }
                self.token(TokenKind::CloseCurly, start)
            }
            Some(_) if self.at_word("as") => {
                self.advance_to(start.byte + 2);
                self.replace(Mode::EachBindings);
                self.token(TokenKind::Keyword, start)
            }
            Some(_) => self.unexpected_char(),
        }
    }

    fn lex_each_bindings(&mut self) -> Token {
        let start = self.position;
        match self.peek_char() {
            None => self.eof_error(),
            Some(c) if c.is_whitespace() => self.lex_space(),
            Some(',') => {
                self.advance();
                self.token(TokenKind::Comma, start)
            }
            Some('}') => {
                self.advance();
                if !self.pop() {
                    return self.underflow();
                }
                self.token(TokenKind::CloseCurly, start)
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                self.consume_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
                self.token(TokenKind::Identifier, start)
            }
            Some(_) => self.unexpected_char(),
        }
    }

    fn lex_block_end(&mut self) -> Token {
        let start = self.position;
        match self.peek_char() {
            None => self.eof_error(),
            Some(c) if c.is_whitespace() => self.lex_space(),
            Some('}') => {
                self.advance();
                if !self.pop() {
                    return self.underflow();
                }
                self.token(TokenKind::CloseCurly, start)
            }
            Some(_) => self.unexpected_char(),
        }
    }

    // === Shared scanners ===

    fn lex_space(&mut self) -> Token {
        let start = self.position;
        self.consume_while(char::is_whitespace);
        self.token(TokenKind::Space, start)
    }

    /// Tag or attribute name, classified by shape
    fn lex_name(&mut self) -> Token {
        let start = self.position;
        let name = self.consume_while(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.' | '$')
        });
        let kind = if name.contains(':') {
            TokenKind::ColonIdentifier
        } else if name.contains('.') {
            TokenKind::DotIdentifier
        } else if name.starts_with(|c: char| c.is_ascii_uppercase()) {
            TokenKind::PascalIdentifier
        } else if name.contains('-') {
            TokenKind::DashIdentifier
        } else {
            TokenKind::Identifier
        };
        self.token(kind, start)
    }

    /// Find the end of a balanced expression starting at the current position.
    /// Stops before the `}` that closes it, or before ` as ` when `stop_at_as`
    /// is set. Returns `None` at end of input.
    fn scan_expression(&self, stop_at_as: bool) -> Option<usize> {
        let bytes = self.source.as_bytes();
        let mut i = self.position.byte;
        let mut depth = 0usize;
        let mut quote: Option<u8> = None;

        while i < bytes.len() {
            let b = bytes[i];
            if let Some(q) = quote {
                if b == b'\\' {
                    i += 2;
                    continue;
                }
                if b == q {
                    quote = None;
                }
                i += 1;
                continue;
            }
            match b {
                b'"' | b'\'' | b'`' => quote = Some(b),
                b'{' => depth += 1,
                b'}' if depth == 0 => return Some(i),
                b'}' => depth -= 1,
                b if stop_at_as && depth == 0 && b.is_ascii_whitespace() => {
                    let after = self.source[i..].trim_start();
                    if is_word_at(after, "as") {
                        return Some(i);
                    }
                }
                _ => {}
            }
            i += 1;
        }
        None
    }

    // === Mode stack ===

    fn push(&mut self, mode: Mode) {
        self.modes.push(mode);
    }

    /// Pop the active mode. The outermost mode is never popped.
    fn pop(&mut self) -> bool {
        if self.modes.len() <= 1 {
            return false;
        }
        self.modes.pop();
        true
    }

    fn replace(&mut self, mode: Mode) {
        if let Some(top) = self.modes.last_mut() {
            *top = mode;
        }
    }

    // === Token construction ===

    fn token(&self, kind: TokenKind, start: Position) -> Token {
        let text = &self.source[start.byte..self.position.byte];
        Token::new(kind, text, Span::new(start, self.position))
    }

    fn error(&self, message: impl Into<String>) -> Token {
        Token::new(TokenKind::Unexpected, message, Span::point(self.position))
    }

    fn eof_error(&self) -> Token {
        self.error("unexpected end of input")
    }

    fn underflow(&self) -> Token {
        self.error("unbalanced closing token")
    }

    fn unexpected_char(&self) -> Token {
        match self.peek_char() {
            Some(ch) => {
                let end = self.position.advance_over(ch.encode_utf8(&mut [0; 4]));
                Token::new(
                    TokenKind::Unexpected,
                    format!("unexpected token '{}'", ch),
                    Span::new(self.position, end),
                )
            }
            None => self.eof_error(),
        }
    }

    // === Low-level helpers ===

    fn rest(&self) -> &'a str {
        &self.source[self.position.byte..]
    }

    fn at_eof(&self) -> bool {
        self.position.byte >= self.source.len()
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_next_char(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    /// `<` that opens a tag, close tag, comment or doctype, or `{`
    fn at_markup_boundary(&self) -> bool {
        match self.peek_char() {
            Some('{') => true,
            Some('<') => self
                .peek_next_char()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '/' || c == '!'),
            _ => false,
        }
    }

    fn at_word(&self, word: &str) -> bool {
        is_word_at(self.rest(), word)
    }

    fn advance(&mut self) {
        if let Some(ch) = self.peek_char() {
            self.position.byte += ch.len_utf8();
            if ch == '\n' {
                self.position.line += 1;
                self.position.col = 0;
            } else {
                self.position.col += 1;
            }
        }
    }

    fn advance_to(&mut self, byte: usize) {
        while self.position.byte < byte && !self.at_eof() {
            self.advance();
        }
    }

    fn consume_while<F: Fn(char) -> bool>(&mut self, pred: F) -> &'a str {
        let start = self.position.byte;
        while let Some(ch) = self.peek_char() {
            if !pred(ch) {
                break;
            }
            self.advance();
        }
        &self.source[start..self.position.byte]
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Token;

    /// Yields tokens up to and including the terminal one
    fn next(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }
        let token = self.next_token();
        if token.is_terminal() {
            self.finished = true;
        }
        Some(token)
    }
}

fn is_name_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch == '$'
}

fn starts_with_ignore_case(haystack: &str, prefix: &str) -> bool {
    haystack
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// `text` starts with `word` followed by whitespace, `}` or end of input
fn is_word_at(text: &str, word: &str) -> bool {
    text.strip_prefix(word).is_some_and(|after| {
        after
            .chars()
            .next()
            .is_none_or(|c| c.is_whitespace() || c == '}')
    })
}

/// Tokenize source code
pub fn tokenize(source: &str) -> Vec<Token> {
    Tokenizer::new(source).tokenize()
}

/// Space-separated token listing, without the trailing end-of-input marker
pub fn print(source: &str) -> String {
    tokenize(source)
        .iter()
        .filter(|token| !token.is(TokenKind::EndOfInput))
        .map(|token| token.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn without_spaces(source: &str) -> String {
        tokenize(source)
            .iter()
            .filter(|t| !t.is(TokenKind::Space) && !t.is(TokenKind::EndOfInput))
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_simple_html() {
        assert_eq!(print("<h1>hi</h1>"), r#"< identifier:"h1" > text:"hi" </ identifier:"h1" >"#);
        assert_eq!(print("hello"), r#"text:"hello""#);
        assert_eq!(print("<br/>"), r#"< identifier:"br" />"#);
    }

    #[test]
    fn test_whitespace_is_a_token() {
        assert_eq!(
            print("<br />"),
            r#"< identifier:"br" space:" " />"#
        );
        assert_eq!(
            print("<p>Paragraph</  p   >"),
            r#"< identifier:"p" > text:"Paragraph" </ space:"  " identifier:"p" space:"   " >"#
        );
        assert_eq!(
            print("<ul>\n  <li>a</li>\n</ul>"),
            "< identifier:\"ul\" > space:\"\\n  \" < identifier:\"li\" > text:\"a\" </ identifier:\"li\" > space:\"\\n\" </ identifier:\"ul\" >"
        );
    }

    #[test]
    fn test_attributes() {
        assert_eq!(
            without_spaces(r#"<a href="https://example.com">Link</a>"#),
            r#"< identifier:"a" identifier:"href" = quote:"\"" text:"https://example.com" quote:"\"" > text:"Link" </ identifier:"a" >"#
        );
        assert_eq!(
            without_spaces("<canvas width=300 height=200></canvas>"),
            r#"< identifier:"canvas" identifier:"width" = text:"300" identifier:"height" = text:"200" > </ identifier:"canvas" >"#
        );
        assert_eq!(
            without_spaces("<button disabled>Click me</button>"),
            r#"< identifier:"button" identifier:"disabled" > text:"Click me" </ identifier:"button" >"#
        );
        assert_eq!(
            without_spaces(r#"<div style="color: <h1>red;">Red</div>"#),
            r#"< identifier:"div" identifier:"style" = quote:"\"" text:"color: <h1>red;" quote:"\"" > text:"Red" </ identifier:"div" >"#
        );
    }

    #[test]
    fn test_unterminated_tag() {
        assert_eq!(
            print("<div id=4"),
            r#"< identifier:"div" space:" " identifier:"id" = text:"4" error:"unexpected end of input""#
        );
    }

    #[test]
    fn test_comment() {
        assert_eq!(print("<!-- Comment -->"), r#"comment:"<!-- Comment -->""#);
        assert_eq!(
            print("<h1>hi<!-- Comment -->world</h1>"),
            r#"< identifier:"h1" > text:"hi" comment:"<!-- Comment -->" text:"world" </ identifier:"h1" >"#
        );
        assert_eq!(print("<!-- never closed"), r#"error:"unexpected end of input""#);
    }

    #[test]
    fn test_comment_inside_tag_is_unexpected() {
        assert_eq!(
            print("<h1 <!-- Comment -->>"),
            r#"< identifier:"h1" space:" " error:"unexpected token '<'""#
        );
    }

    #[test]
    fn test_expressions() {
        assert_eq!(
            print("<h1>{greeting && </h1>}</h1>"),
            r#"< identifier:"h1" > { expr:"greeting && </h1>" } </ identifier:"h1" >"#
        );
        assert_eq!(
            print("<h1>hello {planet}!</h1>"),
            r#"< identifier:"h1" > text:"hello " { expr:"planet" } text:"!" </ identifier:"h1" >"#
        );
        assert_eq!(
            print(r#"<h1>{greeting && "}"}</h1>"#),
            r#"< identifier:"h1" > { expr:"greeting && \"}\"" } </ identifier:"h1" >"#
        );
        assert_eq!(print("{i}"), r#"{ expr:"i" }"#);
    }

    #[test]
    fn test_attribute_expressions() {
        assert_eq!(
            without_spaces("<hr class={name}/>"),
            r#"< identifier:"hr" identifier:"class" = { expr:"name" } />"#
        );
        assert_eq!(
            without_spaces(r#"<hr class="hi-{name}-world"/>"#),
            r#"< identifier:"hr" identifier:"class" = quote:"\"" text:"hi-" { expr:"name" } text:"-world" quote:"\"" />"#
        );
        assert_eq!(
            without_spaces("<hr {class} />"),
            r#"< identifier:"hr" { expr:"class" } />"#
        );
        assert_eq!(
            without_spaces("<input bind:value={name} />"),
            r#"< identifier:"input" colon_identifier:"bind:value" = { expr:"name" } />"#
        );
    }

    #[test]
    fn test_event_handlers() {
        assert_eq!(
            without_spaces("<button onClick={() => count++}>+</button>"),
            r#"< identifier:"button" identifier:"onClick" = { expr:"() => count++" } > text:"+" </ identifier:"button" >"#
        );
        assert_eq!(
            without_spaces("<button onMouseOver={()=>{count++}}>+</button>"),
            r#"< identifier:"button" identifier:"onMouseOver" = { expr:"()=>{count++}" } > text:"+" </ identifier:"button" >"#
        );
    }

    #[test]
    fn test_script_and_style() {
        assert_eq!(
            print("<script>alert('Hello,<h1> world!');</script>"),
            r#"< identifier:"script" > script:"alert('Hello,<h1> world!');" </ identifier:"script" >"#
        );
        assert_eq!(
            print("<script>let s = \"</script>\";</script>"),
            r#"< identifier:"script" > script:"let s = \"</script>\";" </ identifier:"script" >"#
        );
        assert_eq!(
            print("<style>body <h1> { font-family: Arial; }</style>"),
            r#"< identifier:"style" > style:"body <h1> { font-family: Arial; }" </ identifier:"style" >"#
        );
        assert_eq!(print("<script></script>"), r#"< identifier:"script" > </ identifier:"script" >"#);
        assert_eq!(print("<script>let a = 1;"), r#"< identifier:"script" > error:"unexpected end of input""#);
    }

    #[test]
    fn test_script_comment_with_quote() {
        assert_eq!(
            print("<script>// don't\nlet a = 1;</script>"),
            "< identifier:\"script\" > script:\"// don't\\nlet a = 1;\" </ identifier:\"script\" >"
        );
    }

    #[test]
    fn test_doctype() {
        assert_eq!(print("<!doctype html>"), r#"doctype:"<!doctype" space:" " identifier:"html" >"#);
        assert_eq!(print("<!DOCTYPE html>"), r#"doctype:"<!DOCTYPE" space:" " identifier:"html" >"#);
    }

    #[test]
    fn test_tag_names() {
        assert_eq!(print("<natural-time>"), r#"< dash_identifier:"natural-time" >"#);
        assert_eq!(print("<Component/>"), r#"< pascal_identifier:"Component" />"#);
        assert_eq!(print("<H1>hi</H1>"), r#"< pascal_identifier:"H1" > text:"hi" </ pascal_identifier:"H1" >"#);
        assert_eq!(print("<ui.button/>"), r#"< dot_identifier:"ui.button" />"#);
    }

    #[test]
    fn test_if_block() {
        assert_eq!(
            print("{#if x}{x}{:else if y}{y}{:else}none{/if}"),
            r#"{# keyword:"if" space:" " expr:"x" } { expr:"x" } {: keyword:"else" space:" " keyword:"if" space:" " expr:"y" } { expr:"y" } {: keyword:"else" } text:"none" {/ keyword:"if" }"#
        );
    }

    #[test]
    fn test_each_block() {
        assert_eq!(
            print("{#each items as item, i}{item}{/each}"),
            r#"{# keyword:"each" space:" " expr:"items" space:" " keyword:"as" space:" " identifier:"item" , space:" " identifier:"i" } { expr:"item" } {/ keyword:"each" }"#
        );
        assert_eq!(
            print("{#each [a, b] as x}{/each}"),
            r#"{# keyword:"each" space:" " expr:"[a, b]" space:" " keyword:"as" space:" " identifier:"x" } {/ keyword:"each" }"#
        );
    }

    #[test]
    fn test_legacy_block_syntax_is_not_a_block() {
        // `{if x}` is an ordinary expression; the parser rejects it later
        assert_eq!(print("{if x}"), r#"{ expr:"if x" }"#);
        assert_eq!(print("{#for x in xs}"), r#"{# error:"unknown block 'for'""#);
    }

    #[test]
    fn test_terminal_token_repeats() {
        let mut lexer = Tokenizer::new("<a");
        assert!(lexer.next_token().is(TokenKind::LessThan));
        assert!(lexer.next_token().is(TokenKind::Identifier));
        let error = lexer.next_token();
        assert!(error.is(TokenKind::Unexpected));
        assert_eq!(lexer.next_token(), error);
        assert_eq!(lexer.next_token(), error);

        let mut lexer = Tokenizer::new("");
        assert!(lexer.next_token().is(TokenKind::EndOfInput));
        assert!(lexer.next_token().is(TokenKind::EndOfInput));
    }

    #[test]
    fn test_tokens_reconstruct_source() {
        let sources = [
            "<!doctype html>\n<html>\n  <body class=\"a {b} c\">{#if x}<br/>{:else}<p title='t'>hi</p>{/if}</body>\n</html>",
            "<script>\n  export let count = 0;\n</script>\n<style>p { color: red; }</style>\n<button onClick={() => count++}>{count}</button>",
            "{#each items as item, i}\n  <li>{i}: {item}</li>\n{:else}\n  none\n{/each}<!-- c -->",
        ];
        for source in sources {
            let tokens = tokenize(source);
            let rebuilt: String = tokens
                .iter()
                .filter(|t| !t.is_terminal())
                .map(|t| t.text.as_str())
                .collect();
            assert_eq!(rebuilt, source);
            assert!(tokens.last().is_some_and(|t| t.is(TokenKind::EndOfInput)));
            assert_eq!(tokenize(source), tokens);
        }
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("<p>\n  {x}</p>");
        let expr = tokens.iter().find(|t| t.is(TokenKind::Expr)).unwrap();
        assert_eq!(expr.span.start, Position { byte: 7, line: 1, col: 3 });
        assert_eq!(expr.span.end.byte, 8);
    }
}
