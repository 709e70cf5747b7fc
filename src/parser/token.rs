use serde::Serialize;
use std::fmt;

/// Position in source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Position {
    /// Byte offset in source
    pub byte: usize,
    /// Line number (0-indexed)
    pub line: usize,
    /// Column number (0-indexed, in characters)
    pub col: usize,
}

impl Position {
    pub fn new() -> Self {
        Self { byte: 0, line: 0, col: 0 }
    }

    /// Position reached after walking over `text` starting here
    pub fn advance_over(self, text: &str) -> Self {
        let mut pos = self;
        for ch in text.chars() {
            pos.byte += ch.len_utf8();
            if ch == '\n' {
                pos.line += 1;
                pos.col = 0;
            } else {
                pos.col += 1;
            }
        }
        pos
    }
}

/// Span in source code (a range from start position to end position)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Zero-width span at a position
    pub fn point(pos: Position) -> Self {
        Self { start: pos, end: pos }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    // === Terminal ===
    EndOfInput,
    Unexpected,

    // === Markup punctuation ===
    /// `<`
    LessThan,
    /// `>`
    GreaterThan,
    /// `</`
    LessThanSlash,
    /// `/>`
    SlashGreaterThan,
    /// `=`
    Equal,
    /// `"` or `'` around an attribute value
    Quote,
    Comma,

    // === Content ===
    Space,
    Text,
    /// `<!-- ... -->`, including the delimiters
    Comment,
    /// `<!doctype`
    Doctype,
    Script,
    Style,

    // === Names ===
    Identifier,
    PascalIdentifier,
    DashIdentifier,
    DotIdentifier,
    ColonIdentifier,

    // === Expressions and blocks ===
    /// `{`
    OpenCurly,
    /// `}`
    CloseCurly,
    /// Raw expression source between braces
    Expr,
    /// `{#`
    BlockOpen,
    /// `{:`
    BlockContinue,
    /// `{/`
    BlockClose,
    /// if, each, await, else, then, catch, as
    Keyword,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::EndOfInput => "end_of_input",
            TokenKind::Unexpected => "error",
            TokenKind::LessThan => "<",
            TokenKind::GreaterThan => ">",
            TokenKind::LessThanSlash => "</",
            TokenKind::SlashGreaterThan => "/>",
            TokenKind::Equal => "=",
            TokenKind::Quote => "quote",
            TokenKind::Comma => ",",
            TokenKind::Space => "space",
            TokenKind::Text => "text",
            TokenKind::Comment => "comment",
            TokenKind::Doctype => "doctype",
            TokenKind::Script => "script",
            TokenKind::Style => "style",
            TokenKind::Identifier => "identifier",
            TokenKind::PascalIdentifier => "pascal_identifier",
            TokenKind::DashIdentifier => "dash_identifier",
            TokenKind::DotIdentifier => "dot_identifier",
            TokenKind::ColonIdentifier => "colon_identifier",
            TokenKind::OpenCurly => "{",
            TokenKind::CloseCurly => "}",
            TokenKind::Expr => "expr",
            TokenKind::BlockOpen => "{#",
            TokenKind::BlockContinue => "{:",
            TokenKind::BlockClose => "{/",
            TokenKind::Keyword => "keyword",
        }
    }

    /// Punctuation prints as itself; everything else prints with its text
    fn is_punctuation(&self) -> bool {
        matches!(
            self,
            TokenKind::LessThan
                | TokenKind::GreaterThan
                | TokenKind::LessThanSlash
                | TokenKind::SlashGreaterThan
                | TokenKind::Equal
                | TokenKind::Comma
                | TokenKind::OpenCurly
                | TokenKind::CloseCurly
                | TokenKind::BlockOpen
                | TokenKind::BlockContinue
                | TokenKind::BlockClose
                | TokenKind::EndOfInput
        )
    }

    /// Tokens that name a tag or an attribute
    pub fn is_name(&self) -> bool {
        matches!(
            self,
            TokenKind::Identifier
                | TokenKind::PascalIdentifier
                | TokenKind::DashIdentifier
                | TokenKind::DotIdentifier
                | TokenKind::ColonIdentifier
        )
    }
}

/// A single lexed token. `text` is the exact source slice, except for
/// `Unexpected` where it holds the error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, span: Span) -> Self {
        Self { kind, text: text.into(), span }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text == word
    }

    /// Whether the token ends the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, TokenKind::EndOfInput | TokenKind::Unexpected)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind.is_punctuation() {
            return write!(f, "{}", self.kind.as_str());
        }
        write!(f, "{}:{:?}", self.kind.as_str(), self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let token = Token::new(TokenKind::Identifier, "h1", Span::default());
        assert_eq!(token.to_string(), r#"identifier:"h1""#);
        let token = Token::new(TokenKind::SlashGreaterThan, "/>", Span::default());
        assert_eq!(token.to_string(), "/>");
        let token = Token::new(TokenKind::Unexpected, "unexpected end of input", Span::default());
        assert_eq!(token.to_string(), r#"error:"unexpected end of input""#);
    }

    #[test]
    fn test_advance_over() {
        let pos = Position::new().advance_over("ab\ncd");
        assert_eq!(pos, Position { byte: 5, line: 1, col: 2 });
        let pos = Position::new().advance_over("é");
        assert_eq!(pos.byte, 2);
        assert_eq!(pos.col, 1);
    }
}
