use crate::parser::token::Span;
use crate::resolver::ResolverError;
use std::fmt;

/// Kind of parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The lexer produced an `Unexpected` token
    Lex,
    UnclosedElement,
    UnclosedBlock,
    MismatchedCloseTag,
    UnexpectedToken,
    InvalidSyntax,
    VoidElementWithContent,
    DuplicateAttribute,
    /// Scope construction failed while binding the document
    Scope,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Lex => "Lex error",
            ErrorKind::UnclosedElement => "Unclosed element",
            ErrorKind::UnclosedBlock => "Unclosed block",
            ErrorKind::MismatchedCloseTag => "Mismatched close tag",
            ErrorKind::UnexpectedToken => "Unexpected token",
            ErrorKind::InvalidSyntax => "Invalid syntax",
            ErrorKind::VoidElementWithContent => "Void element with content",
            ErrorKind::DuplicateAttribute => "Duplicate attribute",
            ErrorKind::Scope => "Scope error",
        }
    }
}

/// Error during parsing
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Span,
    pub related_span: Option<Span>,
    pub related_label: Option<String>,
    pub help: Option<String>,
}

impl ParseError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
            related_span: None,
            related_label: None,
            help: None,
        }
    }

    /// Add a related span (e.g. where the unclosed tag was opened)
    pub fn with_related(mut self, span: Span) -> Self {
        self.related_span = Some(span);
        self
    }

    pub fn with_related_label(mut self, label: impl Into<String>) -> Self {
        self.related_label = Some(label.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Render the error with source context
    pub fn render(&self, source: &str, filename: &str) -> String {
        self.render_inner(source, filename, false)
    }

    /// Render the error with ANSI color codes
    pub fn render_color(&self, source: &str, filename: &str) -> String {
        self.render_inner(source, filename, true)
    }

    fn render_inner(&self, source: &str, filename: &str, color: bool) -> String {
        let red = if color { "\x1b[1;31m" } else { "" };
        let dim = if color { "\x1b[2m" } else { "" };
        let cyan = if color { "\x1b[1;38;5;73m" } else { "" };
        let reset = if color { "\x1b[0m" } else { "" };

        let mut output = String::new();
        output.push('\n');

        let location = format!("{}:{}:{}", filename, self.span.start.line + 1, self.span.start.col + 1);
        output.push_str(&format!(" {}file:{} {}\n", dim, reset, location));

        let message = if color { highlight_inline_tags(&self.message) } else { self.message.clone() };
        output.push_str(&format!("{}error:{} {}\n", red, reset, message));

        let gutter = (self.span.start.line + 1)
            .max(self.related_span.map_or(0, |s| s.start.line + 1))
            .to_string()
            .len()
            .max(2);

        if let Some(source_line) = source.lines().nth(self.span.start.line) {
            output.push_str(&format!("{}{:>width$} |{}\n", dim, "", reset, width = gutter));
            output.push_str(&format!(
                "{}{:>width$} |{} {}\n",
                dim,
                self.span.start.line + 1,
                reset,
                source_line,
                width = gutter
            ));
            output.push_str(&format!(
                "{}{:>width$} |{} {}{}{}{}\n",
                dim,
                "",
                reset,
                " ".repeat(self.span.start.col),
                red,
                carets(&self.span, source_line),
                reset,
                width = gutter
            ));
        }

        if let Some(related) = self.related_span {
            if let Some(related_line) = source.lines().nth(related.start.line) {
                let label = self.related_label.as_deref().unwrap_or("opened here");
                output.push_str(&format!(
                    "{}{:>width$} |{} {}\n",
                    dim,
                    related.start.line + 1,
                    reset,
                    related_line,
                    width = gutter
                ));
                output.push_str(&format!(
                    "{}{:>width$} |{} {}{}{} {}{}\n",
                    dim,
                    "",
                    reset,
                    " ".repeat(related.start.col),
                    dim,
                    carets(&related, related_line),
                    label,
                    reset,
                    width = gutter
                ));
            }
        }

        if let Some(help) = &self.help {
            output.push('\n');
            for (i, help_line) in help.lines().enumerate() {
                if i == 0 {
                    output.push_str(&format!(" {}help:{} {}\n", cyan, reset, help_line));
                } else {
                    output.push_str(&format!("       {}\n", help_line));
                }
            }
        }

        output.push('\n');
        output
    }
}

fn carets(span: &Span, line: &str) -> String {
    let len = if span.end.line == span.start.line {
        span.end.col.saturating_sub(span.start.col).max(1)
    } else {
        line.chars().count().saturating_sub(span.start.col).max(1)
    };
    "^".repeat(len)
}

/// Color `<tag>` and `</tag>` mentions in a message
fn highlight_inline_tags(text: &str) -> String {
    const TAG: &str = "\x1b[38;5;180m";
    const RESET: &str = "\x1b[0m";

    let mut result = String::with_capacity(text.len() * 2);
    let mut rest = text;
    while let Some(open) = rest.find('<') {
        result.push_str(&rest[..open]);
        let candidate = &rest[open..];
        let close = candidate.find('>');
        let is_tag = close.is_some_and(|end| {
            let inner = candidate[1..end].trim_start_matches('/');
            !inner.is_empty()
                && inner
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | ':' | ' ' | '/'))
        });
        match close {
            Some(end) if is_tag => {
                result.push_str(TAG);
                result.push_str(&candidate[..=end]);
                result.push_str(RESET);
                rest = &candidate[end + 1..];
            }
            _ => {
                result.push('<');
                rest = &candidate[1..];
            }
        }
    }
    result.push_str(rest);
    result
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Error while building or querying the lexical scope tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// A synthesized id was declared twice in one scope
    DuplicateId(String),
    /// A synthesized id the generator relies on is missing
    UnresolvedBinding(String),
    /// `import { a, b } from "..."` is not supported
    NamedImports(String),
}

impl fmt::Display for ScopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeError::DuplicateId(id) => write!(f, "scope: symbol id {:?} is already declared", id),
            ScopeError::UnresolvedBinding(id) => write!(f, "scope: unable to find binding for {:?}", id),
            ScopeError::NamedImports(source) => {
                write!(f, "scope: walk imported aliases not implemented yet (import from {:?})", source)
            }
        }
    }
}

impl std::error::Error for ScopeError {}

/// Error raised while evaluating a document during SSR
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    ComponentNotFound(String),
    ComponentNotImported(String),
    NamedSlots,
    /// A value of the wrong shape reached a place that cannot print it
    UnexpectedValue { context: &'static str, found: String },
    /// Binary operator applied to operands it is not defined for
    Mismatch { op: String, left: String, right: String },
    NotSequence(String),
    Unsupported(String),
    InvalidNumber(String),
    PropsNotMap(String),
    ImportCycle(Vec<String>),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::ComponentNotFound(name) => write!(f, "component {} not found", name),
            EvalError::ComponentNotImported(name) => write!(f, "component {} not imported", name),
            EvalError::NamedSlots => write!(f, "named slots not implemented yet"),
            EvalError::UnexpectedValue { context, found } => {
                write!(f, "unexpected {} value in {}", found, context)
            }
            EvalError::Mismatch { op, left, right } => {
                write!(f, "unable to apply '{}' to {} and {}", op, left, right)
            }
            EvalError::NotSequence(found) => {
                write!(f, "each must be a slice of values, but got {}", found)
            }
            EvalError::Unsupported(what) => write!(f, "unsupported {} in server rendering", what),
            EvalError::InvalidNumber(raw) => write!(f, "unable to evaluate number {}", raw),
            EvalError::PropsNotMap(found) => write!(f, "props must be a map, but got {}", found),
            EvalError::ImportCycle(paths) => write!(f, "import cycle: {}", paths.join(" -> ")),
        }
    }
}

impl std::error::Error for EvalError {}

/// Error raised while lowering a document to DOM code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateError {
    NamedSlots,
    Unsupported(String),
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerateError::NamedSlots => write!(f, "generate: named slots not implemented yet"),
            GenerateError::Unsupported(what) => write!(f, "generate: unsupported {}", what),
        }
    }
}

impl std::error::Error for GenerateError {}

/// Any error the crate's public operations can return
#[derive(Debug)]
pub enum Error {
    Parse(ParseError),
    Scope(ScopeError),
    Eval(EvalError),
    Resolve(ResolverError),
    Generate(GenerateError),
    Format(fmt::Error),
}

impl Error {
    /// Render the error with source context (no color)
    pub fn render(&self, source: &str, filename: &str) -> String {
        match self {
            Error::Parse(err) => err.render(source, filename),
            other => format!("\n file: {}\nerror: {}\n\n", filename, other),
        }
    }

    /// Render the error with ANSI color codes
    pub fn render_color(&self, source: &str, filename: &str) -> String {
        match self {
            Error::Parse(err) => err.render_color(source, filename),
            other => format!("\n \x1b[2mfile:\x1b[0m {}\n\x1b[1;31merror:\x1b[0m {}\n\n", filename, other),
        }
    }

    /// Whether the error is a missing file reported by the resolver
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Resolve(ResolverError::NotFound(_)))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse(err) => write!(f, "{}", err),
            Error::Scope(err) => write!(f, "{}", err),
            Error::Eval(err) => write!(f, "{}", err),
            Error::Resolve(err) => write!(f, "{}", err),
            Error::Generate(err) => write!(f, "{}", err),
            Error::Format(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::Parse(err)
    }
}

impl From<ScopeError> for Error {
    fn from(err: ScopeError) -> Self {
        Error::Scope(err)
    }
}

impl From<EvalError> for Error {
    fn from(err: EvalError) -> Self {
        Error::Eval(err)
    }
}

impl From<ResolverError> for Error {
    fn from(err: ResolverError) -> Self {
        Error::Resolve(err)
    }
}

impl From<GenerateError> for Error {
    fn from(err: GenerateError) -> Self {
        Error::Generate(err)
    }
}

impl From<fmt::Error> for Error {
    fn from(err: fmt::Error) -> Self {
        Error::Format(err)
    }
}
