use crate::error::ParseError;
use crate::parser::js;
use crate::parser::token::Span;
use crate::scope::Scopes;
use oxc_allocator::Allocator;
use oxc_ast::ast::Expression;
use std::fmt;

/// A parsed template together with its lexical scopes
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: String,
    pub fragments: Vec<Fragment>,
    pub scopes: Scopes,
}

/// JavaScript expression written in the template, kept as source text.
///
/// Two expressions are equal when they print the same, wherever they were
/// written.
#[derive(Debug, Clone)]
pub struct Expr {
    pub source: String,
    pub span: Span,
}

impl Expr {
    pub fn new(source: impl Into<String>, span: Span) -> Self {
        Self { source: source.into(), span }
    }

    /// Parse the expression into `allocator`
    pub fn parse<'a>(&'a self, allocator: &'a Allocator) -> Result<Expression<'a>, ParseError> {
        js::parse_expression(allocator, &self.source, self.span)
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Element(ElementNode),
    Component(ElementNode),
    Script(ScriptNode),
    Style(StyleNode),
    Text(String),
    Mustache(Expr),
    /// `<!-- ... -->` including the delimiters
    Comment(String),
    /// `<!doctype ...>` as written
    Doctype(String),
    If(IfNode),
    Each(EachNode),
    Slot(SlotNode),
}

/// HTML element or component invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Fragment>,
    pub self_closing: bool,
}

/// `<script>` block. The body is kept as written and parsed on demand.
#[derive(Debug, Clone)]
pub struct ScriptNode {
    pub attributes: Vec<Attribute>,
    pub source: String,
    pub span: Span,
}

impl PartialEq for ScriptNode {
    fn eq(&self, other: &Self) -> bool {
        self.attributes == other.attributes && js::canonical_program(&self.source) == js::canonical_program(&other.source)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StyleNode {
    pub attributes: Vec<Attribute>,
    pub css: String,
}

/// `{#if cond}...{:else}...{/if}`. An `{:else if}` chain is an `else_`
/// holding exactly one nested `If`.
#[derive(Debug, Clone, PartialEq)]
pub struct IfNode {
    pub cond: Expr,
    pub then: Vec<Fragment>,
    pub else_: Vec<Fragment>,
}

/// `{#each list as value, index}...{:else}...{/each}`
#[derive(Debug, Clone, PartialEq)]
pub struct EachNode {
    pub list: Expr,
    pub value: String,
    pub index: Option<String>,
    pub body: Vec<Fragment>,
    pub else_: Vec<Fragment>,
}

impl EachNode {
    /// Template offset the body's scope is anchored at. The list expression
    /// ends there, so no script construct can start at it.
    pub fn scope_anchor(&self) -> usize {
        self.list.span.end.byte
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotNode {
    pub name: Option<String>,
    pub fallback: Vec<Fragment>,
    pub self_closing: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    /// `key`, `key="text {expr}"` or `key={expr}`
    Field { key: String, values: Vec<ValuePart>, event_handler: bool },
    /// `{key}`, short for `key={key}`
    Shorthand { key: String, event_handler: bool },
    /// `bind:key={expr}`
    Binding { key: String, expr: Expr },
    /// `slot="name"` on a component child
    NamedSlot { name: String },
}

impl Attribute {
    pub fn key(&self) -> &str {
        match self {
            Attribute::Field { key, .. } | Attribute::Shorthand { key, .. } => key,
            Attribute::Binding { key, .. } => key,
            Attribute::NamedSlot { .. } => "slot",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValuePart {
    /// Raw text, as written between the quotes
    Text(String),
    Mustache(Expr),
}

// === Printing ===

fn write_fragments(f: &mut fmt::Formatter<'_>, fragments: &[Fragment]) -> fmt::Result {
    for fragment in fragments {
        write!(f, "{}", fragment)?;
    }
    Ok(())
}

fn write_attributes(f: &mut fmt::Formatter<'_>, attributes: &[Attribute]) -> fmt::Result {
    for attribute in attributes {
        write!(f, " {}", attribute)?;
    }
    Ok(())
}

fn write_if(f: &mut fmt::Formatter<'_>, node: &IfNode) -> fmt::Result {
    write!(f, "{{#if {}}}", node.cond)?;
    write_fragments(f, &node.then)?;
    let mut else_ = &node.else_;
    loop {
        match else_.as_slice() {
            [] => break,
            [Fragment::If(nested)] => {
                write!(f, "{{:else if {}}}", nested.cond)?;
                write_fragments(f, &nested.then)?;
                else_ = &nested.else_;
            }
            fragments => {
                f.write_str("{:else}")?;
                write_fragments(f, fragments)?;
                break;
            }
        }
    }
    f.write_str("{/if}")
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_fragments(f, &self.fragments)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&js::canonical_expression(&self.source))
    }
}

impl fmt::Display for ElementNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name)?;
        write_attributes(f, &self.attributes)?;
        if self.self_closing {
            return f.write_str(" />");
        }
        f.write_str(">")?;
        write_fragments(f, &self.children)?;
        write!(f, "</{}>", self.name)
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fragment::Element(element) | Fragment::Component(element) => write!(f, "{}", element),
            Fragment::Script(script) => {
                f.write_str("<script")?;
                write_attributes(f, &script.attributes)?;
                write!(f, ">{}</script>", js::canonical_program(&script.source))
            }
            Fragment::Style(style) => {
                f.write_str("<style")?;
                write_attributes(f, &style.attributes)?;
                write!(f, ">{}</style>", style.css)
            }
            Fragment::Text(text) | Fragment::Comment(text) | Fragment::Doctype(text) => f.write_str(text),
            Fragment::Mustache(expr) => write!(f, "{{{}}}", expr),
            Fragment::If(node) => write_if(f, node),
            Fragment::Each(node) => {
                write!(f, "{{#each {} as {}", node.list, node.value)?;
                if let Some(index) = &node.index {
                    write!(f, ", {}", index)?;
                }
                f.write_str("}")?;
                write_fragments(f, &node.body)?;
                if !node.else_.is_empty() {
                    f.write_str("{:else}")?;
                    write_fragments(f, &node.else_)?;
                }
                f.write_str("{/each}")
            }
            Fragment::Slot(slot) => {
                f.write_str("<slot")?;
                if let Some(name) = &slot.name {
                    write!(f, " name=\"{}\"", name)?;
                }
                if slot.self_closing {
                    return f.write_str(" />");
                }
                f.write_str(">")?;
                write_fragments(f, &slot.fallback)?;
                f.write_str("</slot>")
            }
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Field { key, values, .. } => match values.as_slice() {
                [] => f.write_str(key),
                [ValuePart::Mustache(expr)] => write!(f, "{}={{{}}}", key, expr),
                parts => {
                    let quote = if parts
                        .iter()
                        .any(|part| matches!(part, ValuePart::Text(text) if text.contains('"')))
                    {
                        '\''
                    } else {
                        '"'
                    };
                    write!(f, "{}={}", key, quote)?;
                    for part in parts {
                        match part {
                            ValuePart::Text(text) => f.write_str(text)?,
                            ValuePart::Mustache(expr) => write!(f, "{{{}}}", expr)?,
                        }
                    }
                    write!(f, "{}", quote)
                }
            },
            Attribute::Shorthand { key, .. } => write!(f, "{{{}}}", key),
            Attribute::Binding { key, expr } => write!(f, "bind:{}={{{}}}", key, expr),
            Attribute::NamedSlot { name } => write!(f, "slot=\"{}\"", name),
        }
    }
}
