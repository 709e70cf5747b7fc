pub mod token;
pub mod tokenizer;
pub mod js;
mod tree_builder;
mod binder;

pub use token::{Position, Span, Token, TokenKind};
pub use tokenizer::{Tokenizer, tokenize};
use tree_builder::TreeBuilder;

use crate::ast::Document;
use crate::error::ParseError;

/// Parser trait - converts template source to a document
pub trait Parser {
    fn parse(&self, path: &str, source: &str) -> Result<Document, ParseError>;
}

/// Duo template parser
pub struct DuoParser {
    // Configuration only, no state
}

impl DuoParser {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for DuoParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for DuoParser {
    fn parse(&self, path: &str, source: &str) -> Result<Document, ParseError> {
        let tokens = tokenize(source);
        log::trace!("{}: {} tokens", path, tokens.len());

        let mut builder = TreeBuilder::new(source, tokens);
        let fragments = builder.build()?;

        let scopes = binder::bind(&fragments)?;

        Ok(Document { path: path.to_string(), fragments, scopes })
    }
}

/// Parse a template into a document with its scope tree
pub fn parse(path: &str, source: &str) -> Result<Document, ParseError> {
    log::debug!("parsing {}", path);
    DuoParser::new().parse(path, source)
}

/// Parse and print a template in canonical form
pub fn print(path: &str, source: &str) -> Result<String, ParseError> {
    Ok(parse(path, source)?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::parser::js::compact;

    fn equal(input: &str, expected: &str) {
        let actual = match print("test.duo", input) {
            Ok(printed) => printed,
            Err(err) => panic!("parse error for {:?}: {}", input, err),
        };
        assert_eq!(actual, expected, "input: {:?}", input);
    }

    fn equal_error(input: &str, kind: ErrorKind, message: &str) {
        match parse("test.duo", input) {
            Ok(document) => panic!("expected an error for {:?}, got {}", input, document),
            Err(err) => {
                assert_eq!(err.message, message, "input: {:?}", input);
                assert_eq!(err.kind, kind, "input: {:?}", input);
            }
        }
    }

    /// Like `equal`, for output where the printer lays out script blocks
    fn equal_compact(input: &str, expected: &str) {
        let actual = match print("test.duo", input) {
            Ok(printed) => printed,
            Err(err) => panic!("parse error for {:?}: {}", input, err),
        };
        assert_eq!(compact(&actual), compact(expected), "input: {:?}", input);
    }

    fn equal_scope(input: &str, expected: &str) {
        let document = parse("test.duo", input).unwrap();
        assert_eq!(document.scopes.to_string().trim(), expected.trim(), "input: {:?}", input);
    }

    #[test]
    fn test_print() {
        equal("<h1>hi</h1>", "<h1>hi</h1>");
        equal("<h1>{greeting}</h1>", "<h1>{greeting}</h1>");
        equal("<h1>{ greeting }</h1>", "<h1>{greeting}</h1>");
        equal("<hr/>", "<hr />");
        equal("<hr   />", "<hr />");
        equal("<hr>", "<hr />");
        equal(r#"<h1 class="hello" id="cool">{greeting}</h1>"#, r#"<h1 class="hello" id="cool">{greeting}</h1>"#);
        equal(r#"<hr class="hello"   />"#, r#"<hr class="hello" />"#);
        equal("<hr data-set={set} />", "<hr data-set={set} />");
        equal("<hr class={name}/>", "<hr class={name} />");
        equal(r#"<hr class={"name"}/>"#, r#"<hr class={"name"} />"#);
        equal(r#"<hr class="hi-{name}-world" />"#, r#"<hr class="hi-{name}-world" />"#);
        equal(r#"<hr class="a{b}c{d}" />"#, r#"<hr class="a{b}c{d}" />"#);
        equal("<hr {id} />", "<hr {id} />");
        equal(r#"<h1 name="">{greeting}</h1>"#, r#"<h1 name="">{greeting}</h1>"#);
        equal("<input disabled />", "<input disabled />");
        equal("<input bind:value={name} />", "<input bind:value={name} />");
        equal("<!doctype html><html></html>", "<!doctype html><html></html>");
        equal("<div><!-- note --></div>", "<div><!-- note --></div>");
    }

    #[test]
    fn test_event_handlers() {
        equal("<button onClick={increment}>+</button>", "<button onClick={increment}>+</button>");
        equal("<button onClick={() => count++}>+</button>", "<button onClick={() => count++}>+</button>");
        equal_compact("<button onMouseOver={() => { count++ }}>+</button>", "<button onMouseOver={() => { count++; }}>+</button>");
        equal_compact("<button onMouseOver={()=>{count++}}>+</button>", "<button onMouseOver={() => { count++; }}>+</button>");
        equal("<button {onClick} {onDragStart}>+</button>", "<button {onClick} {onDragStart}>+</button>");

        let document = parse("test.duo", "<button onClick={go} title={t}>+</button>").unwrap();
        let crate::ast::Fragment::Element(button) = &document.fragments[0] else {
            panic!("expected an element");
        };
        let handlers: Vec<bool> = button
            .attributes
            .iter()
            .map(|attribute| match attribute {
                crate::ast::Attribute::Field { event_handler, .. } => *event_handler,
                _ => false,
            })
            .collect();
        assert_eq!(handlers, vec![true, false]);
    }

    #[test]
    fn test_scripts() {
        equal_compact(
            r#"<script>export let greeting = "hello"; setInterval(() => { greeting += "o"; }, 500); </script><h1>{greeting}</h1>"#,
            "<script>export let greeting = \"hello\";\nsetInterval(() => { greeting += \"o\"; }, 500);</script><h1>{greeting}</h1>",
        );
        equal_compact(
            "<script>export let count = 0; function increment () { count += 1; } </script><button onClick={increment}>Clicked {count || 0} {count === 1 ? 'time' : 'times'}</button>",
            "<script>export let count = 0;\nfunction increment() { count += 1; }</script><button onClick={increment}>Clicked {count || 0} {count === 1 ? \"time\" : \"times\"}</button>",
        );
        equal("<style>h1 { color: red; }</style>", "<style>h1 { color: red; }</style>");
    }

    #[test]
    fn test_blocks() {
        equal("{#if x}a{/if}", "{#if x}a{/if}");
        equal("{#if x}a{:else}b{/if}", "{#if x}a{:else}b{/if}");
        equal("{#if x}a{:else if y}b{:else}c{/if}", "{#if x}a{:else if y}b{:else}c{/if}");
        equal("<ul>{#each items as item}<li>{item}</li>{/each}</ul>", "<ul>{#each items as item}<li>{item}</li>{/each}</ul>");
        equal("{#each items as item, i}{i}{:else}none{/each}", "{#each items as item, i}{i}{:else}none{/each}");
    }

    #[test]
    fn test_any_nesting() {
        equal("<p><div>x</div></p>", "<p><div>x</div></p>");
        equal(r#"<a href="/"><button>go</button></a>"#, r#"<a href="/"><button>go</button></a>"#);
        equal("<button><a>x</a></button>", "<button><a>x</a></button>");
    }

    #[test]
    fn test_components_and_slots() {
        equal("<Component />", "<Component />");
        equal("<H1>hi</H1>", "<H1>hi</H1>");
        equal("<slot />", "<slot />");
        equal("<slot>fallback</slot>", "<slot>fallback</slot>");
        equal(r#"<slot name="value">fallback</slot>"#, r#"<slot name="value">fallback</slot>"#);
        equal(r#"<Box><span slot="name">hi</span></Box>"#, r#"<Box><span slot="name">hi</span></Box>"#);
        assert!(matches!(
            parse("test.duo", "<Box />").unwrap().fragments[0],
            crate::ast::Fragment::Component(_)
        ));
    }

    #[test]
    fn test_reparse() {
        let inputs = [
            "<script>import Box from './Box.duo'; export let n = 1;</script><Box {n} title=\"a{n}\">x</Box>",
            "<ul>{#each items as item, i}<li class=\"row-{i}\">{item}</li>{:else}<li>none</li>{/each}</ul>",
            "{#if a === 1}one{:else if a == \"2\"}two{:else}{a || \"many\"}{/if}",
        ];
        for input in inputs {
            let first = parse("test.duo", input).unwrap();
            let second = parse("test.duo", &first.to_string()).unwrap();
            assert_eq!(first, second, "input: {:?}", input);
        }
    }

    #[test]
    fn test_scope() {
        equal_scope(
            r#"<script>export let greeting = "hello"; setInterval(() => { greeting += "o"; }, 500);</script><h1>{greeting}</h1>"#,
            r#"
"greeting" declared exported mutable
"setInterval"
"#,
        );
        equal_scope(
            r#"<div><hr {name} /><hr name="{target}-{name}" /></div>"#,
            r#"
"name"
"target"
"#,
        );
        equal_scope(
            "<script>export let count = 0; function increment () { count += 1; }</script><button onClick={increment}>{count}</button>",
            r#"
"count" declared exported mutable
"increment" declared
"#,
        );
        equal_scope(
            "<script>import Box from './Box.duo'; const title = 'x';</script><Box>{title}</Box>",
            r#"
"Box" declared import="./Box.duo" default
"title" declared
"#,
        );
        equal_scope(
            "<ul>{#each items as item, i}<li>{i}: {item}</li>{/each}</ul>",
            r#"
"items"

  "item" declared
  "i" declared
"#,
        );
    }

    #[test]
    fn test_errors() {
        equal_error("<a></b>", ErrorKind::MismatchedCloseTag, "expected closing tag </a>, got </b>");
        equal_error("<div>hi", ErrorKind::UnclosedElement, "<div> is never closed");
        equal_error("<br></br>", ErrorKind::VoidElementWithContent, "<br> is a void element and cannot have a closing tag");
        equal_error(r#"<hr a="1" a="2" />"#, ErrorKind::DuplicateAttribute, "\"a\" is set twice on this element");
        equal_error("{#if x}a", ErrorKind::UnclosedBlock, "{#if} is never closed");
        equal_error("{#if x}a{/each}", ErrorKind::MismatchedCloseTag, "expected {/if}, got {/each}");
        equal_error("{#for x}a{/for}", ErrorKind::Lex, "unknown block 'for'");
        equal_error("<h1 <!--", ErrorKind::Lex, "unexpected token '<'");
        equal_error("<style>p {}</STYLE>", ErrorKind::MismatchedCloseTag, "expected closing tag </style>, got </STYLE>");
        equal_error("<input on:click={go} />", ErrorKind::InvalidSyntax, "unknown directive 'on:'");
        equal_error(
            "<script>import { a } from './a.js';</script>",
            ErrorKind::Scope,
            r#"scope: walk imported aliases not implemented yet (import from "./a.js")"#,
        );
        // Errors inside arrow bodies are not dropped
        assert_eq!(
            parse("test.duo", "<button onClick={() => { let = ; }}>+</button>").unwrap_err().kind,
            ErrorKind::InvalidSyntax
        );
        assert_eq!(
            parse("test.duo", "<script>setTimeout(() => { import x from 'y' }, 1)</script>").unwrap_err().kind,
            ErrorKind::InvalidSyntax
        );
    }
}
