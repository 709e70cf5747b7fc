//! Duo template compiler.
//!
//! A `.duo` file is HTML with `{expression}` mustaches, `{#if}`/`{#each}`
//! blocks, components and an optional `<script>`. This crate parses those
//! files, renders them to HTML on the server, and lowers them to a DOM
//! construction module for the browser.
//!
//! ```
//! use duo::Value;
//!
//! let html = duo::render("<h1>{greeting}</h1>", Value::map().with("greeting", "hi")).unwrap();
//! assert_eq!(html, "<h1>hi</h1>");
//! ```

pub mod ast;
pub mod error;
pub mod generate;
pub mod html;
pub mod page;
pub mod parser;
pub mod render;
pub mod resolver;
pub mod scope;
pub mod value;

pub use ast::Document;
pub use error::{Error, ErrorKind, EvalError, GenerateError, ParseError, ScopeError};
pub use generate::{DomGenerator, GenerateOptions, Generator};
pub use page::Page;
pub use parser::{DuoParser, Parser};
pub use render::Renderer;
pub use resolver::{FsResolver, MemoryResolver, ResolvedFile, Resolver, ResolverError};
pub use value::Value;

/// Name under which [`render`] registers its source
const INLINE_PATH: &str = "index.duo";

/// Parse a template into a [`Document`]
pub fn parse(path: &str, source: &str) -> Result<Document, ParseError> {
    parser::parse(path, source)
}

/// Render a standalone template to HTML.
///
/// The template cannot import components; use a [`Renderer`] with a
/// [`Resolver`] for that.
pub fn render(source: &str, props: Value) -> Result<String, Error> {
    let resolver = MemoryResolver::new().with(INLINE_PATH, source);
    Renderer::new(resolver).render(INLINE_PATH, props)
}

/// Generate the DOM module for a template with default options
pub fn generate(path: &str, source: &str) -> Result<String, Error> {
    generate::generate(path, source, &GenerateOptions::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let props = Value::from(serde_json::json!({ "items": ["a", "b"], "title": "List" }));
        let html = render("<h2>{title}</h2><ul>{#each items as item}<li>{item}</li>{/each}</ul>", props).unwrap();
        assert_eq!(html, "<h2>List</h2><ul><li>a</li><li>b</li></ul>");
    }

    #[test]
    fn test_render_without_resolver() {
        let err = render("<script>import A from './A.duo';</script><A />", Value::Absent).unwrap_err();
        assert!(err.is_not_found(), "{}", err);
    }

    #[test]
    fn test_generate() {
        let js = generate("index.duo", "<p>{text}</p>").unwrap();
        let compact: String = js.chars().filter(|c| !c.is_whitespace()).collect();
        assert!(compact.contains(r#"h("p",{},[props.text])"#), "{}", js);
    }

    #[test]
    fn test_parse() {
        let document = parse("index.duo", "<p>{text}</p>").unwrap();
        assert_eq!(document.to_string(), "<p>{text}</p>");
    }
}
