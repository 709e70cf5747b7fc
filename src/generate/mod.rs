mod lower;
mod output;

pub use lower::{Module, is_global, lower};
pub use output::Output;

use crate::ast::Document;
use crate::error::Error;
use crate::parser::js;

/// Generator options
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Preferred name of the element factory parameter
    pub factory: String,
    /// Preferred name of the reactive proxy parameter
    pub proxy: String,
    /// Preferred name of the props parameter
    pub props: String,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            factory: "h".to_string(),
            proxy: "proxy".to_string(),
            props: "props".to_string(),
        }
    }
}

/// Generator trait - converts a document to code
pub trait Generator {
    fn generate(&self, document: &Document, options: &GenerateOptions) -> Result<String, Error>;
}

/// Emits an ES module that builds the document through a virtual DOM factory
pub struct DomGenerator;

impl DomGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Compose the module text, then reprint it in canonical layout
    fn print(&self, module: &Module) -> Result<String, Error> {
        let mut output = Output::new();
        if !module.imports.is_empty() {
            output.line(module.imports.trim_end());
        }
        output.line(&format!("export default function({}, {}) {{", module.factory, module.proxy));
        output.indent();
        if !module.body.is_empty() {
            output.line(module.body.trim_end());
        }
        output.line(&format!("return ({}) => {};", module.props, module.root));
        output.dedent();
        output.line("}");
        Ok(js::format_module(&output.finish())?)
    }
}

impl Default for DomGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for DomGenerator {
    fn generate(&self, document: &Document, options: &GenerateOptions) -> Result<String, Error> {
        let module = lower(document, options)?;
        log::trace!("{}: lowered {} bytes of script", document.path, module.body.len());
        self.print(&module)
    }
}

/// Parse `source` and generate its DOM module
pub fn generate(path: &str, source: &str, options: &GenerateOptions) -> Result<String, Error> {
    let document = crate::parser::parse(path, source)?;
    log::debug!("generating {}", path);
    DomGenerator::new().generate(&document, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::js::compact;

    fn js(source: &str) -> String {
        generate("test.duo", source, &GenerateOptions::default()).unwrap()
    }

    fn equal(source: &str, expected: &str) {
        let actual = js(source);
        assert_eq!(compact(&actual), compact(expected), "generated:\n{}", actual);
    }

    #[test]
    fn test_greeting() {
        let source = r#"<script>
  export let greeting = "hello";
  setInterval(() => {
    greeting += "o";
  }, 500);
</script>

<h1>{greeting}</h1>
"#;
        equal(
            source,
            r#"export default function(h, proxy) {
  proxy.greeting = proxy.greeting || "hello";
  setInterval(() => { proxy.greeting += "o"; }, 500);
  return (props) => h("h1", {}, [props.greeting]);
}
"#,
        );
    }

    #[test]
    fn test_counter() {
        let source = r#"<script>
  let count = 0;
  function increment() {
    count += 1;
  }
</script>

<button onClick={increment}>Clicked {count} {count === 1 ? "time" : "times"}</button>
"#;
        equal(
            source,
            r#"export default function(h, proxy) {
  proxy.count = 0;
  function increment() { proxy.count += 1; }
  return (props) => h("button", { onClick: increment }, ["Clicked ", props.count, " ", props.count === 1 ? "time" : "times"]);
}
"#,
        );
    }

    #[test]
    fn test_shadowed_local() {
        let source = "<script>let count = 0; function f(x) { if (x) { let count = 1; count++ } }</script><p>{count}</p>";
        equal(
            source,
            r#"export default function(h, proxy) {
  proxy.count = 0;
  function f(x) { if (x) { let count = 1; count++; } }
  return (props) => h("p", {}, [props.count]);
}
"#,
        );
        let generated = js(source);
        assert!(!generated.contains("proxy.count++"), "{}", generated);
    }

    #[test]
    fn test_imports_and_array_root() {
        let source = "<script>\n  import Box from \"./Box.duo\";\n</script>\n<Box><slot /></Box>\n<p>after</p>\n";
        equal(
            source,
            r#"import Box from "./Box.duo";
export default function(h, proxy) {
  return (props) => [h(Box, {}, [props.children]), h("p", {}, ["after"])];
}
"#,
        );
    }

    #[test]
    fn test_custom_names() {
        let options = GenerateOptions { factory: "jsx".into(), proxy: "state".into(), props: "$props".into() };
        let out = generate("test.duo", "<p>{x}</p>", &options).unwrap();
        assert_eq!(
            compact(&out),
            compact("export default function(jsx, state) {\n  return ($props) => jsx(\"p\", {}, [$props.x]);\n}\n")
        );
    }

    #[test]
    fn test_empty_document() {
        equal("", "export default function(h, proxy) {\n  return (props) => null;\n}\n");
    }

    #[test]
    fn test_parse_errors_propagate() {
        let err = generate("test.duo", "<div>", &GenerateOptions::default()).unwrap_err();
        assert!(err.to_string().contains("<div> is never closed"), "{}", err);
    }
}
