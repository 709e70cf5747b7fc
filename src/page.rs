//! Page rendering with an error template fallback.

use crate::error::Error;
use crate::render::Renderer;
use crate::resolver::Resolver;
use crate::value::Value;

/// Served when the error template itself does not exist
pub const FALLBACK_ERROR_PAGE: &str =
    "<html><head></head><body><main><h1>Internal Server Error</h1></main></body></html>";

pub const DEFAULT_ERROR_PAGE: &str = "_error.duo";

/// Renders pages, substituting an error template when a render fails
pub struct Page<R> {
    renderer: Renderer<R>,
    error_page: String,
}

impl<R: Resolver> Page<R> {
    pub fn new(resolver: R) -> Self {
        Self {
            renderer: Renderer::new(resolver),
            error_page: DEFAULT_ERROR_PAGE.to_string(),
        }
    }

    /// Use `path` as the error template
    pub fn error_page(mut self, path: impl Into<String>) -> Self {
        self.error_page = path.into();
        self
    }

    /// Render `path`. On failure the error template is rendered with
    /// `{ "error": message }` instead.
    pub fn render(&self, path: &str, props: Value) -> Result<String, Error> {
        let err = match self.renderer.render(path, props) {
            Ok(html) => return Ok(html),
            Err(err) => err,
        };
        log::warn!("{}: {}", path, err);

        let props = Value::map().with("error", err.to_string());
        match self.renderer.render(&self.error_page, props) {
            Ok(html) => Ok(html),
            Err(err) if err.is_not_found() => {
                log::debug!("{} not found, using the built-in error page", self.error_page);
                Ok(FALLBACK_ERROR_PAGE.to_string())
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::MemoryResolver;

    #[test]
    fn test_renders_page() {
        let resolver = MemoryResolver::new().with("index.duo", "<h1>{title}</h1>");
        let page = Page::new(resolver);
        let html = page.render("index.duo", Value::map().with("title", "hi")).unwrap();
        assert_eq!(html, "<h1>hi</h1>");
    }

    #[test]
    fn test_error_template() {
        let resolver = MemoryResolver::new()
            .with("index.duo", "<h1>{1 - 1}</h1>")
            .with("_error.duo", "<p>{error}</p>");
        let page = Page::new(resolver);
        let html = page.render("index.duo", Value::Absent).unwrap();
        assert_eq!(html, "<p>unsupported operator '-' in server rendering</p>");
    }

    #[test]
    fn test_missing_page_uses_error_template() {
        let resolver = MemoryResolver::new().with("errors/500.duo", "<p>{error}</p>");
        let page = Page::new(resolver).error_page("errors/500.duo");
        let html = page.render("missing.duo", Value::Absent).unwrap();
        assert_eq!(html, "<p>missing.duo: file does not exist</p>");
    }

    #[test]
    fn test_builtin_fallback() {
        let page = Page::new(MemoryResolver::new());
        assert_eq!(page.render("index.duo", Value::Absent).unwrap(), FALLBACK_ERROR_PAGE);
    }

    #[test]
    fn test_broken_error_template_propagates() {
        let resolver = MemoryResolver::new().with("_error.duo", "<p>{error</p>");
        let page = Page::new(resolver);
        assert!(page.render("index.duo", Value::Absent).is_err());
    }
}
