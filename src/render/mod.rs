//! Server-side rendering of documents to HTML.

mod env;
mod eval;

pub use env::Environment;
pub use eval::evaluate;

use crate::ast::{Attribute, Document, EachNode, ElementNode, Expr, Fragment, SlotNode, ValuePart};
use crate::error::{Error, EvalError};
use crate::parser;
use crate::resolver::Resolver;
use crate::value::Value;
use oxc_allocator::Allocator;
use std::fmt::Write;

/// Renders templates fetched through a [`Resolver`]
pub struct Renderer<R> {
    resolver: R,
}

impl<R: Resolver> Renderer<R> {
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }

    /// Render the template at `path`
    pub fn render(&self, path: &str, props: Value) -> Result<String, Error> {
        let mut out = String::new();
        self.render_to(&mut out, path, props)?;
        Ok(out)
    }

    /// Render the template at `path` into `w`
    pub fn render_to(&self, w: &mut dyn Write, path: &str, props: Value) -> Result<(), Error> {
        let file = self.resolver.resolve(None, path)?;
        self.render_source_to(w, &file.path, &file.source, props)
    }

    /// Render `source` as if it lived at `path`. Component imports resolve
    /// relative to `path`.
    pub fn render_source(&self, path: &str, source: &str, props: Value) -> Result<String, Error> {
        let mut out = String::new();
        self.render_source_to(&mut out, path, source, props)?;
        Ok(out)
    }

    fn render_source_to(&self, w: &mut dyn Write, path: &str, source: &str, props: Value) -> Result<(), Error> {
        log::debug!("rendering {}", path);
        let document = parser::parse(path, source)?;
        let env = Environment::root(props)?;
        let mut evaluation = Evaluation { resolver: &self.resolver, stack: Vec::new() };
        evaluation.document(w, &document, &env)
    }
}

/// State of one render call: the stack of documents being rendered
struct Evaluation<'r, R> {
    resolver: &'r R,
    stack: Vec<String>,
}

impl<R: Resolver> Evaluation<'_, R> {
    fn document(&mut self, w: &mut dyn Write, doc: &Document, env: &Environment<'_>) -> Result<(), Error> {
        self.stack.push(doc.path.clone());
        let result = self.fragments(w, doc, env, &doc.fragments);
        self.stack.pop();
        result
    }

    fn fragments(
        &mut self,
        w: &mut dyn Write,
        doc: &Document,
        env: &Environment<'_>,
        fragments: &[Fragment],
    ) -> Result<(), Error> {
        for fragment in fragments {
            self.fragment(w, doc, env, fragment)?;
        }
        Ok(())
    }

    fn fragment(&mut self, w: &mut dyn Write, doc: &Document, env: &Environment<'_>, fragment: &Fragment) -> Result<(), Error> {
        match fragment {
            Fragment::Element(element) => self.element(w, doc, env, element),
            Fragment::Component(component) => self.component(w, doc, env, component),
            Fragment::Text(text) | Fragment::Doctype(text) => Ok(w.write_str(text)?),
            Fragment::Mustache(expr) => {
                let value = evaluate_expr(expr, env)?;
                match value {
                    Value::Str(s) => w.write_str(&s)?,
                    Value::Int(n) => write!(w, "{}", n)?,
                    // Not printable, and not an error either
                    Value::Absent | Value::Bool(_) => {}
                    other => {
                        return Err(EvalError::UnexpectedValue { context: "text", found: other.kind().to_string() }.into());
                    }
                }
                Ok(())
            }
            Fragment::Script(_) | Fragment::Style(_) | Fragment::Comment(_) => Ok(()),
            Fragment::If(node) => {
                let branch = if evaluate_expr(&node.cond, env)?.is_truthy() { &node.then } else { &node.else_ };
                self.fragments(w, doc, env, branch)
            }
            Fragment::Each(node) => self.each(w, doc, env, node),
            Fragment::Slot(slot) => self.slot(w, doc, env, slot),
        }
    }

    fn element(&mut self, w: &mut dyn Write, doc: &Document, env: &Environment<'_>, node: &ElementNode) -> Result<(), Error> {
        write!(w, "<{}", node.name)?;
        for attribute in &node.attributes {
            if let Some(rendered) = render_attribute(attribute, env)? {
                write!(w, " {}", rendered)?;
            }
        }
        if node.self_closing {
            w.write_str("/>")?;
            return Ok(());
        }
        w.write_str(">")?;
        self.fragments(w, doc, env, &node.children)?;
        write!(w, "</{}>", node.name)?;
        Ok(())
    }

    fn each(&mut self, w: &mut dyn Write, doc: &Document, env: &Environment<'_>, node: &EachNode) -> Result<(), Error> {
        let items = match evaluate_expr(&node.list, env)? {
            Value::Absent => Vec::new(),
            Value::Seq(items) => items,
            other => return Err(EvalError::NotSequence(other.kind().to_string()).into()),
        };
        if items.is_empty() {
            return self.fragments(w, doc, env, &node.else_);
        }
        for (i, item) in items.into_iter().enumerate() {
            let mut scope = env.child();
            scope.define(node.value.as_str(), item);
            if let Some(index) = &node.index {
                scope.define(index.as_str(), Value::Int(i as i64));
            }
            self.fragments(w, doc, &scope, &node.body)?;
        }
        Ok(())
    }

    fn component(&mut self, w: &mut dyn Write, doc: &Document, env: &Environment<'_>, node: &ElementNode) -> Result<(), Error> {
        let symbol = doc
            .scopes
            .lookup_by_name(doc.scopes.root(), &node.name)
            .ok_or_else(|| EvalError::ComponentNotFound(node.name.clone()))?;
        let import = symbol
            .import
            .as_ref()
            .ok_or_else(|| EvalError::ComponentNotImported(node.name.clone()))?;

        let file = self.resolver.resolve(Some(&doc.path), &import.path)?;
        if let Some(start) = self.stack.iter().position(|path| *path == file.path) {
            let mut cycle = self.stack[start..].to_vec();
            cycle.push(file.path);
            return Err(EvalError::ImportCycle(cycle).into());
        }
        log::trace!("rendering component {} from {}", node.name, file.path);
        let child = parser::parse(&file.path, &file.source)?;

        let mut props = Value::map();
        for attribute in &node.attributes {
            if let Some(value) = component_prop(attribute, env)? {
                props.insert(attribute.key(), value);
            }
        }

        // Slot content is evaluated where it is written, in the caller
        let mut slot = String::new();
        for fragment in &node.children {
            if let Fragment::Slot(_) = fragment {
                return Err(EvalError::NamedSlots.into());
            }
            self.fragment(&mut slot, doc, env, fragment)?;
        }

        let scope = Environment::with_slot(props, slot)?;
        self.document(w, &child, &scope)
    }

    fn slot(&mut self, w: &mut dyn Write, doc: &Document, env: &Environment<'_>, node: &SlotNode) -> Result<(), Error> {
        if node.name.is_some() {
            return Err(EvalError::NamedSlots.into());
        }
        let content = env.slot();
        if !content.is_empty() {
            w.write_str(content)?;
            return Ok(());
        }
        self.fragments(w, doc, env, &node.fallback)
    }
}

/// Parse a template expression and evaluate it
fn evaluate_expr(expr: &Expr, env: &Environment<'_>) -> Result<Value, Error> {
    let allocator = Allocator::default();
    let parsed = expr.parse(&allocator)?;
    Ok(evaluate(&parsed, env)?)
}

fn value_part(part: &ValuePart, env: &Environment<'_>) -> Result<Value, Error> {
    match part {
        ValuePart::Text(text) => Ok(Value::Str(text.clone())),
        ValuePart::Mustache(expr) => evaluate_expr(expr, env),
    }
}

/// Join attribute parts into one string, with absent parts as empty strings
fn join_parts(parts: &[ValuePart], env: &Environment<'_>) -> Result<Value, Error> {
    let mut joined = String::new();
    for part in parts {
        let value = value_part(part, env)?;
        let text = value
            .as_text()
            .ok_or_else(|| EvalError::UnexpectedValue { context: "attribute", found: value.kind().to_string() })?;
        joined.push_str(&text);
    }
    Ok(Value::Str(joined))
}

/// `key`, `key="value"`, or nothing when the attribute drops out
fn render_value(key: &str, value: Value) -> Result<Option<String>, Error> {
    match value {
        Value::Bool(true) => Ok(Some(key.to_string())),
        Value::Bool(false) | Value::Absent => Ok(None),
        other => match other.as_text() {
            Some(text) => Ok(Some(format!("{}=\"{}\"", key, text))),
            None => Err(EvalError::UnexpectedValue { context: "attribute", found: other.kind().to_string() }.into()),
        },
    }
}

fn render_attribute(attribute: &Attribute, env: &Environment<'_>) -> Result<Option<String>, Error> {
    match attribute {
        // Event handlers only exist on the client
        Attribute::Field { event_handler: true, .. } | Attribute::Shorthand { event_handler: true, .. } => Ok(None),
        Attribute::Field { key, values, .. } => match values.as_slice() {
            [] => Ok(Some(key.clone())),
            [part] => render_value(key, value_part(part, env)?),
            parts => render_value(key, join_parts(parts, env)?),
        },
        Attribute::Shorthand { key, .. } => render_value(key, env.lookup(key).cloned().unwrap_or_default()),
        Attribute::Binding { key, expr } => match evaluate_expr(expr, env)? {
            Value::Absent => Ok(Some(format!("{}=\"\"", key))),
            value => render_value(key, value),
        },
        Attribute::NamedSlot { name } => Ok(Some(format!("slot=\"{}\"", name))),
    }
}

/// Value passed to a component for one attribute. Absent values are not
/// passed at all.
fn component_prop(attribute: &Attribute, env: &Environment<'_>) -> Result<Option<Value>, Error> {
    let value = match attribute {
        Attribute::Field { event_handler: true, .. } | Attribute::Shorthand { event_handler: true, .. } => return Ok(None),
        Attribute::NamedSlot { .. } => return Ok(None),
        Attribute::Field { values, .. } => match values.as_slice() {
            [] => Value::Bool(true),
            [part] => value_part(part, env)?,
            parts => join_parts(parts, env)?,
        },
        Attribute::Shorthand { key, .. } => env.lookup(key).cloned().unwrap_or_default(),
        Attribute::Binding { expr, .. } => evaluate_expr(expr, env)?,
    };
    Ok(if value.is_absent() { None } else { Some(value) })
}
