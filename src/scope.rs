//! Lexical scopes built while parsing a document.
//!
//! Scopes live in an arena owned by [`Scopes`] and refer to their parent by
//! [`ScopeId`]. Symbols are only ever added or have flags OR'd in; nothing is
//! removed.
//!
//! A scope opened by a construct in the source (a function, a block, an
//! `{#each}` body) is anchored at a byte offset of the template, so a later
//! pass over the same source can find it again.

use crate::error::ScopeError;
use std::collections::HashMap;
use std::fmt;

/// Handle to a scope inside a [`Scopes`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

/// Where an import binding comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub path: String,
    pub default: bool,
}

/// Declaration context a name is used in. Flags only ever accumulate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub declared: bool,
    pub exported: bool,
    pub mutable: bool,
}

impl Flags {
    pub fn declared(mut self) -> Self {
        self.declared = true;
        self
    }

    pub fn exported(mut self) -> Self {
        self.exported = true;
        self
    }

    pub fn mutable(mut self) -> Self {
        self.mutable = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    /// Stable id for compiler-synthesized bindings
    pub id: Option<String>,
    pub import: Option<Import>,
    pub declared: bool,
    pub exported: bool,
    pub mutable: bool,
}

impl Symbol {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            id: None,
            import: None,
            declared: false,
            exported: false,
            mutable: false,
        }
    }

    fn merge(&mut self, flags: Flags) {
        self.declared |= flags.declared;
        self.exported |= flags.exported;
        self.mutable |= flags.mutable;
    }
}

#[derive(Debug, Clone)]
struct ScopeNode {
    parent: Option<ScopeId>,
    symbols: Vec<Symbol>,
    children: Vec<ScopeId>,
}

/// Arena of nested lexical scopes. Index 0 is the document root.
#[derive(Debug, Clone)]
pub struct Scopes {
    nodes: Vec<ScopeNode>,
    anchors: HashMap<usize, ScopeId>,
}

impl Default for Scopes {
    fn default() -> Self {
        Self::new()
    }
}

impl Scopes {
    pub fn new() -> Self {
        Self {
            nodes: vec![ScopeNode { parent: None, symbols: Vec::new(), children: Vec::new() }],
            anchors: HashMap::new(),
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn new_child(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.nodes.len());
        self.nodes.push(ScopeNode { parent: Some(parent), symbols: Vec::new(), children: Vec::new() });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// A child scope opened by the construct starting at byte `anchor`
    pub fn new_child_at(&mut self, parent: ScopeId, anchor: usize) -> ScopeId {
        let id = self.new_child(parent);
        self.anchors.insert(anchor, id);
        id
    }

    /// The scope opened at byte `anchor`, if any
    pub fn scope_at(&self, anchor: usize) -> Option<ScopeId> {
        self.anchors.get(&anchor).copied()
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.nodes[scope.0].parent
    }

    pub fn symbols(&self, scope: ScopeId) -> &[Symbol] {
        &self.nodes[scope.0].symbols
    }

    pub fn children(&self, scope: ScopeId) -> &[ScopeId] {
        &self.nodes[scope.0].children
    }

    /// Record a use of `name`.
    ///
    /// A reference resolves through the scope chain and ORs `flags` into the
    /// symbol it finds. A declaration binds in `scope` itself, so a local
    /// never updates a symbol of the same name further out. Unknown names
    /// are created in `scope`.
    pub fn use_symbol(&mut self, scope: ScopeId, name: &str, flags: Flags) -> &Symbol {
        let found = if flags.declared {
            self.position_in(scope, |s| s.name == name).map(|index| (scope, index))
        } else {
            self.find(scope, |s| s.name == name)
        };
        let (owner, index) = match found {
            Some(location) => location,
            None => {
                let symbols = &mut self.nodes[scope.0].symbols;
                symbols.push(Symbol::new(name));
                (scope, symbols.len() - 1)
            }
        };
        let symbol = &mut self.nodes[owner.0].symbols[index];
        symbol.merge(flags);
        symbol
    }

    /// Declare a synthesized binding with a stable `id`
    pub fn declare(&mut self, scope: ScopeId, id: &str, name: &str) -> Result<&Symbol, ScopeError> {
        if self.position_in(scope, |s| s.id.as_deref() == Some(id)).is_some() {
            return Err(ScopeError::DuplicateId(id.to_string()));
        }
        let mut symbol = Symbol::new(name);
        symbol.id = Some(id.to_string());
        symbol.declared = true;
        let symbols = &mut self.nodes[scope.0].symbols;
        symbols.push(symbol);
        Ok(&symbols[symbols.len() - 1])
    }

    /// Attach an import descriptor to the symbol `name` resolves to
    pub fn set_import(&mut self, scope: ScopeId, name: &str, import: Import) {
        let (owner, index) = match self.find(scope, |s| s.name == name) {
            Some(location) => location,
            None => {
                let symbols = &mut self.nodes[scope.0].symbols;
                symbols.push(Symbol::new(name));
                (scope, symbols.len() - 1)
            }
        };
        self.nodes[owner.0].symbols[index].import = Some(import);
    }

    /// Innermost symbol called `name`
    pub fn lookup_by_name(&self, scope: ScopeId, name: &str) -> Option<&Symbol> {
        self.find(scope, |s| s.name == name)
            .map(|(owner, index)| &self.nodes[owner.0].symbols[index])
    }

    /// Innermost symbol called `name`, with the scope that owns it
    pub fn resolve(&self, scope: ScopeId, name: &str) -> Option<(ScopeId, &Symbol)> {
        self.find(scope, |s| s.name == name)
            .map(|(owner, index)| (owner, &self.nodes[owner.0].symbols[index]))
    }

    /// Innermost symbol declared with the synthesized `id`
    pub fn lookup_by_id(&self, scope: ScopeId, id: &str) -> Option<&Symbol> {
        self.find(scope, |s| s.id.as_deref() == Some(id))
            .map(|(owner, index)| &self.nodes[owner.0].symbols[index])
    }

    /// `name` if nothing in the chain uses it, else the first free `name0`, `name1`, ...
    pub fn find_free(&self, scope: ScopeId, name: &str) -> String {
        if self.lookup_by_name(scope, name).is_none() {
            return name.to_string();
        }
        let mut n = 0usize;
        loop {
            let candidate = format!("{}{}", name, n);
            if self.lookup_by_name(scope, &candidate).is_none() {
                return candidate;
            }
            n += 1;
        }
    }

    fn position_in<F: Fn(&Symbol) -> bool>(&self, scope: ScopeId, pred: F) -> Option<usize> {
        self.nodes[scope.0].symbols.iter().position(pred)
    }

    fn find<F: Fn(&Symbol) -> bool>(&self, scope: ScopeId, pred: F) -> Option<(ScopeId, usize)> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(index) = self.position_in(id, &pred) {
                return Some((id, index));
            }
            current = self.nodes[id.0].parent;
        }
        None
    }

    fn fmt_scope(&self, f: &mut fmt::Formatter<'_>, scope: ScopeId, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        for symbol in self.symbols(scope) {
            writeln!(f, "{}{}", indent, symbol)?;
        }
        for &child in self.children(scope) {
            writeln!(f)?;
            self.fmt_scope(f, child, depth + 1)?;
        }
        Ok(())
    }
}

impl PartialEq for Scopes {
    fn eq(&self, other: &Self) -> bool {
        self.nodes.len() == other.nodes.len()
            && self.nodes.iter().zip(&other.nodes).all(|(a, b)| {
                a.parent == b.parent && a.symbols == b.symbols && a.children == b.children
            })
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.name)?;
        if let Some(id) = &self.id {
            write!(f, " id={:?}", id)?;
        }
        if self.declared {
            write!(f, " declared")?;
        }
        if self.exported {
            write!(f, " exported")?;
        }
        if self.mutable {
            write!(f, " mutable")?;
        }
        if let Some(import) = &self.import {
            write!(f, " import={:?}", import.path)?;
            if import.default {
                write!(f, " default")?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Scopes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_scope(f, self.root(), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_accumulate() {
        let mut scopes = Scopes::new();
        let root = scopes.root();
        scopes.use_symbol(root, "x", Flags::default());
        assert!(!scopes.lookup_by_name(root, "x").unwrap().declared);

        scopes.use_symbol(root, "x", Flags::default().declared().mutable());
        scopes.use_symbol(root, "x", Flags::default());
        let x = scopes.lookup_by_name(root, "x").unwrap();
        assert!(x.declared);
        assert!(x.mutable);
        assert!(!x.exported);
        assert_eq!(scopes.symbols(root).len(), 1);
    }

    #[test]
    fn test_lookup_walks_parents() {
        let mut scopes = Scopes::new();
        let root = scopes.root();
        scopes.use_symbol(root, "count", Flags::default().declared().mutable());
        let child = scopes.new_child(root);
        assert_eq!(scopes.parent(child), Some(root));

        // A reference in the child updates the outer symbol
        scopes.use_symbol(child, "count", Flags::default().exported());
        assert!(scopes.lookup_by_name(root, "count").unwrap().exported);
        assert!(scopes.symbols(child).is_empty());

        // A declaration shadows it
        scopes.use_symbol(child, "count", Flags::default().declared());
        let inner = scopes.lookup_by_name(child, "count").unwrap();
        assert!(inner.declared && !inner.mutable);
        assert!(scopes.lookup_by_name(root, "count").unwrap().mutable);
    }

    #[test]
    fn test_anchored_scopes() {
        let mut scopes = Scopes::new();
        let root = scopes.root();
        scopes.use_symbol(root, "count", Flags::default().declared().mutable());
        let block = scopes.new_child_at(root, 42);
        scopes.use_symbol(block, "count", Flags::default().declared());

        assert_eq!(scopes.scope_at(42), Some(block));
        assert_eq!(scopes.scope_at(7), None);
        assert_eq!(scopes.resolve(block, "count").map(|(owner, _)| owner), Some(block));
        assert_eq!(scopes.resolve(root, "count").map(|(owner, _)| owner), Some(root));
        assert!(scopes.resolve(block, "missing").is_none());
    }

    #[test]
    fn test_declare_and_lookup_by_id() {
        let mut scopes = Scopes::new();
        let root = scopes.root();
        let name = scopes.find_free(root, "h");
        scopes.declare(root, "factory", &name).unwrap();
        assert_eq!(scopes.lookup_by_id(root, "factory").unwrap().name, "h");
        assert_eq!(
            scopes.declare(root, "factory", "h"),
            Err(ScopeError::DuplicateId("factory".to_string()))
        );

        let child = scopes.new_child(root);
        assert_eq!(scopes.lookup_by_id(child, "factory").unwrap().name, "h");
        assert!(scopes.lookup_by_id(child, "props").is_none());
    }

    #[test]
    fn test_find_free() {
        let mut scopes = Scopes::new();
        let root = scopes.root();
        assert_eq!(scopes.find_free(root, "h"), "h");
        scopes.use_symbol(root, "h", Flags::default());
        assert_eq!(scopes.find_free(root, "h"), "h0");
        scopes.use_symbol(root, "h0", Flags::default());
        let child = scopes.new_child(root);
        assert_eq!(scopes.find_free(child, "h"), "h1");
    }

    #[test]
    fn test_display() {
        let mut scopes = Scopes::new();
        let root = scopes.root();
        scopes.use_symbol(root, "Box", Flags::default().declared());
        scopes.set_import(root, "Box", Import { path: "./Box.duo".into(), default: true });
        scopes.use_symbol(root, "count", Flags::default().declared().exported().mutable());
        let child = scopes.new_child(root);
        scopes.use_symbol(child, "item", Flags::default().declared());

        assert_eq!(
            scopes.to_string(),
            "\"Box\" declared import=\"./Box.duo\" default\n\"count\" declared exported mutable\n\n  \"item\" declared\n"
        );
    }
}
