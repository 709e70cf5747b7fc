//! Loading template sources by path.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// A template source together with its canonical path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub path: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverError {
    /// No file exists at the resolved path
    NotFound(String),
    /// The file exists but could not be read
    Other { path: String, message: String },
}

impl fmt::Display for ResolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolverError::NotFound(path) => write!(f, "{}: file does not exist", path),
            ResolverError::Other { path, message } => write!(f, "{}: {}", path, message),
        }
    }
}

impl std::error::Error for ResolverError {}

/// Resolves template paths to sources.
///
/// `path` is relative to the directory of `from` when given, else to the
/// resolver's root.
pub trait Resolver {
    fn resolve(&self, from: Option<&str>, path: &str) -> Result<ResolvedFile, ResolverError>;
}

impl<R: Resolver + ?Sized> Resolver for &R {
    fn resolve(&self, from: Option<&str>, path: &str) -> Result<ResolvedFile, ResolverError> {
        (**self).resolve(from, path)
    }
}

/// Reads templates from a directory on disk
#[derive(Debug, Clone)]
pub struct FsResolver {
    root: PathBuf,
}

impl FsResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Resolver for FsResolver {
    fn resolve(&self, from: Option<&str>, path: &str) -> Result<ResolvedFile, ResolverError> {
        let dir = match from {
            Some(from) => Path::new(from).parent().map(Path::to_path_buf).unwrap_or_default(),
            None => self.root.clone(),
        };
        let full = normalize(&dir.join(path));
        let display = full.to_string_lossy().into_owned();
        log::debug!("resolving {} from {:?} -> {}", path, from, display);
        match fs::read_to_string(&full) {
            Ok(source) => Ok(ResolvedFile { path: display, source }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(ResolverError::NotFound(display)),
            Err(err) => Err(ResolverError::Other { path: display, message: err.to_string() }),
        }
    }
}

/// Serves templates from an in-memory map keyed by clean relative paths
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    files: HashMap<String, String>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &str, source: impl Into<String>) {
        self.files.insert(clean_path(path), source.into());
    }

    pub fn with(mut self, path: &str, source: impl Into<String>) -> Self {
        self.insert(path, source);
        self
    }
}

impl<P: AsRef<str>, S: Into<String>> FromIterator<(P, S)> for MemoryResolver {
    fn from_iter<I: IntoIterator<Item = (P, S)>>(iter: I) -> Self {
        let mut resolver = MemoryResolver::new();
        for (path, source) in iter {
            resolver.insert(path.as_ref(), source);
        }
        resolver
    }
}

impl Resolver for MemoryResolver {
    fn resolve(&self, from: Option<&str>, path: &str) -> Result<ResolvedFile, ResolverError> {
        let joined = match from.and_then(|from| from.rsplit_once('/')) {
            Some((dir, _)) => format!("{}/{}", dir, path),
            None => path.to_string(),
        };
        let path = clean_path(&joined);
        match self.files.get(&path) {
            Some(source) => Ok(ResolvedFile { path, source: source.clone() }),
            None => Err(ResolverError::NotFound(path)),
        }
    }
}

/// Lexically clean a `/`-separated path: drop `.` segments and empty
/// segments, and fold `..` into its parent.
pub fn clean_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if absolute => {}
                _ => parts.push(".."),
            },
            part => parts.push(part),
        }
    }
    let joined = parts.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path("./Box.duo"), "Box.duo");
        assert_eq!(clean_path("pages/./../Box.duo"), "Box.duo");
        assert_eq!(clean_path("pages//users/index.duo"), "pages/users/index.duo");
        assert_eq!(clean_path("../a.duo"), "../a.duo");
        assert_eq!(clean_path("/x/../y.duo"), "/y.duo");
        assert_eq!(clean_path("./"), ".");
    }

    #[test]
    fn test_memory_resolver() {
        let resolver: MemoryResolver = [
            ("main.duo", "<Box />"),
            ("./components/Box.duo", "<div />"),
            ("components/Icon.duo", "<i />"),
        ]
        .into_iter()
        .collect();

        let file = resolver.resolve(None, "./components/Box.duo").unwrap();
        assert_eq!(file.path, "components/Box.duo");
        assert_eq!(file.source, "<div />");

        // Relative to the importing file
        let file = resolver.resolve(Some("components/Box.duo"), "./Icon.duo").unwrap();
        assert_eq!(file.path, "components/Icon.duo");
        let file = resolver.resolve(Some("components/Box.duo"), "../main.duo").unwrap();
        assert_eq!(file.path, "main.duo");

        assert_eq!(
            resolver.resolve(Some("main.duo"), "./Missing.duo"),
            Err(ResolverError::NotFound("Missing.duo".to_string()))
        );
    }

    #[test]
    fn test_fs_resolver() {
        let dir = std::env::temp_dir().join(format!("duo-resolver-{}", std::process::id()));
        fs::create_dir_all(dir.join("users")).unwrap();
        fs::write(dir.join("users").join("index.duo"), "<h1>Index</h1>").unwrap();
        fs::write(dir.join("users").join("about.duo"), "<h1>About</h1>").unwrap();

        let resolver = FsResolver::new(&dir);
        let index = resolver.resolve(None, "./users/index.duo").unwrap();
        assert_eq!(index.path, dir.join("users").join("index.duo").to_string_lossy());
        assert_eq!(index.source, "<h1>Index</h1>");

        let about = resolver.resolve(Some(&index.path), "./about.duo").unwrap();
        assert_eq!(about.path, dir.join("users").join("about.duo").to_string_lossy());
        assert_eq!(about.source, "<h1>About</h1>");

        let missing = resolver.resolve(None, "nope.duo").unwrap_err();
        assert!(matches!(missing, ResolverError::NotFound(_)));

        fs::remove_dir_all(&dir).unwrap();
    }
}
