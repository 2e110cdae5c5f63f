use std::path::PathBuf;

use rustc_hash::FxHashMap;

/// A provider of shader source text.
///
/// Paths are project relative with forward slashes, e.g. `Assets/Shaders/Toon.shader`.
pub trait SourceResolver: Send + Sync {
    /// Read the lines of the file at `path`.
    fn read_lines(&self, path: &str) -> Result<Vec<String>, std::io::Error>;
}

impl<R: SourceResolver + ?Sized> SourceResolver for &R {
    fn read_lines(&self, path: &str) -> Result<Vec<String>, std::io::Error> {
        (**self).read_lines(path)
    }
}

/// A resolver reading files below a project root directory.
#[derive(Debug, Clone)]
pub struct FileSystemResolver {
    pub root: PathBuf,
}

impl FileSystemResolver {
    /// Create a new file system resolver.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SourceResolver for FileSystemResolver {
    fn read_lines(&self, path: &str) -> Result<Vec<String>, std::io::Error> {
        let text = std::fs::read_to_string(self.root.join(path))?;
        Ok(text.lines().map(String::from).collect())
    }
}

/// A resolver serving sources from memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryResolver {
    files: FxHashMap<String, String>,
}

impl MemoryResolver {
    /// Create an empty memory resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file.
    pub fn file(mut self, path: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(path, source);
        self
    }

    /// Insert or replace a file.
    pub fn insert(&mut self, path: impl Into<String>, source: impl Into<String>) {
        self.files.insert(path.into(), source.into());
    }
}

impl SourceResolver for MemoryResolver {
    fn read_lines(&self, path: &str) -> Result<Vec<String>, std::io::Error> {
        self.files
            .get(path)
            .map(|source| source.lines().map(String::from).collect())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{path} not found in memory resolver"),
                )
            })
    }
}
