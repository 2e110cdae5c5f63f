use std::sync::Arc;

use parking_lot::RwLock;
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::{ParsedShader, SourceResolver};

/// A caller owned cache of parsed shaders keyed by path.
///
/// Parsing happens outside the lock; a result is inserted only once complete, so two
/// workers racing on the same path both parse and the last one wins.
#[derive(Debug, Default)]
pub struct ShaderCache {
    shaders: RwLock<FxHashMap<String, Arc<ParsedShader>>>,
}

impl ShaderCache {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached shader.
    pub fn get(&self, path: &str) -> Option<Arc<ParsedShader>> {
        self.shaders.read().get(path).cloned()
    }

    /// Insert a shader, replacing any previous entry for its path.
    pub fn insert(&self, shader: ParsedShader) -> Arc<ParsedShader> {
        let shader = Arc::new(shader);
        self.shaders
            .write()
            .insert(shader.file_path.clone(), Arc::clone(&shader));
        shader
    }

    /// Get a cached shader or parse and cache it.
    pub fn get_or_parse(&self, path: &str, resolver: &dyn SourceResolver) -> Arc<ParsedShader> {
        if let Some(shader) = self.get(path) {
            return shader;
        }

        self.insert(ParsedShader::parse(path, resolver))
    }

    /// Parse every shader not cached yet in parallel.
    ///
    /// Returns the shaders in the order of `paths`.
    pub fn parse_all<R: SourceResolver>(
        &self,
        paths: &[impl AsRef<str> + Sync],
        resolver: &R,
    ) -> Vec<Arc<ParsedShader>> {
        let shaders = paths
            .par_iter()
            .map(|path| self.get_or_parse(path.as_ref(), resolver))
            .collect::<Vec<_>>();

        log::info!("Parsed {} shaders, {} cached", shaders.len(), self.len());
        shaders
    }

    /// Get the number of cached shaders.
    pub fn len(&self) -> usize {
        self.shaders.read().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.shaders.read().is_empty()
    }

    /// Remove every cached shader.
    pub fn clear(&self) {
        self.shaders.write().clear();
    }
}
