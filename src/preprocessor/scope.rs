use rustc_hash::FxHashMap;

use crate::preprocessor::Truth;

/// A chain of define scopes, one frame per open conditional arm.
///
/// Lookups walk from the innermost frame outwards, so a frame only stores what its
/// arm changed and pushing never copies the enclosing state.
#[derive(Debug, Clone)]
pub struct DefineScopes {
    frames: Vec<FxHashMap<String, Truth>>,
}

impl DefineScopes {
    /// Create new scopes seeded with known defines.
    pub fn new(seed: impl IntoIterator<Item = (String, bool)>) -> Self {
        let root = seed
            .into_iter()
            .map(|(name, defined)| (name, Truth::from(defined)))
            .collect();

        Self { frames: vec![root] }
    }

    /// Get whether `name` is defined.
    pub fn get(&self, name: &str) -> Truth {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name).copied())
            .unwrap_or(Truth::Unknown)
    }

    /// Set the state of `name` in the innermost frame.
    pub fn set(&mut self, name: impl Into<String>, state: Truth) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.into(), state);
        }
    }

    /// Open a new innermost frame.
    pub fn push(&mut self) {
        self.frames.push(FxHashMap::default());
    }

    /// Close the innermost frame, returning what it changed.
    ///
    /// The root frame is never popped.
    pub fn pop(&mut self) -> FxHashMap<String, Truth> {
        match self.frames.len() {
            0 | 1 => FxHashMap::default(),
            _ => self.frames.pop().unwrap_or_default(),
        }
    }

    /// Get the number of open frames, including the root.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

impl Default for DefineScopes {
    fn default() -> Self {
        Self::new(std::iter::empty())
    }
}
