use std::sync::Arc;

use xxhash_rust::xxh3::xxh3_64;

use crate::{AnimatedLayout, ParsedShader, PropertyKind};

/// One generated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub name: String,
    pub lines: Vec<String>,
}

impl GeneratedFile {
    /// Get the content joined by newlines.
    pub fn text(&self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }
}

/// Hash lines of generated content.
pub fn content_hash<'a>(lines: impl IntoIterator<Item = &'a String>) -> u64 {
    let mut bytes = Vec::new();
    for line in lines {
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
    }
    xxh3_64(&bytes)
}

/// Get the name of a generated include chunk.
pub fn chunk_name(stem: &str, hash: u64) -> String {
    format!("{stem}_{hash:016x}.cginc")
}

/// Replace characters not allowed in file names.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            true => c,
            false => '_',
        })
        .collect()
}

/// A generated shader variant.
#[derive(Debug, Clone)]
pub struct OptimizedShader {
    /// The display name, `Hidden/Optimized/<original name>/<hash>`.
    pub name: String,
    pub content_hash: u64,
    /// The main shader file followed by its include chunks.
    pub files: Vec<GeneratedFile>,
    pub float_properties: Vec<String>,
    pub int_properties: Vec<String>,
    pub vector_properties: Vec<String>,
    pub texture_properties: Vec<String>,
    pub texture_array_properties: Vec<String>,
    pub animated_layout: AnimatedLayout,
    pub diagnostics: Vec<String>,
    pub source: Arc<ParsedShader>,
}

impl OptimizedShader {
    /// Get the main shader file.
    pub fn main_file(&self) -> &GeneratedFile {
        &self.files[0]
    }

    /// Get a generated file by name.
    pub fn file(&self, name: &str) -> Option<&GeneratedFile> {
        self.files.iter().find(|file| file.name == name)
    }

    /// Get the include chunks.
    pub fn chunks(&self) -> &[GeneratedFile] {
        &self.files[1..]
    }

    /// Get the properties of a storage kind.
    pub fn properties(&self, kind: PropertyKind) -> &[String] {
        match kind {
            PropertyKind::Float => &self.float_properties,
            PropertyKind::Int => &self.int_properties,
            PropertyKind::Vector => &self.vector_properties,
            PropertyKind::Texture => &self.texture_properties,
            PropertyKind::TextureArray => &self.texture_array_properties,
        }
    }

    /// Get the storage kind of an emitted property.
    pub fn property_kind(&self, name: &str) -> Option<PropertyKind> {
        [
            PropertyKind::Float,
            PropertyKind::Int,
            PropertyKind::Vector,
            PropertyKind::Texture,
            PropertyKind::TextureArray,
        ]
        .into_iter()
        .find(|kind| self.properties(*kind).iter().any(|property| property == name))
    }
}
