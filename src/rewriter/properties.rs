//! Rewriting of the ShaderLab `Properties` block.

use std::sync::OnceLock;

use regex::Regex;

/// The runtime storage of a property written to the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Float,
    Int,
    Vector,
    Texture,
    TextureArray,
}

impl PropertyKind {
    /// Classify a ShaderLab type word.
    pub fn from_type_word(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "float" | "range" => Some(Self::Float),
            "int" | "integer" => Some(Self::Int),
            "color" | "vector" => Some(Self::Vector),
            "2d" | "3d" | "cube" => Some(Self::Texture),
            "2darray" | "cubearray" => Some(Self::TextureArray),
            _ => None,
        }
    }
}

fn declaration_regex() -> &'static Regex {
    static DECLARATION_REGEX: OnceLock<Regex> = OnceLock::new();
    DECLARATION_REGEX.get_or_init(|| {
        Regex::new(
            r#"^((?:\[(?:[^\[\]]|\[[^\]]*\])*\]\s*)*)([A-Za-z_][A-Za-z0-9_]*)(\s*\(\s*"(?:[^"\\]|\\.)*"\s*,\s*)([A-Za-z0-9]+)(.*)$"#,
        )
        .expect("Invalid property declaration regex")
    })
}

/// A property declaration line of the `Properties` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDeclaration<'a> {
    pub tags: &'a str,
    pub name: &'a str,
    pub type_word: &'a str,
    separator: &'a str,
    rest: &'a str,
}

impl<'a> PropertyDeclaration<'a> {
    /// Match a declaration line.
    pub fn parse(line: &'a str) -> Option<Self> {
        let captures = declaration_regex().captures(line)?;
        Some(Self {
            tags: captures.get(1)?.as_str(),
            name: captures.get(2)?.as_str(),
            separator: captures.get(3)?.as_str(),
            type_word: captures.get(4)?.as_str(),
            rest: captures.get(5)?.as_str(),
        })
    }

    /// Get the storage kind.
    pub fn kind(&self) -> Option<PropertyKind> {
        PropertyKind::from_type_word(self.type_word)
    }

    /// Get the declaration of the texture array replacing this 2D texture.
    pub fn to_texture_array(&self) -> String {
        format!(
            "{}{}_Array{}2DArray{}",
            self.tags, self.name, self.separator, self.rest
        )
    }
}

/// Get a hidden `Float` property declaration.
pub fn hidden_float(name: &str, display_name: &str, default: f32) -> String {
    format!("[HideInInspector] {name} (\"{display_name}\", Float) = {default}")
}
