use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use crate::{ParseError, SourceResolver, include::ShaderSources, parser};

/// A programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Vertex,
    Hull,
    Domain,
    Geometry,
    Fragment,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 5] = [
        Stage::Vertex,
        Stage::Hull,
        Stage::Domain,
        Stage::Geometry,
        Stage::Fragment,
    ];

    /// Get the stage bound by a `#pragma <word> <function>` directive.
    pub fn from_pragma(word: &str) -> Option<Self> {
        match word {
            "vertex" => Some(Self::Vertex),
            "hull" => Some(Self::Hull),
            "domain" => Some(Self::Domain),
            "geometry" => Some(Self::Geometry),
            "fragment" => Some(Self::Fragment),
            _ => None,
        }
    }

    /// Get the index of the stage in [`Stage::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Vertex => "vertex",
            Self::Hull => "hull",
            Self::Domain => "domain",
            Self::Geometry => "geometry",
            Self::Fragment => "fragment",
        };
        write!(f, "{name}")
    }
}

/// The type of a ShaderLab property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyType {
    Color,
    ColorHDR,
    Float,
    Vector,
    Int,
    Texture2D,
    Texture2DArray,
    Texture3D,
    TextureCube,
    TextureCubeArray,
    Unknown,
}

impl PropertyType {
    /// Whether this is any texture type.
    pub fn is_texture(&self) -> bool {
        matches!(
            self,
            Self::Texture2D
                | Self::Texture2DArray
                | Self::Texture3D
                | Self::TextureCube
                | Self::TextureCubeArray
        )
    }

    /// Whether this is a 4 component vector type.
    pub fn is_vector(&self) -> bool {
        matches!(self, Self::Color | Self::ColorHDR | Self::Vector)
    }

    /// Whether this is a scalar type.
    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Float | Self::Int)
    }
}

/// A property declared in the `Properties` block.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub display_name: String,
    pub ty: PropertyType,
    /// The default value as an HLSL expression, e.g. `0.5` or `float4(1, 1, 1, 1)`.
    pub default_value: String,
    pub has_gamma_tag: bool,
    /// ShaderLab commands referencing the property by name, e.g. `Blend` or `Stencil`.
    pub shaderlab_sites: BTreeSet<String>,
}

impl Property {
    /// Create a new property without tags or usage sites.
    pub fn new(
        name: impl Into<String>,
        ty: PropertyType,
        default_value: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            ty,
            default_value: default_value.into(),
            has_gamma_tag: false,
            shaderlab_sites: BTreeSet::new(),
        }
    }
}

/// A function parameter.
///
/// The return slot of a [`Function`] is represented by a parameter without a name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameter {
    pub ty: String,
    pub name: String,
    pub semantic: Option<String>,
    pub array_size: Option<String>,
    pub is_input: bool,
    pub is_output: bool,
    /// All modifier keywords in declaration order, including `in`/`out`/`inout`.
    pub modifiers: Vec<String>,
    pub default_value: Option<String>,
}

/// A function definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    /// Index 0 is the return slot.
    pub parameters: Vec<Parameter>,
    /// The logical lines of the signature as written, including preprocessor lines.
    pub raw_parameters: Vec<String>,
}

impl Function {
    /// Get the return slot.
    pub fn return_parameter(&self) -> Option<&Parameter> {
        self.parameters.first()
    }

    /// Get the return type.
    pub fn return_type(&self) -> &str {
        self.return_parameter()
            .map(|parameter| parameter.ty.as_str())
            .unwrap_or("void")
    }

    /// Get the real parameters, excluding the return slot.
    pub fn arguments(&self) -> &[Parameter] {
        self.parameters.get(1..).unwrap_or_default()
    }
}

/// A render pass, i.e. one program block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pass {
    pub vertex: Option<Function>,
    pub hull: Option<Function>,
    pub domain: Option<Function>,
    pub geometry: Option<Function>,
    pub fragment: Option<Function>,
    pub shader_feature_keywords: BTreeSet<String>,
    pub light_mode: Option<String>,
}

impl Pass {
    /// Get the function bound to a stage.
    pub fn stage(&self, stage: Stage) -> Option<&Function> {
        match stage {
            Stage::Vertex => self.vertex.as_ref(),
            Stage::Hull => self.hull.as_ref(),
            Stage::Domain => self.domain.as_ref(),
            Stage::Geometry => self.geometry.as_ref(),
            Stage::Fragment => self.fragment.as_ref(),
        }
    }

    /// Get the function bound to a stage mutably.
    pub fn stage_mut(&mut self, stage: Stage) -> &mut Option<Function> {
        match stage {
            Stage::Vertex => &mut self.vertex,
            Stage::Hull => &mut self.hull,
            Stage::Domain => &mut self.domain,
            Stage::Geometry => &mut self.geometry,
            Stage::Fragment => &mut self.fragment,
        }
    }

    /// Whether the pass binds a hull or domain stage.
    pub fn has_tessellation(&self) -> bool {
        self.hull.is_some() || self.domain.is_some()
    }
}

/// Get the file name of `path` without extensions.
pub(crate) fn file_stem(path: &str) -> &str {
    let file = path.rsplit(['/', '\\']).next().unwrap_or(path);
    file.split('.').next().unwrap_or(file)
}

/// The structured model of one shader.
#[derive(Debug, Clone, Default)]
pub struct ParsedShader {
    /// The name from the `Shader "..."` line.
    pub name: String,
    pub file_path: String,
    pub parsed_correctly: bool,
    pub error_message: Option<String>,
    /// The tokenized top-level file and its includes.
    pub sources: ShaderSources,
    /// Properties in declaration order, `_ST` companions following their texture.
    pub properties: Vec<Property>,
    /// Index into [`ParsedShader::properties`] by name.
    pub property_table: FxHashMap<String, usize>,
    pub passes: Vec<Pass>,
    pub functions: FxHashMap<String, Function>,
    pub shader_feature_keywords: BTreeSet<String>,
    /// Property names referenced by `#ifex`.
    pub ifex_parameters: BTreeSet<String>,
    pub has_tessellation: bool,
    pub has_disable_batching_tag: bool,
    pub has_custom_texture_declarations: bool,
    pub mismatched_curly_braces: bool,
    /// Includes skipped because they were already included in the same program block.
    pub multi_include_count: usize,
    pub unresolved_includes: Vec<String>,
}

impl ParsedShader {
    /// Parse the shader at `path`.
    ///
    /// This never fails, any error is recorded in [`ParsedShader::error_message`] with
    /// [`ParsedShader::parsed_correctly`] set to `false`.
    pub fn parse(path: &str, resolver: &dyn SourceResolver) -> Self {
        match parser::build(path, resolver) {
            Ok(shader) => {
                log::info!(
                    "Parsed shader {} from {path} ({} properties, {} passes)",
                    shader.name,
                    shader.properties.len(),
                    shader.passes.len(),
                );
                shader
            }
            Err(e) => {
                log::warn!("Failed to parse shader {path}: {e}");
                Self::failed(path, &e)
            }
        }
    }

    /// Create a shader which failed to parse.
    pub fn failed(path: &str, error: &ParseError) -> Self {
        Self {
            name: file_stem(path).to_string(),
            file_path: path.to_string(),
            parsed_correctly: false,
            error_message: Some(error.to_string()),
            ..Default::default()
        }
    }

    /// Get the normalized lines of every tokenized file by path.
    pub fn text(&self) -> &FxHashMap<String, Vec<String>> {
        &self.sources.files
    }

    /// Get a property by name.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.property_table
            .get(name)
            .and_then(|index| self.properties.get(*index))
    }

    /// Insert a property, a later declaration replacing the lookup entry of an earlier one.
    pub fn insert_property(&mut self, property: Property) {
        self.property_table
            .insert(property.name.clone(), self.properties.len());
        self.properties.push(property);
    }

    /// Whether materials and meshes using this shader may be merged.
    pub fn can_merge(&self) -> bool {
        self.parsed_correctly
            && !self.has_tessellation
            && !self.has_disable_batching_tag
            && !self.mismatched_curly_braces
    }

    /// Whether textures of this shader may be merged into texture arrays.
    pub fn can_merge_textures(&self) -> bool {
        self.can_merge() && !self.has_custom_texture_declarations
    }

    /// Get the properties whose values must agree for materials to be merged without
    /// turning them into arrays.
    ///
    /// These are properties used by ShaderLab commands or by `#ifex`, and every texture.
    pub fn properties_to_check_when_merging(&self) -> BTreeSet<&str> {
        self.properties
            .iter()
            .filter(|property| {
                property.ty.is_texture()
                    || !property.shaderlab_sites.is_empty()
                    || self.ifex_parameters.contains(&property.name)
            })
            .map(|property| property.name.as_str())
            .collect()
    }
}
