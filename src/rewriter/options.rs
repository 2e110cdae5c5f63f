use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{PropertyValue, RewriteError};

/// The largest number of source materials the packed ID can address.
pub const MAX_MATERIAL_COUNT: usize = 1 << 12;

/// The color space a project renders in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Gamma,
    Linear,
}

impl ColorSpace {
    /// Get the define the engine sets for the color space.
    pub fn define(&self) -> (String, bool) {
        ("UNITY_COLORSPACE_GAMMA".to_string(), *self == Self::Gamma)
    }
}

/// The configuration of one rewrite.
#[derive(Debug, Clone)]
pub struct RewriteOptions {
    /// Properties replaced by constants.
    pub static_properties: FxHashMap<String, PropertyValue>,
    /// Properties selected per source material, one value per material.
    pub array_properties: FxHashMap<String, Vec<PropertyValue>>,
    /// Textures redirected to a texture array, one slice per material.
    ///
    /// [`None`] is a material without the texture, served by the property's default.
    pub merged_textures: FxHashMap<String, Vec<Option<u32>>>,
    /// Animated property names by mesh index.
    pub animated_properties: BTreeMap<u32, BTreeSet<String>>,
    /// The mesh indices sharing the draw call.
    pub merged_meshes: Range<u32>,
    pub enabled_keywords: FxHashSet<String>,
    pub disabled_keywords: FxHashSet<String>,
    /// Keyword states of single passes by program block index.
    ///
    /// These override [`RewriteOptions::enabled_keywords`] and
    /// [`RewriteOptions::disabled_keywords`] for their pass.
    pub pass_keywords: BTreeMap<usize, FxHashMap<String, bool>>,
    /// Defines known in every pass, e.g. render pipeline markers.
    pub known_defines: FxHashMap<String, bool>,
    pub color_space: Option<ColorSpace>,
    /// Whether each texture property is used, for `PROP<NAME>` defines.
    pub texture_usage: FxHashMap<String, bool>,
    /// The texture coordinate channel carrying the packed ID.
    pub packed_id_texcoord: u32,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            static_properties: FxHashMap::default(),
            array_properties: FxHashMap::default(),
            merged_textures: FxHashMap::default(),
            animated_properties: BTreeMap::new(),
            merged_meshes: 0..1,
            enabled_keywords: FxHashSet::default(),
            disabled_keywords: FxHashSet::default(),
            pass_keywords: BTreeMap::new(),
            known_defines: FxHashMap::default(),
            color_space: None,
            texture_usage: FxHashMap::default(),
            packed_id_texcoord: 7,
        }
    }
}

impl RewriteOptions {
    /// Create new options without any substitution.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a property by a constant.
    pub fn static_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.static_properties.insert(name.into(), value.into());
        self
    }

    /// Select a property per source material.
    pub fn array_property<V: Into<PropertyValue>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.array_properties
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Redirect a texture to slices of a texture array.
    pub fn merged_texture(
        mut self,
        name: impl Into<String>,
        slices: impl IntoIterator<Item = Option<u32>>,
    ) -> Self {
        self.merged_textures
            .insert(name.into(), slices.into_iter().collect());
        self
    }

    /// Mark a property as animated on a mesh.
    pub fn animated_property(mut self, mesh: u32, name: impl Into<String>) -> Self {
        self.animated_properties
            .entry(mesh)
            .or_default()
            .insert(name.into());
        self
    }

    /// Set the mesh indices sharing the draw call.
    pub fn merged_meshes(mut self, meshes: Range<u32>) -> Self {
        self.merged_meshes = meshes;
        self
    }

    /// Mark a keyword as enabled.
    pub fn enabled_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.enabled_keywords.insert(keyword.into());
        self
    }

    /// Mark a keyword as disabled.
    pub fn disabled_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.disabled_keywords.insert(keyword.into());
        self
    }

    /// Mark a keyword as enabled or disabled in one pass only.
    pub fn pass_keyword(mut self, pass: usize, keyword: impl Into<String>, enabled: bool) -> Self {
        self.pass_keywords
            .entry(pass)
            .or_default()
            .insert(keyword.into(), enabled);
        self
    }

    /// Mark a define as known in every pass.
    pub fn known_define(mut self, name: impl Into<String>, defined: bool) -> Self {
        self.known_defines.insert(name.into(), defined);
        self
    }

    /// Set the color space the project renders in.
    pub fn color_space(mut self, color_space: ColorSpace) -> Self {
        self.color_space = Some(color_space);
        self
    }

    /// Set whether a texture property is used.
    pub fn texture_usage(mut self, name: impl Into<String>, used: bool) -> Self {
        self.texture_usage.insert(name.into(), used);
        self
    }

    /// Set the texture coordinate channel carrying the packed ID.
    pub fn packed_id_texcoord(mut self, channel: u32) -> Self {
        self.packed_id_texcoord = channel;
        self
    }

    /// Get the defines known in a pass from the options.
    ///
    /// Later entries override earlier ones: known defines, the color space, shader-wide
    /// keywords, then the keywords of the pass.
    pub fn pass_defines(&self, pass: usize) -> Vec<(String, bool)> {
        let mut defines = self
            .known_defines
            .iter()
            .map(|(name, defined)| (name.clone(), *defined))
            .collect::<Vec<_>>();
        defines.extend(self.color_space.as_ref().map(ColorSpace::define));
        defines.extend(
            self.enabled_keywords
                .iter()
                .map(|keyword| (keyword.clone(), true)),
        );
        defines.extend(
            self.disabled_keywords
                .iter()
                .map(|keyword| (keyword.clone(), false)),
        );
        defines.extend(
            self.pass_keywords
                .get(&pass)
                .into_iter()
                .flatten()
                .map(|(keyword, enabled)| (keyword.clone(), *enabled)),
        );
        defines
    }

    /// Get the number of meshes sharing the draw call.
    pub fn mesh_count(&self) -> usize {
        self.merged_meshes.len()
    }

    /// Whether any animated property is requested.
    pub fn has_animated_properties(&self) -> bool {
        self.animated_properties.values().any(|names| !names.is_empty())
    }

    /// Whether stages after the vertex stage need the packed ID.
    pub fn needs_id_in_later_stages(&self) -> bool {
        !self.array_properties.is_empty()
            || !self.merged_textures.is_empty()
            || self.has_animated_properties()
    }

    /// Whether the vertex stage decodes the packed ID.
    pub fn needs_packed_id(&self) -> bool {
        self.needs_id_in_later_stages() || self.mesh_count() > 1
    }

    /// Get the number of source materials, checking every per-material list agrees.
    pub fn material_count(&self) -> Result<usize, RewriteError> {
        let counts = self
            .array_properties
            .iter()
            .map(|(name, values)| (name, values.len()))
            .chain(
                self.merged_textures
                    .iter()
                    .map(|(name, slices)| (name, slices.len())),
            )
            .collect::<BTreeMap<_, _>>();

        let Some(expected_count) = counts.values().next().copied() else {
            return Ok(1);
        };

        for (property, count) in counts {
            if count == 0 {
                return Err(RewriteError::EmptyValues {
                    property: property.clone(),
                });
            }
            if count != expected_count {
                return Err(RewriteError::MaterialCountMismatch {
                    property: property.clone(),
                    count,
                    expected_count,
                });
            }
        }

        if expected_count > MAX_MATERIAL_COUNT {
            return Err(RewriteError::TooManyMaterials {
                count: expected_count,
                max: MAX_MATERIAL_COUNT,
            });
        }

        Ok(expected_count)
    }
}
