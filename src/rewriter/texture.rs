//! Redirection of textures to slices of a texture array.

use regex::Regex;

use crate::{ArrayInitializer, PropertyValue};

/// A texture redirected to a texture array.
#[derive(Debug, Clone)]
pub struct MergedTexture {
    pub name: String,
    /// The color served for materials without the texture, as `float4(...)`.
    pub default_value: String,
    pub slice: ArrayInitializer,
    has_missing_slices: bool,
    declaration: Regex,
}

impl MergedTexture {
    /// Create a new merged texture.
    ///
    /// Returns [`None`] if there are no slices.
    pub fn new(name: &str, default_value: &str, slices: &[Option<u32>]) -> Option<Self> {
        let values = slices
            .iter()
            .map(|slice| PropertyValue::Int(slice.map(|slice| slice as i32).unwrap_or(-1)))
            .collect::<Vec<_>>();

        let name_pattern = regex::escape(name);
        let declaration = Regex::new(&format!(
            r"^(?:uniform\s+)?(?:(?:sampler2D(?:_half|_float)?|Texture2D(?:\s*<[^>]*>)?)\s+{name_pattern}\s*;|SamplerState\s+sampler{name_pattern}\s*;|(?:UNITY_DECLARE_TEX2D(?:_NOSAMPLER|_HALF|_FLOAT)?|TEXTURE2D|SAMPLER)\s*\(\s*(?:sampler)?{name_pattern}\s*\)\s*;?)$"
        ))
        .ok()?;

        Some(Self {
            name: name.to_string(),
            default_value: default_value.to_string(),
            slice: ArrayInitializer::new(&values)?,
            has_missing_slices: slices.iter().any(Option::is_none),
            declaration,
        })
    }

    /// Get the texture array property name.
    pub fn array_name(&self) -> String {
        format!("{}_Array", self.name)
    }

    /// Get the name of the array sampler.
    pub fn sampler_name(&self) -> String {
        format!("sampler{}_Array", self.name)
    }

    /// Get the name of the wrapper type.
    pub fn wrapper_type(&self) -> String {
        format!("OptimizerTexture{}", self.name)
    }

    /// Get the name of the wrapper instance.
    pub fn wrapper_instance(&self) -> String {
        format!("optimizerTexture{}", self.name)
    }

    /// Whether the line is an original declaration of the texture or its sampler.
    pub fn is_declaration(&self, line: &str) -> bool {
        self.declaration.is_match(line)
    }

    /// Get the declarations replacing the texture.
    pub fn declarations(&self) -> Vec<String> {
        let array = self.array_name();
        let sampler = self.sampler_name();
        let wrapper = self.wrapper_type();
        let instance = self.wrapper_instance();
        let fallback = match self.has_missing_slices {
            true => format!("if (slice < 0) return {}; ", self.default_value),
            false => String::new(),
        };

        vec![
            format!("Texture2DArray {array};"),
            format!("SamplerState {sampler};"),
            format!("struct {wrapper}"),
            "{".to_string(),
            "int slice;".to_string(),
            format!("float4 Sample(SamplerState s, float2 uv) {{ {fallback}return {array}.Sample(s, float3(uv, slice)); }}"),
            format!("float4 Sample(SamplerState s, float2 uv, int2 offset) {{ {fallback}return {array}.Sample(s, float3(uv, slice), offset); }}"),
            format!("float4 SampleBias(SamplerState s, float2 uv, float bias) {{ {fallback}return {array}.SampleBias(s, float3(uv, slice), bias); }}"),
            format!("float4 SampleLevel(SamplerState s, float2 uv, float lod) {{ {fallback}return {array}.SampleLevel(s, float3(uv, slice), lod); }}"),
            format!("float4 SampleGrad(SamplerState s, float2 uv, float2 dx, float2 dy) {{ {fallback}return {array}.SampleGrad(s, float3(uv, slice), dx, dy); }}"),
            format!("float4 Load(int3 location) {{ {fallback}return {array}.Load(int4(location.xy, slice, location.z)); }}"),
            format!("void GetDimensions(out uint width, out uint height) {{ uint elements; {array}.GetDimensions(width, height, elements); }}"),
            format!("void GetDimensions(out float width, out float height) {{ float elements; {array}.GetDimensions(width, height, elements); }}"),
            format!("void GetDimensions(uint mip, out uint width, out uint height, out uint levels) {{ uint elements; {array}.GetDimensions(mip, width, height, elements, levels); }}"),
            format!("void GetDimensions(uint mip, out float width, out float height, out float levels) {{ float elements; {array}.GetDimensions(mip, width, height, elements, levels); }}"),
            "};".to_string(),
            format!("static {wrapper} {instance};"),
            format!("float4 tex2D({wrapper} t, float2 uv) {{ return t.Sample({sampler}, uv); }}"),
            format!("float4 tex2Dlod({wrapper} t, float4 uv) {{ return t.SampleLevel({sampler}, uv.xy, uv.w); }}"),
            format!("float4 tex2Dbias({wrapper} t, float4 uv) {{ return t.SampleBias({sampler}, uv.xy, uv.w); }}"),
            format!("float4 tex2Dgrad({wrapper} t, float2 uv, float2 dx, float2 dy) {{ return t.SampleGrad({sampler}, uv, dx, dy); }}"),
            format!("#define {} {instance}", self.name),
            format!("#define sampler{} {sampler}", self.name),
        ]
    }

    /// Get the name of the slice constant array, if the slices need one.
    pub fn slice_declaration(&self) -> Option<String> {
        self.slice.declaration(&format!("{}Slice", self.name))
    }

    /// Get the statement selecting the slice of the current material.
    pub fn slice_assignment(&self, material_id: &str) -> String {
        format!(
            "{}.slice = {};",
            self.wrapper_instance(),
            self.slice.expression(&format!("{}Slice", self.name), material_id)
        )
    }
}

/// Get the function referencing every texture array so none is compiled out.
pub fn dummy_usage_function(textures: &[MergedTexture]) -> Vec<String> {
    let mut lines = vec![
        "float optimizerDummyTextureUsage()".to_string(),
        "{".to_string(),
        "float4 sum = 0;".to_string(),
    ];

    lines.extend(textures.iter().map(|texture| {
        format!(
            "sum += {}.SampleLevel({}, float3(0, 0, 0), 0);",
            texture.array_name(),
            texture.sampler_name()
        )
    }));

    lines.extend(["return sum.x;".to_string(), "}".to_string()]);
    lines
}

/// The statement keeping [`dummy_usage_function`] alive in the fragment stage.
pub const DUMMY_USAGE_BRANCH: &str = "if (_OptimizerZero > 0.5) clip(optimizerDummyTextureUsage() - 2);";
