use shaderlab_optimizer::{DUMMY_USAGE_BRANCH, MergedTexture, dummy_usage_function};

const WHITE: &str = "float4(1.0, 1.0, 1.0, 1.0)";

fn given_texture(slices: &[Option<u32>]) -> MergedTexture {
    MergedTexture::new("_MainTex", WHITE, slices).expect("merged texture")
}

#[test]
fn test_merged_texture_new_when_slices_are_empty_should_be_none() {
    assert!(MergedTexture::new("_MainTex", WHITE, &[]).is_none());
}

#[test]
fn test_merged_texture_is_declaration_should_match_every_declaration_form() {
    let texture = given_texture(&[Some(0), Some(1)]);

    for line in [
        "sampler2D _MainTex;",
        "uniform sampler2D_half _MainTex;",
        "Texture2D _MainTex;",
        "Texture2D<float4> _MainTex;",
        "SamplerState sampler_MainTex;",
        "UNITY_DECLARE_TEX2D(_MainTex);",
        "UNITY_DECLARE_TEX2D_NOSAMPLER(_MainTex);",
        "TEXTURE2D(_MainTex);",
        "SAMPLER(sampler_MainTex);",
    ] {
        assert!(texture.is_declaration(line), "{line}");
    }

    for line in ["sampler2D _MainTex2;", "float4 _MainTex_ST;", "sampler2D _BumpMap;"] {
        assert!(!texture.is_declaration(line), "{line}");
    }
}

#[test]
fn test_merged_texture_declarations_should_redirect_name_to_wrapper() {
    let texture = given_texture(&[Some(0), Some(1)]);

    let declarations = texture.declarations();

    assert!(declarations.contains(&"Texture2DArray _MainTex_Array;".to_string()));
    assert!(declarations.contains(&"SamplerState sampler_MainTex_Array;".to_string()));
    assert!(declarations.contains(&"static OptimizerTexture_MainTex optimizerTexture_MainTex;".to_string()));
    assert!(declarations.contains(&"#define _MainTex optimizerTexture_MainTex".to_string()));
    assert!(declarations.contains(&"#define sampler_MainTex sampler_MainTex_Array".to_string()));
    assert!(declarations.iter().all(|line| !line.contains("slice < 0")));
}

#[test]
fn test_merged_texture_declarations_should_forward_dimensions_with_and_without_mip() {
    let declarations = given_texture(&[Some(0), Some(1)]).declarations();

    assert!(declarations.contains(
        &"void GetDimensions(out uint width, out uint height) { uint elements; _MainTex_Array.GetDimensions(width, height, elements); }"
            .to_string()
    ));
    assert!(declarations.contains(
        &"void GetDimensions(uint mip, out uint width, out uint height, out uint levels) { uint elements; _MainTex_Array.GetDimensions(mip, width, height, elements, levels); }"
            .to_string()
    ));
    assert!(declarations.iter().any(|line| line.starts_with(
        "void GetDimensions(uint mip, out float width, out float height, out float levels)"
    )));
}

#[test]
fn test_merged_texture_declarations_when_slice_is_missing_should_fall_back_to_default() {
    let texture = given_texture(&[Some(0), None]);

    assert!(
        texture
            .declarations()
            .iter()
            .any(|line| line.contains(&format!("if (slice < 0) return {WHITE}; ")))
    );
}

#[test]
fn test_merged_texture_slice_assignment_should_select_slice_by_material() {
    let texture = given_texture(&[Some(0), None]);

    assert_eq!(texture.slice_declaration(), None);
    assert_eq!(
        texture.slice_assignment("materialID"),
        "optimizerTexture_MainTex.slice = materialID == 1 ? -1 : 0;"
    );
}

#[test]
fn test_merged_texture_slice_declaration_when_slices_are_distinct_should_declare_array() {
    let texture = given_texture(&[Some(0), Some(1), None]);

    assert_eq!(
        texture.slice_declaration().as_deref(),
        Some("static const int _MainTexSliceOptimizerArray[3] = { 0, 1, -1 };")
    );
    assert_eq!(
        texture.slice_assignment("materialID"),
        "optimizerTexture_MainTex.slice = _MainTexSliceOptimizerArray[materialID];"
    );
}

#[test]
fn test_dummy_usage_function_should_sample_every_array() {
    let textures = [
        given_texture(&[Some(0), Some(1)]),
        MergedTexture::new("_BumpMap", WHITE, &[Some(0), Some(1)]).expect("merged texture"),
    ];

    let lines = dummy_usage_function(&textures);

    assert_eq!(lines[0], "float optimizerDummyTextureUsage()");
    assert!(lines.contains(
        &"sum += _MainTex_Array.SampleLevel(sampler_MainTex_Array, float3(0, 0, 0), 0);".to_string()
    ));
    assert!(lines.contains(
        &"sum += _BumpMap_Array.SampleLevel(sampler_BumpMap_Array, float3(0, 0, 0), 0);".to_string()
    ));
    assert!(DUMMY_USAGE_BRANCH.contains("optimizerDummyTextureUsage()"));
}
