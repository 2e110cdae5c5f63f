use assert_matches::assert_matches;
use shaderlab_optimizer::{ColorSpace, MAX_MATERIAL_COUNT, RewriteError, RewriteOptions};

mod array_init;
mod properties;
mod texture;

#[test]
fn test_rewrite_options_new_should_have_one_mesh_and_no_substitution() {
    let options = RewriteOptions::new();

    assert_eq!(options.mesh_count(), 1);
    assert_eq!(options.packed_id_texcoord, 7);
    assert!(!options.needs_packed_id());
    assert!(!options.needs_id_in_later_stages());
    assert_matches!(options.material_count(), Ok(1));
}

#[test]
fn test_rewrite_options_when_meshes_are_merged_should_need_packed_id_in_vertex_only() {
    let options = RewriteOptions::new().merged_meshes(0..2);

    assert!(options.needs_packed_id());
    assert!(!options.needs_id_in_later_stages());
}

#[test]
fn test_rewrite_options_when_property_varies_should_need_id_in_later_stages() {
    let options = RewriteOptions::new().array_property("_Cutoff", [0.5f32, 0.9]);

    assert!(options.needs_packed_id());
    assert!(options.needs_id_in_later_stages());
    assert_matches!(options.material_count(), Ok(2));
}

#[test]
fn test_rewrite_options_when_animated_set_is_empty_should_not_count_as_animated() {
    let mut options = RewriteOptions::new();
    options.animated_properties.entry(0).or_default();

    assert!(!options.has_animated_properties());

    let options = options.animated_property(0, "_Color");
    assert!(options.has_animated_properties());
    assert!(options.needs_id_in_later_stages());
}

#[test]
fn test_rewrite_options_material_count_when_lists_disagree_should_return_error() {
    let options = RewriteOptions::new()
        .array_property("_A", [1.0f32, 2.0, 3.0])
        .merged_texture("_B", [Some(0), Some(1)]);

    assert_matches!(
        options.material_count(),
        Err(RewriteError::MaterialCountMismatch {
            property,
            count: 2,
            expected_count: 3,
        }) if property == "_B"
    );
}

#[test]
fn test_rewrite_options_material_count_when_list_is_empty_should_return_error() {
    let options = RewriteOptions::new().array_property("_A", Vec::<f32>::new());

    assert_matches!(
        options.material_count(),
        Err(RewriteError::EmptyValues { property }) if property == "_A"
    );
}

#[test]
fn test_rewrite_options_material_count_when_too_many_materials_should_return_error() {
    let options =
        RewriteOptions::new().array_property("_A", (0..=MAX_MATERIAL_COUNT).map(|i| i as i32));

    assert_matches!(
        options.material_count(),
        Err(RewriteError::TooManyMaterials { count, max }) if count == MAX_MATERIAL_COUNT + 1 && max == MAX_MATERIAL_COUNT
    );
}

#[test]
fn test_rewrite_options_pass_defines_when_pass_overrides_keyword_should_override_last() {
    let options = RewriteOptions::new()
        .known_define("UNITY_PIPELINE_URP", false)
        .color_space(ColorSpace::Linear)
        .enabled_keyword("_EMISSION")
        .pass_keyword(1, "_EMISSION", false);

    let first = options.pass_defines(0);
    let second = options.pass_defines(1);

    assert_eq!(
        first,
        vec![
            ("UNITY_PIPELINE_URP".to_string(), false),
            ("UNITY_COLORSPACE_GAMMA".to_string(), false),
            ("_EMISSION".to_string(), true),
        ]
    );
    assert_eq!(second[..first.len()], first[..]);
    assert_eq!(second.last(), Some(&("_EMISSION".to_string(), false)));
}
