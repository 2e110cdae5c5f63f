use shaderlab_optimizer::{PropertyDeclaration, PropertyKind, hidden_float};

#[test]
fn test_property_declaration_parse_should_split_tags_name_and_type() {
    let declaration = PropertyDeclaration::parse(r#"[NoScaleOffset] _MainTex ("Texture", 2D) = "white""#)
        .expect("declaration");

    assert_eq!(declaration.tags, "[NoScaleOffset] ");
    assert_eq!(declaration.name, "_MainTex");
    assert_eq!(declaration.type_word, "2D");
    assert_eq!(declaration.kind(), Some(PropertyKind::Texture));
}

#[test]
fn test_property_declaration_to_texture_array_should_keep_tags_and_default() {
    let declaration = PropertyDeclaration::parse(r#"[NoScaleOffset] _MainTex ("Texture", 2D) = "white""#)
        .expect("declaration");

    assert_eq!(
        declaration.to_texture_array(),
        r#"[NoScaleOffset] _MainTex_Array ("Texture", 2DArray) = "white""#
    );
}

#[test]
fn test_property_declaration_parse_when_display_name_has_parentheses_should_match() {
    let declaration =
        PropertyDeclaration::parse(r#"[Enum(UnityEngine.Rendering.CullMode)] _Cull ("Cull (Mode)", Float) = 2"#)
            .expect("declaration");

    assert_eq!(declaration.name, "_Cull");
    assert_eq!(declaration.kind(), Some(PropertyKind::Float));
}

#[test]
fn test_property_declaration_parse_when_line_is_not_a_declaration_should_be_none() {
    assert_eq!(PropertyDeclaration::parse("{"), None);
    assert_eq!(PropertyDeclaration::parse("[Header(Main)]"), None);
}

#[test]
fn test_property_kind_from_type_word_should_classify_storage() {
    for (word, kind) in [
        ("Float", Some(PropertyKind::Float)),
        ("Range", Some(PropertyKind::Float)),
        ("Integer", Some(PropertyKind::Int)),
        ("Color", Some(PropertyKind::Vector)),
        ("Vector", Some(PropertyKind::Vector)),
        ("3D", Some(PropertyKind::Texture)),
        ("Cube", Some(PropertyKind::Texture)),
        ("CubeArray", Some(PropertyKind::TextureArray)),
        ("Matrix", None),
    ] {
        assert_eq!(PropertyKind::from_type_word(word), kind, "{word}");
    }
}

#[test]
fn test_hidden_float_should_declare_hidden_property() {
    assert_eq!(
        hidden_float("_IsActiveMesh0", "Is Active Mesh 0", 1.0),
        r#"[HideInInspector] _IsActiveMesh0 ("Is Active Mesh 0", Float) = 1"#
    );
}
