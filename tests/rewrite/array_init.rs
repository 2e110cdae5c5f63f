use assert_matches::assert_matches;
use shaderlab_optimizer::{ArrayInitializer, PropertyValue, glam::Vec4};

fn given_floats(values: &[f32]) -> Vec<PropertyValue> {
    values.iter().copied().map(PropertyValue::Float).collect()
}

#[test]
fn test_array_initializer_new_when_values_are_empty_should_be_none() {
    assert_eq!(ArrayInitializer::new(&[]), None);
}

#[test]
fn test_array_initializer_new_when_values_are_equal_should_be_uniform() {
    let initializer = ArrayInitializer::new(&given_floats(&[0.5, 0.5, 0.5])).expect("initializer");

    assert_eq!(initializer, ArrayInitializer::Uniform(PropertyValue::Float(0.5)));
    assert_eq!(initializer.expression("_X", "materialID"), "0.5");
    assert_eq!(initializer.declaration("_X"), None);
}

#[test]
fn test_array_initializer_new_when_one_value_differs_should_be_singular() {
    let initializer =
        ArrayInitializer::new(&given_floats(&[1.0, 2.0, 1.0, 1.0])).expect("initializer");

    assert_eq!(
        initializer,
        ArrayInitializer::Singular {
            index: 1,
            singular: PropertyValue::Float(2.0),
            shared: PropertyValue::Float(1.0),
        }
    );
    assert_eq!(
        initializer.expression("_X", "materialID"),
        "materialID == 1 ? 2.0 : 1.0"
    );
}

#[test]
fn test_array_initializer_new_when_two_materials_should_single_out_the_last() {
    let initializer = ArrayInitializer::new(&given_floats(&[0.5, 0.9])).expect("initializer");

    assert_eq!(
        initializer.expression("_X", "materialID"),
        "materialID == 1 ? 0.9 : 0.5"
    );
}

#[test]
fn test_array_initializer_new_when_two_values_are_balanced_should_be_bitmask() {
    let initializer = ArrayInitializer::new(&given_floats(&[1.0, 2.0, 1.0, 2.0, 2.0, 1.0]))
        .expect("initializer");

    assert_eq!(
        initializer,
        ArrayInitializer::Bitmask {
            mask: 0b11010,
            unset: PropertyValue::Float(1.0),
            set: PropertyValue::Float(2.0),
        }
    );
    assert_eq!(
        initializer.expression("_X", "materialID"),
        "((0x1Au >> materialID) & 1) ? 2.0 : 1.0"
    );
    assert_eq!(initializer.declaration("_X"), None);
}

#[test]
fn test_array_initializer_new_when_bitmask_would_overflow_should_be_indexed() {
    let values = (0..33)
        .map(|i| PropertyValue::Float(if i % 2 == 0 { 1.0 } else { 2.0 }))
        .collect::<Vec<_>>();

    let initializer = ArrayInitializer::new(&values).expect("initializer");

    assert_matches!(initializer, ArrayInitializer::Indexed(ref values) if values.len() == 33);
}

#[test]
fn test_array_initializer_new_when_many_values_differ_should_be_indexed() {
    let initializer = ArrayInitializer::new(&given_floats(&[1.0, 2.0, 3.0, 1.0, 2.0, 3.0]))
        .expect("initializer");

    assert_eq!(
        initializer.declaration("_X").as_deref(),
        Some("static const float _XOptimizerArray[6] = { 1.0, 2.0, 3.0, 1.0, 2.0, 3.0 };")
    );
    assert_eq!(
        initializer.expression("_X", "materialID"),
        "_XOptimizerArray[materialID]"
    );
}

#[test]
fn test_array_initializer_new_when_ints_and_floats_mix_should_use_floats() {
    let initializer =
        ArrayInitializer::new(&[PropertyValue::Int(1), PropertyValue::Float(0.5)]).expect("initializer");

    assert_eq!(initializer.hlsl_type(), "float");
    assert_eq!(
        initializer.expression("_X", "materialID"),
        "materialID == 1 ? 0.5 : 1.0"
    );
}

#[test]
fn test_array_initializer_new_when_a_vector_is_present_should_splat_scalars() {
    let initializer = ArrayInitializer::new(&[
        PropertyValue::Vector(Vec4::new(1.0, 0.0, 0.0, 1.0)),
        PropertyValue::Float(0.0),
    ])
    .expect("initializer");

    assert_eq!(initializer.hlsl_type(), "float4");
    assert_eq!(
        initializer.expression("_X", "materialID"),
        "materialID == 1 ? float4(0.0, 0.0, 0.0, 0.0) : float4(1.0, 0.0, 0.0, 1.0)"
    );
}

#[test]
fn test_array_initializer_new_when_zeros_differ_in_sign_should_keep_both() {
    let initializer = ArrayInitializer::new(&given_floats(&[0.0, -0.0])).expect("initializer");

    assert_eq!(
        initializer.expression("_X", "materialID"),
        "materialID == 1 ? -0.0 : 0.0"
    );
}
