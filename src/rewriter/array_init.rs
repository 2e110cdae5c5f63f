use glam::Vec4;
use itertools::Itertools;

use crate::PropertyValue;

/// The largest material count a bitmask initializer can select from.
pub const MAX_BITMASK_MATERIALS: usize = 32;

/// How a per-material property is initialized from the material ID.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayInitializer {
    /// Every material has the same value.
    Uniform(PropertyValue),
    /// One material differs from all others.
    Singular {
        index: usize,
        singular: PropertyValue,
        shared: PropertyValue,
    },
    /// Two distinct values, bit `i` of the mask set for materials using `set`.
    Bitmask {
        mask: u32,
        unset: PropertyValue,
        set: PropertyValue,
    },
    /// Anything else, a constant array indexed by material.
    Indexed(Vec<PropertyValue>),
}

impl ArrayInitializer {
    /// Choose the initializer for the per-material values.
    ///
    /// Returns [`None`] if there are no values.
    pub fn new(values: &[PropertyValue]) -> Option<Self> {
        let values = unify(values);
        let first = *values.first()?;

        let distinct = values.iter().copied().unique().collect::<Vec<_>>();
        match distinct.as_slice() {
            [value] => Some(Self::Uniform(*value)),
            [a, b] => {
                let count_of = |value: &PropertyValue| values.iter().filter(|v| *v == value).count();
                let singular = match (values.len(), count_of(a), count_of(b)) {
                    (2, ..) => Some(*b),
                    (_, 1, _) => Some(*a),
                    (_, _, 1) => Some(*b),
                    _ => None,
                };

                if let Some(singular) = singular {
                    let index = values.iter().rposition(|v| *v == singular)?;
                    let shared = if singular == *a { *b } else { *a };
                    return Some(Self::Singular {
                        index,
                        singular,
                        shared,
                    });
                }

                if values.len() <= MAX_BITMASK_MATERIALS {
                    let set = *b;
                    let mask = values
                        .iter()
                        .enumerate()
                        .filter(|(_, value)| **value == set)
                        .fold(0u32, |mask, (index, _)| mask | (1 << index));
                    return Some(Self::Bitmask {
                        mask,
                        unset: first,
                        set,
                    });
                }

                Some(Self::Indexed(values))
            }
            _ => Some(Self::Indexed(values)),
        }
    }

    /// Get the HLSL type of the values.
    pub fn hlsl_type(&self) -> &'static str {
        match self {
            Self::Uniform(value)
            | Self::Singular { shared: value, .. }
            | Self::Bitmask { unset: value, .. } => value.hlsl_type(),
            Self::Indexed(values) => values
                .first()
                .map(PropertyValue::hlsl_type)
                .unwrap_or("float"),
        }
    }

    /// Get the name of the constant array backing an indexed initializer.
    pub fn array_name(name: &str) -> String {
        format!("{name}OptimizerArray")
    }

    /// Get the global declaration the initializer needs, if any.
    pub fn declaration(&self, name: &str) -> Option<String> {
        let Self::Indexed(values) = self else {
            return None;
        };

        Some(format!(
            "static const {} {}[{}] = {{ {} }};",
            self.hlsl_type(),
            Self::array_name(name),
            values.len(),
            values.iter().map(PropertyValue::to_hlsl).join(", "),
        ))
    }

    /// Get the expression selecting the value for the material `index`.
    pub fn expression(&self, name: &str, index: &str) -> String {
        match self {
            Self::Uniform(value) => value.to_hlsl(),
            Self::Singular {
                index: singular_index,
                singular,
                shared,
            } => format!(
                "{index} == {singular_index} ? {} : {}",
                singular.to_hlsl(),
                shared.to_hlsl()
            ),
            Self::Bitmask { mask, unset, set } => format!(
                "((0x{mask:X}u >> {index}) & 1) ? {} : {}",
                set.to_hlsl(),
                unset.to_hlsl()
            ),
            Self::Indexed(..) => format!("{}[{index}]", Self::array_name(name)),
        }
    }
}

/// Convert the values to one common type.
///
/// Any vector makes every value a vector, scalars being splatted. Otherwise any float
/// makes every value a float.
pub fn unify(values: &[PropertyValue]) -> Vec<PropertyValue> {
    let has_vector = values.iter().any(|value| matches!(value, PropertyValue::Vector(..)));
    let has_float = values.iter().any(|value| matches!(value, PropertyValue::Float(..)));

    values
        .iter()
        .map(|value| match (value, has_vector, has_float) {
            (PropertyValue::Float(v), true, _) => PropertyValue::Vector(Vec4::splat(*v)),
            (PropertyValue::Int(v), true, _) => PropertyValue::Vector(Vec4::splat(*v as f32)),
            (PropertyValue::Int(v), false, true) => PropertyValue::Float(*v as f32),
            (value, ..) => *value,
        })
        .collect()
}
