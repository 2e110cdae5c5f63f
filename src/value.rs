use std::hash::{Hash, Hasher};

use glam::Vec4;

/// A concrete material property value.
///
/// Equality and hashing are bitwise, so `-0.0` and `0.0` are distinct values and `NaN`
/// equals itself. This is what deduplicating per-material values needs.
#[derive(Debug, Clone, Copy)]
pub enum PropertyValue {
    Float(f32),
    Int(i32),
    Vector(Vec4),
}

impl PropertyValue {
    /// The HLSL type used to store this value.
    pub fn hlsl_type(&self) -> &'static str {
        match self {
            Self::Float(..) => "float",
            Self::Int(..) => "int",
            Self::Vector(..) => "float4",
        }
    }

    /// Format the value as an HLSL literal expression.
    pub fn to_hlsl(&self) -> String {
        match self {
            Self::Float(value) => format_float(*value),
            Self::Int(value) => value.to_string(),
            Self::Vector(value) => format_float4(*value),
        }
    }

    /// Get the scalar value, used when evaluating `#ifex` conditions.
    ///
    /// Returns [`None`] for vectors.
    pub fn as_scalar(&self) -> Option<f32> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Int(value) => Some(*value as f32),
            Self::Vector(..) => None,
        }
    }

    fn bits(&self) -> (u8, [u32; 4]) {
        match self {
            Self::Float(value) => (0, [value.to_bits(), 0, 0, 0]),
            Self::Int(value) => (1, [*value as u32, 0, 0, 0]),
            Self::Vector(value) => (2, value.to_array().map(f32::to_bits)),
        }
    }
}

impl PartialEq for PropertyValue {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for PropertyValue {}

impl Hash for PropertyValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

impl From<f32> for PropertyValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<Vec4> for PropertyValue {
    fn from(value: Vec4) -> Self {
        Self::Vector(value)
    }
}

/// Format a float as an HLSL literal.
///
/// Non-finite values are spelled through `asfloat` since HLSL has no literal for them.
pub fn format_float(value: f32) -> String {
    if value.is_nan() {
        "asfloat(0x7fc00000)".to_string()
    } else if value.is_infinite() {
        match value.is_sign_positive() {
            true => "asfloat(0x7f800000)".to_string(),
            false => "asfloat(0xff800000)".to_string(),
        }
    } else {
        format!("{value:?}")
    }
}

/// Format a 4 component vector as an HLSL `float4` constructor.
pub fn format_float4(value: Vec4) -> String {
    format!(
        "float4({}, {}, {}, {})",
        format_float(value.x),
        format_float(value.y),
        format_float(value.z),
        format_float(value.w),
    )
}
